//! # Series Store
//!
//! A data-access adapter for a TV-series catalog kept in a remote hierarchical
//! key-value store. Series live in a global catalog at `/series/{id}` and in a
//! per-user mirror at `/users/{uid}/series/{id}`.
//!
//! ## Features
//!
//! - **Series Module**: The [`RemoteStoreAdapter`](series::RemoteStoreAdapter),
//!   session provider contract and record conversion
//! - **Storage Module**: The store client contract with an in-memory backend
//!   and a Firebase Realtime Database backend
//! - **Logging Module**: `tracing` subscriber setup with `color-eyre` reports
//!
//! ## Optional Features
//!
//! - `firebase` (default): Firebase Realtime Database backend over REST
//!
//! ## Example
//!
//! ```rust
//! use series_store::prelude::*;
//! use series_store::storage::MemoryStore;
//! # use serde::{Deserialize, Serialize};
//! # #[derive(Serialize, Deserialize)]
//! # struct Show { id: u64, title: String }
//! # impl SeriesRecord for Show {
//! #     fn series_id(&self) -> SeriesId { self.id.into() }
//! # }
//!
//! # #[tokio::main]
//! # async fn main() -> series_store::Result<()> {
//! let adapter: RemoteStoreAdapter<_, _, Show> =
//!     RemoteStoreAdapter::new(MemoryStore::new(), StaticSession::new());
//!
//! adapter.add_series(&Show { id: 42, title: "Dark".into() }).await?;
//! assert!(adapter.is_series_in_database(42u64).await?);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core error types
pub use error::{Error, Result};

// Core modules
pub mod error;
pub mod series;
pub mod storage;

// Ambient modules
pub mod logging;

// Re-export commonly used types
pub mod prelude {
    //! Common types and traits for convenient importing

    pub use crate::error::{ConvertError, Error, Result, SessionError, StorageError};
    pub use crate::series::{
        RemoteStoreAdapter, SeriesConverter, SeriesId, SeriesRecord, SessionProvider, StaticSession,
        UserProfile,
    };
    pub use crate::storage::{NodePath, Snapshot, StoreClient, Subscription};
}

// Version information
/// The version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
