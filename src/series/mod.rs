//! Series data access
//!
//! [`RemoteStoreAdapter`] is the entry point: it resolves catalog and user
//! paths, consults the [`SessionProvider`] for the signed-in user, converts
//! raw node data through a [`SeriesConverter`], and delegates to any
//! [`StoreClient`](crate::storage::StoreClient).
//!
//! # Example
//!
//! ```rust
//! use series_store::series::{RemoteStoreAdapter, SeriesId, SeriesRecord, StaticSession, UserProfile};
//! use series_store::storage::MemoryStore;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Show {
//!     id: u64,
//!     title: String,
//! }
//!
//! impl SeriesRecord for Show {
//!     fn series_id(&self) -> SeriesId {
//!         self.id.into()
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> series_store::Result<()> {
//! let session = StaticSession::signed_in(UserProfile::new("u1").with_display_name("Ada"));
//! let adapter: RemoteStoreAdapter<_, _, Show> = RemoteStoreAdapter::new(MemoryStore::new(), session);
//!
//! adapter.create_user_db().await?;
//! adapter.add_series_to_user(&Show { id: 42, title: "Dark".into() }).await?;
//!
//! assert!(adapter.is_series_in_user_database(42u64).await?);
//! assert!(!adapter.is_series_in_database(42u64).await?);
//! # Ok(())
//! # }
//! ```

pub mod series_adapter;
pub mod series_converter;
pub mod user_session;

pub use series_adapter::{AdapterConfig, RemoteStoreAdapter, SeriesWatch};
pub use series_converter::{series_to_value, SerdeConverter, SeriesConverter, SeriesId, SeriesRecord};
pub use user_session::{SessionProvider, StaticSession, UserProfile, UserRecord};

/// Default tree layout
pub mod constants {
    /// Root of the global series catalog
    pub const SERIES_ROOT: &str = "/series";

    /// Root of the per-user documents
    pub const USERS_ROOT: &str = "/users";
}
