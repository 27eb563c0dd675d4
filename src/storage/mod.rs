//! Storage module for the remote hierarchical store
//!
//! This module provides the store client contract consumed by the series
//! adapter and its backend implementations:
//! - **Memory storage** - An in-process tree with live subscriptions
//! - **Firebase storage** - Firebase Realtime Database over REST (optional, requires `firebase` feature)
//!
//! Every backend follows the same tree semantics: `null` and empty objects
//! mean absent, `set` replaces a node, `update` merges the direct children of
//! an object into a node, and subscriptions only fire when the observed value
//! actually changes.
//!
//! # Examples
//!
//! ## Memory Storage
//!
//! ```rust
//! use series_store::storage::{MemoryStore, NodePath, StoreClient};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let path = NodePath::new("/series/42");
//!
//! store.set(&path, json!({"title": "Dark"})).await?;
//! let snapshot = store.fetch(&path).await?;
//! assert_eq!(snapshot.value(), Some(&json!({"title": "Dark"})));
//!
//! store.remove(&path).await?;
//! assert!(!store.fetch(&path).await?.exists());
//! # Ok(())
//! # }
//! ```
//!
//! ## Firebase Storage (requires `firebase` feature)
//!
//! ```rust,ignore
//! use series_store::storage::{FirebaseConfig, FirebaseStore, NodePath, StorageConfig, StoreClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FirebaseConfig::from_env()?;
//!     let store = FirebaseStore::new(config, StorageConfig::default())?;
//!
//!     let mut subscription = store.subscribe(&NodePath::new("/series")).await?;
//!     while let Some(snapshot) = subscription.next().await {
//!         println!("{} children", snapshot.children().len());
//!     }
//!     Ok(())
//! }
//! ```

// Store client contract
pub mod adapter;

// Core storage API and types
pub mod storage_api;
pub mod subscription;
pub mod tree;

// Storage backend implementations
pub mod memory_adapter;

#[cfg(feature = "firebase")]
pub mod storage_firebase;

// Re-export main types for convenience
pub use adapter::StoreClient;
pub use memory_adapter::MemoryStore;
pub use storage_api::{with_retry, NodePath, Snapshot, StorageBackend, StorageConfig};
pub use subscription::Subscription;

#[cfg(feature = "firebase")]
pub use storage_firebase::{FirebaseConfig, FirebaseStore};

use crate::error::{StorageError, StorageResult};
use serde_json::Value;

/// Storage constants
pub mod constants {
    //! Constants used throughout the storage module

    /// Default timeout for storage operations in seconds
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

    /// Default retry attempts
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Upper bound on the delay between retries in milliseconds
    pub const MAX_BACKOFF_MS: u64 = 10_000;

    /// URL scheme selecting the in-memory backend
    pub const MEMORY_URL: &str = "memory://";
}

/// Any of the compiled-in backends, chosen at runtime
#[derive(Debug, Clone)]
pub enum AnyStore {
    /// In-memory backend
    Memory(MemoryStore),
    /// Firebase Realtime Database backend
    #[cfg(feature = "firebase")]
    Firebase(FirebaseStore),
}

impl StoreClient for AnyStore {
    async fn fetch(&self, path: &NodePath) -> StorageResult<Snapshot> {
        match self {
            AnyStore::Memory(store) => store.fetch(path).await,
            #[cfg(feature = "firebase")]
            AnyStore::Firebase(store) => store.fetch(path).await,
        }
    }

    async fn set(&self, path: &NodePath, value: Value) -> StorageResult<()> {
        match self {
            AnyStore::Memory(store) => store.set(path, value).await,
            #[cfg(feature = "firebase")]
            AnyStore::Firebase(store) => store.set(path, value).await,
        }
    }

    async fn update(&self, path: &NodePath, value: Value) -> StorageResult<()> {
        match self {
            AnyStore::Memory(store) => store.update(path, value).await,
            #[cfg(feature = "firebase")]
            AnyStore::Firebase(store) => store.update(path, value).await,
        }
    }

    async fn remove(&self, path: &NodePath) -> StorageResult<()> {
        match self {
            AnyStore::Memory(store) => store.remove(path).await,
            #[cfg(feature = "firebase")]
            AnyStore::Firebase(store) => store.remove(path).await,
        }
    }

    async fn subscribe(&self, path: &NodePath) -> StorageResult<Subscription> {
        match self {
            AnyStore::Memory(store) => store.subscribe(path).await,
            #[cfg(feature = "firebase")]
            AnyStore::Firebase(store) => store.subscribe(path).await,
        }
    }

    fn backend_type(&self) -> StorageBackend {
        match self {
            AnyStore::Memory(store) => store.backend_type(),
            #[cfg(feature = "firebase")]
            AnyStore::Firebase(store) => store.backend_type(),
        }
    }
}

/// Storage factory for creating storage instances
pub struct StorageFactory;

impl StorageFactory {
    /// Create an empty in-memory store
    pub fn create_memory() -> MemoryStore {
        MemoryStore::new()
    }

    /// Create a Firebase store (requires `firebase` feature)
    #[cfg(feature = "firebase")]
    pub fn create_firebase(
        firebase_config: FirebaseConfig,
        storage_config: StorageConfig,
    ) -> StorageResult<FirebaseStore> {
        FirebaseStore::new(firebase_config, storage_config)
    }

    /// Create storage from URL (convenience method)
    ///
    /// `memory://` selects the in-memory backend; `http(s)://` selects the
    /// Firebase backend with that database URL.
    pub fn from_url(url: &str, storage_config: StorageConfig) -> StorageResult<AnyStore> {
        if url.starts_with(constants::MEMORY_URL) {
            return Ok(AnyStore::Memory(MemoryStore::new()));
        }

        if url.starts_with("https://") || url.starts_with("http://") {
            #[cfg(feature = "firebase")]
            {
                let store = FirebaseStore::new(FirebaseConfig::new(url), storage_config)?;
                return Ok(AnyStore::Firebase(store));
            }
            #[cfg(not(feature = "firebase"))]
            {
                let _ = storage_config;
                return Err(StorageError::BackendNotAvailable {
                    backend: "Firebase".to_string(),
                });
            }
        }

        Err(StorageError::OperationFailed {
            operation: "parse_storage_url".to_string(),
            reason: format!("Unsupported storage URL: {}", url),
        })
    }
}
