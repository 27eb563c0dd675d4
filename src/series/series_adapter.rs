//! Remote store adapter for the series catalog and per-user series mirrors
//!
//! Translates application-level requests into store operations on two trees:
//! the global catalog at `/series/{id}` and each user's copy at
//! `/users/{uid}/series/{id}`. The two copies are independent; nothing here
//! keeps them in step.

use crate::error::{ConvertError, Error, Result, SessionError};
use crate::series::series_converter::{series_to_value, SerdeConverter, SeriesConverter, SeriesId, SeriesRecord};
use crate::series::user_session::{SessionProvider, UserProfile, UserRecord};
use crate::storage::{NodePath, Snapshot, StoreClient, Subscription};
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use tracing::{debug, warn};

/// Where the two trees live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Root of the global catalog
    pub series_root: NodePath,
    /// Root of the per-user documents
    pub users_root: NodePath,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            series_root: NodePath::new(super::constants::SERIES_ROOT),
            users_root: NodePath::new(super::constants::USERS_ROOT),
        }
    }
}

/// Data-access adapter between the application and the remote store
pub struct RemoteStoreAdapter<C, P, S, V = SerdeConverter<S>> {
    client: C,
    session: P,
    converter: V,
    config: AdapterConfig,
    _record: PhantomData<fn() -> S>,
}

impl<C, P, S> RemoteStoreAdapter<C, P, S> {
    /// Create an adapter that converts records with serde
    pub fn new(client: C, session: P) -> Self {
        Self::with_converter(client, session, SerdeConverter::new())
    }
}

impl<C, P, S, V> RemoteStoreAdapter<C, P, S, V> {
    /// Create an adapter with a custom converter
    pub fn with_converter(client: C, session: P, converter: V) -> Self {
        Self {
            client,
            session,
            converter,
            config: AdapterConfig::default(),
            _record: PhantomData,
        }
    }

    /// Replace the tree layout
    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    /// The underlying store client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The active tree layout
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// `/series/{id}`
    pub fn series_path(&self, id: &SeriesId) -> NodePath {
        self.config.series_root.child(id)
    }

    /// `/users/{uid}`
    pub fn user_path(&self, uid: &str) -> NodePath {
        self.config.users_root.child(uid)
    }

    /// `/users/{uid}/series`
    pub fn user_series_root(&self, uid: &str) -> NodePath {
        self.user_path(uid).child("series")
    }

    /// `/users/{uid}/series/{id}`
    pub fn user_series_path(&self, uid: &str, id: &SeriesId) -> NodePath {
        self.user_series_root(uid).child(id)
    }
}

impl<C, P, S, V> RemoteStoreAdapter<C, P, S, V>
where
    C: StoreClient,
    P: SessionProvider,
    S: SeriesRecord,
    V: SeriesConverter<S>,
{
    fn require_user(&self) -> Result<UserProfile> {
        self.session
            .current_user()
            .ok_or(Error::Session(SessionError::NotSignedIn))
    }

    async fn merge(&self, path: NodePath, value: Value) -> Result<()> {
        self.client.update(&path, value).await.map_err(|e| {
            warn!(%path, error = %e, "write failed");
            e
        })?;
        debug!(%path, "wrote node");
        Ok(())
    }

    /// Write a series to the global catalog
    pub async fn add_series(&self, series: &S) -> Result<()> {
        let path = self.series_path(&checked_id(series.series_id())?);
        self.merge(path, series_to_value(series)?).await
    }

    /// Write a series to the signed-in user's mirror
    pub async fn add_series_to_user(&self, series: &S) -> Result<()> {
        let user = self.require_user()?;
        let path = self.user_series_path(&user.uid, &checked_id(series.series_id())?);
        self.merge(path, series_to_value(series)?).await
    }

    /// Whether the catalog holds a series
    pub async fn is_series_in_database(&self, id: impl Into<SeriesId>) -> Result<bool> {
        let path = self.series_path(&checked_id(id.into())?);
        let snapshot = self.client.fetch(&path).await?;
        debug!(%path, exists = snapshot.exists(), "checked catalog");
        Ok(snapshot.exists())
    }

    /// Whether the signed-in user's mirror holds a series; `false` when signed out
    pub async fn is_series_in_user_database(&self, id: impl Into<SeriesId>) -> Result<bool> {
        let Some(user) = self.session.current_user() else {
            debug!("no user signed in, series not in user database");
            return Ok(false);
        };
        let path = self.user_series_path(&user.uid, &checked_id(id.into())?);
        let snapshot = self.client.fetch(&path).await?;
        debug!(%path, exists = snapshot.exists(), "checked user mirror");
        Ok(snapshot.exists())
    }

    /// Read one series from the catalog; `None` when absent
    pub async fn get_series(&self, id: impl Into<SeriesId>) -> Result<Option<S>> {
        let path = self.series_path(&checked_id(id.into())?);
        let snapshot = self.client.fetch(&path).await?;
        let key = snapshot.key().unwrap_or_default().to_string();
        match snapshot.into_value() {
            Some(raw) => Ok(Some(self.converter.convert_response_to_series(&key, raw)?)),
            None => {
                debug!(%path, "series not found");
                Ok(None)
            }
        }
    }

    /// Read the whole catalog in key order
    pub async fn get_all_series(&self) -> Result<Vec<S>> {
        let snapshot = self.client.fetch(&self.config.series_root).await?;
        convert_children(&self.converter, &snapshot)
    }

    /// Read the signed-in user's mirror in key order
    pub async fn get_user_series(&self) -> Result<Vec<S>> {
        let user = self.require_user()?;
        let snapshot = self.client.fetch(&self.user_series_root(&user.uid)).await?;
        convert_children(&self.converter, &snapshot)
    }

    /// Follow the signed-in user's mirror.
    ///
    /// The watch yields the full list once loaded and again whenever that
    /// collection changes. Dropping it releases the subscription.
    pub async fn watch_user_series(&self) -> Result<SeriesWatch<'_, S, V>> {
        let user = self.require_user()?;
        let subscription = self.client.subscribe(&self.user_series_root(&user.uid)).await?;
        Ok(SeriesWatch {
            subscription,
            converter: &self.converter,
            _record: PhantomData,
        })
    }

    /// Read any node once
    pub async fn read(&self, path: impl Into<NodePath>) -> Result<Snapshot> {
        let path = path.into();
        let snapshot = self.client.fetch(&path).await?;
        debug!(%path, exists = snapshot.exists(), "read node");
        Ok(snapshot)
    }

    /// Observe any node until the returned handle is dropped
    pub async fn watch(&self, path: impl Into<NodePath>) -> Result<Subscription> {
        Ok(self.client.subscribe(&path.into()).await?)
    }

    /// Whether the signed-in user has a document; `false` when signed out
    pub async fn has_user_db(&self) -> Result<bool> {
        let Some(user) = self.session.current_user() else {
            return Ok(false);
        };
        let snapshot = self.client.fetch(&self.user_path(&user.uid)).await?;
        Ok(snapshot.exists())
    }

    /// Create the signed-in user's document, replacing any existing one
    pub async fn create_user_db(&self) -> Result<()> {
        let user = self.require_user()?;
        let path = self.user_path(&user.uid);
        let record = serde_json::to_value(UserRecord::from_profile(&user)).map_err(ConvertError::from)?;
        self.client.set(&path, record).await.map_err(|e| {
            warn!(%path, error = %e, "failed to create user document");
            e
        })?;
        debug!(%path, "created user document");
        Ok(())
    }

    /// Delete the subtree at a path
    pub async fn remove(&self, path: impl Into<NodePath>) -> Result<()> {
        let path = path.into();
        self.client.remove(&path).await.map_err(|e| {
            warn!(%path, error = %e, "remove failed");
            e
        })?;
        debug!(%path, "removed node");
        Ok(())
    }

    /// Merge a value into the node at a path
    pub async fn write<T>(&self, value: &T, path: impl Into<NodePath>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value).map_err(ConvertError::from)?;
        self.merge(path.into(), value).await
    }
}

/// A series id must name exactly one child node
fn checked_id(id: SeriesId) -> Result<SeriesId> {
    if id.as_str().is_empty() || id.as_str().contains('/') {
        return Err(Error::InvalidInput {
            message: format!("series id '{}' is not a single node key", id),
        });
    }
    Ok(id)
}

/// Live view of a series collection, converted on every change
pub struct SeriesWatch<'a, S, V> {
    subscription: Subscription,
    converter: &'a V,
    _record: PhantomData<fn() -> S>,
}

impl<'a, S, V: SeriesConverter<S>> SeriesWatch<'a, S, V> {
    /// Path of the observed collection
    pub fn path(&self) -> &NodePath {
        self.subscription.path()
    }

    /// Wait for the next version of the list; `None` once the source closes
    pub async fn next(&mut self) -> Option<Result<Vec<S>>> {
        let snapshot = self.subscription.next().await?;
        Some(convert_children(self.converter, &snapshot))
    }

    /// Release the subscription
    pub fn unsubscribe(self) {
        self.subscription.unsubscribe();
    }
}

fn convert_children<S, V: SeriesConverter<S>>(converter: &V, snapshot: &Snapshot) -> Result<Vec<S>> {
    snapshot
        .children()
        .into_iter()
        .map(|(key, raw)| converter.convert_response_to_series(&key, raw).map_err(Error::from))
        .collect()
}
