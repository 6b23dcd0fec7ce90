use super::persistence::{DurabilityMode, SnapshotManager};
use super::Collection;
use crate::core::{Result, StoreError};
use crate::document::{Document, DocumentStore, Filter, FindAndModifyOptions, Update, UpdateResult};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Embedded document store.
///
/// Every collection sits behind its own lock; each mutating primitive holds
/// that write lock for its whole match-and-write, which is what makes
/// `update_first` and `find_and_modify` atomic. With a data directory the
/// affected collection snapshot is rewritten before the change becomes
/// visible, so a failed write leaves memory and disk unchanged.
pub struct InMemoryDocumentStore {
    /// Collections with individual locks
    collections: RwLock<HashMap<String, Arc<RwLock<Collection>>>>,
    snapshots: Option<SnapshotManager>,
    closed: AtomicBool,
}

impl InMemoryDocumentStore {
    /// Memory-only store; contents vanish with the process.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            snapshots: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Durable store backed by snapshot files in `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Self::open_with_durability(data_dir, DurabilityMode::Sync)
    }

    pub fn open_with_durability<P: AsRef<Path>>(
        data_dir: P,
        durability_mode: DurabilityMode,
    ) -> Result<Self> {
        let snapshots = SnapshotManager::new(data_dir, durability_mode)?;
        let mut collections = HashMap::new();
        for collection in snapshots.load_all()? {
            debug!(
                "Loaded collection '{}' with {} documents",
                collection.name(),
                collection.len()
            );
            collections.insert(
                collection.name().to_string(),
                Arc::new(RwLock::new(collection)),
            );
        }
        Ok(Self {
            collections: RwLock::new(collections),
            snapshots: Some(snapshots),
            closed: AtomicBool::new(false),
        })
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.snapshots.as_ref().map(SnapshotManager::data_dir)
    }

    /// Refuse every further request with `StoreUnavailable`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(StoreError::StoreUnavailable("document store is closed".into()));
        }
        Ok(())
    }

    fn check_name(name: &str) -> Result<()> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidArgument(format!(
                "Invalid collection name '{}'",
                name
            )));
        }
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<Option<Arc<RwLock<Collection>>>> {
        self.ensure_open()?;
        Self::check_name(name)?;
        Ok(self.collections.read().await.get(name).cloned())
    }

    async fn get_or_create_collection(&self, name: &str) -> Result<Arc<RwLock<Collection>>> {
        if let Some(handle) = self.get_collection(name).await? {
            return Ok(handle);
        }
        let mut collections = self.collections.write().await;
        let handle = collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Collection::new(name))));
        Ok(Arc::clone(handle))
    }

    /// Run `op` against the live collection under its write lock.
    ///
    /// Returns `None` when the collection does not exist and `create` is off.
    /// A handle dropped concurrently is re-resolved so writes never land in a
    /// detached collection.
    async fn mutate<T, F>(&self, name: &str, create: bool, op: F) -> Result<Option<T>>
    where
        F: Fn(&mut Collection) -> Result<T>,
    {
        loop {
            let handle = if create {
                self.get_or_create_collection(name).await?
            } else {
                match self.get_collection(name).await? {
                    Some(handle) => handle,
                    None => return Ok(None),
                }
            };

            let mut collection = handle.write().await;
            if collection.is_dropped() {
                continue;
            }

            let Some(snapshots) = &self.snapshots else {
                return op(&mut *collection).map(Some);
            };

            let mut staged = collection.clone();
            let outcome = op(&mut staged);
            if staged.revision() != collection.revision() {
                snapshots.save(&staged)?;
                *collection = staged;
            }
            return outcome.map(Some);
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn require_operators(update: &Update) -> Result<()> {
    if update.is_empty() {
        return Err(StoreError::InvalidArgument(
            "Update must contain at least one operator".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        self.mutate(collection, true, |c| c.insert(document.clone()))
            .await
            .map(|_| ())
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        let inserted = self
            .mutate(collection, true, |c| c.insert_many(documents.clone()))
            .await?;
        Ok(inserted.unwrap_or(0))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        match self.get_collection(collection).await? {
            Some(handle) => Ok(handle.read().await.find(filter)),
            None => Ok(Vec::new()),
        }
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        match self.get_collection(collection).await? {
            Some(handle) => Ok(handle.read().await.count(filter)),
            None => Ok(0),
        }
    }

    async fn update_first(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult> {
        require_operators(update)?;
        let result = self
            .mutate(collection, false, |c| c.update_first(filter, update))
            .await?;
        Ok(result.unwrap_or_default())
    }

    async fn find_and_modify(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: FindAndModifyOptions,
    ) -> Result<Option<Document>> {
        require_operators(update)?;
        let result = self
            .mutate(collection, options.upsert, |c| {
                c.find_and_modify(filter, update, options)
            })
            .await?;
        Ok(result.flatten())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.ensure_open()?;
        Self::check_name(collection)?;
        // The catalog stays locked until the snapshot is gone, so no writer
        // can recreate the collection and have its new snapshot deleted.
        let mut collections = self.collections.write().await;
        if let Some(handle) = collections.remove(collection) {
            handle.write().await.mark_dropped();
        }
        if let Some(snapshots) = &self.snapshots {
            snapshots.delete(collection)?;
        }
        Ok(())
    }
}
