use super::{Document, Filter, Update};
use crate::core::Result;
use async_trait::async_trait;

/// Outcome of a conditional update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Documents the filter selected (at most one for `update_first`).
    pub matched: u64,
    /// Documents whose content actually changed.
    pub modified: u64,
}

/// Options for [`DocumentStore::find_and_modify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindAndModifyOptions {
    /// Return the document as it is after the update instead of before it.
    pub return_new: bool,
    /// Create the document when nothing matches.
    pub upsert: bool,
}

impl FindAndModifyOptions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn return_new(mut self, return_new: bool) -> Self {
        self.return_new = return_new;
        self
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

/// Primitives of a document-oriented store.
///
/// Implementations must execute `update_first` and `find_and_modify` as one
/// indivisible match-and-write: no other write to the same collection may
/// interleave between selecting the document and mutating it. The sequence
/// generator and the optimistic step-execution updates depend on nothing else.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert one document. Its `id` must not exist yet.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<()>;

    /// Ordered bulk insert: stops at the first failing document and reports
    /// how many were written before it.
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize>;

    /// All matching documents in insertion order.
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Atomically apply `update` to the first document matching `filter`.
    async fn update_first(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult>;

    /// Atomically apply `update` to the first matching document and return it,
    /// before or after the change depending on `options`.
    ///
    /// Returns `None` when nothing matched and no upsert was requested.
    async fn find_and_modify(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: FindAndModifyOptions,
    ) -> Result<Option<Document>>;

    async fn drop_collection(&self, collection: &str) -> Result<()>;
}
