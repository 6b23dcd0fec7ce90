// ============================================================================
// batchstore Library
// ============================================================================

pub mod config;
pub mod core;
pub mod document;
pub mod execution;
pub mod sequence;
pub mod storage;

// Re-export main types for convenience
pub use config::RepositoryConfig;
pub use core::{BatchStatus, ExitStatus, Result, StoreError};
pub use document::{Document, DocumentStore, Filter, Update};
pub use execution::{DocumentStepExecutionDao, JobExecutionRef, StepExecution, StepExecutionDao};
pub use sequence::{NamedSequence, SequenceCounter, SequenceGenerator, SequenceStrategy};
pub use storage::{DurabilityMode, InMemoryDocumentStore};

use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Repository facade
// ============================================================================

/// Step execution repository wired from a `RepositoryConfig`
///
/// Owns the document store, seeds the step execution sequence and exposes
/// the DAO together with generators for any other sequence in the same
/// collection.
///
/// # Examples
///
/// ```
/// use batchstore::{BatchStore, JobExecutionRef, StepExecution, StepExecutionDao};
///
/// # #[tokio::main]
/// # async fn main() -> batchstore::Result<()> {
/// let repository = BatchStore::in_memory().await?;
/// let step = StepExecution::new("load", JobExecutionRef::new(1, 1));
///
/// let saved = repository.step_executions().save(&step).await?;
/// assert_eq!(saved.version(), Some(0));
/// # Ok(())
/// # }
/// ```
pub struct BatchStore {
    config: RepositoryConfig,
    store: Arc<InMemoryDocumentStore>,
    generator: Arc<dyn SequenceGenerator>,
    step_executions: DocumentStepExecutionDao,
}

impl BatchStore {
    /// Memory-only repository with default names
    pub async fn in_memory() -> Result<Self> {
        Self::open(RepositoryConfig::default()).await
    }

    /// Repository persisting under `dir`
    pub async fn open_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open(RepositoryConfig::default().data_dir(dir.as_ref())).await
    }

    /// Repository from a URL such as `batchstore://batch?path=/var/lib/batch`
    pub async fn open_url(url: &str) -> Result<Self> {
        let config = RepositoryConfig::from_url(url).map_err(StoreError::InvalidArgument)?;
        Self::open(config).await
    }

    pub async fn open(config: RepositoryConfig) -> Result<Self> {
        config.validate().map_err(StoreError::InvalidArgument)?;

        let store = Arc::new(match &config.data_dir {
            Some(dir) => InMemoryDocumentStore::open(dir)?,
            None => InMemoryDocumentStore::new(),
        });

        sequence::seed_sequence(
            store.as_ref(),
            &config.sequence_collection,
            &config.step_execution_sequence,
            0,
            sequence::DEFAULT_NOTE,
        )
        .await?;

        let generator = config
            .sequence_strategy
            .generator(store.clone(), config.sequence_collection.clone());
        let step_executions = DocumentStepExecutionDao::new(
            store.clone(),
            NamedSequence::new(generator.clone(), config.step_execution_sequence.clone()),
        )
        .collection(config.step_execution_collection.clone())
        .max_exit_description_length(config.max_exit_description_length);

        log::debug!(
            "Opened repository '{}' ({} sequences, data dir {:?})",
            config.database,
            config.sequence_strategy,
            config.data_dir
        );

        Ok(Self {
            config,
            store,
            generator,
            step_executions,
        })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<InMemoryDocumentStore> {
        self.store.clone()
    }

    pub fn step_executions(&self) -> &DocumentStepExecutionDao {
        &self.step_executions
    }

    /// Generator for `name` in the configured sequence collection
    pub fn sequence(&self, name: &str) -> NamedSequence {
        NamedSequence::new(self.generator.clone(), name)
    }

    /// Create the counter for `name` unless it exists
    pub async fn seed_sequence(&self, name: &str, initial: i64, note: &str) -> Result<SequenceCounter> {
        sequence::seed_sequence(
            self.store.as_ref(),
            &self.config.sequence_collection,
            name,
            initial,
            note,
        )
        .await
    }

    /// Current counter for `name` without incrementing it
    pub async fn read_sequence(&self, name: &str) -> Result<SequenceCounter> {
        sequence::read_counter(self.store.as_ref(), &self.config.sequence_collection, name).await
    }

    /// Fail every later request with `StoreUnavailable`
    pub fn close(&self) {
        self.store.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_seeds_step_sequence() {
        let repository = BatchStore::in_memory().await.unwrap();
        let counter = repository.read_sequence("STEP_EXECUTION_SEQ").await.unwrap();
        assert_eq!(counter.value, 0);
        assert_eq!(
            repository.sequence("STEP_EXECUTION_SEQ").next_long().await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let config = RepositoryConfig::default().max_exit_description_length(0);
        assert!(matches!(
            BatchStore::open(config).await,
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            BatchStore::open_url("http://batch").await,
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_reopen_keeps_sequence_position() {
        let dir = TempDir::new().unwrap();
        {
            let repository = BatchStore::open_dir(dir.path()).await.unwrap();
            let step = StepExecution::new("load", JobExecutionRef::new(1, 1));
            repository.step_executions().save(&step).await.unwrap();
        }

        let repository = BatchStore::open_dir(dir.path()).await.unwrap();
        let step = StepExecution::new("load", JobExecutionRef::new(1, 1));
        let saved = repository.step_executions().save(&step).await.unwrap();
        assert_eq!(saved.id(), Some(2));
    }

    #[tokio::test]
    async fn test_closed_repository_is_unavailable() {
        let repository = BatchStore::in_memory().await.unwrap();
        repository.close();
        let step = StepExecution::new("load", JobExecutionRef::new(1, 1));
        assert!(matches!(
            repository.step_executions().save(&step).await,
            Err(StoreError::StoreUnavailable(_))
        ));
    }
}
