use super::mapper::StepExecutionDocument;
use super::model::{JobExecutionRef, StepExecution};
use crate::core::{Result, StoreError};
use crate::document::{Document, DocumentStore, Filter, ID_FIELD};
use crate::sequence::NamedSequence;
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use tracing::{Instrument, info_span};

pub const DEFAULT_STEP_EXECUTION_COLLECTION: &str = "BATCH_STEP_EXECUTION";
pub const DEFAULT_EXIT_DESCRIPTION_LENGTH: usize = 2500;

const VERSION_FIELD: &str = "version";
const NAME_FIELD: &str = "name";
const PARENT_EXECUTION_FIELD: &str = "parentExecutionId";
const PARENT_INSTANCE_FIELD: &str = "parentInstanceId";

/// Persistence of step executions with optimistic concurrency control.
///
/// Inputs are never modified: `save` and `update` return the persisted
/// successor carrying the store-assigned id and version.
#[async_trait]
pub trait StepExecutionDao: Send + Sync {
    /// Persist a new step execution at version 0 under a freshly allocated id.
    async fn save(&self, execution: &StepExecution) -> Result<StepExecution>;

    /// Persist a batch of new step executions with one bulk write.
    ///
    /// `None` is rejected; an empty batch performs no store request.
    async fn save_all(&self, executions: Option<Vec<StepExecution>>) -> Result<Vec<StepExecution>>;

    /// Write every mutable field if the stored version still equals the
    /// caller's version, bumping it by one.
    async fn update(&self, execution: &StepExecution) -> Result<StepExecution>;

    /// The step execution with `step_execution_id` under `job_execution`.
    async fn get(
        &self,
        job_execution: &JobExecutionRef,
        step_execution_id: i64,
    ) -> Result<StepExecution>;

    /// Every step execution of a job run, ordered by id.
    async fn find_by_job_execution(
        &self,
        job_execution: &JobExecutionRef,
    ) -> Result<Vec<StepExecution>>;

    /// The most recently started execution of `step_name` across every run of
    /// a job instance.
    ///
    /// The selection is provisional and may change: latest `start_time` wins,
    /// and ties go to the highest id.
    async fn get_last(&self, job_instance_id: i64, step_name: &str)
    -> Result<Option<StepExecution>>;

    /// Number of executions of `step_name` across every run of a job instance.
    ///
    /// Provisional, like `get_last`: it counts the same candidate set.
    async fn count(&self, job_instance_id: i64, step_name: &str) -> Result<u64>;
}

/// `StepExecutionDao` over any `DocumentStore`.
pub struct DocumentStepExecutionDao {
    store: Arc<dyn DocumentStore>,
    sequence: NamedSequence,
    collection: String,
    max_exit_description_length: usize,
}

impl DocumentStepExecutionDao {
    pub fn new(store: Arc<dyn DocumentStore>, sequence: NamedSequence) -> Self {
        Self {
            store,
            sequence,
            collection: DEFAULT_STEP_EXECUTION_COLLECTION.to_string(),
            max_exit_description_length: DEFAULT_EXIT_DESCRIPTION_LENGTH,
        }
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn max_exit_description_length(mut self, max_len: usize) -> Self {
        self.max_exit_description_length = max_len;
        self
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Validate an unsaved record and give it the next id at version 0.
    async fn identify(&self, execution: &StepExecution) -> Result<StepExecution> {
        execution.validate()?;
        if execution.id().is_some() {
            return Err(StoreError::InvalidArgument(
                "to-be-saved (not updated) StepExecution can't already have an id assigned".into(),
            ));
        }
        if execution.version().is_some() {
            return Err(StoreError::InvalidArgument(
                "to-be-saved (not updated) StepExecution can't already have a version assigned"
                    .into(),
            ));
        }

        let id = self.sequence.next_long().await?;
        Ok(execution.clone().with_id(id).with_version(0))
    }

    fn to_document(&self, execution: &StepExecution) -> Result<Document> {
        StepExecutionDocument::from_execution(execution, self.max_exit_description_length)?
            .to_document()
    }

    async fn insert_new(&self, execution: &StepExecution) -> Result<StepExecution> {
        let saved = self.identify(execution).await?;
        let document = self.to_document(&saved)?;
        self.store.insert_one(&self.collection, document).await?;
        debug!(
            "Saved step execution id={:?} for job execution {}",
            saved.id(),
            saved.job_execution.id
        );
        Ok(saved)
    }

    async fn insert_batch(&self, executions: &[StepExecution]) -> Result<Vec<StepExecution>> {
        let mut saved = Vec::with_capacity(executions.len());
        let mut documents = Vec::with_capacity(executions.len());
        for execution in executions {
            let identified = self.identify(execution).await?;
            documents.push(self.to_document(&identified)?);
            saved.push(identified);
        }

        let inserted = self.store.insert_many(&self.collection, documents).await?;
        debug!("Saved {} step executions", inserted);
        Ok(saved)
    }

    async fn write_update(
        &self,
        execution: &StepExecution,
        id: i64,
        version: i32,
        next_version: i32,
    ) -> Result<StepExecution> {
        let successor = execution.clone().with_version(next_version);
        let update =
            StepExecutionDocument::from_execution(&successor, self.max_exit_description_length)?
                .update()?;

        let result = self
            .store
            .update_first(
                &self.collection,
                &Filter::by_id(id).and(VERSION_FIELD, version),
                &update,
            )
            .await?;
        if result.matched == 0 {
            return Err(self.diagnose_stale_update(id, version).await);
        }
        Ok(successor)
    }

    /// Re-read after a zero-match update to tell a lost race from a vanished row.
    async fn diagnose_stale_update(&self, id: i64, expected: i32) -> StoreError {
        let current = match self.store.find_one(&self.collection, &Filter::by_id(id)).await {
            Ok(current) => current,
            Err(err) => return err,
        };
        let Some(current) = current else {
            warn!(
                "Step execution id={} disappeared while updating from version {}",
                id, expected
            );
            return StoreError::NotFound(format!("StepExecution with id={} not found", id));
        };

        match StepExecutionDocument::from_document(current) {
            Ok(stored) => {
                warn!(
                    "Optimistic lock conflict on step execution id={}: expected version {}, found {}",
                    id, expected, stored.version
                );
                StoreError::OptimisticLockConflict {
                    id,
                    expected,
                    actual: stored.version,
                }
            }
            Err(err) => err,
        }
    }

    async fn find_documents(&self, filter: &Filter) -> Result<Vec<StepExecutionDocument>> {
        self.store
            .find(&self.collection, filter)
            .await?
            .into_iter()
            .map(StepExecutionDocument::from_document)
            .collect()
    }

    fn instance_step_filter(job_instance_id: i64, step_name: &str) -> Filter {
        Filter::eq(PARENT_INSTANCE_FIELD, job_instance_id).and(NAME_FIELD, step_name)
    }
}

#[async_trait]
impl StepExecutionDao for DocumentStepExecutionDao {
    async fn save(&self, execution: &StepExecution) -> Result<StepExecution> {
        let span = info_span!(
            "step_execution.save",
            step = execution.name.as_deref().unwrap_or_default(),
            job_execution_id = execution.job_execution.id
        );
        self.insert_new(execution).instrument(span).await
    }

    async fn save_all(&self, executions: Option<Vec<StepExecution>>) -> Result<Vec<StepExecution>> {
        let executions = executions.ok_or_else(|| {
            StoreError::InvalidArgument(
                "Attempt to save a null collection of step executions".into(),
            )
        })?;
        if executions.is_empty() {
            return Ok(Vec::new());
        }

        let span = info_span!("step_execution.save_all", count = executions.len());
        self.insert_batch(&executions).instrument(span).await
    }

    async fn update(&self, execution: &StepExecution) -> Result<StepExecution> {
        execution.validate()?;
        let id = execution.id().ok_or_else(|| {
            StoreError::InvalidArgument(
                "StepExecution Id cannot be null. StepExecution must saved before it can be updated."
                    .into(),
            )
        })?;
        let version = execution.version().ok_or_else(|| {
            StoreError::InvalidArgument(
                "StepExecution version cannot be null. StepExecution must saved before it can be updated."
                    .into(),
            )
        })?;
        let next_version = version.checked_add(1).ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "StepExecution id={} cannot advance past version {}",
                id, version
            ))
        })?;

        let span = info_span!("step_execution.update", id, version);
        self.write_update(execution, id, version, next_version)
            .instrument(span)
            .await
    }

    async fn get(
        &self,
        job_execution: &JobExecutionRef,
        step_execution_id: i64,
    ) -> Result<StepExecution> {
        let filter = Filter::by_id(step_execution_id).and(PARENT_EXECUTION_FIELD, job_execution.id);
        let mut documents = self.find_documents(&filter).await?;
        match documents.len() {
            0 => Err(StoreError::NotFound(format!(
                "StepExecution with id={} not found for job execution {}",
                step_execution_id, job_execution.id
            ))),
            1 => Ok(documents.remove(0).into_execution(*job_execution)),
            found => Err(StoreError::MultipleRecordsFound {
                key: format!(
                    "{}={}, {}={}",
                    ID_FIELD, step_execution_id, PARENT_EXECUTION_FIELD, job_execution.id
                ),
                found,
            }),
        }
    }

    async fn find_by_job_execution(
        &self,
        job_execution: &JobExecutionRef,
    ) -> Result<Vec<StepExecution>> {
        let mut documents = self
            .find_documents(&Filter::eq(PARENT_EXECUTION_FIELD, job_execution.id))
            .await?;
        documents.sort_by_key(|document| document.id);
        Ok(documents
            .into_iter()
            .map(|document| document.into_execution(*job_execution))
            .collect())
    }

    async fn get_last(
        &self,
        job_instance_id: i64,
        step_name: &str,
    ) -> Result<Option<StepExecution>> {
        let documents = self
            .find_documents(&Self::instance_step_filter(job_instance_id, step_name))
            .await?;
        Ok(documents
            .into_iter()
            .max_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)))
            .map(|document| {
                let job_execution = document.job_execution();
                document.into_execution(job_execution)
            }))
    }

    async fn count(&self, job_instance_id: i64, step_name: &str) -> Result<u64> {
        self.store
            .count(
                &self.collection,
                &Self::instance_step_filter(job_instance_id, step_name),
            )
            .await
    }
}
