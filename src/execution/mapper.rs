use super::model::{JobExecutionRef, StepExecution};
use crate::core::{BatchStatus, ExitStatus, Result, StoreError};
use crate::document::{self, Document, Update};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

/// Fields rewritten by every version-checked update. Name and parent ids
/// are fixed at insert time.
pub const MUTABLE_FIELDS: [&str; 15] = [
    "version",
    "startTime",
    "endTime",
    "status",
    "commitCount",
    "readCount",
    "filterCount",
    "writeCount",
    "exitCode",
    "exitDescription",
    "readSkipCount",
    "writeSkipCount",
    "processSkipCount",
    "rollbackCount",
    "lastUpdated",
];

/// Flat persistence shape of a step execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecutionDocument {
    pub id: i64,
    pub version: i32,
    pub name: String,
    pub parent_execution_id: i64,
    pub parent_instance_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: BatchStatus,
    pub commit_count: u32,
    pub read_count: u32,
    pub filter_count: u32,
    pub write_count: u32,
    pub exit_code: String,
    pub exit_description: String,
    pub read_skip_count: u32,
    pub write_skip_count: u32,
    pub process_skip_count: u32,
    pub rollback_count: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Cut `description` down to `max_len` characters.
pub fn truncate_exit_description(description: &str, max_len: usize) -> String {
    match description.char_indices().nth(max_len) {
        Some((cut, _)) => {
            debug!(
                "Truncating long message before persisting StepExecution, original message is: {}",
                description
            );
            description[..cut].to_string()
        }
        None => description.to_string(),
    }
}

impl StepExecutionDocument {
    /// Persistence shape of an identified step execution.
    ///
    /// Copies every attribute and truncates the exit description; the input
    /// is left as it is.
    pub fn from_execution(execution: &StepExecution, max_exit_description_length: usize) -> Result<Self> {
        let (name, start_time, status) = execution.required()?;
        let (Some(id), Some(version)) = (execution.id(), execution.version()) else {
            return Err(StoreError::InvalidArgument(
                "StepExecution must have an id and a version before it can be persisted".into(),
            ));
        };

        Ok(Self {
            id,
            version,
            name: name.to_string(),
            parent_execution_id: execution.job_execution.id,
            parent_instance_id: execution.job_execution.job_instance_id,
            start_time,
            end_time: execution.end_time,
            status,
            commit_count: execution.commit_count,
            read_count: execution.read_count,
            filter_count: execution.filter_count,
            write_count: execution.write_count,
            exit_code: execution.exit_status.exit_code.clone(),
            exit_description: truncate_exit_description(
                &execution.exit_status.exit_description,
                max_exit_description_length,
            ),
            read_skip_count: execution.read_skip_count,
            write_skip_count: execution.write_skip_count,
            process_skip_count: execution.process_skip_count,
            rollback_count: execution.rollback_count,
            last_updated: execution.last_updated,
        })
    }

    /// Business record attached to the caller's job execution.
    pub fn into_execution(self, job_execution: JobExecutionRef) -> StepExecution {
        let mut execution = StepExecution::new(self.name, job_execution)
            .with_id(self.id)
            .with_version(self.version);
        execution.start_time = Some(self.start_time);
        execution.end_time = self.end_time;
        execution.status = Some(self.status);
        execution.exit_status = ExitStatus::new(self.exit_code, self.exit_description);
        execution.commit_count = self.commit_count;
        execution.read_count = self.read_count;
        execution.filter_count = self.filter_count;
        execution.write_count = self.write_count;
        execution.read_skip_count = self.read_skip_count;
        execution.write_skip_count = self.write_skip_count;
        execution.process_skip_count = self.process_skip_count;
        execution.rollback_count = self.rollback_count;
        execution.last_updated = self.last_updated;
        execution
    }

    /// The parent identifiers stored alongside the record.
    pub fn job_execution(&self) -> JobExecutionRef {
        JobExecutionRef::new(self.parent_execution_id, self.parent_instance_id)
    }

    pub fn to_document(&self) -> Result<Document> {
        document::to_document(self)
    }

    pub fn from_document(document: Document) -> Result<Self> {
        document::from_document(document)
    }

    /// `$set` of every mutable field, version included.
    pub fn update(&self) -> Result<Update> {
        let mut fields = self.to_document()?;
        Ok(MUTABLE_FIELDS.iter().fold(Update::new(), |update, field| {
            let value = fields.remove(*field).unwrap_or_default();
            update.set(*field, value)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn step() -> StepExecution {
        let mut step = StepExecution::new("load", JobExecutionRef::new(7, 2))
            .with_id(11)
            .with_version(3);
        step.start_time = Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        step.status = Some(BatchStatus::Started);
        step.read_count = 40;
        step.write_count = 38;
        step.filter_count = 2;
        step.commit_count = 4;
        step.exit_status = ExitStatus::executing().with_description("chunk 4");
        step
    }

    #[test]
    fn test_roundtrip_preserves_every_attribute() {
        let original = step();
        let document = StepExecutionDocument::from_execution(&original, 2500).unwrap();
        let restored = document.into_execution(original.job_execution);
        assert_eq!(restored, original);
    }

    #[test]
    fn test_flat_layout_uses_camel_case() {
        let document = StepExecutionDocument::from_execution(&step(), 2500)
            .unwrap()
            .to_document()
            .unwrap();
        assert_eq!(document.get("id"), Some(&json!(11)));
        assert_eq!(document.get("parentExecutionId"), Some(&json!(7)));
        assert_eq!(document.get("parentInstanceId"), Some(&json!(2)));
        assert_eq!(document.get("status"), Some(&json!("STARTED")));
        assert_eq!(document.get("endTime"), Some(&serde_json::Value::Null));
        assert_eq!(document.get("startTime"), Some(&json!("2024-03-01T12:00:00Z")));
        assert_eq!(document.len(), 19);
    }

    #[test]
    fn test_truncation_counts_characters() {
        assert_eq!(truncate_exit_description("abcdef", 3), "abc");
        assert_eq!(truncate_exit_description("abc", 3), "abc");
        assert_eq!(truncate_exit_description("ééé", 2), "éé");
        assert_eq!(truncate_exit_description("", 0), "");
    }

    #[test]
    fn test_mapping_does_not_mutate_input() {
        let mut original = step();
        original.exit_status = ExitStatus::failed().with_description("x".repeat(3000));
        let document = StepExecutionDocument::from_execution(&original, 2500).unwrap();
        assert_eq!(document.exit_description.chars().count(), 2500);
        assert_eq!(original.exit_status.exit_description.len(), 3000);
    }

    #[test]
    fn test_unidentified_record_cannot_be_mapped() {
        let unsaved = StepExecution::new("load", JobExecutionRef::new(1, 1));
        assert!(matches!(
            StepExecutionDocument::from_execution(&unsaved, 2500),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_update_covers_mutable_fields_only() {
        let document = StepExecutionDocument::from_execution(&step(), 2500).unwrap();
        let mut stored = document.to_document().unwrap();
        stored.insert("name".into(), json!("renamed elsewhere"));

        let mut next = step().with_version(4);
        next.end_time = Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).unwrap());
        next.status = Some(BatchStatus::Completed);
        let update = StepExecutionDocument::from_execution(&next, 2500)
            .unwrap()
            .update()
            .unwrap();
        update.apply(&mut stored).unwrap();

        assert_eq!(stored.get("version"), Some(&json!(4)));
        assert_eq!(stored.get("status"), Some(&json!("COMPLETED")));
        assert_eq!(stored.get("endTime"), Some(&json!("2024-03-01T12:05:00Z")));
        assert_eq!(stored.get("name"), Some(&json!("renamed elsewhere")));
    }

    #[test]
    fn test_corrupt_document_is_a_serialization_error() {
        let mut document = StepExecutionDocument::from_execution(&step(), 2500)
            .unwrap()
            .to_document()
            .unwrap();
        document.insert("status".into(), json!("RUNNING"));
        assert!(matches!(
            StepExecutionDocument::from_document(document),
            Err(StoreError::Serialization(_))
        ));
    }
}
