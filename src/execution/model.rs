use crate::core::{BatchStatus, ExitStatus, Result, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest value any step execution counter may hold.
pub const MAX_COUNTER: u32 = i32::MAX as u32;

/// Identity of the job execution a step belongs to, and of that execution's
/// job instance. Held by value; the store never resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobExecutionRef {
    pub id: i64,
    pub job_instance_id: i64,
}

impl JobExecutionRef {
    pub fn new(id: i64, job_instance_id: i64) -> Self {
        Self {
            id,
            job_instance_id,
        }
    }
}

/// State of one step's execution within a job run.
///
/// `name`, `start_time` and `status` are required before the record can be
/// persisted; they are optional here so that incomplete records coming from
/// the engine are reported instead of being unrepresentable.
///
/// `id` and `version` are owned by the store: both are absent until the first
/// save, and every persisted transition hands back a new value rather than
/// touching the caller's copy.
#[derive(Debug, Clone, PartialEq)]
pub struct StepExecution {
    id: Option<i64>,
    version: Option<i32>,
    pub name: Option<String>,
    pub job_execution: JobExecutionRef,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<BatchStatus>,
    pub exit_status: ExitStatus,
    pub read_count: u32,
    pub write_count: u32,
    pub filter_count: u32,
    pub commit_count: u32,
    pub rollback_count: u32,
    pub read_skip_count: u32,
    pub write_skip_count: u32,
    pub process_skip_count: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

impl StepExecution {
    /// A fresh, unsaved step execution started now.
    pub fn new(name: impl Into<String>, job_execution: JobExecutionRef) -> Self {
        Self {
            id: None,
            version: None,
            name: Some(name.into()),
            job_execution,
            start_time: Some(Utc::now()),
            end_time: None,
            status: Some(BatchStatus::Starting),
            exit_status: ExitStatus::executing(),
            read_count: 0,
            write_count: 0,
            filter_count: 0,
            commit_count: 0,
            rollback_count: 0,
            read_skip_count: 0,
            write_skip_count: 0,
            process_skip_count: 0,
            last_updated: None,
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn version(&self) -> Option<i32> {
        self.version
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn job_execution_id(&self) -> i64 {
        self.job_execution.id
    }

    pub fn job_instance_id(&self) -> i64 {
        self.job_execution.job_instance_id
    }

    /// Skips across read, process and write.
    pub fn skip_count(&self) -> u64 {
        u64::from(self.read_skip_count)
            + u64::from(self.write_skip_count)
            + u64::from(self.process_skip_count)
    }

    fn counters(&self) -> [(&'static str, u32); 8] {
        [
            ("read count", self.read_count),
            ("write count", self.write_count),
            ("filter count", self.filter_count),
            ("commit count", self.commit_count),
            ("rollback count", self.rollback_count),
            ("read skip count", self.read_skip_count),
            ("write skip count", self.write_skip_count),
            ("process skip count", self.process_skip_count),
        ]
    }

    /// Check the fields every persisted record must carry.
    ///
    /// End time may be absent for a step that is still running.
    pub fn validate(&self) -> Result<()> {
        self.required().map(|_| ())
    }

    pub(crate) fn required(&self) -> Result<(&str, DateTime<Utc>, BatchStatus)> {
        let name = self.name.as_deref().ok_or_else(|| {
            StoreError::InvalidArgument("StepExecution step name cannot be null.".into())
        })?;
        let start_time = self.start_time.ok_or_else(|| {
            StoreError::InvalidArgument("StepExecution start time cannot be null.".into())
        })?;
        let status = self.status.ok_or_else(|| {
            StoreError::InvalidArgument("StepExecution status cannot be null.".into())
        })?;
        // Counters are stored as 32-bit signed integers.
        if let Some((counter, value)) = self
            .counters()
            .into_iter()
            .find(|(_, value)| *value > MAX_COUNTER)
        {
            return Err(StoreError::InvalidArgument(format!(
                "StepExecution {} {} exceeds the maximum of {}.",
                counter, value, MAX_COUNTER
            )));
        }
        Ok((name, start_time, status))
    }
}
