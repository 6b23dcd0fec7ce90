use super::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a step or job execution.
///
/// Persisted by name (`"COMPLETED"`, `"FAILED"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Completed,
    Starting,
    Started,
    Stopping,
    Stopped,
    Failed,
    Abandoned,
    Unknown,
}

impl BatchStatus {
    pub const ALL: [BatchStatus; 8] = [
        BatchStatus::Completed,
        BatchStatus::Starting,
        BatchStatus::Started,
        BatchStatus::Stopping,
        BatchStatus::Stopped,
        BatchStatus::Failed,
        BatchStatus::Abandoned,
        BatchStatus::Unknown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Starting => "STARTING",
            BatchStatus::Started => "STARTED",
            BatchStatus::Stopping => "STOPPING",
            BatchStatus::Stopped => "STOPPED",
            BatchStatus::Failed => "FAILED",
            BatchStatus::Abandoned => "ABANDONED",
            BatchStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self,
            BatchStatus::Starting | BatchStatus::Started | BatchStatus::Stopping
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BatchStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        BatchStatus::ALL
            .into_iter()
            .find(|status| status.name() == s)
            .ok_or_else(|| StoreError::InvalidArgument(format!("Unknown batch status '{}'", s)))
    }
}

/// Exit code plus free-text description reported when a step finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub exit_code: String,
    pub exit_description: String,
}

impl ExitStatus {
    pub fn new(exit_code: impl Into<String>, exit_description: impl Into<String>) -> Self {
        Self {
            exit_code: exit_code.into(),
            exit_description: exit_description.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new("UNKNOWN", "")
    }

    pub fn executing() -> Self {
        Self::new("EXECUTING", "")
    }

    pub fn completed() -> Self {
        Self::new("COMPLETED", "")
    }

    pub fn noop() -> Self {
        Self::new("NOOP", "")
    }

    pub fn failed() -> Self {
        Self::new("FAILED", "")
    }

    pub fn stopped() -> Self {
        Self::new("STOPPED", "")
    }

    /// Same exit code, description replaced.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.exit_description = description.into();
        self
    }
}

impl Default for ExitStatus {
    fn default() -> Self {
        Self::executing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_name_roundtrip() {
        for status in BatchStatus::ALL {
            assert_eq!(status.name().parse::<BatchStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_serializes_by_name() {
        let json = serde_json::to_value(BatchStatus::Completed).unwrap();
        assert_eq!(json, serde_json::json!("COMPLETED"));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!("RUNNING".parse::<BatchStatus>().is_err());
    }

    #[test]
    fn test_running_statuses() {
        assert!(BatchStatus::Started.is_running());
        assert!(BatchStatus::Stopping.is_running());
        assert!(!BatchStatus::Completed.is_running());
        assert!(!BatchStatus::Failed.is_running());
    }

    #[test]
    fn test_exit_status_description() {
        let status = ExitStatus::failed().with_description("boom");
        assert_eq!(status.exit_code, "FAILED");
        assert_eq!(status.exit_description, "boom");
    }
}
