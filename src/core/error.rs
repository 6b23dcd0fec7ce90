use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "Attempt to update step execution id={id} with wrong version ({expected}), where current version is {actual}"
    )]
    OptimisticLockConflict { id: i64, expected: i32, actual: i32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Expected at most one record for {key}, found {found}")]
    MultipleRecordsFound { key: String, found: usize },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Duplicate key '{key}' in collection '{collection}'")]
    DuplicateKey { collection: String, key: String },

    #[error("Bulk write failed after {inserted} documents: {source}")]
    BulkWrite {
        inserted: usize,
        #[source]
        source: Box<StoreError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Whether the caller may reasonably retry the failed operation.
    ///
    /// Conflicts are retried after re-reading the record, unavailability with
    /// backoff. Nothing in this crate retries on the caller's behalf.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OptimisticLockConflict { .. } | Self::StoreUnavailable(_)
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_carries_both_versions() {
        let err = StoreError::OptimisticLockConflict {
            id: 7,
            expected: 0,
            actual: 1,
        };
        let message = err.to_string();
        assert!(message.contains("id=7"));
        assert!(message.contains("wrong version (0)"));
        assert!(message.contains("current version is 1"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(
            StoreError::OptimisticLockConflict {
                id: 1,
                expected: 0,
                actual: 1
            }
            .is_retryable()
        );
        assert!(StoreError::StoreUnavailable("closed".into()).is_retryable());
        assert!(!StoreError::InvalidArgument("name".into()).is_retryable());
        assert!(!StoreError::NotFound("step 1".into()).is_retryable());
    }

    #[test]
    fn test_io_error_maps_to_unavailable() {
        let err: StoreError = std::io::Error::other("disk gone").into();
        assert!(matches!(err, StoreError::StoreUnavailable(_)));
    }
}
