use crate::execution::{DEFAULT_EXIT_DESCRIPTION_LENGTH, DEFAULT_STEP_EXECUTION_COLLECTION};
use crate::sequence::SequenceStrategy;
use std::path::PathBuf;

pub const DEFAULT_SEQUENCE_COLLECTION: &str = "BATCH_SEQUENCES";
pub const DEFAULT_STEP_EXECUTION_SEQUENCE: &str = "STEP_EXECUTION_SEQ";

const URL_SCHEME: &str = "batchstore://";

/// Repository configuration
///
/// Collection and sequence names default to the ones batch job repositories
/// use, so existing data can be shared.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryConfig {
    /// Logical database name
    pub database: String,

    /// Collection holding step execution documents
    pub step_execution_collection: String,

    /// Collection holding sequence counters
    pub sequence_collection: String,

    /// Sequence allocating step execution ids
    pub step_execution_sequence: String,

    /// Exit descriptions are cut to this many characters
    pub max_exit_description_length: usize,

    pub sequence_strategy: SequenceStrategy,

    /// Snapshot directory; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
}

impl RepositoryConfig {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            step_execution_collection: DEFAULT_STEP_EXECUTION_COLLECTION.to_string(),
            sequence_collection: DEFAULT_SEQUENCE_COLLECTION.to_string(),
            step_execution_sequence: DEFAULT_STEP_EXECUTION_SEQUENCE.to_string(),
            max_exit_description_length: DEFAULT_EXIT_DESCRIPTION_LENGTH,
            sequence_strategy: SequenceStrategy::default(),
            data_dir: None,
        }
    }

    pub fn step_execution_collection(mut self, collection: &str) -> Self {
        self.step_execution_collection = collection.to_string();
        self
    }

    pub fn sequence_collection(mut self, collection: &str) -> Self {
        self.sequence_collection = collection.to_string();
        self
    }

    pub fn step_execution_sequence(mut self, sequence: &str) -> Self {
        self.step_execution_sequence = sequence.to_string();
        self
    }

    pub fn max_exit_description_length(mut self, max_len: usize) -> Self {
        self.max_exit_description_length = max_len;
        self
    }

    pub fn sequence_strategy(mut self, strategy: SequenceStrategy) -> Self {
        self.sequence_strategy = strategy;
        self
    }

    /// Persist collections as snapshots under `dir`
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Parse from a repository URL
    ///
    /// Format: "batchstore://database[?path=dir][&strategy=cas]"
    ///
    /// ```ignore
    /// let config = RepositoryConfig::from_url("batchstore://batch?path=/var/lib/batch")?;
    /// ```
    pub fn from_url(url: &str) -> Result<Self, String> {
        let Some(rest) = url.strip_prefix(URL_SCHEME) else {
            return Err(format!("URL must start with '{}'", URL_SCHEME));
        };

        let (database, query) = match rest.split_once('?') {
            Some((database, query)) => (database, Some(query)),
            None => (rest, None),
        };
        if database.is_empty() || database.contains('/') {
            return Err("Invalid database name".to_string());
        }

        let mut config = Self::new(database);
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            match pair.split_once('=') {
                Some(("path", dir)) if !dir.is_empty() => config = config.data_dir(dir),
                Some(("strategy", strategy)) => {
                    config = config.sequence_strategy(strategy.parse()?);
                }
                _ => return Err(format!("Invalid URL parameter '{}'", pair)),
            }
        }

        Ok(config)
    }

    pub fn to_url(&self) -> String {
        let mut url = format!("{}{}?strategy={}", URL_SCHEME, self.database, self.sequence_strategy);
        if let Some(dir) = &self.data_dir {
            url.push_str(&format!("&path={}", dir.display()));
        }
        url
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.database.is_empty() {
            return Err("Database name cannot be empty".to_string());
        }

        for (what, name) in [
            ("step_execution_collection", &self.step_execution_collection),
            ("sequence_collection", &self.sequence_collection),
            ("step_execution_sequence", &self.step_execution_sequence),
        ] {
            if name.trim().is_empty() {
                return Err(format!("{} cannot be empty", what));
            }
        }

        if self.step_execution_collection == self.sequence_collection {
            return Err("Step executions and sequences must use different collections".to_string());
        }

        if self.max_exit_description_length == 0 {
            return Err("max_exit_description_length must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self::new("batch")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RepositoryConfig::default();
        assert_eq!(config.step_execution_collection, "BATCH_STEP_EXECUTION");
        assert_eq!(config.sequence_collection, "BATCH_SEQUENCES");
        assert_eq!(config.step_execution_sequence, "STEP_EXECUTION_SEQ");
        assert_eq!(config.max_exit_description_length, 2500);
        assert_eq!(config.sequence_strategy, SequenceStrategy::AtomicIncrement);
        assert!(config.data_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = RepositoryConfig::new("jobs")
            .step_execution_collection("STEPS")
            .sequence_collection("SEQS")
            .max_exit_description_length(100)
            .sequence_strategy(SequenceStrategy::CompareAndSwap)
            .data_dir("/tmp/jobs");

        assert_eq!(config.database, "jobs");
        assert_eq!(config.step_execution_collection, "STEPS");
        assert_eq!(config.sequence_collection, "SEQS");
        assert_eq!(config.max_exit_description_length, 100);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/jobs")));
    }

    #[test]
    fn test_from_url() {
        let config = RepositoryConfig::from_url("batchstore://prod?path=/var/batch&strategy=cas")
            .unwrap();
        assert_eq!(config.database, "prod");
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/batch")));
        assert_eq!(config.sequence_strategy, SequenceStrategy::CompareAndSwap);

        let roundtrip = RepositoryConfig::from_url(&config.to_url()).unwrap();
        assert_eq!(roundtrip, config);
    }

    #[test]
    fn test_from_url_memory_only() {
        let config = RepositoryConfig::from_url("batchstore://batch").unwrap();
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_invalid_url() {
        assert!(RepositoryConfig::from_url("mongodb://batch").is_err());
        assert!(RepositoryConfig::from_url("batchstore://").is_err());
        assert!(RepositoryConfig::from_url("batchstore://batch?mode=fast").is_err());
        assert!(RepositoryConfig::from_url("batchstore://batch?strategy=lock").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(RepositoryConfig::new("").validate().is_err());
        assert!(
            RepositoryConfig::default()
                .max_exit_description_length(0)
                .validate()
                .is_err()
        );
        assert!(
            RepositoryConfig::default()
                .sequence_collection(" ")
                .validate()
                .is_err()
        );
        assert!(
            RepositoryConfig::default()
                .sequence_collection("BATCH_STEP_EXECUTION")
                .validate()
                .is_err()
        );
    }
}
