//! Atomic sequence generation
//!
//! - `counter.rs` - counter document layout and seeding helpers
//! - `generator.rs` - the `SequenceGenerator` trait and its two strategies

mod counter;
mod generator;

pub use counter::{DEFAULT_NOTE, SequenceCounter, read_counter, seed_sequence};
pub use generator::{AtomicIncrementSequence, CompareAndSwapSequence, SequenceGenerator};

use crate::core::{Result, StoreError};
use crate::document::DocumentStore;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How a generator turns the counter document into the next value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceStrategy {
    /// One atomic increment-and-fetch request.
    #[default]
    AtomicIncrement,
    /// Read, then conditional write, repeated until the write wins.
    CompareAndSwap,
}

impl SequenceStrategy {
    pub fn generator(
        self,
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
    ) -> Arc<dyn SequenceGenerator> {
        match self {
            SequenceStrategy::AtomicIncrement => {
                Arc::new(AtomicIncrementSequence::new(store, collection))
            }
            SequenceStrategy::CompareAndSwap => {
                Arc::new(CompareAndSwapSequence::new(store, collection))
            }
        }
    }
}

impl fmt::Display for SequenceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceStrategy::AtomicIncrement => f.write_str("atomic-increment"),
            SequenceStrategy::CompareAndSwap => f.write_str("compare-and-swap"),
        }
    }
}

impl FromStr for SequenceStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "atomic-increment" | "inc" => Ok(SequenceStrategy::AtomicIncrement),
            "compare-and-swap" | "cas" => Ok(SequenceStrategy::CompareAndSwap),
            other => Err(format!("Unknown sequence strategy '{}'", other)),
        }
    }
}

/// A generator bound to one sequence name, handing out ids for one kind of
/// record.
#[derive(Clone)]
pub struct NamedSequence {
    generator: Arc<dyn SequenceGenerator>,
    name: String,
}

impl NamedSequence {
    pub fn new(generator: Arc<dyn SequenceGenerator>, name: impl Into<String>) -> Self {
        Self {
            generator,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn next_long(&self) -> Result<i64> {
        self.generator.next(&self.name).await
    }

    /// Next value as a 32-bit id. A value past `i32::MAX` is consumed but
    /// reported as `InvalidArgument`.
    pub async fn next_int(&self) -> Result<i32> {
        let value = self.next_long().await?;
        i32::try_from(value).map_err(|_| {
            StoreError::InvalidArgument(format!(
                "Sequence '{}' value {} does not fit in 32 bits",
                self.name, value
            ))
        })
    }

    pub async fn next_string(&self) -> Result<String> {
        Ok(self.next_long().await?.to_string())
    }
}

impl fmt::Debug for NamedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedSequence")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryDocumentStore;

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "cas".parse::<SequenceStrategy>().unwrap(),
            SequenceStrategy::CompareAndSwap
        );
        assert_eq!(
            SequenceStrategy::AtomicIncrement
                .to_string()
                .parse::<SequenceStrategy>()
                .unwrap(),
            SequenceStrategy::AtomicIncrement
        );
        assert!("lock".parse::<SequenceStrategy>().is_err());
    }

    #[tokio::test]
    async fn test_named_sequence() {
        let store = Arc::new(InMemoryDocumentStore::new());
        seed_sequence(store.as_ref(), "BATCH_SEQUENCES", "STEP_EXECUTION_SEQ", 9, DEFAULT_NOTE)
            .await
            .unwrap();

        for strategy in [SequenceStrategy::AtomicIncrement, SequenceStrategy::CompareAndSwap] {
            let generator = strategy.generator(store.clone(), "BATCH_SEQUENCES");
            let sequence = NamedSequence::new(generator, "STEP_EXECUTION_SEQ");
            assert_eq!(sequence.name(), "STEP_EXECUTION_SEQ");
            let first = sequence.next_long().await.unwrap();
            let second = sequence.next_string().await.unwrap();
            assert_eq!(second, (first + 1).to_string());
        }

        let counter = read_counter(store.as_ref(), "BATCH_SEQUENCES", "STEP_EXECUTION_SEQ")
            .await
            .unwrap();
        assert_eq!(counter.value, 13);
    }

    #[tokio::test]
    async fn test_next_int_stops_at_i32_max() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let start = i64::from(i32::MAX) - 1;
        seed_sequence(store.as_ref(), "BATCH_SEQUENCES", "JOB_SEQ", start, DEFAULT_NOTE)
            .await
            .unwrap();
        let generator = SequenceStrategy::AtomicIncrement.generator(store, "BATCH_SEQUENCES");
        let sequence = NamedSequence::new(generator, "JOB_SEQ");

        assert_eq!(sequence.next_int().await.unwrap(), i32::MAX);
        let err = sequence.next_int().await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert!(err.to_string().contains("2147483648"), "{}", err);
    }
}
