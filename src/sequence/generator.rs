use super::counter::{SequenceCounter, VALUE_FIELD, check_sequence_name, missing_counter};
use crate::core::{Result, StoreError};
use crate::document::{DocumentStore, Filter, FindAndModifyOptions, Update, from_document};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

/// Source of strictly increasing identifiers, one counter per sequence name.
///
/// For concurrent calls against one sequence every returned value is handed
/// to exactly one caller, without gaps. Different sequences are unrelated.
#[async_trait]
pub trait SequenceGenerator: Send + Sync {
    /// Increment the counter of `sequence_name` and return the new value.
    ///
    /// Fails with `NotFound` when the counter was never seeded.
    async fn next(&self, sequence_name: &str) -> Result<i64>;
}

/// Generator built on the store's native atomic increment
/// (`find_and_modify` with `$inc`, returning the post-image).
pub struct AtomicIncrementSequence {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl AtomicIncrementSequence {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl SequenceGenerator for AtomicIncrementSequence {
    async fn next(&self, sequence_name: &str) -> Result<i64> {
        check_sequence_name(sequence_name)?;
        let document = self
            .store
            .find_and_modify(
                &self.collection,
                &Filter::by_id(sequence_name),
                &Update::new().inc(VALUE_FIELD, 1),
                FindAndModifyOptions::none().return_new(true),
            )
            .await?
            .ok_or_else(|| missing_counter(&self.collection, sequence_name))?;
        let counter: SequenceCounter = from_document(document)?;
        Ok(counter.value)
    }
}

/// Generator for stores without a native increment: read the counter, then
/// write `value + 1` conditioned on the value just read, and start over when
/// another caller got there first.
pub struct CompareAndSwapSequence {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl CompareAndSwapSequence {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl SequenceGenerator for CompareAndSwapSequence {
    async fn next(&self, sequence_name: &str) -> Result<i64> {
        check_sequence_name(sequence_name)?;
        let mut lost_races = 0u64;
        loop {
            let document = self
                .store
                .find_one(&self.collection, &Filter::by_id(sequence_name))
                .await?
                .ok_or_else(|| missing_counter(&self.collection, sequence_name))?;
            let observed: SequenceCounter = from_document(document)?;
            let next = observed.value.checked_add(1).ok_or_else(|| {
                StoreError::InvalidArgument(format!("Sequence '{}' is exhausted", sequence_name))
            })?;

            let result = self
                .store
                .update_first(
                    &self.collection,
                    &Filter::by_id(sequence_name).and(VALUE_FIELD, observed.value),
                    &Update::new().set(VALUE_FIELD, next),
                )
                .await?;
            if result.matched == 1 {
                if lost_races > 0 {
                    debug!(
                        "Sequence '{}' allocated {} after {} lost compare-and-swap rounds",
                        sequence_name, next, lost_races
                    );
                }
                return Ok(next);
            }

            lost_races += 1;
            tokio::task::yield_now().await;
        }
    }
}
