use crate::core::{Result, StoreError};
use crate::document::{DocumentStore, Filter, FindAndModifyOptions, Update, from_document};
use log::debug;
use serde::{Deserialize, Serialize};

pub const VALUE_FIELD: &str = "value";
pub const NOTE_FIELD: &str = "note";

/// Default annotation written into freshly seeded counters.
pub const DEFAULT_NOTE: &str =
    "Incremented atomically together with the fetch of this document; never read-then-write";

/// Counter document backing one named sequence.
///
/// ```text
/// { "id": "STEP_EXECUTION_SEQ", "value": 0, "note": "..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCounter {
    pub id: String,
    pub value: i64,
    #[serde(default)]
    pub note: String,
}

pub(crate) fn check_sequence_name(sequence_name: &str) -> Result<()> {
    if sequence_name.trim().is_empty() {
        return Err(StoreError::InvalidArgument(
            "Sequence name cannot be empty.".into(),
        ));
    }
    Ok(())
}

pub(crate) fn missing_counter(collection: &str, sequence_name: &str) -> StoreError {
    StoreError::NotFound(format!(
        "No counter defined for sequence '{}' in collection '{}'",
        sequence_name, collection
    ))
}

/// Create the counter for `sequence_name` at `initial` unless it already
/// exists, and return the counter as stored.
///
/// Setup helper for deployments and tests: generators never create counters
/// themselves. Seeding an existing counter leaves its value untouched.
pub async fn seed_sequence(
    store: &dyn DocumentStore,
    collection: &str,
    sequence_name: &str,
    initial: i64,
    note: &str,
) -> Result<SequenceCounter> {
    check_sequence_name(sequence_name)?;
    let document = store
        .find_and_modify(
            collection,
            &Filter::by_id(sequence_name),
            &Update::new()
                .set_on_insert(VALUE_FIELD, initial)
                .set_on_insert(NOTE_FIELD, note),
            FindAndModifyOptions::none().upsert(true).return_new(true),
        )
        .await?
        .ok_or_else(|| missing_counter(collection, sequence_name))?;
    let counter: SequenceCounter = from_document(document)?;
    debug!(
        "Sequence '{}' in '{}' is at {}",
        counter.id, collection, counter.value
    );
    Ok(counter)
}

/// Current state of a counter without incrementing it.
pub async fn read_counter(
    store: &dyn DocumentStore,
    collection: &str,
    sequence_name: &str,
) -> Result<SequenceCounter> {
    check_sequence_name(sequence_name)?;
    let document = store
        .find_one(collection, &Filter::by_id(sequence_name))
        .await?
        .ok_or_else(|| missing_counter(collection, sequence_name))?;
    from_document(document)
}
