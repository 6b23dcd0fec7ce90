use super::{Document, Filter, ID_FIELD};
use crate::core::{Result, StoreError};
use serde_json::Value;

/// Field-level mutation applied atomically by a store.
///
/// Mirrors the usual document-store operators: `$set` replaces values, `$inc`
/// adds to integer fields (a missing field starts from zero) and
/// `$setOnInsert` only contributes when an upsert creates the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Document,
    inc: Vec<(String, i64)>,
    set_on_insert: Document,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn inc(mut self, field: impl Into<String>, delta: i64) -> Self {
        self.inc.push((field.into(), delta));
        self
    }

    pub fn set_on_insert(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_on_insert.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.inc.is_empty() && self.set_on_insert.is_empty()
    }

    fn check_primary_key(&self) -> Result<()> {
        let touches_id = self.set.contains_key(ID_FIELD)
            || self.set_on_insert.contains_key(ID_FIELD)
            || self.inc.iter().any(|(field, _)| field == ID_FIELD);
        if touches_id {
            return Err(StoreError::InvalidArgument(format!(
                "Update may not modify the primary key field '{}'",
                ID_FIELD
            )));
        }
        Ok(())
    }

    /// Apply `$set` and `$inc` to an existing document.
    ///
    /// Either every operator applies or the document is left untouched.
    /// Returns whether any field value actually changed.
    pub(crate) fn apply(&self, document: &mut Document) -> Result<bool> {
        self.check_primary_key()?;

        let mut next = document.clone();
        for (field, value) in &self.set {
            next.insert(field.clone(), value.clone());
        }
        for (field, delta) in &self.inc {
            let current = match next.get(field) {
                None | Some(Value::Null) => 0,
                Some(value) => value.as_i64().ok_or_else(|| {
                    StoreError::InvalidArgument(format!(
                        "Cannot apply $inc to non-integer field '{}' ({})",
                        field, value
                    ))
                })?,
            };
            let updated = current.checked_add(*delta).ok_or_else(|| {
                StoreError::InvalidArgument(format!("$inc on field '{}' overflows", field))
            })?;
            next.insert(field.clone(), Value::from(updated));
        }

        let modified = next != *document;
        *document = next;
        Ok(modified)
    }

    /// Build the document an upsert creates: the filter's equality clauses,
    /// then `$setOnInsert`, then the regular operators.
    pub(crate) fn apply_insert(&self, filter: &Filter) -> Result<Document> {
        self.check_primary_key()?;

        let mut document = Document::new();
        for (field, value) in filter.clauses() {
            document.insert(field.clone(), value.clone());
        }
        for (field, value) in &self.set_on_insert {
            document.insert(field.clone(), value.clone());
        }
        self.apply(&mut document)?;
        Ok(document)
    }
}
