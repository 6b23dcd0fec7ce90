use super::{Document, ID_FIELD};
use serde_json::Value;

/// Conjunction of field equality clauses.
///
/// A missing field only matches `null`, the way document stores treat absent
/// values in equality queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }

    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::eq(ID_FIELD, id)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// The value the filter pins the primary key to, if any.
    pub fn id_value(&self) -> Option<&Value> {
        self.clauses
            .iter()
            .find(|(field, _)| field == ID_FIELD)
            .map(|(_, value)| value)
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses.iter().all(|(field, expected)| {
            match document.get(field) {
                Some(actual) => actual == expected,
                None => expected.is_null(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::all().matches(&doc(json!({"id": 1}))));
        assert!(Filter::all().matches(&Document::new()));
    }

    #[test]
    fn test_conjunction() {
        let d = doc(json!({"id": 4, "version": 2, "name": "load"}));
        assert!(Filter::by_id(4).and("version", 2).matches(&d));
        assert!(!Filter::by_id(4).and("version", 1).matches(&d));
        assert!(!Filter::by_id(5).and("version", 2).matches(&d));
    }

    #[test]
    fn test_number_representations_compare_equal() {
        let d = doc(json!({"id": 10u64}));
        assert!(Filter::by_id(10i64).matches(&d));
        assert!(Filter::by_id(10i32).matches(&d));
    }

    #[test]
    fn test_missing_field_matches_only_null() {
        let d = doc(json!({"id": 1}));
        assert!(Filter::eq("endTime", Value::Null).matches(&d));
        assert!(!Filter::eq("endTime", "2024-01-01T00:00:00Z").matches(&d));
    }

    #[test]
    fn test_id_value() {
        let filter = Filter::eq("name", "x").and("id", "SEQ");
        assert_eq!(filter.id_value(), Some(&json!("SEQ")));
        assert!(Filter::eq("name", "x").id_value().is_none());
    }
}
