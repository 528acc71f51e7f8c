use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Equality filters applied after a search stage, keyed by (dotted) field path
pub type Filters = BTreeMap<String, Value>;

/// A user story as held by the document store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryDocument {
    /// Opaque document identity (`_id` in exported collections)
    #[serde(alias = "_id", deserialize_with = "deserialize_id")]
    pub id: String,

    /// Tracker key, e.g. `HC-257`
    pub key: String,

    /// One-line story summary
    #[serde(default)]
    pub summary: String,

    /// Full story description
    #[serde(default)]
    pub description: String,

    /// Structured workflow status (usually `{ "name": "In Progress", ... }`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,

    /// Stored embedding; empty when the story was never embedded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,

    /// Any other fields carried by the record
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accept string, numeric and `{ "$oid": ... }` identifiers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Object(ref map) => map
            .get("$oid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| serde::de::Error::custom("object id must carry a string $oid")),
        other => Err(serde::de::Error::custom(format!(
            "unsupported id value: {other}"
        ))),
    }
}

impl StoryDocument {
    /// Create a new story with empty description, status and embedding
    pub fn new(id: impl Into<String>, key: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            summary: summary.into(),
            description: String::new(),
            status: None,
            embedding: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: Value) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Display name of the status: `status.name`, or the status itself when it is a bare string
    pub fn status_name(&self) -> Option<&str> {
        match self.status.as_ref()? {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("name").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Resolve a dotted field path (`status.name`, `sprint.id`) to a value
    pub fn field(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;

        let root = match head {
            "id" | "_id" => Value::String(self.id.clone()),
            "key" => Value::String(self.key.clone()),
            "summary" => Value::String(self.summary.clone()),
            "description" => Value::String(self.description.clone()),
            "status" => self.status.clone()?,
            other => self.extra.get(other)?.clone(),
        };

        segments.try_fold(root, |current, segment| match current {
            Value::Object(mut map) => map.remove(segment),
            _ => None,
        })
    }

    /// Text content of a searchable field, if it holds a string
    pub fn text_field(&self, path: &str) -> Option<String> {
        match path {
            "key" => Some(self.key.clone()),
            "summary" => Some(self.summary.clone()),
            "description" => Some(self.description.clone()),
            other => match self.field(other)? {
                Value::String(s) => Some(s),
                _ => None,
            },
        }
    }

    /// True when every active filter matches the corresponding field exactly
    pub fn matches(&self, filters: &Filters) -> bool {
        active_filters(filters).all(|(path, expected)| {
            self.field(path)
                .is_some_and(|actual| filter_value_matches(&actual, expected))
        })
    }

    /// Copy of the document without its embedding, as returned by searches
    pub fn without_embedding(&self) -> Self {
        Self {
            embedding: Vec::new(),
            ..self.clone()
        }
    }
}

/// Filters with a null or empty-string value are treated as "not set".
pub fn active_filters(filters: &Filters) -> impl Iterator<Item = (&String, &Value)> {
    filters.iter().filter(|(_, value)| match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

/// Filter equality: numbers compare by value, so `3` matches `3.0`.
pub fn filter_value_matches(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

/// A document returned by a search stage together with its native score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredStory {
    pub document: StoryDocument,
    pub score: f32,
}

impl ScoredStory {
    pub fn new(document: StoryDocument, score: f32) -> Self {
        Self { document, score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn story() -> StoryDocument {
        StoryDocument::new("64f1", "HC-257", "Reset password via email")
            .with_description("As a user I want to reset my password")
            .with_status(json!({"name": "Done", "category": {"key": "done"}}))
            .with_field("project", json!("HC"))
            .with_field("points", json!(3))
    }

    #[test]
    fn test_deserialize_object_id() {
        let doc: StoryDocument = serde_json::from_value(json!({
            "_id": {"$oid": "650c1f"},
            "key": "HC-1",
            "summary": "Login",
            "embedding": [0.5, 0.5]
        }))
        .unwrap();

        assert_eq!(doc.id, "650c1f");
        assert_eq!(doc.description, "");
        assert_eq!(doc.embedding, vec![0.5, 0.5]);
    }

    #[test]
    fn test_deserialize_keeps_extra_fields() {
        let doc: StoryDocument = serde_json::from_value(json!({
            "id": 42,
            "key": "HC-2",
            "sprint": {"name": "S1"}
        }))
        .unwrap();

        assert_eq!(doc.id, "42");
        assert_eq!(doc.field("sprint.name"), Some(json!("S1")));
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let result = serde_json::from_value::<StoryDocument>(json!({"id": "1"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_status_name() {
        assert_eq!(story().status_name(), Some("Done"));
        let bare = StoryDocument::new("1", "K", "s").with_status(json!("Open"));
        assert_eq!(bare.status_name(), Some("Open"));
        assert_eq!(StoryDocument::new("1", "K", "s").status_name(), None);
    }

    #[test]
    fn test_dotted_field_lookup() {
        let doc = story();
        assert_eq!(doc.field("status.category.key"), Some(json!("done")));
        assert_eq!(doc.field("key"), Some(json!("HC-257")));
        assert_eq!(doc.field("status.missing"), None);
        assert_eq!(doc.field("project.name"), None);
    }

    #[test]
    fn test_filters_match_all_active_entries() {
        let doc = story();
        let mut filters = Filters::new();
        filters.insert("project".to_string(), json!("HC"));
        filters.insert("status.name".to_string(), json!("Done"));
        filters.insert("points".to_string(), json!(3.0));
        assert!(doc.matches(&filters));

        filters.insert("project".to_string(), json!("OPS"));
        assert!(!doc.matches(&filters));
    }

    #[test]
    fn test_empty_filter_values_are_ignored() {
        let doc = story();
        let mut filters = Filters::new();
        filters.insert("assignee".to_string(), json!(""));
        filters.insert("sprint".to_string(), Value::Null);
        assert!(doc.matches(&filters));
    }

    #[test]
    fn test_without_embedding() {
        let doc = story().with_embedding(vec![1.0, 2.0]);
        let stripped = doc.without_embedding();
        assert!(stripped.embedding.is_empty());
        assert_eq!(stripped.key, doc.key);
    }
}
