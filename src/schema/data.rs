use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Document;

fn default_text_key() -> String {
    "text".to_string()
}

/// Generic record passed between components.
///
/// A record is a JSON object plus the name of the key holding its
/// human-readable text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Data {
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default = "default_text_key")]
    pub text_key: String,
}

impl Data {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data, text_key: default_text_key() }
    }

    pub fn with_text_key(mut self, text_key: impl Into<String>) -> Self {
        self.text_key = text_key.into();
        self
    }

    /// Builds a record holding a single text value.
    pub fn from_text(text: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert(default_text_key(), Value::String(text.into()));
        Self::new(data)
    }

    /// Text found under `text_key`.
    ///
    /// Strings are returned as-is, objects carrying a `text` field (chat
    /// messages) yield that field and anything else is rendered as JSON.
    /// A missing key yields an empty string.
    pub fn get_text(&self) -> String {
        match self.data.get(&self.text_key) {
            None | Some(Value::Null) => String::new(),
            Some(value) => value_to_text(value),
        }
    }

    /// Converts the record to a store document. The text becomes the page
    /// content and every other key becomes metadata.
    pub fn to_document(&self) -> Document {
        let metadata = self
            .data
            .iter()
            .filter(|(k, _)| **k != self.text_key)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Document::new(self.get_text()).with_metadata(metadata)
    }
}

impl From<Document> for Data {
    fn from(doc: Document) -> Self {
        let mut data = doc.metadata;
        if let Some(id) = doc.id {
            data.insert("id".into(), Value::String(id));
        }
        data.insert(default_text_key(), Value::String(doc.page_content));
        Data::new(data)
    }
}

/// Converts documents returned by a store into records.
pub fn docs_to_data(documents: Vec<Document>) -> Vec<Data> {
    documents.into_iter().map(Data::from).collect()
}

pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(obj) => match obj.get("text") {
            Some(Value::String(s)) => s.clone(),
            _ => value.to_string(),
        },
        other => other.to_string(),
    }
}
