use serde_json::{Map, Value};
use tracing::warn;

use super::errors::StoreError;
use crate::schema::{value_to_text, Document};

pub(crate) const VECTOR_FIELD: &str = "$vector";
pub(crate) const VECTORIZE_FIELD: &str = "$vectorize";
const SIMILARITY_FIELD: &str = "$similarity";
const METADATA_FIELD: &str = "metadata";
const CONTENT_CANDIDATES: [&str; 3] = ["content", "page_content", "text"];
pub(crate) const DEFAULT_CONTENT_FIELD: &str = "content";

/// Where document text lives in stored records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentField {
    Field(String),
    /// Text is stored in `$vectorize` and embedded server-side.
    Vectorize,
}

impl ContentField {
    pub fn from_name(name: &str) -> Self {
        if name == VECTORIZE_FIELD {
            ContentField::Vectorize
        } else {
            ContentField::Field(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ContentField::Field(name) => name,
            ContentField::Vectorize => VECTORIZE_FIELD,
        }
    }
}

/// A document read back from a collection.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredHit {
    pub document: Document,
    pub similarity: Option<f32>,
    pub vector: Option<Vec<f32>>,
}

/// Maps [`Document`]s to collection records and back.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCodec {
    pub content_field: ContentField,
    /// Metadata under a `metadata` key rather than at the top level.
    pub nested_metadata: bool,
    pub ignore_invalid_documents: bool,
}

impl DocumentCodec {
    pub fn new(content_field: ContentField, ignore_invalid_documents: bool) -> Self {
        Self { content_field, nested_metadata: true, ignore_invalid_documents }
    }

    /// Infers the layout of an existing collection from sample records.
    ///
    /// A requested content field always wins. Otherwise collections with a
    /// vectorize service use `$vectorize`, and the rest use the first of
    /// `content`, `page_content` or `text` found holding a string.
    pub fn autodetect(
        samples: &[Value],
        has_vectorize_service: bool,
        requested_content_field: Option<&str>,
        ignore_invalid_documents: bool,
    ) -> Self {
        let content_field = match requested_content_field {
            Some(name) => ContentField::from_name(name),
            None if has_vectorize_service => ContentField::Vectorize,
            None => CONTENT_CANDIDATES
                .iter()
                .find(|candidate| {
                    samples.iter().any(|doc| doc.get(**candidate).map_or(false, Value::is_string))
                })
                .map(|name| ContentField::Field(name.to_string()))
                .unwrap_or_else(|| ContentField::Field(DEFAULT_CONTENT_FIELD.into())),
        };

        let nested_metadata = samples.is_empty()
            || samples.iter().all(|doc| doc.get(METADATA_FIELD).map_or(false, Value::is_object));

        Self { content_field, nested_metadata, ignore_invalid_documents }
    }

    pub fn encode(&self, id: &str, document: &Document, vector: Option<Vec<f32>>) -> Value {
        let mut record = Map::new();
        record.insert("_id".into(), Value::String(id.to_string()));
        record.insert(self.content_field.name().to_string(), Value::String(document.page_content.clone()));
        if let Some(vector) = vector {
            record.insert(VECTOR_FIELD.into(), vector.into());
        }
        if self.nested_metadata {
            record.insert(METADATA_FIELD.into(), Value::Object(document.metadata.clone()));
        } else {
            for (key, value) in &document.metadata {
                record.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        Value::Object(record)
    }

    /// Decodes a stored record. Invalid records are skipped when the codec
    /// ignores them, and are errors otherwise.
    pub(crate) fn decode(&self, record: Value) -> Result<Option<StoredHit>, StoreError> {
        let Value::Object(mut fields) = record else {
            return self.invalid("record is not an object".into());
        };

        let content = match fields.remove(self.content_field.name()) {
            Some(Value::String(text)) => text,
            Some(other) if !other.is_null() => value_to_text(&other),
            _ => {
                return self.invalid(format!("missing content field '{}'", self.content_field.name()));
            }
        };

        let id = fields.remove("_id").map(|id| value_to_text(&id));
        let similarity = fields.remove(SIMILARITY_FIELD).and_then(|s| s.as_f64()).map(|s| s as f32);
        let vector = fields.remove(VECTOR_FIELD).and_then(|v| serde_json::from_value(v).ok());
        fields.remove(VECTORIZE_FIELD);

        let metadata = if self.nested_metadata {
            match fields.remove(METADATA_FIELD) {
                Some(Value::Object(metadata)) => metadata,
                _ => Map::new(),
            }
        } else {
            fields
        };

        let mut document = Document::new(content).with_metadata(metadata);
        document.id = id;
        Ok(Some(StoredHit { document, similarity, vector }))
    }

    fn invalid(&self, reason: String) -> Result<Option<StoredHit>, StoreError> {
        if self.ignore_invalid_documents {
            warn!("Skipping invalid document: {reason}");
            Ok(None)
        } else {
            Err(StoreError::InvalidDocument(reason))
        }
    }
}
