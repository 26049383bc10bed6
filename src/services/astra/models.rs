use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A database as listed by the DevOps API.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AstraDatabase {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    pub info: DatabaseInfo,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub keyspace: Option<String>,
    #[serde(default)]
    pub keyspaces: Vec<String>,
    #[serde(default)]
    pub cloud_provider: Option<String>,
}

/// A collection and its creation options, as returned by `findCollections`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CollectionDescriptor {
    pub name: String,
    #[serde(default)]
    pub options: CollectionOptions,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct CollectionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<VectorOptions>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct VectorOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<VectorServiceOptions>,
}

/// Server-side embedding ("vectorize") configuration of a collection.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VectorServiceOptions {
    pub provider: String,
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
}

impl CollectionDescriptor {
    pub fn service(&self) -> Option<&VectorServiceOptions> {
        self.options.vector.as_ref()?.service.as_ref()
    }
}

/// Arguments of a `find` command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Option<Map<String, Value>>,
    pub sort: Option<Value>,
    pub projection: Option<Value>,
    pub limit: Option<usize>,
    pub include_similarity: bool,
    pub include_sort_vector: bool,
}

impl FindQuery {
    pub(crate) fn to_command(&self) -> Value {
        let mut find = Map::new();
        if let Some(filter) = &self.filter {
            find.insert("filter".into(), Value::Object(filter.clone()));
        }
        if let Some(sort) = &self.sort {
            find.insert("sort".into(), sort.clone());
        }
        if let Some(projection) = &self.projection {
            find.insert("projection".into(), projection.clone());
        }

        let mut options = Map::new();
        if let Some(limit) = self.limit {
            options.insert("limit".into(), limit.into());
        }
        if self.include_similarity {
            options.insert("includeSimilarity".into(), true.into());
        }
        if self.include_sort_vector {
            options.insert("includeSortVector".into(), true.into());
        }
        if !options.is_empty() {
            find.insert("options".into(), Value::Object(options));
        }

        let mut command = Map::new();
        command.insert("find".into(), Value::Object(find));
        Value::Object(command)
    }
}

/// Documents matched by a `find`, plus the query vector when requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindResult {
    pub documents: Vec<Value>,
    pub sort_vector: Option<Vec<f32>>,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct CommandResponse {
    #[serde(default)]
    pub status: Option<Map<String, Value>>,
    #[serde(default)]
    pub data: Option<FindData>,
    #[serde(default)]
    pub errors: Vec<CommandErrorDescriptor>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FindData {
    #[serde(default)]
    pub documents: Vec<Value>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommandErrorDescriptor {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl CommandErrorDescriptor {
    pub fn describe(&self) -> String {
        match &self.error_code {
            Some(code) => format!("{code}: {}", self.message),
            None => self.message.clone(),
        }
    }
}
