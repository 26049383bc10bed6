use serde_json::{Map, Value};

/// Labels offered for the search type dropdown.
pub const SEARCH_TYPE_OPTIONS: [&str; 3] =
    ["Similarity", "Similarity with score threshold", "MMR (Max Marginal Relevance)"];

/// How a query is matched against stored vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchType {
    #[default]
    Similarity,
    SimilarityScoreThreshold,
    Mmr,
}

impl SearchType {
    /// Maps a dropdown label; unknown labels fall back to plain similarity.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Similarity with score threshold" => SearchType::SimilarityScoreThreshold,
            "MMR (Max Marginal Relevance)" => SearchType::Mmr,
            _ => SearchType::Similarity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Similarity => "similarity",
            SearchType::SimilarityScoreThreshold => "similarity_score_threshold",
            SearchType::Mmr => "mmr",
        }
    }
}

/// A search to run against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchArgs {
    /// Vector search for a text query.
    Query {
        query: String,
        search_type: SearchType,
        k: usize,
        score_threshold: f32,
        filter: Option<Map<String, Value>>,
    },
    /// Filter-only lookup.
    Metadata { n: usize, filter: Map<String, Value> },
}

impl SearchArgs {
    /// Name of the store operation these arguments are for.
    pub fn method(&self) -> &'static str {
        match self {
            SearchArgs::Query { .. } => "search",
            SearchArgs::Metadata { .. } => "metadata_search",
        }
    }

    /// Keyword-argument form, as handed to retrievers.
    pub fn to_kwargs(&self) -> Map<String, Value> {
        let mut args = Map::new();
        let filter = match self {
            SearchArgs::Query { query, search_type, k, score_threshold, filter } => {
                args.insert("query".into(), Value::String(query.clone()));
                args.insert("search_type".into(), search_type.as_str().into());
                args.insert("k".into(), (*k).into());
                args.insert("score_threshold".into(), (*score_threshold).into());
                filter.clone()
            }
            SearchArgs::Metadata { n, filter } => {
                args.insert("n".into(), (*n).into());
                Some(filter.clone())
            }
        };
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            args.insert("filter".into(), Value::Object(filter));
        }
        args
    }
}

/// Rewrites a metadata filter for documents that keep metadata under a
/// `metadata` key. Logical operators are rewritten recursively; `_id` and
/// other `$`-prefixed keys are left alone.
pub(crate) fn metadata_filter(filter: &Map<String, Value>, nested: bool) -> Map<String, Value> {
    if !nested {
        return filter.clone();
    }
    filter
        .iter()
        .map(|(key, value)| match key.as_str() {
            "$and" | "$or" => {
                let clauses = match value {
                    Value::Array(items) => Value::Array(
                        items
                            .iter()
                            .map(|item| match item {
                                Value::Object(clause) => Value::Object(metadata_filter(clause, true)),
                                other => other.clone(),
                            })
                            .collect(),
                    ),
                    other => other.clone(),
                };
                (key.clone(), clauses)
            }
            "$not" => match value {
                Value::Object(clause) => (key.clone(), Value::Object(metadata_filter(clause, true))),
                other => (key.clone(), other.clone()),
            },
            k if k == "_id" || k.starts_with('$') => (key.clone(), value.clone()),
            _ => (format!("metadata.{key}"), value.clone()),
        })
        .collect()
}
