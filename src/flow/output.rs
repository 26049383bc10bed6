use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::schema::Data;

/// Output of a single component after a flow run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ResultData {
    #[serde(default)]
    pub results: Value,
    #[serde(default)]
    pub artifacts: Value,
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
}

/// Outputs of one flow run for one set of inputs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RunOutputs {
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub outputs: Vec<Option<ResultData>>,
}

/// Flattens a component result into records.
///
/// Named results become one record each, keyed by their name. With
/// `get_final_results_only` unset the record also carries the component
/// identity and the artifact stored under the same name.
pub fn build_data_from_result_data(result_data: &ResultData, get_final_results_only: bool) -> Vec<Data> {
    match &result_data.results {
        Value::Object(results) => results
            .iter()
            .map(|(name, value)| {
                let mut data = Map::new();
                data.insert(name.clone(), value.clone());
                if !get_final_results_only {
                    if let Some(id) = &result_data.component_id {
                        data.insert("component_id".into(), Value::String(id.clone()));
                    }
                    if let Some(display_name) = &result_data.component_display_name {
                        data.insert("component_display_name".into(), Value::String(display_name.clone()));
                    }
                    if let Some(artifact) = result_data.artifacts.get(name) {
                        data.insert("artifact".into(), artifact.clone());
                    }
                }
                Data::new(data).with_text_key(name.clone())
            })
            .collect(),
        Value::Null => data_from_artifacts(&result_data.artifacts),
        other => {
            let mut data = Map::new();
            data.insert("result".into(), other.clone());
            vec![Data::new(data).with_text_key("result")]
        }
    }
}

fn data_from_artifacts(artifacts: &Value) -> Vec<Data> {
    match artifacts {
        Value::Object(record) => vec![Data::new(record.clone())],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(Data::new(record.clone())),
                unknown => {
                    warn!(artifact = %unknown, "Unable to build record output from unknown artifact");
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Renders records as the text returned to an agent.
pub fn format_flow_output_data(data: &[Data]) -> String {
    let lines: Vec<String> = data.iter().map(Data::get_text).filter(|t| !t.is_empty()).collect();
    format!("Flow run output:\n{}", lines.join("\n"))
}
