use serde::{Deserialize, Serialize};

use crate::tools::{InputSchema, SchemaProperty};

use super::graph::Vertex;

/// One exposed input slot of a flow.
///
/// `component_name` is the tweak key of the input component and `arg_name`
/// the argument name a caller uses for it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FlowInputDescriptor {
    pub component_name: String,
    pub arg_name: String,
    #[serde(default)]
    pub description: String,
}

impl FlowInputDescriptor {
    pub fn new(component_name: impl Into<String>, arg_name: impl Into<String>) -> Self {
        Self { component_name: component_name.into(), arg_name: arg_name.into(), description: String::new() }
    }
}

/// Turns a display name into an argument identifier: lowercase, runs of
/// non-alphanumeric characters become a single `_`, no leading or trailing `_`.
pub fn format_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Argument descriptors for a flow's input vertices, in order.
pub fn get_arg_names(inputs: &[Vertex]) -> Vec<FlowInputDescriptor> {
    inputs
        .iter()
        .map(|vertex| FlowInputDescriptor {
            component_name: vertex.id.clone(),
            arg_name: format_name(&vertex.display_name),
            description: vertex.description.clone(),
        })
        .collect()
}

/// Builds the argument schema of a flow: every input is a required string.
pub fn build_schema_from_inputs(name: &str, inputs: &[Vertex]) -> InputSchema {
    get_arg_names(inputs).into_iter().fold(
        InputSchema::object(Some(format_name(name))),
        |schema, arg| {
            schema.with_property(arg.arg_name, SchemaProperty::new("string", arg.description), true)
        },
    )
}
