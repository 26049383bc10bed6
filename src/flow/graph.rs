use serde::Deserialize;
use serde_json::Value;

use super::errors::GraphError;

/// Component types whose vertices accept a flow's external input.
pub const INPUT_COMPONENTS: [&str; 3] = ["ChatInput", "TextInput", "Webhook"];

/// A component in a flow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub component_type: String,
    pub is_input: bool,
}

impl Vertex {
    pub fn new(id: impl Into<String>, component_type: impl Into<String>) -> Self {
        let id = id.into();
        let component_type = component_type.into();
        Self {
            display_name: component_type.clone(),
            is_input: INPUT_COMPONENTS.contains(&component_type.as_str()),
            description: String::new(),
            component_type,
            id,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The parts of a stored flow needed to expose it as a tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub flow_id: Option<String>,
    pub flow_name: Option<String>,
    pub vertices: Vec<Vertex>,
    run_id: Option<String>,
}

#[derive(Deserialize)]
struct FlowPayload {
    #[serde(default)]
    nodes: Vec<NodePayload>,
}

#[derive(Deserialize)]
struct NodePayload {
    id: String,
    #[serde(default)]
    data: NodeData,
}

#[derive(Deserialize, Default)]
struct NodeData {
    #[serde(rename = "type", default)]
    component_type: Option<String>,
    #[serde(default)]
    node: Option<NodeTemplate>,
}

#[derive(Deserialize, Default)]
struct NodeTemplate {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl Graph {
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices, ..Default::default() }
    }

    pub fn with_flow(mut self, flow_id: impl Into<String>, flow_name: impl Into<String>) -> Self {
        self.flow_id = Some(flow_id.into());
        self.flow_name = Some(flow_name.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Identifier of the run this graph belongs to.
    pub fn run_id(&self) -> Result<&str, GraphError> {
        self.run_id.as_deref().ok_or_else(|| {
            GraphError::RunIdNotSet(self.flow_id.clone().unwrap_or_else(|| "<unsaved>".into()))
        })
    }

    /// Reads the `data` section of a stored flow (`{"nodes": [...], "edges": [...]}`).
    ///
    /// When a node has no explicit type the prefix of its id (`ChatInput-x1Y2`)
    /// is used instead.
    pub fn from_payload(payload: &Value) -> Result<Self, GraphError> {
        let payload: FlowPayload = serde_json::from_value(payload.clone())
            .map_err(|e| GraphError::InvalidPayload(e.to_string()))?;

        let vertices = payload
            .nodes
            .into_iter()
            .map(|node| {
                let component_type = node
                    .data
                    .component_type
                    .unwrap_or_else(|| node.id.split('-').next().unwrap_or_default().to_string());
                let template = node.data.node.unwrap_or_default();
                let mut vertex = Vertex::new(node.id, component_type);
                if let Some(name) = template.display_name {
                    vertex.display_name = name;
                }
                vertex.description = template.description.unwrap_or_default();
                vertex
            })
            .collect();

        Ok(Self::new(vertices))
    }
}

/// The vertices of `graph` that take external input, in graph order.
pub fn get_flow_inputs(graph: &Graph) -> Vec<Vertex> {
    graph.vertices.iter().filter(|v| v.is_input).cloned().collect()
}
