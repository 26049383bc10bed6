use std::{collections::BTreeMap, fmt, future::Future, pin::Pin, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::ToolExecutionError;

/// Defines the type of tool available. Currently, only 'function' is supported.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    #[default]
    Function,
}

pub type ToolFuture = Pin<Box<dyn Future<Output = Result<String, ToolExecutionError>> + Send>>;

/// Signature for an asynchronous tool executor function.
///
/// Accepts the JSON arguments of a tool call and produces a `String` result
/// or a [`ToolExecutionError`] if execution fails.
pub type AsyncToolFn = Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>;

/// A tool an agent can call, together with the function that executes it.
#[derive(Serialize, Clone)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDefinition,
    #[serde(skip)]
    pub executor: AsyncToolFn,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("tool_type", &self.tool_type)
            .field("function", &self.function)
            .field("executor", &"<async_fn>")
            .finish()
    }
}

impl Tool {
    /// Convenience method to execute the tool
    pub async fn execute(&self, args: Value) -> Result<String, ToolExecutionError> {
        (self.executor)(args).await
    }

    /// Executes a call requested by the model, checking that it targets this tool.
    ///
    /// Arguments sent as a JSON-encoded string are decoded first.
    pub async fn execute_call(&self, call: &ToolCall) -> Result<String, ToolExecutionError> {
        if call.function.name != self.name() {
            return Err(ToolExecutionError::ToolNotFound(call.function.name.clone()));
        }
        let arguments = match &call.function.arguments {
            Value::String(raw) => serde_json::from_str(raw)
                .map_err(|e| ToolExecutionError::ArgumentParsingError(e.to_string()))?,
            other => other.clone(),
        };
        self.execute(arguments).await
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Name, description and argument schema of a callable function.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: InputSchema,
}

/// JSON-schema object describing the arguments a tool accepts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InputSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: BTreeMap<String, SchemaProperty>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl InputSchema {
    pub fn object(title: Option<String>) -> Self {
        Self {
            title,
            schema_type: "object".into(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        property: SchemaProperty,
        required: bool,
    ) -> Self {
        let name = name.into();
        if required && !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.properties.insert(name, property);
        self
    }
}

/// A single property within an [`InputSchema`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SchemaProperty {
    #[serde(rename = "type")]
    pub property_type: String,
    #[serde(default)]
    pub description: String,
}

impl SchemaProperty {
    pub fn new(property_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self { property_type: property_type.into(), description: description.into() }
    }
}

/// Arguments of a tool invocation.
///
/// Callers either pass values positionally, in the order the tool declares
/// its inputs, or by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    pub positional: Vec<Value>,
    pub keyword: Map<String, Value>,
}

impl ToolArgs {
    pub fn positional<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self { positional: values.into_iter().map(Into::into).collect(), keyword: Map::new() }
    }

    pub fn keyword<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            positional: Vec::new(),
            keyword: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Objects bind by name, arrays bind positionally, `null` means no
/// arguments and any other scalar is a single positional value.
impl From<Value> for ToolArgs {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(keyword) => Self { positional: Vec::new(), keyword },
            Value::Array(positional) => Self { positional, keyword: Map::new() },
            Value::Null => Self::default(),
            scalar => Self { positional: vec![scalar], keyword: Map::new() },
        }
    }
}

/// Represents a tool call requested by the model.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Some providers omit this field, so a default is supplied.
    #[serde(default, rename = "type")]
    pub tool_type: ToolType,
    pub function: ToolCallFunction,
}

/// Contains the name and arguments for a function call.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}
