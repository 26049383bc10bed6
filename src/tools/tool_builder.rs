use super::{
    errors::ToolBuilderError,
    tool::{AsyncToolFn, FunctionDefinition, InputSchema, SchemaProperty, Tool, ToolType},
};

/// Builder for a [`Tool`].
///
/// Name, description and executor are required. Properties start empty and
/// the schema type is always `"object"`.
#[derive(Default)]
pub struct ToolBuilder {
    tool_type: Option<ToolType>,
    function_name: Option<String>,
    function_description: Option<String>,
    parameters: Option<InputSchema>,
    executor: Option<AsyncToolFn>,
}

impl std::fmt::Debug for ToolBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBuilder")
            .field("tool_type", &self.tool_type)
            .field("function_name", &self.function_name)
            .field("function_description", &self.function_description)
            .field("parameters", &self.parameters)
            .field("executor", &self.executor.as_ref().map(|_| "<async_fn>"))
            .finish()
    }
}

impl ToolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool_type(mut self, tool_type: ToolType) -> Self {
        self.tool_type = Some(tool_type);
        self
    }

    /// Sets the name of the function for the tool. (Required)
    pub fn function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    /// Sets the description of the function for the tool. (Required)
    pub fn function_description(mut self, description: impl Into<String>) -> Self {
        self.function_description = Some(description.into());
        self
    }

    /// Replaces the whole argument schema.
    pub fn parameters(mut self, schema: InputSchema) -> Self {
        self.parameters = Some(schema);
        self
    }

    /// Adds an optional property to the function's parameters.
    ///
    /// # parameters
    /// * `name` - The name of the property.
    /// * `property_type` - The JSON schema type of the property (e.g., "string", "number", "boolean").
    /// * `description` - A description of what the property represents.
    pub fn add_property(
        self,
        name: impl Into<String>,
        property_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.push_property(name.into(), SchemaProperty::new(property_type, description), false)
    }

    /// Adds a property and marks it as required.
    pub fn add_required_property(
        self,
        name: impl Into<String>,
        property_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.push_property(name.into(), SchemaProperty::new(property_type, description), true)
    }

    fn push_property(mut self, name: String, property: SchemaProperty, required: bool) -> Self {
        let schema = self.parameters.take().unwrap_or_else(|| InputSchema::object(None));
        self.parameters = Some(schema.with_property(name, property, required));
        self
    }

    /// Sets the asynchronous executor function for the tool. (Required)
    pub fn executor(mut self, exec: AsyncToolFn) -> Self {
        self.executor = Some(exec);
        self
    }

    pub fn build(self) -> Result<Tool, ToolBuilderError> {
        let name = self.function_name.ok_or(ToolBuilderError::MissingFunctionName)?;
        let description = self
            .function_description
            .ok_or(ToolBuilderError::MissingFunctionDescription)?;
        let executor = self.executor.ok_or(ToolBuilderError::MissingExecutor)?;

        Ok(Tool {
            tool_type: self.tool_type.unwrap_or_default(),
            function: FunctionDefinition {
                name,
                description,
                parameters: self.parameters.unwrap_or_else(|| InputSchema::object(None)),
            },
            executor,
        })
    }
}
