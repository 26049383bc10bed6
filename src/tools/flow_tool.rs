use std::{collections::BTreeMap, fmt, sync::Arc};

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::flow::{
    build_data_from_result_data, build_schema_from_inputs, format_flow_output_data, get_arg_names,
    get_flow_inputs, FlowInputDescriptor, FlowRunner, Graph, RunFlowRequest, RunOutputs, Tweaks, Vertex,
};

use super::{
    errors::{ToolBuilderError, ToolExecutionError},
    tool::{AsyncToolFn, FunctionDefinition, InputSchema, SchemaProperty, Tool, ToolArgs, ToolType},
};

/// Result returned when a flow run produced nothing.
pub const NO_OUTPUT: &str = "No output";

/// Exposes a stored flow as a tool.
///
/// Each declared input of the flow becomes one argument. Calling the tool
/// runs the flow with those values as tweaks and returns the formatted
/// outputs of the first run.
///
/// ```no_run
/// use std::sync::Arc;
/// use langflow_rs::{FlowTool, Graph, LangflowClient, ToolArgs, Vertex};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let graph = Graph::new(vec![
///     Vertex::new("ChatInput-1", "ChatInput").with_display_name("Question"),
/// ])
/// .with_flow("3f1c...", "Research");
///
/// let tool = FlowTool::builder()
///     .name("research")
///     .description("Answers research questions")
///     .graph(graph)
///     .runner(Arc::new(LangflowClient::from_env()?))
///     .build()?;
///
/// let answer = tool.run(ToolArgs::positional(["What is MMR?"])).await?;
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct FlowTool {
    pub name: String,
    pub description: String,
    pub graph: Option<Arc<Graph>>,
    pub flow_id: Option<String>,
    pub user_id: Option<String>,
    pub inputs: Vec<Vertex>,
    pub get_final_results_only: bool,
    pub args_schema: Option<InputSchema>,
    arg_names: Vec<FlowInputDescriptor>,
    runner: Arc<dyn FlowRunner>,
}

impl fmt::Debug for FlowTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowTool")
            .field("name", &self.name)
            .field("flow_id", &self.flow_id)
            .field("user_id", &self.user_id)
            .field("arg_names", &self.arg_names)
            .field("get_final_results_only", &self.get_final_results_only)
            .field("runner", &"<flow_runner>")
            .finish()
    }
}

impl FlowTool {
    pub fn builder() -> FlowToolBuilder {
        FlowToolBuilder::default()
    }

    /// Argument descriptors in declaration order.
    pub fn arg_names(&self) -> &[FlowInputDescriptor] {
        &self.arg_names
    }

    /// The tool's input schema.
    pub fn get_input_schema(&self) -> Result<InputSchema, ToolExecutionError> {
        if let Some(schema) = &self.args_schema {
            return Ok(schema.clone());
        }
        match &self.graph {
            Some(graph) => Ok(build_schema_from_inputs(&self.name, &get_flow_inputs(graph))),
            None => Err(ToolExecutionError::SchemaUnavailable),
        }
    }

    pub fn args(&self) -> Result<BTreeMap<String, SchemaProperty>, ToolExecutionError> {
        Ok(self.get_input_schema()?.properties)
    }

    /// Maps call arguments onto the flow's input components.
    pub fn build_tweaks(&self, args: ToolArgs) -> Result<Tweaks, ToolExecutionError> {
        let mut kwargs = validate_inputs(&self.arg_names, args)?;
        Ok(self
            .arg_names
            .iter()
            .map(|arg| (arg.component_name.clone(), kwargs.remove(&arg.arg_name).unwrap_or(Value::Null)))
            .collect())
    }

    /// Runs the flow and returns its formatted output.
    #[instrument(skip(self, args), fields(tool = %self.name, flow_id = ?self.flow_id))]
    pub async fn run(&self, args: ToolArgs) -> Result<String, ToolExecutionError> {
        let tweaks = self.build_tweaks(args)?;
        debug!(inputs = tweaks.len(), "running flow");

        let request = RunFlowRequest {
            tweaks,
            flow_id: self.flow_id.clone(),
            user_id: self.user_id.clone(),
            run_id: self.current_run_id(),
        };

        let run_outputs = self
            .runner
            .run_flow(request)
            .await
            .map_err(|e| ToolExecutionError::ExecutionFailed(e.to_string()))?;

        Ok(self.format_run_outputs(&run_outputs))
    }

    /// Blocking form of [`FlowTool::run`].
    ///
    /// Drives the run on a private current-thread runtime. Inside an async
    /// context the private runtime lives on a scoped thread instead.
    pub fn run_blocking(&self, args: ToolArgs) -> Result<String, ToolExecutionError> {
        let drive = move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| ToolExecutionError::ExecutionFailed(format!("Failed to start runtime: {e}")))?;
            runtime.block_on(self.run(args))
        };

        if tokio::runtime::Handle::try_current().is_err() {
            return drive();
        }

        // The private runtime may neither run nor be dropped on a runtime thread.
        std::thread::scope(|scope| scope.spawn(drive).join())
            .map_err(|_| ToolExecutionError::ExecutionFailed("Flow run thread panicked".into()))?
    }

    /// Converts the flow tool into a [`Tool`] an agent can register.
    pub fn into_tool(self) -> Result<Tool, ToolExecutionError> {
        let function = FunctionDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.get_input_schema()?,
        };
        let flow_tool = Arc::new(self);
        let executor: AsyncToolFn = Arc::new(move |args: Value| {
            let flow_tool = Arc::clone(&flow_tool);
            Box::pin(async move { flow_tool.run(ToolArgs::from(args)).await })
        });
        Ok(Tool { tool_type: ToolType::Function, function, executor })
    }

    // A graph without a run id is not an error for the tool: the flow runs
    // without being attached to the caller's run.
    fn current_run_id(&self) -> Option<String> {
        let graph = self.graph.as_ref()?;
        match graph.run_id() {
            Ok(run_id) => Some(run_id.to_string()),
            Err(e) => {
                warn!(error = %e, "Failed to set run_id");
                None
            }
        }
    }

    fn format_run_outputs(&self, run_outputs: &[RunOutputs]) -> String {
        let Some(run_output) = run_outputs.first() else {
            return NO_OUTPUT.to_string();
        };
        let data: Vec<_> = run_output
            .outputs
            .iter()
            .flatten()
            .flat_map(|output| build_data_from_result_data(output, self.get_final_results_only))
            .collect();
        format_flow_output_data(&data)
    }
}

/// Binds call arguments to argument names.
///
/// Positional values are accepted only when there is exactly one per
/// declared input, in which case they replace any keyword values.
pub fn validate_inputs(
    arg_names: &[FlowInputDescriptor],
    args: ToolArgs,
) -> Result<Map<String, Value>, ToolExecutionError> {
    let ToolArgs { positional, keyword } = args;

    if !positional.is_empty() && positional.len() != arg_names.len() {
        return Err(ToolExecutionError::ArgumentCountMismatch {
            expected: arg_names.len(),
            received: positional.len(),
        });
    }

    let kwargs = if positional.len() == arg_names.len() && !positional.is_empty() {
        arg_names.iter().map(|arg| arg.arg_name.clone()).zip(positional).collect()
    } else {
        keyword
    };

    let missing: Vec<String> = arg_names
        .iter()
        .filter(|arg| !kwargs.contains_key(&arg.arg_name))
        .map(|arg| arg.arg_name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ToolExecutionError::MissingArguments(missing));
    }

    Ok(kwargs)
}

/// Builder for [`FlowTool`].
///
/// When a graph is given, inputs and flow id default to the graph's.
#[derive(Default)]
pub struct FlowToolBuilder {
    name: Option<String>,
    description: Option<String>,
    graph: Option<Arc<Graph>>,
    flow_id: Option<String>,
    user_id: Option<String>,
    inputs: Option<Vec<Vertex>>,
    get_final_results_only: Option<bool>,
    args_schema: Option<InputSchema>,
    runner: Option<Arc<dyn FlowRunner>>,
}

impl FlowToolBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn graph(mut self, graph: impl Into<Arc<Graph>>) -> Self {
        self.graph = Some(graph.into());
        self
    }

    pub fn flow_id(mut self, flow_id: impl Into<String>) -> Self {
        self.flow_id = Some(flow_id.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn inputs(mut self, inputs: Vec<Vertex>) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn get_final_results_only(mut self, final_only: bool) -> Self {
        self.get_final_results_only = Some(final_only);
        self
    }

    pub fn args_schema(mut self, schema: InputSchema) -> Self {
        self.args_schema = Some(schema);
        self
    }

    pub fn runner(mut self, runner: Arc<dyn FlowRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn build(self) -> Result<FlowTool, ToolBuilderError> {
        let name = self.name.ok_or(ToolBuilderError::MissingFunctionName)?;
        let description = self.description.ok_or(ToolBuilderError::MissingFunctionDescription)?;
        let runner = self.runner.ok_or(ToolBuilderError::MissingRunner)?;

        let inputs = match (self.inputs, &self.graph) {
            (Some(inputs), _) => inputs,
            (None, Some(graph)) => get_flow_inputs(graph),
            (None, None) => Vec::new(),
        };
        let arg_names = get_arg_names(&inputs);
        for (i, arg) in arg_names.iter().enumerate() {
            if arg_names[..i].iter().any(|prev| prev.arg_name == arg.arg_name) {
                return Err(ToolBuilderError::DuplicateArgument(arg.arg_name.clone()));
            }
        }

        let flow_id = self
            .flow_id
            .or_else(|| self.graph.as_ref().and_then(|g| g.flow_id.clone()));

        Ok(FlowTool {
            name,
            description,
            graph: self.graph,
            flow_id,
            user_id: self.user_id,
            inputs,
            get_final_results_only: self.get_final_results_only.unwrap_or(true),
            args_schema: self.args_schema,
            arg_names,
            runner,
        })
    }
}
