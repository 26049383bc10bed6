use thiserror::Error;

/// Errors that can occur during execution of a tool.
///
/// These errors indicate failures in binding arguments, actually
/// running the tool, or locating the requested tool.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolExecutionError {
    /// Neither an explicit schema nor a graph to derive one from was set.
    #[error("No input schema available.")]
    SchemaUnavailable,
    /// Positional arguments were passed but their number does not match the declared inputs.
    #[error("Number of positional arguments does not match the number of inputs ({expected} expected, {received} received). Pass keyword arguments instead.")]
    ArgumentCountMismatch { expected: usize, received: usize },
    /// Declared inputs with no value supplied, in declaration order.
    #[error("Missing required arguments: {}", .0.join(", "))]
    MissingArguments(Vec<String>),
    /// The provided arguments could not be parsed or were invalid.
    #[error("Tool argument parsing error: {0}")]
    ArgumentParsingError(String),
    /// The tool failed during execution (runtime failure inside the tool).
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
    /// The requested tool was not found in the registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
}

/// Errors raised while assembling a tool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolBuilderError {
    #[error("Function name is required.")]
    MissingFunctionName,
    #[error("Function description is required.")]
    MissingFunctionDescription,
    #[error("Executor function is required for the tool.")]
    MissingExecutor,
    #[error("A flow runner is required for a flow tool.")]
    MissingRunner,
    /// Two flow inputs normalise to the same argument name, so positional
    /// binding would be ambiguous.
    #[error("Duplicate argument name '{0}' in flow inputs.")]
    DuplicateArgument(String),
}
