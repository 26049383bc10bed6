mod errors;
mod flow_tool;
mod tool;
mod tool_builder;

pub use errors::{ToolBuilderError, ToolExecutionError};
pub use flow_tool::*;
pub use tool::*;
pub use tool_builder::*;
