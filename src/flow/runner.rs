use std::{future::Future, pin::Pin};

use super::{errors::FlowRunError, output::RunOutputs, tweaks::Tweaks};

/// Everything a runner needs to execute a stored flow once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunFlowRequest {
    pub tweaks: Tweaks,
    pub flow_id: Option<String>,
    pub user_id: Option<String>,
    pub run_id: Option<String>,
}

pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<RunOutputs>, FlowRunError>> + Send + 'a>>;

/// Executes stored flows.
///
/// Implementations own scheduling and evaluation of the graph; callers only
/// see the outputs of each run.
pub trait FlowRunner: Send + Sync {
    fn run_flow(&self, request: RunFlowRequest) -> RunFuture<'_>;
}
