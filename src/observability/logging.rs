use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use super::ObservabilityError;

/// Crate logs at debug level, everything else at warn. `RUST_LOG`
/// overrides both.
const DEFAULT_DIRECTIVES: &str = "langflow_rs=debug";

pub fn init_default_tracing() -> Result<(), ObservabilityError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::builder()
            .with_default_directive(tracing::Level::WARN.into())
            .parse(DEFAULT_DIRECTIVES)
            .map_err(|e| ObservabilityError::Filter(e.to_string()))?,
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_span_events(fmt::format::FmtSpan::CLOSE);

    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ObservabilityError::AlreadyInitialized(e.to_string()))
}
