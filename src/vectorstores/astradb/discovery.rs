use std::fmt;

use tracing::warn;

/// Outcome of a best-effort lookup against the remote service.
///
/// Lookups that feed configuration dropdowns never fail outright; when the
/// service is unreachable they report a fallback value and the reason.
#[derive(Debug, Clone, PartialEq)]
pub enum Discovery<T> {
    Found(T),
    Degraded { fallback: T, reason: String },
}

impl<T> Discovery<T> {
    /// Logs the reason and wraps the fallback.
    pub fn degraded(fallback: T, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!("{reason}");
        Discovery::Degraded { fallback, reason }
    }

    /// Errors become a degraded value whose reason is `"{context}: {error}"`.
    pub fn from_result<E: fmt::Display>(result: Result<T, E>, fallback: T, context: &str) -> Self {
        match result {
            Ok(value) => Discovery::Found(value),
            Err(e) => Discovery::degraded(fallback, format!("{context}: {e}")),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Discovery::Found(value) | Discovery::Degraded { fallback: value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Discovery::Found(value) | Discovery::Degraded { fallback: value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Discovery::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Discovery::Found(_) => None,
            Discovery::Degraded { reason, .. } => Some(reason),
        }
    }
}
