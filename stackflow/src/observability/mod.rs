//! Observability utilities.

mod subscriber;
mod tracing;

pub use self::tracing::{DeploymentSpanAttributes, SpanTimer, StackSpanAttributes};
pub use subscriber::{init_tracing, LogFormat};
