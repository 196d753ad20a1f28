pub mod conf;
pub mod telemetry;

pub use conf::{execution_environment, ExecutionEnvironment, Settings, TelemetryConfig};
pub use telemetry::{init_tracing, TracingGuard};
