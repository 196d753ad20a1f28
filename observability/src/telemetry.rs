use crate::conf::{execution_environment, TelemetryConfig};
use anyhow::Context;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling::never};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::{layer, Layer as FmtLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the background log writer alive. Dropping it flushes the log file.
#[must_use = "dropping the guard stops the file writer"]
pub struct TracingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured log level. When a log
/// directory is configured, a plain-text copy of every event is written to
/// `<log_dir>/<prefix>` through a non-blocking writer.
pub fn init_tracing(settings: &TelemetryConfig) -> anyhow::Result<TracingGuard> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(settings.log_level())
            .with_context(|| format!("Invalid log level {}", settings.log_level()))?,
    };

    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    if settings.json_logs() {
        layers.push(
            fmt_layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
        );
    } else {
        layers.push(fmt_layer().boxed());
    }

    let file_guard = match settings.log_dir() {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = never(dir, settings.log_file_prefix());
            let (writer, guard) = non_blocking(file_appender);
            layers.push(
                layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to initialize tracing")?;

    info!(
        service = settings.tracing_service_name(),
        environment = %execution_environment(),
        "Tracing initialized"
    );

    Ok(TracingGuard {
        _file_guard: file_guard,
    })
}

fn fmt_layer<S>() -> FmtLayer<S> {
    layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NONE)
}
