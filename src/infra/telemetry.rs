use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global tracing subscriber and register metric descriptions.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "memoria_post_submissions_total",
            Unit::Count,
            "Post create/update/delete submissions by operation and outcome."
        );
        describe_histogram!(
            "memoria_post_submit_duration_ms",
            Unit::Milliseconds,
            "Post submission latency in milliseconds, including uploads."
        );
        describe_counter!(
            "memoria_media_uploads_total",
            Unit::Count,
            "Media objects written to storage by outcome."
        );
        describe_counter!(
            "memoria_storage_cleanup_warnings_total",
            Unit::Count,
            "Storage or record cleanup steps that failed without failing the operation."
        );
    });
}
