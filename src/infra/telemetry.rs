use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::render::{
    METRIC_CACHE_HIT, METRIC_CACHE_INVALID, METRIC_CACHE_MISS, METRIC_DAEMON_REQUEST_MS,
    METRIC_RENDER_FAILURE,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
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
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Renders served from a valid cache entry."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Renders that had to call a LaTeXML daemon."
        );
        describe_counter!(
            METRIC_CACHE_INVALID,
            Unit::Count,
            "Cache entries discarded because their MathML failed validation."
        );
        describe_counter!(
            METRIC_RENDER_FAILURE,
            Unit::Count,
            "Failed renders, labelled by failure kind."
        );
        describe_histogram!(
            METRIC_DAEMON_REQUEST_MS,
            Unit::Milliseconds,
            "LaTeXML daemon request latency in milliseconds."
        );
    });
}
