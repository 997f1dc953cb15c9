//! Prometheus exposition for the metrics emitted through the `metrics` macros.
//!
//! [`install`] sets the global recorder and registers help text for every
//! metric name the service emits. `GET /metrics` renders the handle it returns.

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bucket bounds for every `*_seconds` histogram.
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("_seconds".to_string()), LATENCY_BUCKETS)
}

/// Installs the global recorder.
///
/// Must run before the first metric is emitted; earlier values go nowhere.
///
/// # Errors
///
/// Returns [`BuildError`] if a recorder is already installed.
pub fn install() -> Result<PrometheusHandle, BuildError> {
    let handle = builder()?.install_recorder()?;
    describe();
    Ok(handle)
}

/// Builds a recorder without installing it, for scoped use with
/// [`metrics::set_default_local_recorder`].
pub fn local_recorder() -> Result<PrometheusRecorder, BuildError> {
    Ok(builder()?.build_recorder())
}

fn describe() {
    describe_counter!(
        "url_shortener_created_total",
        Unit::Count,
        "Short URLs created (first insert of a long URL)"
    );
    describe_histogram!(
        "url_lookup_latency_seconds",
        Unit::Seconds,
        "Redirect lookup latency by source (cache or store)"
    );
    describe_counter!(
        "url_events_published_total",
        Unit::Count,
        "Events accepted by the event channel"
    );
    describe_histogram!(
        "url_events_publish_latency_seconds",
        Unit::Seconds,
        "Time to publish an event, retries included"
    );
    describe_counter!(
        "url_events_publish_failures_total",
        Unit::Count,
        "Publishes that did not reach the channel, by reason"
    );
    describe_counter!(
        "url_events_dead_lettered_total",
        Unit::Count,
        "Events parked in the dead-letter store"
    );
    describe_counter!(
        "url_events_dropped_total",
        Unit::Count,
        "Events neither published nor dead-lettered, by reason"
    );
    describe_counter!(
        "url_events_consumed_total",
        Unit::Count,
        "Events handled by the consumer"
    );
    describe_gauge!(
        "circuit_breaker_state",
        "Breaker state per dependency (0 closed, 1 half-open, 2 open)"
    );
}

/// Periodically drains histogram samples into their buckets until shutdown.
pub async fn run_upkeep(handle: PrometheusHandle, every: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => handle.run_upkeep(),
        }
    }

    tracing::debug!("Metrics upkeep stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_recorder_renders_labelled_counters() {
        let recorder = local_recorder().unwrap();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("url_events_dropped_total", "topic" => "url_created", "reason" => "abandoned")
                .increment(2);
        });

        let rendered = handle.render();
        assert!(rendered.contains("url_events_dropped_total"));
        assert!(rendered.contains("reason=\"abandoned\""));
        assert!(rendered.contains("} 2"));
    }

    #[test]
    fn test_latency_histograms_use_buckets() {
        let recorder = local_recorder().unwrap();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            metrics::histogram!("url_lookup_latency_seconds", "source" => "cache").record(0.002);
        });

        let rendered = handle.render();
        assert!(rendered.contains("url_lookup_latency_seconds_bucket"));
        assert!(rendered.contains("le=\"0.005\""));
    }
}
