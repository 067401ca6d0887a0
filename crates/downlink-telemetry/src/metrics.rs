//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes a minimal set of counters/gauges relevant to downlink's components.

use std::convert::TryFrom;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: std::sync::Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    organizer_steps_total: IntCounterVec,
    active_downloads: IntGauge,
    queue_depth: IntGauge,
    peers_known: IntGauge,
    nat_active: IntGauge,
}

/// Snapshot of selected gauges for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Downloads currently in the `downloading` state (at most 1, per the
    /// single-worker queue, but exposed as a gauge for observability).
    pub active_downloads: i64,
    /// Downloads currently `queued`.
    pub queue_depth: i64,
    /// Number of registered peers.
    pub peers_known: i64,
    /// `1` if the NAT/UPnP manager is in the `active` state, else `0`.
    pub nat_active: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code"],
        )?;
        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Domain events emitted by type"),
            &["type"],
        )?;
        let organizer_steps_total = IntCounterVec::new(
            Opts::new(
                "organizer_steps_total",
                "Media organizer move/copy steps executed by status",
            ),
            &["step", "status"],
        )?;
        let active_downloads = IntGauge::with_opts(Opts::new(
            "active_downloads",
            "Downloads currently in the downloading state",
        ))?;
        let queue_depth =
            IntGauge::with_opts(Opts::new("queue_depth", "Downloads currently queued"))?;
        let peers_known =
            IntGauge::with_opts(Opts::new("peers_known", "Number of registered peers"))?;
        let nat_active = IntGauge::with_opts(Opts::new(
            "nat_active",
            "1 if the NAT/UPnP manager is in the active state",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(events_emitted_total.clone()))?;
        registry.register(Box::new(organizer_steps_total.clone()))?;
        registry.register(Box::new(active_downloads.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(peers_known.clone()))?;
        registry.register(Box::new(nat_active.clone()))?;

        Ok(Self {
            inner: std::sync::Arc::new(MetricsInner {
                registry,
                http_requests_total,
                events_emitted_total,
                organizer_steps_total,
                active_downloads,
                queue_depth,
                peers_known,
                nat_active,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Increment the media organizer step counter.
    pub fn inc_organizer_step(&self, step: &str, status: &str) {
        self.inner
            .organizer_steps_total
            .with_label_values(&[step, status])
            .inc();
    }

    /// Set the active-downloads gauge.
    pub fn set_active_downloads(&self, count: i64) {
        self.inner.active_downloads.set(count);
    }

    /// Set the queue depth gauge.
    pub fn set_queue_depth(&self, depth: i64) {
        self.inner.queue_depth.set(depth);
    }

    /// Set the known-peers gauge.
    pub fn set_peers_known(&self, count: i64) {
        self.inner.peers_known.set(count);
    }

    /// Set the NAT-active gauge (`1` active, `0` otherwise).
    pub fn set_nat_active(&self, active: bool) {
        self.inner.nat_active.set(i64::from(active));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the most relevant gauges.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_downloads: self.inner.active_downloads.get(),
            queue_depth: self.inner.queue_depth.get(),
            peers_known: self.inner.peers_known.get(),
            nat_active: self.inner.nat_active.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/health", 200);
        metrics.inc_event("download_queued");
        metrics.inc_organizer_step("move", "completed");
        metrics.set_active_downloads(1);
        metrics.set_queue_depth(2);
        metrics.set_peers_known(3);
        metrics.set_nat_active(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_downloads, 1);
        assert_eq!(snapshot.queue_depth, 2);
        assert_eq!(snapshot.peers_known, 3);
        assert_eq!(snapshot.nat_active, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("organizer_steps_total"));
        assert!(rendered.contains("nat_active"));
        Ok(())
    }
}
