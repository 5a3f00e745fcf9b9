pub mod metrics;
pub(crate) mod tracing;

use std::sync::Arc;

use anyhow::Result;
use prometheus::{Encoder, Registry, TextEncoder};

use self::metrics::Metrics;

/// 메트릭 레지스트리와 트레이싱 초기화를 묶는다.
#[derive(Debug, Clone)]
pub struct Telemetry {
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl Telemetry {
    /// Installs the tracing subscriber (once per process) and registers metrics.
    ///
    /// # Errors
    /// Fails when the subscriber or a metric cannot be registered.
    pub fn new() -> Result<Self> {
        tracing::init()?;
        Self::without_tracing()
    }

    /// Metrics only, for tests and embedders that own the subscriber.
    ///
    /// # Errors
    /// Fails when a metric cannot be registered.
    pub fn without_tracing() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(Arc::clone(&registry))?);
        Ok(Self { registry, metrics })
    }

    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    #[must_use]
    pub fn metrics_handle(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn record_ready_probe(&self) {
        ::tracing::debug!("service ready probe");
    }

    pub fn record_live_probe(&self) {
        ::tracing::debug!("service live probe");
    }

    /// Prometheus text exposition of this registry.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_prometheus_exposes_own_registry() {
        let telemetry = Telemetry::without_tracing().expect("telemetry");
        telemetry.metrics().articles_collected.inc_by(3.0);

        let text = telemetry.render_prometheus();

        assert!(text.contains("digest_articles_collected_total 3"));
    }

    #[test]
    fn separate_instances_do_not_collide() {
        let first = Telemetry::without_tracing().expect("first");
        let second = Telemetry::without_tracing().expect("second");
        first.metrics().record_job("daily", true, 0.1);
        assert!(first.render_prometheus().contains("digest_jobs_completed_total{job=\"daily\"} 1"));
        assert!(!second.render_prometheus().contains("digest_jobs_completed_total"));
    }
}
