/// Prometheus 메트릭 정의.
use prometheus::{
    Counter, CounterVec, HistogramOpts, HistogramVec, Opts, Registry,
    register_counter_with_registry,
};
use std::sync::Arc;

use crate::pipeline::SelectionStats;

/// Seconds.
const JOB_DURATION_BUCKETS: [f64; 10] = [0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

#[derive(Debug, Clone)]
pub struct Metrics {
    // 기사
    pub articles_collected: Counter,
    pub articles_selected: Counter,
    pub articles_disqualified: Counter,
    pub articles_below_minimum: Counter,
    pub rows_appended: Counter,

    // 언어 모델
    pub llm_requests: Counter,
    pub llm_failures: Counter,

    // 작업
    pub jobs_completed: CounterVec,
    pub jobs_failed: CounterVec,
    pub job_duration: HistogramVec,
}

impl Metrics {
    /// # Errors
    /// Fails when a metric name is already registered in `registry`.
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let jobs_completed = CounterVec::new(
            Opts::new("digest_jobs_completed_total", "Jobs finished without error"),
            &["job"],
        )?;
        let jobs_failed = CounterVec::new(
            Opts::new("digest_jobs_failed_total", "Jobs that returned an error"),
            &["job"],
        )?;
        let job_duration = HistogramVec::new(
            HistogramOpts::new("digest_job_duration_seconds", "Wall-clock duration of jobs")
                .buckets(JOB_DURATION_BUCKETS.to_vec()),
            &["job"],
        )?;
        registry.register(Box::new(jobs_completed.clone()))?;
        registry.register(Box::new(jobs_failed.clone()))?;
        registry.register(Box::new(job_duration.clone()))?;

        Ok(Self {
            articles_collected: register_counter_with_registry!(
                "digest_articles_collected_total",
                "Articles written to the daily archive",
                registry
            )?,
            articles_selected: register_counter_with_registry!(
                "digest_articles_selected_total",
                "Articles picked by the relevance selector",
                registry
            )?,
            articles_disqualified: register_counter_with_registry!(
                "digest_articles_disqualified_total",
                "Articles dropped by the blacklist",
                registry
            )?,
            articles_below_minimum: register_counter_with_registry!(
                "digest_articles_below_minimum_total",
                "Articles dropped by the minimum investment score",
                registry
            )?,
            rows_appended: register_counter_with_registry!(
                "digest_sheet_rows_appended_total",
                "Rows appended to spreadsheets",
                registry
            )?,
            llm_requests: register_counter_with_registry!(
                "digest_llm_requests_total",
                "Language model completions requested",
                registry
            )?,
            llm_failures: register_counter_with_registry!(
                "digest_llm_failures_total",
                "Language model completions that failed after retries",
                registry
            )?,
            jobs_completed,
            jobs_failed,
            job_duration,
        })
    }

    pub fn record_selection(&self, stats: &SelectionStats) {
        self.articles_selected.inc_by(as_f64(stats.selected));
        self.articles_disqualified.inc_by(as_f64(stats.disqualified));
        self.articles_below_minimum.inc_by(as_f64(stats.below_minimum));
    }

    pub fn record_job(&self, job: &str, ok: bool, elapsed_secs: f64) {
        self.job_duration
            .with_label_values(&[job])
            .observe(elapsed_secs);
        if ok {
            self.jobs_completed.with_label_values(&[job]).inc();
        } else {
            self.jobs_failed.with_label_values(&[job]).inc();
        }
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn as_f64(count: usize) -> f64 {
    count as f64
}
