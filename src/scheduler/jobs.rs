use std::{fmt, future::Future, path::PathBuf, str::FromStr, sync::Arc, time::Instant};

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::{
    clients::{discord::DiscordNotifier, sheets::SheetStore},
    config::Config,
    observability::metrics::{Metrics, as_f64},
    pipeline::{
        collect::{CollectOutcome, Collector},
        daily::{DailyOutcome, DailyPublisher, DailySettings},
        dashboard::{DashboardGenerator, DashboardOutcome},
        insight::{InsightOutcome, InsightWriter},
        summarize::Summarizer,
        upload::{UploadOutcome, Uploader},
        weekly::{WeeklyOutcome, WeeklyPublisher, WeeklySettings},
    },
    scoring::RelevanceSelector,
    util::time,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    Collect,
    Upload,
    Daily,
    Weekly,
    Insight,
    Dashboard,
    /// collect → upload → daily → insight → dashboard
    DailyBatch,
}

impl JobKind {
    pub const ALL: [Self; 7] = [
        Self::Collect,
        Self::Upload,
        Self::Daily,
        Self::Weekly,
        Self::Insight,
        Self::Dashboard,
        Self::DailyBatch,
    ];

    const BATCH_STEPS: [Self; 5] = [
        Self::Collect,
        Self::Upload,
        Self::Daily,
        Self::Insight,
        Self::Dashboard,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collect => "collect",
            Self::Upload => "upload",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Insight => "insight",
            Self::Dashboard => "dashboard",
            Self::DailyBatch => "daily-batch",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown job kind: {0}")]
pub struct UnknownJobKind(pub String);

impl FromStr for JobKind {
    type Err = UnknownJobKind;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| UnknownJobKind(raw.to_string()))
    }
}

/// What one job produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "job", rename_all = "kebab-case")]
pub enum JobOutput {
    Collect(CollectOutcome),
    Upload(UploadOutcome),
    Daily(DailyOutcome),
    Weekly(WeeklyOutcome),
    Insight(InsightOutcome),
    Dashboard(DashboardOutcome),
    DailyBatch { steps: Vec<JobOutput> },
}

/// Sheet names and paths the jobs share.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub source_sheet: String,
    pub target_sheet: String,
    pub weekly_sheet: String,
    pub ranking_url: String,
    pub top_n: usize,
    pub raw_dir: PathBuf,
    pub dashboard_dir: PathBuf,
}

impl JobSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_sheet: config.source_sheet().to_string(),
            target_sheet: config.target_sheet().to_string(),
            weekly_sheet: config.weekly_sheet().to_string(),
            ranking_url: config.news_ranking_url().to_string(),
            top_n: config.digest_top_n(),
            raw_dir: config.raw_archive_dir(),
            dashboard_dir: config.dashboard_dir().clone(),
        }
    }
}

/// Runs digest jobs on demand. Cloning shares the same components.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    settings: JobSettings,
    collector: Arc<Collector>,
    store: Option<Arc<dyn SheetStore>>,
    summarizer: Option<Summarizer>,
    selector: Arc<RelevanceSelector>,
    notifier: DiscordNotifier,
    metrics: Arc<Metrics>,
}

impl Scheduler {
    pub fn new(
        settings: JobSettings,
        collector: Arc<Collector>,
        store: Option<Arc<dyn SheetStore>>,
        summarizer: Option<Summarizer>,
        selector: Arc<RelevanceSelector>,
        notifier: DiscordNotifier,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                collector,
                store,
                summarizer,
                selector,
                notifier,
                metrics,
            }),
        }
    }

    #[must_use]
    pub fn sheets_configured(&self) -> bool {
        self.inner.store.is_some()
    }

    #[must_use]
    pub fn model_configured(&self) -> bool {
        self.inner.summarizer.is_some()
    }

    /// Runs `kind` at the current time under a fresh run id.
    ///
    /// # Errors
    /// See [`Scheduler::run`].
    pub async fn run_now(&self, kind: JobKind) -> Result<JobOutput> {
        self.run(Uuid::new_v4(), kind, time::now()).await
    }

    /// Runs one job: failures are reported to Discord, duration and outcome
    /// are recorded as metrics.
    ///
    /// # Errors
    /// Whatever the job returns, including missing components.
    pub async fn run(&self, run_id: Uuid, kind: JobKind, now: DateTime<Utc>) -> Result<JobOutput> {
        self.reported(run_id, kind, now, self.execute(kind, now)).await
    }

    /// `upload --date`: uploads the archive of `date` under the same
    /// reporting and metrics as [`Scheduler::run`].
    ///
    /// # Errors
    /// Missing archive, missing sheet store, or a sheet write failure.
    pub async fn run_upload_for(&self, date: NaiveDate) -> Result<JobOutput> {
        let job = async { Ok(JobOutput::Upload(self.upload(date).await?)) };
        self.reported(Uuid::new_v4(), JobKind::Upload, time::now(), job)
            .await
    }

    async fn reported<F>(
        &self,
        run_id: Uuid,
        kind: JobKind,
        now: DateTime<Utc>,
        job: F,
    ) -> Result<JobOutput>
    where
        F: Future<Output = Result<JobOutput>>,
    {
        let span = info_span!(
            "job",
            %run_id,
            job = kind.as_str(),
            kst = %time::formatted_datetime(now),
            weekend = time::is_weekend(now)
        );
        async {
            let started = Instant::now();
            let result = self
                .inner
                .notifier
                .run_reported(kind.as_str(), kind == JobKind::DailyBatch, job)
                .await;
            self.inner
                .metrics
                .record_job(kind.as_str(), result.is_ok(), started.elapsed().as_secs_f64());
            result
        }
        .instrument(span)
        .await
    }

    async fn upload(&self, date: NaiveDate) -> Result<UploadOutcome> {
        let uploader = Uploader::new(
            self.store()?,
            self.inner.settings.source_sheet.as_str(),
            self.inner.settings.raw_dir.as_path(),
        );
        let outcome = uploader.upload(date).await?;
        self.inner.metrics.rows_appended.inc_by(as_f64(outcome.rows_appended));
        Ok(outcome)
    }

    async fn execute(&self, kind: JobKind, now: DateTime<Utc>) -> Result<JobOutput> {
        if kind == JobKind::DailyBatch {
            let mut steps = Vec::with_capacity(JobKind::BATCH_STEPS.len());
            for step in JobKind::BATCH_STEPS {
                info!(step = step.as_str(), "daily batch step started");
                steps.push(self.execute_step(step, now).await?);
            }
            return Ok(JobOutput::DailyBatch { steps });
        }
        self.execute_step(kind, now).await
    }

    async fn execute_step(&self, kind: JobKind, now: DateTime<Utc>) -> Result<JobOutput> {
        let inner = &self.inner;
        let settings = &inner.settings;
        match kind {
            JobKind::Collect => {
                let outcome = inner.collector.collect(now).await?;
                inner.metrics.articles_collected.inc_by(as_f64(outcome.articles_written()));
                Ok(JobOutput::Collect(outcome))
            }
            JobKind::Upload => Ok(JobOutput::Upload(self.upload(time::kst_today(now)).await?)),
            JobKind::Daily => {
                let publisher = DailyPublisher::new(
                    self.store()?,
                    Arc::clone(&inner.selector),
                    self.summarizer()?,
                    DailySettings {
                        source_sheet: settings.source_sheet.clone(),
                        target_sheet: settings.target_sheet.clone(),
                        ranking_url: settings.ranking_url.clone(),
                        top_n: settings.top_n,
                    },
                );
                let outcome = publisher.publish(now).await?;
                inner.metrics.record_selection(&outcome.stats);
                inner.metrics.rows_appended.inc();
                Ok(JobOutput::Daily(outcome))
            }
            JobKind::Weekly => {
                let publisher = WeeklyPublisher::new(
                    self.store()?,
                    Arc::clone(&inner.selector),
                    self.summarizer()?,
                    WeeklySettings {
                        source_sheet: settings.source_sheet.clone(),
                        weekly_sheet: settings.weekly_sheet.clone(),
                        top_n: settings.top_n,
                    },
                );
                let outcome = publisher.publish(now).await?;
                inner.metrics.record_selection(&outcome.stats);
                if outcome.text.is_some() {
                    inner.metrics.rows_appended.inc();
                }
                Ok(JobOutput::Weekly(outcome))
            }
            JobKind::Insight => {
                let writer = InsightWriter::new(
                    self.store()?,
                    self.summarizer()?,
                    settings.target_sheet.as_str(),
                );
                Ok(JobOutput::Insight(writer.write(now).await?))
            }
            JobKind::Dashboard => {
                let generator = DashboardGenerator::new(
                    self.store()?,
                    settings.target_sheet.as_str(),
                    settings.dashboard_dir.as_path(),
                );
                Ok(JobOutput::Dashboard(generator.generate().await?))
            }
            JobKind::DailyBatch => Err(anyhow!("daily batch cannot be nested")),
        }
    }

    fn store(&self) -> Result<Arc<dyn SheetStore>> {
        self.inner
            .store
            .clone()
            .ok_or_else(|| anyhow!("sheet store not configured (GOOGLE_CREDENTIALS or GOOGLE_CREDENTIALS_FILE)"))
    }

    fn summarizer(&self) -> Result<Summarizer> {
        self.inner
            .summarizer
            .clone()
            .ok_or_else(|| anyhow!("language model not configured (ANTHROPIC_API_KEY)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("collect", JobKind::Collect)]
    #[case("daily", JobKind::Daily)]
    #[case("daily-batch", JobKind::DailyBatch)]
    #[case("dashboard", JobKind::Dashboard)]
    fn job_kind_parses_its_own_name(#[case] raw: &str, #[case] expected: JobKind) {
        assert_eq!(raw.parse::<JobKind>(), Ok(expected));
        assert_eq!(expected.to_string(), raw);
    }

    #[test]
    fn unknown_job_kind_is_rejected() {
        assert_eq!(
            "reindex".parse::<JobKind>(),
            Err(UnknownJobKind("reindex".to_string()))
        );
    }

    #[test]
    fn every_kind_round_trips_through_its_name() {
        for kind in JobKind::ALL {
            assert_eq!(kind.as_str().parse::<JobKind>(), Ok(kind));
        }
    }
}
