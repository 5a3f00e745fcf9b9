use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    config::Config,
    scheduler::{
        cadence::{Cadence, DailyCadence, WeeklyCadence},
        jobs::{JobKind, Scheduler},
    },
    util::time::{self, kst},
};

/// Spawns the daily batch (collect through dashboard) and the weekly digest.
///
/// # Errors
/// Configured trigger times out of range.
pub fn spawn_kst_daemons(scheduler: &Scheduler, config: &Config) -> Result<Vec<JoinHandle<()>>> {
    let tz = kst();
    let daily = DailyCadence::new(tz, config.daily_run_hour(), config.daily_run_minute())?;
    let weekly = WeeklyCadence::new(tz, config.weekly_run_weekday(), config.weekly_run_hour(), 0)?;

    Ok(vec![
        BatchDaemon::new(scheduler.clone(), Box::new(daily), JobKind::DailyBatch, tz).spawn(),
        BatchDaemon::new(scheduler.clone(), Box::new(weekly), JobKind::Weekly, tz).spawn(),
    ])
}

struct BatchDaemon {
    scheduler: Scheduler,
    cadence: Box<dyn Cadence>,
    kind: JobKind,
    tz: FixedOffset,
}

impl BatchDaemon {
    fn new(scheduler: Scheduler, cadence: Box<dyn Cadence>, kind: JobKind, tz: FixedOffset) -> Self {
        Self {
            scheduler,
            cadence,
            kind,
            tz,
        }
    }

    fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        loop {
            let now = time::now();
            let next = self.cadence.next_run_from(now);
            let wait = duration_until(next, now);
            info!(
                job = self.kind.as_str(),
                next_run_utc = %next.to_rfc3339(),
                next_run_kst = %next.with_timezone(&self.tz).to_rfc3339(),
                wait_seconds = wait.as_secs(),
                "scheduled automatic run"
            );
            sleep(wait).await;

            let run_id = Uuid::new_v4();
            match self.scheduler.run(run_id, self.kind, time::now()).await {
                Ok(_) => info!(%run_id, job = self.kind.as_str(), "automatic run completed"),
                Err(err) => error!(%run_id, job = self.kind.as_str(), error = %err, "automatic run failed"),
            }
            // 같은 트리거 시각에 두 번 돌지 않도록.
            sleep(Duration::from_secs(1)).await;
        }
    }
}

fn duration_until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_until_clamps_past_instants_to_zero() {
        let now = time::now();
        assert_eq!(duration_until(now - chrono::Duration::seconds(5), now), Duration::ZERO);
        assert_eq!(
            duration_until(now + chrono::Duration::seconds(90), now),
            Duration::from_secs(90)
        );
    }
}
