//! 오늘 다이제스트에 부동산 인사이트를 덧붙인다.
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::{clients::sheets::SheetStore, pipeline::summarize::Summarizer, util::time};

/// Column of the target sheet holding the real-estate insight.
pub const INSIGHT_COLUMN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsightOutcome {
    /// No digest row for today.
    NoSummary { date: String },
    /// The insight was generated but no cell matched today's date.
    RowNotFound { date: String },
    Written { date: String, row: usize },
}

/// 오늘 다이제스트를 읽어 부동산 인사이트를 3열에 기록한다.
pub struct InsightWriter {
    store: Arc<dyn SheetStore>,
    summarizer: Summarizer,
    target_sheet: String,
}

impl InsightWriter {
    pub fn new(store: Arc<dyn SheetStore>, summarizer: Summarizer, target_sheet: impl Into<String>) -> Self {
        Self {
            store,
            summarizer,
            target_sheet: target_sheet.into(),
        }
    }

    /// # Errors
    /// Propagates sheet failures and language model failures.
    pub async fn write(&self, now: DateTime<Utc>) -> Result<InsightOutcome> {
        let today = time::kst_date(now);
        let records = self.store.get_all_values(&self.target_sheet).await?;

        let latest = records
            .iter()
            .rev()
            .find(|row| row.first().is_some_and(|date| *date == today))
            .and_then(|row| row.get(1))
            .filter(|summary| !summary.is_empty());
        let Some(summary) = latest else {
            info!(date = %today, "no digest for today, insight skipped");
            return Ok(InsightOutcome::NoSummary { date: today });
        };

        let insight = self.summarizer.real_estate_insight(summary).await?;

        match self.store.find_cell(&self.target_sheet, &today).await? {
            Some((row, _)) => {
                self.store
                    .update_cell(&self.target_sheet, row, INSIGHT_COLUMN, &insight)
                    .await?;
                info!(date = %today, row, "real-estate insight saved");
                Ok(InsightOutcome::Written { date: today, row })
            }
            None => {
                warn!(date = %today, "today's row not found, insight dropped");
                Ok(InsightOutcome::RowNotFound { date: today })
            }
        }
    }
}
