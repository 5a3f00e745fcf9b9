//! 주간 인사이트: 최근 7일 기사 → 카테고리별 선별 → 주간 시트.
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::{
    clients::sheets::{SheetArticleRow, SheetArticleSource, SheetStore, WEEKLY_HEADERS, group_by_category},
    pipeline::{SelectionStats, summarize::Summarizer},
    scoring::{Article, RelevanceSelector},
    util::time,
};

pub const WEEKLY_SHEET_ROWS: u32 = 100;

#[derive(Debug, Clone)]
pub struct WeeklySettings {
    pub source_sheet: String,
    pub weekly_sheet: String,
    pub top_n: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyOutcome {
    pub date: String,
    /// `None` when the week had no usable rows and nothing was written.
    pub text: Option<String>,
    pub stats: SelectionStats,
}

/// 최근 7일 기사로 카테고리별 주간 인사이트를 만든다.
pub struct WeeklyPublisher {
    store: Arc<dyn SheetStore>,
    selector: Arc<RelevanceSelector>,
    summarizer: Summarizer,
    settings: WeeklySettings,
}

impl WeeklyPublisher {
    pub fn new(
        store: Arc<dyn SheetStore>,
        selector: Arc<RelevanceSelector>,
        summarizer: Summarizer,
        settings: WeeklySettings,
    ) -> Self {
        Self {
            store,
            selector,
            summarizer,
            settings,
        }
    }

    /// # Errors
    /// Propagates sheet read and write failures.
    pub async fn publish(&self, now: DateTime<Utc>) -> Result<WeeklyOutcome> {
        let today = time::kst_date(now);
        let week = time::week_dates(now);
        let source = SheetArticleSource::new(
            Arc::clone(&self.store),
            self.settings.source_sheet.as_str(),
        );
        let mut rows = source.rows_for_dates(&week).await?;

        if rows.is_empty() {
            info!(date = %today, "no articles this week, weekly digest skipped");
            return Ok(WeeklyOutcome {
                date: today,
                text: None,
                stats: SelectionStats::default(),
            });
        }

        // Newest date first; rows of the same date keep sheet order.
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        let groups = group_by_category(rows.iter().map(SheetArticleRow::to_article));

        let mut stats = SelectionStats::default();
        let mut blocks = vec![format!("📅 {today} 주간 경제 뉴스 요약\n")];
        for (category, articles) in groups {
            let selection = self.selector.score(&articles, &category, self.settings.top_n);
            stats.record(&selection);
            let picked = selection.into_articles();
            if picked.is_empty() {
                continue;
            }
            let insight = self.summarizer.weekly_insight(&article_blocks(&picked)).await;
            blocks.push(format!("📌 {category} 인사이트\n{insight}\n"));
        }
        let text = blocks.join("\n\n");

        self.store
            .ensure_worksheet(
                &self.settings.weekly_sheet,
                WEEKLY_SHEET_ROWS,
                2,
                &WEEKLY_HEADERS,
            )
            .await?;
        self.store
            .append_row(&self.settings.weekly_sheet, &[today.clone(), text.clone()])
            .await?;
        println!("{text}");

        info!(date = %today, selected = stats.selected, "weekly digest published");
        Ok(WeeklyOutcome {
            date: today,
            text: Some(text),
            stats,
        })
    }
}

/// `title\nsummary\nlink` per article, separated by blank lines.
#[must_use]
pub fn article_blocks(articles: &[Article]) -> String {
    articles
        .iter()
        .map(|article| format!("{}\n{}\n{}", article.title, article.content, article.link))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_blocks_join_with_blank_lines() {
        let articles = vec![
            Article::new("a", "b", "c", "금리"),
            Article::new("d", "e", "f", "금리"),
        ];
        assert_eq!(article_blocks(&articles), "a\nb\nc\n\nd\ne\nf");
    }
}
