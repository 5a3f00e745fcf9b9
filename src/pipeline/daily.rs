//! 일간 다이제스트: 오늘 기사 → 카테고리별 선별 → 메시지 → 결과 시트.
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    clients::sheets::{CategoryGroup, SheetArticleSource, SheetStore, TARGET_HEADERS},
    pipeline::{SelectionStats, summarize::Summarizer},
    scoring::{Article, RelevanceSelector},
    util::time,
};

pub const TARGET_SHEET_ROWS: u32 = 100;

#[derive(Debug, Clone)]
pub struct DailySettings {
    pub source_sheet: String,
    pub target_sheet: String,
    pub ranking_url: String,
    pub top_n: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyOutcome {
    pub date: String,
    pub message: String,
    pub categories: usize,
    pub stats: SelectionStats,
}

/// One category block of the message, already summarized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSection {
    pub category: String,
    pub trend: String,
    pub items: Vec<DigestItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestItem {
    pub title: String,
    pub summary: String,
}

pub struct DailyPublisher {
    store: Arc<dyn SheetStore>,
    selector: Arc<RelevanceSelector>,
    summarizer: Summarizer,
    settings: DailySettings,
}

impl DailyPublisher {
    pub fn new(
        store: Arc<dyn SheetStore>,
        selector: Arc<RelevanceSelector>,
        summarizer: Summarizer,
        settings: DailySettings,
    ) -> Self {
        Self {
            store,
            selector,
            summarizer,
            settings,
        }
    }

    /// # Errors
    /// Propagates sheet read and write failures. Summaries fall back instead
    /// of failing.
    pub async fn publish(&self, now: DateTime<Utc>) -> Result<DailyOutcome> {
        let today = time::kst_date(now);
        let source = SheetArticleSource::new(
            Arc::clone(&self.store),
            self.settings.source_sheet.as_str(),
        );
        let groups = source.grouped_for_date(&today).await?;
        info!(date = %today, categories = groups.len(), "today's articles loaded");

        let (selected, stats) = self.select(groups);
        let mut sections = Vec::with_capacity(selected.len());
        for (category, articles) in selected {
            sections.push(self.summarize_section(category, &articles).await);
        }

        let message = compose_message(
            &time::kst_date_with_weekday(now),
            &sections,
            &self.settings.ranking_url,
        );

        self.store
            .ensure_worksheet(
                &self.settings.target_sheet,
                TARGET_SHEET_ROWS,
                3,
                &TARGET_HEADERS,
            )
            .await?;
        self.store
            .append_row(
                &self.settings.target_sheet,
                &[today.clone(), message.clone(), String::new()],
            )
            .await?;
        println!("{message}");

        info!(date = %today, sections = sections.len(), selected = stats.selected, "daily digest published");
        Ok(DailyOutcome {
            date: today,
            message,
            categories: sections.len(),
            stats,
        })
    }

    fn select(&self, groups: Vec<CategoryGroup>) -> (Vec<CategoryGroup>, SelectionStats) {
        let mut stats = SelectionStats::default();
        let selected = groups
            .into_iter()
            .filter_map(|(category, articles)| {
                let selection = self.selector.score(&articles, &category, self.settings.top_n);
                stats.record(&selection);
                let picked = selection.into_articles();
                if picked.is_empty() {
                    debug!(%category, "no article survived selection");
                    None
                } else {
                    Some((category, picked))
                }
            })
            .collect();
        (selected, stats)
    }

    async fn summarize_section(
        &self,
        category: String,
        articles: &[Article],
    ) -> DigestSection {
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        let trend = self.summarizer.category_trend(&titles).await;
        let mut items = Vec::with_capacity(articles.len());
        for article in articles {
            items.push(DigestItem {
                title: self.summarizer.summarize_title(&article.title).await,
                summary: self.summarizer.summarize_content(&article.content).await,
            });
        }
        DigestSection {
            category,
            trend,
            items,
        }
    }
}

/// KakaoTalk-style digest text.
#[must_use]
pub fn compose_message(date_label: &str, sections: &[DigestSection], ranking_url: &str) -> String {
    let mut lines = vec![format!("📅 {date_label} 경제뉴스입니다\n")];
    for section in sections {
        lines.push(format!("【{}】", section.category));
        lines.push(format!("💡 {}\n", section.trend));
        for (idx, item) in section.items.iter().enumerate() {
            lines.push(format!("{}. {}", idx + 1, item.title));
            lines.push(format!("   → {}", item.summary));
            if idx + 1 < section.items.len() {
                lines.push(String::new());
            }
        }
        lines.push(String::new());
    }
    lines.push("📌 전체뉴스".to_string());
    lines.push(ranking_url.to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_message_spaces_items_and_sections() {
        let sections = vec![DigestSection {
            category: "금리".to_string(),
            trend: "금리 동결 기조".to_string(),
            items: vec![
                DigestItem {
                    title: "한은 금리 동결".to_string(),
                    summary: "물가 안정 우선".to_string(),
                },
                DigestItem {
                    title: "연준 인하 시사".to_string(),
                    summary: "고용 둔화 반영".to_string(),
                },
            ],
        }];

        let message = compose_message("05/12(월)", &sections, "https://rank");

        assert_eq!(
            message,
            "📅 05/12(월) 경제뉴스입니다\n\n\
             【금리】\n\
             💡 금리 동결 기조\n\n\
             1. 한은 금리 동결\n   → 물가 안정 우선\n\n\
             2. 연준 인하 시사\n   → 고용 둔화 반영\n\n\
             📌 전체뉴스\nhttps://rank"
        );
    }

    #[test]
    fn compose_message_without_sections_keeps_header_and_link() {
        assert_eq!(
            compose_message("05/12(월)", &[], "https://rank"),
            "📅 05/12(월) 경제뉴스입니다\n\n📌 전체뉴스\nhttps://rank"
        );
    }
}
