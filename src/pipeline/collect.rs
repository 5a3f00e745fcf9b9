//! 랭킹 수집 → 분류 → 본문 추출 → Markdown 아카이브.
use std::{num::NonZeroUsize, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    classification::CategoryTable,
    clients::{
        naver::{RankedLink, RankingSource},
        sheets::CategoryGroup,
    },
    pipeline::report::{archive_path, render_markdown},
    scoring::Article,
    util::time,
};

#[derive(Debug, Clone, Copy)]
pub struct CollectLimits {
    /// Links kept per category, in ranking order.
    pub max_per_category: usize,
    /// Categories with fewer articles are left out of the archive.
    pub min_per_category: usize,
    pub concurrency: NonZeroUsize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectOutcome {
    pub date: String,
    pub path: PathBuf,
    pub links_seen: usize,
    pub categories: Vec<(String, usize)>,
}

impl CollectOutcome {
    #[must_use]
    pub fn articles_written(&self) -> usize {
        self.categories.iter().map(|(_, count)| count).sum()
    }
}

pub struct Collector {
    source: Arc<dyn RankingSource>,
    categories: Arc<CategoryTable>,
    raw_dir: PathBuf,
    limits: CollectLimits,
}

impl Collector {
    pub fn new(
        source: Arc<dyn RankingSource>,
        categories: Arc<CategoryTable>,
        raw_dir: impl Into<PathBuf>,
        limits: CollectLimits,
    ) -> Self {
        Self {
            source,
            categories,
            raw_dir: raw_dir.into(),
            limits,
        }
    }

    /// Fetches today's ranking and writes the archive for the KST date of `now`.
    ///
    /// # Errors
    /// Fails when the ranking page cannot be fetched or the archive cannot be
    /// written. Individual article bodies never fail the run.
    pub async fn collect(&self, now: DateTime<Utc>) -> Result<CollectOutcome> {
        let links = self.source.fetch_ranking().await?;
        info!(links = links.len(), "ranking links fetched");

        let buckets = self.bucket_links(&links);
        let sections = self.fetch_bodies(buckets).await;

        let date = time::kst_date(now);
        let path = archive_path(&self.raw_dir, time::kst_today(now));
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, render_markdown(&date, &sections))
            .await
            .with_context(|| format!("failed to write archive {}", path.display()))?;

        let categories: Vec<(String, usize)> = sections
            .iter()
            .map(|(name, articles)| (name.clone(), articles.len()))
            .collect();
        for (category, count) in &categories {
            info!(%category, count, "category collected");
        }
        info!(path = %path.display(), "archive written");

        Ok(CollectOutcome {
            date,
            path,
            links_seen: links.len(),
            categories,
        })
    }

    /// Classified links per category in table order, each capped at the
    /// maximum and dropped when under the minimum.
    fn bucket_links(&self, links: &[RankedLink]) -> Vec<(String, Vec<RankedLink>)> {
        let mut buckets: Vec<(String, Vec<RankedLink>)> = self
            .categories
            .names()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();

        for link in links {
            let Some(category) = self.categories.classify(&link.title) else {
                continue;
            };
            if let Some((_, bucket)) = buckets.iter_mut().find(|(name, _)| name == category) {
                if bucket.len() < self.limits.max_per_category {
                    bucket.push(link.clone());
                }
            }
        }

        buckets.retain(|(name, bucket)| {
            let keep = bucket.len() >= self.limits.min_per_category;
            if !keep {
                debug!(category = %name, count = bucket.len(), "category below minimum, skipped");
            }
            keep
        });
        buckets
    }

    async fn fetch_bodies(&self, buckets: Vec<(String, Vec<RankedLink>)>) -> Vec<CategoryGroup> {
        let jobs: Vec<(usize, String, RankedLink)> = buckets
            .iter()
            .enumerate()
            .flat_map(|(idx, (name, links))| {
                links.iter().map(move |link| (idx, name.clone(), link.clone()))
            })
            .collect();

        let source = &self.source;
        let fetched: Vec<(usize, Article)> = stream::iter(jobs)
            .map(|(idx, category, link)| async move {
                let body = source.extract_first_paragraph(&link.link).await;
                let article = Article {
                    title: link.title,
                    content: body.into_text(),
                    link: link.link,
                    category,
                };
                (idx, article)
            })
            .buffered(self.limits.concurrency.get())
            .collect()
            .await;

        let mut sections: Vec<CategoryGroup> = buckets
            .into_iter()
            .map(|(name, _)| (name, Vec::new()))
            .collect();
        for (idx, article) in fetched {
            sections[idx].1.push(article);
        }
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::naver::{BODY_NOT_FOUND, BodyExtract};
    use async_trait::async_trait;

    struct FakeRanking {
        links: Vec<RankedLink>,
    }

    #[async_trait]
    impl RankingSource for FakeRanking {
        async fn fetch_ranking(&self) -> Result<Vec<RankedLink>> {
            Ok(self.links.clone())
        }

        async fn extract_first_paragraph(&self, link: &str) -> BodyExtract {
            if link.ends_with("/missing") {
                BodyExtract::NotFound
            } else {
                BodyExtract::Paragraph(format!("{link} 본문"))
            }
        }
    }

    fn link(title: &str, path: &str) -> RankedLink {
        RankedLink {
            title: title.to_string(),
            link: format!("https://n{path}"),
        }
    }

    fn collector(links: Vec<RankedLink>, raw_dir: PathBuf, max: usize) -> Collector {
        Collector::new(
            Arc::new(FakeRanking { links }),
            Arc::new(CategoryTable::builtin().expect("builtin table")),
            raw_dir,
            CollectLimits {
                max_per_category: max,
                min_per_category: 3,
                concurrency: NonZeroUsize::new(2).expect("non-zero"),
            },
        )
    }

    fn now() -> DateTime<Utc> {
        // 2025-05-12 07:00 KST
        DateTime::parse_from_rfc3339("2025-05-11T22:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn collect_writes_categories_meeting_minimum() {
        let dir = tempfile::tempdir().expect("temp dir");
        let links = vec![
            link("한은 기준금리 동결", "/r1"),
            link("서울 아파트 신고가", "/a1"),
            link("연준 금리 인하 시사", "/r2"),
            link("전세 매물 감소", "/a2"),
            link("삼성전자 실적", "/x"),
            link("채권 금리 급등", "/r3"),
            link("엔비디아 급등", "/s1"),
        ];

        let outcome = collector(links, dir.path().to_path_buf(), 10)
            .collect(now())
            .await
            .expect("collect");

        assert_eq!(outcome.date, "2025-05-12");
        assert_eq!(outcome.links_seen, 7);
        assert_eq!(outcome.categories, vec![("금리".to_string(), 3)]);
        assert_eq!(
            outcome.path,
            dir.path().join("2025/05/output_2025-05-12.md")
        );

        let markdown = std::fs::read_to_string(&outcome.path).expect("archive");
        assert!(markdown.contains("## 📌 금리"));
        assert!(!markdown.contains("## 📌 부동산"));
        assert!(markdown.contains("1. **한은 기준금리 동결**\n   - https://n/r1 본문"));
        assert!(markdown.contains("3. **채권 금리 급등**"));
    }

    #[tokio::test]
    async fn collect_caps_each_category_and_keeps_sentinels() {
        let dir = tempfile::tempdir().expect("temp dir");
        let links = vec![
            link("아파트 1", "/a1"),
            link("아파트 2", "/missing"),
            link("아파트 3", "/a3"),
            link("아파트 4", "/a4"),
        ];

        let outcome = collector(links, dir.path().to_path_buf(), 3)
            .collect(now())
            .await
            .expect("collect");

        assert_eq!(outcome.articles_written(), 3);
        let markdown = std::fs::read_to_string(&outcome.path).expect("archive");
        assert!(markdown.contains(BODY_NOT_FOUND));
        assert!(!markdown.contains("아파트 4"));
    }

    #[tokio::test]
    async fn empty_ranking_writes_header_only() {
        let dir = tempfile::tempdir().expect("temp dir");

        let outcome = collector(Vec::new(), dir.path().to_path_buf(), 10)
            .collect(now())
            .await
            .expect("collect");

        assert!(outcome.categories.is_empty());
        let markdown = std::fs::read_to_string(&outcome.path).expect("archive");
        assert_eq!(markdown, "# 📅 2025-05-12 네이버 경제 키워드 뉴스 요약\n\n");
    }
}
