use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::util::text::leading_chars;

use super::{tables::RelevanceConfig, weights::KeywordWeights};

/// Characters of content scanned by the blacklist.
pub const BLACKLIST_CONTENT_CHARS: usize = 500;
/// Characters of content scanned by the weight tables.
pub const SCORE_CONTENT_CHARS: usize = 200;

const TITLE_MULTIPLIER: i64 = 2;
const CONTENT_MULTIPLIER: i64 = 1;

const INVESTMENT_WEIGHT: f64 = 0.5;
const CATEGORY_WEIGHT: f64 = 0.3;
const ORDER_WEIGHT: f64 = 0.2;

/// 수집된 기사 한 건. 본문이 없으면 빈 문자열이다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub content: String,
    pub link: String,
    pub category: String,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        link: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            link: link.into(),
            category: category.into(),
        }
    }
}

/// Scores of one article that survived the filters.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredArticle {
    pub article: Article,
    /// Position in the original input list.
    pub index: usize,
    pub investment_score: i64,
    pub category_score: i64,
    pub order_score: i64,
    pub total_score: f64,
}

/// Outcome of one scoring call, sorted by `total_score` descending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub ranked: Vec<ScoredArticle>,
    pub top_n: usize,
    pub input_count: usize,
    pub disqualified: usize,
    pub below_minimum: usize,
}

impl Selection {
    pub fn selected(&self) -> impl Iterator<Item = &ScoredArticle> {
        self.ranked.iter().take(self.top_n)
    }

    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.ranked.len().min(self.top_n)
    }

    #[must_use]
    pub fn into_articles(self) -> Vec<Article> {
        self.ranked
            .into_iter()
            .take(self.top_n)
            .map(|scored| scored.article)
            .collect()
    }
}

/// 투자 관련도 점수로 카테고리별 상위 기사를 고른다.
///
/// Pure and synchronous; the configuration is shared read-only, so one
/// selector can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct RelevanceSelector {
    config: Arc<RelevanceConfig>,
}

impl RelevanceSelector {
    #[must_use]
    pub fn new(config: Arc<RelevanceConfig>) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &RelevanceConfig {
        &self.config
    }

    /// Top `top_n` articles of `category`, best first.
    #[must_use]
    pub fn select(&self, articles: &[Article], category: &str, top_n: usize) -> Vec<Article> {
        self.score(articles, category, top_n).into_articles()
    }

    /// Full scoring pass with filter counts, for callers that log or record
    /// metrics.
    #[must_use]
    pub fn score(&self, articles: &[Article], category: &str, top_n: usize) -> Selection {
        let count = articles.len();
        let mut selection = Selection {
            top_n,
            input_count: count,
            ..Selection::default()
        };

        for (index, article) in articles.iter().enumerate() {
            if let Some(blacklist) = &self.config.blacklist {
                let haystack = format!(
                    "{}{}",
                    article.title,
                    leading_chars(&article.content, BLACKLIST_CONTENT_CHARS)
                );
                if let Some(keyword) = blacklist.first_hit(&haystack) {
                    debug!(index, category, keyword, title = %article.title, "article disqualified");
                    selection.disqualified += 1;
                    continue;
                }
            }

            let investment_score = self.investment_score(article);
            let minimum = self.config.minimum_score.unwrap_or(i64::MIN);
            if investment_score < minimum {
                debug!(
                    index,
                    category,
                    investment_score,
                    minimum,
                    title = %article.title,
                    "article below minimum investment score"
                );
                selection.below_minimum += 1;
                continue;
            }

            let category_score = self.category_score(article, category);
            let order_score = i64::try_from(count - index).unwrap_or(i64::MAX);
            let total_score = composite(investment_score, category_score, order_score);

            debug!(
                index,
                category,
                investment_score,
                category_score,
                order_score,
                total_score,
                title = %article.title,
                "article scored"
            );

            selection.ranked.push(ScoredArticle {
                article: article.clone(),
                index,
                investment_score,
                category_score,
                order_score,
                total_score,
            });
        }

        // sort_by is stable: equal totals keep input order.
        selection
            .ranked
            .sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        selection
    }

    fn investment_score(&self, article: &Article) -> i64 {
        let table = &self.config.investment_weights;
        keyword_score(table, article)
    }

    fn category_score(&self, article: &Article, category: &str) -> i64 {
        self.config
            .category_table(category)
            .map_or(0, |table| keyword_score(table, article))
    }
}

fn keyword_score(table: &KeywordWeights, article: &Article) -> i64 {
    let title = table.weight_sum(&article.title);
    let content = table.weight_sum(leading_chars(&article.content, SCORE_CONTENT_CHARS));
    title
        .saturating_mul(TITLE_MULTIPLIER)
        .saturating_add(content.saturating_mul(CONTENT_MULTIPLIER))
}

#[allow(clippy::cast_precision_loss)]
fn composite(investment_score: i64, category_score: i64, order_score: i64) -> f64 {
    INVESTMENT_WEIGHT * investment_score as f64
        + CATEGORY_WEIGHT * category_score as f64
        + ORDER_WEIGHT * order_score as f64
}
