//! Investment-relevance scoring and per-category selection.
//!
//! `total = 0.5 * investment + 0.3 * category + 0.2 * order`, where the order
//! component rewards earlier (more recent) articles. Blacklisted articles and
//! articles below the minimum investment score are dropped before ranking.
mod selector;
mod tables;
mod weights;

pub use selector::{
    Article, BLACKLIST_CONTENT_CHARS, RelevanceSelector, SCORE_CONTENT_CHARS, ScoredArticle,
    Selection,
};
pub use tables::{DEFAULT_MINIMUM_SCORE, RelevanceConfig, RelevanceConfigError};
pub use weights::{Blacklist, KeywordWeights};
