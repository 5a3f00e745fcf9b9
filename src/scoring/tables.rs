/// Relevance configuration: weight tables, blacklist and minimum score.
///
/// Built-in defaults cover the three digest categories; a YAML file can
/// replace them wholesale (see `config/keywords.yaml`).
use std::{collections::HashMap, path::Path};

use serde::Deserialize;
use thiserror::Error;

use super::weights::{Blacklist, KeywordWeights};

pub const DEFAULT_MINIMUM_SCORE: i64 = 10;

#[derive(Debug, Error)]
pub enum RelevanceConfigError {
    #[error("failed to read relevance config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse relevance config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to compile keyword automaton: {0}")]
    Automaton(#[from] aho_corasick::BuildError),
}

/// Immutable scoring configuration shared by every selector call.
#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceConfig {
    pub investment_weights: KeywordWeights,
    #[serde(default)]
    pub category_weights: HashMap<String, KeywordWeights>,
    #[serde(default)]
    pub blacklist: Option<Blacklist>,
    #[serde(default = "default_minimum_score")]
    pub minimum_score: Option<i64>,
}

#[allow(clippy::unnecessary_wraps)]
fn default_minimum_score() -> Option<i64> {
    Some(DEFAULT_MINIMUM_SCORE)
}

impl RelevanceConfig {
    /// Config with the given tables, no blacklist and the default minimum score.
    #[must_use]
    pub fn new(
        investment_weights: KeywordWeights,
        category_weights: HashMap<String, KeywordWeights>,
    ) -> Self {
        Self {
            investment_weights,
            category_weights,
            blacklist: None,
            minimum_score: default_minimum_score(),
        }
    }

    #[must_use]
    pub fn with_blacklist(mut self, blacklist: Option<Blacklist>) -> Self {
        self.blacklist = blacklist;
        self
    }

    #[must_use]
    pub fn with_minimum_score(mut self, minimum_score: Option<i64>) -> Self {
        self.minimum_score = minimum_score;
        self
    }

    #[must_use]
    pub fn category_table(&self, category: &str) -> Option<&KeywordWeights> {
        self.category_weights.get(category)
    }

    /// # Errors
    /// Returns [`RelevanceConfigError::Parse`] on malformed YAML.
    pub fn from_yaml_str(raw: &str) -> Result<Self, RelevanceConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// # Errors
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, RelevanceConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RelevanceConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Loads `path` when given, otherwise the built-in tables.
    ///
    /// # Errors
    /// Propagates [`RelevanceConfig::load`] and automaton build failures.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, RelevanceConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    /// 기본 투자 관련도 가중치.
    ///
    /// # Errors
    /// Only fails if the automaton cannot be compiled.
    pub fn builtin() -> Result<Self, RelevanceConfigError> {
        let investment_weights = KeywordWeights::from_pairs([
            ("금리", 10),
            ("기준금리", 10),
            ("연준", 8),
            ("집값", 7),
            ("인상", 6),
            ("인하", 6),
            ("물가", 6),
            ("부동산", 6),
            ("대출", 6),
            ("채권", 6),
            ("증시", 6),
            ("코스피", 6),
            ("나스닥", 6),
            ("수익률", 6),
            ("환율", 5),
            ("주가", 5),
            ("투자", 5),
            ("실적", 5),
            ("배당", 5),
            ("아파트", 5),
            ("청약", 5),
            ("반도체", 5),
            ("ETF", 5),
            ("매매", 4),
            ("전세", 4),
            ("상승", 3),
            ("하락", 3),
        ])?;

        let mut category_weights = HashMap::new();
        category_weights.insert(
            "부동산".to_string(),
            KeywordWeights::from_pairs([
                ("재건축", 5),
                ("실거래", 5),
                ("집값", 5),
                ("분양", 4),
                ("전세", 4),
                ("규제", 4),
                ("공급", 3),
                ("강남", 3),
            ])?,
        );
        category_weights.insert(
            "금리".to_string(),
            KeywordWeights::from_pairs([
                ("인상", 5),
                ("인하", 5),
                ("기준금리", 5),
                ("동결", 4),
                ("금통위", 4),
                ("연준", 4),
                ("물가", 3),
                ("채권", 3),
            ])?,
        );
        category_weights.insert(
            "해외주식".to_string(),
            KeywordWeights::from_pairs([
                ("나스닥", 5),
                ("엔비디아", 5),
                ("테슬라", 4),
                ("반도체", 4),
                ("뉴욕증시", 4),
                ("애플", 3),
                ("ETF", 3),
                ("비트코인", 3),
            ])?,
        );

        let blacklist = Blacklist::new(["[포토]", "부고", "운세", "[인사]", "[게시판]"])?;

        Ok(Self::new(investment_weights, category_weights).with_blacklist(Some(blacklist)))
    }
}
