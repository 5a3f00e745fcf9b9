//! Keyword tables compiled into Aho-Corasick automata.
//!
//! Matching is plain substring containment: no tokenization, no case folding
//! and no word boundaries, so `금` also matches inside `자금`. Each keyword
//! counts at most once per text no matter how often it occurs.
use std::collections::BTreeMap;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, BuildError, MatchKind};
use serde::Deserialize;

/// Keyword → integer weight table.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "BTreeMap<String, i64>")]
pub struct KeywordWeights {
    keywords: Vec<String>,
    weights: Vec<i64>,
    matcher: Option<AhoCorasick>,
}

impl KeywordWeights {
    /// Builds a table from `(keyword, weight)` pairs. A repeated keyword keeps
    /// the last weight.
    ///
    /// # Errors
    /// Returns the automaton build error when the patterns exceed its limits.
    pub fn from_pairs<I, K>(pairs: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        let deduped: BTreeMap<String, i64> = pairs
            .into_iter()
            .map(|(keyword, weight)| (keyword.into(), weight))
            .collect();
        Self::try_from(deduped)
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            keywords: Vec::new(),
            weights: Vec::new(),
            matcher: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    #[must_use]
    pub fn get(&self, keyword: &str) -> Option<i64> {
        self.keywords
            .iter()
            .position(|candidate| candidate == keyword)
            .map(|idx| self.weights[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.keywords
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
    }

    /// Sum of the weights of every keyword contained in `text`.
    #[must_use]
    pub fn weight_sum(&self, text: &str) -> i64 {
        let Some(matcher) = &self.matcher else {
            return 0;
        };
        let mut seen = vec![false; self.keywords.len()];
        let mut sum = 0_i64;
        for found in matcher.find_overlapping_iter(text) {
            let idx = found.pattern().as_usize();
            if !seen[idx] {
                seen[idx] = true;
                sum = sum.saturating_add(self.weights[idx]);
            }
        }
        sum
    }
}

impl TryFrom<BTreeMap<String, i64>> for KeywordWeights {
    type Error = BuildError;

    fn try_from(table: BTreeMap<String, i64>) -> Result<Self, Self::Error> {
        if table.is_empty() {
            return Ok(Self::empty());
        }
        let (keywords, weights): (Vec<String>, Vec<i64>) = table.into_iter().unzip();
        let matcher = build_matcher(&keywords)?;
        Ok(Self {
            keywords,
            weights,
            matcher: Some(matcher),
        })
    }
}

/// Set of disqualifying keywords.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct Blacklist {
    keywords: Vec<String>,
    matcher: Option<AhoCorasick>,
}

impl Blacklist {
    /// # Errors
    /// Returns the automaton build error when the patterns exceed its limits.
    pub fn new<I, K>(keywords: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::try_from(keywords.into_iter().map(Into::into).collect::<Vec<_>>())
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// First blacklisted keyword contained in `text`, if any.
    #[must_use]
    pub fn first_hit(&self, text: &str) -> Option<&str> {
        let matcher = self.matcher.as_ref()?;
        matcher
            .find(text)
            .map(|found| self.keywords[found.pattern().as_usize()].as_str())
    }

    #[must_use]
    pub fn is_hit(&self, text: &str) -> bool {
        self.matcher
            .as_ref()
            .is_some_and(|matcher| matcher.is_match(text))
    }
}

impl TryFrom<Vec<String>> for Blacklist {
    type Error = BuildError;

    fn try_from(mut keywords: Vec<String>) -> Result<Self, Self::Error> {
        keywords.sort();
        keywords.dedup();
        let matcher = if keywords.is_empty() {
            None
        } else {
            Some(build_matcher(&keywords)?)
        };
        Ok(Self { keywords, matcher })
    }
}

fn build_matcher(patterns: &[String]) -> Result<AhoCorasick, BuildError> {
    AhoCorasickBuilder::new()
        .match_kind(MatchKind::Standard)
        .build(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, i64)]) -> KeywordWeights {
        KeywordWeights::from_pairs(pairs.iter().map(|(k, w)| (*k, *w))).expect("weights build")
    }

    #[test]
    fn weight_sum_counts_each_keyword_once() {
        let table = weights(&[("금리", 10)]);
        assert_eq!(table.weight_sum("금리 인상, 금리 동결"), 10);
    }

    #[test]
    fn weight_sum_includes_nested_keywords() {
        let table = weights(&[("금리", 10), ("기준금리", 7)]);
        assert_eq!(table.weight_sum("기준금리 동결"), 17);
    }

    #[test]
    fn weight_sum_matches_inside_words() {
        let table = weights(&[("금", 3)]);
        assert_eq!(table.weight_sum("자금 조달"), 3);
    }

    #[test]
    fn weight_sum_is_case_sensitive() {
        let table = weights(&[("ETF", 4)]);
        assert_eq!(table.weight_sum("etf 자금 유입"), 0);
        assert_eq!(table.weight_sum("ETF 자금 유입"), 4);
    }

    #[test]
    fn negative_weights_are_summed() {
        let table = weights(&[("금리", 10), ("루머", -8)]);
        assert_eq!(table.weight_sum("금리 루머"), 2);
    }

    #[test]
    fn empty_table_scores_zero() {
        assert_eq!(KeywordWeights::empty().weight_sum("금리"), 0);
        assert!(KeywordWeights::empty().is_empty());
    }

    #[test]
    fn repeated_keyword_keeps_last_weight() {
        let table = weights(&[("금리", 1), ("금리", 9)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("금리"), Some(9));
    }

    #[test]
    fn blacklist_reports_hits() {
        let blacklist = Blacklist::new(["부고", "포토"]).expect("blacklist builds");
        assert!(blacklist.is_hit("[포토] 금리 발표 현장"));
        assert_eq!(blacklist.first_hit("오늘의 부고"), Some("부고"));
        assert!(!blacklist.is_hit("금리 인상"));
    }

    #[test]
    fn empty_blacklist_never_hits() {
        let blacklist = Blacklist::new(Vec::<String>::new()).expect("blacklist builds");
        assert!(!blacklist.is_hit("anything"));
        assert!(blacklist.first_hit("anything").is_none());
    }

    #[test]
    fn deserializes_from_yaml_map() {
        let table: KeywordWeights =
            serde_yaml::from_str("금리: 10\n환율: 4\n").expect("yaml parses");
        assert_eq!(table.get("환율"), Some(4));
        assert_eq!(table.weight_sum("금리와 환율"), 14);
    }
}
