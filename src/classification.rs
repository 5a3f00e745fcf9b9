//! 제목 키워드 기반 카테고리 분류.
//!
//! A title belongs to the first category, in table order, that has any of its
//! keywords as a substring. Later categories never override earlier ones.
use std::path::Path;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::Deserialize;

use crate::scoring::RelevanceConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryKeywords {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryKeywords {
    pub fn new<I, K>(name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            name: name.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CategoryFile {
    #[serde(default)]
    categories: Option<Vec<CategoryKeywords>>,
}

/// Ordered category list compiled into one automaton.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    categories: Vec<CategoryKeywords>,
    matcher: Option<AhoCorasick>,
    /// Pattern id → index into `categories`.
    owners: Vec<usize>,
}

impl CategoryTable {
    /// # Errors
    /// Returns an error when the automaton cannot be built.
    pub fn new(categories: Vec<CategoryKeywords>) -> Result<Self, RelevanceConfigError> {
        let mut patterns = Vec::new();
        let mut owners = Vec::new();
        for (idx, category) in categories.iter().enumerate() {
            for keyword in &category.keywords {
                patterns.push(keyword.as_str());
                owners.push(idx);
            }
        }
        let matcher = if patterns.is_empty() {
            None
        } else {
            Some(
                AhoCorasickBuilder::new()
                    .match_kind(MatchKind::Standard)
                    .build(&patterns)?,
            )
        };
        Ok(Self {
            categories,
            matcher,
            owners,
        })
    }

    /// 운영 환경에서 쓰는 기본 카테고리 세 개.
    ///
    /// # Errors
    /// Only fails if the automaton cannot be built.
    pub fn builtin() -> Result<Self, RelevanceConfigError> {
        Self::new(vec![
            CategoryKeywords::new(
                "부동산",
                [
                    "서울", "아파트", "부동산", "전세", "재건축", "입주", "실거래", "청약",
                    "분양", "매매", "거래량", "중개업소",
                ],
            ),
            CategoryKeywords::new(
                "금리",
                [
                    "금리", "연준", "인상", "인하", "기준금리", "물가", "CPI", "물가상승률",
                    "금통위", "채권", "유동성",
                ],
            ),
            CategoryKeywords::new(
                "해외주식",
                [
                    "나스닥", "S&P", "테슬라", "애플", "엔비디아", "비트코인", "ETF",
                    "뉴욕증시", "AI주", "반도체", "미국주식",
                ],
            ),
        ])
    }

    /// Reads the `categories` list of a keyword file; the built-in table is
    /// used when the file has none.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, RelevanceConfigError> {
        let Some(path) = path else {
            return Self::builtin();
        };
        let raw = std::fs::read_to_string(path).map_err(|source| RelevanceConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: CategoryFile = serde_yaml::from_str(&raw)?;
        match file.categories {
            Some(categories) => Self::new(categories),
            None => Self::builtin(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|category| category.name.as_str())
    }

    #[must_use]
    pub fn classify(&self, title: &str) -> Option<&str> {
        let matcher = self.matcher.as_ref()?;
        matcher
            .find_overlapping_iter(title)
            .map(|found| self.owners[found.pattern().as_usize()])
            .min()
            .map(|idx| self.categories[idx].name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[rstest]
    #[case("서울 아파트값 6주 연속 상승", Some("부동산"))]
    #[case("한은, 기준금리 동결", Some("금리"))]
    #[case("엔비디아 시총 1위 탈환", Some("해외주식"))]
    #[case("삼성전자 노조 파업", None)]
    fn classify_uses_builtin_keywords(#[case] title: &str, #[case] expected: Option<&str>) {
        let table = CategoryTable::builtin().expect("builtin table");
        assert_eq!(table.classify(title), expected);
    }

    #[test]
    fn earlier_category_wins_when_several_match() {
        let table = CategoryTable::builtin().expect("builtin table");
        // 금리 (second) and 아파트 (first) both appear.
        assert_eq!(table.classify("금리 인상에 아파트 거래 급감"), Some("부동산"));
    }

    #[test]
    fn empty_table_classifies_nothing() {
        let table = CategoryTable::new(Vec::new()).expect("empty table");
        assert!(table.classify("금리").is_none());
        assert_eq!(table.names().count(), 0);
    }

    #[test]
    fn load_or_default_reads_categories_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "investment_weights:\n  금리: 10\ncategories:\n  - name: 환율\n    keywords: [환율, 달러]"
        )
        .expect("write");

        let table = CategoryTable::load_or_default(Some(file.path())).expect("loads");
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["환율"]);
        assert_eq!(table.classify("달러 강세"), Some("환율"));
    }

    #[test]
    fn load_or_default_falls_back_without_categories_key() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "investment_weights:\n  금리: 10").expect("write");

        let table = CategoryTable::load_or_default(Some(file.path())).expect("loads");
        assert_eq!(table.names().count(), 3);
    }
}
