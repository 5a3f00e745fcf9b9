//! Markdown archive of one collection run, and its parser.
//!
//! ```text
//! # 📅 2025-05-12 네이버 경제 키워드 뉴스 요약
//!
//! ## 📌 부동산
//!
//! 1. **서울 아파트값 상승**
//!    - 첫 문단
//!    - [기사 링크](https://n.news.naver.com/...)
//! ```
use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;

use crate::{
    clients::sheets::{CategoryGroup, SheetArticleRow},
    util::time,
};

const CATEGORY_PREFIX: &str = "## 📌";
const ARCHIVE_PREFIX: &str = "output_";

/// `{raw_dir}/YYYY/MM/output_YYYY-MM-DD.md`
#[must_use]
pub fn archive_path(raw_dir: &Path, date: NaiveDate) -> PathBuf {
    raw_dir
        .join(time::year_month_of(date))
        .join(format!("{ARCHIVE_PREFIX}{}.md", date.format("%Y-%m-%d")))
}

/// Date embedded in an archive file name, e.g. `output_2025-05-12.md`.
#[must_use]
pub fn archive_date(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(ARCHIVE_PREFIX).map(ToString::to_string)
}

/// Renders sections in the given order; articles are numbered from 1.
#[must_use]
pub fn render_markdown(date: &str, sections: &[CategoryGroup]) -> String {
    let mut out = format!("# 📅 {date} 네이버 경제 키워드 뉴스 요약\n\n");
    for (category, articles) in sections {
        let _ = write!(out, "{CATEGORY_PREFIX} {category}\n\n");
        for (idx, article) in articles.iter().enumerate() {
            let _ = write!(
                out,
                "{}. **{}**\n   - {}\n   - [기사 링크]({})\n\n",
                idx + 1,
                article.title,
                article.content,
                article.link
            );
        }
    }
    out
}

/// Parses an archive back into source-sheet rows dated `date`.
///
/// An item is a numbered line holding a `**title**`, followed by the
/// paragraph line and the link line. Items before the first category header
/// or with missing follow-up lines are skipped.
#[must_use]
pub fn parse_markdown(markdown: &str, date: &str) -> Vec<SheetArticleRow> {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut rows = Vec::new();
    let mut category: Option<String> = None;

    for (idx, line) in lines.iter().enumerate() {
        if let Some(name) = line.strip_prefix(CATEGORY_PREFIX) {
            category = Some(name.trim().to_string());
            continue;
        }
        if !is_numbered(line.trim()) {
            continue;
        }
        let Some(current) = category.as_ref() else {
            continue;
        };
        let Some(title) = line.split("**").nth(1) else {
            continue;
        };
        let (Some(summary_line), Some(link_line)) = (lines.get(idx + 1), lines.get(idx + 2))
        else {
            continue;
        };

        let summary = summary_line.trim();
        let summary = summary.strip_prefix("- ").unwrap_or(summary).trim();
        rows.push(SheetArticleRow {
            date: date.to_string(),
            category: current.clone(),
            title: title.to_string(),
            summary: summary.to_string(),
            link: parse_link(link_line),
        });
    }
    rows
}

/// `1.`, `10.` and so on.
fn is_numbered(line: &str) -> bool {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && line[digits..].starts_with('.')
}

fn parse_link(line: &str) -> String {
    let tail = line.rsplit('(').next().unwrap_or(line).trim();
    tail.strip_suffix(')').unwrap_or(tail).to_string()
}
