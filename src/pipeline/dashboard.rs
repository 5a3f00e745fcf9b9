//! 결과 시트로 정적 HTML 대시보드를 만든다.
//!
//! Every interpolated value goes through [`ammonia::clean_text`].
use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
    sync::Arc,
};

use ammonia::clean_text;
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::clients::sheets::SheetStore;

const STYLE_BASE: &str = "body { font-family: 'Noto Sans KR', sans-serif; max-width: 1200px; margin: 0 auto; padding: 20px; }
        h1, h2 { color: #3a7bd5; }";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardItem {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardCategory {
    pub name: String,
    pub trend: String,
    pub items: Vec<DashboardItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardOutcome {
    pub index: PathBuf,
    pub pages: usize,
}

pub struct DashboardGenerator {
    store: Arc<dyn SheetStore>,
    target_sheet: String,
    output_dir: PathBuf,
}

impl DashboardGenerator {
    pub fn new(store: Arc<dyn SheetStore>, target_sheet: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            target_sheet: target_sheet.into(),
            output_dir: output_dir.into(),
        }
    }

    /// # Errors
    /// Fails when the sheet cannot be read or a page cannot be written.
    pub async fn generate(&self) -> Result<DashboardOutcome> {
        let rows: Vec<Vec<String>> = self
            .store
            .get_all_values(&self.target_sheet)
            .await?
            .into_iter()
            .skip(1)
            .collect();

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;

        let index = self.output_dir.join("index.html");
        write_page(&index, &render_index(&rows)).await?;

        let mut pages = 0;
        for (date, summary, insight) in rows.iter().filter_map(|row| page_fields(row)) {
            let path = self.output_dir.join(format!("{}.html", safe_date(date)));
            write_page(&path, &render_date_page(date, summary, insight)).await?;
            pages += 1;
        }

        info!(dir = %self.output_dir.display(), pages, "dashboard generated");
        Ok(DashboardOutcome { index, pages })
    }
}

async fn write_page(path: &Path, html: &str) -> Result<()> {
    tokio::fs::write(path, html)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

/// `(date, summary, insight)` of a result row; rows without a date are
/// skipped and missing cells read as empty.
fn page_fields(row: &[String]) -> Option<(&str, &str, &str)> {
    let date = row.first().map(String::as_str).filter(|date| !date.trim().is_empty())?;
    let cell = move |idx: usize| row.get(idx).map_or("", String::as_str);
    Some((date, cell(1), cell(2)))
}

/// File-name form of a date: `/` and `.` become `-`.
#[must_use]
pub fn safe_date(date: &str) -> String {
    date.replace(['/', '.'], "-")
}

/// Index page listing every row, newest date first.
#[must_use]
pub fn render_index(rows: &[Vec<String>]) -> String {
    let mut dates: Vec<&str> = rows
        .iter()
        .filter_map(|row| page_fields(row).map(|(date, _, _)| date))
        .collect();
    dates.sort_by(|a, b| b.cmp(a));

    let mut html = format!(
        r#"<!DOCTYPE html>
<html lang="ko">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>경제 및 부동산 분석 대시보드</title>
    <style>
        {STYLE_BASE}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ padding: 10px; text-align: left; border-bottom: 1px solid #ddd; }}
        th {{ background-color: #f2f2f2; }}
        a {{ color: #3a7bd5; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
    </style>
</head>
<body>
    <h1>경제 및 부동산 시장 분석 대시보드</h1>

    <h2>일별 분석 기록</h2>
    <table>
        <tr>
            <th>날짜</th>
            <th>링크</th>
        </tr>
"#
    );
    for date in dates {
        let _ = write!(
            html,
            r#"        <tr>
            <td>{}</td>
            <td><a href="{}.html">분석 보기</a></td>
        </tr>
"#,
            clean_text(date),
            clean_text(&safe_date(date))
        );
    }
    html.push_str("    </table>\n</body>\n</html>");
    html
}

/// One day's page: parsed categories plus the insight block.
#[must_use]
pub fn render_date_page(date: &str, summary: &str, insight: &str) -> String {
    let date = clean_text(date);
    let mut html = format!(
        r#"<!DOCTYPE html>
<html lang="ko">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>경제 분석 - {date}</title>
    <style>
        {STYLE_BASE}
        .header {{ display: flex; justify-content: space-between; align-items: center; }}
        .back-link {{ margin-bottom: 20px; }}
        .category {{ margin-bottom: 30px; background: #f8f9fa; padding: 15px; border-radius: 8px; }}
        .category h2 {{ margin-top: 0; }}
        .news-item {{ margin-bottom: 10px; }}
        .news-title {{ font-weight: bold; }}
        .news-summary {{ color: #666; margin-left: 20px; }}
        .insight {{ background: #e7f5ff; padding: 15px; border-radius: 8px; margin-top: 30px; }}
    </style>
</head>
<body>
    <div class="back-link">
        <a href="index.html">← 목록으로 돌아가기</a>
    </div>

    <div class="header">
        <h1>경제 및 부동산 분석</h1>
        <div class="date">{date}</div>
    </div>
"#
    );

    for category in extract_categories(summary) {
        let _ = write!(
            html,
            r#"
    <div class="category">
        <h2>{}</h2>
        <div class="trend">💡 {}</div>
        <div class="news-list">
"#,
            clean_text(&category.name),
            clean_text(&category.trend)
        );
        for item in &category.items {
            let _ = write!(
                html,
                r#"            <div class="news-item">
                <div class="news-title">{}</div>
                <div class="news-summary">→ {}</div>
            </div>
"#,
                clean_text(&item.title),
                clean_text(&item.summary)
            );
        }
        html.push_str("        </div>\n    </div>\n");
    }

    if !insight.is_empty() {
        let body = insight
            .split('\n')
            .map(clean_text)
            .collect::<Vec<_>>()
            .join("<br>");
        let _ = write!(
            html,
            r#"
    <div class="insight">
        <h2>부동산 인사이트</h2>
        <div class="insight-content">
            {body}
        </div>
    </div>
"#
        );
    }

    html.push_str("</body>\n</html>");
    html
}

/// Parses a digest message back into categories.
///
/// `【name】` opens a category, a `💡` line sets its trend, and a numbered
/// `N. title` line followed by a line containing `→` adds an item. Categories
/// without a trend are dropped; a repeated name replaces the earlier entry.
#[must_use]
pub fn extract_categories(summary: &str) -> Vec<DashboardCategory> {
    let lines: Vec<&str> = summary.split('\n').collect();
    let mut categories: Vec<DashboardCategory> = Vec::new();
    let mut current: Option<(String, Option<String>, Vec<DashboardItem>)> = None;

    for (idx, line) in lines.iter().enumerate() {
        if idx == 0 && line.contains("경제뉴스입니다") {
            continue;
        }

        if line.contains('【') && line.contains('】') {
            flush(&mut categories, current.take());
            let name = line.replace(['【', '】'], "").trim().to_string();
            current = Some((name, None, Vec::new()));
        } else if let Some(rest) = line.strip_prefix("💡") {
            if let Some((_, trend, _)) = current.as_mut() {
                *trend = Some(rest.trim().to_string());
            }
        } else if let Some((_, _, items)) = current.as_mut() {
            let Some(title) = numbered_title(line) else {
                continue;
            };
            if let Some(next) = lines.get(idx + 1).filter(|next| next.contains('→')) {
                items.push(DashboardItem {
                    title,
                    summary: next.trim().replace('→', "").trim().to_string(),
                });
            }
        }
    }
    flush(&mut categories, current);
    categories
}

fn numbered_title(line: &str) -> Option<String> {
    if line.trim().is_empty() || !line.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let (_, title) = line.split_once(". ")?;
    Some(title.trim().to_string())
}

fn flush(
    categories: &mut Vec<DashboardCategory>,
    current: Option<(String, Option<String>, Vec<DashboardItem>)>,
) {
    let Some((name, Some(trend), items)) = current else {
        return;
    };
    let category = DashboardCategory { name, trend, items };
    match categories.iter_mut().find(|existing| existing.name == category.name) {
        Some(existing) => *existing = category,
        None => categories.push(category),
    }
}
