//! 스프레드시트 저장소 추상화와 구현.
//!
//! Rows and columns are 1-based in every operation, like the Sheets UI.
pub mod auth;
pub mod google;

use std::{collections::HashMap, sync::Arc};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{clients::naver::is_sentinel, scoring::Article};

pub use google::GoogleSheetsClient;

pub const SOURCE_HEADERS: [&str; 5] = ["날짜", "카테고리", "제목", "요약", "링크"];
pub const TARGET_HEADERS: [&str; 3] = ["날짜", "요약", "부동산인사이트"];
pub const WEEKLY_HEADERS: [&str; 2] = ["날짜", "요약"];

/// Worksheet-level access to one spreadsheet.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Every row of `sheet`, header included.
    async fn get_all_values(&self, sheet: &str) -> Result<Vec<Vec<String>>>;

    /// Creates `sheet` with the given grid size and header row when missing.
    /// Existing sheets are left untouched.
    async fn ensure_worksheet(
        &self,
        sheet: &str,
        rows: u32,
        cols: u32,
        headers: &[&str],
    ) -> Result<()>;

    /// Appends `row` after the last row with data, stored as raw input.
    async fn append_row(&self, sheet: &str, row: &[String]) -> Result<()>;

    async fn update_cell(&self, sheet: &str, row: usize, col: usize, value: &str) -> Result<()>;

    /// First cell equal to `value`, scanning rows top to bottom.
    async fn find_cell(&self, sheet: &str, value: &str) -> Result<Option<(usize, usize)>> {
        let values = self.get_all_values(sheet).await?;
        Ok(values.iter().enumerate().find_map(|(row_idx, row)| {
            row.iter()
                .position(|cell| cell == value)
                .map(|col_idx| (row_idx + 1, col_idx + 1))
        }))
    }
}

/// 메모리 기반 시트 저장소. 테스트와 드라이런에 쓴다.
#[derive(Debug, Default)]
pub struct MemorySheetStore {
    sheets: RwLock<HashMap<String, Vec<Vec<String>>>>,
}

impl MemorySheetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `sheet` with `rows`, replacing whatever it held.
    pub async fn insert_sheet(&self, sheet: &str, rows: Vec<Vec<String>>) {
        self.sheets.write().await.insert(sheet.to_string(), rows);
    }

    pub async fn rows(&self, sheet: &str) -> Option<Vec<Vec<String>>> {
        self.sheets.read().await.get(sheet).cloned()
    }
}

#[async_trait]
impl SheetStore for MemorySheetStore {
    async fn get_all_values(&self, sheet: &str) -> Result<Vec<Vec<String>>> {
        self.sheets
            .read()
            .await
            .get(sheet)
            .cloned()
            .ok_or_else(|| anyhow!("worksheet not found: {sheet}"))
    }

    async fn ensure_worksheet(
        &self,
        sheet: &str,
        _rows: u32,
        _cols: u32,
        headers: &[&str],
    ) -> Result<()> {
        let mut sheets = self.sheets.write().await;
        if !sheets.contains_key(sheet) {
            let initial = if headers.is_empty() {
                Vec::new()
            } else {
                vec![headers.iter().map(ToString::to_string).collect()]
            };
            sheets.insert(sheet.to_string(), initial);
            debug!(sheet, "created in-memory worksheet");
        }
        Ok(())
    }

    async fn append_row(&self, sheet: &str, row: &[String]) -> Result<()> {
        let mut sheets = self.sheets.write().await;
        let rows = sheets
            .get_mut(sheet)
            .ok_or_else(|| anyhow!("worksheet not found: {sheet}"))?;
        rows.push(row.to_vec());
        Ok(())
    }

    async fn update_cell(&self, sheet: &str, row: usize, col: usize, value: &str) -> Result<()> {
        if row == 0 || col == 0 {
            return Err(anyhow!("cell coordinates are 1-based: ({row}, {col})"));
        }
        let mut sheets = self.sheets.write().await;
        let rows = sheets
            .get_mut(sheet)
            .ok_or_else(|| anyhow!("worksheet not found: {sheet}"))?;
        if rows.len() < row {
            rows.resize_with(row, Vec::new);
        }
        let cells = &mut rows[row - 1];
        if cells.len() < col {
            cells.resize(col, String::new());
        }
        cells[col - 1] = value.to_string();
        Ok(())
    }
}

/// 원본 시트의 한 행: `날짜, 카테고리, 제목, 요약, 링크`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetArticleRow {
    pub date: String,
    pub category: String,
    pub title: String,
    pub summary: String,
    pub link: String,
}

impl SheetArticleRow {
    #[must_use]
    pub fn into_cells(self) -> Vec<String> {
        vec![self.date, self.category, self.title, self.summary, self.link]
    }

    /// Date, category and title are required; a missing summary or link
    /// reads as an empty string.
    #[must_use]
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        let [date, category, title, rest @ ..] = cells else {
            return None;
        };
        let cell = |idx: usize| rest.get(idx).cloned().unwrap_or_default();
        Some(Self {
            date: date.clone(),
            category: category.clone(),
            title: title.clone(),
            summary: cell(0),
            link: cell(1),
        })
    }

    #[must_use]
    pub fn to_article(&self) -> Article {
        Article::new(&self.title, &self.summary, &self.link, &self.category)
    }
}

/// Articles of one category, in sheet order.
pub type CategoryGroup = (String, Vec<Article>);

/// Reads collected articles back from the source sheet.
pub struct SheetArticleSource<S: ?Sized> {
    store: Arc<S>,
    sheet: String,
}

impl<S: ?Sized> Clone for SheetArticleSource<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sheet: self.sheet.clone(),
        }
    }
}

impl<S: SheetStore + ?Sized> SheetArticleSource<S> {
    pub fn new(store: Arc<S>, sheet: impl Into<String>) -> Self {
        Self {
            store,
            sheet: sheet.into(),
        }
    }

    /// Source rows (header skipped) whose date is in `dates` and whose
    /// content is not an extraction failure sentinel.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn rows_for_dates(&self, dates: &[String]) -> Result<Vec<SheetArticleRow>> {
        let values = self.store.get_all_values(&self.sheet).await?;
        Ok(values
            .iter()
            .skip(1)
            .filter_map(|cells| SheetArticleRow::from_cells(cells))
            .filter(|row| dates.iter().any(|date| *date == row.date))
            .filter(|row| !is_sentinel(&row.summary))
            .collect())
    }

    /// Today's usable articles grouped by category, groups in first-seen order.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn grouped_for_date(&self, date: &str) -> Result<Vec<CategoryGroup>> {
        let rows = self.rows_for_dates(&[date.to_string()]).await?;
        Ok(group_by_category(rows.iter().map(SheetArticleRow::to_article)))
    }

    /// Usable articles of one category for `date`, in sheet order.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn articles_for_date(&self, date: &str, category: &str) -> Result<Vec<Article>> {
        let rows = self.rows_for_dates(&[date.to_string()]).await?;
        Ok(rows
            .iter()
            .filter(|row| row.category == category)
            .map(SheetArticleRow::to_article)
            .collect())
    }
}

/// Groups articles by category, keeping first-seen category order and the
/// article order inside each group.
pub fn group_by_category(articles: impl IntoIterator<Item = Article>) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    for article in articles {
        match groups.iter_mut().find(|(name, _)| *name == article.category) {
            Some((_, items)) => items.push(article),
            None => groups.push((article.category.clone(), vec![article])),
        }
    }
    groups
}
