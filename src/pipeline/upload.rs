use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    clients::sheets::{SOURCE_HEADERS, SheetArticleRow, SheetStore},
    pipeline::report::{archive_date, archive_path, parse_markdown},
};

const SOURCE_SHEET_ROWS: u32 = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub date: String,
    pub path: PathBuf,
    pub rows_appended: usize,
}

/// 하루치 Markdown 아카이브를 원본 시트에 올린다.
pub struct Uploader {
    store: Arc<dyn SheetStore>,
    sheet: String,
    raw_dir: PathBuf,
}

impl Uploader {
    pub fn new(store: Arc<dyn SheetStore>, sheet: impl Into<String>, raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            sheet: sheet.into(),
            raw_dir: raw_dir.into(),
        }
    }

    /// # Errors
    /// Fails when the archive for `date` is missing or a sheet write fails.
    pub async fn upload(&self, date: NaiveDate) -> Result<UploadOutcome> {
        let path = archive_path(&self.raw_dir, date);
        let markdown = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read archive {}", path.display()))?;
        let date = archive_date(&path).unwrap_or_else(|| date.format("%Y-%m-%d").to_string());

        let rows = parse_markdown(&markdown, &date);
        if rows.is_empty() {
            warn!(path = %path.display(), "archive holds no articles");
        }

        self.store
            .ensure_worksheet(&self.sheet, SOURCE_SHEET_ROWS, 5, &SOURCE_HEADERS)
            .await?;
        for row in &rows {
            self.store
                .append_row(&self.sheet, &SheetArticleRow::into_cells(row.clone()))
                .await
                .with_context(|| format!("failed to append row for {}", row.link))?;
        }

        info!(sheet = %self.sheet, rows = rows.len(), %date, "archive uploaded");
        Ok(UploadOutcome {
            date,
            path,
            rows_appended: rows.len(),
        })
    }
}
