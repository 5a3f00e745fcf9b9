/// Google Sheets API v4 client.
use std::{path::Path, time::Duration};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{
    SheetStore,
    auth::{ServiceAccountKey, TokenProvider},
};
use crate::util::{
    error::{UpstreamStatusError, is_retryable},
    retry::RetryConfig,
};

const SERVICE: &str = "google sheets";

#[derive(Debug, Clone)]
pub struct GoogleSheetsConfig {
    pub base_url: String,
    pub token_url: String,
    pub spreadsheet_id: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// 서비스 계정으로 인증하는 Sheets API 클라이언트.
#[derive(Debug)]
pub struct GoogleSheetsClient {
    client: Client,
    base_url: Url,
    spreadsheet_id: String,
    tokens: TokenProvider,
    retry: RetryConfig,
}

impl GoogleSheetsClient {
    /// # Errors
    /// URL 파싱, HTTP 클라이언트 생성, 개인 키 파싱 중 하나라도 실패하면 에러를 반환한다.
    pub fn new(config: GoogleSheetsConfig, key: &ServiceAccountKey) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build google sheets HTTP client")?;
        let base_url = Url::parse(&config.base_url).context("invalid sheets base URL")?;
        let tokens = TokenProvider::new(client.clone(), key, &config.token_url)
            .context("failed to load service account key")?;

        Ok(Self {
            client,
            base_url,
            spreadsheet_id: config.spreadsheet_id,
            tokens,
            retry: config.retry,
        })
    }

    /// Resolves credentials from the inline base64 value or the file path.
    ///
    /// # Errors
    /// Fails when no credentials are configured or they cannot be parsed.
    pub fn from_credentials(
        config: GoogleSheetsConfig,
        encoded: Option<&str>,
        file: Option<&Path>,
    ) -> Result<Self> {
        let key = ServiceAccountKey::resolve(encoded, file)
            .context("failed to resolve google service account credentials")?;
        Self::new(config, &key)
    }

    fn url(&self, tail: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("sheets base URL cannot be a base"))?
            .pop_if_empty()
            .push("v4")
            .push("spreadsheets")
            .extend(tail);
        Ok(url)
    }

    /// Sends the request built by `build`, retrying transient failures.
    async fn execute<T, F>(&self, operation: &'static str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let result = self.execute_once(&build).await;
            match result {
                Ok(value) => return Ok(value),
                Err(error) if is_retryable(&error) && self.retry.can_retry(attempt + 1) => {
                    attempt += 1;
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "sheets request failed, retrying"
                    );
                    sleep(delay).await;
                }
                Err(error) => {
                    return Err(error.context(format!("sheets {operation} failed")));
                }
            }
        }
    }

    async fn execute_once<T, F>(&self, build: &F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let token = self.tokens.access_token().await?;
        let response = build(&self.client).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamStatusError::new(SERVICE, status, &body).into());
        }
        Ok(response.json::<T>().await?)
    }

    async fn sheet_titles(&self) -> Result<Vec<String>> {
        let url = self.url(&[&self.spreadsheet_id])?;
        let meta: SpreadsheetMeta = self
            .execute("metadata", |client| {
                client
                    .get(url.clone())
                    .query(&[("fields", "sheets.properties.title")])
            })
            .await?;
        Ok(meta
            .sheets
            .into_iter()
            .map(|sheet| sheet.properties.title)
            .collect())
    }
}

#[async_trait]
impl SheetStore for GoogleSheetsClient {
    async fn get_all_values(&self, sheet: &str) -> Result<Vec<Vec<String>>> {
        let range = quote_sheet(sheet);
        let url = self.url(&[&self.spreadsheet_id, "values", &range])?;
        let body: ValueRange = self
            .execute("get values", |client| client.get(url.clone()))
            .await?;
        debug!(sheet, rows = body.values.len(), "read sheet values");
        let mut rows: Vec<Vec<String>> = body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect();
        pad_rows(&mut rows);
        Ok(rows)
    }

    async fn ensure_worksheet(
        &self,
        sheet: &str,
        rows: u32,
        cols: u32,
        headers: &[&str],
    ) -> Result<()> {
        if self.sheet_titles().await?.iter().any(|title| title == sheet) {
            return Ok(());
        }

        let batch_update = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.url(&[&batch_update])?;
        let payload = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": sheet,
                        "gridProperties": { "rowCount": rows, "columnCount": cols }
                    }
                }
            }]
        });
        let _: Value = self
            .execute("add sheet", |client| client.post(url.clone()).json(&payload))
            .await?;
        info!(sheet, rows, cols, "created worksheet");

        if !headers.is_empty() {
            let header_row: Vec<String> = headers.iter().map(ToString::to_string).collect();
            self.append_row(sheet, &header_row).await?;
        }
        Ok(())
    }

    async fn append_row(&self, sheet: &str, row: &[String]) -> Result<()> {
        let append = format!("{}:append", quote_sheet(sheet));
        let url = self.url(&[&self.spreadsheet_id, "values", &append])?;
        let payload = json!({ "values": [row] });
        let _: Value = self
            .execute("append row", |client| {
                client
                    .post(url.clone())
                    .query(&[
                        ("valueInputOption", "RAW"),
                        ("insertDataOption", "INSERT_ROWS"),
                    ])
                    .json(&payload)
            })
            .await?;
        debug!(sheet, cells = row.len(), "appended row");
        Ok(())
    }

    async fn update_cell(&self, sheet: &str, row: usize, col: usize, value: &str) -> Result<()> {
        let cell = a1_cell(row, col).ok_or_else(|| anyhow!("invalid cell ({row}, {col})"))?;
        let range = format!("{}!{cell}", quote_sheet(sheet));
        let url = self.url(&[&self.spreadsheet_id, "values", &range])?;
        let payload = json!({ "values": [[value]] });
        let _: Value = self
            .execute("update cell", |client| {
                client
                    .put(url.clone())
                    .query(&[("valueInputOption", "RAW")])
                    .json(&payload)
            })
            .await?;
        debug!(sheet, %cell, "updated cell");
        Ok(())
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The API omits trailing empty cells; every row is filled out to the widest
/// row with empty strings.
fn pad_rows(rows: &mut [Vec<String>]) {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in rows {
        row.resize(width, String::new());
    }
}

/// `'name'` with embedded quotes doubled, as A1 notation expects.
fn quote_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// 1-based `(row, col)` to A1 notation, e.g. `(3, 28)` → `AB3`.
fn a1_cell(row: usize, col: usize) -> Option<String> {
    if row == 0 || col == 0 {
        return None;
    }
    let mut letters = Vec::new();
    let mut remaining = col;
    while remaining > 0 {
        let offset = u8::try_from((remaining - 1) % 26).ok()?;
        letters.push(char::from(b'A' + offset));
        remaining = (remaining - 1) / 26;
    }
    letters.reverse();
    Some(format!("{}{row}", letters.into_iter().collect::<String>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::sheets::auth::tests::test_key;
    use wiremock::matchers::{body_json, header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> GoogleSheetsClient {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "test-token",
                "expires_in": 3600
            })))
            .mount(server)
            .await;

        GoogleSheetsClient::new(
            GoogleSheetsConfig {
                base_url: server.uri(),
                token_url: format!("{}/token", server.uri()),
                spreadsheet_id: "sid".to_string(),
                timeout: Duration::from_secs(5),
                retry: RetryConfig::new(3, 1, 5),
            },
            &test_key(),
        )
        .expect("client builds")
    }

    #[test]
    fn a1_cell_converts_columns() {
        assert_eq!(a1_cell(3, 3).as_deref(), Some("C3"));
        assert_eq!(a1_cell(1, 26).as_deref(), Some("Z1"));
        assert_eq!(a1_cell(10, 28).as_deref(), Some("AB10"));
        assert!(a1_cell(0, 1).is_none());
    }

    #[test]
    fn quote_sheet_escapes_quotes() {
        assert_eq!(quote_sheet("요약결과"), "'요약결과'");
        assert_eq!(quote_sheet("it's"), "'it''s'");
    }

    #[tokio::test]
    async fn get_all_values_reads_rows_with_bearer_token() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v4/spreadsheets/sid/values/.*Sheet1.*$"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Sheet1!A1:C2",
                "majorDimension": "ROWS",
                "values": [["날짜", "요약"], ["2025-05-12", "msg", 3]]
            })))
            .mount(&server)
            .await;

        let rows = client.get_all_values("Sheet1").await.expect("values");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["날짜", "요약", ""]);
        assert_eq!(rows[1], vec!["2025-05-12", "msg", "3"]);
    }

    #[tokio::test]
    async fn omitted_trailing_cells_are_padded_to_the_widest_row() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v4/spreadsheets/sid/values/.*$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [
                    ["날짜", "카테고리", "제목", "요약", "링크"],
                    ["2025-05-12", "금리", "금리 인상 발표"],
                    []
                ]
            })))
            .mount(&server)
            .await;

        let rows = client.get_all_values("뉴스요약").await.expect("values");

        assert_eq!(rows[1], vec!["2025-05-12", "금리", "금리 인상 발표", "", ""]);
        assert_eq!(rows[2], vec![String::new(); 5]);
    }

    #[tokio::test]
    async fn empty_sheet_has_no_rows() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v4/spreadsheets/sid/values/.*$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Sheet1!A1:Z1000",
                "majorDimension": "ROWS"
            })))
            .mount(&server)
            .await;

        assert!(client.get_all_values("Sheet1").await.expect("values").is_empty());
    }

    #[tokio::test]
    async fn append_row_uses_raw_input() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/v4/spreadsheets/sid/values/.*:append$"))
            .and(query_param("valueInputOption", "RAW"))
            .and(body_json(json!({ "values": [["2025-05-12", "msg", ""]] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client
            .append_row(
                "Sheet1",
                &["2025-05-12".to_string(), "msg".to_string(), String::new()],
            )
            .await
            .expect("append");
    }

    #[tokio::test]
    async fn ensure_worksheet_adds_missing_sheet_with_headers() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sheets": [{ "properties": { "title": "Other" } }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sid:batchUpdate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/v4/spreadsheets/sid/values/.*:append$"))
            .and(body_json(json!({ "values": [["날짜", "요약"]] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client
            .ensure_worksheet("Weekly", 100, 2, &["날짜", "요약"])
            .await
            .expect("ensure");
    }

    #[tokio::test]
    async fn ensure_worksheet_skips_existing_sheet() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sheets": [{ "properties": { "title": "Weekly" } }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sid:batchUpdate"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        client
            .ensure_worksheet("Weekly", 100, 2, &["날짜", "요약"])
            .await
            .expect("ensure");
    }

    #[tokio::test]
    async fn update_cell_targets_a1_range() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/v4/spreadsheets/sid/values/.*Sheet1.*!C3$"))
            .and(body_json(json!({ "values": [["insight"]] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client
            .update_cell("Sheet1", 3, 3, "insight")
            .await
            .expect("update");
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v4/spreadsheets/sid/values/.*$"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v4/spreadsheets/sid/values/.*$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "values": [["a"]] })))
            .mount(&server)
            .await;

        let rows = client.get_all_values("Sheet1").await.expect("values");
        assert_eq!(rows, vec![vec!["a".to_string()]]);
    }

    #[tokio::test]
    async fn forbidden_is_not_retried() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v4/spreadsheets/sid/values/.*$"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .expect(1)
            .mount(&server)
            .await;

        let error = client.get_all_values("Sheet1").await.expect_err("forbidden");
        assert!(crate::util::error::is_fatal(&error));
    }
}
