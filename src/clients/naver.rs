/// 네이버 뉴스 경제 섹션 랭킹 페이지 수집 클라이언트.
///
/// 랭킹 목록과 기사 본문 모두 요청 한 번만 시도한다.
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{debug, warn};

pub const USER_AGENT: &str = "Mozilla/5.0";
pub const RANKING_SELECTOR: &str = ".rankingnews_box a";
pub const BODY_SELECTOR: &str = "#dic_area";

/// 본문 영역을 찾았지만 쓸 만한 문단이 없을 때.
pub const BODY_NOT_FOUND: &str = "본문 추출 실패";
/// 본문 요청 자체가 실패했을 때.
pub const BODY_REQUEST_FAILED: &str = "본문 요청 실패";

/// A paragraph must be longer than this many characters.
const MIN_PARAGRAPH_CHARS: usize = 30;

/// 랭킹 페이지의 기사 링크.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedLink {
    pub title: String,
    pub link: String,
}

/// 본문 첫 문단 추출 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyExtract {
    Paragraph(String),
    NotFound,
    RequestFailed,
}

impl BodyExtract {
    /// Text written to the archive; failures become their sentinel strings.
    #[must_use]
    pub fn as_text(&self) -> &str {
        match self {
            Self::Paragraph(text) => text,
            Self::NotFound => BODY_NOT_FOUND,
            Self::RequestFailed => BODY_REQUEST_FAILED,
        }
    }

    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Paragraph(text) => text,
            other => other.as_text().to_string(),
        }
    }
}

/// True when `content` carries one of the extraction failure sentinels.
#[must_use]
pub fn is_sentinel(content: &str) -> bool {
    content.contains(BODY_NOT_FOUND) || content.contains(BODY_REQUEST_FAILED)
}

/// Source of ranked article links and article bodies.
#[async_trait]
pub trait RankingSource: Send + Sync {
    async fn fetch_ranking(&self) -> Result<Vec<RankedLink>>;

    async fn extract_first_paragraph(&self, link: &str) -> BodyExtract;
}

#[derive(Debug, Clone)]
pub struct NaverClient {
    client: Client,
    ranking_url: String,
    base_url: String,
}

impl NaverClient {
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 에러를 반환한다.
    pub fn new(
        ranking_url: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build naver HTTP client")?;

        Ok(Self {
            client,
            ranking_url: ranking_url.into(),
            base_url: base_url.into(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .text()
            .await
            .with_context(|| format!("failed to read body of {url}"))
    }
}

#[async_trait]
impl RankingSource for NaverClient {
    async fn fetch_ranking(&self) -> Result<Vec<RankedLink>> {
        let html = self
            .get_text(&self.ranking_url)
            .await
            .context("ranking page request failed")?;
        let links = parse_ranking_links(&html, &self.base_url);
        debug!(count = links.len(), url = %self.ranking_url, "parsed ranking links");
        Ok(links)
    }

    async fn extract_first_paragraph(&self, link: &str) -> BodyExtract {
        match self.get_text(link).await {
            Ok(html) => parse_first_paragraph(&html),
            Err(error) => {
                warn!(%link, error = %format!("{error:#}"), "article body request failed");
                BodyExtract::RequestFailed
            }
        }
    }
}

/// Anchors under `.rankingnews_box`, with relative hrefs prefixed by `base_url`.
#[must_use]
pub fn parse_ranking_links(html: &str, base_url: &str) -> Vec<RankedLink> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(RANKING_SELECTOR) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let title = anchor.text().collect::<String>().trim().to_string();
            let link = if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{base_url}{href}")
            };
            Some(RankedLink { title, link })
        })
        .collect()
}

/// First newline-separated piece of `#dic_area` longer than 30 characters.
///
/// Text nodes are trimmed and concatenated before splitting, so only line
/// breaks inside a single text node produce separate pieces.
#[must_use]
pub fn parse_first_paragraph(html: &str) -> BodyExtract {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(BODY_SELECTOR) else {
        return BodyExtract::NotFound;
    };
    let Some(area) = document.select(&selector).next() else {
        return BodyExtract::NotFound;
    };

    let text: String = area
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect();

    text.split('\n')
        .map(str::trim)
        .find(|piece| piece.chars().count() > MIN_PARAGRAPH_CHARS)
        .map_or(BodyExtract::NotFound, |piece| {
            BodyExtract::Paragraph(piece.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RANKING_HTML: &str = r#"
        <html><body>
          <div class="rankingnews_box">
            <ul>
              <li><a href="/article/001/0001">  서울 아파트값 상승  </a></li>
              <li><a href="https://n.news.naver.com/article/002/0002">기준금리 동결</a></li>
              <li><a>링크 없음</a></li>
            </ul>
          </div>
          <div class="other"><a href="/skip">다른 영역</a></div>
        </body></html>
    "#;

    #[test]
    fn parse_ranking_links_resolves_relative_hrefs() {
        let links = parse_ranking_links(RANKING_HTML, "https://news.naver.com");

        assert_eq!(
            links,
            vec![
                RankedLink {
                    title: "서울 아파트값 상승".to_string(),
                    link: "https://news.naver.com/article/001/0001".to_string(),
                },
                RankedLink {
                    title: "기준금리 동결".to_string(),
                    link: "https://n.news.naver.com/article/002/0002".to_string(),
                },
            ]
        );
    }

    #[test]
    fn parse_first_paragraph_skips_short_pieces() {
        let long = "한국은행 금융통화위원회는 오늘 기준금리를 연 3.50%로 동결했다고 밝혔다.";
        let html = format!("<div id=\"dic_area\">짧은 줄\n{long}\n다음 줄</div>");

        assert_eq!(
            parse_first_paragraph(&html),
            BodyExtract::Paragraph(long.to_string())
        );
    }

    #[test]
    fn parse_first_paragraph_requires_more_than_thirty_chars() {
        let exactly_thirty = "가".repeat(30);
        let html = format!("<div id=\"dic_area\">{exactly_thirty}</div>");
        assert_eq!(parse_first_paragraph(&html), BodyExtract::NotFound);
    }

    #[test]
    fn parse_first_paragraph_without_body_area_is_not_found() {
        assert_eq!(
            parse_first_paragraph("<html><body><p>본문</p></body></html>"),
            BodyExtract::NotFound
        );
    }

    #[test]
    fn sentinels_are_detected() {
        assert!(is_sentinel(BodyExtract::NotFound.as_text()));
        assert!(is_sentinel(&BodyExtract::RequestFailed.into_text()));
        assert!(!is_sentinel("정상 본문"));
    }

    #[tokio::test]
    async fn fetch_ranking_reads_configured_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ranking"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RANKING_HTML))
            .mount(&server)
            .await;

        let client = NaverClient::new(
            format!("{}/ranking", server.uri()),
            "https://news.naver.com",
            Duration::from_secs(5),
        )
        .expect("client builds");
        let links = client.fetch_ranking().await.expect("ranking fetch");

        assert_eq!(links.len(), 2);
    }

    #[tokio::test]
    async fn extract_first_paragraph_sends_user_agent() {
        let server = MockServer::start().await;
        let paragraph = "정부는 오늘 수도권 주택 공급 확대 방안을 발표하며 규제 완화를 예고했다.";
        Mock::given(method("GET"))
            .and(path("/article/1"))
            .and(header_matcher("user-agent", USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<div id=\"dic_area\">{paragraph}</div>")),
            )
            .mount(&server)
            .await;

        let client = NaverClient::new(server.uri(), server.uri(), Duration::from_secs(5))
            .expect("client builds");
        let body = client
            .extract_first_paragraph(&format!("{}/article/1", server.uri()))
            .await;

        assert_eq!(body, BodyExtract::Paragraph(paragraph.to_string()));
    }

    #[tokio::test]
    async fn extract_first_paragraph_reports_transport_failure() {
        let client = NaverClient::new(
            "http://127.0.0.1:1/ranking",
            "http://127.0.0.1:1",
            Duration::from_millis(200),
        )
        .expect("client builds");

        let body = client
            .extract_first_paragraph("http://127.0.0.1:1/article")
            .await;

        assert_eq!(body, BodyExtract::RequestFailed);
    }
}
