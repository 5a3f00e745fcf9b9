//! Discord 웹훅 알림.
//!
//! 알림 실패는 로그만 남기고 호출자에게 전파하지 않는다.
use std::{fmt, future::Future, time::Duration, time::Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::util::{text::truncate_chars, time};

pub const FOOTER_TEXT: &str = "News Bot Alert";
pub const COLOR_ERROR: u32 = 15_158_332;
pub const COLOR_WARNING: u32 = 16_776_960;
pub const COLOR_SUCCESS: u32 = 3_066_993;

/// Discord rejects embed descriptions longer than this.
const MAX_DESCRIPTION_CHARS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Error,
    Warning,
}

impl AlertLevel {
    #[must_use]
    pub const fn color(self) -> u32 {
        match self {
            Self::Error => COLOR_ERROR,
            Self::Warning => COLOR_WARNING,
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("ERROR"),
            Self::Warning => f.write_str("WARNING"),
        }
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    embeds: [Embed; 1],
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    description: String,
    color: u32,
    timestamp: String,
    footer: Footer,
}

#[derive(Debug, Serialize)]
struct Footer {
    text: &'static str,
}

#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    script_name: String,
    webhook_url: Option<String>,
}

impl DiscordNotifier {
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 에러를 반환한다.
    pub fn new(script_name: impl Into<String>, webhook_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build discord client")?;
        Ok(Self {
            client,
            script_name: script_name.into(),
            webhook_url,
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn notify_error(&self, message: &str, level: AlertLevel) {
        let Some(url) = self.webhook_url.as_deref() else {
            warn!(script = %self.script_name, "discord webhook not configured, alert skipped");
            return;
        };
        let payload = Self::payload(
            format!("⚠️ {level}: {}", self.script_name),
            message,
            level.color(),
            time::now(),
        );
        if let Err(error) = self.post(url, &payload).await {
            warn!(error = %format!("{error:#}"), "discord alert delivery failed");
        }
    }

    pub async fn notify_success(&self, message: &str) {
        let Some(url) = self.webhook_url.as_deref() else {
            return;
        };
        let payload = Self::payload(
            format!("✅ 성공: {}", self.script_name),
            message,
            COLOR_SUCCESS,
            time::now(),
        );
        let _ = self.post(url, &payload).await;
    }

    /// Runs `job`, logging its duration. Failures are reported to Discord and
    /// returned unchanged.
    ///
    /// # Errors
    /// Whatever `job` returns.
    pub async fn run_reported<T, F>(&self, job: &str, notify_success: bool, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        info!(job, "job started");
        let started = Instant::now();
        match future.await {
            Ok(value) => {
                let elapsed = started.elapsed().as_secs_f64();
                info!(job, elapsed_secs = elapsed, "job finished");
                if notify_success {
                    self.notify_success(&format!("{job} 실행 완료 ({elapsed:.1}초)"))
                        .await;
                }
                Ok(value)
            }
            Err(err) => {
                error!(job, error = %format!("{err:#}"), "job failed");
                self.notify_error(&format!("에러 발생: {err}\n스크립트: {job}"), AlertLevel::Error)
                    .await;
                Err(err)
            }
        }
    }

    fn payload(
        title: String,
        message: &str,
        color: u32,
        now: DateTime<Utc>,
    ) -> WebhookPayload {
        WebhookPayload {
            embeds: [Embed {
                title,
                description: truncate_chars(message, MAX_DESCRIPTION_CHARS),
                color,
                timestamp: time::kst_now(now).to_rfc3339_opts(SecondsFormat::Secs, false),
                footer: Footer { text: FOOTER_TEXT },
            }],
        }
    }

    async fn post(&self, url: &str, payload: &WebhookPayload) -> Result<()> {
        self.client
            .post(url)
            .json(payload)
            .send()
            .await
            .context("discord webhook request failed")?
            .error_for_status()
            .context("discord webhook returned error status")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(server: &MockServer) -> DiscordNotifier {
        DiscordNotifier::new("daily", Some(format!("{}/hook", server.uri())))
            .expect("notifier builds")
    }

    #[tokio::test]
    async fn notify_error_posts_colored_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(json!({
                "embeds": [{
                    "title": "⚠️ WARNING: daily",
                    "description": "시트가 비어 있음",
                    "color": COLOR_WARNING,
                    "footer": { "text": FOOTER_TEXT }
                }]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server)
            .notify_error("시트가 비어 있음", AlertLevel::Warning)
            .await;
    }

    #[tokio::test]
    async fn webhook_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server).notify_error("x", AlertLevel::Error).await;
    }

    #[tokio::test]
    async fn unconfigured_notifier_is_a_no_op() {
        let notifier = DiscordNotifier::new("daily", None).expect("notifier builds");
        assert!(!notifier.is_configured());
        notifier.notify_error("x", AlertLevel::Error).await;
        notifier.notify_success("y").await;
    }

    #[tokio::test]
    async fn run_reported_alerts_and_reraises() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "embeds": [{
                    "title": "⚠️ ERROR: daily",
                    "description": "에러 발생: sheet down\n스크립트: daily",
                    "color": COLOR_ERROR
                }]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let result: Result<()> = notifier(&server)
            .run_reported("daily", false, async { Err(anyhow!("sheet down")) })
            .await;

        assert_eq!(result.expect_err("re-raised").to_string(), "sheet down");
    }

    #[tokio::test]
    async fn run_reported_sends_success_when_asked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "embeds": [{ "title": "✅ 성공: daily", "color": COLOR_SUCCESS }]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let value = notifier(&server)
            .run_reported("daily", true, async { Ok(7) })
            .await
            .expect("ok");
        assert_eq!(value, 7);
    }
}
