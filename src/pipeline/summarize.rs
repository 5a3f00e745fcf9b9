//! 언어 모델 기반 요약. 짧은 요약은 실패 시 고정된 대체 문구로 떨어진다.
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::{
    clients::anthropic::{CompletionRequest, LanguageModel},
    util::text::{leading_chars, truncate_chars},
};

pub const TITLE_MAX_CHARS: usize = 25;
pub const CONTENT_MAX_CHARS: usize = 20;
pub const CONTENT_PROMPT_CHARS: usize = 500;
pub const TREND_TITLES: usize = 3;

pub const CONTENT_FALLBACK: &str = "주요 내용 요약 실패";
pub const TREND_FALLBACK: &str = "주요 동향";
pub const WEEKLY_FALLBACK: &str = "요약 실패";

const SHORT_TEMPERATURE: f32 = 0.3;
const LONG_TEMPERATURE: f32 = 0.5;

#[derive(Clone)]
pub struct Summarizer {
    model: Arc<dyn LanguageModel>,
    fast_model: String,
    analysis_model: String,
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("fast_model", &self.fast_model)
            .field("analysis_model", &self.analysis_model)
            .finish_non_exhaustive()
    }
}

impl Summarizer {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        fast_model: impl Into<String>,
        analysis_model: impl Into<String>,
    ) -> Self {
        Self {
            model,
            fast_model: fast_model.into(),
            analysis_model: analysis_model.into(),
        }
    }

    fn fast(&self, prompt: String, max_tokens: u32, temperature: f32) -> CompletionRequest {
        CompletionRequest::new(self.fast_model.as_str(), prompt)
            .with_max_tokens(max_tokens)
            .with_temperature(temperature)
    }

    /// 제목을 25자 이내로 줄인다.
    pub async fn summarize_title(&self, title: &str) -> String {
        let prompt = format!(
            "다음 뉴스 제목을 {TITLE_MAX_CHARS}자 이내로 핵심만 요약하세요.\n\n\
             제목: {title}\n\n\
             규칙:\n\
             - {TITLE_MAX_CHARS}자 이내\n\
             - 불필요한 특수문자나 따옴표 제거\n\
             - 핵심 키워드와 주요 내용만 포함\n\n\
             예시:\n\
             입력: [단독] \"이러다 삼성에 다 뺏긴다\" '초유의 사태' 애플, 15년만에 내놓은 역대급 기능?\n\
             출력: 애플 나의찾기 15년만 국내 출시\n\n\
             요약:"
        );
        match self
            .model
            .complete(self.fast(prompt, 50, SHORT_TEMPERATURE))
            .await
        {
            Ok(summary) => summary,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "title summary failed, using cleaned title");
                fallback_title(title)
            }
        }
    }

    pub async fn summarize_content(&self, content: &str) -> String {
        let excerpt = leading_chars(content, CONTENT_PROMPT_CHARS);
        let prompt = format!(
            "다음 뉴스 내용의 핵심을 {CONTENT_MAX_CHARS}자 이내로 요약하세요.\n\n\
             내용: {excerpt}\n\n\
             규칙:\n\
             - {CONTENT_MAX_CHARS}자 이내\n\
             - 핵심 사실이나 수치 포함\n\
             - 원인이나 영향 중심으로 요약\n\n\
             예시:\n\
             입력: 서울 강남구에서 20년 이상 보유한 아파트의 매도가 급증했다. \
             상급지로의 이동 수요와 절세 목적의 현금화가 주요 원인으로 분석된다.\n\
             출력: 상급지 이동과 절세 목적 현금화\n\n\
             요약:"
        );
        match self
            .model
            .complete(self.fast(prompt, 50, SHORT_TEMPERATURE))
            .await
        {
            Ok(summary) => summary,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "content summary failed");
                CONTENT_FALLBACK.to_string()
            }
        }
    }

    /// Common theme of the first three titles.
    pub async fn category_trend(&self, titles: &[&str]) -> String {
        let joined = titles
            .iter()
            .take(TREND_TITLES)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "다음 뉴스들의 공통 트렌드를 15자 이내로 요약하세요.\n\n\
             {joined}\n\n\
             규칙:\n\
             - 15자 이내\n\
             - 하나의 간결한 문장\n\
             - 공통되는 핵심 주제 파악\n\n\
             요약:"
        );
        match self
            .model
            .complete(self.fast(prompt, 30, SHORT_TEMPERATURE))
            .await
        {
            Ok(trend) => trend,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "category trend failed");
                TREND_FALLBACK.to_string()
            }
        }
    }

    /// 서울 아파트 투자 관점의 분석. 실패는 호출자에게 전파한다.
    ///
    /// # Errors
    /// Propagates the language model failure.
    pub async fn real_estate_insight(&self, text_block: &str) -> Result<String> {
        let prompt = format!(
            "너는 한국의 서울 아파트 투자 분석가야. 아래 뉴스 요약을 읽고, \
             서울아파트 투자 관점에서 의미 있는 시사점이나 트렌드를 5문단 이내로 정리해줘.\n\n\
             {text_block}\n\n\
             형식: 부동산 투자 관점에서 요약된 분석 문단 (5문단 이내)\n"
        );
        let request = CompletionRequest::new(self.analysis_model.as_str(), prompt)
            .with_max_tokens(300)
            .with_temperature(LONG_TEMPERATURE);
        self.model.complete(request).await
    }

    pub async fn weekly_insight(&self, texts: &str) -> String {
        let prompt = format!(
            "아래는 이번 주의 주요 경제 뉴스 기사들입니다. \
             이 내용을 요약하여 아파트 투자자 입장에서 의미 있는 인사이트를 제시해주세요.\n\n\
             {texts}\n\n\
             요약:"
        );
        match self
            .model
            .complete(self.fast(prompt, 500, LONG_TEMPERATURE))
            .await
        {
            Ok(insight) => insight,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "weekly insight failed");
                WEEKLY_FALLBACK.to_string()
            }
        }
    }
}

/// Title without quotes and the `[단독]` tag, cut to 25 characters.
#[must_use]
pub fn fallback_title(title: &str) -> String {
    let cleaned = title.replace(['"', '\''], "").replace("[단독]", "");
    truncate_chars(cleaned.trim(), TITLE_MAX_CHARS)
}
