use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::Router;
use tracing::{info, warn};

use crate::{
    api,
    classification::CategoryTable,
    clients::{
        anthropic::{AnthropicClient, CompletionRequest, LanguageModel},
        discord::DiscordNotifier,
        naver::NaverClient,
        sheets::{GoogleSheetsClient, SheetStore, google::GoogleSheetsConfig},
    },
    config::Config,
    observability::{Telemetry, metrics::Metrics},
    pipeline::{
        collect::{CollectLimits, Collector},
        summarize::Summarizer,
    },
    scheduler::{JobSettings, Scheduler},
    scoring::{RelevanceConfig, RelevanceSelector},
    util::retry::RetryConfig,
};

const SHEETS_TIMEOUT: Duration = Duration::from_secs(30);
const SCRIPT_NAME: &str = "econ-news-digest";

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    scheduler: Scheduler,
    notifier: DiscordNotifier,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.registry.scheduler
    }
}

impl ComponentRegistry {
    /// 설정으로 클라이언트와 파이프라인을 조립한다.
    ///
    /// Google Sheets와 Anthropic 자격 증명은 선택 사항이다. 없으면 해당 작업만
    /// 실행 시점에 실패하고 `/health/ready` 가 degraded 를 보고한다.
    ///
    /// # Errors
    /// Telemetry, 키워드 파일, HTTP 클라이언트 구성 중 하나라도 실패하면 에러를 반환한다.
    pub fn build(config: Config) -> Result<Self> {
        Self::assemble(config, Telemetry::new()?)
    }

    /// Same as [`ComponentRegistry::build`] without installing the global
    /// tracing subscriber.
    ///
    /// # Errors
    /// See [`ComponentRegistry::build`].
    pub fn build_without_tracing(config: Config) -> Result<Self> {
        Self::assemble(config, Telemetry::without_tracing()?)
    }

    fn assemble(config: Config, telemetry: Telemetry) -> Result<Self> {
        let config = Arc::new(config);
        let metrics = telemetry.metrics_handle();
        let retry = RetryConfig::new(
            config.http_max_retries(),
            config.http_backoff_base_ms(),
            config.http_backoff_cap_ms(),
        );
        let keyword_file = config.relevance_config_path().map(PathBuf::as_path);

        let relevance = Arc::new(
            RelevanceConfig::load_or_default(keyword_file).context("failed to load relevance tables")?,
        );
        let categories = Arc::new(
            CategoryTable::load_or_default(keyword_file).context("failed to load category table")?,
        );

        let naver = Arc::new(NaverClient::new(
            config.news_ranking_url(),
            config.news_base_url(),
            config.scrape_timeout(),
        )?);
        let collector = Arc::new(Collector::new(
            naver,
            categories,
            config.raw_archive_dir(),
            CollectLimits {
                max_per_category: config.max_articles_per_category(),
                min_per_category: config.min_articles_per_category(),
                concurrency: config.scrape_concurrency(),
            },
        ));

        let store = build_sheet_store(&config, retry)?;
        let summarizer = build_summarizer(&config, retry, Arc::clone(&metrics))?;
        let notifier = DiscordNotifier::new(SCRIPT_NAME, config.discord_webhook_url().map(str::to_string))?;
        if !notifier.is_configured() {
            info!("DISCORD_WEBHOOK_URL not set, alerts are logged only");
        }

        let scheduler = Scheduler::new(
            JobSettings::from_config(&config),
            collector,
            store,
            summarizer,
            Arc::new(RelevanceSelector::new(relevance)),
            notifier.clone(),
            metrics,
        );

        Ok(Self {
            config,
            telemetry,
            scheduler,
            notifier,
        })
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    #[must_use]
    pub fn notifier(&self) -> &DiscordNotifier {
        &self.notifier
    }

    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }
}

fn build_sheet_store(config: &Config, retry: RetryConfig) -> Result<Option<Arc<dyn SheetStore>>> {
    if config.google_credentials().is_none() && config.google_credentials_file().is_none() {
        warn!("google credentials not configured, sheet jobs are disabled");
        return Ok(None);
    }
    let client = GoogleSheetsClient::from_credentials(
        GoogleSheetsConfig {
            base_url: config.sheets_base_url().to_string(),
            token_url: config.google_token_url().to_string(),
            spreadsheet_id: config.spreadsheet_id().to_string(),
            timeout: SHEETS_TIMEOUT,
            retry,
        },
        config.google_credentials(),
        config.google_credentials_file().map(PathBuf::as_path),
    )?;
    Ok(Some(Arc::new(client)))
}

fn build_summarizer(
    config: &Config,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
) -> Result<Option<Summarizer>> {
    let Some(api_key) = config.anthropic_api_key() else {
        warn!("ANTHROPIC_API_KEY not set, summary jobs are disabled");
        return Ok(None);
    };
    let client = AnthropicClient::new(
        config.anthropic_base_url(),
        api_key,
        config.llm_timeout(),
        retry,
    )?;
    let model: Arc<dyn LanguageModel> = Arc::new(MeteredModel::new(Arc::new(client), metrics));
    Ok(Some(Summarizer::new(
        model,
        config.llm_fast_model(),
        config.llm_analysis_model(),
    )))
}

/// Counts language model calls and failures.
pub struct MeteredModel {
    inner: Arc<dyn LanguageModel>,
    metrics: Arc<Metrics>,
}

impl MeteredModel {
    pub fn new(inner: Arc<dyn LanguageModel>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl LanguageModel for MeteredModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.metrics.llm_requests.inc();
        let result = self.inner.complete(request).await;
        if result.is_err() {
            self.metrics.llm_failures.inc();
        }
        result
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
}
