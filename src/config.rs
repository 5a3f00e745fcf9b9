use std::{env, net::SocketAddr, num::NonZeroUsize, path::PathBuf, time::Duration};

use chrono::Weekday;
use thiserror::Error;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

pub const DEFAULT_RANKING_URL: &str =
    "https://news.naver.com/main/ranking/popularDay.naver?mid=etc&sid1=101";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    spreadsheet_id: String,
    source_sheet: String,
    target_sheet: String,
    weekly_sheet: String,
    sheets_base_url: String,
    google_token_url: String,
    google_credentials: Option<String>,
    google_credentials_file: Option<PathBuf>,
    anthropic_api_key: Option<String>,
    anthropic_base_url: String,
    llm_fast_model: String,
    llm_analysis_model: String,
    llm_timeout: Duration,
    discord_webhook_url: Option<String>,
    news_ranking_url: String,
    news_base_url: String,
    scrape_concurrency: NonZeroUsize,
    scrape_timeout: Duration,
    http_max_retries: usize,
    http_backoff_base_ms: u64,
    http_backoff_cap_ms: u64,
    data_dir: PathBuf,
    dashboard_dir: PathBuf,
    digest_top_n: usize,
    max_articles_per_category: usize,
    min_articles_per_category: usize,
    relevance_config_path: Option<PathBuf>,
    scheduler_enabled: bool,
    daily_run_hour: u32,
    daily_run_minute: u32,
    weekly_run_weekday: Weekday,
    weekly_run_hour: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 환경 변수에서 다이제스트 워커 설정을 읽고 검증한다.
    ///
    /// # Errors
    /// `SPREADSHEET_ID` 가 없거나 숫자/주소/요일 파싱에 실패하면 [`ConfigError`] 를 반환한다.
    pub fn from_env() -> Result<Self, ConfigError> {
        let spreadsheet_id = env_var("SPREADSHEET_ID")?;
        let http_bind = parse_socket_addr("DIGEST_HTTP_BIND", "0.0.0.0:9010")?;

        // Sheets
        let source_sheet = env_or("SOURCE_SHEET_NAME", "뉴스요약");
        let target_sheet = env_or("TARGET_SHEET_NAME", "요약결과");
        let weekly_sheet = env_or("WEEKLY_SHEET_NAME", "주간요약");
        let sheets_base_url = env_or("SHEETS_BASE_URL", "https://sheets.googleapis.com/");
        let google_token_url = env_or("GOOGLE_TOKEN_URL", "https://oauth2.googleapis.com/token");
        let google_credentials = optional_env("GOOGLE_CREDENTIALS");
        let google_credentials_file = optional_env("GOOGLE_CREDENTIALS_FILE").map(PathBuf::from);

        // Language model
        let anthropic_api_key = optional_env("ANTHROPIC_API_KEY");
        let anthropic_base_url = env_or("ANTHROPIC_BASE_URL", "https://api.anthropic.com/");
        let llm_fast_model = env_or("LLM_FAST_MODEL", "claude-3-haiku-20240307");
        let llm_analysis_model = env_or("LLM_ANALYSIS_MODEL", "claude-3-sonnet-20240229");
        let llm_timeout = parse_duration_secs("LLM_TIMEOUT_SECS", 30)?;

        let discord_webhook_url = optional_env("DISCORD_WEBHOOK_URL");

        // Scraper
        let news_ranking_url = env_or("NEWS_RANKING_URL", DEFAULT_RANKING_URL);
        let news_base_url = env_or("NEWS_BASE_URL", "https://news.naver.com");
        let scrape_concurrency = parse_non_zero_usize("SCRAPE_CONCURRENCY", 4)?;
        let scrape_timeout = parse_duration_secs("SCRAPE_TIMEOUT_SECS", 15)?;

        // Retry settings (exponential backoff + jitter)
        let http_max_retries = parse_usize("HTTP_MAX_RETRIES", 3)?;
        let http_backoff_base_ms = parse_u64("HTTP_BACKOFF_BASE_MS", 250)?;
        let http_backoff_cap_ms = parse_u64("HTTP_BACKOFF_CAP_MS", 10000)?;

        let data_dir = PathBuf::from(env_or("DATA_DIR", "data"));
        let dashboard_dir = PathBuf::from(env_or("DASHBOARD_DIR", "docs"));

        // Selection
        let digest_top_n = parse_usize("DIGEST_TOP_N", 5)?;
        let max_articles_per_category = parse_usize("MAX_ARTICLES_PER_CATEGORY", 10)?;
        let min_articles_per_category = parse_usize("MIN_ARTICLES_PER_CATEGORY", 3)?;
        let relevance_config_path = optional_env("RELEVANCE_CONFIG").map(PathBuf::from);

        // Schedule (KST)
        let scheduler_enabled = parse_bool("SCHEDULER_ENABLED", true)?;
        let daily_run_hour = parse_bounded_u32("DAILY_RUN_HOUR", 7, 23)?;
        let daily_run_minute = parse_bounded_u32("DAILY_RUN_MINUTE", 0, 59)?;
        let weekly_run_weekday = parse_weekday("WEEKLY_RUN_WEEKDAY", Weekday::Sun)?;
        let weekly_run_hour = parse_bounded_u32("WEEKLY_RUN_HOUR", 9, 23)?;

        Ok(Self {
            http_bind,
            spreadsheet_id,
            source_sheet,
            target_sheet,
            weekly_sheet,
            sheets_base_url,
            google_token_url,
            google_credentials,
            google_credentials_file,
            anthropic_api_key,
            anthropic_base_url,
            llm_fast_model,
            llm_analysis_model,
            llm_timeout,
            discord_webhook_url,
            news_ranking_url,
            news_base_url,
            scrape_concurrency,
            scrape_timeout,
            http_max_retries,
            http_backoff_base_ms,
            http_backoff_cap_ms,
            data_dir,
            dashboard_dir,
            digest_top_n,
            max_articles_per_category,
            min_articles_per_category,
            relevance_config_path,
            scheduler_enabled,
            daily_run_hour,
            daily_run_minute,
            weekly_run_weekday,
            weekly_run_hour,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    #[must_use]
    pub fn source_sheet(&self) -> &str {
        &self.source_sheet
    }

    #[must_use]
    pub fn target_sheet(&self) -> &str {
        &self.target_sheet
    }

    #[must_use]
    pub fn weekly_sheet(&self) -> &str {
        &self.weekly_sheet
    }

    #[must_use]
    pub fn sheets_base_url(&self) -> &str {
        &self.sheets_base_url
    }

    #[must_use]
    pub fn google_token_url(&self) -> &str {
        &self.google_token_url
    }

    #[must_use]
    pub fn google_credentials(&self) -> Option<&str> {
        self.google_credentials.as_deref()
    }

    #[must_use]
    pub fn google_credentials_file(&self) -> Option<&PathBuf> {
        self.google_credentials_file.as_ref()
    }

    #[must_use]
    pub fn anthropic_api_key(&self) -> Option<&str> {
        self.anthropic_api_key.as_deref()
    }

    #[must_use]
    pub fn anthropic_base_url(&self) -> &str {
        &self.anthropic_base_url
    }

    #[must_use]
    pub fn llm_fast_model(&self) -> &str {
        &self.llm_fast_model
    }

    #[must_use]
    pub fn llm_analysis_model(&self) -> &str {
        &self.llm_analysis_model
    }

    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        self.llm_timeout
    }

    #[must_use]
    pub fn discord_webhook_url(&self) -> Option<&str> {
        self.discord_webhook_url.as_deref()
    }

    #[must_use]
    pub fn news_ranking_url(&self) -> &str {
        &self.news_ranking_url
    }

    #[must_use]
    pub fn news_base_url(&self) -> &str {
        &self.news_base_url
    }

    #[must_use]
    pub fn scrape_concurrency(&self) -> NonZeroUsize {
        self.scrape_concurrency
    }

    #[must_use]
    pub fn scrape_timeout(&self) -> Duration {
        self.scrape_timeout
    }

    #[must_use]
    pub fn http_max_retries(&self) -> usize {
        self.http_max_retries
    }

    #[must_use]
    pub fn http_backoff_base_ms(&self) -> u64 {
        self.http_backoff_base_ms
    }

    #[must_use]
    pub fn http_backoff_cap_ms(&self) -> u64 {
        self.http_backoff_cap_ms
    }

    #[must_use]
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    #[must_use]
    pub fn dashboard_dir(&self) -> &PathBuf {
        &self.dashboard_dir
    }

    #[must_use]
    pub fn digest_top_n(&self) -> usize {
        self.digest_top_n
    }

    #[must_use]
    pub fn max_articles_per_category(&self) -> usize {
        self.max_articles_per_category
    }

    #[must_use]
    pub fn min_articles_per_category(&self) -> usize {
        self.min_articles_per_category
    }

    #[must_use]
    pub fn relevance_config_path(&self) -> Option<&PathBuf> {
        self.relevance_config_path.as_ref()
    }

    #[must_use]
    pub fn scheduler_enabled(&self) -> bool {
        self.scheduler_enabled
    }

    #[must_use]
    pub fn daily_run_hour(&self) -> u32 {
        self.daily_run_hour
    }

    #[must_use]
    pub fn daily_run_minute(&self) -> u32 {
        self.daily_run_minute
    }

    #[must_use]
    pub fn weekly_run_weekday(&self) -> Weekday {
        self.weekly_run_weekday
    }

    #[must_use]
    pub fn weekly_run_hour(&self) -> u32 {
        self.weekly_run_hour
    }

    /// `data/raw` 아래 원문 아카이브 경로의 루트.
    #[must_use]
    pub fn raw_archive_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn env_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_env(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());

    raw.parse().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let parsed = parse_usize(name, default)?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_secs)?;
    Ok(Duration::from_secs(value))
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_bounded_u32(name: &'static str, default: u32, max: u32) -> Result<u32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    if parsed > max {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("value must be between 0 and {max}"),
        });
    }
    Ok(parsed)
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

fn parse_weekday(name: &'static str, default: Weekday) -> Result<Weekday, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<Weekday>().map_err(|_| ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid weekday: {raw}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_env(name: &str, value: &str) {
        // SAFETY: tests run sequentially and assign valid UTF-8 values.
        unsafe {
            env::set_var(name, value);
        }
    }

    fn remove_env(name: &str) {
        // SAFETY: tests run sequentially and clean up deterministic keys.
        unsafe {
            env::remove_var(name);
        }
    }

    fn reset_env() {
        for name in [
            "SPREADSHEET_ID",
            "DIGEST_HTTP_BIND",
            "SOURCE_SHEET_NAME",
            "TARGET_SHEET_NAME",
            "WEEKLY_SHEET_NAME",
            "SHEETS_BASE_URL",
            "GOOGLE_TOKEN_URL",
            "GOOGLE_CREDENTIALS",
            "GOOGLE_CREDENTIALS_FILE",
            "ANTHROPIC_API_KEY",
            "ANTHROPIC_BASE_URL",
            "LLM_FAST_MODEL",
            "LLM_ANALYSIS_MODEL",
            "LLM_TIMEOUT_SECS",
            "DISCORD_WEBHOOK_URL",
            "NEWS_RANKING_URL",
            "NEWS_BASE_URL",
            "SCRAPE_CONCURRENCY",
            "SCRAPE_TIMEOUT_SECS",
            "HTTP_MAX_RETRIES",
            "HTTP_BACKOFF_BASE_MS",
            "HTTP_BACKOFF_CAP_MS",
            "DATA_DIR",
            "DASHBOARD_DIR",
            "DIGEST_TOP_N",
            "MAX_ARTICLES_PER_CATEGORY",
            "MIN_ARTICLES_PER_CATEGORY",
            "RELEVANCE_CONFIG",
            "SCHEDULER_ENABLED",
            "DAILY_RUN_HOUR",
            "DAILY_RUN_MINUTE",
            "WEEKLY_RUN_WEEKDAY",
            "WEEKLY_RUN_HOUR",
        ] {
            remove_env(name);
        }
    }

    #[test]
    fn from_env_uses_defaults_when_optional_missing() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("SPREADSHEET_ID", "sheet-123");

        let config = Config::from_env().expect("config should load");

        assert_eq!(config.spreadsheet_id(), "sheet-123");
        assert_eq!(config.http_bind(), "0.0.0.0:9010".parse().unwrap());
        assert_eq!(config.source_sheet(), "뉴스요약");
        assert_eq!(config.target_sheet(), "요약결과");
        assert_eq!(config.weekly_sheet(), "주간요약");
        assert!(config.google_credentials().is_none());
        assert!(config.anthropic_api_key().is_none());
        assert_eq!(config.anthropic_base_url(), "https://api.anthropic.com/");
        assert_eq!(config.llm_fast_model(), "claude-3-haiku-20240307");
        assert_eq!(config.llm_analysis_model(), "claude-3-sonnet-20240229");
        assert_eq!(config.llm_timeout(), Duration::from_secs(30));
        assert!(config.discord_webhook_url().is_none());
        assert_eq!(config.news_ranking_url(), DEFAULT_RANKING_URL);
        assert_eq!(config.scrape_concurrency().get(), 4);
        assert_eq!(config.http_max_retries(), 3);
        assert_eq!(config.http_backoff_base_ms(), 250);
        assert_eq!(config.http_backoff_cap_ms(), 10000);
        assert_eq!(config.data_dir(), &PathBuf::from("data"));
        assert_eq!(config.raw_archive_dir(), PathBuf::from("data").join("raw"));
        assert_eq!(config.dashboard_dir(), &PathBuf::from("docs"));
        assert_eq!(config.digest_top_n(), 5);
        assert_eq!(config.max_articles_per_category(), 10);
        assert_eq!(config.min_articles_per_category(), 3);
        assert!(config.relevance_config_path().is_none());
        assert!(config.scheduler_enabled());
        assert_eq!(config.daily_run_hour(), 7);
        assert_eq!(config.daily_run_minute(), 0);
        assert_eq!(config.weekly_run_weekday(), Weekday::Sun);
        assert_eq!(config.weekly_run_hour(), 9);
    }

    #[test]
    fn from_env_overrides_values() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("SPREADSHEET_ID", "sheet-456");
        set_env("DIGEST_HTTP_BIND", "127.0.0.1:8088");
        set_env("TARGET_SHEET_NAME", "digest");
        set_env("ANTHROPIC_API_KEY", "sk-test");
        set_env("DISCORD_WEBHOOK_URL", "https://discord.example.com/hook");
        set_env("HTTP_MAX_RETRIES", "5");
        set_env("DIGEST_TOP_N", "3");
        set_env("WEEKLY_RUN_WEEKDAY", "sat");
        set_env("DAILY_RUN_HOUR", "6");
        set_env("DAILY_RUN_MINUTE", "30");
        set_env("RELEVANCE_CONFIG", "config/keywords.yaml");

        let config = Config::from_env().expect("config should load");

        assert_eq!(config.http_bind(), "127.0.0.1:8088".parse().unwrap());
        assert_eq!(config.target_sheet(), "digest");
        assert_eq!(config.anthropic_api_key(), Some("sk-test"));
        assert_eq!(
            config.discord_webhook_url(),
            Some("https://discord.example.com/hook")
        );
        assert_eq!(config.http_max_retries(), 5);
        assert_eq!(config.digest_top_n(), 3);
        assert_eq!(config.weekly_run_weekday(), Weekday::Sat);
        assert_eq!(config.daily_run_hour(), 6);
        assert_eq!(config.daily_run_minute(), 30);
        assert_eq!(
            config.relevance_config_path(),
            Some(&PathBuf::from("config/keywords.yaml"))
        );
    }

    #[test]
    fn from_env_errors_when_required_missing() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();

        let error = Config::from_env().expect_err("missing spreadsheet id should fail");

        assert!(matches!(error, ConfigError::Missing("SPREADSHEET_ID")));
    }

    #[test]
    fn from_env_rejects_out_of_range_hour() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("SPREADSHEET_ID", "sheet-123");
        set_env("DAILY_RUN_HOUR", "24");

        let error = Config::from_env().expect_err("hour 24 should fail");

        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "DAILY_RUN_HOUR",
                ..
            }
        ));
    }

    #[test]
    fn empty_optional_values_are_treated_as_unset() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("SPREADSHEET_ID", "sheet-123");
        set_env("DISCORD_WEBHOOK_URL", "  ");

        let config = Config::from_env().expect("config should load");

        assert!(config.discord_webhook_url().is_none());
    }
}
