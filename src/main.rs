use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use econ_news_digest::{
    app::{ComponentRegistry, build_router},
    clients::discord::AlertLevel,
    config::Config,
    scheduler::{JobKind, spawn_kst_daemons},
    util::time,
};

#[derive(Parser)]
#[command(name = "econ-news-digest")]
#[command(version, about = "Economic news digest worker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// HTTP control plane plus the daily/weekly daemons
    Serve,
    /// Scrape today's ranking into the Markdown archive
    Collect,
    /// Append an archive to the source sheet
    Upload {
        /// KST date of the archive (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Publish today's digest
    Daily,
    /// Publish the weekly insight
    Weekly,
    /// Write the real-estate insight for today's digest
    Insight,
    /// Regenerate the static dashboard
    Dashboard,
    /// collect → upload → daily → insight → dashboard
    DailyBatch,
    /// Send a test message to the Discord webhook
    NotifyTest,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                column = location.column(),
                message,
                "panic occurred"
            );
        } else {
            error!(
                thread = thread_name,
                message, "panic occurred without location information"
            );
        }
    }));

    let cli = Cli::parse();

    // Tracing initialization is handled by Telemetry::new()
    let config = Config::from_env().context("failed to load configuration")?;
    let registry =
        ComponentRegistry::build(config).context("failed to build component registry")?;

    let kind = match cli.command {
        Commands::Serve => return serve(registry).await,
        Commands::NotifyTest => {
            let notifier = registry.notifier();
            if !notifier.is_configured() {
                warn!("DISCORD_WEBHOOK_URL not set, nothing to send");
            }
            notifier
                .notify_error("웹훅 연결 테스트입니다.", AlertLevel::Warning)
                .await;
            notifier.notify_success("웹훅 연결 테스트입니다.").await;
            return Ok(());
        }
        Commands::Upload { date: Some(date) } => {
            let output = registry.scheduler().run_upload_for(date).await?;
            let summary = serde_json::to_string(&output).context("failed to encode job output")?;
            info!(job = JobKind::Upload.as_str(), output = %summary, "job finished");
            return Ok(());
        }
        Commands::Upload { date: None } => JobKind::Upload,
        Commands::Collect => JobKind::Collect,
        Commands::Daily => JobKind::Daily,
        Commands::Weekly => JobKind::Weekly,
        Commands::Insight => JobKind::Insight,
        Commands::Dashboard => JobKind::Dashboard,
        Commands::DailyBatch => JobKind::DailyBatch,
    };

    let output = registry.scheduler().run_now(kind).await?;
    let summary = serde_json::to_string(&output).context("failed to encode job output")?;
    info!(job = kind.as_str(), output = %summary, "job finished");
    Ok(())
}

async fn serve(registry: ComponentRegistry) -> anyhow::Result<()> {
    let config = registry.config();
    let bind_addr = config.http_bind();

    if config.scheduler_enabled() {
        let _daemons = spawn_kst_daemons(registry.scheduler(), &config)?;
        info!(
            today = %time::kst_date(time::now()),
            "automatic daily and weekly runs scheduled"
        );
    } else {
        warn!("SCHEDULER_ENABLED=false, automatic runs are disabled");
    }
    let router = build_router(registry);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {bind_addr}"))?;

    info!(%bind_addr, "listening");

    if let Err(error) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        warn!(error = %error, "server exited with error");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

