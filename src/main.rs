//! # FilingWatch
//!
//! Runs the exchange-filing scraper on a schedule and emails every new filing
//! to the configured recipients exactly once per database.
//!
//! Usage:
//!   filingwatch                       # scheduler + HTTP gateway (default)
//!   filingwatch run-once              # one scrape → dispatch job, then exit
//!   filingwatch dispatch              # send pending filings without scraping
//!   filingwatch check-config          # print configuration issues
//!   filingwatch test-email --to a@b   # send a sample notification

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{FixedOffset, Offset, Utc};
use clap::{Parser, Subcommand};
use filingwatch_core::config::FilingWatchConfig;
use filingwatch_core::types::{Filing, OutgoingMail};
use filingwatch_core::FilingStore;
use filingwatch_scheduler::{
    GateOutcome, NotificationDispatcher, Renderer, ScraperRunner, TriggerGate, spawn_scheduler,
};
use filingwatch_store::SqliteFilingStore;

#[derive(Parser)]
#[command(
    name = "filingwatch",
    version,
    about = "📰 FilingWatch: scheduled filing scraper with email alerts"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (default: ~/.filingwatch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start the scheduler and HTTP gateway
    Serve,
    /// Run one scrape → dispatch job and exit
    RunOnce,
    /// Dispatch pending filings without running the scraper
    Dispatch,
    /// Validate configuration and exit
    CheckConfig,
    /// Send a sample notification through the configured transport
    TestEmail {
        /// Recipient override (default: configured recipients)
        #[arg(long)]
        to: Option<String>,
    },
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => FilingWatchConfig::load_from(&expand_path(path))?,
        None => FilingWatchConfig::load()?,
    };

    let offset = config.log.utc_offset().unwrap_or_else(|_| Utc.fix());
    logging::init(cli.verbose, cli.json, offset);
    config.apply_env_overrides();

    let issues = config.validate();
    for issue in &issues {
        tracing::warn!("⚠️ Config: {issue}");
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::CheckConfig => {
            if issues.is_empty() {
                println!("✅ Configuration OK");
                return Ok(());
            }
            for issue in &issues {
                println!("❌ {issue}");
            }
            anyhow::bail!("{} configuration issue(s)", issues.len());
        }
        Command::TestEmail { to } => test_email(&config, offset, to).await,
        Command::Dispatch => {
            let app = App::build(&config, offset)?;
            let outcome = app.dispatcher.process_pending().await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Command::RunOnce => {
            let app = App::build(&config, offset)?;
            match app.gate.request_run().await {
                GateOutcome::Completed(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                GateOutcome::Skipped => println!("⏭️ Job skipped"),
            }
            Ok(())
        }
        Command::Serve => serve(config, issues, offset).await,
    }
}

/// Wired-up pipeline components.
struct App {
    store: Arc<dyn FilingStore>,
    dispatcher: Arc<NotificationDispatcher>,
    gate: Arc<TriggerGate>,
}

impl App {
    fn build(config: &FilingWatchConfig, offset: FixedOffset) -> Result<Self> {
        let store: Arc<dyn FilingStore> =
            Arc::new(SqliteFilingStore::open(&config.store.resolved_path())?);

        let transport = match filingwatch_channels::build_transport(&config.transport) {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::error!("❌ Email transport unavailable: {e} ({})", e.hint());
                None
            }
        };

        let dispatcher = Arc::new(
            NotificationDispatcher::new(
                store.clone(),
                transport,
                config.dispatch.recipient_list(),
                Renderer::new(config.dispatch.subject_prefix.clone(), offset),
            )
            .with_message_delay(config.dispatch.message_delay()),
        );
        let runner = Arc::new(ScraperRunner::new(config.scraper.clone()));
        let gate = Arc::new(
            TriggerGate::new(runner, dispatcher.clone())
                .with_settle_delay(config.dispatch.settle_delay()),
        );

        Ok(Self {
            store,
            dispatcher,
            gate,
        })
    }
}

async fn serve(
    config: FilingWatchConfig,
    issues: Vec<filingwatch_core::config::ConfigIssue>,
    offset: FixedOffset,
) -> Result<()> {
    tracing::info!("📰 FilingWatch v{} starting", env!("CARGO_PKG_VERSION"));
    let app = App::build(&config, offset)?;
    let scheduler = spawn_scheduler(app.gate.clone(), config.dispatch.interval());

    let mut state = filingwatch_gateway::AppState::new(app.store.clone(), scheduler);
    state.config_issues = issues;
    state.admin_token = config.gateway.admin_token.clone();

    tokio::select! {
        result = filingwatch_gateway::start(&config.gateway, state) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("👋 Shutting down");
            Ok(())
        }
    }
}

async fn test_email(config: &FilingWatchConfig, offset: FixedOffset, to: Option<String>) -> Result<()> {
    let recipients = match to {
        Some(raw) => filingwatch_core::config::parse_recipients(&raw),
        None => config.dispatch.recipient_list(),
    };
    if recipients.is_empty() {
        anyhow::bail!("no recipients: pass --to or set EMAIL_TO");
    }

    let transport = filingwatch_channels::build_transport(&config.transport)?;
    let now = Utc::now();
    let sample = Filing {
        id: format!("test-{}", now.timestamp()),
        company_name: "FilingWatch".into(),
        company_code: None,
        category: "Test".into(),
        subject: "Transport check: if you can read this, delivery works".into(),
        summary: None,
        title: None,
        filed_at: now,
        scraped_at: now,
        source_page: None,
        pdf_url: None,
        screenshot: None,
        dispatched: false,
    };
    let rendered = Renderer::new(config.dispatch.subject_prefix.clone(), offset).render(&sample, now);
    let mail = OutgoingMail {
        recipients,
        subject: rendered.subject,
        html_body: rendered.html_body,
    };

    let id = transport.send(&mail).await?;
    println!("✅ Sent via {} to {} recipient(s): {id}", transport.name(), mail.recipients.len());
    Ok(())
}
