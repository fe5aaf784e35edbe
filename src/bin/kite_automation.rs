use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use kite_automation::config::{AppConfig, CONFIG_PATH};
use kite_automation::engine::SharedResources;
use kite_automation::proxy::ProxyPool;
use kite_automation::registry::EndpointRegistry;
use kite_automation::session::WalletSession;
use kite_automation::{MAX_DAILY_POINTS, reporter, resources, scheduler};

#[derive(Parser)]
#[command(
    name = "kite-automation",
    about = "Kite AI testnet multi-wallet interaction bot"
)]
struct Args {
    /// Config file path
    #[arg(long, default_value = CONFIG_PATH)]
    config: String,

    /// Stop every session after this many cycles (smoke testing)
    #[arg(long)]
    max_cycles: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load_or_default(Path::new(&args.config))?;
    if config.settings.cooldown_min_secs > config.settings.cooldown_max_secs {
        anyhow::bail!("cooldown_min_secs must not exceed cooldown_max_secs");
    }

    // Wallets and questions are required; proxies are optional.
    let wallets = resources::load_wallets(Path::new(&config.resources.wallets_file))?;
    let questions = resources::load_questions(Path::new(&config.resources.questions_file))?;
    let proxies = resources::load_proxies(Path::new(&config.resources.proxies_file))?;

    info!(
        "loaded {} wallet(s), {} question(s), {} prox(ies)",
        wallets.len(),
        questions.len(),
        proxies.len()
    );
    if proxies.is_empty() {
        info!("no proxies configured, using direct connection");
    }

    let registry = EndpointRegistry::kite_defaults();
    let pool = ProxyPool::new(
        proxies,
        Duration::from_secs(config.settings.request_timeout_secs),
    )?;
    let shared = Arc::new(SharedResources {
        proxies: pool,
        registry,
        questions,
        feed_url: config.settings.feed_url.clone(),
        usage_url: config.settings.usage_url.clone(),
        cooldown_min_secs: config.settings.cooldown_min_secs,
        cooldown_max_secs: config.settings.cooldown_max_secs,
        max_cycles: args.max_cycles,
    });

    let agent_names = shared.registry.agent_names();
    let now = Utc::now();
    let sessions: Vec<WalletSession> = wallets
        .into_iter()
        .enumerate()
        .map(|(i, wallet)| WalletSession::new(wallet, i + 1, &agent_names, now))
        .collect();

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received, letting in-flight cycles finish");
            let _ = stop_tx.send(true);
        }
    });

    info!(
        "starting {} session(s), daily target {MAX_DAILY_POINTS} points each. Press Ctrl+C to stop.",
        sessions.len()
    );
    let finished = scheduler::run_sessions(shared, sessions, stop_rx).await;

    // Final per-wallet summary.
    let now = Utc::now();
    for session in &finished {
        reporter::report_snapshot(&session.snapshot(now));
    }
    info!("all sessions finished");
    Ok(())
}
