mod auth;
mod config;
mod inbound;
mod materialize;
mod platform;
mod relay;
mod server;
mod workspace;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::inbound::Listener;
use crate::materialize::Materializer;
use crate::relay::RelayQueue;
use crate::server::AppState;
use crate::workspace::LocalWorkspace;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tgrelay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Config file is optional; the environment alone is enough.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    if let Some(path) = &config_path {
        info!("Loading configuration from: {}", path.display());
    }
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    let allow_list = Arc::new(config.allow_list());
    info!("Configuration loaded successfully");
    info!("  Port: {}", config.port());
    info!("  Allowed user IDs: {:?}", config.telegram.allowed_user_ids);
    info!("  Allowed usernames: {:?}", config.telegram.allowed_usernames);
    if allow_list.is_empty() {
        warn!("Allow-list is empty; every inbound message will be dropped");
    }

    let bot = Bot::new(&config.telegram.bot_token);
    let account = platform::telegram::verify(&bot).await?;
    info!("Authorized on account {}", account);

    let workspace = LocalWorkspace::open(&config.workspace.directory)?;
    let workspace_root = workspace.root().to_path_buf();
    let materializer = Materializer::new(
        Arc::new(workspace),
        Duration::from_secs(config.relay.fetch_timeout_secs),
    )?;
    let queue = Arc::new(RelayQueue::new(config.relay.queue_capacity));
    info!("  Workspace: {}", workspace_root.display());
    info!("  Queue capacity: {}", queue.capacity());

    let state = AppState {
        queue: Arc::clone(&queue),
        materializer: Arc::new(materializer),
        sender: Arc::new(bot.clone()),
        base_url: config.base_url(),
    };
    let listener = Arc::new(Listener::new(allow_list, queue, Arc::new(bot.clone())));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(server::serve(config.port(), state, async move {
        let _ = shutdown_rx.await;
    }));

    info!("Telegram relay started");
    let outcome = tokio::select! {
        res = platform::telegram::run(bot, listener) => res,
        res = &mut server => return res.context("HTTP server task panicked")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            Ok(())
        }
    };

    // Let in-flight requests finish before the runtime goes away.
    let _ = shutdown_tx.send(());
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(res) => res.context("HTTP server task panicked")??,
        Err(_) => warn!("HTTP server did not stop within {:?}", SHUTDOWN_GRACE),
    }
    outcome
}
