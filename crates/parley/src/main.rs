// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley - a multi-platform chatbot gateway.
//!
//! This is the binary entry point for the Parley gateway.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use parley_config::ParleyConfig;
use parley_conversation::ConversationManager;
use parley_core::ChannelAdapter;
use parley_gateway::{ChannelMultiplexer, GatewayLoop};
use parley_registry::CommandRegistry;
use parley_router::CommandRouter;

/// Parley - a multi-platform chatbot gateway.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Parley gateway.
    Serve,
    /// Show the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup
    let config = match parley_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            parley_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve(config).await {
                eprintln!("parley: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => {
            match toml::to_string_pretty(&config) {
                Ok(rendered) => println!("{rendered}"),
                Err(e) => {
                    eprintln!("parley: failed to render config: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("parley: use --help for available commands");
        }
    }
}

fn init_tracing(config: &ParleyConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.gateway.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Wire the gateway together and run it until ctrl-c.
///
/// Platform wire adapters register themselves with the multiplexer here once
/// their crates exist; integrations register commands against the registry.
/// Until then the gateway runs with whatever the embedding code provides.
async fn serve(config: ParleyConfig) -> Result<(), parley_core::ParleyError> {
    info!(name = config.gateway.name.as_str(), "parley starting");

    let enabled: Vec<&str> = [
        ("slack", config.slack.enabled),
        ("teams", config.teams.enabled),
        ("mattermost", config.mattermost.enabled),
        ("wechat", config.wechat.enabled),
    ]
    .iter()
    .filter(|(_, on)| *on)
    .map(|(name, _)| *name)
    .collect();
    if enabled.is_empty() {
        warn!("no platforms enabled; the gateway will idle until shutdown");
    } else {
        info!(platforms = ?enabled, "enabled platforms");
    }

    let registry = CommandRegistry::new(&config.gateway.name, &config.gateway.reserved_words);
    let router = Arc::new(CommandRouter::new(
        Arc::new(registry),
        Duration::from_secs(config.auth.credentials_ttl_secs),
        Duration::from_secs(config.auth.login_ttl_secs),
    ));

    let (manager, expired_rx) = ConversationManager::new(
        config.gateway.scope_mode,
        Duration::from_secs(config.conversation.expiry_secs),
        &config.conversation.skip_keyword,
    );

    let mut mux = ChannelMultiplexer::new();
    mux.connect().await?;
    let channel: Arc<dyn ChannelAdapter + Send + Sync> = Arc::new(mux);

    let mut gateway = GatewayLoop::new(
        channel,
        manager,
        expired_rx,
        router,
        Duration::from_secs(config.auth.sweep_interval_secs),
        config.nlu.confidence_threshold,
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received");
            signal_cancel.cancel();
        }
    });

    gateway.run(cancel).await
}
