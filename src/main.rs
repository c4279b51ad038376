use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod config;
mod discord;
mod link_fixer;
mod models;
mod preview;
mod rewriter;
mod traits;

use config::Config;
use discord::DiscordClient;
use discord::gateway::{DEFAULT_INTENTS, Gateway, GatewayEvent};
use link_fixer::LinkFixer;

const EVENT_QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    info!("Starting link fixer bot");

    let client = DiscordClient::new(&config.bot_token);
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let gateway = tokio::spawn(Gateway::new(client.clone(), DEFAULT_INTENTS).run(tx));

    let fixer = LinkFixer::new(Arc::new(client));

    info!("The bot is now running. Press CTRL-C to exit.");

    tokio::select! {
        () = process_events(fixer, rx) => {
            match gateway.await.context("gateway task panicked")? {
                Ok(()) => warn!("Discord gateway stopped"),
                Err(e) => {
                    error!("Discord gateway stopped: {:#}", e);
                    return Err(e);
                }
            }
        }
        () = shutdown_signal() => info!("Shutdown signal received"),
    }

    Ok(())
}

/// Spawns a task per message so a slow reply never delays the next one.
async fn process_events(mut fixer: LinkFixer, mut rx: mpsc::Receiver<GatewayEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            GatewayEvent::Ready { user_id, .. } => {
                info!("Connected to Discord as user {}", user_id);
                fixer.set_bot_user_id(user_id);
            }
            GatewayEvent::MessageCreate(message) => {
                let fixer = fixer.clone();
                tokio::spawn(async move {
                    fixer.handle_message(&message).await;
                });
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
