#![warn(clippy::nursery, clippy::pedantic)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(not(feature = "rocksdb"))]
use anyhow::bail;
use anyhow::{Context, Result};
use ephemeral_server::cleanup::cleanup;
use ephemeral_server::clock::SystemClock;
#[cfg(feature = "rocksdb")]
use ephemeral_server::store::RocksStore;
use ephemeral_server::store::{MemoryStore, PasteStore};
use ephemeral_server::{create_app, AppState, Config, Engine};
use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::net::TcpListener;
use tokio::task;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Ignoring unreadable .env file: {}", e);
        }
    }

    let config = Config::from_env()?;
    let store = open_store(&config)?;
    let state = AppState::new(Engine::new(store, Arc::new(SystemClock)), config.clone());

    let stop_signal = Arc::new(AtomicBool::new(false));
    task::spawn(cleanup(
        Arc::clone(&stop_signal),
        Arc::clone(&state.engine),
        Arc::clone(&state.config),
    ));

    let signals = Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    let signals_handle = signals.handle();
    let shutdown = async move {
        let mut signals = signals;
        if let Some(signal) = signals.next().await {
            info!(signal, "Shutting down");
        }
    };

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(
        addr = %listener.local_addr()?,
        test_mode = config.test_mode,
        "Listening"
    );

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    stop_signal.store(true, Ordering::Release);
    signals_handle.close();
    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<dyn PasteStore>> {
    match &config.db_path {
        #[cfg(feature = "rocksdb")]
        Some(path) => {
            info!(path = %path.display(), "Opening RocksDB store");
            let store = RocksStore::open(path)
                .with_context(|| format!("Failed to open database at {}", path.display()))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "rocksdb"))]
        Some(path) => bail!(
            "DB_PATH is set to {} but this build lacks the `rocksdb` feature",
            path.display()
        ),
        None => {
            warn!("DB_PATH is not set, pastes will only be kept in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
