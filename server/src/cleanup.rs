use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::Engine;

/// Periodic clean-up task that deletes pastes that can no longer be read.
///
/// Does nothing in test mode. Requests there may evaluate pastes at any
/// instant, so a paste dead by the wall clock can still be readable.
pub async fn cleanup(stop_signal: Arc<AtomicBool>, engine: Arc<Engine>, config: Arc<Config>) {
    if config.test_mode {
        info!("Test mode enabled, not sweeping unavailable pastes");
        return;
    }

    while !stop_signal.load(Ordering::Acquire) {
        tokio::time::sleep(config.cleanup_interval).await;
        if stop_signal.load(Ordering::Acquire) {
            break;
        }

        let engine = Arc::clone(&engine);
        let join_handle =
            task::spawn_blocking(move || engine.store().purge_unavailable(engine.now())).await;

        match join_handle {
            Ok(Ok(0)) => debug!("Nothing to clean up"),
            Ok(Ok(removed)) => info!(removed, "Cleaned up unavailable pastes"),
            Ok(Err(e)) => warn!("Failed to cleanup db: {}", e),
            Err(e) => error!("Failed to join handle?! {}", e),
        }
    }
}
