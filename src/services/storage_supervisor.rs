use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{arena_store::ArenaStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep the shared state connected to storage, in degraded mode whenever it is unreachable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ArenaStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch_health(&state, store.as_ref()).await;
                warn!("exhausted storage reconnect attempts; dropping the connection");
                state.clear_store().await;
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = next_delay(delay);
    }
}

/// Poll health until reconnecting fails [`MAX_RECONNECT_ATTEMPTS`] times in a row.
async fn watch_health(state: &SharedState, store: &dyn ArenaStore) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded() {
                info!("storage healthy again; leaving degraded mode");
                state.update_degraded(false);
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        if !reconnect(state, store).await {
            return;
        }
        state.update_degraded(false);
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(state: &SharedState, store: &dyn ArenaStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "storage reconnect failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = next_delay(reconnect_delay);
            }
        }
    }

    false
}

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::arena_store::memory::MemoryArenaStore, services::test_support::TestArena,
    };

    #[tokio::test]
    async fn installs_store_once_connected() {
        let arena = TestArena::new().await;
        arena.state.clear_store().await;
        assert!(arena.state.is_degraded());

        let mut degraded = arena.state.degraded_watcher();
        let state = arena.state.clone();
        let supervisor = tokio::spawn(run(state, || async {
            Ok::<_, StorageError>(Arc::new(MemoryArenaStore::new()) as Arc<dyn ArenaStore>)
        }));

        tokio::time::timeout(Duration::from_secs(1), degraded.wait_for(|value| !*value))
            .await
            .expect("left degraded mode in time")
            .unwrap();
        assert!(arena.state.require_store().await.is_ok());
        supervisor.abort();
    }
}
