//! Background job: drop revocation records whose token has expired.
//!
//! An expired token is rejected by the codec before the revocation store is
//! consulted, so its record is dead weight. Pruning keeps the store bounded
//! by the refresh-token lifetime window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::auth::RevocationStore;

/// Spawn the sweep task. Call this once at startup.
pub fn spawn(store: Arc<dyn RevocationStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        loop {
            interval.tick().await;
            sweep(store.as_ref()).await;
        }
    })
}

/// One pass. Returns the number of records removed (0 on failure).
pub async fn sweep(store: &dyn RevocationStore) -> usize {
    match store.prune_expired(Utc::now()).await {
        Ok(0) => 0,
        Ok(removed) => {
            tracing::info!(removed = removed, "pruned expired revocation records");
            removed
        }
        Err(e) => {
            tracing::error!("revocation sweep failed: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryRevocationStore, RevocationRecord};
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = MemoryRevocationStore::new();
        store
            .add(RevocationRecord::new("gone", Utc::now() - ChronoDuration::seconds(1)))
            .await
            .unwrap();
        store
            .add(RevocationRecord::new("kept", Utc::now() + ChronoDuration::hours(1)))
            .await
            .unwrap();

        assert_eq!(sweep(&store).await, 1);
        assert_eq!(sweep(&store).await, 0);
        assert!(store.contains("kept").await.unwrap());
    }

    #[tokio::test]
    async fn test_spawned_task_sweeps_on_interval() {
        let store = Arc::new(MemoryRevocationStore::new());
        store
            .add(RevocationRecord::new("gone", Utc::now() - ChronoDuration::seconds(1)))
            .await
            .unwrap();

        // first tick fires immediately
        let handle = spawn(store.clone(), Duration::from_secs(60));
        time::sleep(Duration::from_millis(50)).await;
        assert!(store.is_empty());
        handle.abort();
    }
}
