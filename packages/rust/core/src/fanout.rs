//! Concurrent directory listing joined on a [`PendingCount`].

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use extloader_transport::{ResourceFetcher, list_or_empty};

use crate::barrier::PendingCount;

/// List every directory concurrently and wait for all of them.
///
/// Failed listings come back empty; they still count toward the fan-in.
/// The result is in `dirs` order no matter which response arrived first.
pub async fn list_all(fetcher: &Arc<dyn ResourceFetcher>, dirs: &[String]) -> Vec<Vec<String>> {
    let pending = PendingCount::new(dirs.len());
    let results: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(vec![Vec::new(); dirs.len()]));

    for (index, dir) in dirs.iter().enumerate() {
        let slot = pending.slot();
        let fetcher = Arc::clone(fetcher);
        let results = Arc::clone(&results);
        let dir = dir.clone();

        tokio::spawn(async move {
            let names = list_or_empty(fetcher.as_ref(), &dir).await;
            debug!(%dir, entries = names.len(), "directory listed");
            results.lock().await[index] = names;
            slot.release();
        });
    }

    pending.wait().await;
    std::mem::take(&mut *results.lock().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedFetcher;

    #[tokio::test]
    async fn test_results_in_request_order() {
        let scripted = Arc::new(
            ScriptedFetcher::default()
                .listing("slow", &["a"])
                .delay("slow", 30)
                .listing("fast", &["b", "c"])
                .fail("broken"),
        );
        let fetcher: Arc<dyn ResourceFetcher> = scripted.clone();
        let dirs: Vec<String> = ["slow", "broken", "fast"].map(String::from).to_vec();

        let listings = list_all(&fetcher, &dirs).await;

        assert_eq!(listings, vec![vec!["a"], vec![], vec!["b", "c"]]);
        assert_eq!(scripted.count("list:"), 3);
    }

    #[tokio::test]
    async fn test_no_directories_no_requests() {
        let scripted = Arc::new(ScriptedFetcher::default());
        let fetcher: Arc<dyn ResourceFetcher> = scripted.clone();

        assert!(list_all(&fetcher, &[]).await.is_empty());
        assert!(scripted.requests().is_empty());
    }
}
