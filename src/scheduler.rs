use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::error;

use crate::engine::{SharedResources, run_session};
use crate::session::WalletSession;

/// Run every wallet session concurrently and wait for all of them to finish.
///
/// Each session gets its own task and its own proxy cursor; the shared
/// resources are read-only behind the `Arc`. Stop is cooperative: tasks
/// observe the watch flag at iteration boundaries and let in-flight network
/// calls complete naturally. A session that panics is logged and does not
/// affect the others.
///
/// Returns the finished sessions (in completion order) so the caller can
/// report final statistics.
pub async fn run_sessions(
    shared: Arc<SharedResources>,
    sessions: Vec<WalletSession>,
    stop: watch::Receiver<bool>,
) -> Vec<WalletSession> {
    let mut tasks = JoinSet::new();
    for session in sessions {
        let shared = shared.clone();
        let stop = stop.clone();
        tasks.spawn(run_session(shared, session, stop));
    }

    let mut finished = Vec::new();
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(session) => finished.push(session),
            Err(e) => error!("session task failed: {e}"),
        }
    }
    finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyPool;
    use crate::registry::EndpointRegistry;
    use chrono::Utc;
    use std::time::Duration;

    fn shared() -> Arc<SharedResources> {
        Arc::new(SharedResources {
            proxies: ProxyPool::new(Vec::new(), Duration::from_secs(5)).unwrap(),
            registry: EndpointRegistry::kite_defaults(),
            questions: vec!["What is Kite AI?".to_string()],
            feed_url: "http://127.0.0.1:9/feed".to_string(),
            usage_url: "http://127.0.0.1:9/usage".to_string(),
            cooldown_min_secs: 0.01,
            cooldown_max_secs: 0.02,
            max_cycles: None,
        })
    }

    #[tokio::test]
    async fn stopped_scheduler_returns_sessions_untouched() {
        let shared = shared();
        let names = shared.registry.agent_names();
        let now = Utc::now();
        let sessions = vec![
            WalletSession::new("0xaaa".to_string(), 1, &names, now),
            WalletSession::new("0xbbb".to_string(), 2, &names, now),
        ];

        let (stop_tx, stop_rx) = watch::channel(true);
        let finished = run_sessions(shared, sessions, stop_rx).await;
        drop(stop_tx);

        assert_eq!(finished.len(), 2);
        for session in finished {
            assert_eq!(session.daily_points, 0);
            assert_eq!(session.stats.total_interactions, 0);
        }
    }
}
