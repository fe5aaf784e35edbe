use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::proxy::ProxyPool;
use crate::registry::{self, EndpointRegistry};
use crate::session::WalletSession;
use crate::{MAX_DAILY_POINTS, POINTS_PER_INTERACTION, api, reporter};

/// Read-only resources and knobs shared by every session task.
pub struct SharedResources {
    pub proxies: ProxyPool,
    pub registry: EndpointRegistry,
    /// Shared static question pool, loaded once at startup.
    pub questions: Vec<String>,
    pub feed_url: String,
    pub usage_url: String,
    pub cooldown_min_secs: f64,
    pub cooldown_max_secs: f64,
    /// Stop every session after this many cycles (smoke testing). `None`
    /// runs until a stop signal.
    pub max_cycles: Option<u64>,
}

/// Questions available to one interaction cycle: the shared static pool plus
/// the per-cycle analysis pool derived from fresh transaction hashes.
///
/// Carrying the analysis pool as a per-cycle value keeps the endpoint
/// registry immutable and sessions free of cross-talk.
pub struct CyclePools<'a> {
    pub shared: &'a [String],
    pub analysis: Vec<String>,
}

impl CyclePools<'_> {
    /// Draw the question to ask, uniformly at random.
    ///
    /// The question always comes from the shared pool, whichever endpoint
    /// was selected; the analysis pool is an input to the cycle but is not
    /// drawn from directly. Returns `None` only if the shared pool is empty.
    pub fn pick_question<R: Rng>(&self, rng: &mut R) -> Option<&str> {
        if self.shared.is_empty() {
            return None;
        }
        Some(self.shared[rng.gen_range(0..self.shared.len())].as_str())
    }
}

/// Drive one wallet's interaction cycles until a stop is requested, the
/// cycle cap is hit, or the task is torn down. Returns the session so the
/// caller can report final statistics.
pub async fn run_session(
    shared: Arc<SharedResources>,
    mut session: WalletSession,
    mut stop: watch::Receiver<bool>,
) -> WalletSession {
    let tag = format!("s{}/{}", session.ordinal, session.short_wallet());
    info!("[{tag}] starting session for {}", session.wallet);
    info!(
        "[{tag}] daily target: {MAX_DAILY_POINTS} points ({} interactions)",
        MAX_DAILY_POINTS / POINTS_PER_INTERACTION
    );
    info!("[{tag}] next reset: {}", session.next_reset.to_rfc3339());
    if shared.proxies.is_empty() {
        info!("[{tag}] using direct connection");
    } else {
        info!("[{tag}] {} proxies available", shared.proxies.len());
    }

    let mut cursor = 0usize;
    let mut iteration: u64 = 0;
    loop {
        if *stop.borrow() {
            info!("[{tag}] stop requested, session finished");
            break;
        }
        iteration += 1;
        run_cycle(&shared, &mut session, &mut cursor, &mut stop, &tag, iteration).await;

        if shared.max_cycles.is_some_and(|cap| iteration >= cap) {
            info!("[{tag}] cycle cap reached, session finished");
            break;
        }

        let secs = {
            let mut rng = rand::thread_rng();
            jitter_secs(&mut rng, shared.cooldown_min_secs, shared.cooldown_max_secs)
        };
        debug!("[{tag}] cooling down for {secs:.1}s");
        tokio::select! {
            res = stop.changed() => {
                if res.is_err() {
                    // Stop channel closed; nothing can ever stop us otherwise.
                    break;
                }
            }
            _ = tokio::time::sleep(Duration::from_secs_f64(secs)) => {}
        }
    }
    session
}

/// One full interaction round: quota gate, transaction scan, question
/// selection, streamed chat, usage report, bookkeeping.
///
/// A network failure at any step logs, rotates this session's proxy cursor
/// and substitutes an empty result; the cycle always runs to completion.
async fn run_cycle(
    shared: &SharedResources,
    session: &mut WalletSession,
    cursor: &mut usize,
    stop: &mut watch::Receiver<bool>,
    tag: &str,
    iteration: u64,
) {
    if session.reset_if_due(Utc::now()) {
        info!("[{tag}] starting a new 24h reward cycle");
    }
    if session.quota_exhausted() {
        let wait = session.time_until_reset(Utc::now());
        info!("[{tag}] daily cap of {MAX_DAILY_POINTS} points reached");
        info!(
            "[{tag}] suspending {}s until the reset at {}",
            wait.as_secs(),
            session.next_reset.to_rfc3339()
        );
        tokio::select! {
            _ = stop.changed() => return,
            _ = tokio::time::sleep(wait) => {}
        }
        if *stop.borrow() {
            return;
        }
        if session.reset_if_due(Utc::now()) {
            info!("[{tag}] starting a new 24h reward cycle");
        }
    }

    info!(
        "[{tag}] interaction {iteration}, progress {}/{MAX_DAILY_POINTS} points",
        session.daily_points + POINTS_PER_INTERACTION
    );

    // Scan the feed for fresh coin transfers; an unreachable feed just means
    // an empty analysis pool this cycle.
    let hashes =
        match api::fetch_recent_transfers(shared.proxies.client_at(*cursor), &shared.feed_url)
            .await
        {
            Ok(hashes) => {
                info!("[{tag}] found {} recent transfer(s)", hashes.len());
                hashes
            }
            Err(e) => {
                warn!("[{tag}] transaction scan failed: {e:#}");
                rotate_proxy(shared, cursor, tag);
                Vec::new()
            }
        };

    let pools = CyclePools {
        shared: &shared.questions,
        analysis: registry::analysis_questions(&hashes),
    };
    if !pools.analysis.is_empty() {
        debug!(
            "[{tag}] analysis pool refreshed with {} question(s)",
            pools.analysis.len()
        );
    }

    let (endpoint, question) = {
        let mut rng = rand::thread_rng();
        let endpoint = shared.registry.pick(&mut rng);
        let Some(question) = pools.pick_question(&mut rng) else {
            warn!("[{tag}] shared question pool is empty, skipping cycle");
            return;
        };
        (endpoint, question.to_string())
    };
    info!("[{tag}] agent: {} ({})", endpoint.name, endpoint.agent_id);
    info!("[{tag}] question: {question}");

    let answer = match api::send_chat_query(
        shared.proxies.client_at(*cursor),
        &endpoint.url,
        &question,
        live_sink,
    )
    .await
    {
        Ok(answer) => answer,
        Err(e) => {
            warn!("[{tag}] chat query failed: {e:#}");
            rotate_proxy(shared, cursor, tag);
            String::new()
        }
    };

    let success = match api::report_usage(
        shared.proxies.client_at(*cursor),
        &shared.usage_url,
        &session.wallet,
        &endpoint.agent_id,
        &question,
        &answer,
    )
    .await
    {
        Ok(true) => {
            session.credit();
            info!("[{tag}] interaction recorded, +{POINTS_PER_INTERACTION} points");
            true
        }
        Ok(false) => {
            warn!("[{tag}] usage report rejected");
            false
        }
        Err(e) => {
            warn!("[{tag}] usage report failed: {e:#}");
            rotate_proxy(shared, cursor, tag);
            false
        }
    };

    session.record_interaction(&endpoint.name, success, Utc::now());
    let snapshot = session.snapshot(Utc::now());
    reporter::log_summary(tag, &snapshot);
    reporter::report_snapshot(&snapshot);
}

fn rotate_proxy(shared: &SharedResources, cursor: &mut usize, tag: &str) {
    if shared.proxies.is_empty() {
        return;
    }
    *cursor = shared.proxies.advance(*cursor);
    if let Some(descriptor) = shared.proxies.descriptor_at(*cursor) {
        info!("[{tag}] switching to proxy {}", descriptor.display());
    }
}

/// Forward one streamed fragment for live display. Fragments go to stderr
/// alongside the logs; stdout is reserved for JSON snapshot lines.
fn live_sink(fragment: &str) {
    let mut err = std::io::stderr();
    let _ = err.write_all(fragment.as_bytes());
    let _ = err.flush();
}

/// Uniform cooldown in `[min, max)`; `min` when the range is empty.
fn jitter_secs<R: Rng>(rng: &mut R, min: f64, max: f64) -> f64 {
    if max > min { rng.gen_range(min..max) } else { min }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn jitter_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let secs = jitter_secs(&mut rng, 1.0, 3.0);
            assert!((1.0..3.0).contains(&secs));
        }
    }

    #[test]
    fn jitter_degenerate_range_returns_min() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(jitter_secs(&mut rng, 2.0, 2.0), 2.0);
    }

    #[test]
    fn question_always_comes_from_shared_pool() {
        let shared = vec!["alpha".to_string(), "beta".to_string()];
        let pools = CyclePools {
            shared: &shared,
            analysis: vec!["Analyze this transaction in detail: 0xdead".to_string()],
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let q = pools.pick_question(&mut rng).unwrap();
            assert!(shared.iter().any(|s| s == q));
        }
    }

    #[test]
    fn empty_shared_pool_yields_no_question() {
        let pools = CyclePools {
            shared: &[],
            analysis: vec!["something".to_string()],
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert!(pools.pick_question(&mut rng).is_none());
    }
}
