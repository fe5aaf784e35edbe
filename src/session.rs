use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::StatsSnapshot;
use crate::{MAX_DAILY_POINTS, POINTS_PER_INTERACTION};

/// Cumulative per-wallet interaction statistics. Counters only increase.
#[derive(Debug, Clone)]
pub struct WalletStatistics {
    pub interactions_by_agent: HashMap<String, u64>,
    pub total_points: u64,
    pub total_interactions: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_interaction: Option<DateTime<Utc>>,
}

impl WalletStatistics {
    pub fn new(agent_names: &[String]) -> Self {
        Self {
            interactions_by_agent: agent_names.iter().map(|n| (n.clone(), 0)).collect(),
            total_points: 0,
            total_interactions: 0,
            successes: 0,
            failures: 0,
            last_interaction: None,
        }
    }
}

/// Per-identity session state: quota counters, reset timer and statistics.
///
/// Owned exclusively by the session's interaction-cycle task; no other task
/// ever reads or writes it.
#[derive(Debug, Clone)]
pub struct WalletSession {
    pub wallet: String,
    pub ordinal: usize,
    pub daily_points: u32,
    pub started_at: DateTime<Utc>,
    pub next_reset: DateTime<Utc>,
    pub stats: WalletStatistics,
}

impl WalletSession {
    pub fn new(
        wallet: String,
        ordinal: usize,
        agent_names: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            wallet,
            ordinal,
            daily_points: 0,
            started_at: now,
            next_reset: now + chrono::Duration::hours(24),
            stats: WalletStatistics::new(agent_names),
        }
    }

    /// Truncated wallet prefix for log context. Identities are opaque
    /// strings, so truncate on a char boundary, not a byte offset.
    pub fn short_wallet(&self) -> &str {
        self.wallet
            .char_indices()
            .nth(6)
            .map_or(self.wallet.as_str(), |(i, _)| &self.wallet[..i])
    }

    /// Daily cap reached; the session must wait for the next reset.
    pub fn quota_exhausted(&self) -> bool {
        self.daily_points >= MAX_DAILY_POINTS
    }

    /// Zero the daily counter once the reset deadline has passed.
    ///
    /// The next deadline is 24 hours after the reset instant, not after the
    /// stale deadline. Returns true when a reset happened.
    pub fn reset_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.next_reset {
            return false;
        }
        self.daily_points = 0;
        self.next_reset = now + chrono::Duration::hours(24);
        true
    }

    /// Time remaining until the reset deadline; zero if it already passed.
    pub fn time_until_reset(&self, now: DateTime<Utc>) -> Duration {
        (self.next_reset - now).to_std().unwrap_or_default()
    }

    /// Credit an accepted interaction against the daily quota.
    pub fn credit(&mut self) {
        self.daily_points += POINTS_PER_INTERACTION;
    }

    /// Record the outcome of one completed cycle for the chosen agent.
    pub fn record_interaction(&mut self, agent_name: &str, success: bool, now: DateTime<Utc>) {
        *self
            .stats
            .interactions_by_agent
            .entry(agent_name.to_string())
            .or_insert(0) += 1;
        self.stats.total_interactions += 1;
        self.stats.last_interaction = Some(now);
        if success {
            self.stats.successes += 1;
            self.stats.total_points += u64::from(POINTS_PER_INTERACTION);
        } else {
            self.stats.failures += 1;
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> StatsSnapshot {
        StatsSnapshot {
            timestamp: now.to_rfc3339(),
            session: self.ordinal,
            wallet: self.wallet.clone(),
            daily_points: self.daily_points,
            total_points: self.stats.total_points,
            total_interactions: self.stats.total_interactions,
            successes: self.stats.successes,
            failures: self.stats.failures,
            last_interaction: self.stats.last_interaction.map(|t| t.to_rfc3339()),
            interactions_by_agent: self
                .stats
                .interactions_by_agent
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }
}
