use tracing::info;

use crate::types::StatsSnapshot;

/// Emit a statistics snapshot as a single JSON line to stdout.
pub fn report_snapshot(snapshot: &StatsSnapshot) {
    if let Ok(json) = serde_json::to_string(snapshot) {
        println!("{json}");
    }
}

/// Log a human-readable summary of the snapshot alongside the JSON line.
pub fn log_summary(tag: &str, snapshot: &StatsSnapshot) {
    info!(
        "[{tag}] points={} interactions={} ok={} failed={} last={}",
        snapshot.total_points,
        snapshot.total_interactions,
        snapshot.successes,
        snapshot.failures,
        snapshot.last_interaction.as_deref().unwrap_or("never"),
    );
}
