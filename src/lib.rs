pub mod api;
pub mod config;
pub mod engine;
pub mod proxy;
pub mod registry;
pub mod reporter;
pub mod resources;
pub mod scheduler;
pub mod session;
pub mod stream;
pub mod types;

/// Kite testnet transaction feed (advanced-filters endpoint, public, no auth).
pub const TX_FEED_URL: &str = "https://testnet.kitescan.ai/api/v2/advanced-filters";

/// Usage-tracking service that credits testnet points for recorded interactions.
pub const USAGE_REPORT_URL: &str =
    "https://quests-usage-dev.prod.zettablock.com/api/report_usage";

/// Daily per-wallet point cap enforced by the quota state machine.
pub const MAX_DAILY_POINTS: u32 = 200;

/// Points credited for each interaction the usage service accepts.
pub const POINTS_PER_INTERACTION: u32 = 10;
