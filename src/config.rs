//! Configuration types.

use std::time::Duration;

/// Security policy for the ledger writer.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Converted amounts above this are logged at warn level but still applied.
    pub max_single_amount: i64,
    /// Maximum transactions per user inside `window` before writes are rejected.
    pub rate_cap: u32,
    /// Trailing window for the rate cap.
    pub window: Duration,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_single_amount: 1_000,
            rate_cap: 60,
            window: Duration::from_secs(3600), // 1 hour
        }
    }
}
