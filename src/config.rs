use std::time::Duration;

/// Tunables for the scan scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Time between periodic scan passes.
    pub interval: Duration,
    /// A pass is skipped if the previous one started less than this long ago.
    pub min_pass_spacing: Duration,
    /// Passes a failed transaction is retried for before it is given up on.
    pub max_retries: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            min_pass_spacing: Duration::from_secs(1),
            max_retries: 5,
        }
    }
}

impl ScanConfig {
    /// A config that never rate-limits passes, handy when driving passes by hand.
    pub fn unthrottled() -> Self {
        Self {
            min_pass_spacing: Duration::ZERO,
            ..Self::default()
        }
    }
}
