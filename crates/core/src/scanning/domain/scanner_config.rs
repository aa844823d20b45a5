use std::time::Duration;

use crate::scanning::domain::scan_policy::CooldownPolicy;
use crate::shared::constants::{DEFAULT_COOLDOWN, DEFAULT_SCAN_INTERVAL};

/// Timing parameters for the scan loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Minimum gap before the same code is reported again.
    pub cooldown: Duration,
    /// Pause after each decode attempt before the next one starts.
    pub scan_interval: Duration,
}

impl ScannerConfig {
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_scan_interval(mut self, scan_interval: Duration) -> Self {
        self.scan_interval = scan_interval;
        self
    }

    pub fn policy(&self) -> CooldownPolicy {
        CooldownPolicy::new(self.cooldown)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }
}
