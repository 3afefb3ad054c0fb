//! Scheduler and simulation tuning knobs.

use thiserror::Error;

/// Default target interval between successful advances of one vehicle.
pub const DEFAULT_UPDATE_PERIOD_MS: u64 = 250;
/// Default scheduler tick interval.
pub const DEFAULT_POLLING_PERIOD_MS: u64 = 100;
/// Default initial size of the rolling jitter window.
pub const DEFAULT_JITTER_STAT_CAPACITY: usize = 200;
/// Default inactivity cutoff before an arrived vehicle is retired.
pub const DEFAULT_VEHICLE_TIMEOUT_SECONDS: u64 = 30;
/// Default bound on concurrent directions loads per instance.
pub const DEFAULT_DIRECTIONS_LOAD_CONCURRENCY: usize = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("polling period {polling_ms} ms must not exceed update period {update_ms} ms")]
    PollingExceedsUpdatePeriod { polling_ms: u64, update_ms: u64 },
    #[error("{name} must be positive")]
    NonPositive { name: &'static str },
}

/// Tuning for one server instance's scheduler and caches.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Target interval between successful advances of the same vehicle.
    pub update_period_ms: u64,
    /// Scheduler tick interval; must be ≤ `update_period_ms`.
    pub polling_period_ms: u64,
    /// Slack added to the queue scan bound so a vehicle becomes eligible
    /// roughly one update period after its last stamp.
    pub eligibility_slack_ms: u64,
    pub jitter_stat_capacity: usize,
    pub vehicle_timeout_seconds: u64,
    /// Max in-flight async directions loads.
    pub directions_load_concurrency: usize,
    /// Refresh interval of the local active-set snapshot.
    pub snapshot_refresh_ms: u64,
    /// Interval of the derived-cache reconciliation pass.
    pub cache_reconcile_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            update_period_ms: DEFAULT_UPDATE_PERIOD_MS,
            polling_period_ms: DEFAULT_POLLING_PERIOD_MS,
            eligibility_slack_ms: DEFAULT_POLLING_PERIOD_MS,
            jitter_stat_capacity: DEFAULT_JITTER_STAT_CAPACITY,
            vehicle_timeout_seconds: DEFAULT_VEHICLE_TIMEOUT_SECONDS,
            directions_load_concurrency: DEFAULT_DIRECTIONS_LOAD_CONCURRENCY,
            snapshot_refresh_ms: 1000,
            cache_reconcile_secs: 60,
        }
    }
}

impl SimulationConfig {
    pub fn with_update_period_ms(mut self, ms: u64) -> Self {
        self.update_period_ms = ms;
        self
    }

    /// Set the tick interval and keep the eligibility slack in step with it.
    pub fn with_polling_period_ms(mut self, ms: u64) -> Self {
        self.polling_period_ms = ms;
        self.eligibility_slack_ms = ms;
        self
    }

    pub fn with_vehicle_timeout_seconds(mut self, seconds: u64) -> Self {
        self.vehicle_timeout_seconds = seconds;
        self
    }

    pub fn with_jitter_stat_capacity(mut self, capacity: usize) -> Self {
        self.jitter_stat_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling_period_ms == 0 {
            return Err(ConfigError::NonPositive {
                name: "polling period",
            });
        }
        if self.update_period_ms == 0 {
            return Err(ConfigError::NonPositive {
                name: "update period",
            });
        }
        if self.polling_period_ms > self.update_period_ms {
            return Err(ConfigError::PollingExceedsUpdatePeriod {
                polling_ms: self.polling_period_ms,
                update_ms: self.update_period_ms,
            });
        }
        Ok(())
    }
}

/// Identifier stamped into `managerHost` of every vehicle this instance
/// writes. Resolved once at startup; `"UNKNOWN"` when no hostname is
/// available.
pub fn resolve_host_id(explicit: Option<String>) -> String {
    if let Some(host) = explicit.filter(|h| !h.trim().is_empty()) {
        return host;
    }
    if let Ok(host) = std::env::var("HOSTNAME") {
        if !host.trim().is_empty() {
            return host.trim().to_string();
        }
    }
    if let Ok(host) = std::fs::read_to_string("/etc/hostname") {
        if !host.trim().is_empty() {
            return host.trim().to_string();
        }
    }
    "UNKNOWN".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SimulationConfig::default();
        assert_eq!(config.update_period_ms, 250);
        assert_eq!(config.polling_period_ms, 100);
        assert_eq!(config.eligibility_slack_ms, 100);
        assert_eq!(config.jitter_stat_capacity, 200);
        assert_eq!(config.vehicle_timeout_seconds, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn polling_longer_than_update_period_is_rejected() {
        let config = SimulationConfig::default()
            .with_update_period_ms(100)
            .with_polling_period_ms(250);
        assert_eq!(
            config.validate(),
            Err(ConfigError::PollingExceedsUpdatePeriod {
                polling_ms: 250,
                update_ms: 100,
            })
        );
    }

    #[test]
    fn explicit_host_id_wins() {
        assert_eq!(resolve_host_id(Some("sim-7".into())), "sim-7");
        // Blank override falls back to lookup; lookup itself can vary by
        // machine, so only check it is non-empty.
        assert!(!resolve_host_id(Some("  ".into())).is_empty());
    }
}
