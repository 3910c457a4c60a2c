//! Tracking configuration.

use std::env;

use tracing::warn;

/// Configuration for the tracking layer.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// How many days ahead a vehicle document expiry raises an alert
    /// (default: 7).
    pub alert_days_before: i64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            alert_days_before: 7,
        }
    }
}

impl TrackingConfig {
    /// Read `FROTA_ALERT_DAYS_BEFORE`, keeping the default when it is unset
    /// or not a non-negative integer.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var("FROTA_ALERT_DAYS_BEFORE") {
            match raw.trim().parse::<i64>() {
                Ok(days) if days >= 0 => config.alert_days_before = days,
                _ => warn!(value = %raw, "Ignoring invalid FROTA_ALERT_DAYS_BEFORE"),
            }
        }
        config
    }
}
