//! Batch configuration.

use serde::{Deserialize, Serialize};

use super::types::normalize_duration;

/// Configuration for batch runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Clip duration at startup, in seconds (1-10).
    #[serde(default = "default_duration")]
    pub default_duration_secs: f64,

    /// Delay between individual downloads of a bulk download (milliseconds).
    /// Clients stagger downloads so browsers do not drop them.
    #[serde(default = "default_bulk_download_interval")]
    pub bulk_download_interval_ms: u64,
}

fn default_duration() -> f64 {
    5.0
}

fn default_bulk_download_interval() -> u64 {
    500
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: default_duration(),
            bulk_download_interval_ms: default_bulk_download_interval(),
        }
    }
}

impl BatchConfig {
    /// Duration a new session starts with, on the 0.1 s grid.
    ///
    /// Out-of-range values are caught by config validation; if one slips
    /// through, the built-in default is used.
    pub fn initial_duration_secs(&self) -> f64 {
        normalize_duration(self.default_duration_secs).unwrap_or_else(|_| default_duration())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BatchConfig::default();
        assert!((config.default_duration_secs - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.bulk_download_interval_ms, 500);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: BatchConfig = toml::from_str("default_duration_secs = 3.5").unwrap();
        assert!((config.default_duration_secs - 3.5).abs() < f64::EPSILON);
        assert_eq!(config.bulk_download_interval_ms, 500);
    }

    #[test]
    fn test_initial_duration_is_rounded_to_a_tenth() {
        let config = BatchConfig {
            default_duration_secs: 3.24,
            ..BatchConfig::default()
        };
        assert!((config.initial_duration_secs() - 3.2).abs() < 1e-9);

        let config = BatchConfig {
            default_duration_secs: 6.98,
            ..BatchConfig::default()
        };
        assert!((config.initial_duration_secs() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_initial_duration_out_of_range_falls_back() {
        let config = BatchConfig {
            default_duration_secs: 42.0,
            ..BatchConfig::default()
        };
        assert!((config.initial_duration_secs() - 5.0).abs() < f64::EPSILON);
    }
}
