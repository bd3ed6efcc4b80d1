//! Scoring job configuration.
//!
//! Resolved from the environment once at process start and passed
//! explicitly into each component — tests construct the struct directly
//! instead of mutating process environment.

/// Configuration for one scoring run.
#[derive(Debug, Clone)]
pub struct RiskJobConfig {
    /// Opaque tag distinguishing scoring-logic revisions.
    pub model_version: String,
    /// Trailing window of incident history to score over, in days.
    pub lookback_days: i64,
    /// Recent sub-window used for the trend ratio, in days.
    pub recent_window_days: i64,
    /// Number of risk tiers to cluster into.
    pub cluster_count: usize,
}

impl Default for RiskJobConfig {
    fn default() -> Self {
        Self {
            model_version: "kmeans_c1_v1".to_string(),
            lookback_days: 90,
            recent_window_days: 30,
            cluster_count: 3,
        }
    }
}

impl RiskJobConfig {
    /// Resolves the configuration from environment variables, falling back
    /// to the defaults for unset or unparseable values.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            model_version: std::env::var("SEGMENT_RISK_MODEL_VERSION")
                .unwrap_or(defaults.model_version),
            lookback_days: env_parse("SEGMENT_RISK_LOOKBACK_DAYS", defaults.lookback_days),
            recent_window_days: env_parse("SEGMENT_RISK_RECENT_DAYS", defaults.recent_window_days),
            cluster_count: env_parse("SEGMENT_RISK_NUM_CLUSTERS", defaults.cluster_count),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let config = RiskJobConfig::default();
        assert_eq!(config.model_version, "kmeans_c1_v1");
        assert_eq!(config.lookback_days, 90);
        assert_eq!(config.recent_window_days, 30);
        assert_eq!(config.cluster_count, 3);
    }
}
