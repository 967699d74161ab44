//! Engine configuration.

use crate::error::{ConfigError, TripwrightError, TripwrightResult};
use serde::{Deserialize, Serialize};

// ============================================================================
// RANKING WEIGHTS
// ============================================================================

/// Weights handed to the bundle ranker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub price: f64,
    pub duration: f64,
    pub refundable: f64,
    pub convenience: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            price: 0.5,
            duration: 0.2,
            refundable: 0.2,
            convenience: 0.1,
        }
    }
}

impl RankingWeights {
    fn fields(&self) -> [(&'static str, f64); 4] {
        [
            ("ranking_weights.price", self.price),
            ("ranking_weights.duration", self.duration),
            ("ranking_weights.refundable", self.refundable),
            ("ranking_weights.convenience", self.convenience),
        ]
    }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

/// Knobs shared by the engines and the dispatch loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix for dispatched operation names (`ns/flight_quote_search`);
    /// empty means bare names
    pub operation_namespace: String,
    /// Runaway guard: operations dispatched in one turn
    pub max_dispatches_per_turn: usize,
    /// Runaway guard: dispatches of one operation name in one turn
    pub max_repeats_per_operation: usize,
    /// `result_limit` sent to quoting operations
    pub result_limit: u32,
    pub max_guests_per_room: u32,
    /// Bundles rendered to the user
    pub bundles_presented: usize,
    pub ranking_weights: RankingWeights,
    pub default_cabin: String,
    pub default_max_stops: u32,
    pub default_hotel_star_min: u32,
    pub default_timezone: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_namespace: String::new(),
            max_dispatches_per_turn: 24,
            max_repeats_per_operation: 8,
            result_limit: 10,
            max_guests_per_room: 4,
            bundles_presented: 3,
            ranking_weights: RankingWeights::default(),
            default_cabin: "economy".to_string(),
            default_max_stops: 1,
            default_hotel_star_min: 3,
            default_timezone: "America/New_York".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `TRIPWRIGHT_OPERATION_NAMESPACE`: Operation name prefix (default: none)
    /// - `TRIPWRIGHT_MAX_DISPATCHES_PER_TURN`: Dispatch guard (default: 24)
    /// - `TRIPWRIGHT_MAX_REPEATS_PER_OPERATION`: Repeat guard (default: 8)
    /// - `TRIPWRIGHT_RESULT_LIMIT`: Quote result limit (default: 10)
    /// - `TRIPWRIGHT_MAX_GUESTS_PER_ROOM`: Room occupancy cap (default: 4)
    /// - `TRIPWRIGHT_BUNDLES_PRESENTED`: Bundles rendered (default: 3)
    /// - `TRIPWRIGHT_DEFAULT_CABIN`: Flight cabin (default: economy)
    /// - `TRIPWRIGHT_DEFAULT_MAX_STOPS`: Flight stops (default: 1)
    /// - `TRIPWRIGHT_DEFAULT_HOTEL_STAR_MIN`: Hotel stars (default: 3)
    /// - `TRIPWRIGHT_DEFAULT_TIMEZONE`: Timezone (default: America/New_York)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            operation_namespace: std::env::var("TRIPWRIGHT_OPERATION_NAMESPACE")
                .unwrap_or(defaults.operation_namespace),
            max_dispatches_per_turn: std::env::var("TRIPWRIGHT_MAX_DISPATCHES_PER_TURN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_dispatches_per_turn),
            max_repeats_per_operation: std::env::var("TRIPWRIGHT_MAX_REPEATS_PER_OPERATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_repeats_per_operation),
            result_limit: std::env::var("TRIPWRIGHT_RESULT_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.result_limit),
            max_guests_per_room: std::env::var("TRIPWRIGHT_MAX_GUESTS_PER_ROOM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_guests_per_room),
            bundles_presented: std::env::var("TRIPWRIGHT_BUNDLES_PRESENTED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bundles_presented),
            ranking_weights: defaults.ranking_weights,
            default_cabin: std::env::var("TRIPWRIGHT_DEFAULT_CABIN")
                .unwrap_or(defaults.default_cabin),
            default_max_stops: std::env::var("TRIPWRIGHT_DEFAULT_MAX_STOPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_max_stops),
            default_hotel_star_min: std::env::var("TRIPWRIGHT_DEFAULT_HOTEL_STAR_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_hotel_star_min),
            default_timezone: std::env::var("TRIPWRIGHT_DEFAULT_TIMEZONE")
                .unwrap_or(defaults.default_timezone),
        }
    }

    /// Parse a TOML document; absent keys take their defaults.
    pub fn from_toml_str(source: &str) -> TripwrightResult<Self> {
        let config: EngineConfig = toml::from_str(source).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - both runaway guards > 0
    /// - result_limit, max_guests_per_room, bundles_presented > 0
    /// - ranking weights finite, non-negative, not all zero
    pub fn validate(&self) -> TripwrightResult<()> {
        let positive: [(&str, usize); 5] = [
            ("max_dispatches_per_turn", self.max_dispatches_per_turn),
            ("max_repeats_per_operation", self.max_repeats_per_operation),
            ("result_limit", self.result_limit as usize),
            ("max_guests_per_room", self.max_guests_per_room as usize),
            ("bundles_presented", self.bundles_presented),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(TripwrightError::Config(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: format!("{} must be greater than 0", field),
                }));
            }
        }

        for (field, weight) in self.ranking_weights.fields() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(TripwrightError::Config(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: weight.to_string(),
                    reason: "ranking weights must be finite and non-negative".to_string(),
                }));
            }
        }
        let total: f64 = self.ranking_weights.fields().iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(TripwrightError::Config(ConfigError::InvalidValue {
                field: "ranking_weights".to_string(),
                value: total.to_string(),
                reason: "at least one ranking weight must be positive".to_string(),
            }));
        }

        if self.default_cabin.trim().is_empty() {
            return Err(TripwrightError::Config(ConfigError::MissingRequired {
                field: "default_cabin".to_string(),
            }));
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_dispatches_per_turn, 24);
        assert_eq!(config.max_repeats_per_operation, 8);
        assert_eq!(config.ranking_weights.price, 0.5);
    }

    #[test]
    fn test_zero_guard_rejected() {
        let config = EngineConfig {
            max_repeats_per_operation: 0,
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_repeats_per_operation"));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = EngineConfig::default();
        config.ranking_weights.duration = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_all_zero_weights_rejected() {
        let mut config = EngineConfig::default();
        config.ranking_weights = RankingWeights {
            price: 0.0,
            duration: 0.0,
            refundable: 0.0,
            convenience: 0.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_partial_overrides() {
        let source = r#"
operation_namespace = "noma"
max_dispatches_per_turn = 12

[ranking_weights]
price = 0.7
"#;
        let config = EngineConfig::from_toml_str(source).unwrap();
        assert_eq!(config.operation_namespace, "noma");
        assert_eq!(config.max_dispatches_per_turn, 12);
        assert_eq!(config.max_repeats_per_operation, 8);
        assert_eq!(config.ranking_weights.price, 0.7);
        assert_eq!(config.ranking_weights.duration, 0.2);
    }

    #[test]
    fn test_from_toml_parse_failure() {
        let err = EngineConfig::from_toml_str("max_dispatches_per_turn = \"many\"").unwrap_err();
        assert!(matches!(err, TripwrightError::Config(ConfigError::ParseFailed { .. })));
    }

    #[test]
    fn test_from_toml_rejects_invalid_values() {
        let err = EngineConfig::from_toml_str("result_limit = 0").unwrap_err();
        assert!(matches!(err, TripwrightError::Config(ConfigError::InvalidValue { .. })));
    }

    // All environment overrides live in one test; the process environment is shared.
    #[test]
    fn test_from_env_overrides_and_fallbacks() {
        let _namespace = EnvVarGuard::set("TRIPWRIGHT_OPERATION_NAMESPACE", Some("travel"));
        let _dispatches = EnvVarGuard::set("TRIPWRIGHT_MAX_DISPATCHES_PER_TURN", Some("6"));
        let _repeats = EnvVarGuard::set("TRIPWRIGHT_MAX_REPEATS_PER_OPERATION", Some("lots"));
        let _cabin = EnvVarGuard::set("TRIPWRIGHT_DEFAULT_CABIN", None);
        let _timezone = EnvVarGuard::set("TRIPWRIGHT_DEFAULT_TIMEZONE", Some("Europe/Lisbon"));

        let config = EngineConfig::from_env();
        assert_eq!(config.operation_namespace, "travel");
        assert_eq!(config.max_dispatches_per_turn, 6);
        // unparseable values fall back to the default
        assert_eq!(config.max_repeats_per_operation, 8);
        assert_eq!(config.default_cabin, "economy");
        assert_eq!(config.default_timezone, "Europe/Lisbon");
        assert_eq!(config.ranking_weights, RankingWeights::default());
        assert!(config.validate().is_ok());
    }
}
