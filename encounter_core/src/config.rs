//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

/// Tunables of the traversal evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tolerance of float equality in filters.
    pub float_epsilon: f64,

    /// Seed for random edge selection. `None` seeds from entropy.
    pub rng_seed: Option<u64>,

    /// Maximum transitions taken by a single `run_until_wait` call.
    pub max_auto_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            float_epsilon: 1e-6,
            rng_seed: None,
            max_auto_steps: 10_000,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Use a fixed seed so random selection is reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.float_epsilon, 1e-6);
        assert!(config.rng_seed.is_none());
        assert_eq!(config.max_auto_steps, 10_000);
    }

    #[test]
    fn test_from_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            float_epsilon = 0.001
            rng_seed = 42
            "#,
        )
        .unwrap();

        assert_eq!(config.float_epsilon, 0.001);
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.max_auto_steps, 10_000);
    }

    #[test]
    fn test_invalid_toml() {
        let err = EngineConfig::from_toml_str("float_epsilon = \"tiny\"").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
