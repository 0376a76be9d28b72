//! Configuration loading for offtrace learners

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::OffTraceError;

/// Which trace-discount algorithm a learner plugs into the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceAlgorithm {
    /// Plain importance-sampling ratio
    ImportanceSampling,
    /// Retrace(λ): ratio truncated at one
    Retrace { lambda: f64 },
    /// Tree-backup(λ): target probability only
    TreeBackup { lambda: f64 },
    /// Q(λ) without any off-policy correction
    QLambda { lambda: f64 },
}

impl TraceAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            TraceAlgorithm::ImportanceSampling => "importance_sampling",
            TraceAlgorithm::Retrace { .. } => "retrace",
            TraceAlgorithm::TreeBackup { .. } => "tree_backup",
            TraceAlgorithm::QLambda { .. } => "q_lambda",
        }
    }

    pub fn lambda(&self) -> Option<f64> {
        match *self {
            TraceAlgorithm::ImportanceSampling => None,
            TraceAlgorithm::Retrace { lambda }
            | TraceAlgorithm::TreeBackup { lambda }
            | TraceAlgorithm::QLambda { lambda } => Some(lambda),
        }
    }
}

impl Default for TraceAlgorithm {
    fn default() -> Self {
        TraceAlgorithm::Retrace { lambda: 1.0 }
    }
}

/// Learner parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub discount: f64,
    pub learning_rate: f64,
    /// Trace cutoff
    pub epsilon: f64,
    /// Greedy fraction of the implicit control target
    pub exploration: f64,
    pub algorithm: TraceAlgorithm,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            discount: 1.0,
            learning_rate: 0.1,
            epsilon: 0.001,
            exploration: 0.9,
            algorithm: TraceAlgorithm::default(),
        }
    }
}

impl LearnerConfig {
    /// Check the ranges the learners enforce
    pub fn validate(&self) -> crate::Result<()> {
        validate_learning_rate(self.learning_rate)?;
        validate_exploration(self.exploration)?;
        if let Some(lambda) = self.algorithm.lambda() {
            validate_lambda(lambda)?;
        }
        Ok(())
    }

    /// Parse a JSON document, e.g. parameters stored next to a saved table
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let config_path = Self::find_config_file();

        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        // Add config file if it exists
        if let Some(path) = &config_path {
            tracing::info!("Loading config from: {:?}", path);
            builder = builder.add_source(File::from(path.clone()).required(false));
        } else {
            tracing::info!("No config file found, using defaults");
        }

        // OFFTRACE_LEARNING_RATE, OFFTRACE_ALGORITHM__LAMBDA, ...
        builder = builder.add_source(
            Environment::with_prefix("OFFTRACE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::finish(builder)
    }

    /// Load configuration from one explicit file, no environment overlay
    pub fn load_from(path: &Path) -> Result<Self> {
        let builder = ConfigBuilder::<config::builder::DefaultState>::default()
            .add_source(File::from(path.to_path_buf()).required(true));

        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config: Self = builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Find the configuration file
    fn find_config_file() -> Option<PathBuf> {
        // Check in order: OFFTRACE_CONFIG env, ./offtrace.toml, ~/.config/offtrace/offtrace.toml
        if let Ok(path) = std::env::var("OFFTRACE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("offtrace.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("offtrace").join("offtrace.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }
}

/// Learning rate must lie in (0, 1]
pub fn validate_learning_rate(a: f64) -> crate::Result<()> {
    if a <= 0.0 || a > 1.0 || a.is_nan() {
        return Err(OffTraceError::InvalidArgument(format!(
            "Learning rate must be > 0 and <= 1, got {a}"
        )));
    }
    Ok(())
}

/// Exploration must lie in [0, 1]
pub fn validate_exploration(e: f64) -> crate::Result<()> {
    if !(0.0..=1.0).contains(&e) {
        return Err(OffTraceError::InvalidArgument(format!(
            "Exploration must be >= 0 and <= 1, got {e}"
        )));
    }
    Ok(())
}

/// Trace lambda must lie in [0, 1]
pub fn validate_lambda(lambda: f64) -> crate::Result<()> {
    if !(0.0..=1.0).contains(&lambda) {
        return Err(OffTraceError::InvalidArgument(format!(
            "Lambda must be >= 0 and <= 1, got {lambda}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LearnerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.discount, 1.0);
        assert_eq!(config.learning_rate, 0.1);
        assert_eq!(config.epsilon, 0.001);
        assert_eq!(config.exploration, 0.9);
    }

    #[test]
    fn test_learning_rate_bounds() {
        assert!(validate_learning_rate(1.0).is_ok());
        assert!(validate_learning_rate(1e-9).is_ok());
        assert!(validate_learning_rate(0.0).is_err());
        assert!(validate_learning_rate(-0.5).is_err());
        assert!(validate_learning_rate(1.0001).is_err());
        assert!(validate_learning_rate(f64::NAN).is_err());
    }

    #[test]
    fn test_exploration_bounds() {
        assert!(validate_exploration(0.0).is_ok());
        assert!(validate_exploration(1.0).is_ok());
        assert!(validate_exploration(-0.01).is_err());
        assert!(validate_exploration(1.01).is_err());
        assert!(validate_exploration(f64::NAN).is_err());
    }

    #[test]
    fn test_invalid_lambda_rejected() {
        let config = LearnerConfig {
            algorithm: TraceAlgorithm::TreeBackup { lambda: 1.5 },
            ..LearnerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(TraceAlgorithm::ImportanceSampling.name(), "importance_sampling");
        assert_eq!(TraceAlgorithm::Retrace { lambda: 0.5 }.name(), "retrace");
        assert_eq!(TraceAlgorithm::TreeBackup { lambda: 0.5 }.name(), "tree_backup");
        assert_eq!(TraceAlgorithm::QLambda { lambda: 0.5 }.name(), "q_lambda");
        assert_eq!(TraceAlgorithm::ImportanceSampling.lambda(), None);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{"exploration": 1.0, "algorithm": {"kind": "q_lambda", "lambda": 0.3}}"#;
        let config = LearnerConfig::from_json(json).unwrap();
        assert_eq!(config.exploration, 1.0);
        assert_eq!(config.algorithm, TraceAlgorithm::QLambda { lambda: 0.3 });
        assert_eq!(config.learning_rate, 0.1);

        assert!(matches!(
            LearnerConfig::from_json("{\"discount\": "),
            Err(OffTraceError::Serialization(_))
        ));
        assert!(matches!(
            LearnerConfig::from_json(r#"{"learning_rate": 2.0}"#),
            Err(OffTraceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_algorithm_json_shape() {
        let json = serde_json::to_value(TraceAlgorithm::Retrace { lambda: 0.8 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "retrace", "lambda": 0.8}));
    }
}
