//! TOML configuration for grounding, inference and output.
//!
//! ```toml
//! [grounding]
//! chunk_size = 1024
//!
//! [mcsat]
//! samples = 5000
//! seed = 42
//!
//! [output]
//! precision = 4
//! ```
//!
//! Every section and every field is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ground::GroundingConfig;
use crate::infer::{MaxWalkSatConfig, McSatConfig};
use crate::output::OutputConfig;

/// Full engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlnConfig {
    pub grounding: GroundingConfig,
    pub mcsat: McSatConfig,
    pub maxwalksat: MaxWalkSatConfig,
    pub output: OutputConfig,
}

impl MlnConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let config = Self::parse(&text, &shown)?;
        tracing::debug!(path = %shown, "loaded configuration");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, "<inline>")
    }

    fn parse(text: &str, path: &str) -> Result<Self, ConfigError> {
        let config: MlnConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section's parameter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grounding.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                message: "grounding.chunk_size must be at least 1".into(),
            });
        }
        if self.grounding.threads == Some(0) {
            return Err(ConfigError::Invalid {
                message: "grounding.threads must be at least 1 when set".into(),
            });
        }
        self.mcsat.validate().map_err(|e| ConfigError::Invalid {
            message: format!("[mcsat] {e}"),
        })?;
        self.maxwalksat.validate().map_err(|e| ConfigError::Invalid {
            message: format!("[maxwalksat] {e}"),
        })?;
        Ok(())
    }

    /// Apply a seed to both solvers.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.mcsat.seed = seed;
        self.maxwalksat.seed = seed;
        self
    }

    /// Apply a worker count to grounding and sampling.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.grounding.threads = Some(threads);
        self.mcsat.threads = Some(threads);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_is_default() {
        let config = MlnConfig::from_toml("").unwrap();
        assert_eq!(config, MlnConfig::default());
        assert_eq!(config.output.precision, 6);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = MlnConfig::from_toml(
            r#"
            [mcsat]
            samples = 250
            seed = 9

            [output]
            smoothing = true
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.mcsat.samples, 250);
        assert_eq!(config.mcsat.seed, 9);
        assert_eq!(config.mcsat.max_flips, McSatConfig::default().max_flips);
        assert!(config.output.smoothing);
        assert_eq!(config.grounding, GroundingConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = MlnConfig::from_toml("[mcsat]\np_sa = 2.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("p_sa"));

        let err = MlnConfig::from_toml("[grounding]\nchunk_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = MlnConfig::from_toml("[mcsat\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[maxwalksat]\nmax_tries = 2").unwrap();
        let config = MlnConfig::load(file.path()).unwrap().with_seed(3);
        assert_eq!(config.maxwalksat.max_tries, 2);
        assert_eq!(config.maxwalksat.seed, 3);
        assert_eq!(config.mcsat.seed, 3);

        assert!(matches!(
            MlnConfig::load(Path::new("/nonexistent/mln.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
