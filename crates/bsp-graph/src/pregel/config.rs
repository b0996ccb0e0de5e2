//! Engine configuration
//!
//! Every limit is off by default, so a default-configured engine runs until
//! its steps drain or a computation calls `exit`.

use serde::{Deserialize, Serialize};

use super::error::PregelError;

/// Checkpoint schema version written by this engine
pub const CHECKPOINT_VERSION: u32 = 1;

/// Configuration for an [`Engine`](super::engine::Engine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Checkpoint schema version reported to the checkpointer
    pub version: u32,

    /// Fail the run instead of starting this many supersteps
    pub max_supersteps: Option<usize>,

    /// Cap on computations in flight within one superstep
    pub parallelism: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            max_supersteps: None,
            parallelism: None,
        }
    }
}

impl EngineConfig {
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_max_supersteps(mut self, max: usize) -> Self {
        self.max_supersteps = Some(max);
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    /// Parse and validate a YAML document
    ///
    /// ```yaml
    /// version: 1
    /// max_supersteps: 500
    /// parallelism: 8
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PregelError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| PregelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PregelError> {
        if self.version == 0 {
            return Err(PregelError::Config("version must be at least 1".into()));
        }
        if self.parallelism == Some(0) {
            return Err(PregelError::Config("parallelism must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unbounded() {
        let config = EngineConfig::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.max_supersteps, None);
        assert_eq!(config.parallelism, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::default()
            .with_version(2)
            .with_max_supersteps(10)
            .with_parallelism(4);
        assert_eq!(config.version, 2);
        assert_eq!(config.max_supersteps, Some(10));
        assert_eq!(config.parallelism, Some(4));
    }

    #[test]
    fn test_from_yaml_fills_defaults() {
        let config = EngineConfig::from_yaml_str("max_supersteps: 50\n").unwrap();
        assert_eq!(config.version, CHECKPOINT_VERSION);
        assert_eq!(config.max_supersteps, Some(50));
        assert_eq!(config.parallelism, None);
    }

    #[test]
    fn test_from_yaml_rejects_invalid() {
        let err = EngineConfig::from_yaml_str("parallelism: 0\n").unwrap_err();
        assert!(matches!(err, PregelError::Config(_)));

        let err = EngineConfig::from_yaml_str("version: [1, 2]\n").unwrap_err();
        assert!(matches!(err, PregelError::Config(_)));
    }
}
