//! Engine settings

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine settings, loadable from JSON. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Request the suspended-start debug flags in `process.argv`.
    pub debug: bool,
    /// First entry of `process.argv`.
    pub exe_identifier: String,
    /// Install `console` routed to `tracing`.
    pub console: bool,
    /// Files read into the include buffer when the engine is built.
    pub include_files: Vec<PathBuf>,
    pub limits: RuntimeLimits,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeLimits {
    pub memory_limit: Option<usize>,
    pub max_stack_size: Option<usize>,
    pub gc_threshold: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debug: false,
            exe_identifier: "tether".to_string(),
            console: true,
            include_files: Vec::new(),
            limits: RuntimeLimits::default(),
        }
    }
}

impl EngineSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(text)?)
    }
}
