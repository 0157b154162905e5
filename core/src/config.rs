//! file: core/src/config.rs
//! description: loader configuration.
//!
//! The loader recognises a single option, the location of the module
//! binary. It defaults to `DEFAULT_MODULE_PATH` and may be read from a JSON
//! file such as `{ "path": "dist/main.wasm" }`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::location::ModuleLocation;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    #[serde(default)]
    pub path: ModuleLocation,
}

impl LoaderConfig {
    pub fn new(path: impl Into<ModuleLocation>) -> Self {
        Self { path: path.into() }
    }

    /// Load a config from a JSON file path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<LoaderConfig, String> {
        let raw = std::fs::read_to_string(&path).map_err(|e| format!("read config: {}", e))?;
        let config: LoaderConfig = serde_json::from_str(&raw).map_err(|e| format!("parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_str().trim().is_empty() {
            return Err("config path is empty".to_string());
        }
        Ok(())
    }
}
