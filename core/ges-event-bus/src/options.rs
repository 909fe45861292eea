//! Global registry options.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Toggles read by the dispatch engine on every emit and removal decision.
///
/// Missing fields take their default when deserialized, so a partial JSON
/// document such as `{"log_stale_removals": false}` is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusOptions {
    /// Require the emitted record type to match the receiver's declared
    /// record type exactly. When off, records are passed through uninterpreted.
    pub validate_record_types: bool,

    /// Log how many stale listeners were evicted after each emit.
    pub log_stale_removals: bool,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            validate_record_types: true,
            log_stale_removals: true,
        }
    }
}

impl BusOptions {
    /// Parse options from a JSON document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Load options from a JSON file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading bus options from {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("parsing bus options in {}", path.display()))
    }
}
