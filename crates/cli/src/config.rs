//! `texter.toml` configuration.
//!
//! Every section and key is optional; a missing file means all defaults.
//!
//! # Example
//!
//! ```toml
//! [session]
//! opt_out_script = "I'm opting you out of text-based communication immediately. Have a great day."
//!
//! [logging]
//! filter = "texter_session=info,warn"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use texter_session::SessionSettings;

/// File read when `--config` is not given, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "texter.toml";

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TexterConfig {
    pub session: SessionSettings,
    pub logging: LoggingSettings,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Read and parse a config file.
///
/// Returns a human-readable error string on failure.
pub fn read_config(path: &Path) -> Result<TexterConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Load the config named on the command line, else `texter.toml` if it
/// exists, else defaults. Only an explicitly named file must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<TexterConfig, String> {
    match explicit {
        Some(path) => read_config(path),
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.is_file() {
                read_config(fallback)
            } else {
                Ok(TexterConfig::default())
            }
        }
    }
}
