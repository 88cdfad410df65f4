//! Persistent configuration for tessera.
//!
//! Stored in `~/.tessera/config.json`. Every field has a default, so a
//! missing or partial file is fine; command-line flags override whatever is
//! loaded here.
//!
//! ```no_run
//! use tessera_core::config::TesseraConfig;
//!
//! let config = TesseraConfig::load();
//! println!("agent at {}:{}", config.agent_host, config.agent_port);
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const CONFIG_FILENAME: &str = "config.json";

pub const DEFAULT_AGENT_PORT: u16 = 8080;

/// Returns `~/.tessera`, creating it if needed.
///
/// Falls back to the current directory when no home directory is known.
pub fn tessera_dir() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".tessera");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Returns `~/.tessera/logs`, creating it if needed.
pub fn logs_dir() -> PathBuf {
    let dir = tessera_dir().join("logs");
    std::fs::create_dir_all(&dir).ok();
    dir
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TesseraConfig {
    /// Host the accessibility agent listens on.
    pub agent_host: String,
    pub agent_port: u16,
    /// Bundle id launched before each exerciser run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    /// Implicit wait per field, in milliseconds.
    pub implicit_wait_ms: u64,
    /// JSON dependency index used instead of the built-in registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<PathBuf>,
}

impl Default for TesseraConfig {
    fn default() -> Self {
        Self {
            agent_host: "localhost".to_string(),
            agent_port: DEFAULT_AGENT_PORT,
            bundle_id: None,
            implicit_wait_ms: 5000,
            registry_path: None,
        }
    }
}

impl TesseraConfig {
    /// Load from `~/.tessera/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&tessera_dir().join(CONFIG_FILENAME))
    }

    pub fn load_from(path: &std::path::Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&tessera_dir().join(CONFIG_FILENAME))
    }

    pub fn save_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}
