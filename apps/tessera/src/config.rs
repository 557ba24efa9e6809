//! # Configuration
//!
//! Settings read from a `tessera.toml` file.
//!
//! ```toml
//! [engine]
//! entailment = "rdfs"     # "none" | "rdfs"
//! max_iterations = 10000  # 0 = unbounded
//!
//! [logging]
//! format = "text"         # "text" | "json"
//! filter = "tessera=info"
//! ```
//!
//! Every key is optional. Unknown keys are rejected so typos surface early.

use serde::Deserialize;
use std::path::Path;
use tessera_core::{EngineConfig, EntailmentRegime, TesseraError};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "tessera.toml";

/// Fixpoint bound used when the file does not set one.
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// Maximum configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub engine: EngineSection,
    pub logging: LoggingSection,
}

/// `[engine]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub entailment: EntailmentRegime,
    pub max_iterations: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            entailment: EntailmentRegime::None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub format: LogFormat,
    /// `tracing` filter directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "tessera=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse the value of `TESSERA_LOG_FORMAT`. Unknown values yield `None`.
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl AppConfig {
    /// Parse configuration text.
    pub fn from_toml(text: &str) -> Result<Self, TesseraError> {
        toml::from_str(text).map_err(|e| TesseraError::Config(e.to_string()))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `tessera.toml` in the working
    /// directory is used when present, and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, TesseraError> {
        match path {
            Some(path) => Self::read(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::read(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self, TesseraError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            TesseraError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(TesseraError::Config(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            TesseraError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Engine settings for the core. A bound of 0 means unbounded.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_iterations: (self.engine.max_iterations > 0).then_some(self.engine.max_iterations),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
