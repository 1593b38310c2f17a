//! Configuration management for decodegen.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Command-line flags (applied by the binary on top of [`Config::get`])
//! 2. Environment variables (DECODEGEN_OUT_DIR, etc.)
//! 3. Project-local config file (`./decodegen.toml`)
//! 4. User config file (`~/.config/decodegen/config.toml`)
//! 5. Built-in defaults
//!
//! # Config File Format
//!
//! ```toml
//! # decodegen.toml
//!
//! # Directory the generated sources are written to
//! out_dir = "generated"
//!
//! # Output language: "cpp" or "rust"
//! backend = "cpp"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::tablegen::BuildOptions;

/// Global cached configuration.
static CONFIG: OnceLock<Config> = OnceLock::new();

/// decodegen configuration.
///
/// Every field is optional so that layers can be merged; the accessors
/// supply the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Directory for generated files.
    pub out_dir: Option<String>,

    /// Output backend name ("cpp" or "rust").
    pub backend: Option<String>,

    /// Category marker of the entries to compile.
    pub category: Option<String>,

    /// Number of header bits used to select a dispatch slot.
    pub top_bits: Option<u8>,

    /// Fixed bits every encoding of the category starts with.
    pub fixed_prefix: Option<String>,

    /// Prefix of generated opcode identifiers.
    pub opcode_prefix: Option<String>,

    /// Register opcode names from every category, not just the compiled one.
    pub enum_all_categories: Option<bool>,

    /// Namespace (C++) wrapping the generated opcode enumeration.
    pub namespace: Option<String>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Project-local `decodegen.toml`
    /// 3. User config `~/.config/decodegen/config.toml`
    /// 4. Defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load user config first (lowest priority of file configs)
        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        // Load project-local config (higher priority)
        if let Some(local_config) = Self::load_local_config() {
            config.merge(local_config);
        }

        // Environment variables override everything
        config.apply_env_overrides(|key| std::env::var(key).ok());

        config
    }

    /// Get the cached global configuration.
    ///
    /// Loads configuration on first call and caches it.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(|| {
            let config = Self::load();
            log::debug!("Loaded configuration: {:?}", config);
            config
        })
    }

    /// Output directory, defaulting to `generated`.
    pub fn out_dir(&self) -> String {
        self.out_dir
            .clone()
            .unwrap_or_else(|| "generated".to_string())
    }

    /// Backend name, defaulting to `cpp`.
    pub fn backend(&self) -> String {
        self.backend.clone().unwrap_or_else(|| "cpp".to_string())
    }

    pub fn namespace(&self) -> String {
        self.namespace.clone().unwrap_or_else(|| "hop56".to_string())
    }

    /// Builder settings with configured values applied over the defaults.
    pub fn build_options(&self) -> BuildOptions {
        let mut options = BuildOptions::default();
        if let Some(category) = &self.category {
            options.category = category.clone();
        }
        if let Some(top_bits) = self.top_bits {
            options.top_bits = top_bits;
        }
        if let Some(prefix) = &self.fixed_prefix {
            options.fixed_prefix = prefix.clone();
        }
        if let Some(prefix) = &self.opcode_prefix {
            options.opcode_prefix = prefix.clone();
        }
        if let Some(all) = self.enum_all_categories {
            options.enum_all_categories = all;
        }
        options
    }

    /// Load user configuration from ~/.config/decodegen/config.toml
    fn load_user_config() -> Option<Self> {
        let config_path = Self::user_config_path()?;
        Self::load_from_file(&config_path)
    }

    /// Load project-local configuration from ./decodegen.toml
    fn load_local_config() -> Option<Self> {
        Self::load_from_file(Path::new("decodegen.toml"))
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge another config into this one.
    /// Only overrides fields that are Some in the other config.
    pub fn merge(&mut self, other: Self) {
        if other.out_dir.is_some() {
            self.out_dir = other.out_dir;
        }
        if other.backend.is_some() {
            self.backend = other.backend;
        }
        if other.category.is_some() {
            self.category = other.category;
        }
        if other.top_bits.is_some() {
            self.top_bits = other.top_bits;
        }
        if other.fixed_prefix.is_some() {
            self.fixed_prefix = other.fixed_prefix;
        }
        if other.opcode_prefix.is_some() {
            self.opcode_prefix = other.opcode_prefix;
        }
        if other.enum_all_categories.is_some() {
            self.enum_all_categories = other.enum_all_categories;
        }
        if other.namespace.is_some() {
            self.namespace = other.namespace;
        }
    }

    /// Apply environment variable overrides, read through `var`.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("DECODEGEN_OUT_DIR") {
            log::info!("Using DECODEGEN_OUT_DIR from environment: {}", dir);
            self.out_dir = Some(dir);
        }
        if let Some(backend) = var("DECODEGEN_BACKEND") {
            log::info!("Using DECODEGEN_BACKEND from environment: {}", backend);
            self.backend = Some(backend);
        }
        if let Some(category) = var("DECODEGEN_CATEGORY") {
            log::info!("Using DECODEGEN_CATEGORY from environment: {}", category);
            self.category = Some(category);
        }
    }

    /// Get the path to the user config file (for display/creation).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("decodegen").join("config.toml"))
    }

    /// Generate a sample config file content.
    pub fn sample_config() -> String {
        r#"# decodegen configuration
# Place this file at ~/.config/decodegen/config.toml or ./decodegen.toml

# Directory the generated sources are written to
out_dir = "generated"

# Output language: "cpp" or "rust"
backend = "cpp"

# Category marker selecting the entries to compile
category = "NOPARMO"

# Header bits used to select a dispatch slot (2^top_bits slots)
top_bits = 6

# Fixed bits shared by every encoding of the category, stripped before compiling
# fixed_prefix = "0000"

# Prefix for generated opcode identifiers
# opcode_prefix = "O_"

# Also enumerate opcodes of entries from other categories
# enum_all_categories = false

# Namespace wrapping the generated C++ opcode enumeration
# namespace = "hop56"
"#
        .to_string()
    }
}
