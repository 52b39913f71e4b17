//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`THESIS_ROOT_FOLDER`)
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: a warning is logged and
//! compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "THESIS_ROOT_FOLDER";

/// Name of the SQLite database file inside the root folder
pub const DATABASE_FILE: &str = "thesis.db";

/// Default HTTP bind address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5740";

/// Compiled-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub bind_addr: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            log_file: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

/// `[logging]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[workflow]` table: tunables for the workflow engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSettings {
    /// When an actor has no program/department/college configured, treat
    /// their scope as unrestricted. Off by default: an unset scope sees nothing.
    #[serde(default)]
    pub open_scope_when_unset: bool,

    /// Page size used by bulk-assignment listings
    #[serde(default = "default_unassigned_page_size")]
    pub unassigned_page_size: i64,

    /// Broadcast capacity of the workflow EventBus
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Largest rank an adviser may give a concept paper
    #[serde(default = "default_max_rank_order")]
    pub max_rank_order: i64,

    /// Upload directory, relative to the root folder unless absolute
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            open_scope_when_unset: false,
            unassigned_page_size: default_unassigned_page_size(),
            event_capacity: default_event_capacity(),
            max_rank_order: default_max_rank_order(),
            uploads_dir: default_uploads_dir(),
        }
    }
}

fn default_unassigned_page_size() -> i64 {
    50
}

fn default_event_capacity() -> usize {
    256
}

fn default_max_rank_order() -> i64 {
    10
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

/// Contents of the TOML configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub bind_addr: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub workflow: WorkflowSettings,
}

/// Parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Write a TOML configuration file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolves the root folder and TOML configuration for a module
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            config_path: None,
        }
    }

    /// Root folder given on the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Explicit TOML file, bypassing the platform search path
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Load the TOML configuration, falling back to defaults when missing
    pub fn load_config(&self) -> TomlConfig {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => match find_config_file(&self.module_name) {
                Some(path) => path,
                None => {
                    warn!(
                        "No config file found for {}; using compiled defaults",
                        self.module_name
                    );
                    return TomlConfig::default();
                }
            },
        };

        match load_toml_config(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{}; using compiled defaults", e);
                TomlConfig::default()
            }
        }
    }

    /// Resolve the root folder following the priority order
    pub fn resolve(&self) -> PathBuf {
        self.resolve_with(&self.load_config())
    }

    /// Resolve the root folder against an already-loaded TOML configuration
    pub fn resolve_with(&self, config: &TomlConfig) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &config.root_folder {
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout on first run
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Resolve the uploads directory against the root folder
    pub fn uploads_path(&self, settings: &WorkflowSettings) -> PathBuf {
        if settings.uploads_dir.is_absolute() {
            settings.uploads_dir.clone()
        } else {
            self.root_folder.join(&settings.uploads_dir)
        }
    }

    /// Create the root folder if it doesn't exist (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }
}

/// Search the platform config locations for `<module>/config.toml`
fn find_config_file(module_name: &str) -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(module_name).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(module_name).join("config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/thesis-flow (or /var/lib/thesis-flow for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("thesis-flow"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/thesis-flow"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("thesis-flow"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/thesis-flow"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("thesis-flow"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\thesis-flow"))
    } else {
        PathBuf::from("./thesis_data")
    }
}
