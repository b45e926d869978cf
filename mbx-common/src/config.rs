//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a single TOML file. The root folder
//! (working directories, object store, record database) resolves in this
//! order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "MBX_ROOT_FOLDER";

/// Environment variable naming the config file
pub const CONFIG_FILE_ENV: &str = "MBX_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for run data (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ingestion pipeline settings
    #[serde(default)]
    pub ingest: IngestSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
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

/// How the vendor backup container is converted to a tar archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnwrapMode {
    /// Invoke an external unwrap tool
    #[default]
    External,
    /// Decode unencrypted containers in-process
    Native,
}

/// Ingestion settings as written in the `[ingest]` table.
///
/// Paths left unset are derived from the resolved root folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    #[serde(default)]
    pub work_root: Option<PathBuf>,

    #[serde(default)]
    pub object_store_root: Option<PathBuf>,

    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub unwrap_mode: UnwrapMode,

    /// Program launched in external mode
    #[serde(default = "default_unwrap_program")]
    pub unwrap_program: String,

    /// Argument template; `{input}` and `{output}` are substituted
    #[serde(default = "default_unwrap_args")]
    pub unwrap_args: Vec<String>,

    /// Row sample taken from each embedded table
    #[serde(default = "default_max_table_rows")]
    pub max_table_rows: usize,

    /// Embedded databases scanned concurrently
    #[serde(default = "default_max_concurrent_databases")]
    pub max_concurrent_databases: usize,

    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,

    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    #[serde(default = "default_max_name_chars")]
    pub max_name_chars: usize,

    /// Upper bound on the decompressed size of one message export
    #[serde(default = "default_max_inflated_bytes")]
    pub max_inflated_bytes: u64,

    /// Country calling code used for phone canonicalization
    #[serde(default = "default_country_code")]
    pub country_code: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            work_root: None,
            object_store_root: None,
            database_path: None,
            unwrap_mode: UnwrapMode::default(),
            unwrap_program: default_unwrap_program(),
            unwrap_args: default_unwrap_args(),
            max_table_rows: default_max_table_rows(),
            max_concurrent_databases: default_max_concurrent_databases(),
            run_timeout_secs: default_run_timeout_secs(),
            max_message_chars: default_max_message_chars(),
            max_name_chars: default_max_name_chars(),
            max_inflated_bytes: default_max_inflated_bytes(),
            country_code: default_country_code(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_unwrap_program() -> String {
    "java".to_string()
}

fn default_unwrap_args() -> Vec<String> {
    ["-jar", "abe.jar", "unpack", "{input}", "{output}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_table_rows() -> usize {
    1000
}

fn default_max_concurrent_databases() -> usize {
    4
}

fn default_run_timeout_secs() -> u64 {
    1800
}

fn default_max_message_chars() -> usize {
    10_000
}

fn default_max_inflated_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_max_name_chars() -> usize {
    255
}

fn default_country_code() -> String {
    "98".to_string()
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Locate the config file: explicit path, then `MBX_CONFIG`, then the
/// platform config locations. Returns `None` when nothing exists.
pub fn locate_config_file(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("mbx").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/mbx/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load configuration, falling back to built-in defaults when no file exists.
///
/// An explicitly named file that cannot be read is an error.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match locate_config_file(cli_arg) {
        Some(path) => {
            let config = load_toml_config(&path)?;
            tracing::debug!(path = %path.display(), "Loaded TOML config");
            Ok(config)
        }
        None => Ok(TomlConfig::default()),
    }
}

/// Resolve the root folder following the priority order above
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/mbx (or /var/lib/mbx for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("mbx"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/mbx"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("mbx"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/mbx"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("mbx"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\mbx"))
    } else {
        PathBuf::from("./mbx_data")
    }
}
