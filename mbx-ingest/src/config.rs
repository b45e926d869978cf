//! Configuration resolution for mbx-ingest
//!
//! Turns the bootstrap TOML plus the resolved root folder into concrete
//! paths and collaborators. Paths left unset in `[ingest]` live under the
//! root folder:
//!
//! - `<root>/work` for per-run working directories
//! - `<root>/objects` for the filesystem object store
//! - `<root>/mbx.db` for the record store

use crate::services::{ContainerUnwrapper, ExternalToolUnwrapper, NativeUnwrapper};
use mbx_common::config::{
    load_config, resolve_root_folder, IngestSettings, LoggingConfig, TomlConfig, UnwrapMode,
};
use mbx_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Fully resolved ingestion configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub root_folder: PathBuf,
    pub work_root: PathBuf,
    pub object_store_root: PathBuf,
    pub database_path: PathBuf,
    pub logging: LoggingConfig,
    pub settings: IngestSettings,
}

impl IngestConfig {
    /// Load the config file and resolve the root folder from CLI, ENV, TOML
    pub fn resolve(config_path: Option<&Path>, root_folder: Option<&Path>) -> Result<Self> {
        let toml = load_config(config_path)?;
        let root = resolve_root_folder(root_folder, &toml);
        let config = Self::from_toml(&toml, root);
        config.validate()?;
        Ok(config)
    }

    /// Derive unset paths from `root_folder`
    pub fn from_toml(toml: &TomlConfig, root_folder: PathBuf) -> Self {
        let settings = toml.ingest.clone();
        Self {
            work_root: settings
                .work_root
                .clone()
                .unwrap_or_else(|| root_folder.join("work")),
            object_store_root: settings
                .object_store_root
                .clone()
                .unwrap_or_else(|| root_folder.join("objects")),
            database_path: settings
                .database_path
                .clone()
                .unwrap_or_else(|| root_folder.join("mbx.db")),
            root_folder,
            logging: toml.logging.clone(),
            settings,
        }
    }

    /// Configuration rooted at `root_folder` with default settings
    pub fn with_root(root_folder: impl Into<PathBuf>) -> Self {
        Self::from_toml(&TomlConfig::default(), root_folder.into())
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.settings;
        if s.max_table_rows == 0 {
            return Err(Error::Config("ingest.max_table_rows must be positive".into()));
        }
        if s.max_concurrent_databases == 0 {
            return Err(Error::Config(
                "ingest.max_concurrent_databases must be positive".into(),
            ));
        }
        if s.run_timeout_secs == 0 {
            return Err(Error::Config("ingest.run_timeout_secs must be positive".into()));
        }
        if s.country_code.is_empty() || !s.country_code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Config(format!(
                "ingest.country_code must be digits, got {:?}",
                s.country_code
            )));
        }
        if s.unwrap_mode == UnwrapMode::External && s.unwrap_program.trim().is_empty() {
            return Err(Error::Config(
                "ingest.unwrap_program is required in external mode".into(),
            ));
        }
        Ok(())
    }

    /// Create the working and object-store directories
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.work_root)?;
        std::fs::create_dir_all(&self.object_store_root)?;
        Ok(())
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.run_timeout_secs)
    }

    /// Unwrapper selected by `ingest.unwrap_mode`
    pub fn build_unwrapper(&self) -> Arc<dyn ContainerUnwrapper> {
        match self.settings.unwrap_mode {
            UnwrapMode::External => Arc::new(ExternalToolUnwrapper::new(
                self.settings.unwrap_program.clone(),
                self.settings.unwrap_args.clone(),
            )),
            UnwrapMode::Native => Arc::new(NativeUnwrapper::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_default_under_root() {
        let config = IngestConfig::with_root("/srv/mbx");
        assert_eq!(config.work_root, PathBuf::from("/srv/mbx/work"));
        assert_eq!(config.object_store_root, PathBuf::from("/srv/mbx/objects"));
        assert_eq!(config.database_path, PathBuf::from("/srv/mbx/mbx.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_paths_kept() {
        let toml: TomlConfig = toml::from_str(
            r#"
            [ingest]
            work_root = "/tmp/work"
            database_path = "/data/records.db"
            unwrap_mode = "native"
            "#,
        )
        .unwrap();
        let config = IngestConfig::from_toml(&toml, PathBuf::from("/srv/mbx"));
        assert_eq!(config.work_root, PathBuf::from("/tmp/work"));
        assert_eq!(config.object_store_root, PathBuf::from("/srv/mbx/objects"));
        assert_eq!(config.database_path, PathBuf::from("/data/records.db"));
        assert_eq!(config.build_unwrapper().name(), "native");
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut config = IngestConfig::with_root("/srv/mbx");
        config.settings.country_code = "+98".into();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = IngestConfig::with_root("/srv/mbx");
        config.settings.max_table_rows = 0;
        assert!(config.validate().is_err());
    }
}
