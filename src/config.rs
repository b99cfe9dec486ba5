//! Configuration management for MDF tools
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (mdf.toml)
//! - Environment variables (MDF_*)
//!
//! ## Example config file (mdf.toml):
//! ```toml
//! [reader]
//! strict = false
//! validate = true
//! ignore_enum_by_reference = false
//! term_identity = "full"
//!
//! [loader]
//! reject_duplicate_elements = true
//!
//! [writer]
//! hoist_end_attributes = true
//! emit_terms_section = true
//!
//! [diff]
//! objects_as_dicts = false
//! include_summary = true
//! ```
//!
//! Environment variables take the `MDF_` prefix and use `__` between table
//! and key, for example `MDF_READER__STRICT=true`.

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::diff::DiffOptions;
use crate::error::Result;
use crate::loader::{LoaderConfig, MdfLoader};
use crate::mdf::{ReaderOptions, WriterConfig};

/// Settings for every stage: load, build, write, diff
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MdfConfig {
    #[serde(default)]
    pub reader: ReaderOptions,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub writer: WriterConfig,

    #[serde(default)]
    pub diff: DiffOptions,
}

impl MdfConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file when given
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        for location in ["mdf.toml", ".mdf.toml", "config/mdf.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("org", "bento", "mdf") {
            let xdg_config = dirs.config_dir().join("mdf.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("MDF")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let config: Self = config.try_deserialize()?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e)
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// A loader using the configured loader settings
    pub fn loader(&self) -> MdfLoader {
        MdfLoader::new(self.loader.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = MdfConfig::default();
        assert!(config.reader.validate);
        assert!(!config.reader.strict);
        assert!(config.loader.reject_duplicate_elements);
        assert!(config.writer.hoist_end_attributes);
        assert!(!config.diff.objects_as_dicts);
    }

    #[test]
    fn test_serialize_config() {
        let config = MdfConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[reader]"));
        assert!(toml_str.contains("[writer]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[reader]\nstrict = true\nhandle = \"ccdi\"\n\n[diff]\ninclude_summary = true\n",
        )
        .unwrap();

        let config = MdfConfig::load_from(Some(&path)).unwrap();
        assert!(config.reader.strict);
        assert_eq!(config.reader.handle.as_deref(), Some("ccdi"));
        assert!(config.reader.validate);
        assert!(config.diff.include_summary);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = MdfConfig::default();
        config.writer.emit_terms_section = false;
        config.save(&path).unwrap();

        let loaded = MdfConfig::load_from(Some(&path)).unwrap();
        assert!(!loaded.writer.emit_terms_section);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("env.toml");
        std::fs::write(&path, "[diff]\nobjects_as_dicts = false\n").unwrap();

        std::env::set_var("MDF_DIFF__OBJECTS_AS_DICTS", "true");
        let loaded = MdfConfig::load_from(Some(&path));
        std::env::remove_var("MDF_DIFF__OBJECTS_AS_DICTS");

        assert!(loaded.unwrap().diff.objects_as_dicts);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(MdfConfig::load_from(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
