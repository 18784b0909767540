//! Configuration loader using figment.
//!
//! Supports:
//!
//! - **Multiple sources**: TOML/YAML files, environment variables, programmatic defaults
//! - **Layered configuration**: later sources override earlier ones
//! - **Profile support**: `switchboard.{profile}.toml` next to the main file
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML files (`switchboard.toml`)
//! - `yaml-config`: enables YAML files (`switchboard.yaml`, `switchboard.yml`)
//!
//! Both features can be enabled simultaneously; if so, both formats are searched.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Main config file
//! 3. Profile-specific config file
//! 4. Environment variables (`SWITCHBOARD_*`)
//! 5. Programmatic merges
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `SWITCHBOARD_` prefix with `__` as the
//! nesting separator:
//!
//! - `SWITCHBOARD_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `SWITCHBOARD_REMOTE__SOURCE=https://cdn.example.com/toggles.json` → `remote.source`
//! - `SWITCHBOARD_DEFAULTS__CHECKOUT__V2=true` → `defaults.checkout.v2 = true`
//!
//! # Example
//!
//! ```rust,ignore
//! use switchboard_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/switchboard.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::SwitchboardConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "SWITCHBOARD_";
const PROFILE_VAR: &str = "SWITCHBOARD_PROFILE";
const CONFIG_STEM: &str = "switchboard";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Parses a profile name, accepting `dev` and `prod` as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads the profile from `SWITCHBOARD_PROFILE`, defaulting to Development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds the user config directory to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join(CONFIG_STEM)),
            None => self,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges additional configuration programmatically.
    ///
    /// Merged values take precedence over files and the environment. Every
    /// serialized field of `config` is merged, so pass a complete config.
    pub fn merge(mut self, config: SwitchboardConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<SwitchboardConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: SwitchboardConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            remote = config.remote.is_some(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(SwitchboardConfig::default()));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        let user_figment = std::mem::take(&mut self.figment);
        Ok(figment.merge(user_figment))
    }

    /// Merges a single config file, dispatching on its extension.
    ///
    /// Only extensions enabled via feature flags are accepted.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(CONFIG_STEM));
        }
        paths
    }

    /// Searches `search_paths × extensions` for the first base file and
    /// merges it, then the profile-specific file next to it. Without any base
    /// file, the first profile-specific file found is merged on its own.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        extensions: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        let profile_file = |dir: &Path, ext: &str| {
            dir.join(format!("{CONFIG_STEM}.{}.{ext}", self.profile.as_str()))
        };

        for search_path in search_paths {
            for ext in extensions {
                let base_path = search_path.join(format!("{CONFIG_STEM}.{ext}"));
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    figment = merge_fn(figment, &base_path);

                    let profile_path = profile_file(search_path.as_path(), *ext);
                    if profile_path.exists() {
                        debug!(path = %profile_path.display(), "Loading profile-specific config");
                        figment = merge_fn(figment, &profile_path);
                    }
                    return (figment, true);
                }
            }
        }

        for search_path in search_paths {
            for ext in extensions {
                let profile_path = profile_file(search_path.as_path(), *ext);
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    return (merge_fn(figment, &profile_path), true);
                }
            }
        }
        (figment, false)
    }

    #[allow(unused_mut)]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) =
                self.load_format_files(figment, &search_paths, &["toml"], |fig, path| {
                    fig.merge(Toml::file(path))
                });
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) =
                self.load_format_files(figment, &search_paths, &["yaml", "yml"], |fig, path| {
                    fig.merge(Yaml::file(path))
                });
            figment = f;
            found |= ok;
        }

        if !found {
            warn!(paths = ?search_paths, "No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<SwitchboardConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from a specific file, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<SwitchboardConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogLevel, RemoteConfig};

    fn empty_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_default_config() {
        let dir = empty_dir();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config.storage.key, "toggles");
        assert!(config.remote.is_none());
        assert!(config.defaults.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = ConfigLoader::new()
            .file("/definitely/not/here/switchboard.toml")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_with_profile() {
        let dir = empty_dir();
        std::fs::write(
            dir.path().join("switchboard.toml"),
            r#"
                [logging]
                level = "debug"

                [remote]
                source = "toggles.json"
                refresh_interval_secs = 60

                [defaults.checkout]
                v2 = true
                flow = "classic"
            "#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("switchboard.staging.toml"),
            "[storage]\nkey = \"staging_toggles\"\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .profile("staging")
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.storage.key, "staging_toggles");
        let remote = config.remote.unwrap();
        assert_eq!(remote.source, "toggles.json");
        assert_eq!(remote.refresh_interval_secs, 60);
        assert_eq!(remote.name, "remote");
        assert_eq!(config.defaults["checkout"]["flow"], "classic");
        assert_eq!(config.defaults["checkout"]["v2"], true);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_overrides_base_file() {
        let dir = empty_dir();
        std::fs::write(
            dir.path().join("switchboard.toml"),
            "[logging]\nlevel = \"debug\"\n\n[defaults]\nbeta = false\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("switchboard.production.toml"),
            "[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .profile("production")
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.defaults["beta"], false);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_programmatic_merge_overrides_file() {
        let dir = empty_dir();
        std::fs::write(
            dir.path().join("switchboard.toml"),
            "[storage]\nkey = \"from_file\"\n\n[remote]\nsource = \"file.json\"\n",
        )
        .unwrap();

        let mut merged = SwitchboardConfig::default();
        merged.storage.key = "from_code".to_string();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .merge(merged)
            .load()
            .unwrap();

        assert_eq!(config.storage.key, "from_code");
        // An unset remote is not serialized, so the file's remote survives.
        assert_eq!(config.remote.unwrap().source, "file.json");
    }

    #[test]
    fn test_programmatic_merge() {
        let dir = empty_dir();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .merge(SwitchboardConfig {
                remote: Some(RemoteConfig::new("remote.json")),
                ..Default::default()
            })
            .load()
            .unwrap();
        assert_eq!(config.remote.unwrap().source, "remote.json");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = empty_dir();
        let mut remote = RemoteConfig::new("remote.json");
        remote.refresh_interval_secs = 0;
        let err = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .merge(SwitchboardConfig {
                remote: Some(remote),
                ..Default::default()
            })
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("qa").as_str(), "qa");
    }
}
