//! Cache configuration
//!
//! Sizing knobs for the cache window, the viewport and the sample fallback.
//! Configuration can be loaded from a TOML file, environment variables, or
//! created programmatically. It is an immutable value threaded through
//! construction; nothing here is process-wide state.

use crate::system_memory;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const MIB: u64 = 1024 * 1024;

/// Configuration for a scene's cache and viewport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Share of `max_memory_bytes` the cache window may use, in percent
    pub budget_percent: u32,
    /// Memory ceiling the budget percentage applies to; discovered from the
    /// host by default
    pub max_memory_bytes: u64,
    /// Bytes per decoded pixel
    pub bytes_per_pixel: u32,
    /// Smallest scene extent the viewport may zoom in to
    pub min_pixels_in_view: u32,
    /// Downsample shift of the whole-scene sample (3 means 1/8 per axis)
    pub downsample_shift: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            budget_percent: 5,
            max_memory_bytes: system_memory::memory_ceiling(),
            bytes_per_pixel: 4,
            min_pixels_in_view: 50,
            downsample_shift: 3,
        }
    }
}

impl CacheConfig {
    /// Sets the initial budget percentage, capped at 100.
    pub fn with_budget_percent(mut self, percent: u32) -> Self {
        self.budget_percent = percent.min(100);
        self
    }

    /// Sets the memory ceiling in megabytes, saturating at `u64::MAX` bytes.
    pub fn with_max_memory_mb(mut self, mb: u64) -> Self {
        self.max_memory_bytes = mb.saturating_mul(MIB);
        self
    }

    /// Sets the memory ceiling in bytes.
    pub fn with_max_memory_bytes(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    pub fn with_bytes_per_pixel(mut self, bytes: u32) -> Self {
        self.bytes_per_pixel = bytes.max(1);
        self
    }

    pub fn with_min_pixels_in_view(mut self, pixels: u32) -> Self {
        self.min_pixels_in_view = pixels.max(1);
        self
    }

    pub fn with_downsample_shift(mut self, shift: u32) -> Self {
        self.downsample_shift = shift;
        self
    }

    /// Memory ceiling in megabytes.
    pub fn max_memory_mb(&self) -> u64 {
        self.max_memory_bytes / MIB
    }

    /// Initial byte budget of the cache window
    pub fn budget_bytes(&self) -> u64 {
        self.max_memory_bytes.saturating_mul(self.budget_percent as u64) / 100
    }

    /// Returns the default configuration file location for the current platform.
    ///
    /// - macOS: ~/Library/Application Support/bigview/cache.toml
    /// - Linux: ~/.config/bigview/cache.toml
    /// - Windows: %APPDATA%\bigview\cache.toml
    pub fn default_config_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("bigview").join("cache.toml")
        } else {
            PathBuf::from("bigview-cache.toml")
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BIGVIEW_CACHE_PERCENT`: budget percentage (default: 5)
    /// - `BIGVIEW_MAX_MEMORY_MB`: memory ceiling in MB (default: discovered,
    ///   512 when the host cannot be queried)
    /// - `BIGVIEW_MIN_PIXELS_IN_VIEW`: zoom-in limit (default: 50)
    /// - `BIGVIEW_DOWNSAMPLE_SHIFT`: sample shift (default: 3)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Applies any `BIGVIEW_*` environment variables on top of `self`.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(percent) = env_value::<u32>("BIGVIEW_CACHE_PERCENT")? {
            if percent > 100 {
                return Err(ConfigError::InvalidValue("BIGVIEW_CACHE_PERCENT".to_string()));
            }
            self.budget_percent = percent;
        }
        if let Some(mb) = env_value::<u64>("BIGVIEW_MAX_MEMORY_MB")? {
            self.max_memory_bytes = mb
                .checked_mul(MIB)
                .ok_or_else(|| ConfigError::InvalidValue("BIGVIEW_MAX_MEMORY_MB".to_string()))?;
        }
        if let Some(pixels) = env_value::<u32>("BIGVIEW_MIN_PIXELS_IN_VIEW")? {
            if pixels == 0 {
                return Err(ConfigError::InvalidValue(
                    "BIGVIEW_MIN_PIXELS_IN_VIEW".to_string(),
                ));
            }
            self.min_pixels_in_view = pixels;
        }
        if let Some(shift) = env_value::<u32>("BIGVIEW_DOWNSAMPLE_SHIFT")? {
            self.downsample_shift = shift;
        }
        Ok(self)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format (every key optional):
    /// ```toml
    /// budget_percent = 5
    /// max_memory_bytes = 536870912
    /// bytes_per_pixel = 4
    /// min_pixels_in_view = 50
    /// downsample_shift = 3
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(ConfigError::Parse)?;
        config.validate()
    }

    /// Saves configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(ConfigError::Io)?;
            }
        }
        fs::write(path, self.to_toml()?).map_err(ConfigError::Io)
    }

    /// Converts configuration to TOML format.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(ConfigError::Serialize)
    }

    /// File at [`default_config_path`](Self::default_config_path) if present,
    /// then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_config_path();
        let config = if path.exists() {
            tracing::debug!(path = %path.display(), "loading cache config");
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.with_env_overrides()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.budget_percent > 100 {
            return Err(ConfigError::InvalidValue("budget_percent".to_string()));
        }
        if self.bytes_per_pixel == 0 {
            return Err(ConfigError::InvalidValue("bytes_per_pixel".to_string()));
        }
        if self.min_pixels_in_view == 0 {
            return Err(ConfigError::InvalidValue("min_pixels_in_view".to_string()));
        }
        Ok(self)
    }
}

fn env_value<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    #[error("Invalid value for configuration key: {0}")]
    InvalidValue(String),
    /// I/O error reading or writing configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Configuration file is not valid TOML for this schema
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_VARS: [&str; 4] = [
        "BIGVIEW_CACHE_PERCENT",
        "BIGVIEW_MAX_MEMORY_MB",
        "BIGVIEW_MIN_PIXELS_IN_VIEW",
        "BIGVIEW_DOWNSAMPLE_SHIFT",
    ];

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.budget_percent, 5);
        assert_eq!(config.max_memory_bytes, system_memory::memory_ceiling());
        assert!(config.max_memory_bytes > 0);
        assert_eq!(config.bytes_per_pixel, 4);
        assert_eq!(config.min_pixels_in_view, 50);
        assert_eq!(config.downsample_shift, 3);
    }

    #[test]
    fn test_builder_methods() {
        let config = CacheConfig::default()
            .with_budget_percent(10)
            .with_max_memory_mb(1024)
            .with_min_pixels_in_view(20)
            .with_downsample_shift(2);

        assert_eq!(config.budget_percent, 10);
        assert_eq!(config.max_memory_mb(), 1024);
        assert_eq!(config.min_pixels_in_view, 20);
        assert_eq!(config.downsample_shift, 2);
    }

    #[test]
    fn test_builder_saturates_memory_ceiling() {
        let config = CacheConfig::default().with_max_memory_mb(u64::MAX);
        assert_eq!(config.max_memory_bytes, u64::MAX);
    }

    #[test]
    fn test_builder_caps_percent() {
        assert_eq!(CacheConfig::default().with_budget_percent(250).budget_percent, 100);
    }

    #[test]
    fn test_budget_bytes() {
        let config = CacheConfig::default().with_max_memory_mb(100);
        assert_eq!(config.budget_bytes(), 5 * 1024 * 1024);

        let exhausted = config.with_budget_percent(0);
        assert_eq!(exhausted.budget_bytes(), 0);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // Save and restore env vars to avoid test pollution
        let _guard = EnvGuard::new(&ENV_VARS);

        env::set_var("BIGVIEW_CACHE_PERCENT", "8");
        env::set_var("BIGVIEW_MAX_MEMORY_MB", "256");
        env::set_var("BIGVIEW_MIN_PIXELS_IN_VIEW", "64");
        env::set_var("BIGVIEW_DOWNSAMPLE_SHIFT", "4");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.budget_percent, 8);
        assert_eq!(config.max_memory_bytes, 256 * 1024 * 1024);
        assert_eq!(config.min_pixels_in_view, 64);
        assert_eq!(config.downsample_shift, 4);
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(&ENV_VARS);

        for name in ENV_VARS {
            env::remove_var(name);
        }
        env::set_var("BIGVIEW_CACHE_PERCENT", "2");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.budget_percent, 2);
        assert_eq!(config.max_memory_bytes, CacheConfig::default().max_memory_bytes);
        assert_eq!(config.min_pixels_in_view, 50); // default
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&ENV_VARS);

        env::set_var("BIGVIEW_CACHE_PERCENT", "not_a_number");
        assert!(matches!(
            CacheConfig::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "BIGVIEW_CACHE_PERCENT"
        ));

        env::set_var("BIGVIEW_CACHE_PERCENT", "101");
        assert!(CacheConfig::from_env().is_err());

        env::remove_var("BIGVIEW_CACHE_PERCENT");
        env::set_var("BIGVIEW_MAX_MEMORY_MB", u64::MAX.to_string());
        assert!(matches!(
            CacheConfig::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "BIGVIEW_MAX_MEMORY_MB"
        ));
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = CacheConfig::default()
            .with_budget_percent(12)
            .with_max_memory_mb(64);
        let toml = config.to_toml().unwrap();
        let parsed = CacheConfig::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
            # Only the budget is overridden
            budget_percent = 3
        "#;

        let config = CacheConfig::from_toml(toml).unwrap();
        assert_eq!(config.budget_percent, 3);
        assert_eq!(config.downsample_shift, 3); // default
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(matches!(
            CacheConfig::from_toml("budget_percent = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            CacheConfig::from_toml("min_pixels_in_view = 0"),
            Err(ConfigError::InvalidValue(key)) if key == "min_pixels_in_view"
        ));
    }

    #[test]
    fn test_file_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nested").join("cache.toml");

        let config = CacheConfig::default().with_budget_percent(7);
        config.save_to_file(&config_path).unwrap();

        let loaded = CacheConfig::from_file(&config_path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = CacheConfig::from_file(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_default_config_path_names_file() {
        let path = CacheConfig::default_config_path();
        assert!(path.ends_with("cache.toml") || path.ends_with("bigview-cache.toml"));
    }
}
