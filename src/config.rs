//! Configuration loading: TOML file, environment overrides, built-in defaults.

use crate::error::{AppError, Result};
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "PLANTBUDDY_CONFIG";
pub const PLANTNET_KEY_ENV: &str = "PLANTNET_API_KEY";
pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_KEY_ENV: &str = "SUPABASE_ANON_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub plantnet_api_key: Option<String>,
    pub plantnet_url: String,
    pub gbif_url: String,
    pub inaturalist_url: String,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub data_dir: PathBuf,
    /// Locale whose common names are preferred for nearby species
    pub locale: String,
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plantnet_api_key: None,
            plantnet_url: "https://my-api.plantnet.org/v2/identify/all".to_string(),
            gbif_url: "https://api.gbif.org/v1/occurrence/search".to_string(),
            inaturalist_url: "https://api.inaturalist.org/v1/observations".to_string(),
            supabase_url: None,
            supabase_anon_key: None,
            data_dir: default_data_dir(),
            locale: "es".to_string(),
            http_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Resolve configuration in priority order:
    /// 1. `--config` argument
    /// 2. `PLANTBUDDY_CONFIG` environment variable
    /// 3. `<config dir>/plantbuddy/config.toml` if it exists
    /// 4. built-in defaults
    ///
    /// Secret values are then overridden from the environment.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let explicit = cli_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match user_config_file().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Could not read {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Override secrets with whatever `lookup` finds in the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(PLANTNET_KEY_ENV) {
            self.plantnet_api_key = Some(key);
        }
        if let Some(url) = lookup(SUPABASE_URL_ENV) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = lookup(SUPABASE_KEY_ENV) {
            self.supabase_anon_key = Some(key);
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn require_plantnet_key(&self) -> Result<&str> {
        non_empty(&self.plantnet_api_key).ok_or_else(|| {
            AppError::Config(format!("PlantNet API key missing (set {})", PLANTNET_KEY_ENV))
        })
    }

    /// Supabase project URL and anon key, both required for auth and social calls.
    pub fn require_supabase(&self) -> Result<(&str, &str)> {
        match (non_empty(&self.supabase_url), non_empty(&self.supabase_anon_key)) {
            (Some(url), Some(key)) => Ok((url.trim_end_matches('/'), key)),
            _ => Err(AppError::Config(format!(
                "Supabase not configured (set {} and {})",
                SUPABASE_URL_ENV, SUPABASE_KEY_ENV
            ))),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("plantbuddy").join("config.toml"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("plantbuddy"))
        .unwrap_or_else(|| PathBuf::from("./plantbuddy_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.locale, "es");
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert!(config.plantnet_api_key.is_none());
        assert!(config.require_plantnet_key().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            plantnet_api_key = "abc"
            data_dir = "/tmp/pb"
            "#,
        )
        .unwrap();
        assert_eq!(config.require_plantnet_key().unwrap(), "abc");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/pb"));
        assert_eq!(config.gbif_url, "https://api.gbif.org/v1/occurrence/search");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::from_toml(r#"plantnet_api_key = "from-file""#).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            (PLANTNET_KEY_ENV, "from-env"),
            (SUPABASE_URL_ENV, "https://example.supabase.co/"),
            (SUPABASE_KEY_ENV, "anon"),
        ]);
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.require_plantnet_key().unwrap(), "from-env");
        let (url, key) = config.require_supabase().unwrap();
        assert_eq!(url, "https://example.supabase.co");
        assert_eq!(key, "anon");
    }

    #[test]
    fn test_blank_secrets_count_as_missing() {
        let config = Config::from_toml(
            r#"
            plantnet_api_key = ""
            supabase_url = "https://example.supabase.co"
            supabase_anon_key = " "
            "#,
        )
        .unwrap();
        assert!(config.require_plantnet_key().is_err());
        assert!(config.require_supabase().is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
