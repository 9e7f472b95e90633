//! Load runtime configuration. Every field has a default, so the file is optional.

use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};

use anyhow::Context;
use directories::ProjectDirs;

pub const ECB_BASE_URL: &str =
    "https://www.ecb.europa.eu/stats/policy_and_exchange_rates/euro_reference_exchange_rates/html/";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RatesCfg {
    pub base_url: String,
    pub cache_dir: Option<PathBuf>, // None -> per-user cache dir
    pub max_lookback_days: i64,
    pub download_timeout_sec: u64,
}

impl Default for RatesCfg {
    fn default() -> Self {
        Self {
            base_url: ECB_BASE_URL.to_string(),
            cache_dir: None,
            max_lookback_days: 14,
            download_timeout_sec: 30,
        }
    }
}

impl RatesCfg {
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        ProjectDirs::from("", "", "ibkr-capgains")
            .map(|p| p.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub home_currency: String,
    pub rates: RatesCfg,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            home_currency: "EUR".to_string(),
            rates: RatesCfg::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Self = serde_yaml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    /// `path` when given, else `config.yaml` in the working directory if present.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None if Path::new("config.yaml").is_file() => Self::load("config.yaml"),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("cfg.yaml");
        fs::write(&p, "rates:\n  cache_dir: /tmp/ecb\n  max_lookback_days: 5\n").unwrap();

        let cfg = AppConfig::load(&p).unwrap();
        assert_eq!(cfg.home_currency, "EUR");
        assert_eq!(cfg.rates.base_url, ECB_BASE_URL);
        assert_eq!(cfg.rates.max_lookback_days, 5);
        assert_eq!(cfg.rates.download_timeout_sec, 30);
        assert_eq!(cfg.rates.cache_dir(), PathBuf::from("/tmp/ecb"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(AppConfig::load_or_default(Some(Path::new("/nonexistent/cfg.yaml"))).is_err());
    }

    #[test]
    fn bad_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("cfg.yaml");
        fs::write(&p, "rates: [1, 2").unwrap();
        assert!(AppConfig::load(&p).is_err());
    }
}
