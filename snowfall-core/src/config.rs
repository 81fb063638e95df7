use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    model::{AlertThreshold, City},
    provider::ProviderId,
};

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Top-level preferences stored on disk.
///
/// Example TOML:
/// ```toml
/// active_provider = "tomorrowio"
///
/// [providers.tomorrowio]
/// api_key = "..."
///
/// [[cities]]
/// id = "zermatt"
/// name = "Zermatt"
/// latitude = 46.02
/// longitude = 7.75
///
/// [[thresholds]]
/// category = "snow"
/// threshold_value = 5.0
/// city_id = "zermatt"
/// notes = "powder day"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Exactly one provider is active; defaults to OpenWeatherMap.
    #[serde(default)]
    pub active_provider: ProviderId,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub cities: Vec<City>,

    #[serde(default)]
    pub thresholds: Vec<AlertThreshold>,
}

/// The subset of [`Config`] the forecast repository needs.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub active: ProviderId,
    pub api_keys: HashMap<ProviderId, String>,
}

impl ProviderSettings {
    pub fn api_key(&self, id: ProviderId) -> Option<&str> {
        self.api_keys.get(&id).map(String::as_str)
    }
}

impl Config {
    pub fn set_active_provider(&mut self, id: ProviderId) {
        self.active_provider = id;
    }

    /// Load config from the platform location, or defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the platform location, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "snowfall", "snowfall")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the SQLite forecast cache.
    pub fn cache_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("forecast_cache.sqlite3"))
    }

    /// Set or replace a provider API key.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        let api_keys = ProviderId::all()
            .iter()
            .filter_map(|id| self.provider_api_key(*id).map(|key| (*id, key.to_string())))
            .collect();

        ProviderSettings {
            active: self.active_provider,
            api_keys,
        }
    }

    pub fn city(&self, id: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.id == id)
    }

    /// Add a city, replacing an existing one with the same id.
    pub fn upsert_city(&mut self, city: City) {
        match self.cities.iter_mut().find(|c| c.id == city.id) {
            Some(existing) => *existing = city,
            None => self.cities.push(city),
        }
    }

    /// Remove a city together with its thresholds. Returns whether it existed.
    pub fn remove_city(&mut self, id: &str) -> bool {
        let before = self.cities.len();
        self.cities.retain(|c| c.id != id);
        self.thresholds.retain(|t| t.city_id != id);
        self.cities.len() != before
    }

    pub fn add_threshold(&mut self, threshold: AlertThreshold) -> Result<()> {
        if self.city(&threshold.city_id).is_none() {
            bail!(
                "Unknown city '{}'.\n\
                 Hint: run `snowfall city add` first.",
                threshold.city_id
            );
        }
        if !threshold.threshold_value.is_finite() || threshold.threshold_value < 0.0 {
            bail!("Threshold must be a non-negative number, got {}", threshold.threshold_value);
        }

        self.thresholds.push(threshold);
        Ok(())
    }

    pub fn thresholds_for<'a>(
        &'a self,
        city_id: &'a str,
    ) -> impl Iterator<Item = &'a AlertThreshold> + 'a {
        self.thresholds.iter().filter(move |t| t.city_id == city_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    fn zermatt() -> City {
        City {
            id: "zermatt".into(),
            name: "Zermatt".into(),
            latitude: 46.02,
            longitude: 7.75,
        }
    }

    fn snow_threshold(city: &str, value: f64) -> AlertThreshold {
        AlertThreshold {
            category: Category::Snow,
            threshold_value: value,
            city_id: city.into(),
            notes: String::new(),
        }
    }

    #[test]
    fn default_active_provider_is_openweathermap() {
        let cfg = Config::default();
        assert_eq!(cfg.active_provider, ProviderId::OpenWeatherMap);
    }

    #[test]
    fn set_api_key_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::TomorrowIo, "TIO_KEY".into());

        assert_eq!(cfg.provider_api_key(ProviderId::TomorrowIo), Some("TIO_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::TomorrowIo));
        assert!(!cfg.is_provider_configured(ProviderId::OpenWeatherMap));
    }

    #[test]
    fn set_active_provider_overrides_default() {
        let mut cfg = Config::default();
        cfg.set_active_provider(ProviderId::TomorrowIo);

        let settings = cfg.provider_settings();
        assert_eq!(settings.active, ProviderId::TomorrowIo);
    }

    #[test]
    fn provider_settings_carry_configured_keys() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeatherMap, "OWM".into());

        let settings = cfg.provider_settings();
        assert_eq!(settings.api_key(ProviderId::OpenWeatherMap), Some("OWM"));
        assert_eq!(settings.api_key(ProviderId::TomorrowIo), None);
    }

    #[test]
    fn upsert_city_replaces_by_id() {
        let mut cfg = Config::default();
        cfg.upsert_city(zermatt());
        cfg.upsert_city(City {
            name: "Zermatt VS".into(),
            ..zermatt()
        });

        assert_eq!(cfg.cities.len(), 1);
        assert_eq!(cfg.city("zermatt").unwrap().name, "Zermatt VS");
    }

    #[test]
    fn threshold_requires_known_city() {
        let mut cfg = Config::default();
        let err = cfg.add_threshold(snow_threshold("nowhere", 5.0)).unwrap_err();
        assert!(err.to_string().contains("Unknown city"));

        cfg.upsert_city(zermatt());
        cfg.add_threshold(snow_threshold("zermatt", 5.0)).unwrap();
        assert_eq!(cfg.thresholds_for("zermatt").count(), 1);
    }

    #[test]
    fn threshold_rejects_negative_values() {
        let mut cfg = Config::default();
        cfg.upsert_city(zermatt());
        assert!(cfg.add_threshold(snow_threshold("zermatt", -1.0)).is_err());
        assert!(cfg.add_threshold(snow_threshold("zermatt", f64::NAN)).is_err());
    }

    #[test]
    fn remove_city_drops_its_thresholds() {
        let mut cfg = Config::default();
        cfg.upsert_city(zermatt());
        cfg.add_threshold(snow_threshold("zermatt", 5.0)).unwrap();

        assert!(cfg.remove_city("zermatt"));
        assert!(cfg.thresholds.is_empty());
        assert!(!cfg.remove_city("zermatt"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snowfall").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_active_provider(ProviderId::TomorrowIo);
        cfg.upsert_provider_api_key(ProviderId::TomorrowIo, "KEY".into());
        cfg.upsert_city(zermatt());
        cfg.add_threshold(snow_threshold("zermatt", 5.0)).unwrap();
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.active_provider, ProviderId::TomorrowIo);
        assert_eq!(loaded.provider_api_key(ProviderId::TomorrowIo), Some("KEY"));
        assert_eq!(loaded.cities, vec![zermatt()]);
        assert_eq!(loaded.thresholds, vec![snow_threshold("zermatt", 5.0)]);
    }

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.cities.is_empty());
        assert!(cfg.providers.is_empty());
    }
}
