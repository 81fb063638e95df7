//! Forecast repository: cache freshness policy in front of the active provider.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    cache::ForecastCache,
    config::ProviderSettings,
    error::ForecastError,
    model::{CachedForecast, NormalizedForecast},
    provider::{ForecastProvider, ProviderId, ProviderMap, default_providers, http_client},
};

pub struct ForecastRepository {
    providers: ProviderMap,
    cache: Arc<dyn ForecastCache>,
    settings: ProviderSettings,
}

impl ForecastRepository {
    pub fn new(
        providers: ProviderMap,
        cache: Arc<dyn ForecastCache>,
        settings: ProviderSettings,
    ) -> Self {
        Self {
            providers,
            cache,
            settings,
        }
    }

    /// Repository wired to the production provider endpoints.
    pub fn with_default_providers(
        cache: Arc<dyn ForecastCache>,
        settings: ProviderSettings,
    ) -> Result<Self, ForecastError> {
        Ok(Self::new(default_providers(http_client()?), cache, settings))
    }

    pub fn active_provider(&self) -> ProviderId {
        self.settings.active
    }

    fn provider(&self, id: ProviderId) -> Result<&Arc<dyn ForecastProvider>, ForecastError> {
        self.providers.get(&id).ok_or_else(|| {
            ForecastError::Unknown(format!("No adapter registered for provider '{id}'"))
        })
    }

    /// Return the forecast for a city, served from cache while it is fresh.
    ///
    /// With `skip_cache` set, or when the cached row is absent, stale or was fetched
    /// for other coordinates, the active provider is called once and its result
    /// replaces the cached row. Provider errors are returned as-is.
    pub async fn get_forecast(
        &self,
        city_id: &str,
        latitude: f64,
        longitude: f64,
        skip_cache: bool,
    ) -> Result<NormalizedForecast, ForecastError> {
        if !skip_cache {
            if let Some(cached) = self.cache.get(city_id)? {
                if !cached.is_fresh(Utc::now()) {
                    debug!(city_id, created_at = %cached.created_at, "cached forecast is stale");
                } else if !cached.forecast.is_at(latitude, longitude) {
                    debug!(
                        city_id,
                        cached_lat = cached.forecast.latitude,
                        cached_lon = cached.forecast.longitude,
                        "city moved since the forecast was cached"
                    );
                } else {
                    debug!(city_id, created_at = %cached.created_at, "serving cached forecast");
                    return Ok(cached.forecast);
                }
            }
        }

        let id = self.settings.active;
        let api_key = self
            .settings
            .api_key(id)
            .ok_or(ForecastError::MissingApiKey(id))?;
        let provider = self.provider(id)?;

        info!(city_id, provider = %id, "fetching forecast");
        let forecast = provider
            .fetch(latitude, longitude, api_key)
            .await
            .inspect_err(|err| {
                warn!(city_id, provider = %id, error = %err, "forecast fetch failed");
            })?;

        self.cache.put(&CachedForecast::new(city_id, forecast, Utc::now()))?;
        Ok(forecast)
    }

    /// Check a key against the active provider.
    pub async fn validate_api_key(&self, api_key: &str) -> Result<bool, ForecastError> {
        self.validate_api_key_for(self.settings.active, api_key).await
    }

    pub async fn validate_api_key_for(
        &self,
        id: ProviderId,
        api_key: &str,
    ) -> Result<bool, ForecastError> {
        let valid = self.provider(id)?.probe(api_key).await?;
        debug!(provider = %id, valid, "probed API key");
        Ok(valid)
    }
}
