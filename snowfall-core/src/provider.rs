use crate::{
    error::ForecastError,
    model::{Accumulation, NormalizedForecast},
    provider::{openweather::OpenWeatherProvider, tomorrowio::TomorrowIoProvider},
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::HashMap, fmt::Debug, sync::Arc, time::Duration};

pub mod openweather;
pub mod tomorrowio;

/// Fixed location used to check that an API key is accepted (London).
pub const REFERENCE_LATITUDE: f64 = 51.5074;
pub const REFERENCE_LONGITUDE: f64 = -0.1278;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    #[default]
    OpenWeatherMap,
    TomorrowIo,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeatherMap => "openweathermap",
            ProviderId::TomorrowIo => "tomorrowio",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeatherMap, ProviderId::TomorrowIo]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweathermap" | "openweather" | "owm" => Ok(ProviderId::OpenWeatherMap),
            "tomorrowio" | "tomorrow.io" | "tomorrow" => Ok(ProviderId::TomorrowIo),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweathermap, tomorrowio."
            )),
        }
    }
}

/// An upstream weather API translated into [`NormalizedForecast`].
#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    /// Fetch and normalize the forecast for a coordinate pair.
    async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        api_key: &str,
    ) -> Result<NormalizedForecast, ForecastError>;

    /// Issue a lightweight request at the reference location.
    ///
    /// Resolves to `Ok(true)` only for a 2xx response; transport failures are errors.
    async fn probe(&self, api_key: &str) -> Result<bool, ForecastError>;
}

pub type ProviderMap = HashMap<ProviderId, Arc<dyn ForecastProvider>>;

/// Shared HTTP client for all adapters.
pub fn http_client() -> Result<Client, ForecastError> {
    Ok(Client::builder().timeout(HTTP_TIMEOUT).build()?)
}

/// Build one adapter per supported provider, pointed at the production endpoints.
pub fn default_providers(http: Client) -> ProviderMap {
    let mut providers: ProviderMap = HashMap::new();
    providers.insert(
        ProviderId::OpenWeatherMap,
        Arc::new(OpenWeatherProvider::new(http.clone())),
    );
    providers.insert(ProviderId::TomorrowIo, Arc::new(TomorrowIoProvider::new(http)));
    providers
}

/// Snow and rain amounts from one hourly or daily upstream entry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Precipitation {
    pub snow: Option<f64>,
    pub rain: Option<f64>,
}

/// Sum hourly amounts into the daily cumulative figures and take the first daily
/// entry as next-day totals. Weekly figures are not derived from source data.
pub(crate) fn normalize<I>(
    latitude: f64,
    longitude: f64,
    hourly: I,
    first_daily: Option<Precipitation>,
) -> NormalizedForecast
where
    I: IntoIterator<Item = Precipitation>,
{
    let (snow_sum, rain_sum) = hourly.into_iter().fold((0.0, 0.0), |(snow, rain), p| {
        (snow + p.snow.unwrap_or(0.0), rain + p.rain.unwrap_or(0.0))
    });
    let next = first_daily.unwrap_or_default();

    NormalizedForecast {
        latitude,
        longitude,
        snow: Accumulation {
            daily_cumulative: snow_sum,
            next_day: next.snow.unwrap_or(0.0),
            weekly_cumulative: 0.0,
        },
        rain: Accumulation {
            daily_cumulative: rain_sum,
            next_day: next.rain.unwrap_or(0.0),
            weekly_cumulative: 0.0,
        },
    }
}

/// Deserialize an explicit `null` the same way as an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Read status and body, mapping transport failures to [`ForecastError::Network`].
pub(crate) async fn read_response(res: Response) -> Result<(StatusCode, String), ForecastError> {
    let status = res.status();
    let body = res.text().await?;
    Ok((status, body))
}

/// Classify a non-2xx response.
///
/// Rate limiting and server errors are always transient, even when the provider
/// explains them with its own error payload. Any other status carrying a provider
/// payload is reported as a provider error.
pub(crate) fn error_for_status(
    status: StatusCode,
    body: &str,
    api_error: Option<(String, String)>,
) -> ForecastError {
    let transient = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

    match api_error {
        Some((code, message)) if transient => ForecastError::Http {
            status,
            body: truncate_body(&format!("{code}: {message}")),
        },
        Some((code, message)) => ForecastError::Api { code, message },
        None => ForecastError::Http {
            status,
            body: truncate_body(body),
        },
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
