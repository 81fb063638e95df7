use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::ForecastError,
    model::NormalizedForecast,
    provider::{
        ForecastProvider, Precipitation, ProviderId, REFERENCE_LATITUDE, REFERENCE_LONGITUDE,
        error_for_status, normalize, null_as_default, read_response,
    },
};

const BASE_URL: &str = "https://api.tomorrow.io";
const FORECAST_PATH: &str = "/v4/weather/forecast";
const REALTIME_PATH: &str = "/v4/weather/realtime";

/// Tomorrow.io v4 weather forecast adapter.
#[derive(Debug, Clone)]
pub struct TomorrowIoProvider {
    http: Client,
    base_url: String,
}

impl TomorrowIoProvider {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, BASE_URL)
    }

    pub fn with_base_url(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get(
        &self,
        path: &str,
        latitude: f64,
        longitude: f64,
        api_key: &str,
    ) -> Result<(reqwest::StatusCode, String), ForecastError> {
        let url = format!("{}{}", self.base_url, path);
        let location = format!("{latitude},{longitude}");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("location", location.as_str()),
                ("apikey", api_key),
                ("units", "metric"),
            ])
            .send()
            .await?;

        read_response(res).await
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TioHourlyValues {
    snow_accumulation: Option<f64>,
    rain_accumulation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TioHourly {
    #[serde(default, deserialize_with = "null_as_default")]
    values: TioHourlyValues,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TioDailyValues {
    snow_accumulation_sum: Option<f64>,
    rain_accumulation_sum: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TioDaily {
    #[serde(default, deserialize_with = "null_as_default")]
    values: TioDailyValues,
}

#[derive(Debug, Default, Deserialize)]
struct TioTimelines {
    #[serde(default, deserialize_with = "null_as_default")]
    hourly: Vec<TioHourly>,
    #[serde(default, deserialize_with = "null_as_default")]
    daily: Vec<TioDaily>,
}

#[derive(Debug, Deserialize)]
struct TioForecastResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    timelines: TioTimelines,
}

/// Error payload, e.g. `{"code": 401001, "type": "Invalid Auth", "message": "..."}`.
#[derive(Debug, Deserialize)]
struct TioErrorResponse {
    code: i64,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    message: String,
}

fn parse_error(body: &str) -> Option<(String, String)> {
    let parsed: TioErrorResponse = serde_json::from_str(body).ok()?;
    let message = match parsed.kind {
        Some(kind) => format!("{kind}: {}", parsed.message),
        None => parsed.message,
    };
    Some((parsed.code.to_string(), message))
}

fn to_forecast(latitude: f64, longitude: f64, parsed: TioForecastResponse) -> NormalizedForecast {
    let timelines = parsed.timelines;
    let hourly = timelines.hourly.iter().map(|h| Precipitation {
        snow: h.values.snow_accumulation,
        rain: h.values.rain_accumulation,
    });
    let first_daily = timelines.daily.first().map(|d| Precipitation {
        snow: d.values.snow_accumulation_sum,
        rain: d.values.rain_accumulation_sum,
    });

    normalize(latitude, longitude, hourly, first_daily)
}

#[async_trait]
impl ForecastProvider for TomorrowIoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::TomorrowIo
    }

    async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        api_key: &str,
    ) -> Result<NormalizedForecast, ForecastError> {
        let (status, body) = self.get(FORECAST_PATH, latitude, longitude, api_key).await?;

        if !status.is_success() {
            return Err(error_for_status(status, &body, parse_error(&body)));
        }

        let parsed: TioForecastResponse = serde_json::from_str(&body)?;
        debug!(
            hourly = parsed.timelines.hourly.len(),
            daily = parsed.timelines.daily.len(),
            "parsed Tomorrow.io forecast"
        );

        Ok(to_forecast(latitude, longitude, parsed))
    }

    async fn probe(&self, api_key: &str) -> Result<bool, ForecastError> {
        let (status, _) = self
            .get(REALTIME_PATH, REFERENCE_LATITUDE, REFERENCE_LONGITUDE, api_key)
            .await?;
        Ok(status.is_success())
    }
}
