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

const BASE_URL: &str = "https://api.openweathermap.org";
const ONECALL_PATH: &str = "/data/3.0/onecall";

/// OpenWeatherMap One Call 3.0 adapter.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    http: Client,
    base_url: String,
}

impl OpenWeatherProvider {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, BASE_URL)
    }

    pub fn with_base_url(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn onecall(
        &self,
        latitude: f64,
        longitude: f64,
        api_key: &str,
        exclude: &str,
    ) -> Result<(reqwest::StatusCode, String), ForecastError> {
        let url = format!("{}{}", self.base_url, ONECALL_PATH);
        let (lat, lon) = (latitude.to_string(), longitude.to_string());

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", api_key),
                ("units", "metric"),
                ("exclude", exclude),
            ])
            .send()
            .await?;

        read_response(res).await
    }
}

/// Hourly entries report accumulation over the last hour as `{"1h": mm}`.
#[derive(Debug, Deserialize)]
struct OwVolume {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwHourly {
    #[serde(default)]
    snow: Option<OwVolume>,
    #[serde(default)]
    rain: Option<OwVolume>,
}

#[derive(Debug, Deserialize)]
struct OwDaily {
    #[serde(default)]
    snow: Option<f64>,
    #[serde(default)]
    rain: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwOneCallResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    hourly: Vec<OwHourly>,
    #[serde(default, deserialize_with = "null_as_default")]
    daily: Vec<OwDaily>,
}

/// Error payload, e.g. `{"cod": 401, "message": "Invalid API key"}`.
/// `cod` arrives as either a number or a string.
#[derive(Debug, Deserialize)]
struct OwErrorResponse {
    cod: serde_json::Value,
    message: String,
}

fn parse_error(body: &str) -> Option<(String, String)> {
    let parsed: OwErrorResponse = serde_json::from_str(body).ok()?;
    let code = match parsed.cod {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };
    Some((code, parsed.message))
}

fn to_forecast(latitude: f64, longitude: f64, parsed: OwOneCallResponse) -> NormalizedForecast {
    let hourly = parsed.hourly.iter().map(|h| Precipitation {
        snow: h.snow.as_ref().and_then(|v| v.one_hour),
        rain: h.rain.as_ref().and_then(|v| v.one_hour),
    });
    let first_daily = parsed.daily.first().map(|d| Precipitation {
        snow: d.snow,
        rain: d.rain,
    });

    normalize(latitude, longitude, hourly, first_daily)
}

#[async_trait]
impl ForecastProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeatherMap
    }

    async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        api_key: &str,
    ) -> Result<NormalizedForecast, ForecastError> {
        let (status, body) = self
            .onecall(latitude, longitude, api_key, "current,minutely,alerts")
            .await?;

        if !status.is_success() {
            return Err(error_for_status(status, &body, parse_error(&body)));
        }

        let parsed: OwOneCallResponse = serde_json::from_str(&body)?;
        debug!(
            hourly = parsed.hourly.len(),
            daily = parsed.daily.len(),
            "parsed OpenWeatherMap forecast"
        );

        Ok(to_forecast(latitude, longitude, parsed))
    }

    async fn probe(&self, api_key: &str) -> Result<bool, ForecastError> {
        let (status, _) = self
            .onecall(
                REFERENCE_LATITUDE,
                REFERENCE_LONGITUDE,
                api_key,
                "minutely,hourly,daily,alerts",
            )
            .await?;
        Ok(status.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> OwOneCallResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn parses_hourly_and_daily_accumulation() {
        let body = r#"{
            "lat": 46.02, "lon": 7.75,
            "hourly": [
                {"dt": 1, "snow": {"1h": 0.35}},
                {"dt": 2, "snow": {"1h": 0.0}, "rain": {"1h": 0.4}},
                {"dt": 3, "snow": {"1h": 1.2}}
            ],
            "daily": [
                {"dt": 1, "snow": 6.5, "rain": 1.1},
                {"dt": 2, "snow": 9.0}
            ]
        }"#;
        let f = to_forecast(46.02, 7.75, parse(body));

        assert!((f.snow.daily_cumulative - 1.55).abs() < 1e-9);
        assert!((f.rain.daily_cumulative - 0.4).abs() < 1e-9);
        assert_eq!(f.snow.next_day, 6.5);
        assert_eq!(f.rain.next_day, 1.1);
    }

    #[test]
    fn tolerates_missing_sections() {
        let f = to_forecast(1.0, 2.0, parse(r#"{"lat": 1.0, "lon": 2.0}"#));

        assert_eq!(f.snow.daily_cumulative, 0.0);
        assert_eq!(f.snow.next_day, 0.0);
        assert_eq!(f.rain.next_day, 0.0);
    }

    #[test]
    fn tolerates_null_sections_and_values() {
        let body = r#"{
            "hourly": null,
            "daily": [{"snow": null, "rain": 2.0}]
        }"#;
        let f = to_forecast(0.0, 0.0, parse(body));

        assert_eq!(f.snow.daily_cumulative, 0.0);
        assert_eq!(f.snow.next_day, 0.0);
        assert_eq!(f.rain.next_day, 2.0);

        let body = r#"{
            "hourly": [{"snow": null, "rain": {"1h": null}}, {"snow": {"1h": 0.5}}],
            "daily": null
        }"#;
        let f = to_forecast(0.0, 0.0, parse(body));

        assert_eq!(f.snow.daily_cumulative, 0.5);
        assert_eq!(f.rain.daily_cumulative, 0.0);
        assert_eq!(f.snow.next_day, 0.0);
    }

    #[test]
    fn tolerates_empty_volume_objects() {
        let body = r#"{"hourly": [{"snow": {}}, {"rain": {"3h": 9.0}}], "daily": [{}]}"#;
        let f = to_forecast(0.0, 0.0, parse(body));

        assert_eq!(f.snow.daily_cumulative, 0.0);
        assert_eq!(f.rain.daily_cumulative, 0.0);
        assert_eq!(f.snow.next_day, 0.0);
    }

    #[test]
    fn parses_numeric_and_string_error_codes() {
        assert_eq!(
            parse_error(r#"{"cod": 401, "message": "Invalid API key"}"#),
            Some(("401".to_string(), "Invalid API key".to_string()))
        );
        assert_eq!(
            parse_error(r#"{"cod": "400", "message": "wrong latitude"}"#),
            Some(("400".to_string(), "wrong latitude".to_string()))
        );
        assert_eq!(parse_error("<html>Bad Gateway</html>"), None);
    }
}
