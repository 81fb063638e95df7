use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a cached forecast stays usable.
pub const FRESHNESS_WINDOW_HOURS: i64 = 24;

/// Coordinates closer than this, in degrees, name the same location.
const COORDINATE_TOLERANCE: f64 = 1e-6;

/// Accumulation figures for a single precipitation kind, in the provider's metric unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Accumulation {
    pub daily_cumulative: f64,
    pub next_day: f64,
    pub weekly_cumulative: f64,
}

/// Provider-agnostic forecast produced by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedForecast {
    pub latitude: f64,
    pub longitude: f64,
    pub snow: Accumulation,
    pub rain: Accumulation,
}

impl NormalizedForecast {
    pub fn accumulation(&self, category: Category) -> &Accumulation {
        match category {
            Category::Snow => &self.snow,
            Category::Rain => &self.rain,
        }
    }

    /// Whether this forecast was produced for the given coordinates.
    pub fn is_at(&self, latitude: f64, longitude: f64) -> bool {
        (self.latitude - latitude).abs() < COORDINATE_TOLERANCE
            && (self.longitude - longitude).abs() < COORDINATE_TOLERANCE
    }
}

/// Latest forecast stored for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedForecast {
    pub city_id: String,
    pub forecast: NormalizedForecast,
    pub created_at: DateTime<Utc>,
}

impl CachedForecast {
    pub fn new(
        city_id: impl Into<String>,
        forecast: NormalizedForecast,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            city_id: city_id.into(),
            forecast,
            created_at,
        }
    }

    /// A row is fresh while strictly less than the freshness window has elapsed.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at < Duration::hours(FRESHNESS_WINDOW_HOURS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Snow,
    Rain,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Snow => "snow",
            Category::Rain => "rain",
        }
    }

    pub const fn all() -> &'static [Category] {
        &[Category::Snow, Category::Rain]
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Category {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "snow" => Ok(Category::Snow),
            "rain" => Ok(Category::Rain),
            _ => Err(anyhow::anyhow!(
                "Unknown category '{value}'. Supported categories: snow, rain."
            )),
        }
    }
}

/// User-configured alert threshold for one city and category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThreshold {
    pub category: Category,
    pub threshold_value: f64,
    pub city_id: String,
    #[serde(default)]
    pub notes: String,
}

/// A monitored city. Coordinates are entered by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}
