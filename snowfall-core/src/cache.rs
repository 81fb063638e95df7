//! Per-city forecast cache.
//!
//! One row per city; writing a city replaces whatever was stored before.

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    error::ForecastError,
    model::{Accumulation, CachedForecast, NormalizedForecast},
};

/// Storage for the latest normalized forecast of each city.
pub trait ForecastCache: Send + Sync {
    fn get(&self, city_id: &str) -> Result<Option<CachedForecast>, ForecastError>;

    /// Insert or overwrite the row for `entry.city_id`.
    fn put(&self, entry: &CachedForecast) -> Result<(), ForecastError>;
}

/// SQLite-backed cache.
pub struct SqliteForecastCache {
    conn: Mutex<Connection>,
}

impl SqliteForecastCache {
    /// Open (or create) the cache database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ForecastError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ForecastError::Cache(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, ForecastError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ForecastError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS forecast_cache (
                city_id TEXT PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                snow_daily REAL NOT NULL,
                snow_next_day REAL NOT NULL,
                snow_weekly REAL NOT NULL,
                rain_daily REAL NOT NULL,
                rain_next_day REAL NOT NULL,
                rain_weekly REAL NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ForecastCache for SqliteForecastCache {
    fn get(&self, city_id: &str) -> Result<Option<CachedForecast>, ForecastError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                r#"
                SELECT latitude, longitude, snow_daily, snow_next_day, snow_weekly,
                       rain_daily, rain_next_day, rain_weekly, created_at
                FROM forecast_cache WHERE city_id = ?1
                "#,
                params![city_id],
                |row| {
                    let forecast = NormalizedForecast {
                        latitude: row.get(0)?,
                        longitude: row.get(1)?,
                        snow: Accumulation {
                            daily_cumulative: row.get(2)?,
                            next_day: row.get(3)?,
                            weekly_cumulative: row.get(4)?,
                        },
                        rain: Accumulation {
                            daily_cumulative: row.get(5)?,
                            next_day: row.get(6)?,
                            weekly_cumulative: row.get(7)?,
                        },
                    };
                    let created_ms: i64 = row.get(8)?;
                    Ok((forecast, created_ms))
                },
            )
            .optional()?;

        let Some((forecast, created_ms)) = row else {
            return Ok(None);
        };
        let created_at = DateTime::<Utc>::from_timestamp_millis(created_ms).ok_or_else(|| {
            ForecastError::Cache(format!("Invalid timestamp {created_ms} for city '{city_id}'"))
        })?;

        Ok(Some(CachedForecast::new(city_id, forecast, created_at)))
    }

    fn put(&self, entry: &CachedForecast) -> Result<(), ForecastError> {
        let f = &entry.forecast;
        self.conn.lock().execute(
            r#"
            INSERT OR REPLACE INTO forecast_cache
            (city_id, latitude, longitude, snow_daily, snow_next_day, snow_weekly,
             rain_daily, rain_next_day, rain_weekly, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                entry.city_id,
                f.latitude,
                f.longitude,
                f.snow.daily_cumulative,
                f.snow.next_day,
                f.snow.weekly_cumulative,
                f.rain.daily_cumulative,
                f.rain.next_day,
                f.rain.weekly_cumulative,
                entry.created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }
}

/// Process-local cache, used when nothing needs to survive a restart.
#[derive(Debug, Default)]
pub struct MemoryForecastCache {
    rows: RwLock<HashMap<String, CachedForecast>>,
}

impl MemoryForecastCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ForecastCache for MemoryForecastCache {
    fn get(&self, city_id: &str) -> Result<Option<CachedForecast>, ForecastError> {
        Ok(self.rows.read().get(city_id).cloned())
    }

    fn put(&self, entry: &CachedForecast) -> Result<(), ForecastError> {
        self.rows.write().insert(entry.city_id.clone(), entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn entry(city: &str, snow: f64, hours_ago: i64) -> CachedForecast {
        let created_at =
            Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap() - Duration::hours(hours_ago);
        CachedForecast::new(
            city,
            NormalizedForecast {
                latitude: 46.02,
                longitude: 7.75,
                snow: Accumulation {
                    daily_cumulative: snow,
                    next_day: 2.5,
                    weekly_cumulative: 0.0,
                },
                rain: Accumulation {
                    daily_cumulative: 0.1,
                    next_day: 0.0,
                    weekly_cumulative: 0.0,
                },
            },
            created_at,
        )
    }

    #[test]
    fn sqlite_get_missing_returns_none() {
        let cache = SqliteForecastCache::in_memory().unwrap();
        assert!(cache.get("nowhere").unwrap().is_none());
    }

    #[test]
    fn sqlite_stores_and_reads_back() {
        let cache = SqliteForecastCache::in_memory().unwrap();
        let e = entry("zermatt", 4.2, 1);
        cache.put(&e).unwrap();

        assert_eq!(cache.get("zermatt").unwrap(), Some(e));
    }

    #[test]
    fn sqlite_latest_write_wins() {
        let cache = SqliteForecastCache::in_memory().unwrap();
        cache.put(&entry("zermatt", 1.0, 5)).unwrap();
        let newer = entry("zermatt", 9.0, 0);
        cache.put(&newer).unwrap();

        assert_eq!(cache.get("zermatt").unwrap(), Some(newer));
    }

    #[test]
    fn sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.sqlite3");
        let e = entry("davos", 3.0, 2);

        {
            let cache = SqliteForecastCache::open(&path).unwrap();
            cache.put(&e).unwrap();
        }

        let cache = SqliteForecastCache::open(&path).unwrap();
        assert_eq!(cache.get("davos").unwrap(), Some(e));
    }

    #[test]
    fn memory_cache_overwrites_per_city() {
        let cache = MemoryForecastCache::new();
        cache.put(&entry("a", 1.0, 0)).unwrap();
        cache.put(&entry("b", 2.0, 0)).unwrap();
        cache.put(&entry("a", 3.0, 0)).unwrap();

        let a = cache.get("a").unwrap().unwrap();
        let b = cache.get("b").unwrap().unwrap();
        assert_eq!(a.forecast.snow.daily_cumulative, 3.0);
        assert_eq!(b.forecast.snow.daily_cumulative, 2.0);
    }
}
