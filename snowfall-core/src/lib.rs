//! Core library for the `snowfall` alert tool.
//!
//! This crate defines:
//! - Provider adapters that normalize OpenWeatherMap and Tomorrow.io forecasts
//! - A per-city forecast cache with a 24 hour freshness window
//! - The forecast repository tying cache and active provider together
//! - Threshold evaluation and the sequential sweep over all cities
//! - Persisted preferences (active provider, API keys, cities, thresholds)
//!
//! It is used by `snowfall-cli`, but can also be driven by any external scheduler.

pub mod alert;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod repository;
pub mod sweep;

pub use alert::{AlertSignal, Notifier};
pub use cache::{ForecastCache, MemoryForecastCache, SqliteForecastCache};
pub use config::{Config, ProviderConfig, ProviderSettings};
pub use error::ForecastError;
pub use model::{Accumulation, AlertThreshold, CachedForecast, Category, City, NormalizedForecast};
pub use provider::{ForecastProvider, ProviderId};
pub use repository::ForecastRepository;
pub use sweep::{SweepOptions, SweepOutcome, SweepReport, run_sweep};
