//! One evaluation pass over all monitored cities.
//!
//! Cities are processed one after another with a pause in between to stay inside
//! upstream rate limits. The first failing city ends the pass.

use std::time::Duration;

use tracing::{info, warn};

use crate::{
    alert::{AlertSignal, Notifier, evaluate},
    error::ForecastError,
    model::{AlertThreshold, City},
    repository::ForecastRepository,
};

pub const DEFAULT_CITY_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Delay between two consecutive cities.
    pub pause: Duration,
    pub skip_cache: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            pause: DEFAULT_CITY_PAUSE,
            skip_cache: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub cities_checked: usize,
    pub alerts: Vec<AlertSignal>,
}

/// What the scheduler should do after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Success,
    /// Transient failure, run the pass again later.
    Retry,
    Failure,
}

impl SweepOutcome {
    pub fn from_result(result: &Result<SweepReport, ForecastError>) -> Self {
        match result {
            Ok(_) => SweepOutcome::Success,
            Err(err) if err.is_retryable() => SweepOutcome::Retry,
            Err(_) => SweepOutcome::Failure,
        }
    }
}

/// Fetch, evaluate and notify for every city that has at least one threshold.
pub async fn run_sweep(
    repository: &ForecastRepository,
    cities: &[City],
    thresholds: &[AlertThreshold],
    notifier: &dyn Notifier,
    options: &SweepOptions,
) -> Result<SweepReport, ForecastError> {
    let mut report = SweepReport::default();

    let watched = cities
        .iter()
        .filter(|city| thresholds.iter().any(|t| t.city_id == city.id));

    for (index, city) in watched.enumerate() {
        if index > 0 && !options.pause.is_zero() {
            tokio::time::sleep(options.pause).await;
        }

        let forecast = repository
            .get_forecast(&city.id, city.latitude, city.longitude, options.skip_cache)
            .await
            .inspect_err(|err| warn!(city_id = %city.id, error = %err, "aborting sweep"))?;

        let signals = evaluate(city, &forecast, thresholds);
        for signal in &signals {
            signal.dispatch(notifier);
        }

        report.cities_checked += 1;
        report.alerts.extend(signals);
    }

    info!(
        cities = report.cities_checked,
        alerts = report.alerts.len(),
        "sweep finished"
    );
    Ok(report)
}
