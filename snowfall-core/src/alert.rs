//! Threshold checks against a normalized forecast.

use tracing::info;

use crate::model::{Accumulation, AlertThreshold, Category, City, NormalizedForecast};

/// Receives alerts raised by a sweep. Delivery is fire-and-forget.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        category: Category,
        current_value: f64,
        threshold_value: f64,
        city_name: &str,
        notes: &str,
    );
}

/// A threshold that was exceeded for a city.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSignal {
    pub city_id: String,
    pub city_name: String,
    pub category: Category,
    pub current_value: f64,
    pub threshold_value: f64,
    pub notes: String,
}

impl AlertSignal {
    pub fn dispatch(&self, notifier: &dyn Notifier) {
        notifier.notify(
            self.category,
            self.current_value,
            self.threshold_value,
            &self.city_name,
            &self.notes,
        );
    }
}

/// Today's running total, or tomorrow's total when nothing has accumulated yet.
pub fn comparison_value(accumulation: &Accumulation) -> f64 {
    if accumulation.daily_cumulative > 0.0 {
        accumulation.daily_cumulative
    } else {
        accumulation.next_day
    }
}

/// Compare the city's thresholds with its forecast.
///
/// Thresholds for other cities are ignored. At most one signal is produced per
/// category; when several thresholds of a category are exceeded the first one in
/// configuration order is reported.
pub fn evaluate<'a, I>(
    city: &City,
    forecast: &NormalizedForecast,
    thresholds: I,
) -> Vec<AlertSignal>
where
    I: IntoIterator<Item = &'a AlertThreshold>,
{
    let mut signals: Vec<AlertSignal> = Vec::new();

    for threshold in thresholds.into_iter().filter(|t| t.city_id == city.id) {
        if signals.iter().any(|s| s.category == threshold.category) {
            continue;
        }

        let current = comparison_value(forecast.accumulation(threshold.category));
        if current > threshold.threshold_value {
            info!(
                city_id = %city.id,
                category = %threshold.category,
                current,
                threshold = threshold.threshold_value,
                "threshold exceeded"
            );
            signals.push(AlertSignal {
                city_id: city.id.clone(),
                city_name: city.name.clone(),
                category: threshold.category,
                current_value: current,
                threshold_value: threshold.threshold_value,
                notes: threshold.notes.clone(),
            });
        }
    }

    signals
}
