use snowfall_core::{Category, Notifier};
use tracing::info;

/// Prints alerts to stdout; a scheduler wrapper can forward them elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(
        &self,
        category: Category,
        current_value: f64,
        threshold_value: f64,
        city_name: &str,
        notes: &str,
    ) {
        info!(city = city_name, %category, current_value, threshold_value, "alert raised");

        let mut line = format!(
            "ALERT {city_name}: {category} {current_value:.2} exceeds {threshold_value:.2}"
        );
        if !notes.is_empty() {
            line.push_str(&format!(" ({notes})"));
        }
        println!("{line}");
    }
}
