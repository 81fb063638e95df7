use std::{process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, Password};
use snowfall_core::{
    AlertThreshold, Category, City, Config, ForecastRepository, ProviderId, SqliteForecastCache,
    SweepOptions, SweepOutcome, run_sweep, sweep::DEFAULT_CITY_PAUSE,
};

use crate::notify::TerminalNotifier;

/// Exit status asking the scheduler to try again later (sysexits EX_TEMPFAIL).
const EXIT_RETRY: u8 = 75;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "snowfall", version, about = "Snowfall and rainfall alerts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store and validate the API key for a provider.
    Configure {
        /// Provider short name, e.g. "openweathermap" or "tomorrowio".
        provider: String,

        /// Also make this the active provider.
        #[arg(long)]
        activate: bool,
    },

    /// Select the active provider.
    Provider {
        provider: String,
    },

    /// Manage monitored cities.
    #[command(subcommand)]
    City(CityCommand),

    /// Manage alert thresholds.
    #[command(subcommand)]
    Threshold(ThresholdCommand),

    /// Show the normalized forecast for a city.
    Forecast {
        city_id: String,

        /// Ignore the cached forecast and fetch a fresh one.
        #[arg(long)]
        skip_cache: bool,
    },

    /// Run one alert sweep over all cities; meant to be invoked by a scheduler.
    Check(CheckArgs),
}

#[derive(Debug, Subcommand)]
pub enum CityCommand {
    Add {
        id: String,
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    Remove {
        id: String,
    },
    List,
}

#[derive(Debug, Subcommand)]
pub enum ThresholdCommand {
    Add {
        city_id: String,
        /// "snow" or "rain".
        category: String,
        value: f64,
        #[arg(long, default_value = "")]
        notes: String,
    },
    List,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[arg(long)]
    skip_cache: bool,

    /// Pause between cities in milliseconds.
    #[arg(long, default_value_t = DEFAULT_CITY_PAUSE.as_millis() as u64)]
    pause_ms: u64,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let mut config = Config::load()?;

        match self.command {
            Command::Configure { provider, activate } => {
                let id = ProviderId::try_from(provider.as_str())?;
                configure(&mut config, id, activate).await?;
            }
            Command::Provider { provider } => {
                let id = ProviderId::try_from(provider.as_str())?;
                config.set_active_provider(id);
                config.save()?;
                if !config.is_provider_configured(id) {
                    println!("Active provider set to {id}, but no API key is stored yet.");
                    println!("Hint: run `snowfall configure {id}`.");
                } else {
                    println!("Active provider set to {id}.");
                }
            }
            Command::City(cmd) => city(&mut config, cmd)?,
            Command::Threshold(cmd) => threshold(&mut config, cmd)?,
            Command::Forecast { city_id, skip_cache } => {
                let city = config
                    .city(&city_id)
                    .with_context(|| format!("Unknown city '{city_id}'"))?;
                let repository = repository(&config)?;
                let forecast = repository
                    .get_forecast(&city.id, city.latitude, city.longitude, skip_cache)
                    .await?;

                println!(
                    "{} ({:.4}, {:.4}) via {}",
                    city.name,
                    forecast.latitude,
                    forecast.longitude,
                    repository.active_provider()
                );
                for category in Category::all() {
                    let acc = forecast.accumulation(*category);
                    println!(
                        "  {category:<5} today {:>6.2}  next day {:>6.2}  week {:>6.2}",
                        acc.daily_cumulative, acc.next_day, acc.weekly_cumulative
                    );
                }
            }
            Command::Check(args) => return check(&config, args).await,
        }

        Ok(ExitCode::SUCCESS)
    }
}

fn repository(config: &Config) -> anyhow::Result<ForecastRepository> {
    let path = Config::cache_file_path()?;
    let cache = SqliteForecastCache::open(&path)
        .with_context(|| format!("Failed to open forecast cache: {}", path.display()))?;
    Ok(ForecastRepository::with_default_providers(
        Arc::new(cache),
        config.provider_settings(),
    )?)
}

async fn configure(config: &mut Config, id: ProviderId, activate: bool) -> anyhow::Result<()> {
    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        bail!("API key must not be empty");
    }

    let repository = repository(config)?;
    let valid = repository.validate_api_key_for(id, &api_key).await?;
    if !valid {
        let keep = Confirm::new(&format!("{id} rejected this key. Save it anyway?"))
            .with_default(false)
            .prompt()?;
        if !keep {
            bail!("API key for {id} was not saved");
        }
    }

    config.upsert_provider_api_key(id, api_key);
    if activate {
        config.set_active_provider(id);
    }
    config.save()?;
    println!("Saved API key for {id}.");
    Ok(())
}

fn city(config: &mut Config, cmd: CityCommand) -> anyhow::Result<()> {
    match cmd {
        CityCommand::Add { id, name, lat, lon } => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                bail!("Coordinates out of range: {lat}, {lon}");
            }
            config.upsert_city(City {
                id,
                name,
                latitude: lat,
                longitude: lon,
            });
            config.save()?;
        }
        CityCommand::Remove { id } => {
            if !config.remove_city(&id) {
                bail!("Unknown city '{id}'");
            }
            config.save()?;
        }
        CityCommand::List => {
            for c in &config.cities {
                println!(
                    "{:<16} {:<24} {:>9.4} {:>9.4}",
                    c.id, c.name, c.latitude, c.longitude
                );
            }
        }
    }
    Ok(())
}

fn threshold(config: &mut Config, cmd: ThresholdCommand) -> anyhow::Result<()> {
    match cmd {
        ThresholdCommand::Add {
            city_id,
            category,
            value,
            notes,
        } => {
            let category = Category::try_from(category.as_str())?;
            config.add_threshold(AlertThreshold {
                category,
                threshold_value: value,
                city_id,
                notes,
            })?;
            config.save()?;
        }
        ThresholdCommand::List => {
            for t in &config.thresholds {
                println!(
                    "{:<16} {:<5} {:>6.2}  {}",
                    t.city_id, t.category, t.threshold_value, t.notes
                );
            }
        }
    }
    Ok(())
}

async fn check(config: &Config, args: CheckArgs) -> anyhow::Result<ExitCode> {
    let repository = repository(config)?;
    let options = SweepOptions {
        pause: Duration::from_millis(args.pause_ms),
        skip_cache: args.skip_cache,
    };

    let result = run_sweep(
        &repository,
        &config.cities,
        &config.thresholds,
        &TerminalNotifier,
        &options,
    )
    .await;

    match (SweepOutcome::from_result(&result), result) {
        (_, Ok(report)) => {
            println!(
                "Checked {} cities, {} alerts.",
                report.cities_checked,
                report.alerts.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        (SweepOutcome::Retry, Err(err)) => {
            eprintln!("Sweep interrupted, retry later: {err}");
            Ok(ExitCode::from(EXIT_RETRY))
        }
        (_, Err(err)) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_city_add_with_negative_longitude() {
        let cli = Cli::try_parse_from([
            "snowfall", "city", "add", "london", "London", "--lat", "51.5", "--lon", "-0.12",
        ])
        .unwrap();
        match cli.command {
            Command::City(CityCommand::Add { lon, .. }) => assert_eq!(lon, -0.12),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn check_defaults_to_one_second_pause() {
        let cli = Cli::try_parse_from(["snowfall", "check"]).unwrap();
        match cli.command {
            Command::Check(args) => {
                assert_eq!(args.pause_ms, 1000);
                assert!(!args.skip_cache);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_threshold_add() {
        let cli = Cli::try_parse_from([
            "snowfall", "threshold", "add", "zermatt", "snow", "5", "--notes", "powder",
        ])
        .unwrap();
        match cli.command {
            Command::Threshold(ThresholdCommand::Add { value, notes, .. }) => {
                assert_eq!(value, 5.0);
                assert_eq!(notes, "powder");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
