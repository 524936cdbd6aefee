use anyhow::Context;
use clap::Parser;
use forecast_core::{
    Config, FallbackReason, FetchError, ForecastError, ForecastFetcher, ForecastRequest, ForecastResponse,
    ResponseSelector, SaveOutcome, Selection, SnapshotStore, normalize,
};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::table;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecast", version, about = "Hourly weather forecast in the terminal")]
pub struct Cli {
    /// Use cached data instead of calling the API.
    #[arg(short, long)]
    pub offline: bool,

    /// Path to the configuration file (TOML, or JSON with a .json extension).
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log fetch and backup decisions to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Wait for Enter before exiting.
    #[arg(long)]
    pub pause: bool,
}

impl Cli {
    /// `RUST_LOG` wins; otherwise warnings, or debug with `--verbose`.
    pub fn init_tracing(&self) {
        let fallback = if self.verbose { "debug" } else { "warn" };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        debug!(path = %config_path.display(), "loading config");
        let config = Config::load(&config_path)?;
        let request = config.to_request()?;
        let store = SnapshotStore::new(config.backup_dir(&config_path)?);
        debug!(dir = %store.dir().display(), "backup directory");
        let fetcher = ForecastFetcher::from_base_url(&config.base_url)?;

        if !self.offline {
            println!("Connecting and downloading from: {}", fetcher.endpoint(&request));
        }

        let selection = match ResponseSelector::new(&fetcher, &store)
            .select(&request, self.offline)
            .await
        {
            Ok(selection) => selection,
            Err(err) => {
                if let Some(diagnostic) = fatal_diagnostic(&err) {
                    eprintln!("{diagnostic}");
                }
                return Err(err.into());
            }
        };
        for line in report(&selection) {
            println!("{line}");
        }

        let response = selection.into_response();
        let forecast = normalize(&response)?;

        println!();
        println!("{}", header(&response, &request));
        print!("{}", table::render(&forecast, config.decimal_places)?);

        if self.pause {
            pause()?;
        }

        Ok(())
    }
}

/// User-facing lines describing where the data came from.
fn report(selection: &Selection) -> Vec<String> {
    match selection {
        Selection::Live { saved, .. } => match saved {
            Ok(SaveOutcome::Created(id)) => vec![format!("Backup saved: {id}")],
            Ok(SaveOutcome::Unchanged(_)) => {
                vec!["Data unchanged. Skipping creating backup.".to_string()]
            }
            Err(e) => vec![format!("Warning: could not save backup: {e}")],
        },
        Selection::Fallback { snapshot, reason, .. } => {
            let mut lines = Vec::new();
            if let FallbackReason::FetchFailed(err) = reason {
                lines.push(describe_fetch_error(err));
            }
            lines.push(String::new());
            lines.push(format!("{reason}. Attempting to load last backup..."));
            lines.push(format!("OFFLINE MODE: Displaying data from {snapshot}"));
            lines
        }
    }
}

/// The classified fetch failure behind a run that found no backup either.
fn fatal_diagnostic(err: &ForecastError) -> Option<String> {
    match err {
        ForecastError::NoBackup { reason: FallbackReason::FetchFailed(fetch), .. } => {
            Some(describe_fetch_error(fetch))
        }
        _ => None,
    }
}

fn describe_fetch_error(err: &FetchError) -> String {
    match err {
        FetchError::InvalidParameter { parameter, .. } => format!(
            "\n[!] CONFIG ERROR: The parameter '{parameter}' is not recognized by the API.\n\
             Please check your spelling in the config or refer to the Open-Meteo documentation."
        ),
        other => other.to_string(),
    }
}

fn header(response: &ForecastResponse, request: &ForecastRequest) -> String {
    let lat = round3(response.latitude().unwrap_or(request.latitude));
    let lon = round3(response.longitude().unwrap_or(request.longitude));

    let tz = response.timezone().unwrap_or(&request.timezone);
    if tz.is_empty() {
        format!("Forecast for latitude: {lat} and longitude: {lon}:")
    } else {
        format!("Forecast for latitude: {lat} and longitude: {lon}, time zone: {tz}:")
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn pause() -> anyhow::Result<()> {
    print!("\nPress enter to continue...");
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("Failed to read from stdin")?;
    Ok(())
}
