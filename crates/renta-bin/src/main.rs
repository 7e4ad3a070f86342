//! RENTA - dynamic pricing for short-term rentals
//!
//! # Usage
//!
//! ```bash
//! # Retrain demand models from metric history and recommendation logs
//! renta retrain --days 180 --min-improvement 0.05
//!
//! # One-off price recommendation
//! renta recommend --property prop-42 --date 2026-08-15 --capacity 2
//!
//! # Show version
//! renta version
//! ```

mod config;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use renta_common::{parse_iso_date, PropertyId};
use renta_engine::PricingEngine;
use renta_model::ModelStore;
use renta_retrain::{RetrainController, RetrainCriteria};
use renta_store::MemoryStore;

use crate::config::Config;

/// Main entry point
fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match command {
        "retrain" => run_retrain(&args[2..]),
        "recommend" => run_recommend(&args[2..]),
        "version" | "-v" | "--version" => show_version(),
        "help" | "-h" | "--help" => show_help(),
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Run 'renta help' for usage information.");
            ExitCode::from(1)
        }
    }
}

/// Flags of the `retrain` subcommand
#[derive(Debug)]
struct RetrainFlags {
    criteria: RetrainCriteria,
    output: Option<PathBuf>,
}

fn parse_retrain_flags(args: &[String]) -> Result<RetrainFlags, String> {
    let mut criteria = RetrainCriteria::default();
    let mut output = None;

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--days" => criteria = criteria.with_window_days(next_value(&mut iter, flag)?),
            "--min-new-recommendations" => {
                criteria = criteria.with_min_new_recommendations(next_value(&mut iter, flag)?)
            }
            "--min-days-since-training" => {
                criteria = criteria.with_min_days_since_training(next_value(&mut iter, flag)?)
            }
            "--min-improvement" => {
                criteria = criteria.with_min_improvement(next_value(&mut iter, flag)?)
            }
            "--force" => criteria = criteria.with_force(true),
            "--output" => {
                let path: String = next_value(&mut iter, flag)?;
                output = Some(PathBuf::from(path));
            }
            other => return Err(format!("unknown flag: {}", other)),
        }
    }

    Ok(RetrainFlags { criteria, output })
}

fn next_value<'a, T: std::str::FromStr>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<T, String> {
    let raw = iter.next().ok_or_else(|| format!("{} needs a value", flag))?;
    raw.parse()
        .map_err(|_| format!("invalid value for {}: {:?}", flag, raw))
}

/// Run the retrain controller over every property with model history.
///
/// Exits 0 whenever the run completes, regardless of per-property
/// outcomes; only configuration problems exit non-zero.
fn run_retrain(args: &[String]) -> ExitCode {
    let flags = match parse_retrain_flags(args) {
        Ok(flags) => flags,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    let Some(config) = load_config_and_logging() else {
        return ExitCode::from(1);
    };

    let (store, models) = match open_capabilities(&config) {
        Ok(pair) => pair,
        Err(code) => return code,
    };

    let controller = RetrainController::new(store, models).with_criteria(flags.criteria);

    let report = match controller.run(OffsetDateTime::now_utc().date()) {
        Ok(report) => report,
        Err(err) => {
            error!(error = %err, "retrain run failed before processing properties");
            return ExitCode::from(1);
        }
    };

    let report_json = match serde_json::to_string_pretty(&report) {
        Ok(json) => json,
        Err(err) => {
            error!(error = %err, "report serialization failed");
            return ExitCode::from(1);
        }
    };

    match &flags.output {
        Some(path) => {
            if let Err(err) = std::fs::write(path, &report_json) {
                error!(path = %path.display(), error = %err, "could not write report");
                return ExitCode::from(1);
            }
            info!(path = %path.display(), "report written");
        }
        None => println!("{}", report_json),
    }

    ExitCode::SUCCESS
}

/// Flags of the `recommend` subcommand
#[derive(Debug)]
struct RecommendFlags {
    property: PropertyId,
    date: time::Date,
    capacity: Option<u32>,
}

fn parse_recommend_flags(args: &[String]) -> Result<RecommendFlags, String> {
    let mut property = None;
    let mut date = None;
    let mut capacity = None;

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--property" => {
                let id: String = next_value(&mut iter, flag)?;
                property = Some(PropertyId::new(id));
            }
            "--date" => {
                let raw: String = next_value(&mut iter, flag)?;
                date = Some(
                    parse_iso_date(&raw)
                        .ok_or_else(|| format!("invalid date (want YYYY-MM-DD): {:?}", raw))?,
                );
            }
            "--capacity" => capacity = Some(next_value(&mut iter, flag)?),
            other => return Err(format!("unknown flag: {}", other)),
        }
    }

    Ok(RecommendFlags {
        property: property.ok_or_else(|| "--property is required".to_string())?,
        date: date.ok_or_else(|| "--date is required".to_string())?,
        capacity,
    })
}

/// Produce one recommendation and print it as JSON.
fn run_recommend(args: &[String]) -> ExitCode {
    let flags = match parse_recommend_flags(args) {
        Ok(flags) => flags,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    let Some(config) = load_config_and_logging() else {
        return ExitCode::from(1);
    };

    let (store, models) = match open_capabilities(&config) {
        Ok(pair) => pair,
        Err(code) => return code,
    };

    let engine = PricingEngine::new(store, models);
    match engine.recommend(&flags.property, flags.date, flags.capacity, None) {
        Ok(recommendation) => match serde_json::to_string_pretty(&recommendation) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!(error = %err, "recommendation serialization failed");
                ExitCode::from(1)
            }
        },
        Err(err) => {
            error!(property_id = %flags.property, error = %err, "recommendation failed");
            ExitCode::from(1)
        }
    }
}

/// Load env config and initialize logging; `None` means startup failure.
fn load_config_and_logging() -> Option<Config> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {}", err);
            return None;
        }
    };
    if let Err(err) = init_logging(&config) {
        eprintln!("Failed to initialize logging: {}", err);
        return None;
    }
    Some(config)
}

/// Open the table-directory store and the model store.
fn open_capabilities(config: &Config) -> Result<(Arc<MemoryStore>, Arc<ModelStore>), ExitCode> {
    let store = match MemoryStore::from_dir(&config.data_dir) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(dir = %config.data_dir.display(), error = %err, "could not load state store");
            return Err(ExitCode::from(1));
        }
    };
    let models = match ModelStore::new(&config.models_dir) {
        Ok(models) => Arc::new(models),
        Err(err) => {
            error!(dir = %config.models_dir.display(), error = %err, "could not open model store");
            return Err(ExitCode::from(1));
        }
    };
    Ok((store, models))
}

/// Show version information
fn show_version() -> ExitCode {
    println!("renta {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Dynamic-pricing decision engine for short-term rentals.");
    println!();
    println!("Built with:");
    println!("  - renta-ml: gradient-boosted demand regressors");
    println!("  - renta-dataset: dense training frames");
    println!("  - renta-model: artifact lifecycle and model stores");
    println!("  - renta-engine: revenue optimizer and recommendations");
    println!("  - renta-retrain: closed-loop retrain controller");
    ExitCode::SUCCESS
}

/// Show help information
fn show_help() -> ExitCode {
    println!("renta - RENTA pricing engine");
    println!();
    println!("USAGE:");
    println!("    renta <COMMAND> [FLAGS]");
    println!();
    println!("COMMANDS:");
    println!("    retrain     Retrain demand models from logs and metric history");
    println!("    recommend   Produce one price recommendation");
    println!("    version     Show version information");
    println!("    help        Show this help message");
    println!();
    println!("RETRAIN FLAGS:");
    println!("    --days <N>                      Training window in days (default: 180)");
    println!("    --min-new-recommendations <N>   Volume threshold (default: 50)");
    println!("    --min-days-since-training <N>   Staleness threshold (default: 30)");
    println!("    --min-improvement <R>           Promotion threshold (default: 0.05)");
    println!("    --force                         Retrain and promote unconditionally");
    println!("    --output <FILE>                 Write the JSON report to FILE");
    println!();
    println!("RECOMMEND FLAGS:");
    println!("    --property <ID>                 Property id (required)");
    println!("    --date <YYYY-MM-DD>             Stay date (required)");
    println!("    --capacity <N>                  Remaining capacity hint");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    RENTA_MODELS_DIR    Model artifact directory (default: ./pricing_models)");
    println!("    RENTA_DATA_DIR      State-store table directory (default: ./data)");
    println!("    RENTA_LOG_LEVEL     Log level (trace/debug/info/warn/error)");
    println!("    RENTA_LOG_FORMAT    Log format (json/pretty)");
    ExitCode::SUCCESS
}

/// Initialize logging
fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| e.to_string())?;
    } else {
        subscriber
            .with(fmt::layer().pretty())
            .try_init()
            .map_err(|e| e.to_string())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_retrain_flags() {
        let flags = parse_retrain_flags(&strings(&[
            "--days",
            "90",
            "--min-improvement",
            "0.1",
            "--force",
            "--output",
            "report.json",
        ]))
        .unwrap();

        assert_eq!(flags.criteria.window_days, 90);
        assert_eq!(flags.criteria.min_improvement, 0.1);
        assert!(flags.criteria.force);
        assert_eq!(flags.output, Some(PathBuf::from("report.json")));
    }

    #[test]
    fn test_parse_retrain_flag_errors() {
        assert!(parse_retrain_flags(&strings(&["--days"])).is_err());
        assert!(parse_retrain_flags(&strings(&["--days", "abc"])).is_err());
        assert!(parse_retrain_flags(&strings(&["--bogus"])).is_err());
    }

    #[test]
    fn test_parse_recommend_flags() {
        let flags = parse_recommend_flags(&strings(&[
            "--property",
            "prop-42",
            "--date",
            "2026-08-15",
            "--capacity",
            "2",
        ]))
        .unwrap();

        assert_eq!(flags.property.as_str(), "prop-42");
        assert_eq!(flags.capacity, Some(2));
    }

    #[test]
    fn test_recommend_requires_property_and_date() {
        assert!(parse_recommend_flags(&strings(&["--date", "2026-08-15"])).is_err());
        assert!(parse_recommend_flags(&strings(&["--property", "p1"])).is_err());
        assert!(
            parse_recommend_flags(&strings(&["--property", "p1", "--date", "15/08/2026"]))
                .is_err()
        );
    }

    #[test]
    fn test_show_help_and_version() {
        // Just verify they don't panic
        let _ = show_help();
        let _ = show_version();
    }
}
