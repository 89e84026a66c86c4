// 🚗 Vehicle History CLI - summarize exported dataset files
//
//   vehicle-history summarize --mileage tests.json --ownership owners.csv [--debug] [--now 2024-01-01T00:00:00Z]
//   vehicle-history vehicle --record registry.json [--specs model_specs.csv]

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use vehicle_history::{
    extract_specs, first_with_specs, init_tracing, load_all, load_records, normalize_vehicle,
    summarize_history, EngineConfig, VehicleProfile,
};

#[derive(Parser, Debug)]
#[command(name = "vehicle-history", version, about = "Normalize Israeli vehicle history records")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize mileage and ownership record files into a HistorySummary
    Summarize {
        /// Mileage / inspection record files (.json or .csv), concatenated in order
        #[arg(long = "mileage", value_name = "FILE", num_args = 1..)]
        mileage: Vec<PathBuf>,

        /// Ownership-change record files (.json or .csv)
        #[arg(long = "ownership", value_name = "FILE", num_args = 1..)]
        ownership: Vec<PathBuf>,

        /// Include the full mileage series and verbose logs
        #[arg(long)]
        debug: bool,

        /// Reference "now" for the current ownership (RFC 3339), default wall clock
        #[arg(long, value_name = "RFC3339")]
        now: Option<DateTime<Utc>>,
    },

    /// Normalize a vehicle registry row, filling engine size / power from model specs
    Vehicle {
        /// Registry export (.json or .csv); the first row is used
        #[arg(long, value_name = "FILE")]
        record: PathBuf,

        /// Model-spec rows; the first one with engine size or power is used
        #[arg(long, value_name = "FILE")]
        specs: Option<PathBuf>,

        /// Verbose logs
        #[arg(long)]
        debug: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Summarize {
            mileage,
            ownership,
            debug,
            now,
        } => run_summarize(&mileage, &ownership, debug, now),
        Command::Vehicle {
            record,
            specs,
            debug,
        } => run_vehicle(&record, specs.as_deref(), debug),
    }
}

fn run_summarize(
    mileage_files: &[PathBuf],
    ownership_files: &[PathBuf],
    debug: bool,
    now: Option<DateTime<Utc>>,
) -> Result<()> {
    init_tracing(debug);

    let mileage = load_all(mileage_files).context("Failed to load mileage records")?;
    let ownership = load_all(ownership_files).context("Failed to load ownership records")?;

    let mut config = EngineConfig::default().with_debug(debug);
    if let Some(at) = now {
        config = config.with_reference_time(at);
    }

    let summary = summarize_history(&mileage, &ownership, &config);

    let json = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
    println!("{}", json);

    Ok(())
}

fn run_vehicle(record_file: &Path, specs_file: Option<&Path>, debug: bool) -> Result<()> {
    init_tracing(debug);

    let profile = vehicle_profile(record_file, specs_file)?;

    let json = serde_json::to_string_pretty(&profile).context("Failed to serialize vehicle")?;
    println!("{}", json);

    Ok(())
}

fn vehicle_profile(record_file: &Path, specs_file: Option<&Path>) -> Result<VehicleProfile> {
    let rows = load_records(record_file).context("Failed to load vehicle record")?;
    let Some(row) = rows.first() else {
        bail!("{} contains no vehicle rows", record_file.display());
    };

    let mut profile = normalize_vehicle(row);

    if let Some(path) = specs_file {
        let spec_rows = load_records(path).context("Failed to load model specs")?;
        match first_with_specs(&spec_rows) {
            Some((spec_row, _)) => profile.enrich(&extract_specs(spec_row)),
            None => tracing::warn!(file = %path.display(), "no model-spec row with engine size or power"),
        }
    }

    Ok(profile)
}
