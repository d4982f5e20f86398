//! Command-line interface for PRNI bathymetry collation.
//!
//! This binary provides a thin CLI over the [`prni_core`] library: it collects
//! per-country shapefiles, normalizes their schema and CRS, and writes one
//! GeoPackage per country.
//!
//! # Architecture
//!
//! The CLI is built using [`clap`] for argument parsing and [`tracing`] for structured logging.
//! It parses arguments, configures logging, and delegates to command handlers.
//!
//! # Available Commands
//!
//! - `collate` - Run the collation pipeline
//! - `info` - Display dataset information and depth column detection
//! - `countries` - List the countries a configuration would process

mod display;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{Level, debug, info};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use prni_core::{CollateOptions, CountryCode, Variant, collate_all, inspect};

use crate::display::{display_countries, display_dataset_info, display_run_summary};

#[derive(Parser)]
#[command(
    name = "prni",
    version,
    about = "Collate PRNI bathymetry shapefiles into per-country GeoPackages",
    long_about = "Reads every shapefile under <root>/<CODE>/Bathy_shp, normalizes the depth column\n\
                  and CRS, and writes <output-dir>/<CODE>.gpkg with a single 'prni' layer."
)]
/// Command-line arguments and options for the `prni` CLI.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Pipeline variant selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    /// Keep point datasets only, apply the CRS override table
    Points,
    /// Keep every geometry type, use declared CRSs
    AllGeometries,
}

impl From<VariantArg> for Variant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Points => Self::Points,
            VariantArg::AllGeometries => Self::AllGeometries,
        }
    }
}

/// Available subcommands for the `prni` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Collates every configured country into `<output-dir>/<CODE>.gpkg`.
    ///
    /// Flags override values from the configuration file.
    Collate {
        /// JSON configuration file.
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Root directory holding one subdirectory per country.
        #[arg(short, long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Directory receiving the GeoPackages.
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Country code to process (repeatable). Defaults to all countries.
        #[arg(long = "country", value_name = "CODE")]
        countries: Vec<CountryCode>,

        /// Which geometries to keep and how CRSs are assigned.
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,
    },

    /// Displays information about a shapefile or GeoPackage.
    ///
    /// Shows the fields, the geometry column and its CRS, the first geometry
    /// type and which column would be used as depth.
    Info {
        /// Path to the dataset.
        #[arg(value_name = "DATASET")]
        input: PathBuf,

        /// Prefix identifying the depth column.
        #[arg(long, value_name = "PREFIX", default_value = "dep")]
        depth_prefix: String,
    },

    /// Lists the countries a configuration would process.
    Countries {
        /// JSON configuration file.
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

/// Entry point for the `prni` command-line interface.
///
/// This function parses command-line arguments, configures the logging system based on
/// verbosity flags, and dispatches to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if command execution fails, if any country fails to
/// collate, or if the logging system cannot be initialized.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Collate {
            config,
            root,
            output_dir,
            countries,
            variant,
        } => {
            let mut flags = CollateOptions::default();
            if let Some(root) = root {
                flags = flags.with_root_path(root);
            }
            if let Some(dir) = output_dir {
                flags = flags.with_output_dir(dir);
            }
            if !countries.is_empty() {
                flags = flags.with_countries(countries);
            }
            if let Some(variant) = variant {
                flags = flags.with_variant(variant.into());
            }
            handle_collate(config.as_deref(), flags)?;
        },
        Commands::Info {
            input,
            depth_prefix,
        } => {
            info!("Displaying info for {}", input.display());
            handle_info(&input, &depth_prefix)?;
        },
        Commands::Countries { config } => {
            handle_countries(config.as_deref())?;
        },
    }

    Ok(())
}

fn load_options(config: Option<&Path>) -> Result<CollateOptions> {
    match config {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            Ok(CollateOptions::from_json_file(path)?)
        },
        None => Ok(CollateOptions::default()),
    }
}

fn handle_collate(config: Option<&Path>, flags: CollateOptions) -> Result<()> {
    let config = load_options(config)?.merge(flags).build()?;
    info!(
        "Root: {}, output: {}",
        config.root_path().display(),
        config.output_dir().display()
    );

    let summary = collate_all(config);
    display_run_summary(&summary);

    if summary.has_failures() {
        bail!(
            "{} of {} country(ies) failed",
            summary.reports.len() - summary.succeeded(),
            summary.reports.len()
        );
    }
    Ok(())
}

fn handle_info(input: &Path, depth_prefix: &str) -> Result<()> {
    let info = inspect(input, depth_prefix)?;
    display_dataset_info(&info);
    Ok(())
}

fn handle_countries(config: Option<&Path>) -> Result<()> {
    let mut options = load_options(config)?;
    if options.root_path.is_none() {
        options = options.with_root_path(".");
    }
    display_countries(&options.build()?);
    Ok(())
}
