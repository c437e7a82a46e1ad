//! Point d'entrée CLI pour qc-opendata

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use qc_opendata::cli::{self, Commands, JoinArgs};

// Charger .env au démarrage (RUST_LOG uniquement, aucun secret)
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Normaliser les données ouvertes du Québec en GeoJSON canonique
#[derive(Parser)]
#[command(name = "qc-opendata")]
#[command(author, version)]
#[command(about = "Normalize, join and reconcile Québec open-government datasets")]
#[command(long_about = "Reads CSV snapshots (permits, fire stations, administrative regions, zoning), \
normalizes geometry, CRS and columns, and writes GeoJSON with a JSON run report.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Normalize {
            input,
            dataset,
            output,
            common,
        } => {
            info!(input = %input.display(), dataset = %dataset, "Normalize");
            cli::cmd_normalize(&input, &dataset, &output, &common)?;
        }
        Commands::Join {
            points,
            points_dataset,
            polygons,
            polygons_dataset,
            mode,
            polygon_fields,
            jobs,
            output,
            common,
        } => {
            info!(points = %points.display(), polygons = %polygons.display(), mode = %mode, "Containment join");
            cli::cmd_join(
                JoinArgs {
                    points: &points,
                    points_dataset: &points_dataset,
                    polygons: &polygons,
                    polygons_dataset: &polygons_dataset,
                    mode,
                    polygon_fields: &polygon_fields,
                    jobs,
                    output: &output,
                },
                &common,
            )?;
        }
        Commands::Reconcile {
            input,
            dataset,
            output,
            common,
        } => {
            info!(input = %input.display(), dataset = %dataset, "Lifecycle reconciliation");
            cli::cmd_reconcile(&input, &dataset, &output, &common)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
