#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the patrol risk pipeline.
//!
//! Drives the full pipeline over persisted artifacts: `prep` turns a
//! cleaned incident file into a risk-table CSV, `train` fits the forest
//! and reports held-out accuracy, `recommend` ranks patrol zones for a
//! requested day/time slot, and `analyze` surfaces systematically
//! under/over-predicted zones. Models are retrained on demand from the
//! training table; there is no model persistence.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use patrol_risk_grid::{CoordinateSystem, GridIndexer};
use patrol_risk_model::{metrics, ModelConfig, TrainedRiskModel};
use patrol_risk_table::{incidents::read_incidents, RiskTable};

#[derive(Parser)]
#[command(name = "patrol_risk_cli", about = "Patrol risk modeling tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a risk table from a cleaned incident CSV
    Prep {
        /// Cleaned incident CSV (Latitude, Longitude, `IncidentDate`,
        /// `Time_Period`, optional `Crime_Category`)
        input: PathBuf,
        /// Output risk-table CSV path
        output: PathBuf,
        /// H3 grid resolution (0-15)
        #[arg(long, default_value_t = patrol_risk_grid::DEFAULT_RESOLUTION)]
        resolution: u8,
        /// Declared coordinate system of the input (e.g. "EPSG:4326").
        /// Omitting this assumes EPSG:4326 with a warning; any other
        /// declared system must be reprojected upstream first.
        #[arg(long)]
        crs: Option<String>,
    },
    /// Train on one window's risk table and evaluate on a held-out window
    Train {
        /// Training risk-table CSV
        train: PathBuf,
        /// Held-out evaluation risk-table CSV
        eval: PathBuf,
        /// Number of trees in the ensemble
        #[arg(long, default_value = "100")]
        trees: usize,
        /// Random seed for deterministic training
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Rank patrol zones for a specific day and time period
    Recommend {
        /// Training risk-table CSV (the model is retrained on demand)
        train: PathBuf,
        /// Day name (Monday-Sunday)
        #[arg(long)]
        day: String,
        /// Time period label (Morning, Afternoon, Evening, `Late_Night`)
        #[arg(long)]
        time_period: String,
        /// Number of top zones to report
        #[arg(long, default_value_t = patrol_risk_recommend::DEFAULT_TOP_K)]
        top_k: usize,
        /// Number of trees in the ensemble
        #[arg(long, default_value = "100")]
        trees: usize,
        /// Random seed for deterministic training
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Emit the full result as JSON instead of a text summary
        #[arg(long)]
        json: bool,
    },
    /// Compute per-zone mean residuals over a held-out window
    Analyze {
        /// Training risk-table CSV (the model is retrained on demand)
        train: PathBuf,
        /// Held-out evaluation risk-table CSV
        eval: PathBuf,
        /// Number of trees in the ensemble
        #[arg(long, default_value = "100")]
        trees: usize,
        /// Random seed for deterministic training
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Number of most under/over-predicted zones to report
        #[arg(long, default_value = "10")]
        show: usize,
        /// Emit all residual records as JSON instead of a text summary
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Prep {
            input,
            output,
            resolution,
            crs,
        } => {
            let crs = crs.map_or(CoordinateSystem::Unspecified, |name| {
                if name.eq_ignore_ascii_case("EPSG:4326") || name == "4326" {
                    CoordinateSystem::Wgs84
                } else {
                    CoordinateSystem::Other(name)
                }
            });
            GridIndexer::validate_crs(&crs)?;

            let indexer = GridIndexer::new(resolution)?;
            let records = read_incidents(&input)?;
            let table = patrol_risk_table::build(&records, &indexer)?;
            table.write_csv(&output)?;
            println!(
                "Built {} risk rows from {} incidents -> {}",
                table.len(),
                records.len(),
                output.display()
            );
        }
        Commands::Train {
            train,
            eval,
            trees,
            seed,
        } => {
            let train_table = RiskTable::read_csv(&train)?;
            let eval_table = RiskTable::read_csv(&eval)?;

            let model = TrainedRiskModel::fit(
                &train_table,
                ModelConfig {
                    n_trees: trees,
                    seed,
                },
            )?;
            let evaluation = metrics::evaluate(&model, &eval_table)?;

            println!("--- Model Performance ---");
            println!("Mean Absolute Error (MAE): {:.2}", evaluation.mae);
            println!("R2 Score: {:.2}", evaluation.r2);
            println!(
                "On average, the model is off by {:.2} incidents per zone ({} zones evaluated).",
                evaluation.mae, evaluation.rows
            );
        }
        Commands::Recommend {
            train,
            day,
            time_period,
            top_k,
            trees,
            seed,
            json,
        } => {
            let train_table = RiskTable::read_csv(&train)?;
            let model = TrainedRiskModel::fit(
                &train_table,
                ModelConfig {
                    n_trees: trees,
                    seed,
                },
            )?;
            let cells = train_table.known_cells();
            let result =
                patrol_risk_recommend::recommend(&model, &cells, &day, &time_period, top_k)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("--- Patrol Plan for {day} {time_period} ---");
                println!("Top {} recommended patrol zones:", result.top.len());
                for (rank, zone) in result.top.iter().enumerate() {
                    println!(
                        "{:>3}. {} ({:.4}, {:.4})  predicted risk {:.2}",
                        rank + 1,
                        zone.cell_id,
                        zone.latitude,
                        zone.longitude,
                        zone.predicted_risk
                    );
                }
            }
        }
        Commands::Analyze {
            train,
            eval,
            trees,
            seed,
            show,
            json,
        } => {
            let train_table = RiskTable::read_csv(&train)?;
            let eval_table = RiskTable::read_csv(&eval)?;
            let model = TrainedRiskModel::fit(
                &train_table,
                ModelConfig {
                    n_trees: trees,
                    seed,
                },
            )?;
            let residuals = patrol_risk_analysis::analyze(&model, &eval_table)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&residuals)?);
            } else {
                let mut ranked = residuals;
                ranked.sort_by(|a, b| {
                    b.mean_residual
                        .partial_cmp(&a.mean_residual)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                println!("--- Most under-predicted zones (actual > predicted) ---");
                for record in ranked.iter().take(show) {
                    println!(
                        "({:.4}, {:.4})  mean residual {:+.2}",
                        record.latitude, record.longitude, record.mean_residual
                    );
                }
                println!("--- Most over-predicted zones (predicted > actual) ---");
                for record in ranked.iter().rev().take(show) {
                    println!(
                        "({:.4}, {:.4})  mean residual {:+.2}",
                        record.latitude, record.longitude, record.mean_residual
                    );
                }
            }
        }
    }

    Ok(())
}
