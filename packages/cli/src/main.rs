#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the street segment risk toolchain.

use clap::{Parser, Subcommand};
use street_risk_database::{db, queries};
use street_risk_models::SegmentRiskDetail;
use street_risk_pipeline::{RiskJobConfig, RunOutcome};
use street_risk_route::{RouteRiskIndex, polyline};

#[derive(Parser)]
#[command(name = "street-risk", about = "Street segment risk scoring tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full scoring pipeline and rewrite the risk table
    Score {
        /// Model version tag to stamp onto the results (overrides
        /// `SEGMENT_RISK_MODEL_VERSION`)
        #[arg(long)]
        model_version: Option<String>,
        /// Lookback window in days (overrides `SEGMENT_RISK_LOOKBACK_DAYS`)
        #[arg(long)]
        lookback_days: Option<i64>,
        /// Recent window in days (overrides `SEGMENT_RISK_RECENT_DAYS`)
        #[arg(long)]
        recent_days: Option<i64>,
        /// Number of risk tiers (overrides `SEGMENT_RISK_NUM_CLUSTERS`)
        #[arg(long)]
        clusters: Option<usize>,
    },
    /// Show the stored risk for a single segment
    Segment {
        /// Segment identifier
        id: String,
    },
    /// List risks for segments whose midpoints fall inside a bounding box
    Bbox {
        /// Western longitude bound (degrees)
        west: f64,
        /// Southern latitude bound (degrees)
        south: f64,
        /// Eastern longitude bound (degrees)
        east: f64,
        /// Northern latitude bound (degrees)
        north: f64,
    },
    /// Decode an encoded polyline and score the route against the risk table
    Route {
        /// Google encoded polyline for the route
        polyline: String,
    },
}

fn print_detail(detail: &SegmentRiskDetail) {
    let street = detail.street_name.as_deref().unwrap_or("-");
    println!(
        "{:<20} {:<10} {:>6.3}  {}",
        detail.risk.segment_id, detail.risk.risk_label, detail.risk.risk_score, street,
    );
    println!(
        "  {} (model {}, updated {})",
        detail.risk.summary,
        detail.risk.model_version,
        detail.risk.updated_at.format("%Y-%m-%d %H:%M"),
    );
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            model_version,
            lookback_days,
            recent_days,
            clusters,
        } => {
            let mut config = RiskJobConfig::from_env();
            if let Some(model_version) = model_version {
                config.model_version = model_version;
            }
            if let Some(lookback_days) = lookback_days {
                config.lookback_days = lookback_days;
            }
            if let Some(recent_days) = recent_days {
                config.recent_window_days = recent_days;
            }
            if let Some(clusters) = clusters {
                config.cluster_count = clusters;
            }

            let db = db::connect_from_env().await?;
            match street_risk_pipeline::run(db.as_ref(), &config).await? {
                RunOutcome::Completed {
                    segments,
                    incidents,
                    rows_written,
                } => {
                    println!(
                        "Scored {segments} segments from {incidents} incidents ({rows_written} rows written)"
                    );
                }
                RunOutcome::Skipped { reason } => {
                    println!("Scoring skipped: {reason}");
                }
            }
        }
        Commands::Segment { id } => {
            let db = db::connect_from_env().await?;
            match queries::get_segment_risk(db.as_ref(), &id).await? {
                Some(detail) => print_detail(&detail),
                None => println!("No risk row for segment {id}"),
            }
        }
        Commands::Bbox {
            west,
            south,
            east,
            north,
        } => {
            let db = db::connect_from_env().await?;
            let details = queries::risks_within_bounds(db.as_ref(), west, south, east, north).await?;

            println!("{:<20} {:<10} {:>6}  STREET", "SEGMENT", "LABEL", "SCORE");
            println!("{}", "-".repeat(50));
            for detail in &details {
                let street = detail.street_name.as_deref().unwrap_or("-");
                println!(
                    "{:<20} {:<10} {:>6.3}  {street}",
                    detail.risk.segment_id, detail.risk.risk_label, detail.risk.risk_score,
                );
            }
            println!("{} segment(s)", details.len());
        }
        Commands::Route { polyline: encoded } => {
            let points = polyline::decode(&encoded)?;
            if points.is_empty() {
                println!("Polyline decoded to an empty route");
                return Ok(());
            }

            let db = db::connect_from_env().await?;
            let risks = queries::all_risks(db.as_ref()).await?;
            if risks.is_empty() {
                println!("Risk table is empty; run `street-risk score` first");
                return Ok(());
            }

            let index = RouteRiskIndex::new(risks);
            let score = index.score_route(&points);

            println!(
                "Route risk {:.3} over {} points ({} matched)",
                score.average_risk_score, score.sampled_points, score.matched_points,
            );
            if let Some(label) = score.dominant_label {
                println!("Dominant risk tier: {label}");
            }
        }
    }

    Ok(())
}
