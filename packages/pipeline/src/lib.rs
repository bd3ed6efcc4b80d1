#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Segment risk scoring pipeline.
//!
//! Sequences the scoring stages: fetch segments and incidents, assign each
//! incident to its nearest segment, engineer per-segment features, cluster
//! into ordered risk tiers, and upsert the versioned risk table. Each
//! transition logs its row counts. There are no internal retries — a
//! failure at any stage aborts the run with nothing persisted, and the
//! operator re-runs the job (safe, because the persist step is idempotent).

pub mod config;

use std::collections::BTreeSet;
use std::time::Instant;

use chrono::Utc;
use street_risk_cluster::{ClusterError, RiskClusterer};
use street_risk_database::{DbError, queries};
use street_risk_features::{TimeWindows, assign_incidents, build_features};
use street_risk_spatial::SegmentIndex;
use switchy_database::Database;
use thiserror::Error;

pub use config::RiskJobConfig;

/// Errors that abort a scoring run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A fetch or persist operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Clustering failed.
    #[error("Clustering error: {0}")]
    Cluster(#[from] ClusterError),
}

/// How a scoring run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The full pipeline ran and the risk table was rewritten.
    Completed {
        /// Segments scored.
        segments: usize,
        /// Incidents consumed from the lookback window.
        incidents: usize,
        /// Risk rows written.
        rows_written: u64,
    },
    /// Inputs were empty; nothing was computed or written.
    Skipped {
        /// Why the run was skipped.
        reason: String,
    },
}

/// Runs the full scoring pipeline against the given database.
///
/// Zero segments or zero usable incidents end the run early with
/// [`RunOutcome::Skipped`] — an inert outcome, not an error.
///
/// # Errors
///
/// Returns [`PipelineError`] if a fetch, the clusterer, or the persist
/// step fails. No partial results are persisted on error.
pub async fn run(db: &dyn Database, config: &RiskJobConfig) -> Result<RunOutcome, PipelineError> {
    let start = Instant::now();
    log::info!(
        "Starting segment risk scoring (lookback={}d, clusters={}, model={})",
        config.lookback_days,
        config.cluster_count,
        config.model_version,
    );

    let now = Utc::now();
    let windows = TimeWindows::new(
        now.naive_utc(),
        config.lookback_days,
        config.recent_window_days,
    );

    let segments = queries::fetch_segments(db).await?;
    log::info!("Loaded {} street segments", segments.len());
    if segments.is_empty() {
        log::warn!("No street segments available; skipping scoring run");
        return Ok(RunOutcome::Skipped {
            reason: "no street segments".to_string(),
        });
    }

    let incidents = queries::fetch_incidents(db, windows.window_start()).await?;
    log::info!(
        "Loaded {} crime incidents since {}",
        incidents.len(),
        windows.window_start().date(),
    );
    if incidents.is_empty() {
        log::warn!("No usable incidents in the lookback window; skipping scoring run");
        return Ok(RunOutcome::Skipped {
            reason: "no usable incidents in the lookback window".to_string(),
        });
    }

    let index = SegmentIndex::build(&segments);
    let assignments = assign_incidents(&segments, &incidents, &index, &windows);
    let assigned_segments: BTreeSet<&str> = assignments
        .iter()
        .map(|a| a.segment_id.as_str())
        .collect();
    log::info!(
        "Mapped {} incidents onto {} segments",
        assignments.len(),
        assigned_segments.len(),
    );

    let features = build_features(&segments, &assignments);
    if features.is_empty() {
        log::warn!("No features computed; skipping clustering");
        return Ok(RunOutcome::Skipped {
            reason: "no features computed".to_string(),
        });
    }
    log::info!("Built feature rows for {} segments", features.len());

    let clusterer = RiskClusterer::new(
        config.cluster_count,
        config.lookback_days,
        config.model_version.clone(),
    );
    let rows = clusterer.cluster(&features, now)?;

    queries::ensure_risk_table(db).await?;
    let rows_written = queries::upsert_risk_rows(db, &rows).await?;

    log::info!(
        "Persisted risk scores for {rows_written} segments, took {:.1}s",
        start.elapsed().as_secs_f64(),
    );

    Ok(RunOutcome::Completed {
        segments: segments.len(),
        incidents: incidents.len(),
        rows_written,
    })
}
