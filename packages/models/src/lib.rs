#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Core domain types for street segment risk scoring.
//!
//! Defines the canonical input rows (segments, incidents), the ephemeral
//! rows produced while a scoring run is in flight (assignments, features),
//! and the persisted risk output. All crates in the workspace share these
//! types; none of them mutate the input rows.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A unit of street geometry with a stable identifier and a midpoint.
///
/// Produced by the upstream street-network ingestion; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Stable segment identifier, unique across the street network.
    pub segment_id: String,
    /// Street name the segment lies on, when known.
    pub street_name: Option<String>,
    /// Segment length in meters. Missing for some network sources.
    pub length_m: Option<f64>,
    /// Midpoint latitude in degrees.
    pub latitude: f64,
    /// Midpoint longitude in degrees.
    pub longitude: f64,
}

/// A single recorded crime/emergency event with location and time.
///
/// Produced by the upstream crime ETL; only rows with coordinates and a
/// parseable offense timestamp reach this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Report number from the source system.
    pub report_number: String,
    /// Offense timestamp, naive as stored by the source.
    pub occurred_at: NaiveDateTime,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// One incident mapped to its nearest segment with temporal bucket flags.
///
/// Ephemeral; exists only within a scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Segment the incident was assigned to.
    pub segment_id: String,
    /// Incident hour-of-day falls in the night bucket (22:00–05:59).
    pub night: bool,
    /// Incident falls inside the recent window.
    pub recent: bool,
    /// Incident falls inside the previous (pre-recent) window.
    pub previous: bool,
}

/// Engineered features for one segment over the lookback window.
///
/// Every segment in the input set gets exactly one row, zero-filled when no
/// incidents were assigned to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentFeatures {
    /// Segment identifier.
    pub segment_id: String,
    /// Street name carried through for reporting.
    pub street_name: Option<String>,
    /// Midpoint latitude in degrees.
    pub latitude: f64,
    /// Midpoint longitude in degrees.
    pub longitude: f64,
    /// Incidents assigned to this segment within the lookback window.
    pub window_incidents: u64,
    /// Of those, incidents in the night bucket.
    pub night_incidents: u64,
    /// Of those, incidents in the recent window.
    pub recent_incidents: u64,
    /// Of those, incidents in the previous window.
    pub previous_incidents: u64,
    /// Segment length clamped for density math (never below 50 m).
    pub effective_length: f64,
    /// `window_incidents / effective_length`.
    pub incident_density: f64,
    /// `night_incidents / window_incidents`, 0.0 for zero-incident segments.
    pub night_fraction: f64,
    /// Laplace-smoothed `(recent + 1) / (previous + 1)`.
    pub trend_ratio: f64,
}

/// Ordered risk tier assigned via clustering.
///
/// Ordering follows ascending mean incident density per cluster; the mapping
/// is re-derived on every run, so a segment's tier is relative to the
/// citywide distribution at scoring time.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLabel {
    /// Lowest-density tier.
    Low,
    /// Middle tier.
    Medium,
    /// High-density tier.
    High,
    /// Extra tier used when scoring with more than three clusters.
    VeryHigh,
}

impl RiskLabel {
    /// All labels in ascending risk order.
    pub const ALL: &[Self] = &[Self::Low, Self::Medium, Self::High, Self::VeryHigh];

    /// Returns the labels for `k` ordered clusters, lowest risk first.
    ///
    /// When `k` exceeds the number of defined labels, the trailing clusters
    /// clamp to the last label.
    #[must_use]
    pub fn ordered(k: usize) -> Vec<Self> {
        (0..k).map(|i| Self::ALL[i.min(Self::ALL.len() - 1)]).collect()
    }
}

/// Persisted risk result for one segment, versioned by model identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRow {
    /// Segment identifier (primary key of the risk table).
    pub segment_id: String,
    /// Internal cluster partition id. Not meaningful across runs.
    pub cluster_id: i32,
    /// Ordered risk tier.
    pub risk_label: RiskLabel,
    /// Min-max normalized incident density in `[0, 1]`.
    pub risk_score: f64,
    /// Raw incident density (incidents per meter of effective length).
    pub incident_density: f64,
    /// Fraction of window incidents in the night bucket.
    pub night_fraction: f64,
    /// Incident count over the lookback window.
    pub window_incidents: u64,
    /// Opaque tag distinguishing scoring-logic revisions.
    pub model_version: String,
    /// Operator-facing explanation string; not machine-parsed.
    pub summary: String,
    /// When this row was computed (UTC).
    pub updated_at: DateTime<Utc>,
}

/// A risk row joined back to its segment's name and midpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRiskDetail {
    /// The persisted risk result.
    pub risk: RiskRow,
    /// Street name from the segment table.
    pub street_name: Option<String>,
    /// Segment midpoint latitude in degrees.
    pub latitude: f64,
    /// Segment midpoint longitude in degrees.
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_ordered() {
        assert!(RiskLabel::Low < RiskLabel::Medium);
        assert!(RiskLabel::Medium < RiskLabel::High);
        assert!(RiskLabel::High < RiskLabel::VeryHigh);
    }

    #[test]
    fn ordered_three_clusters() {
        assert_eq!(
            RiskLabel::ordered(3),
            vec![RiskLabel::Low, RiskLabel::Medium, RiskLabel::High]
        );
    }

    #[test]
    fn ordered_clamps_past_last_label() {
        assert_eq!(
            RiskLabel::ordered(6),
            vec![
                RiskLabel::Low,
                RiskLabel::Medium,
                RiskLabel::High,
                RiskLabel::VeryHigh,
                RiskLabel::VeryHigh,
                RiskLabel::VeryHigh,
            ]
        );
    }

    #[test]
    fn label_wire_names_are_screaming_snake() {
        assert_eq!(RiskLabel::VeryHigh.as_ref(), "VERY_HIGH");
        assert_eq!("LOW".parse::<RiskLabel>().unwrap(), RiskLabel::Low);
    }
}
