#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Risk tier clustering for street segments.
//!
//! Standardizes the engineered features, partitions segments with seeded
//! k-means, orders the resulting clusters by mean incident density, and
//! derives the persisted risk fields: ordered tier label, min-max
//! normalized risk score, and an operator-facing summary string.

pub mod kmeans;

use chrono::{DateTime, Utc};
use street_risk_models::{RiskLabel, RiskRow, SegmentFeatures};
use thiserror::Error;

/// Random restarts per k-means run.
const N_INIT: u32 = 10;

/// RNG seed; fixed so a run over identical input reproduces its partition.
const SEED: u64 = 42;

/// Densities closer than this are treated as identical when normalizing.
const DENSITY_EPSILON: f64 = 1e-9;

/// Errors that can occur while clustering.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The caller passed an empty feature set. Empty populations must be
    /// skipped upstream; clustering nothing is meaningless.
    #[error("Cannot cluster an empty segment population")]
    EmptyPopulation,
}

/// Configured clusterer, constructed once per scoring run.
#[derive(Debug, Clone)]
pub struct RiskClusterer {
    cluster_count: usize,
    lookback_days: i64,
    model_version: String,
}

impl RiskClusterer {
    /// Creates a clusterer for the given tier count, lookback window, and
    /// model version tag.
    #[must_use]
    pub const fn new(cluster_count: usize, lookback_days: i64, model_version: String) -> Self {
        Self {
            cluster_count,
            lookback_days,
            model_version,
        }
    }

    /// Clusters the full segment population into ordered risk tiers.
    ///
    /// Feature vectors are (incident_density, night_fraction, trend_ratio),
    /// standardized over the current population — tiers are relative to the
    /// citywide distribution at scoring time. Clusters are ordered by
    /// ascending mean incident density and mapped to [`RiskLabel`]s; labels
    /// clamp to the last one when there are more clusters than labels.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::EmptyPopulation`] when `features` is empty.
    pub fn cluster(
        &self,
        features: &[SegmentFeatures],
        computed_at: DateTime<Utc>,
    ) -> Result<Vec<RiskRow>, ClusterError> {
        if features.is_empty() {
            return Err(ClusterError::EmptyPopulation);
        }

        let matrix: Vec<Vec<f64>> = features
            .iter()
            .map(|f| vec![f.incident_density, f.night_fraction, f.trend_ratio])
            .collect();

        let scaled = kmeans::standardize(&matrix);
        let assignments = kmeans::kmeans(&scaled, self.cluster_count, N_INIT, SEED);

        let labels = order_clusters_by_density(features, &assignments, self.cluster_count);
        let scores = normalize_densities(features);

        Ok(features
            .iter()
            .zip(&assignments)
            .zip(scores)
            .map(|((f, &cluster), risk_score)| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                let cluster_id = cluster as i32;

                RiskRow {
                    segment_id: f.segment_id.clone(),
                    cluster_id,
                    risk_label: labels[cluster],
                    risk_score,
                    incident_density: f.incident_density,
                    night_fraction: f.night_fraction,
                    window_incidents: f.window_incidents,
                    model_version: self.model_version.clone(),
                    summary: self.summarize(f),
                    updated_at: computed_at,
                }
            })
            .collect())
    }

    /// Builds the operator-facing explanation string for one segment.
    fn summarize(&self, features: &SegmentFeatures) -> String {
        format!(
            "{} incidents in {}d, night {:.0}%, trend x{:.2}",
            features.window_incidents,
            self.lookback_days,
            features.night_fraction * 100.0,
            features.trend_ratio,
        )
    }
}

/// Maps each cluster index to its ordered [`RiskLabel`].
///
/// Clusters are ranked by ascending mean incident density; empty clusters
/// (possible when there are fewer distinct vectors than K) sort last and
/// clamp to the highest label, which keeps the populated tiers correct.
fn order_clusters_by_density(
    features: &[SegmentFeatures],
    assignments: &[usize],
    cluster_count: usize,
) -> Vec<RiskLabel> {
    let mut totals = vec![0.0f64; cluster_count];
    let mut counts = vec![0u64; cluster_count];
    for (f, &cluster) in features.iter().zip(assignments) {
        totals[cluster] += f.incident_density;
        counts[cluster] += 1;
    }

    let mut ranked: Vec<usize> = (0..cluster_count).collect();
    ranked.sort_by(|&a, &b| {
        let mean = |c: usize| {
            if counts[c] > 0 {
                #[allow(clippy::cast_precision_loss)]
                let mean = totals[c] / counts[c] as f64;
                mean
            } else {
                f64::MAX
            }
        };
        mean(a)
            .partial_cmp(&mean(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let ordered_labels = RiskLabel::ordered(cluster_count);
    let mut labels = vec![*ordered_labels.last().unwrap_or(&RiskLabel::Low); cluster_count];
    for (rank, &cluster) in ranked.iter().enumerate() {
        labels[cluster] = ordered_labels[rank];
    }
    labels
}

/// Min-max normalizes incident densities to `[0, 1]` over the population.
///
/// All scores are 0.0 when every segment has (near-)identical density.
fn normalize_densities(features: &[SegmentFeatures]) -> Vec<f64> {
    let min = features
        .iter()
        .map(|f| f.incident_density)
        .fold(f64::MAX, f64::min);
    let max = features
        .iter()
        .map(|f| f.incident_density)
        .fold(f64::MIN, f64::max);

    if max - min < DENSITY_EPSILON {
        return vec![0.0; features.len()];
    }

    features
        .iter()
        .map(|f| (f.incident_density - min) / (max - min))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn features(id: &str, density: f64, night_fraction: f64, trend: f64) -> SegmentFeatures {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let window_incidents = (density * 100.0).round() as u64;
        SegmentFeatures {
            segment_id: id.to_string(),
            street_name: None,
            latitude: 47.6,
            longitude: -122.3,
            window_incidents,
            night_incidents: 0,
            recent_incidents: 0,
            previous_incidents: 0,
            effective_length: 100.0,
            incident_density: density,
            night_fraction,
            trend_ratio: trend,
        }
    }

    fn clusterer(k: usize) -> RiskClusterer {
        RiskClusterer::new(k, 90, "kmeans_c1_v1".to_string())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_population_is_rejected() {
        let result = clusterer(3).cluster(&[], now());
        assert!(matches!(result, Err(ClusterError::EmptyPopulation)));
    }

    #[test]
    fn hot_segment_outranks_quiet_segment() {
        // Smallest interesting population: one segment with a single night
        // incident, one with nothing.
        let input = vec![
            features("S1", 0.01, 1.0, 2.0),
            features("S2", 0.0, 0.0, 1.0),
        ];

        let rows = clusterer(2).cluster(&input, now()).unwrap();

        let s1 = rows.iter().find(|r| r.segment_id == "S1").unwrap();
        let s2 = rows.iter().find(|r| r.segment_id == "S2").unwrap();

        assert_eq!(s2.risk_label, RiskLabel::Low);
        assert!(s1.risk_label > s2.risk_label);
        assert!((s1.risk_score - 1.0).abs() < 1e-12);
        assert!((s2.risk_score - 0.0).abs() < 1e-12);
    }

    #[test]
    fn labels_follow_ascending_density() {
        let mut input = Vec::new();
        for i in 0..5 {
            input.push(features(&format!("low-{i}"), 0.001, 0.0, 1.0));
            input.push(features(&format!("mid-{i}"), 0.05, 0.3, 1.0));
            input.push(features(&format!("high-{i}"), 0.5, 0.8, 2.0));
        }

        let rows = clusterer(3).cluster(&input, now()).unwrap();

        for row in &rows {
            let expected = if row.segment_id.starts_with("low") {
                RiskLabel::Low
            } else if row.segment_id.starts_with("mid") {
                RiskLabel::Medium
            } else {
                RiskLabel::High
            };
            assert_eq!(row.risk_label, expected, "segment {}", row.segment_id);
        }
    }

    #[test]
    fn risk_scores_stay_in_unit_interval_and_track_density() {
        let input = vec![
            features("a", 0.0, 0.0, 1.0),
            features("b", 0.02, 0.5, 1.2),
            features("c", 0.08, 0.2, 0.8),
            features("d", 0.2, 0.9, 3.0),
        ];

        let rows = clusterer(3).cluster(&input, now()).unwrap();

        for row in &rows {
            assert!((0.0..=1.0).contains(&row.risk_score), "{}", row.segment_id);
        }

        let mut sorted = rows.clone();
        sorted.sort_by(|a, b| a.incident_density.partial_cmp(&b.incident_density).unwrap());
        for pair in sorted.windows(2) {
            assert!(pair[0].risk_score <= pair[1].risk_score);
        }
    }

    #[test]
    fn identical_densities_score_zero() {
        let input = vec![
            features("a", 0.05, 0.0, 1.0),
            features("b", 0.05, 0.5, 1.5),
            features("c", 0.05, 1.0, 0.5),
        ];

        let rows = clusterer(3).cluster(&input, now()).unwrap();
        assert!(rows.iter().all(|r| r.risk_score.abs() < f64::EPSILON));
    }

    #[test]
    fn reruns_are_deterministic() {
        let input: Vec<SegmentFeatures> = (0..20)
            .map(|i| {
                features(
                    &format!("S{i}"),
                    f64::from(i) * 0.01,
                    f64::from(i % 3) * 0.4,
                    1.0 + f64::from(i % 5) * 0.2,
                )
            })
            .collect();

        let first = clusterer(3).cluster(&input, now()).unwrap();
        let second = clusterer(3).cluster(&input, now()).unwrap();

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.cluster_id, b.cluster_id);
            assert_eq!(a.risk_label, b.risk_label);
            assert!((a.risk_score - b.risk_score).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn more_clusters_than_labels_clamp_to_very_high() {
        let input: Vec<SegmentFeatures> = (0..12)
            .map(|i| features(&format!("S{i}"), f64::from(i) * 0.05, 0.0, 1.0))
            .collect();

        let rows = clusterer(6).cluster(&input, now()).unwrap();

        let densest = rows
            .iter()
            .max_by(|a, b| a.incident_density.partial_cmp(&b.incident_density).unwrap())
            .unwrap();
        assert_eq!(densest.risk_label, RiskLabel::VeryHigh);
    }

    #[test]
    fn summary_reports_counts_night_and_trend() {
        let mut f = features("S1", 0.07, 0.333, 1.5);
        f.window_incidents = 7;

        let rows = clusterer(2)
            .cluster(&[f, features("S2", 0.0, 0.0, 1.0)], now())
            .unwrap();

        let s1 = rows.iter().find(|r| r.segment_id == "S1").unwrap();
        assert_eq!(s1.summary, "7 incidents in 90d, night 33%, trend x1.50");
        assert_eq!(s1.model_version, "kmeans_c1_v1");
    }
}
