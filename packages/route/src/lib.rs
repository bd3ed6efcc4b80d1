#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route risk assessment over scored street segments.
//!
//! Samples a route's points against the persisted risk table: each point
//! is matched to its nearest scored segment, and the route is summarized
//! as the mean risk score plus the dominant risk label across samples.
//! Built once per batch of routes from the current risk rows.

pub mod polyline;

use std::collections::BTreeMap;

use street_risk_models::{RiskLabel, Segment, SegmentRiskDetail};
use street_risk_spatial::SegmentIndex;

/// Risk summary for one route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteScore {
    /// Mean risk score over the matched samples, 0.0 when nothing matched.
    pub average_risk_score: f64,
    /// Most frequent risk label among matched samples; ties go to the
    /// higher label. `None` when nothing matched.
    pub dominant_label: Option<RiskLabel>,
    /// Points sampled along the route.
    pub sampled_points: usize,
    /// Points that matched a scored segment.
    pub matched_points: usize,
}

impl RouteScore {
    const fn empty(sampled_points: usize) -> Self {
        Self {
            average_risk_score: 0.0,
            dominant_label: None,
            sampled_points,
            matched_points: 0,
        }
    }
}

/// Nearest-scored-segment lookup built from the current risk rows.
pub struct RouteRiskIndex {
    details: Vec<SegmentRiskDetail>,
    index: SegmentIndex,
}

impl RouteRiskIndex {
    /// Builds the lookup over all scored segments.
    #[must_use]
    pub fn new(details: Vec<SegmentRiskDetail>) -> Self {
        let midpoints: Vec<Segment> = details
            .iter()
            .map(|d| Segment {
                segment_id: d.risk.segment_id.clone(),
                street_name: d.street_name.clone(),
                length_m: None,
                latitude: d.latitude,
                longitude: d.longitude,
            })
            .collect();

        let index = SegmentIndex::build(&midpoints);
        log::debug!("Built route risk index over {} scored segments", details.len());

        Self { details, index }
    }

    /// Number of scored segments behind the lookup.
    #[must_use]
    pub fn len(&self) -> usize {
        self.details.len()
    }

    /// Whether any scored segments are available.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    /// Risk detail of the segment nearest to a point.
    #[must_use]
    pub fn nearest_risk(&self, latitude: f64, longitude: f64) -> Option<&SegmentRiskDetail> {
        self.index
            .nearest(latitude, longitude)
            .map(|i| &self.details[i])
    }

    /// Scores a route given as `(latitude, longitude)` samples.
    ///
    /// Averages the nearest-segment risk score over all samples and votes
    /// on the dominant label by sample count. An empty route or an empty
    /// index yields a zeroed score, not an error.
    #[must_use]
    pub fn score_route(&self, points: &[(f64, f64)]) -> RouteScore {
        if points.is_empty() || self.is_empty() {
            return RouteScore::empty(points.len());
        }

        let mut score_sum = 0.0;
        let mut matched = 0usize;
        let mut label_counts: BTreeMap<RiskLabel, usize> = BTreeMap::new();

        for &(lat, lng) in points {
            if let Some(detail) = self.nearest_risk(lat, lng) {
                score_sum += detail.risk.risk_score;
                matched += 1;
                *label_counts.entry(detail.risk.risk_label).or_insert(0) += 1;
            }
        }

        if matched == 0 {
            return RouteScore::empty(points.len());
        }

        let dominant_label = label_counts
            .into_iter()
            .max_by_key(|&(label, count)| (count, label))
            .map(|(label, _)| label);

        #[allow(clippy::cast_precision_loss)]
        let average_risk_score = score_sum / matched as f64;

        RouteScore {
            average_risk_score,
            dominant_label,
            sampled_points: points.len(),
            matched_points: matched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone as _, Utc};
    use street_risk_models::RiskRow;

    fn detail(id: &str, latitude: f64, longitude: f64, score: f64, label: RiskLabel) -> SegmentRiskDetail {
        SegmentRiskDetail {
            risk: RiskRow {
                segment_id: id.to_string(),
                cluster_id: 0,
                risk_label: label,
                risk_score: score,
                incident_density: score / 100.0,
                night_fraction: 0.0,
                window_incidents: 0,
                model_version: "kmeans_c1_v1".to_string(),
                summary: String::new(),
                updated_at: Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap(),
            },
            street_name: None,
            latitude,
            longitude,
        }
    }

    #[test]
    fn empty_route_scores_zero() {
        let index = RouteRiskIndex::new(vec![detail("S1", 47.6, -122.3, 0.5, RiskLabel::Medium)]);
        let score = index.score_route(&[]);

        assert_eq!(score.sampled_points, 0);
        assert_eq!(score.matched_points, 0);
        assert_eq!(score.dominant_label, None);
        assert!(score.average_risk_score.abs() < f64::EPSILON);
    }

    #[test]
    fn empty_index_scores_zero() {
        let index = RouteRiskIndex::new(Vec::new());
        let score = index.score_route(&[(47.6, -122.3)]);

        assert_eq!(score.sampled_points, 1);
        assert_eq!(score.matched_points, 0);
        assert_eq!(score.dominant_label, None);
    }

    #[test]
    fn averages_scores_along_the_route() {
        let index = RouteRiskIndex::new(vec![
            detail("low", 47.6000, -122.3000, 0.2, RiskLabel::Low),
            detail("high", 47.7000, -122.4000, 0.8, RiskLabel::High),
        ]);

        let score = index.score_route(&[(47.6001, -122.3001), (47.6999, -122.3999)]);

        assert_eq!(score.matched_points, 2);
        assert!((score.average_risk_score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn dominant_label_wins_by_sample_count() {
        let index = RouteRiskIndex::new(vec![
            detail("low", 47.6000, -122.3000, 0.1, RiskLabel::Low),
            detail("high", 47.7000, -122.4000, 0.9, RiskLabel::High),
        ]);

        let score = index.score_route(&[
            (47.6001, -122.3001),
            (47.6002, -122.3002),
            (47.6999, -122.3999),
        ]);

        assert_eq!(score.dominant_label, Some(RiskLabel::Low));
    }

    #[test]
    fn label_count_ties_go_to_the_higher_label() {
        let index = RouteRiskIndex::new(vec![
            detail("low", 47.6000, -122.3000, 0.1, RiskLabel::Low),
            detail("high", 47.7000, -122.4000, 0.9, RiskLabel::High),
        ]);

        let score = index.score_route(&[(47.6001, -122.3001), (47.6999, -122.3999)]);

        assert_eq!(score.dominant_label, Some(RiskLabel::High));
    }
}
