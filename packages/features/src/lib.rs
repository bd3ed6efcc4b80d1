#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident-to-segment assignment and per-segment feature engineering.
//!
//! Maps each incident to its nearest street segment, tags it with temporal
//! buckets (night/day, recent/previous), then aggregates the assignments
//! into one feature row per segment. Segments with no assigned incidents
//! are retained with zero-filled counts — the downstream clusterer needs
//! the full segment population, not just the active part of it.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime, Timelike as _};
use street_risk_models::{Assignment, Incident, Segment, SegmentFeatures};
use street_risk_spatial::SegmentIndex;

/// Length assumed for segments whose source row carries no length.
pub const DEFAULT_SEGMENT_LENGTH_M: f64 = 100.0;

/// Floor applied to segment lengths before density division.
pub const MIN_EFFECTIVE_LENGTH_M: f64 = 50.0;

/// Temporal cutoffs for one scoring run, derived once from "now".
///
/// The recency comparisons use the incidents' stored naive timestamps
/// directly; `now` must therefore be naive UTC to match them.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindows {
    recent_cutoff: NaiveDateTime,
    previous_cutoff: NaiveDateTime,
}

impl TimeWindows {
    /// Derives the recent/previous cutoffs from `now`.
    #[must_use]
    pub fn new(now: NaiveDateTime, lookback_days: i64, recent_days: i64) -> Self {
        Self {
            recent_cutoff: now - Duration::days(recent_days),
            previous_cutoff: now - Duration::days(lookback_days),
        }
    }

    /// Start of the lookback window (everything older is out of scope).
    #[must_use]
    pub const fn window_start(&self) -> NaiveDateTime {
        self.previous_cutoff
    }
}

/// Whether an hour-of-day falls in the night bucket (22:00–05:59).
const fn is_night_hour(hour: u32) -> bool {
    matches!(hour, 22 | 23 | 0..=5)
}

/// Maps each incident to its nearest segment and tags it with temporal
/// buckets.
///
/// Returns one [`Assignment`] per incident. Zero incidents or zero segments
/// produce an empty set, not an error.
#[must_use]
pub fn assign_incidents(
    segments: &[Segment],
    incidents: &[Incident],
    index: &SegmentIndex,
    windows: &TimeWindows,
) -> Vec<Assignment> {
    if segments.is_empty() || incidents.is_empty() {
        return Vec::new();
    }

    let mut assignments = Vec::with_capacity(incidents.len());

    for incident in incidents {
        let Some(nearest) = index.nearest(incident.latitude, incident.longitude) else {
            continue;
        };

        let occurred = incident.occurred_at;
        assignments.push(Assignment {
            segment_id: segments[nearest].segment_id.clone(),
            night: is_night_hour(occurred.hour()),
            recent: occurred >= windows.recent_cutoff,
            previous: occurred >= windows.previous_cutoff && occurred < windows.recent_cutoff,
        });
    }

    assignments
}

/// Per-segment assignment counts accumulated before the feature join.
#[derive(Debug, Default, Clone, Copy)]
struct AssignmentCounts {
    total: u64,
    night: u64,
    recent: u64,
    previous: u64,
}

/// Aggregates assignments into one [`SegmentFeatures`] row per segment.
///
/// Every segment in `segments` appears exactly once in the output; segments
/// with no assignments get zero counts, density 0.0, night fraction 0.0,
/// and trend ratio 1.0.
#[must_use]
pub fn build_features(segments: &[Segment], assignments: &[Assignment]) -> Vec<SegmentFeatures> {
    let mut counts: BTreeMap<&str, AssignmentCounts> = BTreeMap::new();

    for assignment in assignments {
        let entry = counts.entry(assignment.segment_id.as_str()).or_default();
        entry.total += 1;
        entry.night += u64::from(assignment.night);
        entry.recent += u64::from(assignment.recent);
        entry.previous += u64::from(assignment.previous);
    }

    segments
        .iter()
        .map(|segment| {
            let c = counts
                .get(segment.segment_id.as_str())
                .copied()
                .unwrap_or_default();

            let effective_length = segment
                .length_m
                .unwrap_or(DEFAULT_SEGMENT_LENGTH_M)
                .max(MIN_EFFECTIVE_LENGTH_M);

            #[allow(clippy::cast_precision_loss)]
            let incident_density = c.total as f64 / effective_length;

            #[allow(clippy::cast_precision_loss)]
            let night_fraction = if c.total > 0 {
                c.night as f64 / c.total as f64
            } else {
                0.0
            };

            #[allow(clippy::cast_precision_loss)]
            let trend_ratio = (c.recent as f64 + 1.0) / (c.previous as f64 + 1.0);

            SegmentFeatures {
                segment_id: segment.segment_id.clone(),
                street_name: segment.street_name.clone(),
                latitude: segment.latitude,
                longitude: segment.longitude,
                window_incidents: c.total,
                night_incidents: c.night,
                recent_incidents: c.recent,
                previous_incidents: c.previous,
                effective_length,
                incident_density,
                night_fraction,
                trend_ratio,
            }
        })
        .collect()
}
