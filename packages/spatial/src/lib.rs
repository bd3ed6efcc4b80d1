#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory nearest-segment index for incident attribution.
//!
//! Builds an R-tree over segment midpoints once per scoring run and answers
//! nearest-neighbor queries under great-circle distance. Midpoints are
//! embedded on the unit sphere as 3-D chord vectors: straight-line (chord)
//! distance between two points on the sphere is strictly monotonic in the
//! arc between them, so Euclidean nearest-neighbor on the embedding is
//! exactly great-circle nearest-neighbor on the globe.

use rstar::{RTree, primitives::GeomWithData};
use street_risk_models::Segment;

/// Mean Earth radius in meters, used to convert arcs to distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A segment midpoint on the unit sphere, tagged with its index into the
/// segment slice the tree was built from.
type IndexedMidpoint = GeomWithData<[f64; 3], usize>;

/// Projects a latitude/longitude pair (degrees) onto the unit sphere.
fn unit_sphere(latitude: f64, longitude: f64) -> [f64; 3] {
    let lat = latitude.to_radians();
    let lng = longitude.to_radians();
    [lat.cos() * lng.cos(), lat.cos() * lng.sin(), lat.sin()]
}

/// Converts a squared chord length on the unit sphere to meters of arc.
fn chord_sq_to_meters(chord_sq: f64) -> f64 {
    // chord = 2 sin(arc / 2), so arc = 2 asin(chord / 2). Clamp guards
    // against floating-point drift pushing the ratio past 1.
    let half_chord = (chord_sq.max(0.0).sqrt() / 2.0).clamp(0.0, 1.0);
    2.0 * half_chord.asin() * EARTH_RADIUS_METERS
}

/// Pre-built nearest-segment index over street midpoints.
///
/// Constructed once per run (O(N log N) bulk load) and queried once per
/// incident (O(log N) expected). Exact ties are broken by tree traversal
/// order, which is stable for identical input.
pub struct SegmentIndex {
    tree: RTree<IndexedMidpoint>,
}

impl SegmentIndex {
    /// Builds the index over the given segments' midpoints.
    ///
    /// Query results are indices into this same slice.
    #[must_use]
    pub fn build(segments: &[Segment]) -> Self {
        let midpoints: Vec<IndexedMidpoint> = segments
            .iter()
            .enumerate()
            .map(|(i, s)| GeomWithData::new(unit_sphere(s.latitude, s.longitude), i))
            .collect();

        let tree = RTree::bulk_load(midpoints);
        log::debug!("Built segment index over {} midpoints", tree.size());

        Self { tree }
    }

    /// Returns the index of the segment whose midpoint is nearest to the
    /// given point by great-circle distance, or `None` for an empty index.
    #[must_use]
    pub fn nearest(&self, latitude: f64, longitude: f64) -> Option<usize> {
        self.tree
            .nearest_neighbor(&unit_sphere(latitude, longitude))
            .map(|p| p.data)
    }

    /// Like [`Self::nearest`], but also returns the great-circle distance to
    /// the matched midpoint in meters.
    #[must_use]
    pub fn nearest_with_distance(&self, latitude: f64, longitude: f64) -> Option<(usize, f64)> {
        let query = unit_sphere(latitude, longitude);
        self.tree.nearest_neighbor(&query).map(|p| {
            let chord_sq = p
                .geom()
                .iter()
                .zip(query.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>();
            (p.data, chord_sq_to_meters(chord_sq))
        })
    }

    /// Number of indexed midpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index contains no midpoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: &str, latitude: f64, longitude: f64) -> Segment {
        Segment {
            segment_id: id.to_string(),
            street_name: None,
            length_m: None,
            latitude,
            longitude,
        }
    }

    #[test]
    fn empty_index_returns_none() {
        let index = SegmentIndex::build(&[]);
        assert!(index.is_empty());
        assert_eq!(index.nearest(47.6, -122.3), None);
    }

    #[test]
    fn picks_the_nearer_midpoint() {
        let segments = vec![
            segment("S1", 47.6000, -122.3000),
            segment("S2", 47.7000, -122.4000),
        ];
        let index = SegmentIndex::build(&segments);

        assert_eq!(index.nearest(47.6010, -122.3010), Some(0));
        assert_eq!(index.nearest(47.6990, -122.3990), Some(1));
    }

    #[test]
    fn great_circle_beats_naive_degree_distance() {
        // At 60°N a degree of longitude covers half the ground distance of
        // a degree of latitude. A flat-earth index over raw degrees would
        // pick the longitude-offset midpoint here; the sphere embedding
        // must pick the latitude-offset one.
        let segments = vec![
            segment("lat-offset", 60.9, 0.0),
            segment("lng-offset", 60.0, 1.1),
        ];
        let index = SegmentIndex::build(&segments);

        assert_eq!(index.nearest(60.0, 0.0), Some(1));
    }

    #[test]
    fn distance_is_roughly_correct() {
        // One degree of latitude is ~111 km of arc everywhere.
        let segments = vec![segment("S1", 48.0, -122.0)];
        let index = SegmentIndex::build(&segments);

        let (idx, meters) = index.nearest_with_distance(47.0, -122.0).unwrap();
        assert_eq!(idx, 0);
        assert!((meters - 111_195.0).abs() < 100.0, "got {meters}");
    }

    #[test]
    fn zero_distance_at_the_midpoint_itself() {
        let segments = vec![segment("S1", 47.6, -122.3)];
        let index = SegmentIndex::build(&segments);

        let (_, meters) = index.nearest_with_distance(47.6, -122.3).unwrap();
        assert!(meters.abs() < 1e-6);
    }
}
