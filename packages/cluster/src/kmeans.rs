//! Seeded k-means (Lloyd's algorithm) with random restarts.
//!
//! Partitions N feature vectors into K groups minimizing within-group
//! variance. The RNG is seeded by the caller, so a fixed seed gives a
//! reproducible partition for identical input; restarts draw from the same
//! RNG sequentially and the lowest-inertia run wins.

use rand::SeedableRng as _;
use rand::rngs::StdRng;
use rand::seq::index::sample;

/// Iteration cap per restart. Lloyd's converges far earlier in practice.
const MAX_ITERATIONS: usize = 300;

/// Result of one k-means fit.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Cluster index in `0..k` for each input row.
    pub assignments: Vec<usize>,
    /// Sum of squared distances from each row to its assigned centroid.
    pub inertia: f64,
}

/// Standardizes each column to zero mean and unit variance over the rows.
///
/// Zero-variance columns map to all zeros rather than dividing by ~0. The
/// scaling is population-relative: the same row can scale differently when
/// the surrounding population shifts.
#[must_use]
pub fn standardize(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let dims = first.len();

    #[allow(clippy::cast_precision_loss)]
    let n = rows.len() as f64;

    let mut means = vec![0.0; dims];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut means {
        *m /= n;
    }

    let mut stds = vec![0.0; dims];
    for row in rows {
        for ((s, v), m) in stds.iter_mut().zip(row).zip(&means) {
            *s += (v - m) * (v - m);
        }
    }
    for s in &mut stds {
        *s = (*s / n).sqrt();
    }

    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&means)
                .zip(&stds)
                .map(|((v, m), s)| if *s > 1e-12 { (v - m) / s } else { 0.0 })
                .collect()
        })
        .collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest_centroid(row: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = 0;
    let mut best_dist = f64::MAX;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(row, centroid);
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    (best, best_dist)
}

/// One Lloyd's run from the given initial centroids.
fn lloyd(rows: &[Vec<f64>], mut centroids: Vec<Vec<f64>>) -> KMeansFit {
    let dims = rows[0].len();
    let mut assignments = vec![0usize; rows.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, row) in rows.iter().enumerate() {
            let (nearest, _) = nearest_centroid(row, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0; dims]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (row, &cluster) in rows.iter().zip(&assignments) {
            counts[cluster] += 1;
            for (s, v) in sums[cluster].iter_mut().zip(row) {
                *s += v;
            }
        }
        for (cluster, sum) in sums.into_iter().enumerate() {
            // An emptied cluster keeps its previous centroid.
            if counts[cluster] > 0 {
                #[allow(clippy::cast_precision_loss)]
                let count = counts[cluster] as f64;
                centroids[cluster] = sum.into_iter().map(|s| s / count).collect();
            }
        }

        if !changed {
            break;
        }
    }

    let inertia = rows
        .iter()
        .zip(&assignments)
        .map(|(row, &cluster)| squared_distance(row, &centroids[cluster]))
        .sum();

    KMeansFit {
        assignments,
        inertia,
    }
}

/// Partitions `rows` into `k` clusters, keeping the best of `n_init`
/// seeded random restarts.
///
/// With fewer rows than `k` the partition is best-effort: only as many
/// clusters as rows are seeded and the rest stay empty. Empty input or
/// `k == 0` yields an empty assignment vector.
#[must_use]
pub fn kmeans(rows: &[Vec<f64>], k: usize, n_init: u32, seed: u64) -> Vec<usize> {
    if rows.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let centers = k.min(rows.len());

    let mut best: Option<KMeansFit> = None;
    for _ in 0..n_init.max(1) {
        let initial: Vec<Vec<f64>> = sample(&mut rng, rows.len(), centers)
            .iter()
            .map(|i| rows[i].clone())
            .collect();

        let fit = lloyd(rows, initial);
        if best.as_ref().is_none_or(|b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }

    best.map(|fit| fit.assignments).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0, 0.0],
            vec![0.1, 0.0, 0.1],
            vec![0.0, 0.1, 0.0],
            vec![10.0, 10.0, 10.0],
            vec![10.1, 10.0, 9.9],
            vec![9.9, 10.1, 10.0],
        ]
    }

    #[test]
    fn standardize_produces_zero_mean() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0], vec![5.0, 5.0]];
        let scaled = standardize(&rows);

        let mean0: f64 = scaled.iter().map(|r| r[0]).sum::<f64>() / 3.0;
        assert!(mean0.abs() < 1e-12);
        // Zero-variance column collapses to zeros instead of dividing by ~0.
        assert!(scaled.iter().all(|r| r[1].abs() < 1e-12));
    }

    #[test]
    fn separates_well_spaced_blobs() {
        let assignments = kmeans(&two_blobs(), 2, 10, 42);

        assert_eq!(assignments[0], assignments[1]);
        assert_eq!(assignments[1], assignments[2]);
        assert_eq!(assignments[3], assignments[4]);
        assert_eq!(assignments[4], assignments[5]);
        assert_ne!(assignments[0], assignments[3]);
    }

    #[test]
    fn same_seed_same_partition() {
        let rows = two_blobs();
        assert_eq!(kmeans(&rows, 3, 10, 42), kmeans(&rows, 3, 10, 42));
    }

    #[test]
    fn fewer_rows_than_clusters_is_best_effort() {
        let rows = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let assignments = kmeans(&rows, 3, 10, 42);

        assert_eq!(assignments.len(), 2);
        assert_ne!(assignments[0], assignments[1]);
        assert!(assignments.iter().all(|&c| c < 3));
    }

    #[test]
    fn empty_input_yields_empty_assignments() {
        assert!(kmeans(&[], 3, 10, 42).is_empty());
    }
}
