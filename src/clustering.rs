//! Size-constrained spatial clustering.
//!
//! [`BalancedKMeans`] is Lloyd's k-means with a capacity-aware assignment
//! step. Every assignment round first seeds each group with its nearest free
//! point and then hands out the remaining points closest-pair-first to groups
//! that still have room, so the `1..=max_size` bound holds on every
//! iteration rather than being repaired afterwards.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::ClusteringError;
use crate::traits::Clusterer;

pub const DEFAULT_SEED: u64 = 42;
const DEFAULT_MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone)]
pub struct BalancedKMeans {
    pub seed: u64,
    pub max_iterations: usize,
}

impl Default for BalancedKMeans {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl BalancedKMeans {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}

impl Clusterer for BalancedKMeans {
    fn partition(
        &self,
        points: &[(f64, f64)],
        max_size: usize,
    ) -> Result<Vec<Vec<usize>>, ClusteringError> {
        if max_size == 0 {
            return Err(ClusteringError::Degenerate("max_size must be positive".to_string()));
        }
        if points.iter().any(|(lat, lon)| !lat.is_finite() || !lon.is_finite()) {
            return Err(ClusteringError::Degenerate("non-finite coordinate".to_string()));
        }

        let n = points.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        if n <= max_size {
            return Ok(vec![(0..n).collect()]);
        }

        let k = n.div_ceil(max_size);
        let projected = project(points);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut centroids = kmeans_plus_plus(&projected, k, &mut rng);

        let mut labels = balanced_assign(&projected, &centroids, max_size);
        for _ in 0..self.max_iterations {
            centroids = recompute_centroids(&projected, &labels, k);
            let next = balanced_assign(&projected, &centroids, max_size);
            if next == labels {
                break;
            }
            labels = next;
        }

        let mut groups = vec![Vec::new(); k];
        for (point, label) in labels.iter().enumerate() {
            groups[*label].push(point);
        }
        validate_partition(groups, max_size)
    }
}

/// Check every group is within `1..=max_size`.
pub fn validate_partition(
    groups: Vec<Vec<usize>>,
    max_size: usize,
) -> Result<Vec<Vec<usize>>, ClusteringError> {
    let breach = groups
        .iter()
        .enumerate()
        .find(|(_, group)| group.is_empty() || group.len() > max_size)
        .map(|(index, group)| (index, group.len()));

    match breach {
        Some((group, size)) => Err(ClusteringError::ConstraintViolation {
            partition: groups,
            group,
            size,
            max: max_size,
        }),
        None => Ok(groups),
    }
}

/// Equirectangular projection around the mean latitude, good enough for
/// comparing distances inside one area.
fn project(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mean_lat = points.iter().map(|(lat, _)| lat).sum::<f64>() / points.len() as f64;
    let scale = mean_lat.to_radians().cos();
    points.iter().map(|(lat, lon)| (*lat, lon * scale)).collect()
}

fn squared_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dy = a.0 - b.0;
    let dx = a.1 - b.1;
    dx * dx + dy * dy
}

fn kmeans_plus_plus(points: &[(f64, f64)], k: usize, rng: &mut ChaCha8Rng) -> Vec<(f64, f64)> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);

    let mut nearest: Vec<f64> = points
        .iter()
        .map(|point| squared_distance(*point, centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = nearest.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen_range(0.0..total);
            let mut chosen = points.len() - 1;
            for (index, weight) in nearest.iter().enumerate() {
                if target < *weight {
                    chosen = index;
                    break;
                }
                target -= weight;
            }
            chosen
        } else {
            // All points coincide with a centroid already.
            rng.gen_range(0..points.len())
        };

        let centroid = points[chosen];
        centroids.push(centroid);
        for (index, point) in points.iter().enumerate() {
            nearest[index] = nearest[index].min(squared_distance(*point, centroid));
        }
    }

    centroids
}

/// Assign every point to a group while respecting `1..=max_size`.
///
/// Requires `centroids.len() <= points.len() <= centroids.len() * max_size`.
fn balanced_assign(points: &[(f64, f64)], centroids: &[(f64, f64)], max_size: usize) -> Vec<usize> {
    let k = centroids.len();
    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut sizes = vec![0usize; k];

    // Floor: every group takes its nearest free point.
    for (group, centroid) in centroids.iter().enumerate() {
        let nearest_free = points
            .iter()
            .enumerate()
            .filter(|(index, _)| labels[*index].is_none())
            .min_by(|(_, a), (_, b)| {
                squared_distance(**a, *centroid).total_cmp(&squared_distance(**b, *centroid))
            })
            .map(|(index, _)| index);
        if let Some(index) = nearest_free {
            labels[index] = Some(group);
            sizes[group] += 1;
        }
    }

    let mut pairs: Vec<(f64, usize, usize)> = Vec::with_capacity(points.len() * k);
    for (index, point) in points.iter().enumerate() {
        if labels[index].is_some() {
            continue;
        }
        for (group, centroid) in centroids.iter().enumerate() {
            pairs.push((squared_distance(*point, *centroid), index, group));
        }
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    for (_, index, group) in pairs {
        if labels[index].is_none() && sizes[group] < max_size {
            labels[index] = Some(group);
            sizes[group] += 1;
        }
    }

    // Total room is k * max_size >= n, so every point has a label.
    labels.into_iter().map(|label| label.unwrap_or(0)).collect()
}

fn recompute_centroids(points: &[(f64, f64)], labels: &[usize], k: usize) -> Vec<(f64, f64)> {
    let mut sums = vec![(0.0, 0.0); k];
    let mut counts = vec![0usize; k];
    for (point, label) in points.iter().zip(labels) {
        sums[*label].0 += point.0;
        sums[*label].1 += point.1;
        counts[*label] += 1;
    }
    sums.into_iter()
        .zip(counts)
        .map(|((y, x), count)| {
            let count = count.max(1) as f64;
            (y / count, x / count)
        })
        .collect()
}
