//! Cluster post-processing: merge undersized clusters, rebalance skewed groups.
//!
//! Both passes are idempotent. Merging only ever grows targets and removes
//! sources, so a cluster that found no target once never finds one on a rerun;
//! rebalancing leaves sizes within one of each other, which is below any
//! useful deviation threshold.

use std::collections::BTreeMap;

use tracing::{debug, error, info};

use crate::allocator::ClusterSizeViolation;
use crate::haversine::haversine_km;
use crate::model::{Candidate, Cluster, ClusterId};

#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessOptions {
    pub max_cluster_size: usize,
    /// Clusters smaller than this look for a merge target.
    pub min_merge_threshold: usize,
    /// Lower bound of the even size a rebalanced group may target.
    pub min_rebalance_target_size: usize,
    /// Sample standard deviation of sizes above which a group is rebalanced.
    pub rebalance_std_threshold: f64,
}

impl Default for PostProcessOptions {
    fn default() -> Self {
        Self {
            max_cluster_size: 60,
            min_merge_threshold: 20,
            min_rebalance_target_size: 40,
            rebalance_std_threshold: 10.0,
        }
    }
}

/// An undersized cluster left standalone because nothing nearby had room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeShortfall {
    pub cluster_id: ClusterId,
    pub area_code: String,
    pub size: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostProcessReport {
    pub merged: usize,
    pub shortfalls: Vec<MergeShortfall>,
    pub rebalanced_groups: usize,
    pub violations: Vec<ClusterSizeViolation>,
}

/// Run the merge pass, then the rebalance pass, then validate sizes.
pub fn post_process(clusters: &mut Vec<Cluster>, options: &PostProcessOptions) -> PostProcessReport {
    let (merged, shortfalls) = merge_small_clusters(clusters, options);
    let rebalanced_groups = rebalance_area_groups(clusters, options);
    let violations = validate_sizes(clusters, options.max_cluster_size);
    PostProcessReport {
        merged,
        shortfalls,
        rebalanced_groups,
        violations,
    }
}

/// Fold each cluster below the merge threshold into the nearest other
/// cluster (by centroid) that can absorb it without exceeding the maximum.
///
/// Returns the number of merges and the clusters left standalone.
pub fn merge_small_clusters(
    clusters: &mut Vec<Cluster>,
    options: &PostProcessOptions,
) -> (usize, Vec<MergeShortfall>) {
    let small: Vec<ClusterId> = clusters
        .iter()
        .filter(|c| c.len() < options.min_merge_threshold)
        .map(|c| c.id)
        .collect();
    if small.is_empty() {
        debug!("no small clusters to merge");
        return (0, Vec::new());
    }
    info!(count = small.len(), threshold = options.min_merge_threshold, "merging small clusters");

    let mut merged = 0;
    let mut shortfalls = Vec::new();

    for small_id in small {
        let Some(source) = clusters.iter().position(|c| c.id == small_id) else {
            continue;
        };
        let Some(center) = clusters[source].centroid() else {
            continue;
        };
        let size = clusters[source].len();
        if size >= options.min_merge_threshold {
            // Grew past the threshold by absorbing another cluster.
            continue;
        }

        let target = clusters
            .iter()
            .enumerate()
            .filter(|(index, candidate)| {
                *index != source && candidate.len() + size <= options.max_cluster_size
            })
            .filter_map(|(index, candidate)| {
                candidate.centroid().map(|c| (index, haversine_km(center, c)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match target {
            Some((target, distance_km)) => {
                let absorbed = clusters.remove(source);
                let target = if target > source { target - 1 } else { target };
                debug!(
                    from = %absorbed.id,
                    into = %clusters[target].id,
                    size,
                    new_size = clusters[target].len() + size,
                    distance_km,
                    "merged cluster"
                );
                clusters[target].members.extend(absorbed.members);
                merged += 1;
            }
            None => {
                let shortfall = MergeShortfall {
                    cluster_id: small_id,
                    area_code: clusters[source].area_code.clone(),
                    size,
                };
                info!(cluster = %small_id, size, "no merge target with room; keeping undersized cluster");
                shortfalls.push(shortfall);
            }
        }
    }

    info!(merged, skipped = shortfalls.len(), remaining = clusters.len(), "merge pass done");
    (merged, shortfalls)
}

/// Even out member counts inside each same-area group of clusters.
///
/// A group qualifies when it has at least two clusters, the sample standard
/// deviation of its sizes exceeds the threshold, and the even size falls in
/// `min_rebalance_target_size..=max_cluster_size`. Members are ordered by
/// (cluster, lat, lon) and dealt out in contiguous runs so each cluster keeps
/// a coarse spatial neighbourhood. Cluster count never changes.
///
/// Returns the number of groups rebalanced.
pub fn rebalance_area_groups(clusters: &mut [Cluster], options: &PostProcessOptions) -> usize {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, cluster) in clusters.iter().enumerate() {
        groups.entry(cluster.area_code.clone()).or_default().push(index);
    }

    let mut rebalanced = 0;
    for (area_code, indices) in groups {
        if indices.len() < 2 {
            continue;
        }
        let sizes: Vec<usize> = indices.iter().map(|i| clusters[*i].len()).collect();
        let deviation = sample_std_dev(&sizes);
        if deviation <= options.rebalance_std_threshold {
            continue;
        }

        let total: usize = sizes.iter().sum();
        let count = indices.len();
        let even = total / count;
        if even < options.min_rebalance_target_size.max(1) || even > options.max_cluster_size {
            debug!(area = %area_code, even, "even size outside target range; not rebalancing");
            continue;
        }

        let mut ordered = indices;
        ordered.sort_by_key(|i| clusters[*i].id);

        let mut pool: Vec<(ClusterId, Candidate)> = Vec::with_capacity(total);
        for index in &ordered {
            let cluster = &mut clusters[*index];
            let id = cluster.id;
            pool.extend(cluster.members.drain(..).map(|member| (id, member)));
        }
        pool.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.lat.total_cmp(&b.1.lat))
                .then(a.1.lon.total_cmp(&b.1.lon))
        });

        let extra = total % count;
        let mut members = pool.into_iter().map(|(_, member)| member);
        for (slot, index) in ordered.iter().enumerate() {
            let share = even + usize::from(slot < extra);
            clusters[*index].members.extend(members.by_ref().take(share));
        }

        info!(
            area = %area_code,
            clusters = count,
            before_min = sizes.iter().min().copied().unwrap_or_default(),
            before_max = sizes.iter().max().copied().unwrap_or_default(),
            std_dev = deviation,
            even,
            "rebalanced area group"
        );
        rebalanced += 1;
    }

    rebalanced
}

/// Report every cluster outside `1..=max_cluster_size`.
pub fn validate_sizes(clusters: &[Cluster], max_cluster_size: usize) -> Vec<ClusterSizeViolation> {
    clusters
        .iter()
        .filter(|c| c.is_empty() || c.len() > max_cluster_size)
        .map(|c| {
            error!(cluster = %c.id, size = c.len(), max = max_cluster_size, "cluster size out of bounds");
            ClusterSizeViolation {
                cluster_id: c.id,
                area_code: c.area_code.clone(),
                size: c.len(),
                max: max_cluster_size,
            }
        })
        .collect()
}

fn sample_std_dev(values: &[usize]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<usize>() as f64 / n;
    let variance = values
        .iter()
        .map(|v| (*v as f64 - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    variance.sqrt()
}
