use std::collections::{HashMap, VecDeque};

use nalgebra as na;
use rayon::prelude::*;

use crate::types::PointIndexSet;

const NOISE: i32 = -1;
const UNVISITED: i32 = -2;

/// Uniform grid with `eps`-sized cells; a radius query only touches the 27
/// cells around the query point.
struct VoxelGrid {
    cell: f64,
    cells: HashMap<(i64, i64, i64), Vec<usize>>,
}

impl VoxelGrid {
    fn new(points: &[na::Point3<f64>], cell: f64) -> VoxelGrid {
        let mut cells: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            if let Some(key) = voxel_key(p, cell) {
                cells.entry(key).or_default().push(i);
            }
        }
        VoxelGrid { cell, cells }
    }

    fn neighbors(&self, points: &[na::Point3<f64>], i: usize, eps: f64) -> Vec<usize> {
        let p = &points[i];
        let Some((kx, ky, kz)) = voxel_key(p, self.cell) else {
            return Vec::new();
        };
        let eps2 = eps * eps;
        let mut out = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let (Some(x), Some(y), Some(z)) =
                        (kx.checked_add(dx), ky.checked_add(dy), kz.checked_add(dz))
                    else {
                        continue;
                    };
                    if let Some(bucket) = self.cells.get(&(x, y, z)) {
                        out.extend(
                            bucket
                                .iter()
                                .copied()
                                .filter(|&j| (points[j] - p).norm_squared() <= eps2),
                        );
                    }
                }
            }
        }
        out
    }
}

fn voxel_key(p: &na::Point3<f64>, cell: f64) -> Option<(i64, i64, i64)> {
    if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
        return None;
    }
    Some((
        (p.x / cell).floor() as i64,
        (p.y / cell).floor() as i64,
        (p.z / cell).floor() as i64,
    ))
}

/// DBSCAN over `points`.
///
/// Returns one label per point: `-1` for noise, otherwise a cluster id. Ids are
/// assigned in the order clusters are discovered while scanning `points`.
/// The neighbourhood of a point includes the point itself.
pub fn dbscan(points: &[na::Point3<f64>], eps: f64, min_points: usize) -> Vec<i32> {
    if points.is_empty() {
        return Vec::new();
    }
    if !(eps.is_finite() && eps > 0.0) {
        log::warn!("dbscan called with invalid eps {}, all points are noise", eps);
        return vec![NOISE; points.len()];
    }
    let grid = VoxelGrid::new(points, eps);
    let neighbors: Vec<Vec<usize>> = (0..points.len())
        .into_par_iter()
        .map(|i| grid.neighbors(points, i, eps))
        .collect();

    let mut labels = vec![UNVISITED; points.len()];
    let mut cluster_id = 0;
    for i in 0..points.len() {
        if labels[i] != UNVISITED {
            continue;
        }
        // a finite point is always its own neighbour, empty means non-finite
        if neighbors[i].is_empty() || neighbors[i].len() < min_points {
            labels[i] = NOISE;
            continue;
        }
        labels[i] = cluster_id;
        let mut queue: VecDeque<usize> = neighbors[i].iter().copied().collect();
        while let Some(j) = queue.pop_front() {
            if labels[j] == NOISE {
                // border point
                labels[j] = cluster_id;
            }
            if labels[j] != UNVISITED {
                continue;
            }
            labels[j] = cluster_id;
            if neighbors[j].len() >= min_points {
                queue.extend(neighbors[j].iter().copied());
            }
        }
        cluster_id += 1;
    }
    labels
}

/// Keeps only the largest density-connected cluster among `candidates`.
///
/// Clustering runs on the 3D positions of the candidate points. The winner is
/// the cluster with the most points; on a tie the cluster discovered first
/// (lowest id) wins. Returned indices refer to `cloud`, not to positions in
/// `candidates`, and keep the candidates' order. Empty when there are no
/// candidates or every point is noise.
pub fn extract_largest_cluster(
    cloud: &[na::Point3<f64>],
    candidates: &[usize],
    eps: f64,
    min_points: usize,
) -> PointIndexSet {
    let subset: Vec<na::Point3<f64>> = candidates
        .iter()
        .filter_map(|&i| cloud.get(i).copied())
        .collect();
    if subset.len() != candidates.len() {
        log::warn!(
            "{} candidate indices are out of range for a cloud of {} points",
            candidates.len() - subset.len(),
            cloud.len()
        );
        return Vec::new();
    }
    let labels = dbscan(&subset, eps, min_points);

    let mut counts: Vec<usize> = Vec::new();
    for &label in labels.iter().filter(|&&l| l >= 0) {
        let label = label as usize;
        if counts.len() <= label {
            counts.resize(label + 1, 0);
        }
        counts[label] += 1;
    }
    let Some((best, best_count)) = counts
        .iter()
        .enumerate()
        .fold(None, |acc: Option<(usize, usize)>, (label, &count)| match acc {
            Some((_, c)) if c >= count => acc,
            _ => Some((label, count)),
        })
    else {
        return Vec::new();
    };
    log::debug!(
        "dbscan found {} clusters, keeping cluster {} with {} of {} points",
        counts.len(),
        best,
        best_count,
        candidates.len()
    );
    candidates
        .iter()
        .zip(labels)
        .filter(|(_, label)| *label == best as i32)
        .map(|(&i, _)| i)
        .collect()
}
