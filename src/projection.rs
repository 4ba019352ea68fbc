use nalgebra as na;
use rayon::prelude::*;

use crate::types::ProjectedPoint;

/// Projects world points into the image plane of a pinhole camera.
///
/// Each point is moved to the camera frame with `R * p + T` and mapped to pixels
/// with the focal lengths and principal point of `k`. Output row `i` always
/// belongs to input row `i`. Points at zero depth are not filtered here: their
/// `u`/`v` come out non-finite and are rejected by the mask filter.
pub fn project(
    points: &[na::Point3<f64>],
    k: &na::Matrix3<f64>,
    r: &na::Matrix3<f64>,
    t: &na::Vector3<f64>,
) -> Vec<ProjectedPoint> {
    let fx = k[(0, 0)];
    let fy = k[(1, 1)];
    let cx = k[(0, 2)];
    let cy = k[(1, 2)];
    points
        .par_iter()
        .enumerate()
        .map(|(index, p)| {
            let pc = r * p.coords + t;
            ProjectedPoint {
                index,
                position: *p,
                u: fx * pc.x / pc.z + cx,
                v: fy * pc.y / pc.z + cy,
                z: pc.z,
            }
        })
        .collect()
}
