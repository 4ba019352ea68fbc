use crate::mask::RasterMask;
use crate::types::{PointIndexSet, ProjectedPoint};

/// Returns the indices of projected points that land on a set mask pixel.
///
/// A point counts when its floored pixel lies in `[0, width) x [0, height)`,
/// it is strictly in front of the camera and the mask is set at
/// `(row = floor(v), col = floor(u))`. Non-finite coordinates never pass.
/// The result is ascending because `projected` is in index order.
pub fn points_inside_mask(
    projected: &[ProjectedPoint],
    mask: &RasterMask,
    width: u32,
    height: u32,
) -> PointIndexSet {
    projected
        .iter()
        .filter_map(|p| {
            let pixel = pixel_of(p, width, height)?;
            if mask.get(pixel.1, pixel.0)? {
                Some(p.index)
            } else {
                None
            }
        })
        .collect()
}

/// Floored `(col, row)` of a point in front of the camera, if inside the image.
fn pixel_of(p: &ProjectedPoint, width: u32, height: u32) -> Option<(usize, usize)> {
    // NaN fails every comparison, so `z > 0.0` also drops NaN depth
    if !(p.z > 0.0) {
        return None;
    }
    let x = p.u.floor();
    let y = p.v.floor();
    if !(x >= 0.0 && x < width as f64 && y >= 0.0 && y < height as f64) {
        return None;
    }
    Some((x as usize, y as usize))
}
