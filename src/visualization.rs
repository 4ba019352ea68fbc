use nalgebra as na;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rerun::RecordingStream;

use crate::types::{PointIndexSet, ProjectedPoint};

pub fn id_to_color(id: usize) -> (u8, u8, u8, u8) {
    let mut rng = ChaCha8Rng::seed_from_u64(id as u64);
    let color_num = rng.random_range(0..2u32.pow(24));
    (
        ((color_num >> 16) % 256) as u8,
        ((color_num >> 8) % 256) as u8,
        (color_num % 256) as u8,
        255,
    )
}

/// rerun use top left corner as (0, 0)
pub fn rerun_shift(p2ds: &[(f32, f32)]) -> Vec<(f32, f32)> {
    p2ds.iter().map(|(x, y)| (*x + 0.5, *y + 0.5)).collect()
}

fn depth_color(z: f64, max_depth: f64) -> (u8, u8, u8, u8) {
    let t = if max_depth > 0.0 { (z / max_depth).clamp(0.0, 1.0) } else { 0.0 };
    let c = colorous::TURBO.eval_continuous(t);
    (c.r, c.g, c.b, 255)
}

/// Logs the points that land inside the image, colored by depth.
pub fn log_projection(
    recording: &RecordingStream,
    topic: &str,
    projected: &[ProjectedPoint],
    width: u32,
    height: u32,
) -> Result<(), rerun::RecordingStreamError> {
    let visible: Vec<&ProjectedPoint> = projected
        .iter()
        .filter(|p| {
            p.z > 0.0 && p.u >= 0.0 && p.v >= 0.0 && p.u < width as f64 && p.v < height as f64
        })
        .collect();
    let max_depth = visible.iter().map(|p| p.z).fold(0.0, f64::max);
    let (pts, colors): (Vec<_>, Vec<_>) = visible
        .iter()
        .map(|p| ((p.u as f32, p.v as f32), depth_color(p.z, max_depth)))
        .unzip();
    let pts = rerun_shift(&pts);
    recording.log(
        format!("{}/projection", topic),
        &rerun::Points2D::new(pts)
            .with_colors(colors)
            .with_radii([rerun::Radius::new_ui_points(1.0)]),
    )
}

/// Logs the full cloud in grey and every selection in its own color.
pub fn log_selections(
    recording: &RecordingStream,
    topic: &str,
    cloud: &[na::Point3<f64>],
    selections: &[(String, PointIndexSet)],
) -> Result<(), rerun::RecordingStreamError> {
    let all: Vec<(f32, f32, f32)> = cloud
        .iter()
        .filter(|p| p.coords.iter().all(|c| c.is_finite()))
        .map(|p| (p.x as f32, p.y as f32, p.z as f32))
        .collect();
    recording.log(
        format!("{}/cloud", topic),
        &rerun::Points3D::new(all)
            .with_colors([(128u8, 128u8, 128u8, 255u8)])
            .with_radii([rerun::Radius::new_ui_points(1.0)]),
    )?;
    for (i, (name, indices)) in selections.iter().enumerate() {
        let pts: Vec<(f32, f32, f32)> = indices
            .iter()
            .filter_map(|&idx| cloud.get(idx))
            .map(|p| (p.x as f32, p.y as f32, p.z as f32))
            .collect();
        recording.log(
            format!("{}/objects/{}_{}", topic, i, name),
            &rerun::Points3D::new(pts)
                .with_colors([id_to_color(i)])
                .with_radii([rerun::Radius::new_ui_points(3.0)]),
        )?;
    }
    Ok(())
}
