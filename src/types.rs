use nalgebra as na;
use serde::{Deserialize, Serialize};

pub type ImageId = u64;
pub type ProjectId = u64;
pub type DatasetId = u64;
pub type PointCloudId = u64;

/// Indices into the original point array of a cloud.
pub type PointIndexSet = Vec<usize>;

/// Geometry of an annotation class.
///
/// Only the two kinds the sync cares about are named; everything else keeps its
/// wire name so metadata survives a round-trip untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Bitmap,
    Pointcloud,
    Other(String),
}

impl GeometryKind {
    pub fn as_str(&self) -> &str {
        match self {
            GeometryKind::Bitmap => "bitmap",
            GeometryKind::Pointcloud => "point_cloud",
            GeometryKind::Other(name) => name,
        }
    }
}

impl From<&str> for GeometryKind {
    fn from(value: &str) -> Self {
        match value {
            "bitmap" => GeometryKind::Bitmap,
            "point_cloud" => GeometryKind::Pointcloud,
            other => GeometryKind::Other(other.to_string()),
        }
    }
}

impl Serialize for GeometryKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GeometryKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(GeometryKind::from(s.as_str()))
    }
}

impl std::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One world point seen through the camera.
///
/// `index` is the row of the point in the source cloud; it is the join key
/// between projected and world-space data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub index: usize,
    pub position: na::Point3<f64>,
    pub u: f64,
    pub v: f64,
    pub z: f64,
}

/// A point cloud together with the calibration of one camera image.
#[derive(Debug, Clone)]
pub struct CalibratedFrame {
    pub points: Vec<na::Point3<f64>>,
    pub intrinsic: na::Matrix3<f64>,
    pub rotation: na::Matrix3<f64>,
    pub translation: na::Vector3<f64>,
    pub image_width: u32,
    pub image_height: u32,
}

impl CalibratedFrame {
    pub fn new(
        points: Vec<na::Point3<f64>>,
        calibration: &crate::calibration::Calibration,
        image_width: u32,
        image_height: u32,
    ) -> CalibratedFrame {
        CalibratedFrame {
            points,
            intrinsic: calibration.intrinsic,
            rotation: calibration.rotation,
            translation: calibration.translation,
            image_width,
            image_height,
        }
    }

    pub fn project(&self) -> Vec<ProjectedPoint> {
        crate::projection::project(
            &self.points,
            &self.intrinsic,
            &self.rotation,
            &self.translation,
        )
    }
}
