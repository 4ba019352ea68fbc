use nalgebra as na;
use serde_json::Value;

use crate::error::{SyncError, SyncResult};

/// Pinhole calibration of a context image relative to its point cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub intrinsic: na::Matrix3<f64>,
    pub rotation: na::Matrix3<f64>,
    pub translation: na::Vector3<f64>,
}

impl Calibration {
    /// Builds a calibration from row-major flat arrays.
    ///
    /// `extrinsic` is a 3x4 `[R | T]` matrix (12 values), `intrinsic` a 3x3
    /// camera matrix (9 values).
    pub fn from_flat(extrinsic: &[f64], intrinsic: &[f64]) -> SyncResult<Calibration> {
        if extrinsic.len() != 12 {
            return Err(SyncError::Calibration(format!(
                "extrinsic matrix needs 12 values, got {}",
                extrinsic.len()
            )));
        }
        if intrinsic.len() != 9 {
            return Err(SyncError::Calibration(format!(
                "intrinsic matrix needs 9 values, got {}",
                intrinsic.len()
            )));
        }
        let extrinsic = na::Matrix3x4::from_row_slice(extrinsic);
        let rotation: na::Matrix3<f64> = extrinsic.fixed_view::<3, 3>(0, 0).into_owned();
        let translation: na::Vector3<f64> = extrinsic.column(3).into_owned();
        Ok(Calibration {
            intrinsic: na::Matrix3::from_row_slice(intrinsic),
            rotation,
            translation,
        })
    }

    /// Reads the calibration stored on an image's metadata.
    ///
    /// Returns `Ok(None)` when the image carries no sensor data at all, and an
    /// error when it does but the matrices are malformed.
    pub fn from_image_meta(meta: &Value) -> SyncResult<Option<Calibration>> {
        let Some(sensors) = meta.pointer("/meta/meta/sensorsData") else {
            return Ok(None);
        };
        let extrinsic = matrix_values(sensors, "extrinsicMatrix")?;
        let intrinsic = matrix_values(sensors, "intrinsicMatrix")?;
        match (extrinsic, intrinsic) {
            (Some(e), Some(i)) => Calibration::from_flat(&e, &i).map(Some),
            _ => Ok(None),
        }
    }
}

fn matrix_values(sensors: &Value, key: &str) -> SyncResult<Option<Vec<f64>>> {
    let Some(value) = sensors.get(key) else {
        return Ok(None);
    };
    let Some(array) = value.as_array() else {
        return Err(SyncError::Calibration(format!("{} is not an array", key)));
    };
    // nested [[..],[..]] layouts are flattened row by row
    let mut out = Vec::with_capacity(12);
    for v in array {
        match v {
            Value::Array(row) => {
                for x in row {
                    out.push(number(x, key)?);
                }
            }
            x => out.push(number(x, key)?),
        }
    }
    Ok(Some(out))
}

fn number(v: &Value, key: &str) -> SyncResult<f64> {
    v.as_f64()
        .ok_or_else(|| SyncError::Calibration(format!("{} contains a non-numeric value", key)))
}
