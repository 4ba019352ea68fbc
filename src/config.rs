use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Neighbourhood radius, in point cloud units.
    pub eps: f64,
    /// Neighbours (the point included) needed for a dense region.
    pub min_points: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            eps: 1.5,
            min_points: 100,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> SyncResult<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(SyncError::Config(format!(
                "cluster eps must be a positive number, got {}",
                self.eps
            )));
        }
        if self.min_points == 0 {
            return Err(SyncError::Config("cluster min_points must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Keep only the largest DBSCAN cluster of the points inside each mask.
    pub apply_clustering: bool,
    pub cluster: ClusterConfig,
    /// Where downloaded point clouds are kept.
    pub cache_dir: PathBuf,
    /// Empty `cache_dir` on startup.
    pub clean_cache_dir: bool,
    pub pointcloud_ext: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            apply_clustering: false,
            cluster: ClusterConfig::default(),
            cache_dir: PathBuf::from("app_data"),
            clean_cache_dir: true,
            pointcloud_ext: ".pcd".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> SyncResult<()> {
        if self.apply_clustering {
            self.cluster.validate()?;
        }
        if !self.pointcloud_ext.starts_with('.') {
            return Err(SyncError::Config(format!(
                "pointcloud_ext must start with '.', got '{}'",
                self.pointcloud_ext
            )));
        }
        Ok(())
    }
}
