//! Interfaces of the remote collaborators the sync talks to, and the records
//! exchanged with them.

use std::path::Path;

use nalgebra as na;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncResult;
use crate::meta::ProjectMeta;
use crate::types::{DatasetId, GeometryKind, ImageId, PointCloudId, PointIndexSet, ProjectId};

pub const EPISODES_PROJECT_TYPE: &str = "point_cloud_episodes";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: ProjectId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub project_type: String,
}

impl ProjectInfo {
    pub fn is_episodes(&self) -> bool {
        self.project_type == EPISODES_PROJECT_TYPE
    }
}

/// A camera image linked to a point cloud.
///
/// `updated_at` is the store's last-modified token; `meta` holds the linked
/// point cloud id and the sensor calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: ImageId,
    #[serde(default)]
    pub name: String,
    pub dataset_id: DatasetId,
    pub width: u32,
    pub height: u32,
    pub updated_at: String,
    #[serde(default)]
    pub meta: Value,
}

impl ImageInfo {
    pub fn pointcloud_id(&self) -> Option<PointCloudId> {
        self.meta.get("pointcloudId").and_then(Value::as_u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudInfo {
    pub id: PointCloudId,
    #[serde(default)]
    pub name: String,
    pub project_id: ProjectId,
    pub dataset_id: DatasetId,
}

/// A new object in the destination point cloud project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudObject {
    pub key: String,
    pub class_title: String,
}

impl PointCloudObject {
    pub fn new(class_title: &str) -> PointCloudObject {
        PointCloudObject {
            key: uuid::Uuid::new_v4().to_string(),
            class_title: class_title.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudGeometry {
    pub indices: PointIndexSet,
}

/// The point selection of one object. `frame_index` is set for episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudFigure {
    pub object_key: String,
    pub geometry_type: GeometryKind,
    pub geometry: PointCloudGeometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_index: Option<usize>,
}

impl PointCloudFigure {
    pub fn new(
        object: &PointCloudObject,
        indices: PointIndexSet,
        frame_index: Option<usize>,
    ) -> Self {
        PointCloudFigure {
            object_key: object.key.clone(),
            geometry_type: GeometryKind::Pointcloud,
            geometry: PointCloudGeometry { indices },
            frame_index,
        }
    }
}

pub trait PointCloudStore {
    fn pointcloud_info(&self, id: PointCloudId) -> SyncResult<PointCloudInfo>;
    /// Writes the point cloud file of `id` to `path`.
    fn download_pointcloud(&self, id: PointCloudId, path: &Path) -> SyncResult<()>;
}

pub trait AnnotationStore {
    fn project_info(&self, id: ProjectId) -> SyncResult<ProjectInfo>;
    fn project_meta(&self, id: ProjectId) -> SyncResult<ProjectMeta>;
    /// Commits `meta` and returns the meta as stored.
    fn update_project_meta(&self, id: ProjectId, meta: &ProjectMeta) -> SyncResult<ProjectMeta>;
    fn image_info(&self, id: ImageId) -> SyncResult<ImageInfo>;
    fn list_images(&self, dataset_id: DatasetId) -> SyncResult<Vec<ImageInfo>>;
    fn annotation(&self, image_id: ImageId) -> SyncResult<Value>;
}

pub trait DestinationStore {
    /// Appends objects and returns their ids in the same order.
    fn append_objects(&self, dataset_id: DatasetId, objects: &[PointCloudObject])
    -> SyncResult<Vec<u64>>;
    /// Appends figures; `figures[i]` belongs to the point cloud `pointcloud_ids[i]`.
    fn append_figures(
        &self,
        dataset_id: DatasetId,
        figures: &[PointCloudFigure],
        pointcloud_ids: &[PointCloudId],
    ) -> SyncResult<()>;
}

pub trait PointCloudDecoder {
    fn decode(&self, path: &Path) -> SyncResult<Vec<na::Point3<f64>>>;
}
