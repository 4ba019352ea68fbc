//! Store backed by a directory tree, for offline runs and tests.
//!
//! ```text
//! root/
//!   projects/{project_id}.json      ProjectInfo
//!   metas/{project_id}.json         ProjectMeta
//!   images/{image_id}.json          ImageInfo
//!   annotations/{image_id}.json     annotation
//!   pointclouds/{pcd_id}.json       PointCloudInfo
//!   pointclouds/{pcd_id}.pcd        point cloud data
//!   output/{dataset_id}/objects.json, figures.json
//! ```

use std::path::{Path, PathBuf};

use glob::glob;
use nalgebra as na;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use crate::io::{object_from_json, object_to_json};
use crate::meta::ProjectMeta;
use crate::pcd::write_ascii_pcd;
use crate::store::{
    AnnotationStore, DestinationStore, ImageInfo, PointCloudFigure, PointCloudInfo,
    PointCloudObject, PointCloudStore, ProjectInfo,
};
use crate::types::{DatasetId, ImageId, PointCloudId, ProjectId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: u64,
    #[serde(flatten)]
    pub object: PointCloudObject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFigure {
    pub pointcloud_id: PointCloudId,
    #[serde(flatten)]
    pub figure: PointCloudFigure,
}

pub struct LocalStore {
    root: PathBuf,
    // serializes read-modify-write of the output files
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn open(root: &Path) -> SyncResult<LocalStore> {
        if !root.is_dir() {
            return Err(SyncError::NotFound(format!(
                "store root {} is not a directory",
                root.display()
            )));
        }
        Ok(LocalStore {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Creates the directory layout under `root`.
    pub fn create(root: &Path) -> SyncResult<LocalStore> {
        for dir in ["projects", "metas", "images", "annotations", "pointclouds", "output"] {
            std::fs::create_dir_all(root.join(dir))?;
        }
        LocalStore::open(root)
    }

    fn path(&self, dir: &str, name: impl std::fmt::Display, ext: &str) -> PathBuf {
        self.root.join(dir).join(format!("{}{}", name, ext))
    }

    fn read<T: serde::de::DeserializeOwned>(&self, path: &Path, resource: String) -> SyncResult<T> {
        if !path.exists() {
            return Err(SyncError::fetch(resource, "not found in local store"));
        }
        object_from_json(path).map_err(|e| SyncError::fetch(resource, e))
    }

    pub fn put_project(&self, info: &ProjectInfo, meta: &ProjectMeta) -> SyncResult<()> {
        object_to_json(&self.path("projects", info.id, ".json"), info)?;
        object_to_json(&self.path("metas", info.id, ".json"), meta)
    }

    pub fn put_image(&self, info: &ImageInfo, annotation: &Value) -> SyncResult<()> {
        object_to_json(&self.path("images", info.id, ".json"), info)?;
        object_to_json(&self.path("annotations", info.id, ".json"), annotation)
    }

    pub fn put_pointcloud(
        &self,
        info: &PointCloudInfo,
        points: &[na::Point3<f64>],
    ) -> SyncResult<()> {
        object_to_json(&self.path("pointclouds", info.id, ".json"), info)?;
        std::fs::write(self.path("pointclouds", info.id, ".pcd"), write_ascii_pcd(points))?;
        Ok(())
    }

    fn output_dir(&self, dataset_id: DatasetId) -> PathBuf {
        self.root.join("output").join(dataset_id.to_string())
    }

    pub fn objects(&self, dataset_id: DatasetId) -> SyncResult<Vec<StoredObject>> {
        read_list(&self.output_dir(dataset_id).join("objects.json"))
    }

    pub fn figures(&self, dataset_id: DatasetId) -> SyncResult<Vec<StoredFigure>> {
        read_list(&self.output_dir(dataset_id).join("figures.json"))
    }
}

fn read_list<T: serde::de::DeserializeOwned>(path: &Path) -> SyncResult<Vec<T>> {
    if path.exists() {
        object_from_json(path)
    } else {
        Ok(Vec::new())
    }
}

impl AnnotationStore for LocalStore {
    fn project_info(&self, id: ProjectId) -> SyncResult<ProjectInfo> {
        self.read(&self.path("projects", id, ".json"), format!("project {}", id))
    }

    fn project_meta(&self, id: ProjectId) -> SyncResult<ProjectMeta> {
        self.read(&self.path("metas", id, ".json"), format!("meta of project {}", id))
    }

    fn update_project_meta(&self, id: ProjectId, meta: &ProjectMeta) -> SyncResult<ProjectMeta> {
        let _guard = self.write_lock.lock();
        object_to_json(&self.path("metas", id, ".json"), meta)?;
        Ok(meta.clone())
    }

    fn image_info(&self, id: ImageId) -> SyncResult<ImageInfo> {
        self.read(&self.path("images", id, ".json"), format!("image {}", id))
    }

    fn list_images(&self, dataset_id: DatasetId) -> SyncResult<Vec<ImageInfo>> {
        let pattern = format!("{}/images/*.json", self.root.display());
        let paths = glob(&pattern).map_err(|e| SyncError::InvalidInput(e.to_string()))?;
        let mut images = Vec::new();
        for path in paths.filter_map(Result::ok) {
            let info: ImageInfo = object_from_json(&path)?;
            if info.dataset_id == dataset_id {
                images.push(info);
            }
        }
        images.sort_by_key(|img| img.id);
        log::trace!("dataset {} has {} images", dataset_id, images.len());
        Ok(images)
    }

    fn annotation(&self, image_id: ImageId) -> SyncResult<Value> {
        self.read(
            &self.path("annotations", image_id, ".json"),
            format!("annotation of image {}", image_id),
        )
    }
}

impl PointCloudStore for LocalStore {
    fn pointcloud_info(&self, id: PointCloudId) -> SyncResult<PointCloudInfo> {
        self.read(&self.path("pointclouds", id, ".json"), format!("point cloud {}", id))
    }

    fn download_pointcloud(&self, id: PointCloudId, path: &Path) -> SyncResult<()> {
        let src = self.path("pointclouds", id, ".pcd");
        std::fs::copy(&src, path).map_err(|e| SyncError::fetch(format!("point cloud {}", id), e))?;
        Ok(())
    }
}

impl DestinationStore for LocalStore {
    fn append_objects(
        &self,
        dataset_id: DatasetId,
        objects: &[PointCloudObject],
    ) -> SyncResult<Vec<u64>> {
        let _guard = self.write_lock.lock();
        let dir = self.output_dir(dataset_id);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("objects.json");
        let mut stored: Vec<StoredObject> = read_list(&path)?;
        let first_id = stored.len() as u64 + 1;
        let ids: Vec<u64> = (first_id..first_id + objects.len() as u64).collect();
        stored.extend(ids.iter().zip(objects).map(|(&id, object)| StoredObject {
            id,
            object: object.clone(),
        }));
        object_to_json(&path, &stored)?;
        Ok(ids)
    }

    fn append_figures(
        &self,
        dataset_id: DatasetId,
        figures: &[PointCloudFigure],
        pointcloud_ids: &[PointCloudId],
    ) -> SyncResult<()> {
        if figures.len() != pointcloud_ids.len() {
            return Err(SyncError::InvalidInput(format!(
                "{} figures but {} point cloud ids",
                figures.len(),
                pointcloud_ids.len()
            )));
        }
        let _guard = self.write_lock.lock();
        let dir = self.output_dir(dataset_id);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("figures.json");
        let mut stored: Vec<StoredFigure> = read_list(&path)?;
        stored.extend(
            figures
                .iter()
                .zip(pointcloud_ids)
                .map(|(figure, &pointcloud_id)| StoredFigure {
                    pointcloud_id,
                    figure: figure.clone(),
                }),
        );
        object_to_json(&path, &stored)
    }
}
