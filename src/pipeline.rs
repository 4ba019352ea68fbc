use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::annotation::Label;
use crate::cache::{AnnotationDiffCache, ResourceCache};
use crate::calibration::Calibration;
use crate::cluster::extract_largest_cluster;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::filter::points_inside_mask;
use crate::io::clean_dir;
use crate::meta::{ObjClass, ProjectMeta};
use crate::reconcile::reconcile;
use crate::store::{
    AnnotationStore, DestinationStore, ImageInfo, PointCloudDecoder, PointCloudFigure,
    PointCloudInfo, PointCloudObject, PointCloudStore,
};
use crate::types::{
    CalibratedFrame, DatasetId, GeometryKind, ImageId, PointCloudId, PointIndexSet, ProjectId,
    ProjectedPoint,
};

/// A request to sync the labels of one image, as sent by the annotation UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageEvent {
    pub image_id: Option<ImageId>,
    pub project_id: Option<ProjectId>,
    pub dataset_id: Option<DatasetId>,
}

impl ImageEvent {
    pub fn new(image_id: ImageId, project_id: ProjectId, dataset_id: DatasetId) -> ImageEvent {
        ImageEvent {
            image_id: Some(image_id),
            project_id: Some(project_id),
            dataset_id: Some(dataset_id),
        }
    }
}

/// What one successful event wrote to the destination.
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub image_id: ImageId,
    pub pointcloud_id: PointCloudId,
    pub dataset_id: DatasetId,
    pub local_path: PathBuf,
    pub objects: Vec<PointCloudObject>,
    pub figures: Vec<PointCloudFigure>,
}

#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// The event could not be processed because of missing input.
    Skipped(String),
    NothingToSync,
    Synced(SyncSummary),
}

/// User-facing result of an event, with failures folded in.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    Completed { objects: usize },
    NothingToSync,
    Skipped(String),
    Failed(String),
}

impl SyncStatus {
    pub fn message(&self) -> String {
        match self {
            SyncStatus::Completed { .. } => "Sync completed".to_string(),
            SyncStatus::NothingToSync => "No objects to sync".to_string(),
            SyncStatus::Skipped(reason) => reason.clone(),
            SyncStatus::Failed(_) => "Sync failed".to_string(),
        }
    }

    pub fn from_result(result: &SyncResult<SyncOutcome>) -> SyncStatus {
        match result {
            Ok(SyncOutcome::Synced(summary)) => SyncStatus::Completed {
                objects: summary.objects.len(),
            },
            Ok(SyncOutcome::NothingToSync) => SyncStatus::NothingToSync,
            Ok(SyncOutcome::Skipped(reason)) => SyncStatus::Skipped(reason.clone()),
            Err(e) => SyncStatus::Failed(e.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SyncStatus::Failed(_))
    }
}

struct SourceContext {
    project_id: ProjectId,
    is_episodes: bool,
    meta: ProjectMeta,
}

struct DestinationContext {
    project_id: ProjectId,
    meta: ProjectMeta,
}

/// Turns bitmap labels of calibrated images into point cloud objects.
///
/// Project metadata, point cloud infos and episode frame indices are kept
/// between events and only reloaded when an event refers to another
/// project or dataset.
pub struct SyncPipeline<S: ?Sized, D> {
    store: Arc<S>,
    decoder: D,
    config: SyncConfig,
    pointclouds: Arc<ResourceCache<S>>,
    annotations: Arc<AnnotationDiffCache<S>>,
    source: Option<SourceContext>,
    dataset_id: Option<DatasetId>,
    frame_indices: Option<(DatasetId, HashMap<ImageId, usize>)>,
    pointcloud_infos: HashMap<PointCloudId, PointCloudInfo>,
    destination: Option<DestinationContext>,
}

impl<S, D> SyncPipeline<S, D>
where
    S: AnnotationStore + PointCloudStore + DestinationStore + ?Sized,
    D: PointCloudDecoder,
{
    pub fn new(store: Arc<S>, decoder: D, config: SyncConfig) -> SyncResult<SyncPipeline<S, D>> {
        config.validate()?;
        if config.clean_cache_dir {
            clean_dir(&config.cache_dir)?;
        }
        let pointclouds = Arc::new(ResourceCache::new(
            store.clone(),
            &config.cache_dir,
            &config.pointcloud_ext,
        )?);
        let annotations = Arc::new(AnnotationDiffCache::new(store.clone()));
        Ok(Self::with_caches(store, decoder, config, pointclouds, annotations))
    }

    /// Builds a pipeline around caches shared with other pipelines.
    pub fn with_caches(
        store: Arc<S>,
        decoder: D,
        config: SyncConfig,
        pointclouds: Arc<ResourceCache<S>>,
        annotations: Arc<AnnotationDiffCache<S>>,
    ) -> SyncPipeline<S, D> {
        SyncPipeline {
            store,
            decoder,
            config,
            pointclouds,
            annotations,
            source: None,
            dataset_id: None,
            frame_indices: None,
            pointcloud_infos: HashMap::new(),
            destination: None,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Switches clustering for the following events. The cluster settings
    /// are validated when clustering is turned on.
    pub fn set_apply_clustering(&mut self, apply: bool) -> SyncResult<()> {
        if apply {
            self.config.cluster.validate()?;
        }
        self.config.apply_clustering = apply;
        Ok(())
    }

    pub fn pointcloud_cache(&self) -> &Arc<ResourceCache<S>> {
        &self.pointclouds
    }

    /// Runs one event and reports the result; errors are logged, not returned.
    pub fn handle(&mut self, event: &ImageEvent) -> SyncStatus {
        let result = self.run(event);
        match &result {
            Ok(SyncOutcome::Synced(summary)) => log::info!(
                "Sync completed: image {} -> {} objects in dataset {}",
                summary.image_id,
                summary.objects.len(),
                summary.dataset_id
            ),
            Err(e) => log::error!("Sync failed for {:?}: {}", event, e),
            _ => {}
        }
        SyncStatus::from_result(&result)
    }

    /// Runs one event.
    ///
    /// Labels are processed in annotation order; nothing is written to the
    /// destination unless every label got through. Only class metadata is
    /// committed as soon as a new class is needed.
    pub fn run(&mut self, event: &ImageEvent) -> SyncResult<SyncOutcome> {
        let Some(image_id) = event.image_id else {
            log::warn!("Image ID is None");
            return Ok(SyncOutcome::Skipped("Image ID is None".to_string()));
        };
        if !self.refresh_source(event.project_id)? {
            log::warn!("no project id known for image {}", image_id);
            return Ok(SyncOutcome::Skipped("Project ID is None".to_string()));
        }
        if let Some(dataset_id) = event.dataset_id {
            self.dataset_id = Some(dataset_id);
        }

        let image = self.store.image_info(image_id)?;
        let Some(pointcloud_id) = image.pointcloud_id() else {
            log::warn!("image {} is not linked to a point cloud", image_id);
            return Ok(SyncOutcome::Skipped("Point cloud ID is None".to_string()));
        };
        let pcd_info = self.pointcloud_info(pointcloud_id)?;
        self.refresh_destination(pcd_info.project_id)?;

        let calibration = match Calibration::from_image_meta(&image.meta) {
            Ok(Some(c)) => c,
            Ok(None) => {
                log::warn!("image {} has no calibration", image_id);
                return Ok(SyncOutcome::Skipped("Calibration is missing".to_string()));
            }
            Err(e) => {
                log::warn!("image {} has an invalid calibration: {}", image_id, e);
                return Ok(SyncOutcome::Skipped("Calibration is invalid".to_string()));
            }
        };
        let frame_index = if self.is_episodes() {
            match self.frame_index(&image)? {
                Some(idx) => Some(idx),
                None => {
                    log::warn!("image {} is not part of its dataset listing", image_id);
                    return Ok(SyncOutcome::Skipped("Frame index is unknown".to_string()));
                }
            }
        } else {
            None
        };

        let local_path = self.pointclouds.get(pointcloud_id)?;
        let points = self.decoder.decode(&local_path)?;
        log::debug!("point cloud {} has {} points", pointcloud_id, points.len());
        let frame = CalibratedFrame::new(points, &calibration, image.width, image.height);
        let projected = frame.project();

        let source_meta = self.source_meta()?.clone();
        let diff = self
            .annotations
            .get(image_id, &image.updated_at, &source_meta)?;

        let mut objects = Vec::new();
        let mut figures = Vec::new();
        for label in &diff.new_labels {
            let Some(indices) = self.select_points(&frame, &projected, &image, label) else {
                continue;
            };
            let Some(src_class) = source_meta.get_obj_class(&label.class_title) else {
                log::warn!("class '{}' is not in the project meta. Skipping", label.class_title);
                continue;
            };
            let class_title = self.resolve_class(src_class)?;
            let object = PointCloudObject::new(&class_title);
            figures.push(PointCloudFigure::new(&object, indices, frame_index));
            objects.push(object);
        }

        if objects.is_empty() {
            log::warn!("No objects to sync");
            return Ok(SyncOutcome::NothingToSync);
        }
        let dataset_id = pcd_info.dataset_id;
        self.store.append_objects(dataset_id, &objects)?;
        let pointcloud_ids = vec![pointcloud_id; figures.len()];
        self.store
            .append_figures(dataset_id, &figures, &pointcloud_ids)?;
        Ok(SyncOutcome::Synced(SyncSummary {
            image_id,
            pointcloud_id,
            dataset_id,
            local_path,
            objects,
            figures,
        }))
    }

    /// Indices of the cloud points selected by `label`, `None` when the label
    /// yields nothing usable.
    fn select_points(
        &self,
        frame: &CalibratedFrame,
        projected: &[ProjectedPoint],
        image: &ImageInfo,
        label: &Label,
    ) -> Option<PointIndexSet> {
        if label.geometry_type != GeometryKind::Bitmap {
            log::warn!("Label {} is not a bitmap. Skipping", label.class_title);
            return None;
        }
        let mask = match label.mask(image.width, image.height) {
            Ok(Some(mask)) => mask,
            Ok(None) => {
                log::warn!("Label {} has no bitmap data. Skipping", label.class_title);
                return None;
            }
            Err(e) => {
                log::warn!("Label {} has a broken bitmap: {}. Skipping", label.class_title, e);
                return None;
            }
        };
        let inside = points_inside_mask(projected, &mask, image.width, image.height);
        if inside.is_empty() {
            log::warn!("No points inside mask for label {}. Skipping.", label.class_title);
            return None;
        }
        let indices = if self.config.apply_clustering {
            extract_largest_cluster(
                &frame.points,
                &inside,
                self.config.cluster.eps,
                self.config.cluster.min_points,
            )
        } else {
            inside
        };
        if indices.is_empty() {
            log::warn!(
                "No significant cluster found for label {}. Skipping.",
                label.class_title
            );
            return None;
        }
        Some(indices)
    }

    /// Title of the destination class for `src_class`, committing the
    /// destination meta when a class had to be created.
    fn resolve_class(&mut self, src_class: &ObjClass) -> SyncResult<String> {
        let destination = self
            .destination
            .as_mut()
            .ok_or_else(|| SyncError::NotFound("destination project".into()))?;
        let reconciled = reconcile(&destination.meta, src_class)?;
        if reconciled.changed {
            destination.meta = self
                .store
                .update_project_meta(destination.project_id, &reconciled.meta)?;
        }
        Ok(reconciled.class.title)
    }

    /// Makes sure the source project context matches `project_id`. Returns
    /// false when no project is known at all.
    fn refresh_source(&mut self, project_id: Option<ProjectId>) -> SyncResult<bool> {
        let current = self.source.as_ref().map(|s| s.project_id);
        let Some(project_id) = project_id.or(current) else {
            return Ok(false);
        };
        if current != Some(project_id) {
            let info = self.store.project_info(project_id)?;
            let meta = self.store.project_meta(project_id)?;
            log::info!(
                "source project {} ({}), {} classes",
                project_id,
                info.project_type,
                meta.classes.len()
            );
            self.source = Some(SourceContext {
                project_id,
                is_episodes: info.is_episodes(),
                meta,
            });
        }
        Ok(true)
    }

    fn refresh_destination(&mut self, project_id: ProjectId) -> SyncResult<()> {
        if self.destination.as_ref().map(|d| d.project_id) != Some(project_id) {
            let meta = self.store.project_meta(project_id)?;
            log::info!("destination project {}, {} classes", project_id, meta.classes.len());
            self.destination = Some(DestinationContext { project_id, meta });
        }
        Ok(())
    }

    fn pointcloud_info(&mut self, id: PointCloudId) -> SyncResult<PointCloudInfo> {
        if let Some(info) = self.pointcloud_infos.get(&id) {
            return Ok(info.clone());
        }
        let info = self.store.pointcloud_info(id)?;
        self.pointcloud_infos.insert(id, info.clone());
        Ok(info)
    }

    /// Position of `image` in its dataset listing, which is the frame of an
    /// episode.
    fn frame_index(&mut self, image: &ImageInfo) -> SyncResult<Option<usize>> {
        let dataset_id = self.dataset_id.unwrap_or(image.dataset_id);
        let stale = self.frame_indices.as_ref().map(|(id, _)| *id) != Some(dataset_id);
        if stale {
            let images = self.store.list_images(dataset_id)?;
            let indices = images.iter().enumerate().map(|(i, img)| (img.id, i)).collect();
            self.frame_indices = Some((dataset_id, indices));
        }
        Ok(self
            .frame_indices
            .as_ref()
            .and_then(|(_, indices)| indices.get(&image.id).copied()))
    }

    fn is_episodes(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.is_episodes)
    }

    fn source_meta(&self) -> SyncResult<&ProjectMeta> {
        self.source
            .as_ref()
            .map(|s| &s.meta)
            .ok_or_else(|| SyncError::NotFound("source project".into()))
    }
}
