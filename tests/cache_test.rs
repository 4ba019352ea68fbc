use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use mask_to_pointcloud::cache::{AnnotationDiffCache, ResourceCache};
use mask_to_pointcloud::meta::ProjectMeta;
use mask_to_pointcloud::store::{
    AnnotationStore, ImageInfo, PointCloudInfo, PointCloudStore, ProjectInfo,
};
use mask_to_pointcloud::types::{DatasetId, ImageId, PointCloudId, ProjectId};
use mask_to_pointcloud::{SyncError, SyncResult};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;

#[derive(Default)]
struct MockStore {
    downloads: AtomicUsize,
    annotation_fetches: AtomicUsize,
    fail_downloads: AtomicBool,
    annotations: Mutex<HashMap<ImageId, Value>>,
}

impl MockStore {
    fn set_annotation(&self, image_id: ImageId, label_ids: &[Option<u64>]) {
        let objects: Vec<Value> = label_ids
            .iter()
            .map(|id| {
                let mut obj = json!({"classTitle": "car", "geometryType": "rectangle"});
                if let Some(id) = id {
                    obj["id"] = json!(id);
                }
                obj
            })
            .collect();
        self.annotations
            .lock()
            .insert(image_id, json!({"size": {"height": 4, "width": 4}, "objects": objects}));
    }
}

impl PointCloudStore for MockStore {
    fn pointcloud_info(&self, id: PointCloudId) -> SyncResult<PointCloudInfo> {
        Ok(PointCloudInfo {
            id,
            name: format!("{}.pcd", id),
            project_id: 1,
            dataset_id: 1,
        })
    }

    fn download_pointcloud(&self, id: PointCloudId, path: &Path) -> SyncResult<()> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(SyncError::fetch(format!("point cloud {}", id), "connection reset"));
        }
        std::fs::write(path, format!("cloud {}", id))?;
        Ok(())
    }
}

impl AnnotationStore for MockStore {
    fn project_info(&self, id: ProjectId) -> SyncResult<ProjectInfo> {
        Ok(ProjectInfo {
            id,
            name: "images".into(),
            project_type: "images".into(),
        })
    }

    fn project_meta(&self, _id: ProjectId) -> SyncResult<ProjectMeta> {
        Ok(ProjectMeta::default())
    }

    fn update_project_meta(&self, _id: ProjectId, meta: &ProjectMeta) -> SyncResult<ProjectMeta> {
        Ok(meta.clone())
    }

    fn image_info(&self, id: ImageId) -> SyncResult<ImageInfo> {
        Err(SyncError::NotFound(format!("image {}", id)))
    }

    fn list_images(&self, _dataset_id: DatasetId) -> SyncResult<Vec<ImageInfo>> {
        Ok(Vec::new())
    }

    fn annotation(&self, image_id: ImageId) -> SyncResult<Value> {
        self.annotation_fetches.fetch_add(1, Ordering::SeqCst);
        self.annotations
            .lock()
            .get(&image_id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("annotation {}", image_id)))
    }
}

fn new_ids(diff: &mask_to_pointcloud::cache::AnnotationDiff) -> Vec<Option<u64>> {
    diff.new_labels.iter().map(|l| l.id).collect()
}

#[test]
fn test_resource_cache_downloads_once() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(MockStore::default());
    let cache = ResourceCache::new(store.clone(), &temp_dir.path().join("cache"), ".pcd").unwrap();
    assert!(cache.is_empty());

    let first = cache.get(7).unwrap();
    let second = cache.get(7).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.downloads.load(Ordering::SeqCst), 1);
    assert!(first.starts_with(temp_dir.path().join("cache")));
    assert_eq!(first.extension().unwrap(), "pcd");
    assert_eq!(std::fs::read_to_string(&first).unwrap(), "cloud 7");

    let other = cache.get(8).unwrap();
    assert_ne!(first, other);
    assert_eq!(store.downloads.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.cached(7), Some(first));
}

#[test]
fn test_resource_cache_failed_download_is_retried() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(MockStore::default());
    let cache = ResourceCache::new(store.clone(), temp_dir.path(), ".pcd").unwrap();

    store.fail_downloads.store(true, Ordering::SeqCst);
    assert!(matches!(cache.get(3), Err(SyncError::Fetch { .. })));
    assert_eq!(cache.cached(3), None);
    assert!(cache.is_empty());

    store.fail_downloads.store(false, Ordering::SeqCst);
    let path = cache.get(3).unwrap();
    assert!(path.exists());
    assert_eq!(store.downloads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_resource_cache_concurrent_callers_share_download() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(MockStore::default());
    let cache = Arc::new(ResourceCache::new(store.clone(), temp_dir.path(), ".pcd").unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            std::thread::spawn(move || cache.get(11).unwrap())
        })
        .collect();
    let paths: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(paths.iter().all(|p| *p == paths[0]));
    assert_eq!(store.downloads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_annotation_diff_tracks_new_labels() {
    let store = Arc::new(MockStore::default());
    let cache = AnnotationDiffCache::new(store.clone());
    let meta = ProjectMeta::default();

    store.set_annotation(42, &[Some(1), Some(2)]);
    let diff = cache.get(42, "t0", &meta).unwrap();
    assert_eq!(new_ids(&diff), vec![Some(1), Some(2)]);
    assert_eq!(store.annotation_fetches.load(Ordering::SeqCst), 1);

    // same token: nothing new, no fetch
    let diff = cache.get(42, "t0", &meta).unwrap();
    assert!(diff.new_labels.is_empty());
    assert_eq!(diff.annotation.labels().len(), 2);
    assert_eq!(store.annotation_fetches.load(Ordering::SeqCst), 1);

    store.set_annotation(42, &[Some(1), Some(2), Some(3)]);
    let diff = cache.get(42, "t1", &meta).unwrap();
    assert_eq!(new_ids(&diff), vec![Some(3)]);
    assert_eq!(diff.annotation.labels().len(), 3);
    assert_eq!(store.annotation_fetches.load(Ordering::SeqCst), 2);
}

#[test]
fn test_annotation_diff_removed_and_unidentified_labels() {
    let store = Arc::new(MockStore::default());
    let cache = AnnotationDiffCache::new(store.clone());
    let meta = ProjectMeta::default();

    store.set_annotation(5, &[Some(1), None]);
    assert_eq!(new_ids(&cache.get(5, "a", &meta).unwrap()), vec![Some(1), None]);

    // label 1 removed, id-less label still reported
    store.set_annotation(5, &[Some(2), None]);
    assert_eq!(new_ids(&cache.get(5, "b", &meta).unwrap()), vec![Some(2), None]);

    // a label that comes back after removal counts as new
    store.set_annotation(5, &[Some(1), Some(2)]);
    assert_eq!(new_ids(&cache.get(5, "c", &meta).unwrap()), vec![Some(1)]);
}

#[test]
fn test_annotation_diff_images_are_independent() {
    let store = Arc::new(MockStore::default());
    let cache = AnnotationDiffCache::new(store.clone());
    let meta = ProjectMeta::default();

    store.set_annotation(1, &[Some(10)]);
    store.set_annotation(2, &[Some(10)]);
    assert_eq!(new_ids(&cache.get(1, "t", &meta).unwrap()), vec![Some(10)]);
    assert_eq!(new_ids(&cache.get(2, "t", &meta).unwrap()), vec![Some(10)]);
}

#[test]
fn test_annotation_diff_fetch_error_leaves_no_snapshot() {
    let store = Arc::new(MockStore::default());
    let cache = AnnotationDiffCache::new(store.clone());
    let meta = ProjectMeta::default();

    assert!(cache.get(9, "t0", &meta).is_err());
    store.set_annotation(9, &[Some(4)]);
    assert_eq!(new_ids(&cache.get(9, "t0", &meta).unwrap()), vec![Some(4)]);
}
