use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SyncResult;
use crate::store::PointCloudStore;
use crate::types::PointCloudId;

type Slot = Arc<Mutex<Option<PathBuf>>>;

/// Local copies of remote point clouds, downloaded once per id.
///
/// Remote point clouds are treated as immutable: an entry is never refreshed.
/// Each id has its own slot lock, so concurrent callers asking for the same
/// uncached id wait for a single download while other ids proceed.
pub struct ResourceCache<S: ?Sized> {
    store: Arc<S>,
    dir: PathBuf,
    ext: String,
    slots: Mutex<HashMap<PointCloudId, Slot>>,
}

impl<S: PointCloudStore + ?Sized> ResourceCache<S> {
    pub fn new(store: Arc<S>, dir: &Path, ext: &str) -> SyncResult<ResourceCache<S>> {
        std::fs::create_dir_all(dir)?;
        Ok(ResourceCache {
            store,
            dir: dir.to_path_buf(),
            ext: ext.to_string(),
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// Local path of point cloud `id`, downloading it on first use.
    ///
    /// A failed download leaves no entry behind.
    pub fn get(&self, id: PointCloudId) -> SyncResult<PathBuf> {
        let slot = self.slots.lock().entry(id).or_default().clone();
        let mut entry = slot.lock();
        if let Some(path) = entry.as_ref() {
            log::trace!("point cloud {} cached at {}", id, path.display());
            return Ok(path.clone());
        }
        let path = self
            .dir
            .join(format!("{}{}", uuid::Uuid::new_v4().simple(), self.ext));
        log::debug!("downloading point cloud {} to {}", id, path.display());
        self.store.download_pointcloud(id, &path)?;
        *entry = Some(path.clone());
        Ok(path)
    }

    /// Recorded path of `id` without fetching.
    pub fn cached(&self, id: PointCloudId) -> Option<PathBuf> {
        let slot = self.slots.lock().get(&id).cloned()?;
        let entry = slot.lock();
        entry.clone()
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.lock().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
