use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::annotation::{Annotation, Label};
use crate::error::SyncResult;
use crate::meta::ProjectMeta;
use crate::store::AnnotationStore;
use crate::types::ImageId;

/// Last observed state of one image's annotation.
#[derive(Debug, Clone)]
struct Snapshot {
    token: String,
    annotation: Arc<Annotation>,
    label_ids: HashSet<u64>,
}

/// Annotation of an image plus the labels not seen on earlier observations.
#[derive(Debug, Clone)]
pub struct AnnotationDiff {
    pub annotation: Arc<Annotation>,
    pub new_labels: Vec<Label>,
}

/// Remembers what each image's annotation looked like on the previous poll.
///
/// The last-modified token decides whether to fetch again; labels are matched
/// by their durable id, not by content, so an edited label with an unchanged
/// id is not reported again. Labels without an id cannot be matched and are
/// always new.
pub struct AnnotationDiffCache<S: ?Sized> {
    store: Arc<S>,
    snapshots: Mutex<HashMap<ImageId, Arc<Mutex<Option<Snapshot>>>>>,
}

impl<S: AnnotationStore + ?Sized> AnnotationDiffCache<S> {
    pub fn new(store: Arc<S>) -> AnnotationDiffCache<S> {
        AnnotationDiffCache {
            store,
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(
        &self,
        image_id: ImageId,
        last_modified: &str,
        meta: &ProjectMeta,
    ) -> SyncResult<AnnotationDiff> {
        let slot = self.snapshots.lock().entry(image_id).or_default().clone();
        let mut entry = slot.lock();

        if let Some(snapshot) = entry.as_ref() {
            if snapshot.token == last_modified {
                log::debug!("annotation of image {} unchanged", image_id);
                return Ok(AnnotationDiff {
                    annotation: snapshot.annotation.clone(),
                    new_labels: Vec::new(),
                });
            }
        }

        let annotation = Arc::new(self.fetch(image_id, meta)?);
        let new_labels: Vec<Label> = match entry.as_ref() {
            None => annotation.labels().to_vec(),
            Some(old) => annotation
                .labels()
                .iter()
                .filter(|l| l.id.is_none_or(|id| !old.label_ids.contains(&id)))
                .cloned()
                .collect(),
        };
        log::debug!(
            "annotation of image {}: {} labels, {} new",
            image_id,
            annotation.labels().len(),
            new_labels.len()
        );
        *entry = Some(Snapshot {
            token: last_modified.to_string(),
            label_ids: annotation.labels().iter().filter_map(|l| l.id).collect(),
            annotation: annotation.clone(),
        });
        Ok(AnnotationDiff {
            annotation,
            new_labels,
        })
    }

    fn fetch(&self, image_id: ImageId, meta: &ProjectMeta) -> SyncResult<Annotation> {
        let json = self.store.annotation(image_id)?;
        let annotation = Annotation::from_json(&json)?;
        for label in annotation.labels() {
            if meta.get_obj_class(&label.class_title).is_none() {
                log::warn!(
                    "image {}: label class '{}' is not in the project meta",
                    image_id,
                    label.class_title
                );
            }
        }
        Ok(annotation)
    }
}
