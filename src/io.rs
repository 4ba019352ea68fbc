use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

use crate::error::SyncResult;
use crate::pipeline::SyncStatus;
use crate::types::ImageId;

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: &Path, object: &T) -> SyncResult<()> {
    let j = serde_json::to_string_pretty(object)?;
    std::fs::write(output_path, j)?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &Path) -> SyncResult<T> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Creates `dir`, removing anything already inside it.
pub fn clean_dir(dir: &Path) -> SyncResult<()> {
    if dir.exists() {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }
    } else {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct EventReport {
    pub image_id: Option<ImageId>,
    pub status: String,
    pub objects: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EventReport {
    pub fn new(image_id: Option<ImageId>, status: &SyncStatus) -> EventReport {
        let (objects, error) = match status {
            SyncStatus::Completed { objects } => (*objects, None),
            SyncStatus::Failed(e) => (0, Some(e.clone())),
            _ => (0, None),
        };
        EventReport {
            image_id,
            status: status.message(),
            objects,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
struct SyncReport<'a> {
    timestamp: String,
    apply_clustering: bool,
    total_objects: usize,
    failed_events: usize,
    events: &'a [EventReport],
}

/// Writes a JSON summary of a batch of sync events.
pub fn write_sync_report(
    output_path: &Path,
    apply_clustering: bool,
    events: &[EventReport],
) -> SyncResult<()> {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let report = SyncReport {
        timestamp: now.to_string(),
        apply_clustering,
        total_objects: events.iter().map(|e| e.objects).sum(),
        failed_events: events.iter().filter(|e| e.error.is_some()).count(),
        events,
    };
    object_to_json(output_path, &report)
}
