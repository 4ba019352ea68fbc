use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SyncError, SyncResult};
use crate::types::GeometryKind;

/// An annotation class: name, geometry and display color (`#RRGGBB`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjClass {
    pub title: String,
    pub shape: GeometryKind,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObjClass {
    pub fn new(title: &str, shape: GeometryKind, color: &str) -> ObjClass {
        ObjClass {
            title: title.to_string(),
            shape,
            color: color.to_string(),
            id: None,
            extra: Map::new(),
        }
    }
}

/// Class catalogue of a project. Tags and any other fields are carried along
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMeta {
    #[serde(default)]
    pub classes: Vec<ObjClass>,
    #[serde(default)]
    pub tags: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectMeta {
    pub fn from_json(json: &Value) -> SyncResult<ProjectMeta> {
        Ok(serde_json::from_value(json.clone())?)
    }

    pub fn to_json(&self) -> SyncResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn get_obj_class(&self, title: &str) -> Option<&ObjClass> {
        self.classes.iter().find(|c| c.title == title)
    }

    /// Returns a copy of the meta with `class` appended. Class names are unique.
    pub fn add_obj_class(&self, class: ObjClass) -> SyncResult<ProjectMeta> {
        if let Some(existing) = self.get_obj_class(&class.title) {
            return Err(SyncError::ClassCollision {
                name: class.title,
                existing: existing.shape.to_string(),
            });
        }
        let mut meta = self.clone();
        meta.classes.push(class);
        Ok(meta)
    }
}
