use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncResult;
use crate::mask::{Bitmap, BitmapJson, RasterMask};
use crate::types::GeometryKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub height: u32,
    pub width: u32,
}

/// One labeled object of an image annotation.
///
/// `id` is the durable identity assigned by the annotation store; it stays the
/// same when the geometry is edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub class_title: String,
    pub geometry_type: GeometryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitmap: Option<BitmapJson>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Label {
    pub fn bitmap(id: Option<u64>, class_title: &str, bitmap: &Bitmap) -> SyncResult<Label> {
        Ok(Label {
            id,
            class_title: class_title.to_string(),
            geometry_type: GeometryKind::Bitmap,
            bitmap: Some(bitmap.encode()?),
            extra: Map::new(),
        })
    }

    /// Full-image mask of a bitmap label; `None` for any other geometry.
    pub fn mask(&self, width: u32, height: u32) -> SyncResult<Option<RasterMask>> {
        match (&self.geometry_type, &self.bitmap) {
            (GeometryKind::Bitmap, Some(json)) => {
                Ok(Some(Bitmap::decode(json)?.to_mask(width, height)))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ImageSize>,
    #[serde(default)]
    pub objects: Vec<Label>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Annotation {
    pub fn from_json(json: &Value) -> SyncResult<Annotation> {
        Ok(serde_json::from_value(json.clone())?)
    }

    pub fn labels(&self) -> &[Label] {
        &self.objects
    }
}
