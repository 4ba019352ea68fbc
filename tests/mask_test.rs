use mask_to_pointcloud::annotation::{Annotation, Label};
use mask_to_pointcloud::mask::{Bitmap, BitmapJson, RasterMask};
use mask_to_pointcloud::types::GeometryKind;
use serde_json::json;

fn square_bitmap(origin: (i64, i64), size: u32) -> Bitmap {
    let mut mask = RasterMask::new(size, size);
    for r in 0..size as usize {
        for c in 0..size as usize {
            mask.set(r, c, true);
        }
    }
    Bitmap { origin, mask }
}

#[test]
fn test_bitmap_codec() {
    let mut bitmap = square_bitmap((3, 4), 5);
    bitmap.mask.set(0, 0, false);
    let json = bitmap.encode().unwrap();
    assert_eq!(json.origin, [3, 4]);

    let decoded = Bitmap::decode(&json).unwrap();
    assert_eq!(decoded, bitmap);
    assert_eq!(decoded.mask.count(), 24);
}

#[test]
fn test_to_mask_places_at_origin() {
    let bitmap = square_bitmap((2, 1), 2);
    let mask = bitmap.to_mask(6, 4);
    assert_eq!(mask.width(), 6);
    assert_eq!(mask.height(), 4);
    assert_eq!(mask.count(), 4);
    // origin is (x, y) = (col, row)
    assert_eq!(mask.get(1, 2), Some(true));
    assert_eq!(mask.get(2, 3), Some(true));
    assert_eq!(mask.get(2, 1), Some(false));
    assert_eq!(mask.get(4, 0), None);
}

#[test]
fn test_to_mask_clips_outside_image() {
    let bitmap = square_bitmap((-1, 3), 3);
    let mask = bitmap.to_mask(4, 4);
    // only columns 0..2 of row 3 survive
    assert_eq!(mask.count(), 2);
    assert_eq!(mask.get(3, 0), Some(true));
    assert_eq!(mask.get(3, 1), Some(true));
}

#[test]
fn test_to_mask_with_extreme_origin_is_empty() {
    let far = square_bitmap((i64::MAX, i64::MAX), 3);
    assert_eq!(far.to_mask(10, 10).count(), 0);

    let before = square_bitmap((i64::MIN, i64::MIN), 3);
    assert_eq!(before.to_mask(10, 10).count(), 0);
}

#[test]
fn test_label_with_extreme_origin_has_empty_mask() {
    let label = Label::bitmap(Some(1), "car", &square_bitmap((i64::MAX - 1, 0), 4)).unwrap();
    let mask = label.mask(10, 10).unwrap().unwrap();
    assert_eq!(mask.count(), 0);
}

#[test]
fn test_decode_rejects_garbage() {
    let json = BitmapJson {
        data: "not base64 !!".to_string(),
        origin: [0, 0],
    };
    assert!(Bitmap::decode(&json).is_err());
}

#[test]
fn test_label_mask() {
    let label = Label::bitmap(Some(7), "car", &square_bitmap((1, 1), 2)).unwrap();
    let mask = label.mask(4, 4).unwrap().unwrap();
    assert_eq!(mask.count(), 4);
    assert_eq!(mask.get(2, 2), Some(true));
}

#[test]
fn test_annotation_json() {
    let bitmap = square_bitmap((0, 0), 2).encode().unwrap();
    let json = json!({
        "description": "",
        "size": {"height": 4, "width": 4},
        "tags": [],
        "objects": [
            {
                "id": 11,
                "classTitle": "car",
                "geometryType": "bitmap",
                "bitmap": {"data": bitmap.data, "origin": [0, 0]},
                "labelerLogin": "someone"
            },
            {
                "id": 12,
                "classTitle": "sign",
                "geometryType": "rectangle",
                "points": {"exterior": [[0, 0], [2, 2]], "interior": []}
            }
        ]
    });
    let ann = Annotation::from_json(&json).unwrap();
    assert_eq!(ann.labels().len(), 2);
    assert_eq!(ann.labels()[0].id, Some(11));
    assert_eq!(ann.labels()[0].geometry_type, GeometryKind::Bitmap);
    assert_eq!(
        ann.labels()[1].geometry_type,
        GeometryKind::Other("rectangle".to_string())
    );
    assert!(ann.labels()[1].mask(4, 4).unwrap().is_none());

    // unknown fields survive a round-trip
    let back = serde_json::to_value(&ann).unwrap();
    assert_eq!(back["objects"][0]["labelerLogin"], "someone");
    assert_eq!(back["objects"][1]["geometryType"], "rectangle");
    assert_eq!(back["description"], "");
}
