use mask_to_pointcloud::SyncError;
use mask_to_pointcloud::meta::{ObjClass, ProjectMeta};
use mask_to_pointcloud::reconcile::reconcile;
use mask_to_pointcloud::types::GeometryKind;
use serde_json::json;

fn meta_with(classes: &[(&str, GeometryKind)]) -> ProjectMeta {
    ProjectMeta {
        classes: classes
            .iter()
            .map(|(name, kind)| ObjClass::new(name, kind.clone(), "#00FF00"))
            .collect(),
        ..Default::default()
    }
}

fn car() -> ObjClass {
    ObjClass::new("car", GeometryKind::Bitmap, "#FF0000")
}

#[test]
fn test_reuses_matching_class() {
    let meta = meta_with(&[("car", GeometryKind::Pointcloud)]);
    let r = reconcile(&meta, &car()).unwrap();
    assert!(!r.changed);
    assert_eq!(r.class.title, "car");
    assert_eq!(r.class.shape, GeometryKind::Pointcloud);
    // existing class keeps its own color
    assert_eq!(r.class.color, "#00FF00");
    assert_eq!(r.meta, meta);
}

#[test]
fn test_name_collision_uses_suffix() {
    let meta = meta_with(&[("car", GeometryKind::Bitmap)]);
    let r = reconcile(&meta, &car()).unwrap();
    assert!(r.changed);
    assert_eq!(r.class.title, "car_3d");
    assert_eq!(r.class.shape, GeometryKind::Pointcloud);
    assert_eq!(r.class.color, "#FF0000");
    assert_eq!(r.meta.classes.len(), 2);
    // input meta is untouched
    assert_eq!(meta.classes.len(), 1);
}

#[test]
fn test_creates_missing_class() {
    let meta = meta_with(&[("person", GeometryKind::Pointcloud)]);
    let r = reconcile(&meta, &car()).unwrap();
    assert!(r.changed);
    assert_eq!(r.class.title, "car");
    assert_eq!(r.class.color, "#FF0000");
    assert!(r.meta.get_obj_class("car").is_some());
}

#[test]
fn test_reuses_existing_suffixed_class() {
    let meta = meta_with(&[
        ("car", GeometryKind::Other("cuboid_3d".into())),
        ("car_3d", GeometryKind::Pointcloud),
    ]);
    let r = reconcile(&meta, &car()).unwrap();
    assert!(!r.changed);
    assert_eq!(r.class.title, "car_3d");
}

#[test]
fn test_suffixed_class_collision_fails() {
    let meta = meta_with(&[
        ("car", GeometryKind::Bitmap),
        ("car_3d", GeometryKind::Bitmap),
    ]);
    let err = reconcile(&meta, &car()).unwrap_err();
    assert!(matches!(err, SyncError::ClassCollision { ref name, .. } if name == "car_3d"));
}

#[test]
fn test_meta_json_round_trip() {
    let json = json!({
        "classes": [
            {"title": "car", "shape": "point_cloud", "color": "#FF0000", "id": 3, "hotkey": ""},
            {"title": "road", "shape": "polygon", "color": "#0000FF"}
        ],
        "tags": [{"name": "reviewed", "value_type": "none"}],
        "projectType": "point_clouds"
    });
    let meta = ProjectMeta::from_json(&json).unwrap();
    assert_eq!(meta.classes[0].shape, GeometryKind::Pointcloud);
    assert_eq!(meta.classes[1].shape, GeometryKind::Other("polygon".into()));
    assert_eq!(meta.to_json().unwrap(), json);
}
