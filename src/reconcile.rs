use crate::error::{SyncError, SyncResult};
use crate::meta::{ObjClass, ProjectMeta};
use crate::types::GeometryKind;

const COLLISION_SUFFIX: &str = "_3d";

/// Outcome of looking up a point-cloud class for a 2D source class.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub class: ObjClass,
    pub meta: ProjectMeta,
    /// `meta` gained a class and has to be committed.
    pub changed: bool,
}

/// Finds or creates the point-cloud class matching `src_class` in `dest_meta`.
///
/// A class of the same name but another geometry is a collision; the lookup
/// then moves to `"{name}_3d"`. The returned class always has
/// `GeometryKind::Pointcloud`, and is only newly created (with the source
/// color) when no compatible class exists.
pub fn reconcile(dest_meta: &ProjectMeta, src_class: &ObjClass) -> SyncResult<Reconciled> {
    let mut name = src_class.title.clone();
    if let Some(existing) = dest_meta.get_obj_class(&name) {
        if existing.shape == GeometryKind::Pointcloud {
            return Ok(reused(dest_meta, existing));
        }
        log::debug!(
            "class '{}' exists as {}, using '{}{}'",
            name,
            existing.shape,
            name,
            COLLISION_SUFFIX
        );
        name = format!("{}{}", name, COLLISION_SUFFIX);
        if let Some(suffixed) = dest_meta.get_obj_class(&name) {
            if suffixed.shape == GeometryKind::Pointcloud {
                return Ok(reused(dest_meta, suffixed));
            }
            return Err(SyncError::ClassCollision {
                name,
                existing: suffixed.shape.to_string(),
            });
        }
    }

    let class = ObjClass::new(&name, GeometryKind::Pointcloud, &src_class.color);
    let meta = dest_meta.add_obj_class(class.clone())?;
    log::info!("created point cloud class '{}'", name);
    Ok(Reconciled {
        class,
        meta,
        changed: true,
    })
}

fn reused(dest_meta: &ProjectMeta, class: &ObjClass) -> Reconciled {
    Reconciled {
        class: class.clone(),
        meta: dest_meta.clone(),
        changed: false,
    }
}
