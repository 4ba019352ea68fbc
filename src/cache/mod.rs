pub mod annotation;
pub mod resource;

pub use annotation::{AnnotationDiff, AnnotationDiffCache};
pub use resource::ResourceCache;
