pub mod annotation;
pub mod cache;
pub mod calibration;
pub mod cluster;
pub mod config;
pub mod error;
pub mod filter;
pub mod io;
pub mod local_store;
pub mod mask;
pub mod meta;
pub mod pcd;
pub mod pipeline;
pub mod projection;
pub mod reconcile;
pub mod store;
pub mod types;
pub mod visualization;

pub use error::{SyncError, SyncResult};
pub use pipeline::{ImageEvent, SyncOutcome, SyncPipeline, SyncStatus};
