use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::ProgressIterator;
use mask_to_pointcloud::config::SyncConfig;
use mask_to_pointcloud::io::{EventReport, object_from_json, write_sync_report};
use mask_to_pointcloud::local_store::LocalStore;
use mask_to_pointcloud::pcd::PcdDecoder;
use mask_to_pointcloud::pipeline::{ImageEvent, SyncOutcome, SyncPipeline, SyncStatus, SyncSummary};
use mask_to_pointcloud::store::{AnnotationStore, PointCloudDecoder};
use mask_to_pointcloud::visualization::{log_projection, log_selections};
use mask_to_pointcloud::{calibration::Calibration, types::CalibratedFrame};

#[derive(Parser)]
#[command(version, about, author)]
struct MaskSyncCli {
    /// local store root directory
    store: PathBuf,

    /// source (image) project id
    #[arg(long)]
    project: u64,

    /// source dataset id
    #[arg(long)]
    dataset: u64,

    /// sync config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// keep only the largest DBSCAN cluster inside each mask
    #[arg(long)]
    cluster: bool,

    #[arg(long)]
    eps: Option<f64>,

    #[arg(long)]
    min_points: Option<usize>,

    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[arg(long, default_value = "sync_report.json")]
    report: PathBuf,

    /// save a rerun recording of the synced selections
    #[arg(long)]
    rerun: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the labels of one image
    Image { image_id: u64 },
    /// Sync every image of the dataset
    Dataset,
}

fn load_config(cli: &MaskSyncCli) -> Result<SyncConfig, Box<dyn std::error::Error>> {
    let mut config: SyncConfig = match &cli.config {
        Some(path) => object_from_json(path)?,
        None => SyncConfig::default(),
    };
    if let Some(eps) = cli.eps {
        config.cluster.eps = eps;
    }
    if let Some(min_points) = cli.min_points {
        config.cluster.min_points = min_points;
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    Ok(config)
}

fn log_summary(
    recording: &rerun::RecordingStream,
    store: &LocalStore,
    summary: &SyncSummary,
) -> Result<(), Box<dyn std::error::Error>> {
    let cloud = PcdDecoder.decode(&summary.local_path)?;
    let image = store.image_info(summary.image_id)?;
    let Some(calibration) = Calibration::from_image_meta(&image.meta)? else {
        return Ok(());
    };
    let frame = CalibratedFrame::new(cloud, &calibration, image.width, image.height);
    let topic = format!("image{}", summary.image_id);
    log_projection(recording, &topic, &frame.project(), image.width, image.height)?;
    let selections: Vec<_> = summary
        .objects
        .iter()
        .zip(&summary.figures)
        .map(|(o, f)| (o.class_title.clone(), f.geometry.indices.clone()))
        .collect();
    log_selections(recording, &topic, &frame.points, &selections)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = MaskSyncCli::parse();
    let config = load_config(&cli)?;

    let store = Arc::new(LocalStore::open(&cli.store)?);
    let mut pipeline = SyncPipeline::new(store.clone(), PcdDecoder, config)?;
    if cli.cluster {
        pipeline.set_apply_clustering(true)?;
    }
    let apply_clustering = pipeline.config().apply_clustering;
    log::info!(
        "clustering {}",
        if apply_clustering { "enabled" } else { "disabled" }
    );
    let recording = match &cli.rerun {
        Some(path) => Some(rerun::RecordingStreamBuilder::new("mask-sync").save(path)?),
        None => None,
    };

    let image_ids: Vec<u64> = match cli.command {
        Commands::Image { image_id } => vec![image_id],
        Commands::Dataset => store
            .list_images(cli.dataset)?
            .iter()
            .map(|img| img.id)
            .collect(),
    };
    log::info!("syncing {} images", image_ids.len());

    let mut reports = Vec::with_capacity(image_ids.len());
    for (seq, image_id) in image_ids.iter().copied().enumerate().progress() {
        let event = ImageEvent::new(image_id, cli.project, cli.dataset);
        let result = pipeline.run(&event);
        match &result {
            Ok(SyncOutcome::Synced(summary)) => {
                if let Some(recording) = &recording {
                    recording.set_time("event", rerun::TimeCell::from_sequence(seq as i64));
                    log_summary(recording, &store, summary)?;
                }
            }
            Err(e) => log::error!("Sync failed for image {}: {}", image_id, e),
            _ => {}
        }
        let status = SyncStatus::from_result(&result);
        println!("image {}: {}", image_id, status.message());
        reports.push(EventReport::new(Some(image_id), &status));
    }

    write_sync_report(&cli.report, apply_clustering, &reports)?;
    println!("report written to {}", cli.report.display());
    Ok(())
}
