//! Pre-processing: re-encode a long source video into standardized chunks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, ShortreelError};
use crate::media::{sanitize_stem, segment_args};
use crate::process::{Heartbeat, ProcessSupervisor, TaskDescriptor};

use super::ensure_dir;

#[derive(Debug, Clone)]
pub struct SplitRequest {
    pub video: PathBuf,
    pub output_folder: PathBuf,
    pub chunk_minutes: u32,
}

#[derive(Debug, Clone)]
pub struct SplitReport {
    pub output_folder: PathBuf,
    /// FFmpeg segment pattern the chunks were written with.
    pub pattern: PathBuf,
    /// Chunks written by this run, new or overwritten, sorted by name.
    /// Older chunks of the same source that this run did not touch are left
    /// out.
    pub chunks: Vec<PathBuf>,
    pub elapsed: Duration,
}

/// Split `request.video` into high-quality chunks of `chunk_minutes` each.
pub async fn split_video(
    request: &SplitRequest,
    supervisor: &ProcessSupervisor,
    config: &Config,
) -> Result<SplitReport> {
    let started = Instant::now();

    if !request.video.exists() {
        return Err(ShortreelError::FileNotFound(
            request.video.display().to_string(),
        ));
    }
    if request.chunk_minutes == 0 {
        return Err(ShortreelError::Config(
            "Chunk duration must be greater than 0 minutes".to_string(),
        ));
    }

    ensure_dir(&request.output_folder)?;

    let settings = &config.splitter;
    let chunk_prefix = format!("{}{}_", settings.filename_prefix, sanitize_stem(&request.video));
    let pattern = request
        .output_folder
        .join(format!("{chunk_prefix}%03d.mp4"));
    let chunk_duration = Duration::from_secs(u64::from(request.chunk_minutes) * 60);

    info!(
        "Starting high-quality split & re-encode for {}",
        request.video.display()
    );
    info!("Output chunks will be ~{} minutes long", request.chunk_minutes);

    let before = chunk_times(&request.output_folder, &chunk_prefix)?;

    let task = TaskDescriptor::new(
        &config.encoder.ffmpeg,
        segment_args(&request.video, &pattern, chunk_duration, settings),
    )
    .with_label("ffmpeg split")
    .with_heartbeat(Heartbeat::ffmpeg_video())
    .with_stall_timeout(Duration::from_secs(settings.stall_timeout_secs));

    supervisor.run(task).await.into_result()?;

    let present = list_chunks(&request.output_folder, &chunk_prefix)?;
    let total = present.len();
    let chunks: Vec<PathBuf> = present
        .into_iter()
        .filter(|path| match before.get(path) {
            Some(previous) => modified_time(path) != *previous,
            None => true,
        })
        .collect();
    if chunks.len() < total {
        debug!(
            "Ignoring {} chunks left over from an earlier split",
            total - chunks.len()
        );
    }

    info!(
        "Created {} chunks in {:.2}s",
        chunks.len(),
        started.elapsed().as_secs_f64()
    );

    Ok(SplitReport {
        output_folder: request.output_folder.clone(),
        pattern,
        chunks,
        elapsed: started.elapsed(),
    })
}

fn list_chunks(folder: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut chunks: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            name.starts_with(prefix) && name.ends_with(".mp4")
        })
        .collect();
    chunks.sort();
    Ok(chunks)
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn chunk_times(folder: &Path, prefix: &str) -> Result<HashMap<PathBuf, Option<SystemTime>>> {
    Ok(list_chunks(folder, prefix)?
        .into_iter()
        .map(|path| {
            let modified = modified_time(&path);
            (path, modified)
        })
        .collect())
}
