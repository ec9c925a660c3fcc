//! Clip cutting: random chunk, smart start, vertical crop and colour grade.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, ShortreelError};
use crate::media::{clip_args, probe_duration, sanitize_stem};
use crate::planner::{Interval, IntervalPlanner};
use crate::process::{Heartbeat, ProcessSupervisor, TaskDescriptor};
use crate::sampling::{select_random_chunk, ChunkFilter};

use super::{ensure_dir, unix_timestamp};

#[derive(Debug, Clone)]
pub struct ClipRequest {
    /// Length of the narration the clip has to cover.
    pub narration: Duration,
    pub chunks_folder: PathBuf,
    pub output_folder: PathBuf,
}

impl ClipRequest {
    pub fn from_config(narration: Duration, config: &Config) -> Self {
        Self {
            narration,
            chunks_folder: config.clipper.chunks_folder.clone(),
            output_folder: config.clipper.output_folder.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClipReport {
    pub output_path: PathBuf,
    pub source_chunk: PathBuf,
    pub interval: Interval,
    pub elapsed: Duration,
}

/// Cut a narration-length clip from a random chunk.
pub async fn cut_clip<R: Rng>(
    request: &ClipRequest,
    supervisor: &ProcessSupervisor,
    config: &Config,
    rng: &mut R,
) -> Result<ClipReport> {
    let started = Instant::now();
    let settings = &config.clipper;

    ensure_dir(&request.output_folder)?;

    let filter = ChunkFilter {
        extension: settings.chunk_extension.clone(),
        min_size: settings.min_chunk_bytes,
    };
    let chunk = select_random_chunk(&request.chunks_folder, &filter, rng)?.ok_or_else(|| {
        ShortreelError::NoQualifyingCandidate(request.chunks_folder.display().to_string())
    })?;
    info!("Selected random chunk: {}", chunk.display());

    let assumed = Duration::try_from_secs_f64(settings.assumed_chunk_secs).map_err(|_| {
        ShortreelError::Config(format!(
            "clipper.assumed_chunk_secs must be a positive number of seconds, got {}",
            settings.assumed_chunk_secs
        ))
    })?;
    let source_duration = if settings.probe_chunk_duration {
        probe_duration(&config.encoder.ffprobe, &chunk).unwrap_or_else(|e| {
            warn!("Could not probe {}: {e}; assuming {:?}", chunk.display(), assumed);
            assumed
        })
    } else {
        assumed
    };

    let planner = IntervalPlanner::new(settings.smart_start.clone());
    let interval = planner.plan(source_duration, request.narration, rng)?;
    info!(
        "Smart start at {:.2}s (clip duration {:.2}s)",
        interval.start.as_secs_f64(),
        interval.duration.as_secs_f64()
    );

    let output_path = request.output_folder.join(format!(
        "{}{}_{}.mp4",
        settings.filename_prefix,
        sanitize_stem(&chunk),
        unix_timestamp()
    ));

    let task = TaskDescriptor::new(
        &config.encoder.ffmpeg,
        clip_args(&chunk, &output_path, &interval, settings),
    )
    .with_label("ffmpeg clip")
    .with_heartbeat(Heartbeat::ffmpeg_video())
    .with_stall_timeout(Duration::from_secs(settings.stall_timeout_secs));

    if let Err(e) = supervisor.run(task).await.into_result() {
        discard_output(&output_path);
        return Err(e);
    }

    let size = std::fs::metadata(&output_path).map(|m| m.len()).map_err(|_| {
        ShortreelError::OutputValidation(format!("{} is missing", output_path.display()))
    })?;
    if size < settings.min_output_bytes {
        discard_output(&output_path);
        return Err(ShortreelError::OutputValidation(format!(
            "{} is only {size} bytes",
            output_path.display()
        )));
    }

    info!("Successfully generated clip: {}", output_path.display());

    Ok(ClipReport {
        output_path,
        source_chunk: chunk,
        interval,
        elapsed: started.elapsed(),
    })
}

/// Remove a partial or undersized clip so the output folder only holds
/// finished ones.
fn discard_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => warn!("Removed incomplete clip {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove incomplete clip {}: {e}", path.display()),
    }
}
