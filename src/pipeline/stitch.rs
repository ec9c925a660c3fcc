//! Narration: synthesize each text fragment, then join them into one MP3.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Result, ShortreelError};
use crate::media::{concat_args, wav_duration, write_concat_list};
use crate::process::{Heartbeat, ProcessSupervisor, TaskDescriptor};
use crate::speech::{SpeechRequest, SpeechSynthesizer};

use super::{ensure_dir, unix_timestamp, TempArtifacts};

#[derive(Debug, Clone)]
pub struct StitchRequest {
    /// Fragments in narration order.
    pub texts: Vec<String>,
    pub output: PathBuf,
    pub model: String,
    pub voice: String,
}

#[derive(Debug, Clone)]
pub struct StitchReport {
    pub output_path: PathBuf,
    pub fragments: usize,
    /// Sum of the fragment lengths, when every fragment was a readable WAV.
    pub narration: Option<Duration>,
    pub elapsed: Duration,
}

const SYNTHESIS_LABEL: &str = "speech synthesis";

fn temp_name(stem: &str, ext: &str) -> String {
    let salt: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{stem}_{}_{salt:06}.{ext}", unix_timestamp())
}

fn fragment_bar(show: bool, total: usize) -> Option<ProgressBar> {
    if !show {
        return None;
    }
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} parts")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    Some(pb)
}

/// Generate speech for every fragment and stitch the parts into `request.output`.
///
/// Any failing fragment aborts the run. Temporary parts and the concat list
/// are removed whether or not the run succeeds.
pub async fn stitch_speech(
    request: &StitchRequest,
    synthesizer: &dyn SpeechSynthesizer,
    supervisor: &ProcessSupervisor,
    config: &Config,
) -> Result<StitchReport> {
    let started = Instant::now();

    if request.texts.is_empty() {
        return Err(ShortreelError::Config(
            "At least one text fragment is required".to_string(),
        ));
    }

    let temp_dir = &config.speech.temp_dir;
    ensure_dir(request.output.parent().unwrap_or(Path::new("")))?;
    ensure_dir(temp_dir)?;

    let total = request.texts.len();
    let mut artifacts = TempArtifacts::new();
    let mut parts: Vec<PathBuf> = Vec::with_capacity(total);
    let mut narration = Some(Duration::ZERO);
    let progress = fragment_bar(config.speech.show_progress, total);
    let mut cancel = supervisor.cancel_token();

    info!("Generating {total} speech parts with {}", synthesizer.name());

    for (i, text) in request.texts.iter().enumerate() {
        let part_num = i + 1;
        if cancel.is_cancelled() {
            warn!("Cancellation requested before part {part_num}/{total}");
            return Err(ShortreelError::SignalTerminated(SYNTHESIS_LABEL.to_string()));
        }
        info!("Generating audio for part {part_num}/{total}...");

        // The service returns WAV regardless of what the caller asks for.
        let part_path = artifacts.track(temp_dir.join(temp_name(&format!("part{part_num}"), "wav")));

        let speech = SpeechRequest::new(&request.model, text, &request.voice);
        let audio = tokio::select! {
            audio = synthesizer.synthesize(&speech) => audio.map_err(|e| {
                error!("Failed to generate part {part_num} audio: {e}");
                e
            })?,
            _ = cancel.cancelled() => {
                warn!("Cancellation requested while generating part {part_num}/{total}");
                return Err(ShortreelError::SignalTerminated(SYNTHESIS_LABEL.to_string()));
            }
        };
        tokio::fs::write(&part_path, &audio).await?;

        match wav_duration(&audio) {
            Some(length) => {
                info!("Generated part {part_num}: {} ({:.2}s)", part_path.display(), length.as_secs_f64());
                narration = narration.map(|total| total + length);
            }
            None => {
                warn!("Part {part_num} is not a readable WAV, narration length unknown");
                narration = None;
            }
        }

        parts.push(part_path);
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let list_path = artifacts.track(temp_dir.join(temp_name("concat_list", "txt")));
    write_concat_list(&list_path, &parts)?;

    info!("Combining {total} audio files into {}", request.output.display());

    let task = TaskDescriptor::new(
        &config.encoder.ffmpeg,
        concat_args(&list_path, &request.output),
    )
    .with_label("ffmpeg concat")
    .with_heartbeat(Heartbeat::ffmpeg_audio())
    .with_stall_timeout(Duration::from_secs(config.speech.stall_timeout_secs));

    let result = supervisor.run(task).await.into_result();
    artifacts.cleanup();
    result?;

    if !request.output.exists() {
        return Err(ShortreelError::OutputValidation(format!(
            "{} was not created",
            request.output.display()
        )));
    }

    info!("Successfully stitched audio to {}", request.output.display());

    Ok(StitchReport {
        output_path: request.output.clone(),
        fragments: total,
        narration,
        elapsed: started.elapsed(),
    })
}
