use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::config::{ClipperConfig, SplitterConfig};
use crate::error::{Result, ShortreelError};
use crate::planner::Interval;

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Replace everything but alphanumerics, `_` and `-` in a file stem with `_`.
pub fn sanitize_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Write an FFmpeg concat-demuxer list referencing `inputs` by absolute path.
pub fn write_concat_list(list_path: &Path, inputs: &[impl AsRef<Path>]) -> Result<()> {
    let mut contents = String::new();
    for input in inputs {
        let absolute = std::path::absolute(input.as_ref())?;
        let quoted = path_arg(&absolute).replace('\'', r"'\''");
        contents.push_str(&format!("file '{quoted}'\n"));
    }
    std::fs::write(list_path, contents)?;
    Ok(())
}

/// Concatenate the files in a concat list and re-encode to MP3 (VBR q2).
pub fn concat_args(list_path: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        path_arg(list_path),
        "-c:a".into(),
        "libmp3lame".into(),
        "-q:a".into(),
        "2".into(),
        path_arg(output),
    ]
}

/// Rescale, re-encode and cut `input` into fixed-length segments.
pub fn segment_args(
    input: &Path,
    output_pattern: &Path,
    chunk_duration: Duration,
    settings: &SplitterConfig,
) -> Vec<String> {
    vec![
        "-y".into(),
        "-nostdin".into(),
        "-i".into(),
        path_arg(input),
        "-vf".into(),
        format!(
            "scale={}:{}:flags=lanczos,fps={}",
            settings.target_width, settings.target_height, settings.target_fps
        ),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        settings.preset.clone(),
        "-crf".into(),
        settings.crf.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-an".into(),
        "-f".into(),
        "segment".into(),
        "-segment_time".into(),
        chunk_duration.as_secs().to_string(),
        "-reset_timestamps".into(),
        "1".into(),
        "-movflags".into(),
        "+faststart".into(),
        path_arg(output_pattern),
    ]
}

/// Crop to 9:16 with an even width, optionally followed by a contrast and
/// saturation boost.
pub fn color_filter_chain(smart_color: bool) -> String {
    let mut chain = vec!["crop=floor(ih*9/16/2)*2:ih"];
    if smart_color {
        chain.extend(["curves=preset=strong_contrast", "hue=s=1.15"]);
    }
    chain.join(",")
}

/// Cut `interval` out of `input` as a vertical, silent H.264 clip.
pub fn clip_args(
    input: &Path,
    output: &Path,
    interval: &Interval,
    settings: &ClipperConfig,
) -> Vec<String> {
    vec![
        "-y".into(),
        "-nostdin".into(),
        "-ss".into(),
        format!("{:.3}", interval.start.as_secs_f64()),
        "-i".into(),
        path_arg(input),
        "-t".into(),
        format!("{:.3}", interval.duration.as_secs_f64()),
        "-vf".into(),
        color_filter_chain(settings.smart_color),
        "-an".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        settings.preset.clone(),
        "-crf".into(),
        settings.crf.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-movflags".into(),
        "+faststart".into(),
        path_arg(output),
    ]
}

/// Get a media file's duration using FFprobe.
pub fn probe_duration(ffprobe: &Path, input: &Path) -> Result<Duration> {
    if !input.exists() {
        return Err(ShortreelError::FileNotFound(input.display().to_string()));
    }

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .output()
        .map_err(|source| ShortreelError::LaunchFailed {
            program: ffprobe.display().to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ShortreelError::Probe(format!(
            "{} failed on {}: {}",
            ffprobe.display(),
            input.display(),
            stderr.trim()
        )));
    }

    let duration_str = String::from_utf8_lossy(&output.stdout);
    let duration_secs: f64 = duration_str.trim().parse().map_err(|e| {
        ShortreelError::Probe(format!(
            "Failed to parse duration '{}': {e}",
            duration_str.trim()
        ))
    })?;

    let duration = Duration::try_from_secs_f64(duration_secs).map_err(|_| {
        ShortreelError::Probe(format!(
            "Invalid duration {duration_secs} for {}",
            input.display()
        ))
    })?;

    debug!("{} is {:.2}s long", input.display(), duration_secs);
    Ok(duration)
}
