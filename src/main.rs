use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shortreel::config::{Command, Config};
use shortreel::media::probe_duration;
use shortreel::process::check_binary;
use shortreel::speech::A4fClient;
use shortreel::{
    cut_clip, install_signal_bridge, split_video, stitch_speech, ClipRequest, ProcessSupervisor,
    SplitRequest, StitchRequest,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shortreel")]
#[command(version, about = "Short-form video tooling around FFmpeg")]
#[command(
    long_about = "Generate narration, split source videos into standardized chunks, and cut vertical clips from them.\n\nThe resulting path is the only thing written to stdout; progress goes to stderr."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to <config dir>/shortreel/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate speech for each text part and stitch it into one MP3
    Stitch(StitchArgs),
    /// Split a source video into high-quality chunks
    Split(SplitArgs),
    /// Cut a random vertical clip from the chunks
    Cut(CutArgs),
}

#[derive(Args)]
struct StitchArgs {
    /// A part of the text to convert to speech; repeat for each part
    #[arg(long = "text", required = true)]
    texts: Vec<String>,

    /// Final output file path for the stitched audio
    #[arg(short, long)]
    output: PathBuf,

    /// Voice to use for speech generation
    #[arg(long)]
    voice: Option<String>,

    /// Model name to use
    #[arg(long)]
    model: Option<String>,
}

#[derive(Args)]
struct SplitArgs {
    /// Source video to be chunked
    #[arg(long)]
    video: PathBuf,

    /// Chunk duration in minutes
    #[arg(long)]
    chunk_minutes: Option<u32>,

    /// Folder to save the chunks in
    #[arg(long)]
    output_folder: Option<PathBuf>,
}

#[derive(Args)]
struct CutArgs {
    /// Desired clip duration in seconds
    #[arg(long, required_unless_present = "audio", conflicts_with = "audio")]
    audio_duration: Option<f64>,

    /// Narration file whose length sets the clip duration
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Enable smart color grading
    #[arg(long, overrides_with = "no_smart_color")]
    smart_color: bool,

    /// Disable smart color grading
    #[arg(long, overrides_with = "smart_color")]
    no_smart_color: bool,

    /// Folder of pre-processed chunks
    #[arg(long)]
    chunks_folder: Option<PathBuf>,

    /// Folder to write the clip to
    #[arg(long)]
    output_folder: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(Some(path.as_path())),
        None => Config::load(),
    };
    config.context("Failed to load configuration")
}

fn build_supervisor(config: &Config) -> Result<ProcessSupervisor> {
    let cancel = install_signal_bridge().context("Failed to install signal handlers")?;
    check_binary(&config.encoder.ffmpeg).with_context(|| {
        format!(
            "{} not found. Install it with: apt install ffmpeg (Linux) or brew install ffmpeg (macOS)",
            config.encoder.ffmpeg.display()
        )
    })?;

    Ok(ProcessSupervisor::new(cancel.token()).with_kill_grace(config.encoder.kill_grace()))
}

async fn run_stitch(args: StitchArgs, config: Config) -> Result<PathBuf> {
    config
        .validate(Command::Stitch)
        .context("Configuration validation failed")?;

    let api_key = config
        .speech
        .api_key
        .clone()
        .context("A4F_API_KEY not set")?;
    let client = A4fClient::new(api_key).with_base_url(config.speech.base_url.clone());
    let supervisor = build_supervisor(&config)?;

    let request = StitchRequest {
        texts: args.texts,
        output: args.output,
        model: args.model.unwrap_or_else(|| config.speech.model.clone()),
        voice: args.voice.unwrap_or_else(|| config.speech.voice.clone()),
    };

    let report = stitch_speech(&request, &client, &supervisor, &config)
        .await
        .context("Failed to generate narration")?;

    if let Some(narration) = report.narration {
        info!(
            "Narration is {:.2}s across {} parts",
            narration.as_secs_f64(),
            report.fragments
        );
    }
    info!("Finished in {:.2}s", report.elapsed.as_secs_f64());

    Ok(report.output_path)
}

async fn run_split(args: SplitArgs, mut config: Config) -> Result<PathBuf> {
    if let Some(minutes) = args.chunk_minutes {
        config.splitter.chunk_minutes = minutes;
    }
    config
        .validate(Command::Split)
        .context("Configuration validation failed")?;

    let supervisor = build_supervisor(&config)?;
    let request = SplitRequest {
        video: args.video,
        output_folder: args
            .output_folder
            .unwrap_or_else(|| config.splitter.output_folder.clone()),
        chunk_minutes: config.splitter.chunk_minutes,
    };

    let report = split_video(&request, &supervisor, &config)
        .await
        .context("Failed to create high-quality chunks")?;

    info!(
        "Successfully created {} chunks in {:.2}s",
        report.chunks.len(),
        report.elapsed.as_secs_f64()
    );

    Ok(report.output_folder)
}

/// Convert `--audio-duration` seconds, rejecting zero, negative, NaN and
/// values too large for a `Duration`.
fn clip_duration(secs: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => anyhow::bail!("Audio duration must be a positive number of seconds, got {secs}"),
    }
}

async fn run_cut(args: CutArgs, mut config: Config) -> Result<PathBuf> {
    if args.smart_color {
        config.clipper.smart_color = true;
    }
    if args.no_smart_color {
        config.clipper.smart_color = false;
    }
    if let Some(dir) = args.chunks_folder {
        config.clipper.chunks_folder = dir;
    }
    if let Some(dir) = args.output_folder {
        config.clipper.output_folder = dir;
    }
    config
        .validate(Command::Cut)
        .context("Configuration validation failed")?;

    let narration = match (args.audio_duration, args.audio) {
        (Some(secs), _) => clip_duration(secs)?,
        (None, Some(audio)) => probe_duration(&config.encoder.ffprobe, &audio)
            .with_context(|| format!("Failed to measure {}", audio.display()))?,
        (None, None) => anyhow::bail!("Either --audio-duration or --audio is required"),
    };

    let supervisor = build_supervisor(&config)?;
    let request = ClipRequest::from_config(narration, &config);
    let mut rng = StdRng::from_entropy();

    let report = cut_clip(&request, &supervisor, &config, &mut rng)
        .await
        .context("Failed to generate a clip")?;

    info!(
        "Clip from {} finished in {:.2}s",
        report.source_chunk.display(),
        report.elapsed.as_secs_f64()
    );

    Ok(report.output_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;

    let output = match cli.command {
        Commands::Stitch(args) => run_stitch(args, config).await?,
        Commands::Split(args) => run_split(args, config).await?,
        Commands::Cut(args) => run_cut(args, config).await?,
    };

    println!("{}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_stitch_collects_repeated_text() {
        let cli = Cli::try_parse_from([
            "shortreel", "stitch", "--text", "Once upon a time", "--text", "The end",
            "--output", "/out/story.mp3",
        ])
        .unwrap();

        match cli.command {
            Commands::Stitch(args) => {
                assert_eq!(args.texts, vec!["Once upon a time", "The end"]);
                assert_eq!(args.output, PathBuf::from("/out/story.mp3"));
                assert!(args.voice.is_none());
            }
            _ => panic!("expected stitch"),
        }
    }

    #[test]
    fn test_cut_requires_a_duration_source() {
        assert!(Cli::try_parse_from(["shortreel", "cut"]).is_err());
        assert!(Cli::try_parse_from(["shortreel", "cut", "--audio-duration", "20"]).is_ok());
        assert!(Cli::try_parse_from(["shortreel", "cut", "--audio", "/n.mp3"]).is_ok());
        assert!(Cli::try_parse_from([
            "shortreel", "cut", "--audio-duration", "20", "--audio", "/n.mp3"
        ])
        .is_err());
    }

    #[test]
    fn test_clip_duration_rejects_unusable_values() {
        assert_eq!(clip_duration(20.5).unwrap(), Duration::from_millis(20_500));
        for secs in [0.0, -3.0, f64::NAN, f64::INFINITY, 1e20] {
            assert!(clip_duration(secs).is_err(), "{secs}");
        }
    }

    #[test]
    fn test_cut_smart_color_last_flag_wins() {
        let cli = Cli::try_parse_from([
            "shortreel", "cut", "--audio-duration", "20", "--smart-color", "--no-smart-color",
        ])
        .unwrap();

        match cli.command {
            Commands::Cut(args) => {
                assert!(!args.smart_color);
                assert!(args.no_smart_color);
            }
            _ => panic!("expected cut"),
        }
    }
}
