use crate::error::{Result, ShortreelError};
use crate::planner::PlannerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which utility is about to run; validation depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Stitch,
    Split,
    Cut,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Stitch => write!(f, "stitch"),
            Command::Split => write!(f, "split"),
            Command::Cut => write!(f, "cut"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible speech API.
    pub base_url: String,
    pub model: String,
    pub voice: String,
    /// Scratch directory for generated fragments; emptied after every run.
    pub temp_dir: PathBuf,
    pub stall_timeout_secs: u64,
    pub show_progress: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::speech::a4f::DEFAULT_BASE_URL.to_string(),
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            temp_dir: PathBuf::from("/files/temp_processing"),
            stall_timeout_secs: 60,
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    pub output_folder: PathBuf,
    pub filename_prefix: String,
    pub chunk_minutes: u32,
    pub stall_timeout_secs: u64,
    pub target_width: u32,
    pub target_height: u32,
    pub target_fps: u32,
    pub preset: String,
    pub crf: u8,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            output_folder: PathBuf::from("/files/video_chunks"),
            filename_prefix: "chunk_".to_string(),
            chunk_minutes: 3,
            stall_timeout_secs: 300,
            target_width: 1280,
            target_height: 720,
            target_fps: 40,
            preset: "veryfast".to_string(),
            crf: 22,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipperConfig {
    pub chunks_folder: PathBuf,
    pub output_folder: PathBuf,
    pub filename_prefix: String,
    pub chunk_extension: String,
    /// Chunks must be larger than this to be picked.
    pub min_chunk_bytes: u64,
    /// Chunk length assumed for smart start; matches the splitter's output.
    pub assumed_chunk_secs: f64,
    /// Ask ffprobe for the real chunk length instead of assuming it.
    pub probe_chunk_duration: bool,
    pub smart_start: PlannerConfig,
    pub stall_timeout_secs: u64,
    pub preset: String,
    pub crf: u8,
    pub smart_color: bool,
    /// Outputs smaller than this are treated as failed encodes.
    pub min_output_bytes: u64,
}

impl Default for ClipperConfig {
    fn default() -> Self {
        Self {
            chunks_folder: PathBuf::from("/files/video_chunks"),
            output_folder: PathBuf::from("/files/output_shorts_clips"),
            filename_prefix: "short_".to_string(),
            chunk_extension: "mp4".to_string(),
            min_chunk_bytes: 100_000,
            assumed_chunk_secs: 180.0,
            probe_chunk_duration: false,
            smart_start: PlannerConfig::default(),
            stall_timeout_secs: 60,
            preset: "veryfast".to_string(),
            crf: 22,
            smart_color: true,
            min_output_bytes: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Milliseconds between SIGTERM and SIGKILL when stopping the encoder.
    pub kill_grace_ms: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            kill_grace_ms: 1000,
        }
    }
}

impl EncoderConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub speech: SpeechConfig,
    pub splitter: SplitterConfig,
    pub clipper: ClipperConfig,
    pub encoder: EncoderConfig,
}

impl Config {
    /// Load the default config file (if any), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path().filter(|p| p.exists());
        Self::load_from(path.as_deref())
    }

    /// Load from an explicit file, then apply environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    ShortreelError::Config(format!("Failed to read {}: {e}", path.display()))
                })?;
                toml::from_str::<Config>(&contents).map_err(|e| {
                    ShortreelError::Config(format!("Failed to parse {}: {e}", path.display()))
                })?
            }
            None => Self::default(),
        };

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("A4F_API_KEY") {
            self.speech.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("SHORTREEL_SPEECH_URL") {
            self.speech.base_url = url;
        }
        if let Ok(dir) = std::env::var("SHORTREEL_TEMP_DIR") {
            self.speech.temp_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("SHORTREEL_CHUNKS_DIR") {
            self.splitter.output_folder = PathBuf::from(&dir);
            self.clipper.chunks_folder = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("SHORTREEL_OUTPUT_DIR") {
            self.clipper.output_folder = PathBuf::from(dir);
        }
        if let Ok(bin) = std::env::var("SHORTREEL_FFMPEG") {
            self.encoder.ffmpeg = PathBuf::from(bin);
        }
        if let Ok(bin) = std::env::var("SHORTREEL_FFPROBE") {
            self.encoder.ffprobe = PathBuf::from(bin);
        }
    }

    pub fn validate(&self, command: Command) -> Result<()> {
        match command {
            Command::Stitch => {
                if self.speech.api_key.is_none() {
                    return Err(ShortreelError::Config(
                        "A4F_API_KEY not set. Export it with: export A4F_API_KEY=ddc-..."
                            .to_string(),
                    ));
                }
                if self.speech.stall_timeout_secs == 0 {
                    return Err(ShortreelError::Config(
                        "speech.stall_timeout_secs must be greater than 0".to_string(),
                    ));
                }
            }
            Command::Split => {
                if self.splitter.chunk_minutes == 0 {
                    return Err(ShortreelError::Config(
                        "Chunk duration must be greater than 0 minutes".to_string(),
                    ));
                }
                if self.splitter.stall_timeout_secs == 0 {
                    return Err(ShortreelError::Config(
                        "splitter.stall_timeout_secs must be greater than 0".to_string(),
                    ));
                }
            }
            Command::Cut => {
                self.clipper.smart_start.validate()?;

                let assumed = self.clipper.assumed_chunk_secs;
                if !matches!(Duration::try_from_secs_f64(assumed), Ok(d) if !d.is_zero()) {
                    return Err(ShortreelError::Config(format!(
                        "clipper.assumed_chunk_secs must be a positive number of seconds, got {assumed}"
                    )));
                }
                if self.clipper.stall_timeout_secs == 0 {
                    return Err(ShortreelError::Config(
                        "clipper.stall_timeout_secs must be greater than 0".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("shortreel").join("config.toml"))
    }
}
