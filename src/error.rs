use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShortreelError {
    #[error("Failed to launch {program}: {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} stalled: no progress within the stall timeout")]
    StallTerminated(String),

    #[error("{label} exited with code {code}{}", format_tail(.tail))]
    NonZeroExit {
        label: String,
        code: i32,
        tail: Vec<String>,
    },

    #[error("{0} terminated by signal")]
    SignalTerminated(String),

    #[error("No qualifying candidate found in {0}")]
    NoQualifyingCandidate(String),

    #[error("Infeasible duration: clip {clip:.2}s exceeds source {source_duration:.2}s")]
    InfeasibleDuration { clip: f64, source_duration: f64 },

    #[error("Speech service error: {0}")]
    UpstreamService(String),

    #[error("Output validation failed: {0}")]
    OutputValidation(String),

    #[error("Media probe failed: {0}")]
    Probe(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ShortreelError {
    fn from(err: reqwest::Error) -> Self {
        ShortreelError::UpstreamService(err.to_string())
    }
}

fn format_tail(tail: &[String]) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!("\n{}", tail.join("\n"))
    }
}

pub type Result<T> = std::result::Result<T, ShortreelError>;
