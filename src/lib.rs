pub mod cancel;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod planner;
pub mod process;
pub mod sampling;
pub mod speech;

pub use cancel::{cancel_pair, install_signal_bridge, CancelHandle, CancelToken};
pub use config::Config;
pub use error::{Result, ShortreelError};
pub use pipeline::{
    cut_clip, split_video, stitch_speech, ClipReport, ClipRequest, SplitReport, SplitRequest,
    StitchReport, StitchRequest,
};
pub use planner::{Interval, IntervalPlanner, PlannerConfig};
pub use process::{
    Heartbeat, ProcessSupervisor, SupervisionOutcome, SupervisionReport, TaskDescriptor,
};
pub use sampling::{select_one, select_random_chunk, ChunkFilter};
