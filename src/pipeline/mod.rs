pub mod clip;
pub mod split;
pub mod stitch;
pub mod temp;

pub use clip::{cut_clip, ClipReport, ClipRequest};
pub use split::{split_video, SplitReport, SplitRequest};
pub use stitch::{stitch_speech, StitchReport, StitchRequest};
pub use temp::TempArtifacts;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;

/// Seconds since the Unix epoch, used to keep output names unique.
pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Create `dir` (and parents) unless it is empty or already there.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
