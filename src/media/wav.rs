use std::io::Cursor;
use std::time::Duration;

use hound::WavReader;

/// Duration of an in-memory WAV file, if it parses as one.
///
/// Streaming TTS endpoints sometimes leave the data length unset, in which
/// case this returns `None`.
pub fn wav_duration(bytes: &[u8]) -> Option<Duration> {
    let reader = WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }

    let frames = reader.duration();
    Some(Duration::from_secs_f64(
        frames as f64 / spec.sample_rate as f64,
    ))
}
