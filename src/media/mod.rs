pub mod ffmpeg;
pub mod wav;

pub use ffmpeg::{
    clip_args, color_filter_chain, concat_args, probe_duration, sanitize_stem, segment_args,
    write_concat_list,
};
pub use wav::wav_duration;
