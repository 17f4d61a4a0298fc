//! Media-tool integration: probing sources with ffprobe, building ffmpeg
//! argument vectors, detecting hardware encoders, and one-shot asset
//! extraction (sprites, subtitles). Everything that shells out lives here.

pub mod assets;
pub mod cmd;
pub mod hwaccel;
pub mod probe;
