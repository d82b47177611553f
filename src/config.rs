use std::path::PathBuf;

/// Runtime settings shared by the evaluator and the ffmpeg backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// File extensions (without the dot) picked up when `open` is given a
    /// directory. Matched case-insensitively.
    pub media_extensions: Vec<String>,

    /// ffmpeg executable, looked up on `PATH` when relative
    pub ffmpeg: PathBuf,

    /// Where the low-latency preview copy of every export is streamed
    pub preview_sink: String,

    /// Output geometry used to normalise `concat`/`stack` inputs and for
    /// re-encoded exports
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            media_extensions: vec!["mp4".to_string(), "mkv".to_string()],
            ffmpeg: PathBuf::from("ffmpeg"),
            preview_sink: "udp://127.0.0.1:1234".to_string(),
            width: 1920,
            height: 1080,
            frame_rate: 30,
        }
    }
}

impl Config {
    /// `WIDTHxHEIGHT`, as ffmpeg's `-s` expects it.
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}
