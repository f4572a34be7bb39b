use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use super::{format_clock, parse_clock};
use crate::command::ColorSpace;

static VIDEO_STREAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Stream #.*?Video: ([A-Za-z0-9_\-]+)").expect("valid video stream pattern"));

static AUDIO_STREAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Stream #.*?Audio: ([A-Za-z0-9_\-]+)").expect("valid audio stream pattern"));

static RESOLUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2,5})x(\d{2,5})\b").expect("valid resolution pattern"));

static BITRATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bitrate: (\d+) kb/s").expect("valid bitrate pattern"));

static FRAME_RATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?) fps").expect("valid frame rate pattern"));

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration: (\d{2}:\d{2}:\d{2}\.\d{2})").expect("valid duration pattern"));

/// Planar YUV pixel formats; the digits after `p` give the bit depth
static PIXEL_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\byuv[a-z]?\d{3}p(\d{2})?").expect("valid pixel format pattern"));

static COLOR_SPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(bt709|bt2020nc|bt2020c|bt2020|bt470bg|smpte170m|bt601)\b").expect("valid color space pattern")
});

/// Stream properties recovered from the `-i <file>` diagnostic dump.
/// Each field is matched independently and may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaStreamInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    /// `WIDTHxHEIGHT`
    pub resolution: Option<String>,
    /// `N kb/s`
    pub bitrate: Option<String>,
    pub frame_rate: Option<String>,
    pub duration: Option<Duration>,
    /// `8-bit`, `10-bit` or `12-bit`
    pub bit_depth: Option<String>,
    /// Canonical dotted name such as `BT.709`
    pub color_space: Option<String>,
}

impl MediaStreamInfo {
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn duration_display(&self) -> String {
        self.duration.map(format_clock).unwrap_or_else(|| "--:--:--".to_string())
    }

    pub fn file_size_display(&self) -> String {
        format_file_size(self.file_size)
    }
}

/// Human readable size with two decimals (`1.50 GB`)
pub fn format_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let size = bytes as f64;
    if size >= KB.powi(4) {
        format!("{:.2} TB", size / KB.powi(4))
    } else if size >= KB.powi(3) {
        format!("{:.2} GB", size / KB.powi(3))
    } else if size >= KB.powi(2) {
        format!("{:.2} MB", size / KB.powi(2))
    } else if size >= KB {
        format!("{:.2} KB", size / KB)
    } else {
        format!("{} B", bytes)
    }
}

fn bit_depth_label(depth: Option<&str>) -> String {
    match depth {
        Some("10") => "10-bit".to_string(),
        Some("12") => "12-bit".to_string(),
        _ => "8-bit".to_string(),
    }
}

/// First capture of `re` in the video stream line if there is one, else anywhere
fn capture_preferring<'a>(re: &Regex, video_line: Option<&'a str>, output: &'a str) -> Option<regex::Captures<'a>> {
    video_line
        .and_then(|line| re.captures(line))
        .or_else(|| re.captures(output))
}

/// Extracts stream properties from the tool's diagnostic dump
pub fn parse_media_info(output: &str) -> MediaStreamInfo {
    let video_line = output.lines().find(|line| VIDEO_STREAM.is_match(line));

    let video_codec = VIDEO_STREAM.captures(output).map(|c| c[1].to_string());
    let audio_codec = AUDIO_STREAM.captures(output).map(|c| c[1].to_string());

    let resolution = capture_preferring(&RESOLUTION, video_line, output)
        .map(|c| format!("{}x{}", &c[1], &c[2]));
    let frame_rate = capture_preferring(&FRAME_RATE, video_line, output).map(|c| c[1].to_string());
    let bit_depth = capture_preferring(&PIXEL_FORMAT, video_line, output)
        .map(|c| bit_depth_label(c.get(1).map(|m| m.as_str())));
    let color_space = capture_preferring(&COLOR_SPACE, video_line, output)
        .and_then(|c| ColorSpace::from_tool_token(&c[1]))
        .and_then(ColorSpace::canonical_name)
        .map(str::to_string);

    let bitrate = BITRATE.captures(output).map(|c| format!("{} kb/s", &c[1]));
    let duration = DURATION.captures(output).and_then(|c| parse_clock(&c[1]));

    MediaStreamInfo {
        video_codec,
        audio_codec,
        resolution,
        bitrate,
        frame_rate,
        duration,
        bit_depth,
        color_space,
        ..Default::default()
    }
}
