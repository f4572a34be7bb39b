use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, StudioError};
use crate::presets::PresetLookup;

/// Output container, selected by the output file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Container {
    #[default]
    Mp4,
    Mkv,
    Avi,
    Mov,
    Flv,
    WebM,
}

impl Container {
    pub const ALL: [Container; 6] = [
        Container::Mp4,
        Container::Mkv,
        Container::Avi,
        Container::Mov,
        Container::Flv,
        Container::WebM,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mkv => "mkv",
            Container::Avi => "avi",
            Container::Mov => "mov",
            Container::Flv => "flv",
            Container::WebM => "webm",
        }
    }
}

impl FromStr for Container {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        Container::ALL
            .into_iter()
            .find(|c| c.extension().eq_ignore_ascii_case(s.trim().trim_start_matches('.')))
            .ok_or_else(|| StudioError::Config(format!(
                "Unknown container '{}'. Valid containers: mp4, mkv, avi, mov, flv, webm",
                s
            )))
    }
}

/// Coarse codec family shown to the user; concrete encoders are discovered per family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecCategory {
    #[default]
    H264,
    H265,
    Vp9,
    Av1,
}

impl CodecCategory {
    pub const ALL: [CodecCategory; 4] = [
        CodecCategory::H264,
        CodecCategory::H265,
        CodecCategory::Vp9,
        CodecCategory::Av1,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CodecCategory::H264 => "H.264",
            CodecCategory::H265 => "H.265",
            CodecCategory::Vp9 => "VP9",
            CodecCategory::Av1 => "AV1",
        }
    }
}

impl fmt::Display for CodecCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CodecCategory {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "h264" | "avc" | "x264" => Ok(CodecCategory::H264),
            "h265" | "hevc" | "x265" => Ok(CodecCategory::H265),
            "vp9" => Ok(CodecCategory::Vp9),
            "av1" => Ok(CodecCategory::Av1),
            _ => Err(StudioError::Config(format!(
                "Unknown codec '{}'. Valid codecs: H.264, H.265, VP9, AV1",
                s
            ))),
        }
    }
}

/// Output resolution selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    Original,
    Explicit { width: u32, height: u32 },
    /// The command was edited by hand; the selector no longer describes it
    Custom,
}

impl FromStr for Resolution {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("original") {
            return Ok(Resolution::Original);
        }

        let invalid = || StudioError::Config(format!("Invalid resolution '{}', expected WIDTHxHEIGHT", s));
        let (width, height) = s.split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = width.trim().parse().map_err(|_| invalid())?;
        let height = height.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Resolution::Explicit { width, height })
    }
}

/// Video bitrate selector, in kbit/s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bitrate {
    #[default]
    Original,
    Kbps(u32),
    Custom,
}

impl FromStr for Bitrate {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("original") {
            return Ok(Bitrate::Original);
        }

        let digits = s.trim_end_matches(['k', 'K']);
        match digits.parse::<u32>() {
            Ok(kbps) if kbps > 0 => Ok(Bitrate::Kbps(kbps)),
            _ => Err(StudioError::Config(format!("Invalid bitrate '{}', expected kbit/s such as 5000k", s))),
        }
    }
}

/// Frame rate selector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FrameRate {
    #[default]
    Original,
    Fps(f64),
    Custom,
}

impl FrameRate {
    /// Token form of an explicit rate (`30`, `29.97`)
    pub fn token(&self) -> Option<String> {
        match self {
            FrameRate::Fps(rate) => Some(rate.to_string()),
            _ => None,
        }
    }
}

impl FromStr for FrameRate {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("original") {
            return Ok(FrameRate::Original);
        }

        match s.parse::<f64>() {
            Ok(rate) if rate.is_finite() && rate > 0.0 => Ok(FrameRate::Fps(rate)),
            _ => Err(StudioError::Config(format!("Invalid frame rate '{}'", s))),
        }
    }
}

/// Color standards understood by the builder and the probe parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Original,
    Bt601,
    Bt709,
    Bt2020,
    Custom,
}

impl ColorSpace {
    /// Canonical dotted name (`BT.709`)
    pub fn canonical_name(self) -> Option<&'static str> {
        match self {
            ColorSpace::Bt601 => Some("BT.601"),
            ColorSpace::Bt709 => Some("BT.709"),
            ColorSpace::Bt2020 => Some("BT.2020"),
            ColorSpace::Original | ColorSpace::Custom => None,
        }
    }

    /// Value passed to `-colorspace`
    pub fn tool_value(self) -> Option<&'static str> {
        match self {
            ColorSpace::Bt601 => Some("smpte170m"),
            ColorSpace::Bt709 => Some("bt709"),
            ColorSpace::Bt2020 => Some("bt2020nc"),
            ColorSpace::Original | ColorSpace::Custom => None,
        }
    }

    /// Maps a color token from the tool's diagnostic output to a standard
    pub fn from_tool_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "bt709" => Some(ColorSpace::Bt709),
            "bt601" | "bt470bg" | "smpte170m" => Some(ColorSpace::Bt601),
            "bt2020" | "bt2020nc" | "bt2020c" => Some(ColorSpace::Bt2020),
            _ => None,
        }
    }
}

impl FromStr for ColorSpace {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        let compact: String = s.chars().filter(|c| *c != '.' && *c != ' ').collect();
        if compact.eq_ignore_ascii_case("original") {
            return Ok(ColorSpace::Original);
        }
        ColorSpace::from_tool_token(&compact).ok_or_else(|| {
            StudioError::Config(format!("Unknown color space '{}'. Valid: BT.601, BT.709, BT.2020", s))
        })
    }
}

/// Audio encoder identifier used when a separate audio input is muxed in.
/// Names outside the map yield no audio codec token.
pub fn audio_encoder_for(codec: &str) -> Option<&'static str> {
    match codec.trim().to_ascii_lowercase().as_str() {
        "aac" => Some("aac"),
        "mp3" => Some("libmp3lame"),
        "opus" => Some("libopus"),
        "vorbis" => Some("libvorbis"),
        "flac" => Some("flac"),
        "ac3" => Some("ac3"),
        "pcm" | "wav" => Some("pcm_s16le"),
        _ => None,
    }
}

/// Where the job reads its frames from
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    File(PathBuf),
    FrameSequence {
        directory: PathBuf,
        audio: Option<PathBuf>,
    },
}

/// Snapshot of the user's choices at command-build time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSet {
    pub container: Container,
    pub codec: CodecCategory,
    pub encoder: Option<String>,
    pub resolution: Resolution,
    pub bitrate: Bitrate,
    pub frame_rate: FrameRate,
    pub color_space: ColorSpace,
    pub quality_preset: Option<String>,
    /// Opaque fragment resolved from the preset document
    pub quality_params: String,
    pub audio_codec: Option<String>,
    pub advanced: bool,
    pub source: Option<Source>,
    pub output: Option<PathBuf>,
}

impl ParameterSet {
    pub fn transcode<P: Into<PathBuf>>(source: P) -> Self {
        Self {
            source: Some(Source::File(source.into())),
            ..Default::default()
        }
    }

    pub fn frame_sequence<P: Into<PathBuf>>(directory: P, audio: Option<PathBuf>) -> Self {
        Self {
            source: Some(Source::FrameSequence {
                directory: directory.into(),
                audio,
            }),
            frame_rate: FrameRate::Fps(30.0),
            ..Default::default()
        }
    }

    /// Resolves `quality_preset` against the preset document into `quality_params`
    pub fn resolve_preset(&mut self, presets: &dyn PresetLookup) -> Result<()> {
        let Some(preset) = self.quality_preset.as_deref() else {
            return Ok(());
        };
        let encoder = self
            .encoder
            .as_deref()
            .ok_or_else(|| StudioError::Build("a quality preset needs an encoder".to_string()))?;

        self.quality_params = presets.lookup(encoder, preset).ok_or_else(|| {
            StudioError::Build(format!("no quality preset '{}' for encoder '{}'", preset, encoder))
        })?;
        Ok(())
    }

    /// Flags the advanced selectors as hand-edited. There is no way back short
    /// of choosing new selector values.
    pub fn mark_custom(&mut self) {
        self.resolution = Resolution::Custom;
        self.bitrate = Bitrate::Custom;
        self.frame_rate = FrameRate::Custom;
        self.color_space = ColorSpace::Custom;
    }

    pub fn is_custom(&self) -> bool {
        self.resolution == Resolution::Custom
            || self.bitrate == Bitrate::Custom
            || self.frame_rate == FrameRate::Custom
            || self.color_space == ColorSpace::Custom
    }

    /// Explicit output path, or one derived next to the source
    pub fn output_path(&self) -> Option<PathBuf> {
        if let Some(output) = &self.output {
            return Some(output.clone());
        }

        let ext = self.container.extension();
        match self.source.as_ref()? {
            Source::File(path) => {
                let stem = path.file_stem()?.to_string_lossy();
                Some(sibling(path, &format!("{}_transcoded.{}", stem, ext)))
            }
            Source::FrameSequence { directory, .. } => {
                let name = directory.file_name()?.to_string_lossy();
                Some(sibling(directory, &format!("{}.{}", name, ext)))
            }
        }
    }
}

fn sibling(path: &Path, file_name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Still image format for frame extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpg,
    Bmp,
    Tiff,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            "bmp" => Ok(ImageFormat::Bmp),
            "tif" | "tiff" => Ok(ImageFormat::Tiff),
            _ => Err(StudioError::Config(format!(
                "Unknown image format '{}'. Valid formats: png, jpg, bmp, tiff",
                s
            ))),
        }
    }
}

/// Parameters for splitting a video into numbered still images
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractParams {
    pub video: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    /// printf-style file name, e.g. `frame_%06d.png`
    pub template: String,
    pub format: ImageFormat,
    /// Keep every Nth frame (advanced mode only)
    pub frame_interval: u32,
    pub advanced: bool,
}

pub const DEFAULT_FRAME_TEMPLATE: &str = "frame_%06d.png";

impl Default for ExtractParams {
    fn default() -> Self {
        Self {
            video: None,
            output_dir: None,
            template: DEFAULT_FRAME_TEMPLATE.to_string(),
            format: ImageFormat::Png,
            frame_interval: 1,
            advanced: false,
        }
    }
}
