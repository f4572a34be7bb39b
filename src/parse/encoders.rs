use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::command::CodecCategory;

/// ` V....D libx264   libx264 H.264 / AVC ...`: type column plus capability flags
static ENCODER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([VAS.])([A-Z.]{4,5})\s+(\S+)\s*(.*)$").expect("valid encoder line pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncoderDescriptor {
    pub name: String,
    pub description: String,
    /// `V`, `A` or `S`
    pub kind: char,
}

/// Implementation-name fragments that identify a family's encoders
fn keywords(category: CodecCategory) -> &'static [&'static str] {
    match category {
        CodecCategory::H264 => &["264", "avc"],
        CodecCategory::H265 => &["265", "hevc"],
        CodecCategory::Vp9 => &["vp9"],
        CodecCategory::Av1 => &["av1"],
    }
}

/// Offered when the listing yields nothing for a family
pub fn default_encoders(category: CodecCategory) -> Vec<String> {
    let names: &[&str] = match category {
        CodecCategory::H264 => &["libx264", "h264_nvenc", "h264_qsv", "h264_amf"],
        CodecCategory::H265 => &["libx265", "hevc_nvenc", "hevc_qsv", "hevc_amf"],
        CodecCategory::Vp9 => &["libvpx-vp9", "vp9_qsv"],
        CodecCategory::Av1 => &["libsvtav1", "libaom-av1", "av1_nvenc", "av1_qsv"],
    };
    names.iter().map(|n| n.to_string()).collect()
}

/// Encoder listing from `-encoders` output; legend lines are dropped
pub fn parse_encoders(output: &str) -> Vec<EncoderDescriptor> {
    output
        .lines()
        .filter_map(|line| {
            let caps = ENCODER_LINE.captures(line)?;
            let name = caps[3].trim();
            if name == "=" {
                return None;
            }
            Some(EncoderDescriptor {
                name: name.to_string(),
                description: caps[4].trim().to_string(),
                kind: caps[1].chars().next().unwrap_or('.'),
            })
        })
        .collect()
}

/// Video encoders whose name or description mentions one of the family's
/// keywords (case-insensitive), de-duplicated in listing order. Falls back to
/// the family's defaults when nothing matches.
pub fn encoders_for_category(output: &str, category: CodecCategory) -> Vec<String> {
    let keywords = keywords(category);
    let mut names: Vec<String> = Vec::new();

    for encoder in parse_encoders(output) {
        if encoder.kind != 'V' {
            continue;
        }
        let name = encoder.name.to_lowercase();
        let description = encoder.description.to_lowercase();
        let matched = keywords
            .iter()
            .any(|k| name.contains(k) || description.contains(k));

        if matched && !names.contains(&encoder.name) {
            names.push(encoder.name);
        }
    }

    if names.is_empty() {
        default_encoders(category)
    } else {
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Encoders:
 V..... = Video
 A..... = Audio
 S..... = Subtitle
 .F.... = Frame-level multithreading
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 (codec h264)
 V....D libx264rgb           libx264 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 RGB (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 V....D libx265              libx265 H.265 / HEVC (codec hevc)
 V....D hevc_nvenc           NVIDIA NVENC hevc encoder (codec hevc)
 V....D libvpx-vp9           libvpx VP9 (codec vp9)
 V....D libsvtav1            SVT-AV1(Scalable Video Technology for AV1) encoder (codec av1)
 A....D aac                  AAC (Advanced Audio Coding)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
";

    #[test]
    fn test_keyword_match_and_dedup() {
        assert_eq!(
            encoders_for_category(LISTING, CodecCategory::H264),
            vec!["libx264", "libx264rgb", "h264_nvenc"]
        );
        assert_eq!(
            encoders_for_category(LISTING, CodecCategory::H265),
            vec!["libx265", "hevc_nvenc"]
        );
        assert_eq!(encoders_for_category(LISTING, CodecCategory::Av1), vec!["libsvtav1"]);
    }

    #[test]
    fn test_fallback_defaults() {
        assert_eq!(
            encoders_for_category("", CodecCategory::Vp9),
            default_encoders(CodecCategory::Vp9)
        );
        let audio_only = " A....D aac   AAC (Advanced Audio Coding)";
        assert_eq!(
            encoders_for_category(audio_only, CodecCategory::H264),
            default_encoders(CodecCategory::H264)
        );
    }

    #[test]
    fn test_five_flag_columns_accepted() {
        let encoders = parse_encoders(" V.... libx264   libx264 H.264 / AVC");
        assert_eq!(encoders.len(), 1);
        assert_eq!(encoders[0].name, "libx264");
        assert_eq!(encoders[0].kind, 'V');
    }
}
