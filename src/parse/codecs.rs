use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// ` DEV.LS h264   H.264 / AVC ...`: decode, encode, type, intra-only, lossy, lossless
static CODEC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([D.])([E.])([VASDT.])([I.])([L.])([S.])\s+(\S+)\s+(.+)$").expect("valid codec line pattern")
});

/// Ordered video, audio, subtitle, other
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CodecKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

impl CodecKind {
    fn from_flag(flag: &str) -> Self {
        match flag {
            "V" => CodecKind::Video,
            "A" => CodecKind::Audio,
            "S" => CodecKind::Subtitle,
            _ => CodecKind::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CodecKind::Video => "video",
            CodecKind::Audio => "audio",
            CodecKind::Subtitle => "subtitle",
            CodecKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodecDescriptor {
    pub name: String,
    pub description: String,
    pub kind: CodecKind,
    pub decoder: bool,
    pub encoder: bool,
    pub intra_only: bool,
    pub lossy: bool,
    pub lossless: bool,
}

/// Codec catalog from `-codecs` output, sorted by kind then name.
/// Lines without the six flag columns (and the legend) are dropped.
pub fn parse_codecs(output: &str) -> Vec<CodecDescriptor> {
    let mut codecs: Vec<CodecDescriptor> = output
        .lines()
        .filter_map(|line| {
            let caps = CODEC_LINE.captures(line)?;
            let name = caps[7].trim();
            if name == "=" {
                return None;
            }

            Some(CodecDescriptor {
                name: name.to_string(),
                description: caps[8].trim().to_string(),
                kind: CodecKind::from_flag(&caps[3]),
                decoder: &caps[1] == "D",
                encoder: &caps[2] == "E",
                intra_only: &caps[4] == "I",
                lossy: &caps[5] == "L",
                lossless: &caps[6] == "S",
            })
        })
        .collect();

    codecs.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
    codecs
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Codecs:
 D..... = Decoding supported
 .E.... = Encoding supported
 ..V... = Video codec
 ..A... = Audio codec
 ..S... = Subtitle codec
 ...I.. = Intra frame-only codec
 ....L. = Lossy compression
 .....S = Lossless compression
 -------
 DEAIL. aac                  AAC (Advanced Audio Coding) (decoders: aac aac_fixed)
 DEV.LS h264                 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 (encoders: libx264 h264_nvenc)
 DES... ass                  ASS (Advanced SSA) subtitle
 D.V.L. av1                  Alliance for Open Media AV1
 D.D... bin_data             binary data
garbage line
";

    #[test]
    fn test_single_line() {
        let codecs = parse_codecs("D.V.L. h264    H.264 / AVC");
        assert_eq!(codecs.len(), 1);
        let h264 = &codecs[0];
        assert_eq!(h264.name, "h264");
        assert_eq!(h264.description, "H.264 / AVC");
        assert_eq!(h264.kind, CodecKind::Video);
        assert!(h264.decoder);
        assert!(!h264.encoder);
        assert!(h264.lossy);
    }

    #[test]
    fn test_full_listing_sorted_and_legend_dropped() {
        let codecs = parse_codecs(LISTING);
        let names: Vec<_> = codecs.iter().map(|c| (c.kind, c.name.as_str())).collect();
        assert_eq!(
            names,
            vec![
                (CodecKind::Video, "av1"),
                (CodecKind::Video, "h264"),
                (CodecKind::Audio, "aac"),
                (CodecKind::Subtitle, "ass"),
                (CodecKind::Other, "bin_data"),
            ]
        );
        assert!(codecs.iter().find(|c| c.name == "aac").unwrap().intra_only);
    }

    #[test]
    fn test_garbage_input() {
        assert!(parse_codecs("").is_empty());
        assert!(parse_codecs("\u{0}\u{1}not a listing\n\n").is_empty());
    }
}
