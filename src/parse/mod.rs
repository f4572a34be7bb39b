// Extractors for the tool's free-text output
//
// Every extractor is a pure function over text. Empty or garbled input yields
// a "not installed / not found" value, never a panic or an error.

pub mod codecs;
pub mod encoders;
pub mod media;
pub mod progress;
pub mod version;

pub use codecs::{parse_codecs, CodecDescriptor, CodecKind};
pub use encoders::{default_encoders, encoders_for_category, parse_encoders, EncoderDescriptor};
pub use media::{parse_media_info, MediaStreamInfo};
pub use progress::{parse_duration_line, parse_time, ProgressTracker};
pub use version::{parse_version, VersionInfo};

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// `HH:MM:SS.ff` with any number of fraction digits
static CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+):(\d{2}):(\d{2})(?:\.(\d+))?$").expect("valid clock pattern"));

/// Parses a `HH:MM:SS.ff` clock value
pub fn parse_clock(text: &str) -> Option<Duration> {
    let caps = CLOCK.captures(text.trim())?;
    let hours: u64 = caps[1].parse().ok()?;
    let minutes: u64 = caps[2].parse().ok()?;
    let seconds: u64 = caps[3].parse().ok()?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    let nanos = match caps.get(4) {
        Some(digits) => {
            let digits = &digits.as_str()[..digits.len().min(9)];
            let value: u32 = digits.parse().ok()?;
            value * 10u32.pow(9 - digits.len() as u32)
        }
        None => 0,
    };

    let secs = hours.checked_mul(3600)?.checked_add(minutes * 60 + seconds)?;
    Some(Duration::new(secs, nanos))
}

/// Formats a duration as `HH:MM:SS`
pub fn format_clock(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("00:01:40.00"), Some(Duration::from_secs(100)));
        assert_eq!(parse_clock("01:00:00.5"), Some(Duration::from_millis(3_600_500)));
        assert_eq!(parse_clock("00:00:07"), Some(Duration::from_secs(7)));
        assert_eq!(parse_clock("00:61:00.00"), None);
        assert_eq!(parse_clock("N/A"), None);
    }

    #[test]
    fn test_parse_clock_rejects_overflowing_hours() {
        assert_eq!(parse_clock("99999999999999999:00:00.00"), None);
        assert_eq!(parse_clock("99999999999999999999999:00:00"), None);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(Duration::from_secs(3661)), "01:01:01");
        assert_eq!(format_clock(Duration::from_millis(59_999)), "00:00:59");
    }
}
