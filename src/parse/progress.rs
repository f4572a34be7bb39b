use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

use super::parse_clock;

static TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=\s*(\d+:\d{2}:\d{2}(?:\.\d+)?)").expect("valid time pattern"));

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration:\s*(\d+:\d{2}:\d{2}(?:\.\d+)?)").expect("valid duration pattern"));

/// Ceiling for progress estimated without a known duration
pub const ESTIMATE_CAP: u8 = 95;

/// Elapsed output time from a `time=HH:MM:SS.ff` token
pub fn parse_time(line: &str) -> Option<Duration> {
    TIME.captures(line).and_then(|c| parse_clock(&c[1]))
}

/// Total input duration from a `Duration: HH:MM:SS.ff` line
pub fn parse_duration_line(line: &str) -> Option<Duration> {
    DURATION.captures(line).and_then(|c| parse_clock(&c[1]))
}

/// `100 * elapsed / total`, clamped to 0..=100
pub fn percent(elapsed: Duration, total: Duration) -> u8 {
    if total.is_zero() {
        return 0;
    }
    let ratio = 100.0 * elapsed.as_secs_f64() / total.as_secs_f64();
    ratio.clamp(0.0, 100.0) as u8
}

/// Turns a job's output lines into a non-decreasing progress value.
///
/// With a known total the value follows the elapsed timestamps. Without one,
/// every timestamp advances the value by one point up to [`ESTIMATE_CAP`].
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    total: Option<Duration>,
    current: u8,
    discover: bool,
}

impl ProgressTracker {
    pub fn new(total: Option<Duration>) -> Self {
        Self {
            total: total.filter(|t| !t.is_zero()),
            current: 0,
            discover: false,
        }
    }

    /// Like [`ProgressTracker::new`], but a `Duration:` line seen while the
    /// total is unknown becomes the total
    pub fn discovering(total: Option<Duration>) -> Self {
        Self {
            discover: true,
            ..Self::new(total)
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn total(&self) -> Option<Duration> {
        self.total
    }

    /// Feeds one output line. Returns the progress when the line carried a timestamp.
    pub fn observe(&mut self, line: &str) -> Option<u8> {
        if self.discover && self.total.is_none() {
            if let Some(total) = parse_duration_line(line).filter(|t| !t.is_zero()) {
                self.total = Some(total);
                return None;
            }
        }

        let elapsed = parse_time(line)?;
        let next = match self.total {
            Some(total) => percent(elapsed, total),
            None => self.current.saturating_add(1).min(ESTIMATE_CAP),
        };
        self.current = self.current.max(next);
        Some(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATS: &str = "frame=  120 fps= 60 q=28.0 size=     512kB time=00:00:50.00 bitrate= 83.9kbits/s speed=2.01x";

    #[test]
    fn test_known_duration() {
        let mut tracker = ProgressTracker::new(Some(Duration::from_secs(100)));
        assert_eq!(tracker.observe(STATS), Some(50));
        assert_eq!(tracker.observe("time=00:01:40.00"), Some(100));
        assert_eq!(tracker.observe("time=00:02:00.00"), Some(100));
    }

    #[test]
    fn test_unknown_duration_advances_by_one() {
        let mut tracker = ProgressTracker::new(None);
        assert_eq!(tracker.observe("time=00:00:01.00"), Some(1));
        assert_eq!(tracker.observe("time=00:00:02.00"), Some(2));
        assert_eq!(tracker.observe("time=00:00:03.00"), Some(3));
        assert_eq!(tracker.observe("Press [q] to stop"), None);
        assert_eq!(tracker.current(), 3);
    }

    #[test]
    fn test_estimate_is_capped() {
        let mut tracker = ProgressTracker::new(None);
        for _ in 0..200 {
            tracker.observe("time=00:00:01.00");
        }
        assert_eq!(tracker.current(), ESTIMATE_CAP);
    }

    #[test]
    fn test_never_decreases() {
        let mut tracker = ProgressTracker::new(Some(Duration::from_secs(10)));
        assert_eq!(tracker.observe("time=00:00:06.00"), Some(60));
        assert_eq!(tracker.observe("time=00:00:02.00"), Some(60));
    }

    #[test]
    fn test_duration_discovered_from_stream() {
        let mut tracker = ProgressTracker::discovering(None);
        assert_eq!(tracker.observe("time=00:00:01.00"), Some(1));
        assert_eq!(tracker.observe("  Duration: 00:01:40.00, start: 0.000000, bitrate: 900 kb/s"), None);
        assert_eq!(tracker.total(), Some(Duration::from_secs(100)));
        assert_eq!(tracker.observe("time=00:00:25.00"), Some(25));
    }

    #[test]
    fn test_image_sequence_duration_keeps_estimate() {
        let mut tracker = ProgressTracker::new(None);
        assert_eq!(tracker.observe("Input #0, image2, from 'shots/shot_%04d.png':"), None);
        assert_eq!(tracker.observe("  Duration: 00:00:04.00, start: 0.000000, bitrate: N/A"), None);
        assert_eq!(tracker.total(), None);
        assert_eq!(tracker.observe("time=00:00:02.00"), Some(1));
        assert_eq!(tracker.observe("time=00:00:04.00"), Some(2));
    }

    #[test]
    fn test_oversized_timestamp_is_ignored() {
        assert_eq!(parse_time("frame=1 time=99999999999999999:00:00.00"), None);
        let mut tracker = ProgressTracker::new(Some(Duration::from_secs(10)));
        assert_eq!(tracker.observe("frame=1 time=99999999999999999:00:00.00"), None);
        assert_eq!(tracker.current(), 0);
    }

    #[test]
    fn test_garbled_lines_are_ignored() {
        let mut tracker = ProgressTracker::new(Some(Duration::from_secs(10)));
        assert_eq!(tracker.observe("time=N/A bitrate=N/A"), None);
        assert_eq!(tracker.observe("Duration: N/A"), None);
        assert_eq!(tracker.observe(""), None);
        assert_eq!(tracker.current(), 0);
    }
}
