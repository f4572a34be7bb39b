// Capability probing
//
// Short-lived invocations of the tool (-version, -codecs, -encoders, -i) whose
// output is handed to the parsers. Every failure degrades to a sentinel or an
// empty result; nothing here aborts the caller.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::CodecCategory;
use crate::config::SettingsProvider;
use crate::error::{Result, StudioError};
use crate::parse::{
    encoders_for_category, parse_codecs, parse_media_info, parse_version, CodecDescriptor, MediaStreamInfo,
    VersionInfo,
};

/// Default limit for a single probe invocation
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Captured result of a finished invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// stdout followed by stderr
    pub text: String,
}

/// Runs the tool to completion and captures its output
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<ToolOutput>;
}

/// [`ToolRunner`] backed by a real child process
#[derive(Debug, Default, Clone)]
pub struct ProcessToolRunner;

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<ToolOutput> {
        debug!("Probing: {} {}", program, args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| StudioError::Probe(format!("{} timed out after {:?}", program, timeout)))?
            .map_err(|e| StudioError::Probe(format!("Failed to execute {}: {}", program, e)))?;

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ToolOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            text,
        })
    }
}

/// Queries the configured tool for its version, codecs, encoders and for
/// stream information about media files.
pub struct Prober {
    runner: Arc<dyn ToolRunner>,
    settings: Arc<dyn SettingsProvider>,
    timeout: Duration,
}

impl Prober {
    pub fn new(settings: Arc<dyn SettingsProvider>) -> Self {
        Self::with_runner(Arc::new(ProcessToolRunner), settings)
    }

    pub fn with_runner(runner: Arc<dyn ToolRunner>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            runner,
            settings,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn invoke(&self, program: &str, args: &[&str]) -> Result<ToolOutput> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run(program, &args, self.timeout).await
    }

    /// `-version`; any failure reports the tool as not installed
    pub async fn version(&self) -> VersionInfo {
        let tool = self.settings.tool_path();
        match self.invoke(&tool, &["-version"]).await {
            Ok(output) if output.success => {
                let info = parse_version(&output.text);
                info!("Detected {} version {} ({})", tool, info.version, info.build_date);
                info
            }
            Ok(output) => {
                warn!("{} -version exited with {:?}", tool, output.exit_code);
                VersionInfo::not_installed()
            }
            Err(e) => {
                warn!("Version probe failed: {}", e);
                VersionInfo::not_installed()
            }
        }
    }

    /// `-codecs`; empty on failure
    pub async fn codecs(&self) -> Vec<CodecDescriptor> {
        let tool = self.settings.tool_path();
        match self.invoke(&tool, &["-hide_banner", "-codecs"]).await {
            Ok(output) if output.success => parse_codecs(&output.text),
            Ok(output) => {
                warn!("{} -codecs exited with {:?}", tool, output.exit_code);
                Vec::new()
            }
            Err(e) => {
                warn!("Codec probe failed: {}", e);
                Vec::new()
            }
        }
    }

    /// `-encoders` filtered to one family; the family defaults on failure
    pub async fn encoders_for(&self, category: CodecCategory) -> Vec<String> {
        let tool = self.settings.tool_path();
        let listing = match self.invoke(&tool, &["-hide_banner", "-encoders"]).await {
            Ok(output) if output.success => output.text,
            Ok(output) => {
                warn!("{} -encoders exited with {:?}", tool, output.exit_code);
                String::new()
            }
            Err(e) => {
                warn!("Encoder probe failed: {}", e);
                String::new()
            }
        };

        let encoders = encoders_for_category(&listing, category);
        debug!("{} encoders: {}", category, encoders.join(", "));
        encoders
    }

    /// `-i <file>` without an output. The tool always exits non-zero here, so
    /// only a failed invocation counts as an error.
    pub async fn probe_media<P: AsRef<Path>>(&self, path: P) -> Option<MediaStreamInfo> {
        let path = path.as_ref();
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            _ => {
                debug!("Not probing missing file {}", path.display());
                return None;
            }
        };

        let tool = self.settings.tool_path();
        let file = path.to_string_lossy();
        let output = match self.invoke(&tool, &["-hide_banner", "-i", &file]).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Media probe of {} failed: {}", path.display(), e);
                return None;
            }
        };

        let mut info = parse_media_info(&output.text);
        info.path = path.to_path_buf();
        info.file_size = metadata.len();
        Some(info)
    }

    /// Whether `path` is an existing executable that identifies as ffmpeg
    pub async fn validate_tool_path(&self, path: &str) -> bool {
        let candidate = path.trim();
        if candidate.is_empty() || !Path::new(candidate).is_file() {
            return false;
        }

        match self.invoke(candidate, &["-version"]).await {
            Ok(output) => output.success && output.text.to_lowercase().contains("ffmpeg"),
            Err(e) => {
                debug!("{} is not a usable tool: {}", candidate, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::io::Write;

    fn prober(runner: MockToolRunner) -> Prober {
        Prober::with_runner(Arc::new(runner), Arc::new(Config::default()))
    }

    fn ok(text: &str) -> Result<ToolOutput> {
        Ok(ToolOutput {
            success: true,
            exit_code: Some(0),
            text: text.to_string(),
        })
    }

    const VERSION_OUTPUT: &str = "\
ffmpeg version 6.1.1 Copyright (c) 2000-2023 the FFmpeg developers
built with gcc 13.2.0 (GCC)
libavutil      58. 29.100 / 58. 29.100
";

    #[tokio::test]
    async fn test_version_uses_configured_tool() {
        let mut runner = MockToolRunner::new();
        runner
            .expect_run()
            .withf(|program, args, _| program == "ffmpeg" && args == ["-version".to_string()])
            .times(1)
            .returning(|_, _, _| ok(VERSION_OUTPUT));

        let info = prober(runner).version().await;
        assert!(info.installed);
        assert_eq!(info.version, "6.1.1");
    }

    #[tokio::test]
    async fn test_version_failure_is_not_installed() {
        let mut runner = MockToolRunner::new();
        runner
            .expect_run()
            .returning(|_, _, _| Err(StudioError::Probe("No such file or directory".into())));

        assert_eq!(prober(runner).version().await, VersionInfo::not_installed());
    }

    #[test]
    fn test_codecs_nonzero_exit_is_empty() {
        let mut runner = MockToolRunner::new();
        runner.expect_run().returning(|_, _, _| {
            Ok(ToolOutput {
                success: false,
                exit_code: Some(1),
                text: " DEV.LS h264  H.264 / AVC".to_string(),
            })
        });

        let codecs = tokio_test::block_on(prober(runner).codecs());
        assert!(codecs.is_empty());
    }

    #[tokio::test]
    async fn test_encoders_fall_back_to_defaults() {
        let mut runner = MockToolRunner::new();
        runner
            .expect_run()
            .returning(|_, _, _| Err(StudioError::Probe("timed out".into())));

        let encoders = prober(runner).encoders_for(CodecCategory::H265).await;
        assert_eq!(encoders, crate::parse::default_encoders(CodecCategory::H265));
    }

    #[tokio::test]
    async fn test_probe_media_ignores_exit_code() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 2048]).unwrap();
        let path = file.path().to_path_buf();

        let mut runner = MockToolRunner::new();
        runner.expect_run().returning(|_, _, _| {
            Ok(ToolOutput {
                success: false,
                exit_code: Some(1),
                text: "  Duration: 00:00:10.00, start: 0.000000, bitrate: 1200 kb/s\n  \
                       Stream #0:0: Video: h264 (High), yuv420p(tv, bt709), 1280x720, 30 fps\n\
                       At least one output file must be specified\n"
                    .to_string(),
            })
        });

        let info = prober(runner).probe_media(&path).await.unwrap();
        assert_eq!(info.path, path);
        assert_eq!(info.file_size, 2048);
        assert_eq!(info.video_codec.as_deref(), Some("h264"));
        assert_eq!(info.duration, Some(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_probe_media_missing_file_skips_tool() {
        let mut runner = MockToolRunner::new();
        runner.expect_run().times(0);

        assert!(prober(runner).probe_media("/no/such/clip.mp4").await.is_none());
    }

    #[tokio::test]
    async fn test_validate_tool_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();

        let mut runner = MockToolRunner::new();
        runner.expect_run().times(1).returning(|_, _, _| ok(VERSION_OUTPUT));
        assert!(prober(runner).validate_tool_path(&path).await);

        let mut runner = MockToolRunner::new();
        runner.expect_run().times(1).returning(|_, _, _| ok("HandBrakeCLI 1.7.2"));
        assert!(!prober(runner).validate_tool_path(&path).await);

        let mut runner = MockToolRunner::new();
        runner.expect_run().times(0);
        assert!(!prober(runner).validate_tool_path("/no/such/ffmpeg").await);
    }
}
