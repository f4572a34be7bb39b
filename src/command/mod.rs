// Command synthesis
//
// - params: the user's selections, snapshotted per build
// - builder: pure token assembly for each job type
// - format: single-line rendering, quote-aware tokenizing, targeted edits

pub mod builder;
pub mod format;
pub mod params;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub use params::*;

use crate::config::SettingsProvider;
use crate::error::Result;
use crate::frames;

/// Token shown as the program name in formatted commands
pub const TOOL_TOKEN: &str = "ffmpeg";

/// Ordered argument tokens; tokens with whitespace are stored quote-wrapped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    tokens: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens.into_iter().map(|t| format::quote(t.as_ref())).collect(),
        }
    }

    /// Start a command with the tool invocation token
    pub fn invocation() -> Self {
        Self::new([TOOL_TOKEN])
    }

    /// Re-ingest a (possibly hand-edited) command line
    pub fn parse(line: &str) -> Self {
        Self {
            tokens: format::tokenize(line),
        }
    }

    /// Add an argument
    pub fn arg<S: AsRef<str>>(mut self, arg: S) -> Self {
        self.tokens.push(format::quote(arg.as_ref()));
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tokens.extend(args.into_iter().map(|s| format::quote(s.as_ref())));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy())
    }

    /// Set video codec
    pub fn video_codec<S: AsRef<str>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: AsRef<str>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy audio stream
    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Unquoted arguments for the child process, without the tool token
    pub fn program_args(&self, tool_path: &str) -> Vec<String> {
        format::to_process_args(&self.tokens, tool_path)
    }

    pub fn output_path(&self) -> Option<String> {
        self.tokens
            .last()
            .map(|t| format::strip_quotes(t).to_string())
            .filter(|t| !t.is_empty())
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format::format(&self.tokens))
    }
}

/// A built command and the text the user is looking at.
///
/// Once the text is edited by hand the parameter set is flagged custom and the
/// text becomes the source of truth.
#[derive(Debug, Clone, Default)]
pub struct CommandSession {
    built: CommandLine,
    text: String,
    edited: bool,
}

impl CommandSession {
    pub fn from_built(command: CommandLine) -> Self {
        let text = command.to_string();
        Self {
            built: command,
            text,
            edited: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn built(&self) -> &CommandLine {
        &self.built
    }

    pub fn is_edited(&self) -> bool {
        self.edited
    }

    /// Record a manual edit of the command text
    pub fn edit<S: Into<String>>(&mut self, text: S, params: &mut ParameterSet) {
        let text = text.into();
        if text == self.text {
            return;
        }
        debug!("Command edited by hand, advanced selectors now custom");
        self.text = text;
        self.edited = true;
        params.mark_custom();
    }

    pub fn insert_overwrite_flag(&mut self) {
        self.text = format::insert_overwrite_flag(&self.text);
    }

    /// The command that will actually run
    pub fn command(&self) -> CommandLine {
        CommandLine::parse(&self.text)
    }
}

/// Builds commands from parameter sets, reading the advanced-mode toggle from
/// the settings on every build.
pub struct CommandBuilder {
    settings: Arc<dyn SettingsProvider>,
}

impl CommandBuilder {
    pub fn new(settings: Arc<dyn SettingsProvider>) -> Self {
        Self { settings }
    }

    fn snapshot(&self, params: &ParameterSet) -> ParameterSet {
        let mut snapshot = params.clone();
        snapshot.advanced = self.settings.advanced_mode();
        snapshot
    }

    /// Build a plain transcode command
    pub fn transcode(&self, params: &ParameterSet) -> Result<CommandLine> {
        let snapshot = self.snapshot(params);
        builder::build_transcode(&snapshot).inspect_err(|e| warn!("Transcode command not built: {}", e))
    }

    /// Build a frame-sequence synthesis command, scanning the directory for
    /// the dominant numbered sequence
    pub fn frame_sequence(&self, params: &ParameterSet) -> Result<CommandLine> {
        let snapshot = self.snapshot(params);
        let descriptor = match &snapshot.source {
            Some(Source::FrameSequence { directory, .. }) => frames::scan(directory)
                .inspect_err(|e| warn!("Frame sequence scan failed: {}", e))?,
            _ => None,
        };

        builder::build_frame_sequence(&snapshot, descriptor.as_ref())
            .inspect_err(|e| warn!("Frame sequence command not built: {}", e))
    }

    /// Build a frame extraction command
    pub fn extract_frames(&self, params: &ExtractParams) -> Result<CommandLine> {
        let mut snapshot = params.clone();
        snapshot.advanced = self.settings.advanced_mode();
        builder::build_extract_frames(&snapshot)
            .inspect_err(|e| warn!("Frame extraction command not built: {}", e))
    }
}
