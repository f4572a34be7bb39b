//! ffstudio - command synthesis and job control for ffmpeg
//!
//! Builds ffmpeg command lines from structured parameters, runs them as
//! cancellable jobs with live progress, and parses the tool's textual output
//! (version, codec and encoder listings, stream information).

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod frames;
pub mod job;
pub mod parse;
pub mod presets;
pub mod probe;
