use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Emit resolution, bitrate, frame rate and color space overrides
    #[arg(long, global = true)]
    pub advanced: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the installed ffmpeg version and build date
    Version,

    /// Check whether a path points to a usable ffmpeg executable
    CheckTool {
        /// Candidate executable path
        path: String,
    },

    /// List the codecs known to ffmpeg
    Codecs,

    /// List the encoders available for a codec family
    Encoders {
        /// Codec family (h264, h265, vp9, av1)
        #[arg(short, long, default_value = "h264")]
        category: String,
    },

    /// Show stream information for a media file
    Probe {
        /// Input media file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Detect the numbered frame sequence in a directory
    Frames {
        /// Directory containing numbered images
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Transcode a media file
    Transcode {
        /// Input media file
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        encode: EncodeArgs,
    },

    /// Encode a numbered image sequence into a video
    Synth {
        /// Directory containing numbered images
        #[arg(short, long)]
        dir: PathBuf,

        /// Audio track to mux in
        #[arg(short, long)]
        audio: Option<PathBuf>,

        /// Audio codec for the muxed track (aac, mp3, opus, flac, ...)
        #[arg(long, default_value = "aac")]
        audio_codec: String,

        #[command(flatten)]
        encode: EncodeArgs,
    },

    /// Split a video into numbered still images
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Directory receiving the images
        #[arg(short, long)]
        output_dir: PathBuf,

        /// printf-style file name
        #[arg(short, long, default_value = "frame_%06d.png")]
        template: String,

        /// Image format (png, jpg, bmp, tiff)
        #[arg(short, long, default_value = "png")]
        format: String,

        /// Keep every Nth frame (advanced mode)
        #[arg(long, default_value = "1")]
        interval: u32,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Run a hand-written command line as a job
    Run {
        /// Full command line, starting with `ffmpeg`
        command: String,

        /// Expected duration (HH:MM:SS) for percentage progress
        #[arg(short, long)]
        duration: Option<String>,
    },
}

/// Encoding choices shared by transcode and frame sequence synthesis
#[derive(clap::Args)]
pub struct EncodeArgs {
    /// Output file; derived from the source when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Container format (mp4, mkv, avi, mov, flv, webm)
    #[arg(long, default_value = "mp4")]
    pub container: String,

    /// Codec family (h264, h265, vp9, av1)
    #[arg(long, default_value = "h264")]
    pub codec: String,

    /// Encoder; the first one available for the family when omitted
    #[arg(short, long)]
    pub encoder: Option<String>,

    /// Quality preset name (high, balanced, fast)
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Resolution as WIDTHxHEIGHT, or "original"
    #[arg(long, default_value = "original")]
    pub resolution: String,

    /// Video bitrate in kb/s, or "original"
    #[arg(long, default_value = "original")]
    pub bitrate: String,

    /// Frame rate, or "original"
    #[arg(long)]
    pub frame_rate: Option<String>,

    /// Color space (bt601, bt709, bt2020), or "original"
    #[arg(long, default_value = "original")]
    pub color_space: String,

    #[command(flatten)]
    pub job: JobArgs,
}

#[derive(clap::Args)]
pub struct JobArgs {
    /// Overwrite the output without asking
    #[arg(short = 'y', long)]
    pub overwrite: bool,

    /// Print the command instead of running it
    #[arg(long)]
    pub dry_run: bool,
}
