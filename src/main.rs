//! ffstudio - command synthesis and job control for ffmpeg
//!
//! Entry point: wires configuration, presets, the prober and the job
//! controller together and dispatches the requested subcommand.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ffstudio::cli::{Args, Commands, EncodeArgs, JobArgs};
use ffstudio::command::{
    format, Bitrate, CodecCategory, ColorSpace, CommandBuilder, CommandLine, CommandSession, Container,
    ExtractParams, FrameRate, ImageFormat, ParameterSet, Resolution,
};
use ffstudio::config::Config;
use ffstudio::error::StudioError;
use ffstudio::frames;
use ffstudio::job::{JobController, JobOutcome, JobRequest, TaskRecord};
use ffstudio::parse::parse_clock;
use ffstudio::presets::QualityPresets;
use ffstudio::probe::Prober;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    if args.advanced {
        config.tool.advanced_mode = true;
    }

    let presets = match &config.presets.path {
        Some(path) => QualityPresets::from_file(path)?,
        None => QualityPresets::builtin(),
    };

    let probe_timeout = config.tool.probe_timeout();
    let settings = Arc::new(config);
    let prober = Prober::new(settings.clone()).with_timeout(probe_timeout);
    let builder = CommandBuilder::new(settings.clone());
    let controller = JobController::new(settings.clone());

    match args.command {
        Commands::Version => {
            let version = prober.version().await;
            if version.installed {
                println!("ffmpeg {} (built on {})", version.version, version.build_date);
            } else {
                println!("ffmpeg is not installed or could not be run");
            }
        }
        Commands::CheckTool { path } => {
            if prober.validate_tool_path(&path).await {
                println!("{} is a usable ffmpeg executable", path);
            } else {
                println!("{} is not a usable ffmpeg executable", path);
            }
        }
        Commands::Codecs => {
            let codecs = prober.codecs().await;
            println!("{:<10} {:<6} {:<20} {}", "Type", "Flags", "Name", "Description");
            println!("{}", "-".repeat(80));
            for codec in codecs {
                let flags = format!(
                    "{}{}",
                    if codec.decoder { "D" } else { "." },
                    if codec.encoder { "E" } else { "." }
                );
                println!("{:<10} {:<6} {:<20} {}", codec.kind.label(), flags, codec.name, codec.description);
            }
        }
        Commands::Encoders { category } => {
            let category: CodecCategory = category.parse()?;
            println!("{} encoders:", category.label());
            for encoder in prober.encoders_for(category).await {
                println!("  {}", encoder);
            }
        }
        Commands::Probe { input } => match prober.probe_media(&input).await {
            Some(info) => {
                println!("File:        {} ({})", info.file_name(), info.file_size_display());
                println!("Duration:    {}", info.duration_display());
                println!("Video:       {}", info.video_codec.as_deref().unwrap_or("-"));
                println!("Audio:       {}", info.audio_codec.as_deref().unwrap_or("-"));
                println!("Resolution:  {}", info.resolution.as_deref().unwrap_or("-"));
                println!("Bitrate:     {}", info.bitrate.as_deref().unwrap_or("-"));
                println!("Frame rate:  {}", info.frame_rate.as_deref().unwrap_or("-"));
                println!("Bit depth:   {}", info.bit_depth.as_deref().unwrap_or("-"));
                println!("Color space: {}", info.color_space.as_deref().unwrap_or("-"));
            }
            None => println!("Could not probe {}", input.display()),
        },
        Commands::Frames { dir } => match frames::scan(&dir)? {
            Some(sequence) => {
                println!("Template: {}", sequence.template());
                println!(
                    "Frames:   {} ({}..={})",
                    sequence.frame_count, sequence.first_number, sequence.last_number
                );
            }
            None => println!("No numbered frame sequence found in {}", dir.display()),
        },
        Commands::Transcode { input, encode } => {
            let mut params = ParameterSet::transcode(&input);
            apply_encode_args(&mut params, &encode, &prober).await?;
            params.resolve_preset(&presets)?;

            let command = builder.transcode(&params)?;
            let duration = prober.probe_media(&input).await.and_then(|info| info.duration);
            let label = input.display().to_string();
            execute(&controller, command, &encode.job, label, Progress::Discover(duration)).await?;
        }
        Commands::Synth {
            dir,
            audio,
            audio_codec,
            encode,
        } => {
            let mut params = ParameterSet::frame_sequence(&dir, audio);
            params.audio_codec = Some(audio_codec);
            apply_encode_args(&mut params, &encode, &prober).await?;
            params.resolve_preset(&presets)?;

            let command = builder.frame_sequence(&params)?;
            let label = dir.display().to_string();
            execute(&controller, command, &encode.job, label, Progress::Estimate).await?;
        }
        Commands::Extract {
            input,
            output_dir,
            template,
            format,
            interval,
            job,
        } => {
            std::fs::create_dir_all(&output_dir)?;
            let params = ExtractParams {
                video: Some(input.clone()),
                output_dir: Some(output_dir),
                template,
                format: format.parse::<ImageFormat>()?,
                frame_interval: interval,
                advanced: false,
            };

            let command = builder.extract_frames(&params)?;
            let duration = prober.probe_media(&input).await.and_then(|info| info.duration);
            let label = input.display().to_string();
            execute(&controller, command, &job, label, Progress::Discover(duration)).await?;
        }
        Commands::Run { command, duration } => {
            let duration = match duration {
                Some(text) => Some(
                    parse_clock(&text)
                        .ok_or_else(|| StudioError::Config(format!("Invalid duration '{}', expected HH:MM:SS", text)))?,
                ),
                None => None,
            };
            let label = format::extract_output_path(&command).unwrap_or_default();
            let outcome = watch_job(
                &controller,
                JobRequest::new(command)
                    .with_source(label)
                    .with_duration(duration)
                    .discovering_duration(),
            )
            .await?;
            outcome.into_result()?;
        }
    }

    Ok(())
}

/// Copy the shared encoding flags onto a parameter set. The encoder defaults
/// to the first one the tool offers for the family.
async fn apply_encode_args(params: &mut ParameterSet, encode: &EncodeArgs, prober: &Prober) -> Result<()> {
    params.container = encode.container.parse::<Container>()?;
    params.codec = encode.codec.parse::<CodecCategory>()?;
    params.resolution = encode.resolution.parse::<Resolution>()?;
    params.bitrate = encode.bitrate.parse::<Bitrate>()?;
    params.color_space = encode.color_space.parse::<ColorSpace>()?;
    if let Some(rate) = &encode.frame_rate {
        params.frame_rate = rate.parse::<FrameRate>()?;
    }
    params.quality_preset = encode.preset.clone();
    params.output = encode.output.clone();

    params.encoder = match &encode.encoder {
        Some(encoder) => Some(encoder.clone()),
        None => {
            let encoder = prober.encoders_for(params.codec).await.into_iter().next();
            if let Some(name) = &encoder {
                info!("Using {} encoder {}", params.codec, name);
            }
            encoder
        }
    };
    Ok(())
}

/// How a job's progress is measured
enum Progress {
    /// Image sequence input: +1 per timestamp
    Estimate,
    /// Media input: the probed duration, or the one the tool reports
    Discover(Option<std::time::Duration>),
}

/// Print or run a built command
async fn execute(
    controller: &JobController,
    command: CommandLine,
    job: &JobArgs,
    source_label: String,
    progress: Progress,
) -> Result<()> {
    let mut session = CommandSession::from_built(command);
    if job.overwrite {
        session.insert_overwrite_flag();
    }

    if job.dry_run {
        println!("{}", session.text());
        return Ok(());
    }

    if let Some(output) = format::extract_output_path(session.text()) {
        if !job.overwrite && PathBuf::from(&output).exists() {
            warn!("{} already exists; pass --overwrite to replace it", output);
        }
    }

    let request = JobRequest::new(session.text()).with_source(source_label);
    let request = match progress {
        Progress::Estimate => request,
        Progress::Discover(duration) => request.with_duration(duration).discovering_duration(),
    };
    let outcome = watch_job(controller, request).await?;
    outcome.into_result()?;
    Ok(())
}

/// Run a job with a progress bar, cancelling it on Ctrl-C
async fn watch_job(controller: &JobController, request: JobRequest) -> Result<JobOutcome> {
    let job = controller.start(request)?;
    let record = job.record().clone();

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(record.snapshot().output_file);

    let progress = tokio::spawn(follow_progress(record.clone(), pb.clone()));

    let canceller = controller.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling job");
            canceller.cancel().await;
        }
    });

    let outcome = job.wait().await;
    interrupt.abort();
    if let Err(e) = progress.await {
        warn!("Progress display stopped: {}", e);
    }

    let snapshot = record.snapshot();
    pb.finish_with_message(format!("{} ({})", snapshot.status, snapshot.progress_text()));

    match &outcome {
        JobOutcome::Completed => println!("Completed: {}", snapshot.output_file),
        JobOutcome::Cancelled => println!("Cancelled"),
        JobOutcome::Failed(failure) => eprintln!("Failed:\n{}", failure.detail()),
    }
    Ok(outcome)
}

async fn follow_progress(record: TaskRecord, pb: ProgressBar) {
    let mut rx = record.subscribe();
    loop {
        let (progress, done) = {
            let snapshot = rx.borrow_and_update();
            (snapshot.progress, snapshot.status.is_terminal())
        };
        pb.set_position(progress as u64);
        if done || rx.changed().await.is_err() {
            break;
        }
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".ffstudio").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "ffstudio.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("ffstudio.log").display()
    );

    Ok(())
}
