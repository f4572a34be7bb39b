// Token assembly for each job type
//
// Every function here is pure: the directory scan for frame sequences happens
// before the call, and a command is only returned once fully assembled.

use std::path::Path;

use super::params::{
    audio_encoder_for, Bitrate, ColorSpace, ExtractParams, FrameRate, ParameterSet, Resolution,
    Source,
};
use super::CommandLine;
use crate::error::{Result, StudioError};
use crate::frames::FrameSequenceDescriptor;

/// ffmpeg's image2 demuxer only probes start numbers 0..=4 on its own
const IMAGE2_PROBED_START: u64 = 4;

fn selected_encoder(params: &ParameterSet) -> Result<&str> {
    params
        .encoder
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| StudioError::Build("no video encoder selected".to_string()))
}

fn output_path(params: &ParameterSet) -> Result<String> {
    let output = params
        .output_path()
        .map(|p| p.to_string_lossy().to_string())
        .ok_or_else(|| StudioError::Build("no output path".to_string()))?;
    unquoted("output path", &output)?;
    Ok(output)
}

/// Double quotes delimit tokens in the command text, so they cannot appear
/// inside a path or template
fn unquoted<'a>(what: &str, text: &'a str) -> Result<&'a str> {
    if text.contains('"') {
        return Err(StudioError::Build(format!(
            "{} contains a double quote and cannot be written in a command: {}",
            what, text
        )));
    }
    Ok(text)
}

fn unquoted_path(what: &str, path: &Path) -> Result<()> {
    unquoted(what, &path.to_string_lossy()).map(|_| ())
}

/// The preset fragment split into tokens, spliced verbatim
fn quality_tokens(params: &ParameterSet) -> impl Iterator<Item = &str> {
    params.quality_params.split_whitespace()
}

/// Resolution, bitrate, frame rate and color space overrides.
/// Only emitted in advanced mode, each skipped when left at "original".
fn advanced_tokens(params: &ParameterSet) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    if !params.advanced {
        return Ok(tokens);
    }

    let custom = |field: &str| {
        StudioError::Build(format!(
            "{} was edited directly in the command; edit the command text or pick a new value",
            field
        ))
    };

    match params.resolution {
        Resolution::Original => {}
        Resolution::Explicit { width, height } => {
            tokens.push("-s".to_string());
            tokens.push(format!("{}x{}", width, height));
        }
        Resolution::Custom => return Err(custom("resolution")),
    }

    match params.bitrate {
        Bitrate::Original => {}
        Bitrate::Kbps(kbps) => {
            tokens.push("-b:v".to_string());
            tokens.push(format!("{}k", kbps));
        }
        Bitrate::Custom => return Err(custom("bitrate")),
    }

    match params.frame_rate {
        FrameRate::Original => {}
        FrameRate::Fps(rate) => {
            tokens.push("-r".to_string());
            tokens.push(rate.to_string());
        }
        FrameRate::Custom => return Err(custom("frame rate")),
    }

    match params.color_space {
        ColorSpace::Custom => return Err(custom("color space")),
        other => {
            if let Some(value) = other.tool_value() {
                tokens.push("-colorspace".to_string());
                tokens.push(value.to_string());
            }
        }
    }

    Ok(tokens)
}

/// `ffmpeg -i <source> -c:v <encoder> <preset...> [overrides] -c:a copy <output>`
pub fn build_transcode(params: &ParameterSet) -> Result<CommandLine> {
    let source = match &params.source {
        Some(Source::File(path)) if !path.as_os_str().is_empty() => path,
        Some(Source::FrameSequence { .. }) => {
            return Err(StudioError::Build(
                "frame sequence sources are built with build_frame_sequence".to_string(),
            ));
        }
        _ => return Err(StudioError::Build("no source file selected".to_string())),
    };
    unquoted_path("source file", source)?;
    let encoder = selected_encoder(params)?;
    let output = output_path(params)?;
    let overrides = advanced_tokens(params)?;

    Ok(CommandLine::invocation()
        .input(source)
        .video_codec(encoder)
        .args(quality_tokens(params))
        .args(overrides)
        .copy_audio()
        .output(output))
}

/// `ffmpeg [-framerate R] [-start_number N] -i <dir>/<template> [-i <audio>]
/// -c:v <encoder> <preset...> [overrides] [-c:a <audio encoder>] [-shortest] <output>`
///
/// In advanced mode the frame rate appears twice (input `-framerate` and output
/// `-r`); the two are not reconciled.
pub fn build_frame_sequence(
    params: &ParameterSet,
    descriptor: Option<&FrameSequenceDescriptor>,
) -> Result<CommandLine> {
    let (directory, audio) = match &params.source {
        Some(Source::FrameSequence { directory, audio }) if !directory.as_os_str().is_empty() => {
            (directory, audio.as_ref())
        }
        _ => return Err(StudioError::Build("no frame sequence directory selected".to_string())),
    };
    unquoted_path("frame sequence directory", directory)?;
    if let Some(audio) = audio {
        unquoted_path("audio file", audio)?;
    }
    let descriptor = descriptor.ok_or_else(|| {
        StudioError::Build(format!(
            "no numbered image sequence found in {}",
            directory.display()
        ))
    })?;
    let encoder = selected_encoder(params)?;
    let output = output_path(params)?;
    let overrides = advanced_tokens(params)?;

    let mut command = CommandLine::invocation();
    if let Some(rate) = params.frame_rate.token() {
        command = command.arg("-framerate").arg(rate);
    }
    if descriptor.first_number > IMAGE2_PROBED_START {
        command = command
            .arg("-start_number")
            .arg(descriptor.first_number.to_string());
    }
    command = command.input(descriptor.pattern_path());
    if let Some(audio) = audio {
        command = command.input(audio);
    }

    command = command
        .video_codec(encoder)
        .args(quality_tokens(params))
        .args(overrides);

    if audio.is_some() {
        if let Some(audio_encoder) = params.audio_codec.as_deref().and_then(audio_encoder_for) {
            command = command.audio_codec(audio_encoder);
        }
        command = command.arg("-shortest");
    }

    Ok(command.output(output))
}

/// Replaces the extension of a printf-style template with the image format's
fn template_with_extension(template: &str, extension: &str) -> String {
    match Path::new(template).extension() {
        Some(_) => Path::new(template)
            .with_extension(extension)
            .to_string_lossy()
            .to_string(),
        None => format!("{}.{}", template, extension),
    }
}

/// `ffmpeg -i <video> [-vf select=... -fps_mode vfr] <dir>/<template>`
pub fn build_extract_frames(params: &ExtractParams) -> Result<CommandLine> {
    let video = params
        .video
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| StudioError::Build("no video file selected".to_string()))?;
    let output_dir = params
        .output_dir
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| StudioError::Build("no output directory selected".to_string()))?;
    unquoted_path("video file", video)?;
    unquoted_path("output directory", output_dir)?;

    let template = unquoted("file name template", params.template.trim())?;
    if !template.contains('%') {
        return Err(StudioError::Build(format!(
            "file name template '{}' has no frame number placeholder",
            template
        )));
    }
    let template = template_with_extension(template, params.format.extension());

    let mut command = CommandLine::invocation().input(video);
    if params.advanced && params.frame_interval > 1 {
        command = command
            .arg("-vf")
            .arg(format!("select=not(mod(n\\,{}))", params.frame_interval))
            .arg("-fps_mode")
            .arg("vfr");
    }

    Ok(command.output(output_dir.join(template)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::format::{format, tokenize};
    use crate::command::params::{Container, ImageFormat};
    use std::path::PathBuf;

    fn descriptor(dir: &str, first_number: u64) -> FrameSequenceDescriptor {
        FrameSequenceDescriptor {
            directory: PathBuf::from(dir),
            prefix: "shot_".to_string(),
            extension: ".png".to_string(),
            width: 4,
            frame_count: 10,
            first_number,
            last_number: first_number + 9,
        }
    }

    fn transcode_params() -> ParameterSet {
        let mut params = ParameterSet::transcode("/in/movie.mov");
        params.encoder = Some("libx264".to_string());
        params.quality_params = "-crf 23 -preset medium".to_string();
        params.output = Some(PathBuf::from("/out/movie.mp4"));
        params
    }

    #[test]
    fn test_transcode_token_order() {
        let command = build_transcode(&transcode_params()).unwrap();
        assert_eq!(
            command.to_string(),
            "ffmpeg -i /in/movie.mov -c:v libx264 -crf 23 -preset medium -c:a copy /out/movie.mp4"
        );
    }

    #[test]
    fn test_overrides_only_in_advanced_mode() {
        let mut params = transcode_params();
        params.resolution = Resolution::Explicit { width: 1280, height: 720 };
        params.bitrate = Bitrate::Kbps(5000);
        params.frame_rate = FrameRate::Fps(30.0);
        params.color_space = ColorSpace::Bt709;

        let basic = build_transcode(&params).unwrap();
        assert!(!basic.tokens().contains(&"-s".to_string()));

        params.advanced = true;
        let advanced = build_transcode(&params).unwrap();
        assert_eq!(
            advanced.to_string(),
            "ffmpeg -i /in/movie.mov -c:v libx264 -crf 23 -preset medium \
             -s 1280x720 -b:v 5000k -r 30 -colorspace bt709 -c:a copy /out/movie.mp4"
        );
    }

    #[test]
    fn test_original_sentinels_emit_nothing() {
        let mut params = transcode_params();
        params.advanced = true;
        params.bitrate = Bitrate::Kbps(2500);

        let command = build_transcode(&params).unwrap();
        let tokens = command.tokens();
        assert!(tokens.contains(&"-b:v".to_string()));
        assert!(!tokens.contains(&"-s".to_string()));
        assert!(!tokens.contains(&"-r".to_string()));
        assert!(!tokens.contains(&"-colorspace".to_string()));
    }

    #[test]
    fn test_custom_fields_refuse_rebuild() {
        let mut params = transcode_params();
        params.advanced = true;
        params.mark_custom();
        assert!(matches!(build_transcode(&params), Err(StudioError::Build(_))));
    }

    #[test]
    fn test_missing_inputs_are_not_buildable() {
        let mut params = transcode_params();
        params.encoder = None;
        assert!(matches!(build_transcode(&params), Err(StudioError::Build(_))));

        let mut params = transcode_params();
        params.source = None;
        assert!(matches!(build_transcode(&params), Err(StudioError::Build(_))));

        let params = ParameterSet::frame_sequence("/frames", None);
        assert!(matches!(
            build_frame_sequence(&params, Some(&descriptor("/frames", 1))),
            Err(StudioError::Build(_))
        ));
    }

    #[test]
    fn test_frame_sequence_without_descriptor_short_circuits() {
        let mut params = ParameterSet::frame_sequence("/frames", None);
        params.encoder = Some("libx264".to_string());
        assert!(matches!(build_frame_sequence(&params, None), Err(StudioError::Build(_))));
    }

    #[test]
    fn test_frame_sequence_with_audio() {
        let mut params = ParameterSet::frame_sequence("/frames", Some(PathBuf::from("/audio/track.wav")));
        params.encoder = Some("libx264".to_string());
        params.audio_codec = Some("AAC".to_string());
        params.output = Some(PathBuf::from("/out/seq.mp4"));

        let command = build_frame_sequence(&params, Some(&descriptor("/frames", 1))).unwrap();
        assert_eq!(
            command.to_string(),
            "ffmpeg -framerate 30 -i /frames/shot_%04d.png -i /audio/track.wav \
             -c:v libx264 -c:a aac -shortest /out/seq.mp4"
        );
    }

    #[test]
    fn test_frame_sequence_unmapped_audio_codec_keeps_shortest() {
        let mut params = ParameterSet::frame_sequence("/frames", Some(PathBuf::from("/a.wav")));
        params.encoder = Some("libx264".to_string());
        params.audio_codec = Some("Original".to_string());
        params.output = Some(PathBuf::from("/out.mp4"));

        let command = build_frame_sequence(&params, Some(&descriptor("/frames", 0))).unwrap();
        assert!(!command.tokens().contains(&"-c:a".to_string()));
        assert!(command.tokens().contains(&"-shortest".to_string()));
    }

    #[test]
    fn test_frame_sequence_double_frame_rate_in_advanced_mode() {
        let mut params = ParameterSet::frame_sequence("/frames", None);
        params.encoder = Some("libx265".to_string());
        params.frame_rate = FrameRate::Fps(24.0);
        params.advanced = true;
        params.container = Container::Mkv;

        let command = build_frame_sequence(&params, Some(&descriptor("/frames", 1001))).unwrap();
        assert_eq!(
            command.to_string(),
            "ffmpeg -framerate 24 -start_number 1001 -i /frames/shot_%04d.png \
             -c:v libx265 -r 24 /frames.mkv"
        );
    }

    #[test]
    fn test_built_commands_round_trip_through_formatter() {
        let mut params = ParameterSet::transcode("/my videos/holiday clip.mov");
        params.encoder = Some("libx264".to_string());
        params.quality_params = "-crf 18 -preset slow".to_string();
        params.advanced = true;
        params.resolution = Resolution::Explicit { width: 1920, height: 1080 };
        params.output = Some(PathBuf::from("/exports/holiday clip.mp4"));

        let command = build_transcode(&params).unwrap();
        assert_eq!(tokenize(&format(command.tokens())), command.tokens());

        let mut params = ParameterSet::frame_sequence("/render out/seq", Some(PathBuf::from("/a b/mix.wav")));
        params.encoder = Some("libx264".to_string());
        params.audio_codec = Some("opus".to_string());
        let command = build_frame_sequence(&params, Some(&descriptor("/render out/seq", 1))).unwrap();
        assert_eq!(tokenize(&format(command.tokens())), command.tokens());
    }

    #[test]
    fn test_extract_frames() {
        let params = ExtractParams {
            video: Some(PathBuf::from("/in/movie.mp4")),
            output_dir: Some(PathBuf::from("/frames")),
            format: ImageFormat::Jpg,
            ..Default::default()
        };
        assert_eq!(
            build_extract_frames(&params).unwrap().to_string(),
            "ffmpeg -i /in/movie.mp4 /frames/frame_%06d.jpg"
        );

        let params = ExtractParams {
            frame_interval: 5,
            advanced: true,
            ..params
        };
        assert_eq!(
            build_extract_frames(&params).unwrap().to_string(),
            "ffmpeg -i /in/movie.mp4 -vf select=not(mod(n\\,5)) -fps_mode vfr /frames/frame_%06d.jpg"
        );
    }

    #[test]
    fn test_extract_frames_requires_placeholder() {
        let params = ExtractParams {
            video: Some(PathBuf::from("/in/movie.mp4")),
            output_dir: Some(PathBuf::from("/frames")),
            template: "still.png".to_string(),
            ..Default::default()
        };
        assert!(matches!(build_extract_frames(&params), Err(StudioError::Build(_))));
    }

    #[test]
    fn test_paths_with_double_quotes_are_refused() {
        let mut params = transcode_params();
        params.source = Some(Source::File(PathBuf::from("/tmp/a\"b c.mp4")));
        assert!(matches!(build_transcode(&params), Err(StudioError::Build(_))));

        let mut params = transcode_params();
        params.output = Some(PathBuf::from("/out/say \"hi\".mp4"));
        assert!(matches!(build_transcode(&params), Err(StudioError::Build(_))));

        let params = ExtractParams {
            video: Some(PathBuf::from("/in/movie.mp4")),
            output_dir: Some(PathBuf::from("/frames")),
            template: "\"frame_%04d.png".to_string(),
            ..Default::default()
        };
        assert!(matches!(build_extract_frames(&params), Err(StudioError::Build(_))));
    }
}
