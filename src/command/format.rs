// Rendering commands to a single editable line and reading them back
//
// Tokens keep their quote characters through a tokenize/format cycle, so a
// formatted line can be edited by hand and re-ingested without drift. Quotes
// are removed only when the tokens become process arguments.

use std::path::Path;

/// Flag telling the tool to overwrite an existing output file
pub const OVERWRITE_FLAG: &str = "-y";

/// Whether the token is already wrapped in a pair of double quotes
fn is_quoted(token: &str) -> bool {
    token.len() >= 2 && token.starts_with('"') && token.ends_with('"')
}

/// Wraps a token in double quotes when it contains whitespace.
///
/// There is no escaping: a token with an embedded `"` does not survive
/// [`tokenize`], so the builders refuse such paths.
pub fn quote(token: &str) -> String {
    if token.chars().any(char::is_whitespace) && !is_quoted(token) {
        format!("\"{}\"", token)
    } else {
        token.to_string()
    }
}

/// Removes one pair of surrounding double quotes
pub fn strip_quotes(token: &str) -> &str {
    if is_quoted(token) {
        &token[1..token.len() - 1]
    } else {
        token
    }
}

/// Joins tokens with single spaces, quote-wrapping the ones with whitespace
pub fn format<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|t| quote(t.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits a command line on whitespace outside double quotes.
/// Quote characters stay in the emitted tokens.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            current.push(c);
        } else if c.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Inserts the overwrite flag right before the output path unless one is
/// already present anywhere in the line.
pub fn insert_overwrite_flag(line: &str) -> String {
    let mut tokens = tokenize(line);
    if tokens.len() < 2 || tokens.iter().any(|t| t == OVERWRITE_FLAG) {
        return line.to_string();
    }

    let last = tokens.len() - 1;
    tokens.insert(last, OVERWRITE_FLAG.to_string());
    tokens.join(" ")
}

/// Last token of the line with its surrounding quotes removed
pub fn extract_output_path(line: &str) -> Option<String> {
    tokenize(line)
        .last()
        .map(|t| strip_quotes(t).to_string())
        .filter(|t| !t.is_empty())
}

/// Whether a token names the tool itself (`ffmpeg`, `ffmpeg.exe`, `/usr/bin/ffmpeg`
/// or the configured executable path)
pub fn is_tool_token(token: &str, tool_path: &str) -> bool {
    let token = strip_quotes(token);
    if token == tool_path {
        return true;
    }
    Path::new(token)
        .file_stem()
        .map(|stem| stem.eq_ignore_ascii_case(crate::config::DEFAULT_TOOL))
        .unwrap_or(false)
}

/// Argument vector for the child process: the leading tool token is dropped
/// and quote characters are removed.
pub fn to_process_args<S: AsRef<str>>(tokens: &[S], tool_path: &str) -> Vec<String> {
    let skip = match tokens.first() {
        Some(first) if is_tool_token(first.as_ref(), tool_path) => 1,
        _ => 0,
    };

    tokens[skip..]
        .iter()
        .map(|t| t.as_ref().replace('"', ""))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_format_quotes_only_tokens_with_spaces() {
        let tokens = strings(&["ffmpeg", "-i", "my clip.mp4", "-c:v", "libx264", "out.mp4"]);
        assert_eq!(format(&tokens), "ffmpeg -i \"my clip.mp4\" -c:v libx264 out.mp4");
    }

    #[test]
    fn test_format_does_not_double_quote() {
        let tokens = strings(&["-i", "\"already quoted.mp4\""]);
        assert_eq!(format(&tokens), "-i \"already quoted.mp4\"");
    }

    #[test]
    fn test_tokenize_keeps_quotes_and_collapses_whitespace() {
        let tokens = tokenize("  ffmpeg   -i \"a  b.mp4\"\t-y  out.mp4 ");
        assert_eq!(tokens, strings(&["ffmpeg", "-i", "\"a  b.mp4\"", "-y", "out.mp4"]));
    }

    #[test]
    fn test_tokenize_format_is_stable() {
        let line = "ffmpeg -i \"C:\\My Videos\\in.mov\" -c:v libx265 -crf 26 \"D:\\out dir\\in.mkv\"";
        assert_eq!(format(&tokenize(line)), line);
    }

    #[test]
    fn test_insert_overwrite_flag() {
        let line = "ffmpeg -i in.mp4 -c:v libx264 \"out file.mp4\"";
        let once = insert_overwrite_flag(line);
        assert_eq!(once, "ffmpeg -i in.mp4 -c:v libx264 -y \"out file.mp4\"");
        assert_eq!(insert_overwrite_flag(&once), once);
    }

    #[test]
    fn test_insert_overwrite_flag_respects_existing_flag() {
        let line = "ffmpeg -y -i in.mp4 out.mp4";
        assert_eq!(insert_overwrite_flag(line), line);
        assert_eq!(insert_overwrite_flag(""), "");
        assert_eq!(insert_overwrite_flag("ffmpeg"), "ffmpeg");
    }

    #[test]
    fn test_extract_output_path() {
        assert_eq!(
            extract_output_path("ffmpeg -i a.mp4 \"/tmp/out dir/b.mkv\"").as_deref(),
            Some("/tmp/out dir/b.mkv")
        );
        assert_eq!(extract_output_path("   "), None);
    }

    #[test]
    fn test_process_args_strip_tool_and_quotes() {
        let tokens = tokenize("ffmpeg -i \"my clip.mp4\" out.mp4");
        assert_eq!(
            to_process_args(&tokens, "/opt/bin/ffmpeg"),
            strings(&["-i", "my clip.mp4", "out.mp4"])
        );

        let tokens = tokenize("/opt/bin/ffmpeg.exe -version");
        assert_eq!(to_process_args(&tokens, "ffmpeg"), strings(&["-version"]));

        let tokens = tokenize("-i a.mp4 b.mp4");
        assert_eq!(to_process_args(&tokens, "ffmpeg"), strings(&["-i", "a.mp4", "b.mp4"]));
    }
}
