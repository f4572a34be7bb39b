use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// `<tool> version <dotted-digits>` at the start of a line
static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*[\w.-]+ version n?(\d+(?:\.\d+)*)").expect("valid version pattern")
});

static BUILD_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"built on (\d{4}-\d{2}-\d{2})").expect("valid build date pattern"));

pub const UNKNOWN_VERSION: &str = "unknown";
/// Reported when the tool answered but no version token was recognised
pub const INSTALLED_VERSION: &str = "installed";
pub const UNKNOWN_BUILD_DATE: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub version: String,
    pub build_date: String,
    pub installed: bool,
}

impl VersionInfo {
    pub fn not_installed() -> Self {
        Self {
            version: UNKNOWN_VERSION.to_string(),
            build_date: UNKNOWN_BUILD_DATE.to_string(),
            installed: false,
        }
    }
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self::not_installed()
    }
}

/// Version and build date from `-version` output; each defaults independently
pub fn parse_version(output: &str) -> VersionInfo {
    if output.trim().is_empty() {
        return VersionInfo::not_installed();
    }

    let version = VERSION
        .captures(output)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| INSTALLED_VERSION.to_string());
    let build_date = BUILD_DATE
        .captures(output)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| UNKNOWN_BUILD_DATE.to_string());

    VersionInfo {
        version,
        build_date,
        installed: true,
    }
}
