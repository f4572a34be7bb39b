use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Result, StudioError};

/// `<prefix><digits><.ext>` with the digit run taken right before the extension
static FRAME_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)(\d+)(\.[A-Za-z0-9]+)$").expect("valid frame name pattern"));

/// The dominant numbered image sequence of a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequenceDescriptor {
    pub directory: PathBuf,
    pub prefix: String,
    /// Extension including the leading dot
    pub extension: String,
    /// Width of the numeric field
    pub width: usize,
    pub frame_count: usize,
    pub first_number: u64,
    pub last_number: u64,
}

impl FrameSequenceDescriptor {
    /// printf-style file name, e.g. `shot_%04d.png`
    pub fn template(&self) -> String {
        format!("{}%0{}d{}", self.prefix, self.width, self.extension)
    }

    /// Template joined onto the directory, as passed to `-i`
    pub fn pattern_path(&self) -> PathBuf {
        self.directory.join(self.template())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    prefix: String,
    extension: String,
    width: usize,
}

#[derive(Debug, Default)]
struct Group {
    count: usize,
    first: u64,
    last: u64,
}

/// Groups file names by (prefix, extension, digit width) and keeps the largest
/// group. Ties go to the group whose key sorts first.
pub fn detect<I, S>(directory: &Path, file_names: I) -> Option<FrameSequenceDescriptor>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut groups: BTreeMap<GroupKey, Group> = BTreeMap::new();

    for name in file_names {
        let Some(caps) = FRAME_NAME.captures(name.as_ref()) else {
            continue;
        };
        let digits = &caps[2];
        let Ok(number) = digits.parse::<u64>() else {
            continue;
        };

        let key = GroupKey {
            prefix: caps[1].to_string(),
            extension: caps[3].to_string(),
            width: digits.len(),
        };
        let group = groups.entry(key).or_insert_with(|| Group {
            count: 0,
            first: number,
            last: number,
        });
        group.count += 1;
        group.first = group.first.min(number);
        group.last = group.last.max(number);
    }

    let mut best: Option<(GroupKey, Group)> = None;
    for (key, group) in groups {
        if best.as_ref().is_none_or(|(_, b)| group.count > b.count) {
            best = Some((key, group));
        }
    }

    best.map(|(key, group)| FrameSequenceDescriptor {
        directory: directory.to_path_buf(),
        prefix: key.prefix,
        extension: key.extension,
        width: key.width,
        frame_count: group.count,
        first_number: group.first,
        last_number: group.last,
    })
}

/// Scans a directory (not recursively) for its dominant frame sequence.
/// `Ok(None)` when no file has the numbered shape.
pub fn scan<P: AsRef<Path>>(directory: P) -> Result<Option<FrameSequenceDescriptor>> {
    let directory = directory.as_ref();
    if !directory.is_dir() {
        return Err(StudioError::FileNotFound(directory.display().to_string()));
    }

    let mut names = Vec::new();
    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| StudioError::Io(e.into()))?;
        if entry.file_type().is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    debug!("Scanned {} files in {}", names.len(), directory.display());

    let descriptor = detect(directory, &names);

    match &descriptor {
        Some(d) => info!(
            "Detected frame sequence {} ({} frames, {}..={})",
            d.template(),
            d.frame_count,
            d.first_number,
            d.last_number
        ),
        None => info!("No numbered frame sequence in {}", directory.display()),
    }

    Ok(descriptor)
}
