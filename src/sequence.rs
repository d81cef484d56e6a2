//! Render output patterns and on-disk sequence verification
//!
//! **Why**: Renders get interrupted. Before re-rendering, the frames already written next to
//! the output path are collected so only the missing ones are queued again.
//!
//! **Used by**: CLI `verify`, render queue helpers
//!
//! # Output Pattern
//!
//! Render paths mark frame digits with hashes: `/renders/shot_####.exr`.
//!
//! 1. Trailing hash run sets the padding (`####` = 4); no hashes means 4 digits appended
//! 2. Hashes are removed from the name; a name ending in a digit gets a `_` separator
//! 3. Known image extensions stay at the end
//!
//! # Detection
//!
//! Files in the output directory match when they are `<name><N digits>[.]<ext>`,
//! compared case-insensitively.

use glob::MatchOptions;
use log::{debug, info};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::frames::Frames;
use crate::utils::{frames_not_in, rangify, split_subframe};

/// Image extensions recognized at the end of an output path
pub const IMAGE_EXTS: &[&str] = &[
    "exr", "png", "jpg", "jpeg", "tif", "tiff", "tga", "dpx", "cin", "hdr", "bmp", "webp",
];

/// Padding used when the output path has no hashes
pub const DEFAULT_PADDING: usize = 4;

static NUMBER_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+\b").expect("number pattern is valid"));

/// Sequence scanning errors
#[derive(Debug)]
pub enum SequenceError {
    NoFilename(String),
    MissingDir(PathBuf),
    Pattern(String),
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::NoFilename(p) => write!(f, "No file name in output path: {}", p),
            SequenceError::MissingDir(d) => write!(f, "Directory does not exist: {}", d.display()),
            SequenceError::Pattern(e) => write!(f, "Pattern error: {}", e),
        }
    }
}

impl std::error::Error for SequenceError {}

/// Render output path split into its frame-numbering parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPattern {
    dir: PathBuf,
    name: String,    // "shot_" (hashes removed)
    padding: usize,  // 4 for "####"
    ext: String,     // ".exr" or ""
}

impl OutputPattern {
    /// Parse a render output path like `/renders/shot_####.exr`
    pub fn parse(path: &str) -> Result<Self, SequenceError> {
        Self::parse_with_padding(path, DEFAULT_PADDING)
    }

    /// Parse, using `default_padding` digits when the path has no hashes
    pub fn parse_with_padding(path: &str, default_padding: usize) -> Result<Self, SequenceError> {
        if path.ends_with(['/', std::path::MAIN_SEPARATOR]) {
            return Err(SequenceError::NoFilename(path.to_string()));
        }
        let p = Path::new(path);
        let file_name = p
            .file_name()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SequenceError::NoFilename(path.to_string()))?;
        let dir = p.parent().map(Path::to_path_buf).unwrap_or_default();

        let (stem, ext) = split_image_ext(file_name);

        let trailing = stem.len() - stem.trim_end_matches('#').len();
        let total = stem.matches('#').count();
        let padding = match (trailing, total) {
            (0, 0) => default_padding,
            (0, n) => n,
            (n, _) => n,
        };

        let mut name = stem.replace('#', "");
        if name.ends_with(|c: char| c.is_ascii_digit()) {
            name.push('_');
        }

        debug!("Output pattern {}: name={:?} padding={} ext={:?}", path, name, padding, ext);
        Ok(Self { dir, name, padding, ext: ext.to_string() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// File path of a whole frame: `shot_0012.exr`
    pub fn frame_path(&self, frame: i64) -> PathBuf {
        self.dir.join(format!(
            "{}{:0width$}{}",
            self.name,
            frame,
            self.ext,
            width = self.padding
        ))
    }

    /// File path of a sub-frame: `shot_001225.exr` for 12.25 with 2 decimals
    pub fn subframe_path(&self, frame: f64, decimals: usize) -> PathBuf {
        let (main, sub) = split_subframe(frame);
        let digits = if decimals == 0 {
            String::new()
        } else {
            let formatted = format!("{:.dec$}", sub, dec = decimals);
            formatted.split('.').nth(1).unwrap_or_default().to_string()
        };
        self.dir.join(format!(
            "{}{:0width$}{}{}",
            self.name,
            main,
            digits,
            self.ext,
            width = self.padding
        ))
    }

    /// Display form: `shot_####.exr`
    pub fn display_name(&self) -> String {
        format!("{}{}{}", self.name, "#".repeat(self.padding), self.ext)
    }

    /// Collect frames on disk: frame number → file path
    pub fn scan(&self) -> Result<BTreeMap<i64, PathBuf>, SequenceError> {
        let dir = if self.dir.as_os_str().is_empty() { Path::new(".") } else { self.dir.as_path() };
        if !dir.is_dir() {
            return Err(SequenceError::MissingDir(dir.to_path_buf()));
        }

        let glob_pattern = format!(
            "{}{}{}*{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            std::path::MAIN_SEPARATOR,
            glob::Pattern::escape(&self.name),
            glob::Pattern::escape(&self.ext)
        );
        let options = MatchOptions { case_sensitive: false, ..MatchOptions::new() };
        let paths = glob::glob_with(&glob_pattern, options)
            .map_err(|e| SequenceError::Pattern(e.to_string()))?;

        let file_rx = RegexBuilder::new(&format!(
            r"^{}([0-9]{{{}}})\.?{}$",
            regex::escape(&self.name),
            self.padding,
            regex::escape(&self.ext)
        ))
        .case_insensitive(true)
        .build()
        .map_err(|e| SequenceError::Pattern(e.to_string()))?;

        let mut found = BTreeMap::new();
        for path in paths.filter_map(Result::ok) {
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(caps) = file_rx.captures(file_name) else {
                continue;
            };
            if let Some(Ok(frame)) = caps.get(1).map(|m| m.as_str().parse::<i64>()) {
                found.insert(frame, path.clone());
            }
        }

        info!("Found {} frame(s) of {} in {}", found.len(), self.display_name(), dir.display());
        Ok(found)
    }
}

/// Split a known image extension (with its dot) off a file name
fn split_image_ext(file_name: &str) -> (&str, &str) {
    if let Some(dot) = file_name.rfind('.') {
        let ext = &file_name[dot + 1..];
        if IMAGE_EXTS.contains(&ext.to_lowercase().as_str()) {
            return file_name.split_at(dot);
        }
    }
    (file_name, "")
}

/// Verification result for a frame set against the files on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub sequence: String,
    pub expected: usize,
    pub found: usize,
    pub missing: Frames,
}

impl Report {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Missing frames in range notation, ready to paste back as an expression
    pub fn missing_expression(&self) -> String {
        match &self.missing {
            Frames::Int(v) => rangify(v),
            Frames::Float(_) => self.missing.to_string(),
        }
    }
}

/// Check which of `frames` are not rendered yet
///
/// Whole frames are matched against a directory scan; sub-frames are checked one path at
/// a time using `decimals` fractional digits.
pub fn verify(pattern: &OutputPattern, frames: &Frames) -> Result<Report, SequenceError> {
    let (found, missing) = match frames {
        Frames::Int(wanted) => {
            let on_disk: Vec<i64> = pattern.scan()?.into_keys().collect();
            let missing = frames_not_in(wanted, &on_disk);
            (wanted.len() - missing.len(), Frames::Int(missing))
        }
        Frames::Float(wanted) => {
            let dir = if pattern.dir.as_os_str().is_empty() { Path::new(".") } else { pattern.dir() };
            if !dir.is_dir() {
                return Err(SequenceError::MissingDir(dir.to_path_buf()));
            }
            let decimals = crate::utils::subframe_decimals(wanted);
            let missing: Vec<f64> = wanted
                .iter()
                .copied()
                .filter(|&f| !pattern.subframe_path(f, decimals).is_file())
                .collect();
            (wanted.len() - missing.len(), Frames::Float(missing))
        }
    };

    Ok(Report {
        sequence: pattern.display_name(),
        expected: frames.len(),
        found,
        missing,
    })
}

/// Last standalone number in a file name
pub fn number_suffix(name: &str) -> Option<&str> {
    NUMBER_RX.find_iter(name).last().map(|m| m.as_str())
}

/// True if the file numbered `offset` away from `path` exists
pub fn neighbour_exists(path: &Path, offset: i64) -> bool {
    let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
        return false;
    };
    let Some(m) = NUMBER_RX.find_iter(file_name).last() else {
        return false;
    };
    let Ok(number) = m.as_str().parse::<i64>() else {
        return false;
    };

    let width = m.as_str().len();
    let neighbour = format!(
        "{}{:0width$}{}",
        &file_name[..m.start()],
        number + offset,
        &file_name[m.end()..],
        width = width
    );
    path.with_file_name(neighbour).is_file()
}

/// True if `path` is one frame of a numbered sequence on disk
pub fn is_sequence(path: &Path) -> bool {
    let ends_in_digit = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(|c: char| c.is_ascii_digit()));
    ends_in_digit && (neighbour_exists(path, 1) || neighbour_exists(path, -1))
}

/// Output pattern of the sequence a rendered frame belongs to
///
/// `/renders/shot_0042.exr` → `/renders/shot_####.exr`. The frame number must close the
/// name, directly before the image extension if there is one. `None` otherwise.
pub fn pattern_from_frame(path: &Path) -> Option<OutputPattern> {
    let file_name = path.file_name()?.to_str()?;
    let (stem, ext) = split_image_ext(file_name);
    let digits = number_suffix(stem)?;
    let name = stem.strip_suffix(digits)?;

    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    debug!("Frame {} belongs to {}{}{}", path.display(), name, "#".repeat(digits.len()), ext);
    Some(OutputPattern {
        dir,
        name: name.to_string(),
        padding: digits.len(),
        ext: ext.to_string(),
    })
}
