//! Output path versioning
//!
//! **Why**: Every render pass writes to a new `v01`, `v02`... location so earlier takes
//! are never overwritten.
//!
//! **Used by**: CLI `version`
//!
//! # Rules
//!
//! 1. Path already carries `v<digits>`: swap the number, keeping its width
//! 2. Path has frame hashes: insert `_vNN_` before the first `#`
//! 3. Path ends in an image extension: insert `_vNN` before the extension
//! 4. Otherwise: append `_vNN_`

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static VERSION_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v([0-9]+)").expect("version pattern is valid"));

/// Path endings that keep their place after a new version tag
///
/// Matched as plain suffixes, so the bare `"jpg"` also catches paths ending without a dot.
/// Narrower than [`crate::sequence::IMAGE_EXTS`], which recognizes files on disk.
pub const VERSION_EXTS: &[&str] = &[
    ".png", ".jpg", ".jpeg", "jpg", ".exr", ".dpx", ".tga", ".tif", ".tiff", ".cin",
];

/// Default separator around the version tag
pub const DEFAULT_DELIMITER: &str = "_";
/// Default minimum digit count of a new version tag
pub const DEFAULT_MIN_LEAD: usize = 2;

/// Replace or add a version tag in `path`
///
/// # Examples
///
/// ```
/// use loom::version::version_number;
///
/// assert_eq!(version_number("/out/shot_v003/img_####", 4, "_", 2), "/out/shot_v004/img_####");
/// assert_eq!(version_number("/out/img_####.exr", 1, "_", 2), "/out/img_v01_####.exr");
/// ```
pub fn version_number(path: &str, number: u32, delimiter: &str, min_lead: usize) -> String {
    if let Some(caps) = VERSION_RX.captures(path) {
        let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
            return path.to_string();
        };
        let tag = format!("v{:0width$}", number, width = digits.as_str().len());
        return path.replace(whole.as_str(), &tag);
    }

    let lead = format!("{:0width$}", number, width = min_lead);
    let version = format!("{d}v{lead}{d}", d = delimiter, lead = lead);

    if let Some(hash) = path.find('#') {
        let (head, tail) = path.split_at(hash);
        return format!("{}{}{}", trim_delimiter(head, delimiter), version, tail);
    }

    if VERSION_EXTS.iter().any(|ext| path.ends_with(ext)) {
        let (head, ext) = split_extension(path);
        let tag = &version[..version.len() - delimiter.len()];
        return format!("{}{}{}", trim_delimiter(head, delimiter), tag, ext);
    }

    format!("{}{}", trim_delimiter(path, delimiter), version)
}

fn trim_delimiter<'a>(s: &'a str, delimiter: &str) -> &'a str {
    if delimiter.is_empty() {
        return s;
    }
    let mut out = s;
    while let Some(rest) = out.strip_suffix(delimiter) {
        out = rest;
    }
    out
}

/// Split `path` into everything before the extension and the extension with its dot
fn split_extension(path: &str) -> (&str, &str) {
    let ext_len = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.len() + 1)
        .unwrap_or(0);
    path.split_at(path.len() - ext_len)
}
