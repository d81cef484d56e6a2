//! Frame expression parsing
//!
//! **Why**: Artists type frame lists by hand ("1-10,15,^3-4x2") into render fields and
//! command lines. This turns such a string into the concrete, ordered set of frames to render.
//!
//! **Used by**: CLI (`frames`, `missing`, `verify`), sequence verification
//!
//! # Grammar
//!
//! Tokens are picked out of the string by scanning; anything unrecognized is skipped.
//!
//! - `12`, `12.`, `.5`, `2.25`: single frame
//! - `1-10`, `10-1`, `-3--1`: inclusive range (reversed bounds are swapped)
//! - `1-10x2`, `1-10%2`: range with its own step
//! - `^3`, `!3-5`: exclusion of a frame or range
//!
//! # Exclusion Mode
//!
//! By default an exclusion switches the rest of the expression into exclude mode
//! (`1-50^10-20,30` drops 10-20 and 30), unless the exclusion is the very first token.
//! With `filter_individual` every token keeps its own sign, and frames re-added after an
//! exclusion are restored (`1-10,^5,5` keeps 5).
//!
//! # Numerics
//!
//! Ranges are expanded in f64 with every value rounded to 5 decimals. The end frame is
//! appended when the last step lands on it within tolerance (see [`is_close`]).

use log::{debug, trace, warn};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Decimal places kept after each range step
const ROUND_DECIMALS: i32 = 5;

/// Upper bound for a single expanded range
pub const MAX_RANGE_LEN: usize = 10_000_000;

// Whole-token scanner: ranges with step, ranges, decimals, integers (in that priority)
static TOKEN_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        [\^!]? \s*?
        [-+]?
        (?:
            [0-9]*\.?[0-9]+ \s? - \s? [0-9]*\.?[0-9]+ \s? [x%] \s? [-+]?[0-9]*\.?[0-9]+
          | [0-9]*\.?[0-9]+ \s? - \s? [-+]?[0-9]*\.?[0-9]+
          | [0-9]*\.[0-9]+
          | [0-9]+\.?
        )",
    )
    .expect("token pattern is valid")
});

// Splits a range token into start, end and optional step
static RANGE_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ([-+]?[0-9]*?\.?[0-9]+\b)
        \s*? - \s*?
        ([-+]?[0-9]*\.?[0-9]+)
        (?: \s*? [x%] \s*? ([-+]?[0-9]*\.?[0-9]+\b) )?",
    )
    .expect("range pattern is valid")
});

/// Frame expression errors
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Range step is zero, negative or not a number
    InvalidStep { start: f64, end: f64, step: f64 },
    /// Range would expand past [`MAX_RANGE_LEN`] frames
    RangeTooLarge { start: f64, end: f64, step: f64 },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::InvalidStep { start, end, step } => {
                write!(f, "Invalid step {} for range {}-{}", step, start, end)
            }
            FrameError::RangeTooLarge { start, end, step } => write!(
                f,
                "Range {}-{} with step {} exceeds {} frames",
                start, end, step, MAX_RANGE_LEN
            ),
        }
    }
}

impl std::error::Error for FrameError {}

/// Resolved frame set, ascending and duplicate-free
///
/// Integer whenever every frame is whole, otherwise all frames are floats.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Frames {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl Frames {
    /// Build from sorted unique values, picking the integer form when possible
    fn from_values(values: Vec<f64>) -> Self {
        if values.iter().all(|v| v.fract() == 0.0) {
            Frames::Int(values.into_iter().map(|v| v as i64).collect())
        } else {
            Frames::Float(values)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Frames::Int(v) => v.len(),
            Frames::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the set holds sub-frames
    pub fn is_float(&self) -> bool {
        matches!(self, Frames::Float(_))
    }

    /// Integer frames, `None` for sub-frame sets
    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Frames::Int(v) => Some(v),
            Frames::Float(_) => None,
        }
    }

    /// All frames as f64
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Frames::Int(v) => v.iter().map(|&f| f as f64).collect(),
            Frames::Float(v) => v.clone(),
        }
    }
}

impl fmt::Display for Frames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = match self {
            Frames::Int(v) => v.iter().map(|x| x.to_string()).collect(),
            Frames::Float(v) => v.iter().map(|x| format!("{:?}", x)).collect(),
        };
        write!(f, "{}", parts.join(","))
    }
}

/// Parsed token
#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenKind {
    Single(f64),
    Range { a: f64, b: f64, step: Option<f64> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Token {
    excluded: bool,
    kind: TokenKind,
}

/// Classify one scanned match. `None` if it holds nothing usable.
fn classify(raw: &str) -> Option<Token> {
    let trimmed = raw.trim();
    let (excluded, body) = match trimmed.strip_prefix(['^', '!']) {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };

    if let Ok(value) = body.parse::<f64>() {
        return Some(Token { excluded, kind: TokenKind::Single(value) });
    }

    let caps = RANGE_RX.captures(body)?;
    let a = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let b = caps.get(2)?.as_str().parse::<f64>().ok()?;
    let step = caps.get(3).and_then(|m| m.as_str().parse::<f64>().ok());

    Some(Token { excluded, kind: TokenKind::Range { a, b, step } })
}

/// Scan expression into tokens. `None` if nothing numeric was found.
fn tokenize(expression: &str) -> Option<Vec<Token>> {
    let raw: Vec<&str> = TOKEN_RX.find_iter(expression).map(|m| m.as_str()).collect();
    if raw.is_empty() {
        return None;
    }

    let tokens = raw
        .iter()
        .filter_map(|r| {
            let token = classify(r);
            if token.is_none() {
                warn!("Skipping unrecognized frame token {:?}", r);
            }
            token
        })
        .collect();
    Some(tokens)
}

/// Tolerance comparison with the usual relative/absolute bounds (1e-5 / 1e-8)
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

fn round_frame(v: f64) -> f64 {
    let scale = 10f64.powi(ROUND_DECIMALS);
    (v * scale).round_ties_even() / scale
}

/// Expand `start..end` (start < end) by `step`, appending `end` when the last step lands on it
fn expand_range(start: f64, end: f64, step: f64) -> Result<Vec<f64>, FrameError> {
    if !step.is_finite() || step <= 0.0 {
        return Err(FrameError::InvalidStep { start, end, step });
    }

    let count = ((end - start) / step).ceil();
    if !count.is_finite() || count > MAX_RANGE_LEN as f64 {
        return Err(FrameError::RangeTooLarge { start, end, step });
    }

    let mut values: Vec<f64> = (0..count as usize)
        .map(|i| round_frame(start + i as f64 * step))
        .collect();

    if let Some(&last) = values.last() {
        if is_close(step, end - last) {
            values.push(end);
        }
    }
    Ok(values)
}

// Hash key for exact set semantics; folds -0.0 into 0.0
fn key(v: f64) -> u64 {
    (v + 0.0).to_bits()
}

/// Frame expression filter with its parse options
///
/// # Examples
///
/// ```
/// use loom::frames::{FrameFilter, Frames};
///
/// let frames = FrameFilter::new().filter("1-10^3-4")?;
/// assert_eq!(frames, Some(Frames::Int(vec![1, 2, 5, 6, 7, 8, 9, 10])));
/// # Ok::<(), loom::frames::FrameError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameFilter {
    /// Step for ranges without their own `xN`
    pub increment: f64,
    /// Keep each token's inclusion/exclusion independent
    pub individual: bool,
}

impl Default for FrameFilter {
    fn default() -> Self {
        Self { increment: 1.0, individual: false }
    }
}

impl FrameFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(mut self, increment: f64) -> Self {
        self.increment = increment;
        self
    }

    pub fn individual(mut self, individual: bool) -> Self {
        self.individual = individual;
        self
    }

    /// Parse `expression` into a frame set
    ///
    /// - `Ok(None)`: no numeric content at all
    /// - `Ok(Some(frames))`: resolved set, possibly empty when everything was excluded
    /// - `Err(FrameError)`: a range with an unusable step
    pub fn filter(&self, expression: &str) -> Result<Option<Frames>, FrameError> {
        let Some(tokens) = tokenize(expression) else {
            debug!("No frames in {:?}", expression);
            return Ok(None);
        };

        let mut frames: Vec<f64> = Vec::new();
        let mut excluded: Vec<f64> = Vec::new();
        let mut conform: Vec<f64> = Vec::new();

        // Exclude mode starts at the first exclusion, unless it leads the expression
        let mut seen_exclusion = false;
        let mut exclude_rest = false;
        // Individual mode: inclusions after an exclusion are remembered for restoring
        let mut conforming = false;

        for (index, token) in tokens.iter().enumerate() {
            if !self.individual && token.excluded && !seen_exclusion {
                seen_exclusion = true;
                exclude_rest = index > 0;
            }
            let is_excluded = token.excluded || exclude_rest;
            trace!("Token {:?} excluded={}", token.kind, is_excluded);

            match token.kind {
                TokenKind::Single(value) if is_excluded => {
                    excluded.push(value);
                    if self.individual {
                        conforming = true;
                    }
                }
                TokenKind::Single(value) => {
                    frames.push(value);
                    if conforming {
                        conform.push(value);
                    }
                }
                TokenKind::Range { a, b, step } => {
                    let start = a.min(b);
                    let end = a.max(b);

                    if start < end {
                        let values = expand_range(start, end, step.unwrap_or(self.increment))?;
                        if is_excluded {
                            if self.individual {
                                conforming = true;
                            }
                            excluded.extend(values);
                        } else {
                            if conforming {
                                conform.extend_from_slice(&values);
                            }
                            frames.extend(values);
                        }
                    } else if is_excluded {
                        excluded.push(start);
                    } else {
                        frames.push(start);
                    }
                }
            }
        }

        if self.individual {
            let restored: HashSet<u64> = conform.iter().map(|&v| key(v)).collect();
            excluded.retain(|&v| !restored.contains(&key(v)));
        }

        let excluded: HashSet<u64> = excluded.iter().map(|&v| key(v)).collect();
        let mut resolved: Vec<f64> = frames
            .into_iter()
            .filter(|&v| !excluded.contains(&key(v)))
            .map(|v| v + 0.0)
            .collect();
        resolved.sort_by(f64::total_cmp);
        resolved.dedup();

        debug!("Parsed {:?}: {} frame(s), {} excluded", expression, resolved.len(), excluded.len());
        Ok(Some(Frames::from_values(resolved)))
    }
}

/// Parse a frame expression with the given default step and exclusion mode
///
/// Shorthand for `FrameFilter { increment, individual }.filter(expression)`.
pub fn filter_frames(
    expression: &str,
    increment: f64,
    filter_individual: bool,
) -> Result<Option<Frames>, FrameError> {
    FrameFilter { increment, individual: filter_individual }.filter(expression)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(expr: &str) -> Vec<i64> {
        match filter_frames(expr, 1.0, false).unwrap() {
            Some(Frames::Int(v)) => v,
            other => panic!("expected integer frames for {:?}, got {:?}", expr, other),
        }
    }

    fn individual(expr: &str) -> Frames {
        filter_frames(expr, 1.0, true).unwrap().unwrap()
    }

    #[test]
    fn test_plain_range() {
        assert_eq!(ints("1-10"), vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_singles_and_mixed() {
        assert_eq!(ints("1,3,5"), vec![1, 3, 5]);
        assert_eq!(ints("1-5,10"), vec![1, 2, 3, 4, 5, 10]);
        assert_eq!(ints("1, 3, 7."), vec![1, 3, 7]);
    }

    #[test]
    fn test_exclusion_subtracts() {
        assert_eq!(ints("1-10^3-4"), vec![1, 2, 5, 6, 7, 8, 9, 10]);
        assert_eq!(ints("1-10^3"), vec![1, 2, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(ints("1-10!3"), vec![1, 2, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_nothing_to_parse() {
        assert_eq!(filter_frames("", 1.0, false), Ok(None));
        assert_eq!(filter_frames("not a number", 1.0, false), Ok(None));
        assert_eq!(filter_frames("   ", 1.0, true), Ok(None));
    }

    #[test]
    fn test_everything_excluded_is_empty_not_none() {
        let frames = filter_frames("1-3^1-3", 1.0, false).unwrap();
        assert_eq!(frames, Some(Frames::Int(vec![])));
    }

    #[test]
    fn test_reversed_range() {
        assert_eq!(ints("10-1"), ints("1-10"));
    }

    #[test]
    fn test_range_steps() {
        assert_eq!(ints("1-10x2"), vec![1, 3, 5, 7, 9]);
        assert_eq!(ints("1-10x3"), vec![1, 4, 7, 10]);
        assert_eq!(ints("1-10%3"), vec![1, 4, 7, 10]);
        assert_eq!(ints("1 - 4 x 2"), vec![1, 3]);
    }

    #[test]
    fn test_default_increment() {
        let frames = filter_frames("1-10", 2.0, false).unwrap();
        assert_eq!(frames, Some(Frames::Int(vec![1, 3, 5, 7, 9])));
        // Token step wins over the default
        let frames = filter_frames("1-10x3", 2.0, false).unwrap();
        assert_eq!(frames, Some(Frames::Int(vec![1, 4, 7, 10])));
    }

    #[test]
    fn test_subframe_steps_land_on_end() {
        let frames = filter_frames("0.0-0.1x0.02", 1.0, false).unwrap().unwrap();
        assert_eq!(frames, Frames::Float(vec![0.0, 0.02, 0.04, 0.06, 0.08, 0.1]));

        let frames = filter_frames("0-1x0.1", 1.0, false).unwrap().unwrap();
        assert_eq!(
            frames,
            Frames::Float(vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0])
        );
    }

    #[test]
    fn test_mixed_input_becomes_float() {
        let frames = filter_frames("1-3,2.5", 1.0, false).unwrap().unwrap();
        assert_eq!(frames, Frames::Float(vec![1.0, 2.0, 2.5, 3.0]));
        assert!(frames.is_float());
        assert_eq!(frames.as_ints(), None);

        // Whole decimals still collapse to integers
        assert_eq!(ints("1.0,2.0"), vec![1, 2]);
    }

    #[test]
    fn test_leading_dot_decimals() {
        let frames = filter_frames(".5,1", 1.0, false).unwrap().unwrap();
        assert_eq!(frames, Frames::Float(vec![0.5, 1.0]));

        let frames = filter_frames(".25-1x.25", 1.0, false).unwrap().unwrap();
        assert_eq!(frames, Frames::Float(vec![0.25, 0.5, 0.75, 1.0]));
    }

    #[test]
    fn test_space_after_exclusion_marker() {
        assert_eq!(ints("1-10 ^ 3"), vec![1, 2, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(ints("1-10 ! 3-4"), vec![1, 2, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_negative_ranges() {
        assert_eq!(ints("-3--1"), vec![-3, -2, -1]);
        assert_eq!(ints("-2-2"), vec![-2, -1, 0, 1, 2]);
        assert_eq!(ints("-5--1^-3"), vec![-5, -4, -2, -1]);
    }

    #[test]
    fn test_degenerate_range() {
        assert_eq!(ints("5-5"), vec![5]);
        assert_eq!(ints("1-10^5-5"), vec![1, 2, 3, 4, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_exclusion_propagates() {
        let expected: Vec<i64> = (1..=9).chain(21..=50).collect();
        assert_eq!(ints("1-50^10-20"), expected);
        // 7 follows an exclusion, so it is excluded too
        assert_eq!(ints("1-10^5,7"), vec![1, 2, 3, 4, 6, 8, 9, 10]);
        assert_eq!(ints("1-10,^2-4,3"), vec![1, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_leading_exclusion_does_not_propagate() {
        assert_eq!(ints("^5,1-10"), vec![1, 2, 3, 4, 6, 7, 8, 9, 10]);
        assert_eq!(ints("^3,5,^7,9"), vec![5, 9]);
    }

    #[test]
    fn test_individual_mode_restores() {
        assert_eq!(individual("1-10,^5,5"), Frames::Int((1..=10).collect()));
        assert_eq!(individual("1-10,^2-4,3"), Frames::Int(vec![1, 3, 5, 6, 7, 8, 9, 10]));
        assert_eq!(individual("1-10^5,7"), Frames::Int(vec![1, 2, 3, 4, 6, 7, 8, 9, 10]));
        assert_eq!(individual("^5,1-10"), Frames::Int((1..=10).collect()));
    }

    #[test]
    fn test_individual_single_value_range_keeps_exclusion() {
        // A one-frame range exclusion does not start restoring later frames
        assert_eq!(individual("1-10,^5-5,5"), Frames::Int(vec![1, 2, 3, 4, 6, 7, 8, 9, 10]));
    }

    #[test]
    fn test_zero_and_negative_step_rejected() {
        let err = filter_frames("1-10x0", 1.0, false).unwrap_err();
        assert!(matches!(err, FrameError::InvalidStep { .. }));

        let err = filter_frames("1-10", 0.0, false).unwrap_err();
        assert!(matches!(err, FrameError::InvalidStep { step, .. } if step == 0.0));

        let err = filter_frames("1-10x-2", 1.0, false).unwrap_err();
        assert!(matches!(err, FrameError::InvalidStep { .. }));
    }

    #[test]
    fn test_zero_step_ignored_without_true_range() {
        let frames = filter_frames("4,5-5", 0.0, false).unwrap();
        assert_eq!(frames, Some(Frames::Int(vec![4, 5])));
    }

    #[test]
    fn test_huge_range_rejected() {
        let err = filter_frames("0-100000000", 1.0, false).unwrap_err();
        assert!(matches!(err, FrameError::RangeTooLarge { .. }));
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_sorted_unique_and_repeatable() {
        for expr in ["9,1,5,1,3-6", "10-1,4,4.5", "1-20x4,^9,2-3", "3,2,1,0.5"] {
            let first = filter_frames(expr, 1.0, false).unwrap().unwrap();
            let second = filter_frames(expr, 1.0, false).unwrap().unwrap();
            assert_eq!(first, second);

            let values = first.to_f64();
            assert!(values.windows(2).all(|w| w[0] < w[1]), "{:?} -> {:?}", expr, values);
        }
    }

    #[test]
    fn test_negative_zero_folds() {
        assert_eq!(ints("-0,0"), vec![0]);
    }

    #[test]
    fn test_is_close() {
        assert!(is_close(0.1, 0.3 - 0.2));
        assert!(is_close(0.02, 0.1 - 0.08));
        assert!(!is_close(2.0, 1.0));
        assert!(!is_close(0.1, 0.1001));
    }

    #[test]
    fn test_display_and_json() {
        let frames = filter_frames("1-3", 1.0, false).unwrap().unwrap();
        assert_eq!(frames.to_string(), "1,2,3");
        assert_eq!(serde_json::to_string(&frames).unwrap(), "[1,2,3]");

        let frames = filter_frames("1,1.5", 1.0, false).unwrap().unwrap();
        assert_eq!(frames.to_string(), "1.0,1.5");
        assert_eq!(serde_json::to_string(&frames).unwrap(), "[1.0,1.5]");
    }

    #[test]
    fn test_builder() {
        let filter = FrameFilter::new().increment(5.0).individual(true);
        assert_eq!(filter.increment, 5.0);
        assert!(filter.individual);
        assert_eq!(filter.filter("0-20").unwrap(), Some(Frames::Int(vec![0, 5, 10, 15, 20])));
    }
}
