//! Frame list helpers
//!
//! **Why**: Render, batch and encode steps all report frame lists back to the user and
//! look for holes in them. These are the shared pieces.
//!
//! **Used by**: CLI, sequence verification

use std::collections::BTreeSet;

/// Collapse consecutive runs into range notation
///
/// `[1, 2, 3, 5, 7, 8]` → `"1-3,5,7-8"`. Runs follow input order, so pass sorted frames.
pub fn rangify(frames: &[i64]) -> String {
    let mut groups: Vec<String> = Vec::new();
    let mut iter = frames.iter().copied().peekable();

    while let Some(first) = iter.next() {
        let mut last = first;
        while let Some(&next) = iter.peek() {
            if next != last + 1 {
                break;
            }
            last = next;
            iter.next();
        }

        if first == last {
            groups.push(first.to_string());
        } else {
            groups.push(format!("{}-{}", first, last));
        }
    }

    groups.join(",")
}

/// Frames between the lowest and highest entry that are not in `frames`
pub fn missing_frames(frames: &[i64]) -> Vec<i64> {
    let (Some(&lo), Some(&hi)) = (frames.iter().min(), frames.iter().max()) else {
        return Vec::new();
    };
    let present: BTreeSet<i64> = frames.iter().copied().collect();
    (lo..=hi).filter(|f| !present.contains(f)).collect()
}

/// Sorted frames of `wanted` that are absent from `present`
pub fn frames_not_in(wanted: &[i64], present: &[i64]) -> Vec<i64> {
    let present: BTreeSet<i64> = present.iter().copied().collect();
    let wanted: BTreeSet<i64> = wanted.iter().copied().collect();
    wanted.difference(&present).copied().collect()
}

/// Split a sub-frame into its integral frame and fractional part
///
/// `12.25` → `(12, 0.25)`, `-1.5` → `(-1, 0.5)`. The fraction is rounded to 5 decimals;
/// a fraction that rounds up to 1 carries into the frame (`12.999999` → `(13, 0.0)`).
pub fn split_subframe(frame: f64) -> (i64, f64) {
    let mut main = frame.trunc();
    let mut sub = ((frame - main).abs() * 1e5).round() / 1e5;
    if sub >= 1.0 {
        main += frame.signum();
        sub = 0.0;
    }
    (main as i64, sub)
}

/// Number of fractional digits needed to write every frame (0..=5)
pub fn subframe_decimals(frames: &[f64]) -> usize {
    frames
        .iter()
        .map(|&f| {
            let (_, sub) = split_subframe(f);
            // Trailing zeros of the 5-decimal form don't count
            format!("{:.5}", sub)
                .split('.')
                .nth(1)
                .map(|digits| digits.trim_end_matches('0').len())
                .unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}

/// Expression for a timeline range: `"1-250"` or `"1-250x2"`
pub fn timeline_expression(start: i64, end: i64, step: i64) -> String {
    if step == 1 {
        format!("{}-{}", start, end)
    } else {
        format!("{}-{}x{}", start, end, step)
    }
}

/// Plural suffix for counts in user messages
pub fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}
