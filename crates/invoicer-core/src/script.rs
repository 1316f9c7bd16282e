//! Target-script detection by Unicode range membership.
//!
//! "Contains target-script characters" and "is target-script text" are different predicates:
//! the latter requires more than half of the significant characters to be in the block.

use std::ops::RangeInclusive;

/// Gujarati Unicode block.
pub const TARGET_SCRIPT_RANGE: RangeInclusive<char> = '\u{0A80}'..='\u{0AFF}';

/// Share of significant characters that must be target-script for [`is_target_script`].
pub const TARGET_SCRIPT_THRESHOLD: f64 = 0.5;

/// Whether `c` belongs to the target script block.
pub fn is_target_char(c: char) -> bool {
    TARGET_SCRIPT_RANGE.contains(&c)
}

/// Characters that count towards the ratio: whitespace and ASCII punctuation are ignored.
fn is_significant(c: char) -> bool {
    !c.is_whitespace() && !c.is_ascii_punctuation()
}

/// Whether any character of `text` is in the target script.
pub fn contains_target_script(text: &str) -> bool {
    text.chars().any(is_target_char)
}

/// Fraction of significant characters that are in the target script (0.0 for empty text).
#[allow(clippy::cast_precision_loss)]
pub fn target_script_ratio(text: &str) -> f64 {
    let (target, total) = text
        .chars()
        .filter(|&c| is_significant(c))
        .fold((0usize, 0usize), |(target, total), c| {
            (target + usize::from(is_target_char(c)), total + 1)
        });

    if total == 0 {
        0.0
    } else {
        target as f64 / total as f64
    }
}

/// Whether `text` is predominantly target-script (strictly more than half).
pub fn is_target_script(text: &str) -> bool {
    target_script_ratio(text) > TARGET_SCRIPT_THRESHOLD
}
