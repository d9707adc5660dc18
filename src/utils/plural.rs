//! Pluralization for log messages.

/// Return "s" suffix for plural counts
#[inline]
pub fn plural_s(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Format count with noun, handling pluralization
///
/// - `plural_count(1, "pass")` -> `"1 pass"` (irregular plurals use `plural_count_with`)
/// - `plural_count(3, "warning")` -> `"3 warnings"`
#[inline]
pub fn plural_count(count: usize, noun: &str) -> String {
    format!("{} {}{}", count, noun, plural_s(count))
}

/// Format count with explicit singular and plural forms.
#[inline]
pub fn plural_count_with(count: usize, singular: &str, plural: &str) -> String {
    format!("{} {}", count, if count == 1 { singular } else { plural })
}
