/// Number of subjects carried by every record.
pub const SUBJECT_COUNT: usize = 6;

/// Every subject is marked out of 100.
pub const MARKS_PER_SUBJECT: i64 = 100;

/// Denominator used for the percentage: six subjects at 100 each.
pub const MAX_TOTAL_MARKS: i64 = SUBJECT_COUNT as i64 * MARKS_PER_SUBJECT;

/// `None` when the sum does not fit in an `i64`.
pub fn checked_total(marks: &[i64; SUBJECT_COUNT]) -> Option<i64> {
    marks.iter().try_fold(0i64, |acc, &m| acc.checked_add(m))
}

/// Saturates at the `i64` bounds; [`checked_total`] is the validating form.
pub fn total_marks(marks: &[i64; SUBJECT_COUNT]) -> i64 {
    marks.iter().fold(0i64, |acc, &m| acc.saturating_add(m))
}

/// Unrounded percentage of `total` against [`MAX_TOTAL_MARKS`].
pub fn percentage(total: i64) -> f64 {
    (total as f64) / (MAX_TOTAL_MARKS as f64) * 100.0
}

/// 2-decimal rounding used for display. Ties go away from zero.
pub fn round_off_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn display_percentage(total: i64) -> f64 {
    round_off_2_decimals(percentage(total))
}
