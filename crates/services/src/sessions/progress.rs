/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionProgress {
    /// Zero-based index of the screen being shown.
    pub current: usize,
    pub total: usize,
    /// `(current + 1) / total`, capped at `1.0`; `0.0` without questions.
    pub fraction: f64,
    pub is_finished: bool,
}

/// Fraction shown by progress indicators.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn progress_fraction(current: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((current + 1) as f64 / total as f64).min(1.0)
}
