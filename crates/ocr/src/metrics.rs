use crate::config::LayoutOptions;
use crate::fragment::Fragment;

/// Scale parameters derived once per fragment set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    /// Maximum gap between neighbouring vertical centers on one line.
    pub vertical_tolerance: f64,
    /// Approximate glyph width, the quantum for reconstructed spacing.
    pub horizontal_unit: f64,
}

impl Metrics {
    /// Derive metrics from a fragment set.
    ///
    /// The tolerance follows the *smallest* fragment height so that small print
    /// does not merge across lines. The unit is `floor(Σ width / Σ chars)` and
    /// falls back to `options.fallback_unit` when there are no characters.
    pub fn estimate(fragments: &[Fragment], options: &LayoutOptions) -> Self {
        let min_height = fragments
            .iter()
            .map(|f| f.bbox.height())
            .fold(f64::INFINITY, f64::min);

        let vertical_tolerance = if min_height.is_finite() && options.tolerance_divisor > 0.0 {
            min_height / options.tolerance_divisor
        } else {
            0.0
        };

        let (width_sum, char_sum) = fragments.iter().fold((0.0f64, 0usize), |(w, c), f| {
            (w + f.bbox.width(), c + f.char_count())
        });

        let horizontal_unit = if char_sum == 0 {
            options.fallback_unit
        } else {
            (width_sum / char_sum as f64).floor()
        };

        Self { vertical_tolerance, horizontal_unit }
    }
}
