//! # Area Arithmetic
//!
//! Hectare conversion and overlap percentage. Native geometry units are
//! assumed to be metres, so a native area is in square metres and one
//! hectare is 10,000 native square units.

/// Native square units per hectare.
pub const HECTARE_SQUARE_UNITS: f64 = 10_000.0;

/// Decimal places kept by [`overlap_percent`].
pub const PERCENT_DECIMALS: i32 = 4;

/// Convert a native-unit area to hectares.
pub fn to_hectares(native_area: f64) -> f64 {
    native_area / HECTARE_SQUARE_UNITS
}

/// Overlap of `intersection` within `total`, as a percentage rounded to
/// [`PERCENT_DECIMALS`] places (half away from zero).
///
/// Both areas must be native-unit areas, taken before hectare conversion.
/// Returns `0.0` when `total` is not strictly positive, since the ratio is
/// meaningless for a degenerate polygon.
pub fn overlap_percent(intersection: f64, total: f64) -> f64 {
    if total.is_nan() || total <= 0.0 {
        return 0.0;
    }
    let scale = 10f64.powi(PERCENT_DECIMALS);
    (intersection / total * 100.0 * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn hectare_conversion() {
        assert_relative_eq!(to_hectares(10_000.0), 1.0);
        assert_relative_eq!(to_hectares(25_000.0), 2.5);
        assert_eq!(to_hectares(0.0), 0.0);
    }

    #[test]
    fn full_overlap_is_one_hundred() {
        assert_eq!(overlap_percent(123.456, 123.456), 100.0);
    }

    #[test]
    fn percent_rounds_to_four_places() {
        // 1/3 → 33.3333...
        assert_eq!(overlap_percent(1.0, 3.0), 33.3333);
        // 2/3 → 66.6666... rounds up
        assert_eq!(overlap_percent(2.0, 3.0), 66.6667);
    }

    #[test]
    fn degenerate_total_yields_zero() {
        assert_eq!(overlap_percent(5.0, 0.0), 0.0);
        assert_eq!(overlap_percent(5.0, -1.0), 0.0);
        assert_eq!(overlap_percent(5.0, f64::NAN), 0.0);
    }

    proptest! {
        #[test]
        fn hectares_are_native_over_ten_thousand(area in 0.0f64..1e12) {
            prop_assert_eq!(to_hectares(area), area / 10_000.0);
        }

        #[test]
        fn percent_stays_in_range(total in 1e-3f64..1e9, frac in 0.0f64..=1.0) {
            let p = overlap_percent(total * frac, total);
            prop_assert!(p >= 0.0);
            prop_assert!(p <= 100.0);
        }
    }
}
