//! Voltage quantization to the instrument's settable resolution.

use smu_config::defaults;

/// A usable resolution: the input when it is finite and positive, the
/// documented 0.001 V default (with a warning) otherwise. Dividing by a
/// zero or negative resolution is never an option.
pub fn effective_resolution(resolution_v: f64) -> f64 {
    if resolution_v.is_finite() && resolution_v > 0.0 {
        resolution_v
    } else {
        tracing::warn!(
            resolution_v,
            fallback = defaults::RESOLUTION_V,
            "resolution must be > 0; using fallback"
        );
        defaults::RESOLUTION_V
    }
}

/// Round `volts` to the nearest multiple of `resolution_v`.
///
/// Rounding is half away from zero (`f64::round`); a bad resolution is
/// clamped via `effective_resolution`.
pub fn quantize(volts: f64, resolution_v: f64) -> f64 {
    let res = effective_resolution(resolution_v);
    (volts / res).round() * res
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn snaps_to_the_nearest_multiple() {
        assert_eq!(quantize(1.3, 0.25), 1.25);
        assert_eq!(quantize(1.4, 0.25), 1.5);
        assert_eq!(quantize(7.3, 0.5), 7.5);
        assert!((quantize(1.2344, 0.001) - 1.234).abs() < 1e-12);
    }

    #[test]
    fn ties_round_away_from_zero() {
        assert_eq!(quantize(0.375, 0.25), 0.5);
        assert_eq!(quantize(-0.375, 0.25), -0.5);
    }

    #[test]
    fn bad_resolution_clamps_to_default() {
        assert_eq!(quantize(1.2344, 0.0), quantize(1.2344, 0.001));
        assert_eq!(quantize(1.2344, -2.0), quantize(1.2344, 0.001));
        assert_eq!(quantize(1.2344, f64::NAN), quantize(1.2344, 0.001));
    }

    proptest! {
        #[test]
        fn idempotent(volts in -100.0f64..100.0, res in 1e-4f64..1.0) {
            let once = quantize(volts, res);
            let twice = quantize(once, res);
            prop_assert_eq!(once, twice);
        }
    }
}
