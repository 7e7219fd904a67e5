//! Phase angle canonicalization.

use std::f64::consts::PI;

use ndarray::Array1;

/// Wrap an angle into the half-open range (-180°, 180°], or (-π, π] when
/// `deg` is false. NaN passes through.
pub fn canonicalize_phase(value: f64, deg: bool) -> f64 {
    let full = if deg { 360.0 } else { 2.0 * PI };
    let half = full / 2.0;
    let mut wrapped = value - full * (value / full).round();
    if wrapped <= -half {
        wrapped += full;
    } else if wrapped > half {
        wrapped -= full;
    }
    wrapped
}

/// [`canonicalize_phase`] over an array.
pub fn canonicalize_phases(values: &Array1<f64>, deg: bool) -> Array1<f64> {
    values.mapv(|v| canonicalize_phase(v, deg))
}

/// Smallest absolute angular difference between two phases in degrees.
pub fn phase_distance(a: f64, b: f64) -> f64 {
    canonicalize_phase(a - b, true).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_into_range() {
        assert_eq!(canonicalize_phase(190.0, true), -170.0);
        assert_eq!(canonicalize_phase(-150.0, true), -150.0);
        assert_eq!(canonicalize_phase(-180.0, true), 180.0);
        assert_eq!(canonicalize_phase(180.0, true), 180.0);
        assert_eq!(canonicalize_phase(540.0, true), 180.0);
        assert_eq!(canonicalize_phase(720.0, true), 0.0);
        assert!((canonicalize_phase(-370.0, true) + 10.0).abs() < 1e-12);
    }

    #[test]
    fn radians() {
        assert!((canonicalize_phase(3.0 * PI, false) - PI).abs() < 1e-12);
        assert!((canonicalize_phase(-PI, false) - PI).abs() < 1e-12);
        assert!((canonicalize_phase(0.5, false) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn nan_passes_through() {
        assert!(canonicalize_phase(f64::NAN, true).is_nan());
    }

    #[test]
    fn array_form_and_distance() {
        let out = canonicalize_phases(&Array1::from(vec![170.0 + 20.0, -170.0 + 20.0]), true);
        assert_eq!(out.to_vec(), vec![-170.0, -150.0]);
        assert!((phase_distance(179.0, -179.0) - 2.0).abs() < 1e-12);
    }
}
