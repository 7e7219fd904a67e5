//! Real-space grid sizes for Fourier transforms of a reflection table.

use crate::symmetry::DEN;
use crate::types::{Crystal, CrystalError};

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: usize, b: usize) -> usize {
    a / gcd(a, b) * b
}

/// True when `n` has no prime factors other than 2, 3 and 5.
fn is_fft_friendly(mut n: usize) -> bool {
    if n == 0 {
        return false;
    }
    for p in [2, 3, 5] {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}

/// Smallest multiple of `factor` that is at least `min` and FFT friendly.
fn fft_size(min: usize, factor: usize) -> usize {
    let mut n = min.div_ceil(factor).max(1) * factor;
    while !is_fft_friendly(n) {
        n += factor;
    }
    n
}

/// Grid dimensions sampling the cell at `dmin / sample_rate` or finer.
///
/// `dmin` defaults to the highest resolution in the table. Each dimension is
/// FFT friendly, holds every Miller index with d ≥ `dmin`, is a multiple of
/// the denominators of the space group's translations along its axis, and
/// axes exchanged by a symmetry operation get the same size.
pub fn get_gridsize(crystal: &Crystal, sample_rate: f64, dmin: Option<f64>) -> Result<[usize; 3], CrystalError> {
    if !(sample_rate >= 1.0) {
        return Err(CrystalError::InvalidArgument(format!(
            "sample_rate must be at least 1, got {sample_rate}"
        )));
    }
    let cell = crystal.require_cell()?;
    let sg = crystal.require_space_group()?;
    let hkls = crystal.hkls()?;
    let dhkl = super::compute_dhkl(hkls.view(), cell);

    let dmin = match dmin {
        Some(d) => d,
        None => dhkl
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(f64::INFINITY, f64::min),
    };
    if !(dmin.is_finite() && dmin > 0.0) {
        return Err(CrystalError::InvalidArgument(format!(
            "dmin must be positive, got {dmin}"
        )));
    }

    let spacing = dmin / sample_rate;
    let [a, b, c, ..] = cell.parameters();
    let mut need = [a, b, c].map(|x| (x / spacing).ceil() as usize);
    for (h, &d) in hkls.rows().into_iter().zip(dhkl.iter()) {
        if d >= dmin {
            for axis in 0..3 {
                need[axis] = need[axis].max(2 * h[axis].unsigned_abs() as usize + 1);
            }
        }
    }

    let mut factor = [1usize; 3];
    let mut group = [0usize, 1, 2];
    for op in sg.operations() {
        for i in 0..3 {
            let t = op.tran[i].rem_euclid(DEN) as usize;
            if t != 0 {
                factor[i] = lcm(factor[i], DEN as usize / gcd(t, DEN as usize));
            }
            for j in 0..3 {
                if i != j && op.rot[i][j] != 0 {
                    let (from, to) = (group[i].max(group[j]), group[i].min(group[j]));
                    for g in group.iter_mut().filter(|g| **g == from) {
                        *g = to;
                    }
                }
            }
        }
    }

    let mut size = [0usize; 3];
    for g in 0..3 {
        let members: Vec<usize> = (0..3).filter(|&i| group[i] == g).collect();
        if members.is_empty() {
            continue;
        }
        let min = members.iter().map(|&i| need[i]).max().unwrap_or(1);
        let f = members.iter().fold(1, |acc, &i| lcm(acc, factor[i]));
        let n = fft_size(min, f);
        for &i in &members {
            size[i] = n;
        }
    }

    tracing::debug!(?size, dmin, sample_rate, "grid size");
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::symmetry::SpaceGroup;
    use crate::types::crystal::tests::sample_crystal;
    use crate::types::UnitCell;

    #[test]
    fn fft_sizes() {
        assert_eq!(fft_size(7, 1), 8);
        assert_eq!(fft_size(11, 2), 12);
        assert_eq!(fft_size(13, 3), 15);
        assert_eq!(fft_size(31, 1), 32);
        assert_eq!(fft_size(7, 4), 8);
        assert!(!is_fft_friendly(14));
        assert!(is_fft_friendly(90));
    }

    #[test]
    fn grid_samples_the_cell_finely_enough() {
        let crystal = sample_crystal(&[[5, 0, 0], [0, 6, 1], [1, 0, 7]], &[0.0; 3]);
        let dhkl = crate::utils::compute_dhkl(crystal.hkls().unwrap().view(), crystal.cell().unwrap());
        let dmin = dhkl.iter().copied().fold(f64::INFINITY, f64::min);

        for rate in [1.0, 3.0] {
            let size = get_gridsize(&crystal, rate, None).unwrap();
            let abc = crystal.cell().unwrap().parameters();
            for axis in 0..3 {
                assert!(size[axis] as f64 >= abc[axis] / (dmin / rate));
                assert!(is_fft_friendly(size[axis]));
            }
            assert!(size[0] >= 11 && size[1] >= 13 && size[2] >= 15);
            // 2-fold screw along b
            assert_eq!(size[1] % 2, 0);
        }
    }

    #[test]
    fn related_axes_share_a_size() {
        let mut crystal = sample_crystal(&[[4, 1, 0], [0, 0, 3]], &[0.0; 2]);
        crystal.set_cell(Some(UnitCell::new(40.0, 40.0, 90.0, 90.0, 90.0, 90.0).unwrap()));
        crystal.set_space_group(Some(Arc::new(SpaceGroup::by_number(75).unwrap())));
        let size = get_gridsize(&crystal, 3.0, Some(5.0)).unwrap();
        assert_eq!(size[0], size[1]);
        assert!(size[2] as f64 >= 90.0 / (5.0 / 3.0));
    }

    #[test]
    fn rejects_undersampling_and_missing_metadata() {
        let mut crystal = sample_crystal(&[[1, 0, 0]], &[0.0]);
        assert!(get_gridsize(&crystal, 0.5, None).is_err());
        assert!(get_gridsize(&crystal, f64::NAN, None).is_err());
        crystal.set_space_group(None);
        assert!(get_gridsize(&crystal, 3.0, None).is_err());
    }
}
