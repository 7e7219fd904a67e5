//! Lattice-plane spacings and reciprocal-lattice enumeration.

use ndarray::{Array1, Array2, ArrayView2};

use crate::config::DHKL_LABEL;
use crate::types::{Column, Crystal, CrystalError, Dtype, UnitCell};

/// d-spacing (Å) of every row of an n×3 Miller index array.
pub fn compute_dhkl(hkls: ArrayView2<i32>, cell: &UnitCell) -> Array1<f64> {
    hkls.rows()
        .into_iter()
        .map(|h| cell.d_spacing([h[0], h[1], h[2]]))
        .collect()
}

/// Every Miller index other than (0, 0, 0) with d ≥ `dmin`.
///
/// Rows are ordered by H, then K, then L, ascending.
pub fn generate_reciprocal_cell(cell: &UnitCell, dmin: f64) -> Result<Array2<i32>, CrystalError> {
    if dmin.is_nan() || dmin <= 0.0 {
        return Err(CrystalError::InvalidArgument(format!(
            "dmin must be positive, got {dmin}"
        )));
    }
    let [hmax, kmax, lmax] = cell.hkl_limits(dmin);
    let mut rows = Vec::new();
    for h in -hmax..=hmax {
        for k in -kmax..=kmax {
            for l in -lmax..=lmax {
                let hkl = [h, k, l];
                if hkl != [0, 0, 0] && cell.d_spacing(hkl) >= dmin {
                    rows.extend_from_slice(&hkl);
                }
            }
        }
    }
    let n = rows.len() / 3;
    Array2::from_shape_vec((n, 3), rows)
        .map_err(|e| CrystalError::InvalidArgument(e.to_string()))
}

impl Crystal {
    /// Add (or overwrite) the `dHKL` column from the table's unit cell.
    pub fn compute_dhkl(&self) -> Result<Crystal, CrystalError> {
        let cell = self.require_cell()?;
        let dhkl = compute_dhkl(self.hkls()?.view(), cell);
        let mut out = self.clone();
        out.insert_column(Column::from_f64(DHKL_LABEL, Dtype::MtzReal, dhkl)?)?;
        Ok(out)
    }

    /// In-place [`Crystal::compute_dhkl`].
    pub fn compute_dhkl_inplace(&mut self) -> Result<(), CrystalError> {
        *self = self.compute_dhkl()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::crystal::tests::sample_crystal;
    use ndarray::array;

    fn cubic() -> UnitCell {
        UnitCell::new(10.0, 10.0, 10.0, 90.0, 90.0, 90.0).unwrap()
    }

    #[test]
    fn spacings_for_rows() {
        let d = compute_dhkl(array![[1, 0, 0], [0, 0, 2]].view(), &cubic());
        assert!((d[0] - 10.0).abs() < 1e-9);
        assert!((d[1] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn reciprocal_cell_respects_dmin() {
        let hkls = generate_reciprocal_cell(&cubic(), 4.9).unwrap();
        // |h|² + |k|² + |l|² ≤ 4 without the origin
        let expected = (-2..=2i32)
            .flat_map(|h| (-2..=2i32).flat_map(move |k| (-2..=2i32).map(move |l| [h, k, l])))
            .filter(|&[h, k, l]| {
                let s = h * h + k * k + l * l;
                s > 0 && s <= 4
            })
            .count();
        assert_eq!(hkls.nrows(), expected);
        assert!(hkls.rows().into_iter().all(|h| h.iter().any(|&v| v != 0)));
        assert_eq!(hkls.row(0).to_vec(), vec![-2, 0, 0]);
        assert!(generate_reciprocal_cell(&cubic(), 0.0).is_err());
    }

    #[test]
    fn dhkl_column() {
        let crystal = sample_crystal(&[[1, 0, 0], [0, 1, 0]], &[0.0, 0.0]);
        let out = crystal.compute_dhkl().unwrap();
        let column = out.column(DHKL_LABEL).unwrap();
        assert_eq!(column.dtype(), Dtype::MtzReal);
        let d = column.to_f64();
        // beta = 100°, so d(100) = a·sin(beta)
        assert!((d[0] - 30.0 * 100f64.to_radians().sin()).abs() < 1e-4);
        assert!((d[1] - 40.0).abs() < 1e-4);
        assert!(crystal.column(DHKL_LABEL).is_none());

        let mut bare = crystal.clone();
        bare.set_cell(None);
        assert!(bare.compute_dhkl_inplace().is_err());
    }
}
