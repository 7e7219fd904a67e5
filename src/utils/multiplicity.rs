//! Reflection multiplicity (epsilon) factors.

use ndarray::{Array1, ArrayView2};

use crate::config::{EPSILON_LABEL, HKL_TOLERANCE};
use crate::symmetry::SpaceGroup;
use crate::types::{Column, Crystal, CrystalError, Dtype};

/// Number of symmetry operations that leave each reflection unchanged.
///
/// With `include_centering` the count is multiplied by the number of
/// centering vectors, giving the full epsilon factor.
pub fn compute_structurefactor_multiplicity(
    hkls: ArrayView2<i32>,
    sg: &SpaceGroup,
    include_centering: bool,
) -> Array1<i32> {
    let factor = if include_centering {
        sg.cen_ops().len() as i32
    } else {
        1
    };
    hkls.rows()
        .into_iter()
        .map(|h| {
            let hkl = [h[0], h[1], h[2]];
            let fixed = sg
                .sym_ops()
                .iter()
                .filter(|op| {
                    op.apply_to_hkl_f64(hkl)
                        .iter()
                        .zip(hkl.iter())
                        .all(|(m, &o)| (m - o as f64).abs() <= HKL_TOLERANCE)
                })
                .count() as i32;
            fixed * factor
        })
        .collect()
}

impl Crystal {
    /// Add (or overwrite) the `EPSILON` column.
    pub fn compute_multiplicity(&self, include_centering: bool) -> Result<Crystal, CrystalError> {
        let sg = self.require_space_group()?;
        let epsilon = compute_structurefactor_multiplicity(self.hkls()?.view(), sg, include_centering);
        let mut out = self.clone();
        out.insert_column(Column::int32(EPSILON_LABEL, Dtype::MtzInt, epsilon.to_vec())?)?;
        Ok(out)
    }
}
