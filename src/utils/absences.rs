//! Systematic absences.

use std::f64::consts::TAU;

use ndarray::{Array1, ArrayView2};

use crate::config::{HKL_TOLERANCE, PHASE_SHIFT_TOLERANCE};
use crate::symmetry::SpaceGroup;
use crate::types::{Crystal, CrystalError};

/// Flag reflections whose intensity is forced to zero by symmetry.
///
/// A reflection is absent when some operation maps it onto itself with a
/// phase shift that is not a whole number of turns.
pub fn is_absent(hkls: ArrayView2<i32>, sg: &SpaceGroup) -> Array1<bool> {
    let ops = sg.operations();
    hkls.rows()
        .into_iter()
        .map(|h| {
            let hkl = [h[0], h[1], h[2]];
            ops.iter().any(|op| {
                let fixed = op
                    .apply_to_hkl_f64(hkl)
                    .iter()
                    .zip(hkl.iter())
                    .all(|(m, &o)| (m - o as f64).abs() <= HKL_TOLERANCE);
                let turns = op.phase_shift(hkl) / TAU;
                fixed && (turns - turns.round()).abs() > PHASE_SHIFT_TOLERANCE
            })
        })
        .collect()
}

impl Crystal {
    /// Drop systematically absent reflections.
    pub fn remove_absences(&self) -> Result<Crystal, CrystalError> {
        let sg = self.require_space_group()?;
        let absent = is_absent(self.hkls()?.view(), sg);
        let keep: Vec<usize> = absent
            .iter()
            .enumerate()
            .filter(|(_, &a)| !a)
            .map(|(row, _)| row)
            .collect();
        tracing::debug!(removed = self.len() - keep.len(), "removed systematic absences");
        self.select_rows(&keep)
    }

    /// In-place [`Crystal::remove_absences`].
    pub fn remove_absences_inplace(&mut self) -> Result<(), CrystalError> {
        *self = self.remove_absences()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::crystal::tests::sample_crystal;
    use ndarray::array;

    #[test]
    fn screw_axis_extinctions() {
        let sg = SpaceGroup::by_number(4).unwrap();
        let hkls = array![[0, 1, 0], [0, 2, 0], [1, 1, 0], [0, -3, 0]];
        assert_eq!(
            is_absent(hkls.view(), &sg).to_vec(),
            vec![true, false, false, true]
        );
    }

    #[test]
    fn centering_extinctions() {
        // C centering removes h + k odd
        let sg = SpaceGroup::by_number(5).unwrap();
        let hkls = array![[1, 0, 0], [1, 1, 0], [2, 1, 3], [2, 2, 5]];
        assert_eq!(
            is_absent(hkls.view(), &sg).to_vec(),
            vec![true, false, true, false]
        );
    }

    #[test]
    fn nothing_absent_in_p1() {
        let sg = SpaceGroup::by_number(1).unwrap();
        assert!(!is_absent(array![[0, 1, 0], [1, 2, 3]].view(), &sg).iter().any(|&a| a));
    }

    #[test]
    fn removes_rows() {
        let mut crystal = sample_crystal(&[[0, 1, 0], [0, 2, 0], [1, 1, 1]], &[1.0, 2.0, 3.0]);
        crystal.remove_absences_inplace().unwrap();
        assert_eq!(crystal.len(), 2);
        assert_eq!(
            crystal.column("PHI").unwrap().as_f32().unwrap().to_vec(),
            vec![2.0, 3.0]
        );
    }
}
