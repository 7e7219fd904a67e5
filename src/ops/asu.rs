//! Mapping reflections into a canonical asymmetric unit.
//!
//! Every row is replaced by the symmetry image (or Friedel image) whose
//! `(sign H, sign K, sign L)` tuple is greatest. This is a sign-based
//! heuristic, not a full per-space-group ASU definition: reflections lying on
//! mirror planes or rotation axes may tie, in which case the last image
//! enumerated wins (all operations first, then all Friedel copies, both in
//! [`SpaceGroup::operations`](crate::symmetry::SpaceGroup::operations) order).

use ndarray::{Array1, Array2};

use crate::types::{Crystal, CrystalError};

#[derive(Debug, Clone, Copy)]
struct Image {
    hkl: [i32; 3],
    shift: f64,
    friedel: bool,
}

fn sign_key(hkl: [i32; 3]) -> [i32; 3] {
    [hkl[0].signum(), hkl[1].signum(), hkl[2].signum()]
}

impl Crystal {
    /// Map every reflection to its representative image, adjusting phases.
    ///
    /// The new phase is `phase + shift` for a symmetry image and
    /// `-(phase + shift)` for a Friedel image, canonicalized.
    pub fn map_to_asu(&self) -> Result<Crystal, CrystalError> {
        let sg = self.require_space_group()?;
        let hkls = self.hkls()?;
        let ops = sg.operations();

        let mut mapped = Vec::with_capacity(ops.len());
        for op in &ops {
            let images = op.apply_to_hkls(hkls.view())?;
            let shifts = op.phase_shifts_deg(hkls.view());
            mapped.push((images, shifts));
        }

        let n = self.len();
        let mut best_hkls = Array2::<i32>::zeros((n, 3));
        let mut best_shifts = Array1::<f64>::zeros(n);
        let mut friedel = vec![false; n];
        let mut moved = 0usize;

        for row in 0..n {
            let mut best: Option<Image> = None;
            for is_friedel in [false, true] {
                for (images, shifts) in &mapped {
                    let h = images.row(row);
                    let hkl = if is_friedel {
                        [-h[0], -h[1], -h[2]]
                    } else {
                        [h[0], h[1], h[2]]
                    };
                    let candidate = Image {
                        hkl,
                        shift: shifts[row],
                        friedel: is_friedel,
                    };
                    // `>=` so ties go to the later image
                    if best.map_or(true, |b| sign_key(hkl) >= sign_key(b.hkl)) {
                        best = Some(candidate);
                    }
                }
            }
            if let Some(image) = best {
                if image.hkl != [hkls[[row, 0]], hkls[[row, 1]], hkls[[row, 2]]] {
                    moved += 1;
                }
                best_hkls.row_mut(row).assign(&Array1::from(image.hkl.to_vec()));
                best_shifts[row] = image.shift;
                friedel[row] = image.friedel;
            }
        }

        let mut out = self.clone();
        out.set_hkls(&best_hkls)?;
        out.map_phases(|row, phase| {
            let shifted = phase + best_shifts[row];
            if friedel[row] {
                -shifted
            } else {
                shifted
            }
        });
        tracing::debug!(rows = n, moved, ops = ops.len(), "mapped reflections to ASU");
        Ok(out)
    }

    /// In-place [`Crystal::map_to_asu`]. The table is left untouched on error.
    pub fn map_to_asu_inplace(&mut self) -> Result<(), CrystalError> {
        *self = self.map_to_asu()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::symmetry::SpaceGroup;
    use crate::types::crystal::tests::sample_crystal;

    fn phase(crystal: &crate::types::Crystal, row: usize) -> f32 {
        crystal.column("PHI").unwrap().as_f32().unwrap()[row]
    }

    #[test]
    fn screw_image_carries_phase_shift() {
        // (-1,1,-3) -> (1,1,3) under -x,y+1/2,-z, shift -180° for k = 1
        let crystal = sample_crystal(&[[-1, 1, -3], [-1, 2, -3]], &[40.0, 40.0]);
        let out = crystal.map_to_asu().unwrap();
        let hkls = out.hkls().unwrap();
        assert_eq!(hkls.row(0).to_vec(), vec![1, 1, 3]);
        assert_eq!(hkls.row(1).to_vec(), vec![1, 2, 3]);
        assert_eq!(phase(&out, 0), -140.0);
        assert_eq!(phase(&out, 1), 40.0);
    }

    #[test]
    fn friedel_image_negates_phase() {
        // In P1 only the Friedel mate can make every sign positive
        let mut crystal = sample_crystal(&[[-1, -2, -3], [1, 2, 3]], &[30.0, 30.0]);
        crystal.set_space_group(Some(Arc::new(SpaceGroup::by_number(1).unwrap())));
        let out = crystal.map_to_asu().unwrap();
        let hkls = out.hkls().unwrap();
        assert_eq!(hkls.row(0).to_vec(), vec![1, 2, 3]);
        assert_eq!(hkls.row(1).to_vec(), vec![1, 2, 3]);
        assert_eq!(phase(&out, 0), -30.0);
        assert_eq!(phase(&out, 1), 30.0);
    }

    #[test]
    fn ties_go_to_last_enumerated_image() {
        // (1,0,2) in P 1 21 1 is reached both by the identity and by the
        // Friedel copy of the screw image; the Friedel copy comes last.
        let crystal = sample_crystal(&[[1, 0, 2]], &[30.0]);
        let out = crystal.map_to_asu().unwrap();
        assert_eq!(out.hkls().unwrap().row(0).to_vec(), vec![1, 0, 2]);
        assert_eq!(phase(&out, 0), -30.0);
    }

    #[test]
    fn keeps_layout_and_metadata() {
        let crystal = sample_crystal(&[[-1, 1, -3]], &[0.0]);
        let mut copy = crystal.clone();
        copy.map_to_asu_inplace().unwrap();
        assert_eq!(copy.index_names(), crystal.index_names());
        assert_eq!(copy.column_names(), crystal.column_names());
        assert!(Arc::ptr_eq(copy.space_group().unwrap(), crystal.space_group().unwrap()));
    }

    #[test]
    fn requires_space_group() {
        let mut crystal = sample_crystal(&[[1, 2, 3]], &[0.0]);
        crystal.set_space_group(None);
        assert!(crystal.map_to_asu().is_err());
    }
}
