//! Space-group symmetry: operations, groups, and reflection classification.

pub mod op;
pub mod spacegroup;

use ndarray::{Array1, ArrayView2};

use crate::config::HKL_TOLERANCE;

pub use op::{SymOp, DEN};
pub use spacegroup::SpaceGroup;

/// Errors raised by the symmetry layer.
#[derive(Debug, thiserror::Error)]
pub enum SymmetryError {
    #[error("invalid symmetry operation '{triplet}': {reason}")]
    InvalidTriplet { triplet: String, reason: String },

    #[error("applying {op} to {hkl:?} produced fractional Miller indices")]
    FractionalIndex { op: String, hkl: [i32; 3] },

    #[error("unknown space group: {0}")]
    UnknownSpaceGroup(String),
}

/// Flag reflections that some operation maps onto their Friedel mate.
pub fn is_centric(hkls: ArrayView2<i32>, sg: &SpaceGroup) -> Array1<bool> {
    let mut centric = Array1::from_elem(hkls.nrows(), false);
    for op in sg.operations() {
        for (row, flag) in hkls.rows().into_iter().zip(centric.iter_mut()) {
            if *flag {
                continue;
            }
            let h = [row[0], row[1], row[2]];
            let mapped = op.apply_to_hkl_f64(h);
            *flag = mapped
                .iter()
                .zip(h.iter())
                .all(|(m, &o)| (m + o as f64).abs() <= HKL_TOLERANCE);
        }
    }
    centric
}

/// True when the group allows an arbitrary origin along some direction.
pub fn is_polar(sg: &SpaceGroup) -> bool {
    sg.is_polar()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn centric_in_p1_and_p_minus_1() {
        let hkls = array![[1, 2, 3], [0, 0, 0], [-4, 0, 1]];
        let p1 = SpaceGroup::by_number(1).unwrap();
        assert_eq!(is_centric(hkls.view(), &p1).to_vec(), vec![false, true, false]);
        let p_1 = SpaceGroup::by_number(2).unwrap();
        assert!(is_centric(hkls.view(), &p_1).iter().all(|&c| c));
    }

    #[test]
    fn centric_zones_in_p21() {
        // In P 1 21 1 the h0l zone is centric
        let sg = SpaceGroup::by_number(4).unwrap();
        let hkls = array![[1, 0, 2], [1, 1, 2], [0, 3, 0]];
        assert_eq!(is_centric(hkls.view(), &sg).to_vec(), vec![true, false, false]);
    }

    #[test]
    fn centric_zones_in_p212121() {
        let sg = SpaceGroup::by_number(19).unwrap();
        let hkls = array![[1, 2, 0], [0, 2, 3], [1, 0, 3], [1, 2, 3]];
        assert_eq!(
            is_centric(hkls.view(), &sg).to_vec(),
            vec![true, true, true, false]
        );
    }
}
