//! Property tests for phase canonicalization and symmetry operations.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use reciprocal_space::adapters::{crystal_to_mtz, mtz_to_crystal};
use reciprocal_space::config::HKL_KEYS;
use reciprocal_space::utils::{canonicalize_phase, phase_distance};
use reciprocal_space::{Column, Crystal, Dtype, SpaceGroup, SymOp, UnitCell};

// ============================================================================
// STRATEGIES
// ============================================================================

fn arb_reflections() -> impl Strategy<Value = (Vec<[i32; 3]>, Vec<f32>)> {
    prop::collection::hash_set((-8i32..=8, -8i32..=8, -8i32..=8), 1..40).prop_flat_map(|set| {
        let hkls: Vec<[i32; 3]> = set.into_iter().map(|(h, k, l)| [h, k, l]).collect();
        let n = hkls.len();
        (Just(hkls), prop::collection::vec(-179.0f32..=180.0, n))
    })
}

fn build(hkls: &[[i32; 3]], phases: &[f32], sg_number: u16) -> Crystal {
    let axis = |i: usize| hkls.iter().map(|h| h[i]).collect::<Vec<_>>();
    let mut crystal = Crystal::from_columns(vec![
        Column::int32("H", Dtype::Hkl, axis(0)).unwrap(),
        Column::int32("K", Dtype::Hkl, axis(1)).unwrap(),
        Column::int32("L", Dtype::Hkl, axis(2)).unwrap(),
        Column::float32("F", Dtype::SFAmplitude, vec![1.0; hkls.len()]).unwrap(),
        Column::float32("PHI", Dtype::Phase, phases.to_vec()).unwrap(),
    ])
    .unwrap()
    .with_space_group(Arc::new(SpaceGroup::by_number(sg_number).unwrap()))
    .with_cell(UnitCell::new(40.0, 50.0, 60.0, 90.0, 95.0, 90.0).unwrap());
    crystal.set_index(&HKL_KEYS).unwrap();
    crystal
}

fn phases(crystal: &Crystal) -> Vec<f32> {
    crystal.column("PHI").unwrap().as_f32().unwrap().to_vec()
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn canonical_phase_is_in_range(v in -1.0e5f64..1.0e5) {
        let c = canonicalize_phase(v, true);
        prop_assert!(c > -180.0 && c <= 180.0);
    }

    #[test]
    fn canonicalization_is_periodic(v in -1.0e4f64..1.0e4, k in -20i32..20) {
        let a = canonicalize_phase(v, true);
        let b = canonicalize_phase(v + 360.0 * k as f64, true);
        prop_assert!(phase_distance(a, b) < 1e-6);
    }

    #[test]
    fn canonicalization_is_idempotent(v in -1.0e4f64..1.0e4) {
        let once = canonicalize_phase(v, true);
        prop_assert_eq!(canonicalize_phase(once, true), once);
    }

    #[test]
    fn identity_operation_preserves_table((hkls, phi) in arb_reflections()) {
        let crystal = build(&hkls, &phi, 4);
        let out = crystal.apply_symop(&SymOp::identity()).unwrap();
        prop_assert_eq!(out.hkls().unwrap(), crystal.hkls().unwrap());
        prop_assert_eq!(phases(&out), phases(&crystal));
    }

    #[test]
    fn twofold_screw_applied_twice_is_identity((hkls, phi) in arb_reflections()) {
        let crystal = build(&hkls, &phi, 4);
        let op = SymOp::parse("-x,y+1/2,-z").unwrap();
        let twice = crystal.apply_symop(&op).unwrap().apply_symop(&op).unwrap();
        prop_assert_eq!(twice.hkls().unwrap(), crystal.hkls().unwrap());
        for (a, b) in phases(&twice).iter().zip(phases(&crystal)) {
            prop_assert!(phase_distance(*a as f64, b as f64) < 1e-3);
        }
    }

    #[test]
    fn set_and_reset_index_restore_types((hkls, phi) in arb_reflections()) {
        let mut crystal = build(&hkls, &phi, 1);
        crystal.reset_index(false).unwrap();
        let before = crystal.clone();
        crystal.set_index(&["H", "K", "L"]).unwrap();
        crystal.reset_index(false).unwrap();
        prop_assert_eq!(crystal, before);
    }

    #[test]
    fn unmerged_keys_are_plus_union_minus((hkls, phi) in arb_reflections()) {
        let crystal = build(&hkls, &phi, 1);
        let out = crystal.unmerge_anomalous().unwrap();

        let plus: HashSet<[i32; 3]> = hkls.iter().copied().collect();
        let minus: HashSet<[i32; 3]> = hkls.iter().map(|h| [-h[0], -h[1], -h[2]]).collect();
        let expected: HashSet<[i32; 3]> = plus.union(&minus).copied().collect();

        prop_assert_eq!(out.hkl_set().unwrap(), expected.clone());
        prop_assert_eq!(out.len(), expected.len());
        prop_assert!(out.has_unique_index());
        // Plus rows come first and keep their phases
        let out_phases = phases(&out);
        prop_assert_eq!(&out_phases[..hkls.len()], &phi[..]);
    }

    #[test]
    fn centric_phases_survive_unmerging((hkls, phi) in arb_reflections()) {
        // Every reflection is centric in P -1, so minus copies keep the phase
        let crystal = build(&hkls, &phi, 2);
        let out = crystal.unmerge_anomalous().unwrap();
        let out_hkls = out.hkls().unwrap();
        let out_phases = phases(&out);
        for row in hkls.len()..out.len() {
            let h = out_hkls.row(row);
            let mate = [-h[0], -h[1], -h[2]];
            let source = hkls.iter().position(|x| *x == mate).unwrap();
            prop_assert_eq!(out_phases[row], phi[source]);
        }
    }

    #[test]
    fn every_reflection_is_centric_in_p_minus_1((hkls, phi) in arb_reflections()) {
        let crystal = build(&hkls, &phi, 2);
        prop_assert!(crystal.centric_flags().unwrap().iter().all(|&c| c));
    }

    #[test]
    fn general_reflections_are_acentric_in_p1((hkls, phi) in arb_reflections()) {
        let crystal = build(&hkls, &phi, 1);
        let flags = crystal.centric_flags().unwrap();
        for (h, centric) in hkls.iter().zip(flags.iter()) {
            prop_assert_eq!(*centric, *h == [0, 0, 0]);
        }
    }

    #[test]
    fn mtz_round_trip((hkls, phi) in arb_reflections()) {
        let crystal = build(&hkls, &phi, 4);
        let back = mtz_to_crystal(&crystal_to_mtz(&crystal).unwrap()).unwrap();
        prop_assert_eq!(back.columns(), crystal.columns());
        prop_assert_eq!(back.hkls().unwrap(), crystal.hkls().unwrap());
    }
}
