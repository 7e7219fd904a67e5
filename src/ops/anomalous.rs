//! Friedel-pair unmerging.

use std::collections::HashSet;

use crate::types::{Crystal, CrystalError};

impl Crystal {
    /// Expand a merged table into explicit Friedel-plus and Friedel-minus rows.
    ///
    /// The result starts with every input row (the plus set, in order),
    /// followed by the minus copies `-H` whose index is not already a plus
    /// key. Minus copies have every phase negated, except on centric
    /// reflections. The returned table carries a `CENTRIC` column.
    pub fn unmerge_anomalous(&self) -> Result<Crystal, CrystalError> {
        let mut plus = self.clone();
        plus.label_centrics()?;
        plus.canonicalize_phases();
        let centric = plus.centric_flags()?;

        let hkls = plus.hkls()?;
        let plus_keys: HashSet<[i32; 3]> =
            hkls.rows().into_iter().map(|h| [h[0], h[1], h[2]]).collect();

        let mut minus = plus.clone();
        minus.set_hkls(&hkls.mapv(|v| -v))?;
        minus.map_phases(|row, phase| if centric[row] { phase } else { -phase });

        let keep: Vec<usize> = hkls
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(_, h)| !plus_keys.contains(&[-h[0], -h[1], -h[2]]))
            .map(|(row, _)| row)
            .collect();
        let dropped = minus.len() - keep.len();
        let minus = minus.select_rows(&keep)?;

        let out = plus.concat(&minus)?;
        tracing::debug!(
            plus = plus.len(),
            minus = minus.len(),
            dropped,
            "unmerged Friedel pairs"
        );
        Ok(out)
    }

    /// In-place [`Crystal::unmerge_anomalous`]. The table is left untouched on error.
    pub fn unmerge_anomalous_inplace(&mut self) -> Result<(), CrystalError> {
        *self = self.unmerge_anomalous()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use crate::config::CENTRIC_LABEL;
    use crate::symmetry::SpaceGroup;
    use crate::types::crystal::tests::sample_crystal;
    use crate::types::Crystal;

    fn p1(hkls: &[[i32; 3]], phases: &[f32]) -> Crystal {
        let mut crystal = sample_crystal(hkls, phases);
        crystal.set_space_group(Some(Arc::new(SpaceGroup::by_number(1).unwrap())));
        crystal
    }

    #[test]
    fn single_acentric_reflection() {
        let out = p1(&[[1, 2, 3]], &[30.0]).unmerge_anomalous().unwrap();
        assert_eq!(out.len(), 2);
        let hkls = out.hkls().unwrap();
        assert_eq!(hkls.row(0).to_vec(), vec![1, 2, 3]);
        assert_eq!(hkls.row(1).to_vec(), vec![-1, -2, -3]);
        let phi = out.column("PHI").unwrap().as_f32().unwrap();
        assert_eq!(phi.to_vec(), vec![30.0, -30.0]);
        assert_eq!(out.index_names(), vec!["H", "K", "L"]);
        assert!(out.column(CENTRIC_LABEL).is_some());
    }

    #[test]
    fn plus_wins_on_collision() {
        let crystal = p1(&[[1, 2, 3], [-1, -2, -3], [2, 0, 0]], &[30.0, 50.0, 10.0]);
        let out = crystal.unmerge_anomalous().unwrap();
        let expected: HashSet<[i32; 3]> = [[1, 2, 3], [-1, -2, -3], [2, 0, 0], [-2, 0, 0]]
            .into_iter()
            .collect();
        assert_eq!(out.hkl_set().unwrap(), expected);
        assert_eq!(out.len(), 4);
        assert!(out.has_unique_index());
        let phi = out.column("PHI").unwrap().as_f32().unwrap();
        // Plus rows keep their own phases
        assert_eq!(phi.to_vec(), vec![30.0, 50.0, 10.0, -10.0]);
    }

    #[test]
    fn centric_phases_are_not_negated() {
        // h0l is centric in P 1 21 1
        let crystal = sample_crystal(&[[1, 0, 2], [1, 1, 2]], &[180.0, 40.0]);
        let out = crystal.unmerge_anomalous().unwrap();
        assert_eq!(out.len(), 4);
        let phi = out.column("PHI").unwrap().as_f32().unwrap();
        assert_eq!(phi.to_vec(), vec![180.0, 40.0, 180.0, -40.0]);
        let centric = out.column(CENTRIC_LABEL).unwrap().as_bool().unwrap();
        assert_eq!(centric.to_vec(), vec![true, false, true, false]);
    }

    #[test]
    fn inplace_variant() {
        let mut crystal = p1(&[[1, 2, 3]], &[30.0]);
        crystal.unmerge_anomalous_inplace().unwrap();
        assert_eq!(crystal.len(), 2);
    }

    #[test]
    fn requires_space_group() {
        let mut crystal = p1(&[[1, 2, 3]], &[30.0]);
        crystal.set_space_group(None);
        assert!(crystal.unmerge_anomalous_inplace().is_err());
        assert_eq!(crystal.len(), 1);
    }
}
