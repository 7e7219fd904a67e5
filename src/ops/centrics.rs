//! Centric reflection labelling.

use ndarray::Array1;

use crate::config::CENTRIC_LABEL;
use crate::symmetry::is_centric;
use crate::types::{Column, Crystal, CrystalError};

impl Crystal {
    /// Per-row centric flags under the table's space group.
    pub fn centric_flags(&self) -> Result<Array1<bool>, CrystalError> {
        let sg = self.require_space_group()?;
        let hkls = self.hkls()?;
        Ok(is_centric(hkls.view(), sg))
    }

    /// Write (or overwrite) the boolean `CENTRIC` column.
    pub fn label_centrics(&mut self) -> Result<(), CrystalError> {
        let flags = self.centric_flags()?;
        let count = flags.iter().filter(|&&c| c).count();
        self.insert_column(Column::boolean(CENTRIC_LABEL, flags.to_vec()))?;
        tracing::debug!(centric = count, rows = self.len(), "labelled centric reflections");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::CENTRIC_LABEL;
    use crate::symmetry::SpaceGroup;
    use crate::types::crystal::tests::sample_crystal;
    use crate::types::{CrystalError, Dtype};

    #[test]
    fn origin_is_centric_in_centrosymmetric_group() {
        let mut crystal = sample_crystal(&[[0, 0, 0], [1, 2, 3]], &[0.0, 0.0]);
        crystal.set_space_group(Some(Arc::new(SpaceGroup::by_number(2).unwrap())));
        crystal.label_centrics().unwrap();
        let column = crystal.column(CENTRIC_LABEL).unwrap();
        assert_eq!(column.dtype(), Dtype::Bool);
        assert_eq!(column.as_bool().unwrap().to_vec(), vec![true, true]);
    }

    #[test]
    fn general_reflection_is_acentric_in_p1() {
        let mut crystal = sample_crystal(&[[1, 2, 3]], &[0.0]);
        crystal.set_space_group(Some(Arc::new(SpaceGroup::by_number(1).unwrap())));
        assert_eq!(crystal.centric_flags().unwrap().to_vec(), vec![false]);
    }

    #[test]
    fn relabelling_overwrites_and_keeps_keys() {
        let mut crystal = sample_crystal(&[[1, 0, 2], [1, 1, 2]], &[0.0, 0.0]);
        crystal.label_centrics().unwrap();
        crystal.label_centrics().unwrap();
        assert_eq!(crystal.column_names(), vec!["F", "PHI", CENTRIC_LABEL]);
        assert_eq!(crystal.index_names(), vec!["H", "K", "L"]);
        assert_eq!(
            crystal.column(CENTRIC_LABEL).unwrap().as_bool().unwrap().to_vec(),
            vec![true, false]
        );
    }

    #[test]
    fn requires_space_group() {
        let mut crystal = sample_crystal(&[[1, 2, 3]], &[0.0]);
        crystal.set_space_group(None);
        assert!(matches!(
            crystal.label_centrics(),
            Err(CrystalError::InvalidArgument(_))
        ));
        assert!(crystal.column(CENTRIC_LABEL).is_none());
    }
}
