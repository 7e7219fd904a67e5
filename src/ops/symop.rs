//! Applying a single symmetry operation to a reflection table.

use crate::symmetry::SymOp;
use crate::types::{Crystal, CrystalError};

impl Crystal {
    /// Apply `op` to every reflection.
    ///
    /// Each Miller index `h` becomes `h·R`, and every phase column is shifted
    /// by the phase `op` imparts on `h` (evaluated at the original index,
    /// row by row) and re-canonicalized. Space group and cell are unchanged.
    pub fn apply_symop(&self, op: &SymOp) -> Result<Crystal, CrystalError> {
        let hkls = self.hkls()?;
        let new_hkls = op.apply_to_hkls(hkls.view())?;
        let shifts = op.phase_shifts_deg(hkls.view());

        let mut out = self.clone();
        out.set_hkls(&new_hkls)?;
        out.map_phases(|row, phase| phase + shifts[row]);
        tracing::debug!(op = %op, rows = out.len(), "applied symmetry operation");
        Ok(out)
    }

    /// Parse a coordinate triplet and apply it.
    ///
    /// A triplet that is not a valid symmetry operation is an
    /// [`CrystalError::InvalidArgument`].
    pub fn apply_symop_triplet(&self, triplet: &str) -> Result<Crystal, CrystalError> {
        let op = SymOp::parse(triplet)?;
        self.apply_symop(&op)
    }

    /// In-place [`Crystal::apply_symop`]. The table is left untouched on error.
    pub fn apply_symop_inplace(&mut self, op: &SymOp) -> Result<(), CrystalError> {
        *self = self.apply_symop(op)?;
        Ok(())
    }
}
