//! Crystallographic reflection tables with space-group aware transformations.

pub mod adapters;
pub mod config;
pub mod ops;
pub mod symmetry;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use adapters::{mtz_file_to_crystal, write_mtz_file, MtzError, SnapshotError};
pub use config::RfreeConfig;
pub use symmetry::{SpaceGroup, SymOp, SymmetryError};
pub use types::{Column, ColumnData, Crystal, CrystalError, Dtype, UnitCell};
