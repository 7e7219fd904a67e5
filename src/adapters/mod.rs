//! File format adapters for reflection tables.

pub mod mtz;
pub mod snapshot;

// Re-export commonly used items
pub use mtz::{crystal_to_mtz, mtz_file_to_crystal, mtz_to_crystal, write_mtz_file, MtzError};
pub use snapshot::{
    crystal_to_snapshot, snapshot_file_to_crystal, snapshot_to_crystal, write_snapshot_file,
    SnapshotError,
};
