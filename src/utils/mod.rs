//! Derived quantities and helpers built on reflection tables.

pub mod absences;
pub mod binning;
pub mod completeness;
pub mod grid;
pub mod multiplicity;
pub mod phase;
pub mod resolution;
pub mod rfree;

// Re-export commonly used items
pub use absences::is_absent;
pub use binning::{assign_with_binedges, bin_by_percentile, percentile_edges};
pub use completeness::{compute_completeness, Completeness};
pub use grid::get_gridsize;
pub use multiplicity::compute_structurefactor_multiplicity;
pub use phase::{canonicalize_phase, canonicalize_phases, phase_distance};
pub use resolution::{compute_dhkl, generate_reciprocal_cell};
pub use rfree::{add_rfree, copy_rfree};
