//! Core data types: semantic column types, columns, unit cells, and the
//! reflection table.

pub mod cell;
pub mod column;
pub mod crystal;
pub mod dtypes;

// Re-export commonly used items
pub use cell::UnitCell;
pub use column::{Column, ColumnData};
pub use crystal::{Crystal, CrystalError};
pub use dtypes::{Dtype, Storage};
