//! Symmetry-aware operations on reflection tables.
//!
//! Each submodule adds methods to [`Crystal`](crate::types::Crystal). Every
//! operation has a pure form returning a new table and an `_inplace` form
//! that replaces the receiver only when the operation succeeds.

pub mod anomalous;
pub mod asu;
pub mod centrics;
pub mod intensity;
pub mod symop;
