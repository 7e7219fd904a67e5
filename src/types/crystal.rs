//! The reflection table.
//!
//! A [`Crystal`] is an ordered set of reflections. Each row carries named,
//! typed data columns; some columns may be promoted into the key index
//! (normally `H`, `K`, `L`). The table also holds the crystal metadata
//! shared by every row: the space group and unit cell.
//!
//! Key-index levels are stored in a generic representation (`int64`,
//! `float64` or `bool`). The semantic type a column had before promotion is
//! remembered in the index dtype cache so that [`Crystal::reset_index`]
//! restores it exactly.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use ndarray::{Array1, Array2};

use super::cell::UnitCell;
use super::column::Column;
use super::dtypes::Dtype;
use crate::config::HKL_KEYS;
use crate::symmetry::{SpaceGroup, SymmetryError};
use crate::utils::phase::canonicalize_phase;

/// Errors raised by reflection-table operations.
#[derive(Debug, thiserror::Error)]
pub enum CrystalError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("key mismatch: {0}")]
    KeyMismatch(String),

    #[error("cannot cast column '{column}' to {dtype}: {reason}")]
    TypeCoercion {
        column: String,
        dtype: Dtype,
        reason: String,
    },
}

impl From<SymmetryError> for CrystalError {
    fn from(e: SymmetryError) -> Self {
        CrystalError::InvalidArgument(e.to_string())
    }
}

/// Reflection table with crystal metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Crystal {
    columns: Vec<Column>,
    /// Key-index levels in generic storage; empty means a plain row index.
    index: Vec<Column>,
    nrows: usize,
    space_group: Option<Arc<SpaceGroup>>,
    cell: Option<UnitCell>,
    index_dtype_cache: BTreeMap<String, Dtype>,
}

impl Crystal {
    /// An empty table without metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from equally long, uniquely named columns.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, CrystalError> {
        let mut crystal = Self::new();
        for column in columns {
            if crystal.column(column.name()).is_some() {
                return Err(CrystalError::InvalidArgument(format!(
                    "duplicate column '{}'",
                    column.name()
                )));
            }
            crystal.insert_column(column)?;
        }
        Ok(crystal)
    }

    pub fn with_space_group(mut self, space_group: Arc<SpaceGroup>) -> Self {
        self.space_group = Some(space_group);
        self
    }

    pub fn with_cell(mut self, cell: UnitCell) -> Self {
        self.cell = Some(cell);
        self
    }

    pub fn set_space_group(&mut self, space_group: Option<Arc<SpaceGroup>>) {
        self.space_group = space_group;
    }

    pub fn set_cell(&mut self, cell: Option<UnitCell>) {
        self.cell = cell;
    }

    pub fn space_group(&self) -> Option<&Arc<SpaceGroup>> {
        self.space_group.as_ref()
    }

    pub fn cell(&self) -> Option<&UnitCell> {
        self.cell.as_ref()
    }

    pub(crate) fn require_space_group(&self) -> Result<&SpaceGroup, CrystalError> {
        self.space_group
            .as_deref()
            .ok_or_else(|| CrystalError::InvalidArgument("table has no space group".to_string()))
    }

    pub(crate) fn require_cell(&self) -> Result<&UnitCell, CrystalError> {
        self.cell
            .as_ref()
            .ok_or_else(|| CrystalError::InvalidArgument("table has no unit cell".to_string()))
    }

    /// Number of reflections.
    pub fn len(&self) -> usize {
        self.nrows
    }

    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    /// Names of the ordinary data columns, in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Names of the key-index levels, in order. Empty for a plain row index.
    pub fn index_names(&self) -> Vec<&str> {
        self.index.iter().map(Column::name).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name() == name)
    }

    /// Key-index level by name, in its generic representation.
    pub fn index_level(&self, name: &str) -> Option<&Column> {
        self.index.iter().find(|c| c.name() == name)
    }

    /// Semantic types remembered for the current key-index levels.
    pub fn index_dtype_cache(&self) -> &BTreeMap<String, Dtype> {
        &self.index_dtype_cache
    }

    /// Add a column, or replace the column of the same name in place.
    pub fn insert_column(&mut self, column: Column) -> Result<(), CrystalError> {
        if self.index_level(column.name()).is_some() {
            return Err(CrystalError::InvalidArgument(format!(
                "'{}' is a key-index level",
                column.name()
            )));
        }
        if self.columns.is_empty() && self.index.is_empty() {
            self.nrows = column.len();
        } else if column.len() != self.nrows {
            return Err(CrystalError::InvalidArgument(format!(
                "column '{}' has {} rows, table has {}",
                column.name(),
                column.len(),
                self.nrows
            )));
        }
        match self.columns.iter_mut().find(|c| c.name() == column.name()) {
            Some(slot) => *slot = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Result<Column, CrystalError> {
        let pos = self
            .columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| CrystalError::KeyMismatch(format!("no column '{name}'")))?;
        Ok(self.columns.remove(pos))
    }

    /// Labels of every phase column, found by semantic type.
    pub fn phase_keys(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.dtype().is_phase())
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Promote columns to the key index.
    ///
    /// The current type of each key is recorded in the index dtype cache
    /// (overwriting any earlier entry). An existing key index is demoted
    /// first.
    pub fn set_index(&mut self, keys: &[&str]) -> Result<(), CrystalError> {
        if keys.is_empty() {
            return Err(CrystalError::InvalidArgument("no index keys given".to_string()));
        }
        let unique: HashSet<&str> = keys.iter().copied().collect();
        if unique.len() != keys.len() {
            return Err(CrystalError::InvalidArgument(format!(
                "duplicate index keys: {keys:?}"
            )));
        }
        if let Some(missing) = keys
            .iter()
            .find(|k| self.column(k).is_none() && self.index_level(k).is_none())
        {
            return Err(CrystalError::KeyMismatch(format!("no column '{missing}'")));
        }
        if let Some(column) = keys
            .iter()
            .filter_map(|k| self.column(k))
            .find(|c| c.has_missing())
        {
            return Err(CrystalError::TypeCoercion {
                column: column.name().to_string(),
                dtype: column.dtype(),
                reason: "missing values cannot be index keys".to_string(),
            });
        }
        if !self.index.is_empty() {
            self.reset_index(false)?;
        }

        for key in keys {
            let column = self.remove_column(key)?;
            self.index_dtype_cache
                .insert(key.to_string(), column.dtype());
            let (name, dtype, data) = column.into_parts();
            self.index
                .push(Column::new(name, dtype.generic(), data.into_generic())?);
        }
        tracing::trace!(keys = ?keys, rows = self.nrows, "set_index");
        Ok(())
    }

    /// Demote the key index back to ordinary columns.
    ///
    /// With `drop == false` the levels become the leading columns and every
    /// cached column is cast back to its cached type, after which the cache
    /// is cleared. With `drop == true` the key values are discarded and the
    /// cache is left as is.
    pub fn reset_index(&mut self, drop: bool) -> Result<(), CrystalError> {
        if self.index.is_empty() {
            return Ok(());
        }
        if drop {
            tracing::trace!(levels = self.index.len(), "reset_index dropped key levels");
            self.index.clear();
            return Ok(());
        }

        // Cast into a fresh list so a failed cast leaves the table untouched
        let mut restored = Vec::with_capacity(self.index.len() + self.columns.len());
        for column in self.index.iter().chain(self.columns.iter()) {
            match self.index_dtype_cache.get(column.name()) {
                Some(&dtype) => restored.push(column.astype(dtype)?),
                None => restored.push(column.clone()),
            }
        }
        self.index.clear();
        self.columns = restored;
        self.index_dtype_cache.clear();
        tracing::trace!(rows = self.nrows, "reset_index restored key columns");
        Ok(())
    }

    fn hkl_source(&self, key: &str) -> Option<&Column> {
        self.index_level(key).or_else(|| self.column(key))
    }

    /// Miller indices as an n×3 array, read from the key index or, when the
    /// table is not indexed by them, from the `H`, `K`, `L` columns.
    pub fn hkls(&self) -> Result<Array2<i32>, CrystalError> {
        let mut out = Array2::zeros((self.nrows, 3));
        for (axis, key) in HKL_KEYS.iter().enumerate() {
            let column = self
                .hkl_source(key)
                .ok_or_else(|| CrystalError::KeyMismatch(format!("no Miller index '{key}'")))?
                .astype(Dtype::Hkl)?;
            if column.has_missing() {
                return Err(CrystalError::TypeCoercion {
                    column: key.to_string(),
                    dtype: Dtype::Hkl,
                    reason: "missing Miller index".to_string(),
                });
            }
            if let Some(values) = column.as_i32() {
                out.column_mut(axis).assign(values);
            }
        }
        Ok(out)
    }

    /// Replace the Miller indices of every row, preserving the key layout and
    /// the semantic type of the `H`, `K`, `L` columns.
    pub(crate) fn set_hkls(&mut self, hkls: &Array2<i32>) -> Result<(), CrystalError> {
        if hkls.nrows() != self.nrows || hkls.ncols() != 3 {
            return Err(CrystalError::InvalidArgument(format!(
                "expected {}x3 Miller indices, got {:?}",
                self.nrows,
                hkls.shape()
            )));
        }
        let names: Vec<String> = self.index_names().iter().map(|s| s.to_string()).collect();
        self.reset_index(false)?;
        for (axis, key) in HKL_KEYS.iter().enumerate() {
            let dtype = match self.column(key) {
                Some(c) if c.dtype().is_integer() => c.dtype(),
                Some(_) | None => Dtype::Hkl,
            };
            let values = hkls.column(axis).mapv(|v| v as f64);
            let column = Column::from_f64(*key, dtype, values)?;
            self.insert_column(column)?;
        }
        if !names.is_empty() {
            let keys: Vec<&str> = names.iter().map(String::as_str).collect();
            self.set_index(&keys)?;
        }
        Ok(())
    }

    /// Apply `f(row, value)` to every phase column and canonicalize.
    pub(crate) fn map_phases<F>(&mut self, f: F)
    where
        F: Fn(usize, f64) -> f64,
    {
        for column in self.columns.iter_mut().filter(|c| c.dtype().is_phase()) {
            if let Some(values) = column.as_f32_mut() {
                for (row, v) in values.iter_mut().enumerate() {
                    *v = canonicalize_phase(f(row, *v as f64), true) as f32;
                }
            }
        }
    }

    /// Wrap every phase column into (-180°, 180°].
    pub fn canonicalize_phases(&mut self) {
        self.map_phases(|_, v| v);
    }

    /// Rows at the given positions, in order, with metadata carried over.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Crystal, CrystalError> {
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.nrows) {
            return Err(CrystalError::InvalidArgument(format!(
                "row {bad} out of range for {} rows",
                self.nrows
            )));
        }
        Ok(Crystal {
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
            index: self.index.iter().map(|c| c.select(rows)).collect(),
            nrows: rows.len(),
            space_group: self.space_group.clone(),
            cell: self.cell,
            index_dtype_cache: self.index_dtype_cache.clone(),
        })
    }

    /// Append the rows of `other` below this table's rows.
    ///
    /// Both tables must have the same columns and key levels, with the same
    /// types, in the same order. Metadata is taken from `self`.
    pub fn concat(&self, other: &Crystal) -> Result<Crystal, CrystalError> {
        let same_layout = |a: &[Column], b: &[Column]| {
            a.len() == b.len()
                && a
                    .iter()
                    .zip(b)
                    .all(|(x, y)| x.name() == y.name() && x.dtype() == y.dtype())
        };
        if !same_layout(&self.columns, &other.columns) || !same_layout(&self.index, &other.index) {
            return Err(CrystalError::InvalidArgument(
                "cannot concatenate tables with different layouts".to_string(),
            ));
        }
        let join = |a: &[Column], b: &[Column]| -> Result<Vec<Column>, CrystalError> {
            a.iter()
                .zip(b)
                .map(|(x, y)| {
                    x.concat(y).ok_or_else(|| {
                        CrystalError::InvalidArgument(format!("storage mismatch in '{}'", x.name()))
                    })
                })
                .collect()
        };
        Ok(Crystal {
            columns: join(&self.columns, &other.columns)?,
            index: join(&self.index, &other.index)?,
            nrows: self.nrows + other.nrows,
            space_group: self.space_group.clone(),
            cell: self.cell,
            index_dtype_cache: self.index_dtype_cache.clone(),
        })
    }

    /// True when no two rows share the same key.
    pub fn has_unique_index(&self) -> bool {
        if self.index.is_empty() {
            return true;
        }
        let mut seen = HashSet::with_capacity(self.nrows);
        (0..self.nrows).all(|row| {
            let key: Vec<u64> = self
                .index
                .iter()
                .map(|level| level.data().get_f64(row).to_bits())
                .collect();
            seen.insert(key)
        })
    }

    /// Positions of the rows whose Miller index is in `wanted`.
    pub fn rows_with_hkls(&self, wanted: &HashSet<[i32; 3]>) -> Result<Vec<usize>, CrystalError> {
        let hkls = self.hkls()?;
        Ok(hkls
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(_, h)| wanted.contains(&[h[0], h[1], h[2]]))
            .map(|(row, _)| row)
            .collect())
    }

    /// Sub-table of the rows whose Miller index is in `wanted`.
    pub fn loc_hkls(&self, wanted: &HashSet<[i32; 3]>) -> Result<Crystal, CrystalError> {
        let rows = self.rows_with_hkls(wanted)?;
        self.select_rows(&rows)
    }

    /// Set of Miller indices present in the table.
    pub fn hkl_set(&self) -> Result<HashSet<[i32; 3]>, CrystalError> {
        let hkls = self.hkls()?;
        Ok(hkls.rows().into_iter().map(|h| [h[0], h[1], h[2]]).collect())
    }

    /// Values of a column widened to `f64`.
    pub fn values_f64(&self, name: &str) -> Result<Array1<f64>, CrystalError> {
        self.column(name)
            .or_else(|| self.index_level(name))
            .map(Column::to_f64)
            .ok_or_else(|| CrystalError::KeyMismatch(format!("no column '{name}'")))
    }
}
