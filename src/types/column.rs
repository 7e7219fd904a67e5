//! Typed column storage.

use ndarray::{concatenate, Array1, Axis};

use super::crystal::CrystalError;
use super::dtypes::{Dtype, Storage};

/// Values of one column, stored in the representation its [`Dtype`] requires.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int32(Array1<i32>),
    Int64(Array1<i64>),
    Float32(Array1<f32>),
    Float64(Array1<f64>),
    Bool(Array1<bool>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int32(a) => a.len(),
            ColumnData::Int64(a) => a.len(),
            ColumnData::Float32(a) => a.len(),
            ColumnData::Float64(a) => a.len(),
            ColumnData::Bool(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn storage(&self) -> Storage {
        match self {
            ColumnData::Int32(_) => Storage::Int32,
            ColumnData::Int64(_) => Storage::Int64,
            ColumnData::Float32(_) => Storage::Float32,
            ColumnData::Float64(_) => Storage::Float64,
            ColumnData::Bool(_) => Storage::Bool,
        }
    }

    /// Empty data for a storage kind.
    pub fn empty(storage: Storage) -> Self {
        Self::zeros(storage, 0)
    }

    /// Zero-filled data (`false` for booleans).
    pub fn zeros(storage: Storage, n: usize) -> Self {
        match storage {
            Storage::Int32 => ColumnData::Int32(Array1::zeros(n)),
            Storage::Int64 => ColumnData::Int64(Array1::zeros(n)),
            Storage::Float32 => ColumnData::Float32(Array1::zeros(n)),
            Storage::Float64 => ColumnData::Float64(Array1::zeros(n)),
            Storage::Bool => ColumnData::Bool(Array1::from_elem(n, false)),
        }
    }

    /// Value at `row` widened to `f64` (booleans become 0/1).
    pub fn get_f64(&self, row: usize) -> f64 {
        match self {
            ColumnData::Int32(a) => a[row] as f64,
            ColumnData::Int64(a) => a[row] as f64,
            ColumnData::Float32(a) => a[row] as f64,
            ColumnData::Float64(a) => a[row],
            ColumnData::Bool(a) => {
                if a[row] {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// All values widened to `f64`.
    pub fn to_f64(&self) -> Array1<f64> {
        match self {
            ColumnData::Int32(a) => a.mapv(|v| v as f64),
            ColumnData::Int64(a) => a.mapv(|v| v as f64),
            ColumnData::Float32(a) => a.mapv(|v| v as f64),
            ColumnData::Float64(a) => a.clone(),
            ColumnData::Bool(a) => a.mapv(|v| if v { 1.0 } else { 0.0 }),
        }
    }

    /// Narrow `f64` values into `storage`. Callers validate beforehand.
    pub(crate) fn from_f64(values: &Array1<f64>, storage: Storage) -> Self {
        match storage {
            Storage::Int32 => ColumnData::Int32(values.mapv(|v| v as i32)),
            Storage::Int64 => ColumnData::Int64(values.mapv(|v| v as i64)),
            Storage::Float32 => ColumnData::Float32(values.mapv(|v| v as f32)),
            Storage::Float64 => ColumnData::Float64(values.clone()),
            Storage::Bool => ColumnData::Bool(values.mapv(|v| v != 0.0)),
        }
    }

    /// Rows at the given positions, in the given order.
    pub fn select(&self, rows: &[usize]) -> Self {
        match self {
            ColumnData::Int32(a) => ColumnData::Int32(a.select(Axis(0), rows)),
            ColumnData::Int64(a) => ColumnData::Int64(a.select(Axis(0), rows)),
            ColumnData::Float32(a) => ColumnData::Float32(a.select(Axis(0), rows)),
            ColumnData::Float64(a) => ColumnData::Float64(a.select(Axis(0), rows)),
            ColumnData::Bool(a) => ColumnData::Bool(a.select(Axis(0), rows)),
        }
    }

    /// Append `other` below `self`. `None` when storages differ.
    pub fn concat(&self, other: &ColumnData) -> Option<Self> {
        let out = match (self, other) {
            (ColumnData::Int32(a), ColumnData::Int32(b)) => {
                ColumnData::Int32(concatenate(Axis(0), &[a.view(), b.view()]).ok()?)
            }
            (ColumnData::Int64(a), ColumnData::Int64(b)) => {
                ColumnData::Int64(concatenate(Axis(0), &[a.view(), b.view()]).ok()?)
            }
            (ColumnData::Float32(a), ColumnData::Float32(b)) => {
                ColumnData::Float32(concatenate(Axis(0), &[a.view(), b.view()]).ok()?)
            }
            (ColumnData::Float64(a), ColumnData::Float64(b)) => {
                ColumnData::Float64(concatenate(Axis(0), &[a.view(), b.view()]).ok()?)
            }
            (ColumnData::Bool(a), ColumnData::Bool(b)) => {
                ColumnData::Bool(concatenate(Axis(0), &[a.view(), b.view()]).ok()?)
            }
            _ => return None,
        };
        Some(out)
    }

    /// Widen to the generic key-index representation.
    pub(crate) fn into_generic(self) -> Self {
        match self {
            ColumnData::Int32(a) => ColumnData::Int64(a.mapv(|v| v as i64)),
            ColumnData::Float32(a) => ColumnData::Float64(a.mapv(|v| v as f64)),
            other => other,
        }
    }
}

/// A named, typed column.
///
/// Integer columns may hold missing values (NaN in MTZ files). Missing rows
/// are tracked in a mask; the stored value under a missing row is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    dtype: Dtype,
    data: ColumnData,
    missing: Option<Array1<bool>>,
}

impl Column {
    /// Build a column, checking that `data` uses the storage `dtype` requires.
    pub fn new(name: impl Into<String>, dtype: Dtype, data: ColumnData) -> Result<Self, CrystalError> {
        let name = name.into();
        if data.storage() != dtype.storage() {
            return Err(CrystalError::InvalidArgument(format!(
                "column '{name}': {dtype} requires {:?} storage, got {:?}",
                dtype.storage(),
                data.storage()
            )));
        }
        Ok(Self {
            name,
            dtype,
            data,
            missing: None,
        })
    }

    pub fn int32(name: impl Into<String>, dtype: Dtype, values: Vec<i32>) -> Result<Self, CrystalError> {
        Self::new(name, dtype, ColumnData::Int32(Array1::from(values)))
    }

    pub fn float32(name: impl Into<String>, dtype: Dtype, values: Vec<f32>) -> Result<Self, CrystalError> {
        Self::new(name, dtype, ColumnData::Float32(Array1::from(values)))
    }

    pub fn boolean(name: impl Into<String>, values: Vec<bool>) -> Self {
        Self {
            name: name.into(),
            dtype: Dtype::Bool,
            data: ColumnData::Bool(Array1::from(values)),
            missing: None,
        }
    }

    /// Build a column of any type from `f64` values, enforcing the type's
    /// validity range. NaN in an integer column marks a missing value.
    pub fn from_f64(name: impl Into<String>, dtype: Dtype, values: Array1<f64>) -> Result<Self, CrystalError> {
        let name = name.into();
        check_values(&name, dtype, &values)?;
        let data = ColumnData::from_f64(&values, dtype.storage());
        let missing = missing_mask(&values, dtype.storage());
        Ok(Self {
            name,
            dtype,
            data,
            missing,
        })
    }

    /// Mark rows as missing. Only integer columns carry a mask.
    pub fn with_missing(mut self, mask: Array1<bool>) -> Result<Self, CrystalError> {
        if mask.len() != self.len() {
            return Err(CrystalError::InvalidArgument(format!(
                "column '{}': mask has {} rows, column has {}",
                self.name,
                mask.len(),
                self.len()
            )));
        }
        if !matches!(self.data.storage(), Storage::Int32 | Storage::Int64) {
            return Err(CrystalError::InvalidArgument(format!(
                "column '{}': only integer columns hold a missing-value mask",
                self.name
            )));
        }
        self.data = match self.data {
            ColumnData::Int32(a) => ColumnData::Int32(zero_missing(a, &mask)),
            ColumnData::Int64(a) => ColumnData::Int64(zero_missing(a, &mask)),
            other => other,
        };
        self.missing = nonempty(mask);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Values widened to `f64`, with NaN for missing rows.
    pub fn to_f64(&self) -> Array1<f64> {
        let mut values = self.data.to_f64();
        if let Some(mask) = &self.missing {
            values.zip_mut_with(mask, |v, &m| {
                if m {
                    *v = f64::NAN;
                }
            });
        }
        values
    }

    /// Missing-value mask, `None` when every value is present.
    pub fn missing(&self) -> Option<&Array1<bool>> {
        self.missing.as_ref()
    }

    pub fn has_missing(&self) -> bool {
        self.missing.is_some()
    }

    pub fn as_i32(&self) -> Option<&Array1<i32>> {
        match &self.data {
            ColumnData::Int32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&Array1<f32>> {
        match &self.data {
            ColumnData::Float32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut Array1<f32>> {
        match &mut self.data {
            ColumnData::Float32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&Array1<bool>> {
        match &self.data {
            ColumnData::Bool(a) => Some(a),
            _ => None,
        }
    }

    /// Cast to another semantic type.
    ///
    /// Fails with [`CrystalError::TypeCoercion`] if any value is outside the
    /// target type's validity range.
    pub fn astype(&self, dtype: Dtype) -> Result<Column, CrystalError> {
        if dtype == self.dtype {
            return Ok(self.clone());
        }
        let (data, missing) = match (&self.data, dtype.storage()) {
            // Lossless widenings need no validation
            (ColumnData::Int32(a), Storage::Int64) => {
                (ColumnData::Int64(a.mapv(|v| v as i64)), self.missing.clone())
            }
            (ColumnData::Float32(a), Storage::Float64) => {
                (ColumnData::Float64(a.mapv(|v| v as f64)), None)
            }
            _ => {
                let values = self.to_f64();
                check_values(&self.name, dtype, &values)?;
                (
                    ColumnData::from_f64(&values, dtype.storage()),
                    missing_mask(&values, dtype.storage()),
                )
            }
        };
        Ok(Column {
            name: self.name.clone(),
            dtype,
            data,
            missing,
        })
    }

    /// Append the rows of `other`. `None` when the storages differ.
    pub fn concat(&self, other: &Column) -> Option<Column> {
        let data = self.data.concat(&other.data)?;
        let missing = match (&self.missing, &other.missing) {
            (None, None) => None,
            (a, b) => {
                let full = |m: &Option<Array1<bool>>, n: usize| {
                    m.clone().unwrap_or_else(|| Array1::from_elem(n, false))
                };
                let a = full(a, self.len());
                let b = full(b, other.len());
                concatenate(Axis(0), &[a.view(), b.view()]).ok()
            }
        };
        Some(Column {
            name: self.name.clone(),
            dtype: self.dtype,
            data,
            missing,
        })
    }

    pub(crate) fn into_parts(self) -> (String, Dtype, ColumnData) {
        (self.name, self.dtype, self.data)
    }

    pub(crate) fn select(&self, rows: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            dtype: self.dtype,
            data: self.data.select(rows),
            missing: self
                .missing
                .as_ref()
                .and_then(|m| nonempty(m.select(Axis(0), rows))),
        }
    }
}

/// Mask of NaN rows for integer storage, `None` when nothing is missing.
fn missing_mask(values: &Array1<f64>, storage: Storage) -> Option<Array1<bool>> {
    match storage {
        Storage::Int32 | Storage::Int64 => nonempty(values.mapv(f64::is_nan)),
        _ => None,
    }
}

fn nonempty(mask: Array1<bool>) -> Option<Array1<bool>> {
    mask.iter().any(|&m| m).then_some(mask)
}

fn zero_missing<T: Copy + Default>(mut values: Array1<T>, mask: &Array1<bool>) -> Array1<T> {
    values.zip_mut_with(mask, |v, &m| {
        if m {
            *v = T::default();
        }
    });
    values
}

fn check_values(name: &str, dtype: Dtype, values: &Array1<f64>) -> Result<(), CrystalError> {
    for (row, &v) in values.iter().enumerate() {
        dtype.validate(v).map_err(|reason| CrystalError::TypeCoercion {
            column: name.to_string(),
            dtype,
            reason: format!("row {row}: {reason}"),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_storage_mismatch() {
        let err = Column::int32("PHI", Dtype::Phase, vec![1, 2]).unwrap_err();
        assert!(matches!(err, CrystalError::InvalidArgument(_)));
    }

    #[test]
    fn astype_generic_and_back() {
        let h = Column::int32("H", Dtype::Hkl, vec![1, -2, 3]).unwrap();
        let generic = h.astype(Dtype::Int64).unwrap();
        assert_eq!(generic.data().storage(), Storage::Int64);
        let back = generic.astype(Dtype::Hkl).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn astype_rejects_out_of_range() {
        let f = Column::from_f64("X", Dtype::Float64, Array1::from(vec![0.5, 1.0])).unwrap();
        let err = f.astype(Dtype::Hkl).unwrap_err();
        match err {
            CrystalError::TypeCoercion { column, dtype, .. } => {
                assert_eq!(column, "X");
                assert_eq!(dtype, Dtype::Hkl);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let big = Column::new("H", Dtype::Int64, ColumnData::Int64(Array1::from(vec![1i64 << 40])))
            .unwrap();
        assert!(big.astype(Dtype::Hkl).is_err());
    }

    #[test]
    fn select_and_concat() {
        let a = Column::float32("F", Dtype::SFAmplitude, vec![1.0, 2.0, 3.0]).unwrap();
        let picked = a.select(&[2, 0]);
        assert_eq!(picked.as_f32().unwrap().to_vec(), vec![3.0, 1.0]);
        let joined = a.data().concat(picked.data()).unwrap();
        assert_eq!(joined.len(), 5);
        assert!(a.data().concat(&ColumnData::empty(Storage::Bool)).is_none());
    }

    #[test]
    fn free_flags_with_missing_values() {
        let values = Array1::from(vec![1.0, f64::NAN, 0.0]);
        let flags = Column::from_f64("FreeR_flag", Dtype::MtzInt, values).unwrap();
        assert_eq!(flags.as_i32().unwrap().to_vec(), vec![1, 0, 0]);
        assert_eq!(flags.missing().unwrap().to_vec(), vec![false, true, false]);

        let back = flags.to_f64();
        assert_eq!(back[0], 1.0);
        assert!(back[1].is_nan());

        let wide = flags.astype(Dtype::Int64).unwrap();
        assert!(wide.has_missing());
        let floats = flags.astype(Dtype::Float64).unwrap();
        assert!(!floats.has_missing());
        assert!(floats.to_f64()[1].is_nan());
    }

    #[test]
    fn missing_mask_follows_rows() {
        let a = Column::from_f64("M", Dtype::MtzInt, Array1::from(vec![f64::NAN, 2.0])).unwrap();
        assert!(!a.select(&[1]).has_missing());
        assert!(a.select(&[1, 0]).to_f64()[1].is_nan());

        let b = Column::int32("M", Dtype::MtzInt, vec![7]).unwrap();
        let joined = b.concat(&a).unwrap();
        assert_eq!(joined.missing().unwrap().to_vec(), vec![false, true, false]);
        assert!(b.concat(&b).unwrap().missing().is_none());
    }

    #[test]
    fn with_missing_checks_shape_and_storage() {
        let m = Column::int32("M", Dtype::MtzInt, vec![5, 6]).unwrap();
        let masked = m.clone().with_missing(Array1::from(vec![true, false])).unwrap();
        assert_eq!(masked.as_i32().unwrap().to_vec(), vec![0, 6]);
        assert!(m.with_missing(Array1::from(vec![true])).is_err());

        let f = Column::float32("F", Dtype::SFAmplitude, vec![1.0]).unwrap();
        assert!(f.with_missing(Array1::from(vec![true])).is_err());
        assert!(Column::from_f64("B", Dtype::Bool, Array1::from(vec![f64::NAN])).is_err());
    }
}
