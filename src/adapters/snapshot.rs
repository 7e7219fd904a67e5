//! Lossless MessagePack snapshots of reflection tables.
//!
//! A snapshot is a single MessagePack map:
//!
//! ```text
//! { "format": "reciprocal-space", "version": 1,
//!   "cell": [a, b, c, alpha, beta, gamma] | nil,
//!   "space_group": { "number", "hm", "ops": [triplet, ...] } | nil,
//!   "index": [key, ...],
//!   "columns": [ { "name", "dtype", "data": <little-endian bytes>,
//!                  "missing"?: <one byte per row> }, ... ] }
//! ```
//!
//! Columns are written with the key index demoted, so every column carries
//! its semantic type; loading re-promotes the recorded keys.

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use ndarray::Array1;

use crate::symmetry::SpaceGroup;
use crate::types::{Column, ColumnData, Crystal, CrystalError, Dtype, Storage, UnitCell};

const FORMAT_NAME: &str = "reciprocal-space";
const FORMAT_VERSION: u64 = 1;
/// Deepest container nesting accepted by the decoder.
const MAX_DEPTH: usize = 32;

/// Errors raised while reading or writing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid snapshot: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Crystal(#[from] CrystalError),
}

pub fn write_snapshot_file(crystal: &Crystal, path: &Path) -> Result<(), SnapshotError> {
    fs::write(path, crystal_to_snapshot(crystal)?)?;
    Ok(())
}

pub fn snapshot_file_to_crystal(path: &Path) -> Result<Crystal, SnapshotError> {
    let bytes = fs::read(path)?;
    snapshot_to_crystal(&bytes)
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

fn wr<T, E: std::fmt::Debug>(result: Result<T, E>) -> Result<(), SnapshotError> {
    result
        .map(|_| ())
        .map_err(|e| SnapshotError::InvalidFormat(format!("msgpack write: {e:?}")))
}

fn column_bytes(data: &ColumnData) -> Vec<u8> {
    match data {
        ColumnData::Int32(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
        ColumnData::Int64(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
        ColumnData::Float32(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
        ColumnData::Float64(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
        ColumnData::Bool(a) => a.iter().map(|&v| v as u8).collect(),
    }
}

/// Encode a reflection table as a MessagePack snapshot.
pub fn crystal_to_snapshot(crystal: &Crystal) -> Result<Vec<u8>, SnapshotError> {
    use rmp::encode;

    let index: Vec<String> = crystal.index_names().iter().map(|s| s.to_string()).collect();
    let mut table = crystal.clone();
    table.reset_index(false)?;

    let mut out = Vec::new();
    wr(encode::write_map_len(&mut out, 6))?;

    wr(encode::write_str(&mut out, "format"))?;
    wr(encode::write_str(&mut out, FORMAT_NAME))?;
    wr(encode::write_str(&mut out, "version"))?;
    wr(encode::write_uint(&mut out, FORMAT_VERSION))?;

    wr(encode::write_str(&mut out, "cell"))?;
    match table.cell() {
        Some(cell) => {
            wr(encode::write_array_len(&mut out, 6))?;
            for p in cell.parameters() {
                wr(encode::write_f64(&mut out, p))?;
            }
        }
        None => wr(encode::write_nil(&mut out))?,
    }

    wr(encode::write_str(&mut out, "space_group"))?;
    match table.space_group() {
        Some(sg) => {
            wr(encode::write_map_len(&mut out, 3))?;
            wr(encode::write_str(&mut out, "number"))?;
            wr(encode::write_uint(&mut out, sg.number() as u64))?;
            wr(encode::write_str(&mut out, "hm"))?;
            wr(encode::write_str(&mut out, sg.hm()))?;
            wr(encode::write_str(&mut out, "ops"))?;
            let ops = sg.operations();
            wr(encode::write_array_len(&mut out, ops.len() as u32))?;
            for op in &ops {
                wr(encode::write_str(&mut out, &op.to_string()))?;
            }
        }
        None => wr(encode::write_nil(&mut out))?,
    }

    wr(encode::write_str(&mut out, "index"))?;
    wr(encode::write_array_len(&mut out, index.len() as u32))?;
    for key in &index {
        wr(encode::write_str(&mut out, key))?;
    }

    wr(encode::write_str(&mut out, "columns"))?;
    wr(encode::write_array_len(&mut out, table.columns().len() as u32))?;
    for column in table.columns() {
        let mask = column.missing();
        wr(encode::write_map_len(&mut out, if mask.is_some() { 4 } else { 3 }))?;
        wr(encode::write_str(&mut out, "name"))?;
        wr(encode::write_str(&mut out, column.name()))?;
        wr(encode::write_str(&mut out, "dtype"))?;
        wr(encode::write_str(&mut out, column.dtype().name()))?;
        wr(encode::write_str(&mut out, "data"))?;
        wr(encode::write_bin(&mut out, &column_bytes(column.data())))?;
        if let Some(mask) = mask {
            let bytes: Vec<u8> = mask.iter().map(|&m| m as u8).collect();
            wr(encode::write_str(&mut out, "missing"))?;
            wr(encode::write_bin(&mut out, &bytes))?;
        }
    }

    tracing::trace!(rows = table.len(), bytes = out.len(), "encoded snapshot");
    Ok(out)
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decode a snapshot produced by [`crystal_to_snapshot`].
pub fn snapshot_to_crystal(bytes: &[u8]) -> Result<Crystal, SnapshotError> {
    let root = Decoder::new(bytes).value()?;

    let format = root.get("format").and_then(MsgVal::as_str);
    if format != Some(FORMAT_NAME) {
        return Err(SnapshotError::InvalidFormat(format!(
            "unexpected format tag {format:?}"
        )));
    }
    match root.get("version").and_then(MsgVal::as_u64) {
        Some(FORMAT_VERSION) => {}
        other => {
            return Err(SnapshotError::InvalidFormat(format!(
                "unsupported version {other:?}"
            )))
        }
    }

    let columns = root
        .get("columns")
        .and_then(MsgVal::as_array)
        .ok_or_else(|| missing("columns"))?
        .iter()
        .map(decode_column)
        .collect::<Result<Vec<_>, _>>()?;
    let mut crystal = Crystal::from_columns(columns)?;

    match root.get("cell") {
        Some(MsgVal::Array(params)) => {
            let values: Vec<f64> = params.iter().filter_map(MsgVal::as_f64).collect();
            let params: [f64; 6] = values
                .try_into()
                .map_err(|_| SnapshotError::InvalidFormat("cell needs 6 numbers".to_string()))?;
            crystal.set_cell(Some(UnitCell::from_parameters(params)?));
        }
        Some(MsgVal::Nil) | None => {}
        Some(_) => return Err(SnapshotError::InvalidFormat("bad cell".to_string())),
    }

    match root.get("space_group") {
        Some(node @ MsgVal::Map(_)) => {
            let number = node.get("number").and_then(MsgVal::as_u64).ok_or_else(|| missing("number"))?;
            let hm = node.get("hm").and_then(MsgVal::as_str).ok_or_else(|| missing("hm"))?;
            let ops: Vec<&str> = node
                .get("ops")
                .and_then(MsgVal::as_array)
                .ok_or_else(|| missing("ops"))?
                .iter()
                .filter_map(MsgVal::as_str)
                .collect();
            let number = u16::try_from(number)
                .map_err(|_| SnapshotError::InvalidFormat(format!("bad space group number {number}")))?;
            let sg = SpaceGroup::from_triplets(hm, number, &ops)
                .map_err(|e| SnapshotError::InvalidFormat(e.to_string()))?;
            crystal.set_space_group(Some(Arc::new(sg)));
        }
        Some(MsgVal::Nil) | None => {}
        Some(_) => return Err(SnapshotError::InvalidFormat("bad space_group".to_string())),
    }

    let index: Vec<&str> = root
        .get("index")
        .and_then(MsgVal::as_array)
        .ok_or_else(|| missing("index"))?
        .iter()
        .filter_map(MsgVal::as_str)
        .collect();
    if !index.is_empty() {
        crystal.set_index(&index)?;
    }

    tracing::trace!(rows = crystal.len(), "decoded snapshot");
    Ok(crystal)
}

fn missing(field: &str) -> SnapshotError {
    SnapshotError::InvalidFormat(format!("missing or malformed '{field}'"))
}

fn decode_column(node: &MsgVal) -> Result<Column, SnapshotError> {
    let name = node.get("name").and_then(MsgVal::as_str).ok_or_else(|| missing("name"))?;
    let dtype_name = node.get("dtype").and_then(MsgVal::as_str).ok_or_else(|| missing("dtype"))?;
    let dtype = Dtype::from_name(dtype_name)
        .ok_or_else(|| SnapshotError::InvalidFormat(format!("unknown dtype '{dtype_name}'")))?;
    let raw = node.get("data").and_then(MsgVal::as_bin).ok_or_else(|| missing("data"))?;

    let storage = dtype.storage();
    let width = match storage {
        Storage::Int32 | Storage::Float32 => 4,
        Storage::Int64 | Storage::Float64 => 8,
        Storage::Bool => 1,
    };
    if raw.len() % width != 0 {
        return Err(SnapshotError::InvalidFormat(format!(
            "column '{name}': {} bytes is not a multiple of {width}",
            raw.len()
        )));
    }

    let data = match storage {
        Storage::Int32 => ColumnData::Int32(
            raw.chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect::<Array1<_>>(),
        ),
        Storage::Float32 => ColumnData::Float32(
            raw.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect::<Array1<_>>(),
        ),
        Storage::Int64 => ColumnData::Int64(
            raw.chunks_exact(8)
                .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect::<Array1<_>>(),
        ),
        Storage::Float64 => ColumnData::Float64(
            raw.chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect::<Array1<_>>(),
        ),
        Storage::Bool => ColumnData::Bool(raw.iter().map(|&b| b != 0).collect::<Array1<_>>()),
    };
    let column = Column::new(name, dtype, data)?;
    match node.get("missing") {
        Some(MsgVal::Bin(mask)) => {
            Ok(column.with_missing(mask.iter().map(|&b| b != 0).collect::<Array1<_>>())?)
        }
        None => Ok(column),
        Some(_) => Err(missing("missing")),
    }
}

// ---------------------------------------------------------------------------
// MessagePack value tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum MsgVal {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<MsgVal>),
    Map(Vec<(MsgVal, MsgVal)>),
}

impl MsgVal {
    fn as_str(&self) -> Option<&str> {
        match self {
            MsgVal::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match self {
            MsgVal::Uint(v) => Some(*v),
            MsgVal::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            MsgVal::F64(v) => Some(*v),
            MsgVal::F32(v) => Some(*v as f64),
            MsgVal::Int(v) => Some(*v as f64),
            MsgVal::Uint(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn as_array(&self) -> Option<&[MsgVal]> {
        match self {
            MsgVal::Array(a) => Some(a),
            _ => None,
        }
    }

    fn as_bin(&self) -> Option<&[u8]> {
        match self {
            MsgVal::Bin(b) => Some(b),
            _ => None,
        }
    }

    fn get(&self, key: &str) -> Option<&MsgVal> {
        match self {
            MsgVal::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Reads one MessagePack value tree from a byte slice.
struct Decoder<'a> {
    rd: Cursor<&'a [u8]>,
    depth: usize,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            rd: Cursor::new(bytes),
            depth: 0,
        }
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], SnapshotError> {
        let mut buf = [0u8; N];
        self.rd
            .read_exact(&mut buf)
            .map_err(|e| SnapshotError::InvalidFormat(format!("msgpack read {N} bytes: {e}")))?;
        Ok(buf)
    }

    fn len8(&mut self) -> Result<usize, SnapshotError> {
        Ok(self.fixed::<1>()?[0] as usize)
    }

    fn len16(&mut self) -> Result<usize, SnapshotError> {
        Ok(u16::from_be_bytes(self.fixed()?) as usize)
    }

    fn len32(&mut self) -> Result<usize, SnapshotError> {
        Ok(u32::from_be_bytes(self.fixed()?) as usize)
    }

    /// Next `len` bytes, refusing lengths beyond the end of input.
    fn payload(&mut self, len: usize) -> Result<Vec<u8>, SnapshotError> {
        let remaining = self.rd.get_ref().len().saturating_sub(self.rd.position() as usize);
        if len > remaining {
            return Err(SnapshotError::InvalidFormat(format!(
                "msgpack payload of {len} bytes exceeds remaining {remaining}"
            )));
        }
        let mut buf = vec![0u8; len];
        self.rd.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn text(&mut self, len: usize) -> Result<MsgVal, SnapshotError> {
        String::from_utf8(self.payload(len)?)
            .map(MsgVal::Str)
            .map_err(|e| SnapshotError::InvalidFormat(format!("msgpack string utf8: {e}")))
    }

    fn value(&mut self) -> Result<MsgVal, SnapshotError> {
        use rmp::Marker;

        let marker = rmp::decode::read_marker(&mut self.rd)
            .map_err(|e| SnapshotError::InvalidFormat(format!("msgpack marker: {e:?}")))?;

        Ok(match marker {
            Marker::Null => MsgVal::Nil,
            Marker::True => MsgVal::Bool(true),
            Marker::False => MsgVal::Bool(false),

            Marker::FixPos(v) => MsgVal::Uint(v as u64),
            Marker::FixNeg(v) => MsgVal::Int(v as i64),
            Marker::U8 => MsgVal::Uint(self.fixed::<1>()?[0] as u64),
            Marker::U16 => MsgVal::Uint(u16::from_be_bytes(self.fixed()?) as u64),
            Marker::U32 => MsgVal::Uint(u32::from_be_bytes(self.fixed()?) as u64),
            Marker::U64 => MsgVal::Uint(u64::from_be_bytes(self.fixed()?)),
            Marker::I8 => MsgVal::Int(self.fixed::<1>()?[0] as i8 as i64),
            Marker::I16 => MsgVal::Int(i16::from_be_bytes(self.fixed()?) as i64),
            Marker::I32 => MsgVal::Int(i32::from_be_bytes(self.fixed()?) as i64),
            Marker::I64 => MsgVal::Int(i64::from_be_bytes(self.fixed()?)),
            Marker::F32 => MsgVal::F32(f32::from_be_bytes(self.fixed()?)),
            Marker::F64 => MsgVal::F64(f64::from_be_bytes(self.fixed()?)),

            Marker::FixStr(len) => self.text(len as usize)?,
            Marker::Str8 => {
                let len = self.len8()?;
                self.text(len)?
            }
            Marker::Str16 => {
                let len = self.len16()?;
                self.text(len)?
            }
            Marker::Str32 => {
                let len = self.len32()?;
                self.text(len)?
            }

            Marker::Bin8 => {
                let len = self.len8()?;
                MsgVal::Bin(self.payload(len)?)
            }
            Marker::Bin16 => {
                let len = self.len16()?;
                MsgVal::Bin(self.payload(len)?)
            }
            Marker::Bin32 => {
                let len = self.len32()?;
                MsgVal::Bin(self.payload(len)?)
            }

            Marker::FixArray(len) => self.nested(len as usize, false)?,
            Marker::Array16 => {
                let len = self.len16()?;
                self.nested(len, false)?
            }
            Marker::Array32 => {
                let len = self.len32()?;
                self.nested(len, false)?
            }

            Marker::FixMap(len) => self.nested(len as usize, true)?,
            Marker::Map16 => {
                let len = self.len16()?;
                self.nested(len, true)?
            }
            Marker::Map32 => {
                let len = self.len32()?;
                self.nested(len, true)?
            }

            other => {
                return Err(SnapshotError::InvalidFormat(format!(
                    "unsupported msgpack marker: {other:?}"
                )))
            }
        })
    }

    /// An array of `len` values, or a map of `len` key/value pairs.
    fn nested(&mut self, len: usize, is_map: bool) -> Result<MsgVal, SnapshotError> {
        if self.depth >= MAX_DEPTH {
            return Err(SnapshotError::InvalidFormat(format!(
                "msgpack nesting deeper than {MAX_DEPTH}"
            )));
        }
        self.depth += 1;
        let out = if is_map {
            let mut pairs = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                let k = self.value()?;
                let v = self.value()?;
                pairs.push((k, v));
            }
            MsgVal::Map(pairs)
        } else {
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(self.value()?);
            }
            MsgVal::Array(items)
        };
        self.depth -= 1;
        Ok(out)
    }
}
