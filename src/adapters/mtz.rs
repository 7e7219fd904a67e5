//! MTZ reflection file reader and writer.
//!
//! An MTZ file is a 20-word binary preamble, a block of `f32` reflection
//! data (row-major, one row per reflection), and a trailing ASCII header of
//! 80-character records describing the columns, cell and symmetry. Only
//! merged files are handled; batch headers after `END` are ignored. Missing
//! values are stored as NaN (`VALM NAN`).

use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use ndarray::Array1;

use crate::config::HKL_KEYS;
use crate::symmetry::SpaceGroup;
use crate::types::{Column, Crystal, CrystalError, Dtype, UnitCell};

const MTZ_MAGIC: &[u8; 4] = b"MTZ ";
/// Byte offset of the reflection data (word 21).
const DATA_OFFSET: usize = 80;
const RECORD_LEN: usize = 80;
/// Machine stamp for IEEE little-endian floats and integers.
const MACHINE_STAMP_LE: [u8; 4] = [0x44, 0x41, 0x00, 0x00];

/// Errors raised while reading or writing MTZ files.
#[derive(Debug, thiserror::Error)]
pub enum MtzError {
    #[error("invalid MTZ file: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Crystal(#[from] CrystalError),
}

/// Read an MTZ file (optionally gzip-compressed).
pub fn mtz_file_to_crystal(path: &Path) -> Result<Crystal, MtzError> {
    let bytes = fs::read(path)?;
    mtz_to_crystal(&bytes)
}

/// Parse MTZ bytes (optionally gzip-compressed) into a reflection table.
///
/// Columns keep their MTZ types; when `H`, `K` and `L` are present they
/// become the key index.
pub fn mtz_to_crystal(bytes: &[u8]) -> Result<Crystal, MtzError> {
    let data = decompress_if_gzip(bytes)?;
    let bytes = data.as_slice();
    if bytes.len() < DATA_OFFSET {
        return Err(MtzError::InvalidFormat(format!(
            "file too small for MTZ preamble: {} bytes",
            bytes.len()
        )));
    }
    if &bytes[0..4] != MTZ_MAGIC {
        return Err(MtzError::InvalidFormat(format!(
            "missing MTZ magic: got {:?}",
            &bytes[0..4]
        )));
    }

    // Machine stamp (word 3): high nibble of the first byte is the float format
    let little_endian = match bytes[8] {
        0x44 | 0x41 => true,
        0x11 => false,
        other => {
            return Err(MtzError::InvalidFormat(format!(
                "unsupported machine stamp {other:#x}"
            )))
        }
    };
    let word = |offset: usize| -> [u8; 4] {
        [bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]
    };
    let i32_at = |offset: usize| -> i32 {
        if little_endian {
            i32::from_le_bytes(word(offset))
        } else {
            i32::from_be_bytes(word(offset))
        }
    };

    // Word 2: 1-based word position of the ASCII header
    let header_word = i32_at(4);
    if header_word < 1 {
        return Err(MtzError::InvalidFormat(format!(
            "bad header position {header_word}"
        )));
    }
    let header_offset = (header_word as usize - 1) * 4;
    if header_offset < DATA_OFFSET || header_offset > bytes.len() {
        return Err(MtzError::InvalidFormat(format!(
            "header offset {header_offset} outside file of {} bytes",
            bytes.len()
        )));
    }

    let header = parse_header(&bytes[header_offset..])?;
    let ncol = header.columns.len();
    if ncol != header.ncol {
        return Err(MtzError::InvalidFormat(format!(
            "NCOL declares {} columns but {ncol} COLUMN records found",
            header.ncol
        )));
    }
    let needed = header
        .nrefl
        .checked_mul(ncol)
        .and_then(|n| n.checked_mul(4))
        .filter(|n| DATA_OFFSET.checked_add(*n).is_some_and(|end| end <= header_offset))
        .ok_or_else(|| {
            MtzError::InvalidFormat(format!(
                "data section too small for {} reflections of {ncol} columns",
                header.nrefl
            ))
        })?;

    let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(header.nrefl); ncol];
    for (i, chunk) in bytes[DATA_OFFSET..DATA_OFFSET + needed]
        .chunks_exact(4)
        .enumerate()
    {
        let raw = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let v = if little_endian {
            f32::from_le_bytes(raw)
        } else {
            f32::from_be_bytes(raw)
        };
        values[i % ncol].push(v as f64);
    }

    let mut columns = Vec::with_capacity(ncol);
    for (spec, vals) in header.columns.iter().zip(values) {
        let dtype = Dtype::from_mtz_code(spec.code).unwrap_or_else(|| {
            tracing::warn!(column = %spec.label, code = %spec.code, "unknown MTZ column type, reading as R");
            Dtype::MtzReal
        });
        columns.push(Column::from_f64(spec.label.clone(), dtype, Array1::from(vals))?);
    }

    let mut crystal = Crystal::from_columns(columns)?;
    if let Some(params) = header.cell {
        crystal.set_cell(Some(UnitCell::from_parameters(params)?));
    }
    crystal.set_space_group(header.space_group()?.map(Arc::new));
    if HKL_KEYS.iter().all(|k| crystal.column(k).is_some()) {
        crystal.set_index(&HKL_KEYS)?;
    }

    tracing::debug!(
        rows = crystal.len(),
        columns = ncol,
        little_endian,
        "read MTZ"
    );
    Ok(crystal)
}

/// Write a reflection table as an MTZ file.
pub fn write_mtz_file(crystal: &Crystal, path: &Path) -> Result<(), MtzError> {
    let bytes = crystal_to_mtz(crystal)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Serialize a reflection table to little-endian MTZ bytes.
///
/// The table must carry a unit cell, a space group and `H`, `K`, `L`
/// (as key index or columns). Key levels are written as leading columns
/// with their original types.
pub fn crystal_to_mtz(crystal: &Crystal) -> Result<Vec<u8>, MtzError> {
    let cell = *crystal.require_cell()?;
    let sg = crystal.require_space_group()?;

    let mut table = crystal.clone();
    table.reset_index(false)?;
    if let Some(missing) = HKL_KEYS.iter().find(|k| table.column(k).is_none()) {
        return Err(CrystalError::KeyMismatch(format!("no Miller index '{missing}'")).into());
    }
    if let Some(bad) = table
        .column_names()
        .into_iter()
        .find(|name| name.is_empty() || name.contains(char::is_whitespace))
    {
        return Err(CrystalError::InvalidArgument(format!(
            "MTZ column labels cannot contain whitespace: '{bad}'"
        ))
        .into());
    }

    let nrefl = table.len();
    let values: Vec<Array1<f64>> = table.columns().iter().map(Column::to_f64).collect();
    let ncol = values.len();

    let header_word = i32::try_from(DATA_OFFSET / 4 + nrefl * ncol + 1)
        .map_err(|_| MtzError::InvalidFormat("table too large for MTZ".to_string()))?;

    let mut out = Vec::with_capacity(DATA_OFFSET + nrefl * ncol * 4 + 32 * RECORD_LEN);
    out.extend_from_slice(MTZ_MAGIC);
    out.extend_from_slice(&header_word.to_le_bytes());
    out.extend_from_slice(&MACHINE_STAMP_LE);
    out.resize(DATA_OFFSET, 0);
    for row in 0..nrefl {
        for column in &values {
            out.extend_from_slice(&(column[row] as f32).to_le_bytes());
        }
    }

    for record in header_records(&table, &cell, sg, &values)? {
        push_record(&mut out, &record);
    }
    tracing::debug!(rows = nrefl, columns = ncol, "wrote MTZ");
    Ok(out)
}

// ---------------------------------------------------------------------------
// Header records
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ColumnSpec {
    label: String,
    code: char,
}

#[derive(Debug, Default)]
struct Header {
    ncol: usize,
    nrefl: usize,
    cell: Option<[f64; 6]>,
    sg_number: Option<u16>,
    sg_name: Option<String>,
    symm: Vec<String>,
    columns: Vec<ColumnSpec>,
}

impl Header {
    /// Space group from the SYMM records, falling back to the SYMINF number
    /// or name.
    fn space_group(&self) -> Result<Option<SpaceGroup>, MtzError> {
        let name = self.sg_name.as_deref().unwrap_or("");
        if !self.symm.is_empty() {
            let triplets: Vec<&str> = self.symm.iter().map(String::as_str).collect();
            let sg = SpaceGroup::from_triplets(name, self.sg_number.unwrap_or(0), &triplets)
                .map_err(|e| MtzError::InvalidFormat(e.to_string()))?;
            return Ok(Some(sg));
        }
        if let Some(sg) = self.sg_number.and_then(|n| SpaceGroup::by_number(n).ok()) {
            return Ok(Some(sg));
        }
        if let Ok(sg) = SpaceGroup::by_name(name) {
            return Ok(Some(sg));
        }
        tracing::warn!(sg_name = name, "MTZ file has no usable symmetry");
        Ok(None)
    }
}

fn parse_numbers<T: std::str::FromStr>(text: &str, keyword: &str) -> Result<Vec<T>, MtzError> {
    text.split_whitespace()
        .map(|t| {
            t.parse::<T>()
                .map_err(|_| MtzError::InvalidFormat(format!("bad {keyword} value '{t}'")))
        })
        .collect()
}

fn parse_header(bytes: &[u8]) -> Result<Header, MtzError> {
    let mut header = Header::default();
    let mut saw_ncol = false;

    for record in bytes.chunks(RECORD_LEN) {
        let text = String::from_utf8_lossy(record);
        let line = text.trim();
        let keyword = line.split_whitespace().next().unwrap_or("").to_ascii_uppercase();
        let rest = line.get(keyword.len()..).unwrap_or("").trim();

        match keyword.as_str() {
            "NCOL" => {
                let fields: Vec<usize> = parse_numbers(rest, "NCOL")?;
                if fields.len() < 2 {
                    return Err(MtzError::InvalidFormat(format!("short NCOL record: '{line}'")));
                }
                header.ncol = fields[0];
                header.nrefl = fields[1];
                saw_ncol = true;
            }
            "CELL" => {
                let fields: Vec<f64> = parse_numbers(rest, "CELL")?;
                let params: [f64; 6] = fields.try_into().map_err(|_| {
                    MtzError::InvalidFormat(format!("CELL needs 6 values: '{line}'"))
                })?;
                header.cell = Some(params);
            }
            "SYMINF" => {
                let (numbers, quoted) = match rest.find('\'') {
                    Some(q) => (&rest[..q], Some(&rest[q + 1..])),
                    None => (rest, None),
                };
                header.sg_number = numbers
                    .split_whitespace()
                    .nth(3)
                    .and_then(|t| t.parse().ok());
                header.sg_name = quoted
                    .and_then(|q| q.split('\'').next())
                    .map(|s| s.trim().to_string());
            }
            "SYMM" => header.symm.push(rest.to_string()),
            "COLUMN" => {
                let mut fields = rest.split_whitespace();
                let label = fields.next();
                let code = fields.next().and_then(|c| c.chars().next());
                match (label, code) {
                    (Some(label), Some(code)) => header.columns.push(ColumnSpec {
                        label: label.to_string(),
                        code,
                    }),
                    _ => {
                        return Err(MtzError::InvalidFormat(format!(
                            "malformed COLUMN record: '{line}'"
                        )))
                    }
                }
            }
            "END" => {
                if !saw_ncol {
                    return Err(MtzError::InvalidFormat("header has no NCOL record".to_string()));
                }
                return Ok(header);
            }
            _ => {}
        }
    }
    Err(MtzError::InvalidFormat("header has no END record".to_string()))
}

fn push_record(out: &mut Vec<u8>, text: &str) {
    let mut record = text.as_bytes().to_vec();
    record.truncate(RECORD_LEN);
    record.resize(RECORD_LEN, b' ');
    out.extend_from_slice(&record);
}

/// Finite min/max of a column, `(0, 0)` when it has none.
fn value_range(values: &Array1<f64>) -> (f64, f64) {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })
        .unwrap_or((0.0, 0.0))
}

fn header_records(
    table: &Crystal,
    cell: &UnitCell,
    sg: &SpaceGroup,
    values: &[Array1<f64>],
) -> Result<Vec<String>, MtzError> {
    let [a, b, c, alpha, beta, gamma] = cell.parameters();
    let cell_text = format!("{a:10.4}{b:10.4}{c:10.4}{alpha:10.4}{beta:10.4}{gamma:10.4}");

    let inverse_d2: Vec<f64> = table
        .hkls()?
        .rows()
        .into_iter()
        .map(|h| cell.inverse_d_squared([h[0], h[1], h[2]]))
        .filter(|&s| s > 0.0)
        .collect();
    let (reso_lo, reso_hi) = value_range(&Array1::from(inverse_d2));

    let ops = sg.operations();
    let mut records = vec![
        "VERS MTZ:V1.1".to_string(),
        "TITLE".to_string(),
        format!("NCOL {:8} {:12} {:8}", values.len(), table.len(), 0),
        format!("CELL {cell_text}"),
        "SORT    0   0   0   0   0".to_string(),
        format!(
            "SYMINF {:3} {:2} {} {:5} '{}'",
            ops.len(),
            sg.sym_ops().len(),
            sg.lattice_type(),
            sg.number(),
            sg.hm()
        ),
    ];
    records.extend(ops.iter().map(|op| format!("SYMM {}", op.to_string().to_uppercase())));
    records.push(format!("RESO {reso_lo:.8} {reso_hi:.8}"));
    records.push("VALM NAN".to_string());

    for (column, vals) in table.columns().iter().zip(values) {
        let (lo, hi) = value_range(vals);
        let dataset = if HKL_KEYS.iter().any(|k| *k == column.name()) { 0 } else { 1 };
        records.push(format!(
            "COLUMN {:<30} {} {:>17.4} {:>17.4} {:4}",
            column.name(),
            column.dtype().mtz_code(),
            lo,
            hi,
            dataset
        ));
    }

    records.push("NDIF        2".to_string());
    for (id, name) in [(0, "HKL_base"), (1, "reciprocal")] {
        records.push(format!("PROJECT {id:7} {name}"));
        records.push(format!("CRYSTAL {id:7} {name}"));
        records.push(format!("DATASET {id:7} {name}"));
        records.push(format!("DCELL   {id:7} {cell_text}"));
        records.push(format!("DWAVEL  {id:7} {:10.5}", 0.0));
    }
    records.push("END".to_string());
    records.push("MTZENDOFHEADERS".to_string());
    Ok(records)
}

// ---------------------------------------------------------------------------
// Gzip detection & decompression
// ---------------------------------------------------------------------------

fn decompress_if_gzip(bytes: &[u8]) -> Result<Vec<u8>, MtzError> {
    if bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
        let mut decoder = flate2::read::GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    } else {
        Ok(bytes.to_vec())
    }
}
