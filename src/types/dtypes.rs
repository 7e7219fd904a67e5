//! Semantic column types for reflection data.
//!
//! Every column of a [`Crystal`](crate::types::Crystal) carries a [`Dtype`]
//! tag. The tag fixes the storage representation, the single-character MTZ
//! format code, and the range of values the column may hold.

use std::fmt;

/// Physical storage backing a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
}

/// Semantic type of a reflection-table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dtype {
    Hkl,
    MtzInt,
    Batch,
    MIsym,
    Intensity,
    FriedelIntensity,
    SFAmplitude,
    FriedelSFAmplitude,
    NormalizedSFAmplitude,
    AnomalousDifference,
    Stddev,
    StddevFriedelSF,
    StddevFriedelI,
    Phase,
    HendricksonLattman,
    Weight,
    MtzReal,
    /// Plain boolean, e.g. `CENTRIC`.
    Bool,
    /// Generic integer used for key-index levels.
    Int64,
    /// Generic float used for key-index levels.
    Float64,
}

const ALL: [Dtype; 20] = [
    Dtype::Hkl,
    Dtype::MtzInt,
    Dtype::Batch,
    Dtype::MIsym,
    Dtype::Intensity,
    Dtype::FriedelIntensity,
    Dtype::SFAmplitude,
    Dtype::FriedelSFAmplitude,
    Dtype::NormalizedSFAmplitude,
    Dtype::AnomalousDifference,
    Dtype::Stddev,
    Dtype::StddevFriedelSF,
    Dtype::StddevFriedelI,
    Dtype::Phase,
    Dtype::HendricksonLattman,
    Dtype::Weight,
    Dtype::MtzReal,
    Dtype::Bool,
    Dtype::Int64,
    Dtype::Float64,
];

impl Dtype {
    /// Registry name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            Dtype::Hkl => "HKL",
            Dtype::MtzInt => "MTZInt",
            Dtype::Batch => "Batch",
            Dtype::MIsym => "M/ISYM",
            Dtype::Intensity => "Intensity",
            Dtype::FriedelIntensity => "FriedelIntensity",
            Dtype::SFAmplitude => "SFAmplitude",
            Dtype::FriedelSFAmplitude => "FriedelSFAmplitude",
            Dtype::NormalizedSFAmplitude => "NormalizedSFAmplitude",
            Dtype::AnomalousDifference => "AnomalousDifference",
            Dtype::Stddev => "Stddev",
            Dtype::StddevFriedelSF => "StddevFriedelSF",
            Dtype::StddevFriedelI => "StddevFriedelI",
            Dtype::Phase => "Phase",
            Dtype::HendricksonLattman => "HendricksonLattman",
            Dtype::Weight => "Weight",
            Dtype::MtzReal => "MTZReal",
            Dtype::Bool => "bool",
            Dtype::Int64 => "int64",
            Dtype::Float64 => "float64",
        }
    }

    /// Look up a type by registry name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Dtype> {
        ALL.iter()
            .copied()
            .find(|d| d.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Storage representation for values of this type.
    pub fn storage(&self) -> Storage {
        match self {
            Dtype::Hkl | Dtype::MtzInt | Dtype::Batch | Dtype::MIsym => Storage::Int32,
            Dtype::Bool => Storage::Bool,
            Dtype::Int64 => Storage::Int64,
            Dtype::Float64 => Storage::Float64,
            _ => Storage::Float32,
        }
    }

    /// MTZ column type code.
    ///
    /// The generic types have no code of their own and are written with the
    /// closest MTZ type (`I` for integers and booleans, `R` for floats).
    pub fn mtz_code(&self) -> char {
        match self {
            Dtype::Hkl => 'H',
            Dtype::MtzInt => 'I',
            Dtype::Batch => 'B',
            Dtype::MIsym => 'Y',
            Dtype::Intensity => 'J',
            Dtype::FriedelIntensity => 'K',
            Dtype::SFAmplitude => 'F',
            Dtype::FriedelSFAmplitude => 'G',
            Dtype::NormalizedSFAmplitude => 'E',
            Dtype::AnomalousDifference => 'D',
            Dtype::Stddev => 'Q',
            Dtype::StddevFriedelSF => 'L',
            Dtype::StddevFriedelI => 'M',
            Dtype::Phase => 'P',
            Dtype::HendricksonLattman => 'A',
            Dtype::Weight => 'W',
            Dtype::MtzReal => 'R',
            Dtype::Bool | Dtype::Int64 => 'I',
            Dtype::Float64 => 'R',
        }
    }

    /// Type registered for an MTZ column code.
    pub fn from_mtz_code(code: char) -> Option<Dtype> {
        let dtype = match code.to_ascii_uppercase() {
            'H' => Dtype::Hkl,
            'I' => Dtype::MtzInt,
            'B' => Dtype::Batch,
            'Y' => Dtype::MIsym,
            'J' => Dtype::Intensity,
            'K' => Dtype::FriedelIntensity,
            'F' => Dtype::SFAmplitude,
            'G' => Dtype::FriedelSFAmplitude,
            'E' => Dtype::NormalizedSFAmplitude,
            'D' => Dtype::AnomalousDifference,
            'Q' => Dtype::Stddev,
            'L' => Dtype::StddevFriedelSF,
            'M' => Dtype::StddevFriedelI,
            'P' => Dtype::Phase,
            'A' => Dtype::HendricksonLattman,
            'W' => Dtype::Weight,
            'R' => Dtype::MtzReal,
            _ => return None,
        };
        Some(dtype)
    }

    pub fn is_phase(&self) -> bool {
        matches!(self, Dtype::Phase)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.storage(), Storage::Int32 | Storage::Int64)
    }

    /// Generic type used when a column of this type becomes a key-index level.
    pub fn generic(&self) -> Dtype {
        match self.storage() {
            Storage::Int32 | Storage::Int64 => Dtype::Int64,
            Storage::Float32 | Storage::Float64 => Dtype::Float64,
            Storage::Bool => Dtype::Bool,
        }
    }

    /// Check a single value against the type's validity range.
    ///
    /// NaN marks a missing value. Integer columns record it in their
    /// missing-value mask; boolean columns cannot hold it.
    pub fn validate(&self, value: f64) -> Result<(), String> {
        if value.is_nan() {
            return match self.storage() {
                Storage::Bool => Err("missing value in boolean column".to_string()),
                _ => Ok(()),
            };
        }
        match self.storage() {
            Storage::Int32 => {
                if value.fract() != 0.0 {
                    return Err(format!("{value} is not integral"));
                }
                if value < i32::MIN as f64 || value > i32::MAX as f64 {
                    return Err(format!("{value} does not fit in 32 bits"));
                }
            }
            Storage::Int64 => {
                if value.fract() != 0.0 {
                    return Err(format!("{value} is not integral"));
                }
            }
            Storage::Float32 => {
                if value.is_finite() && value.abs() > f32::MAX as f64 {
                    return Err(format!("{value} overflows 32-bit float"));
                }
            }
            Storage::Float64 => {}
            Storage::Bool => {
                if value != 0.0 && value != 1.0 {
                    return Err(format!("{value} is not a boolean"));
                }
            }
        }
        let non_negative = matches!(
            self,
            Dtype::Batch
                | Dtype::MIsym
                | Dtype::SFAmplitude
                | Dtype::FriedelSFAmplitude
                | Dtype::NormalizedSFAmplitude
                | Dtype::Stddev
                | Dtype::StddevFriedelSF
                | Dtype::StddevFriedelI
                | Dtype::Weight
        );
        if non_negative && value < 0.0 {
            return Err(format!("{value} is negative"));
        }
        Ok(())
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
