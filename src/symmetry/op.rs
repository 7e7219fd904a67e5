//! Crystallographic symmetry operations in integer form.
//!
//! An operation is a rotation matrix and translation vector scaled by
//! [`DEN`]. Applied to a Miller index (a row vector) it gives
//! `h' = h·R / DEN`, with the structure-factor phase picking up
//! `-2π (h·t) / DEN`.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView2};

use super::SymmetryError;

/// Common denominator of rotation and translation entries.
pub const DEN: i32 = 24;

/// A symmetry operation `x' = R·x + t`, entries in units of 1/[`DEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymOp {
    pub rot: [[i32; 3]; 3],
    pub tran: [i32; 3],
}

impl SymOp {
    pub fn identity() -> Self {
        Self {
            rot: [[DEN, 0, 0], [0, DEN, 0], [0, 0, DEN]],
            tran: [0, 0, 0],
        }
    }

    /// Parse a coordinate triplet such as `"-y+1/2,x-y,z+1/3"`.
    pub fn parse(triplet: &str) -> Result<Self, SymmetryError> {
        let rows: Vec<&str> = triplet.split(',').collect();
        if rows.len() != 3 {
            return Err(invalid(triplet, format!("expected 3 components, got {}", rows.len())));
        }
        let mut op = SymOp {
            rot: [[0; 3]; 3],
            tran: [0; 3],
        };
        for (i, row) in rows.iter().enumerate() {
            let (rot_row, tran) = parse_row(row).map_err(|reason| invalid(triplet, reason))?;
            op.rot[i] = rot_row;
            op.tran[i] = tran.rem_euclid(DEN);
        }
        Ok(op)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// True when the rotation part is the identity (pure translation).
    pub fn is_translation(&self) -> bool {
        self.rot == Self::identity().rot
    }

    /// True when the rotation part is the inversion `-I`.
    pub fn is_inversion(&self) -> bool {
        self.rot == [[-DEN, 0, 0], [0, -DEN, 0], [0, 0, -DEN]]
    }

    /// The same rotation with a centring vector added to the translation.
    pub fn add_centering(&self, cen: [i32; 3]) -> Self {
        let mut out = *self;
        for i in 0..3 {
            out.tran[i] = (self.tran[i] + cen[i]).rem_euclid(DEN);
        }
        out
    }

    /// `-R, -t`.
    pub fn negated(&self) -> Self {
        let mut out = *self;
        for i in 0..3 {
            for j in 0..3 {
                out.rot[i][j] = -self.rot[i][j];
            }
            out.tran[i] = (-self.tran[i]).rem_euclid(DEN);
        }
        out
    }

    /// `h·R` before division by [`DEN`].
    fn apply_undivided(&self, hkl: [i32; 3]) -> [i32; 3] {
        let mut out = [0; 3];
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.rot[0][i] * hkl[0] + self.rot[1][i] * hkl[1] + self.rot[2][i] * hkl[2];
        }
        out
    }

    /// Map a Miller index. Fails if the result is fractional.
    pub fn apply_to_hkl(&self, hkl: [i32; 3]) -> Result<[i32; 3], SymmetryError> {
        let raw = self.apply_undivided(hkl);
        if raw.iter().any(|v| v % DEN != 0) {
            return Err(SymmetryError::FractionalIndex {
                op: self.to_string(),
                hkl,
            });
        }
        Ok([raw[0] / DEN, raw[1] / DEN, raw[2] / DEN])
    }

    /// Map a Miller index without requiring an integral result.
    pub fn apply_to_hkl_f64(&self, hkl: [i32; 3]) -> [f64; 3] {
        let raw = self.apply_undivided(hkl);
        let den = DEN as f64;
        [raw[0] as f64 / den, raw[1] as f64 / den, raw[2] as f64 / den]
    }

    /// Map every row of an n×3 array of Miller indices.
    pub fn apply_to_hkls(&self, hkls: ArrayView2<i32>) -> Result<Array2<i32>, SymmetryError> {
        let raw = hkls.dot(&self.rotation_array());
        if let Some((row, _)) = raw.indexed_iter().find(|(_, v)| *v % DEN != 0) {
            let r = hkls.row(row.0);
            return Err(SymmetryError::FractionalIndex {
                op: self.to_string(),
                hkl: [r[0], r[1], r[2]],
            });
        }
        Ok(raw.mapv(|v| v / DEN))
    }

    /// Phase shift in radians picked up by reflection `hkl`.
    pub fn phase_shift(&self, hkl: [i32; 3]) -> f64 {
        let dot = hkl[0] * self.tran[0] + hkl[1] * self.tran[1] + hkl[2] * self.tran[2];
        -2.0 * PI * dot as f64 / DEN as f64
    }

    /// Per-row phase shifts in radians for an n×3 array of Miller indices.
    pub fn phase_shifts(&self, hkls: ArrayView2<i32>) -> Array1<f64> {
        let tran = Array1::from(self.tran.to_vec());
        hkls.dot(&tran)
            .mapv(|dot| -2.0 * PI * dot as f64 / DEN as f64)
    }

    /// [`SymOp::phase_shifts`] in degrees, computed without a radian round trip
    /// so that half and whole turns come out exact.
    pub fn phase_shifts_deg(&self, hkls: ArrayView2<i32>) -> Array1<f64> {
        let tran = Array1::from(self.tran.to_vec());
        hkls.dot(&tran).mapv(|dot| -360.0 * dot as f64 / DEN as f64)
    }

    fn rotation_array(&self) -> Array2<i32> {
        Array2::from_shape_fn((3, 3), |(i, j)| self.rot[i][j])
    }
}

impl FromStr for SymOp {
    type Err = SymmetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SymOp::parse(s)
    }
}

impl fmt::Display for SymOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<String> = (0..3)
            .map(|i| format_row(self.rot[i], self.tran[i]))
            .collect();
        f.write_str(&rows.join(","))
    }
}

fn invalid(triplet: &str, reason: String) -> SymmetryError {
    SymmetryError::InvalidTriplet {
        triplet: triplet.to_string(),
        reason,
    }
}

fn axis_of(c: char) -> Option<usize> {
    match c.to_ascii_lowercase() {
        'x' => Some(0),
        'y' => Some(1),
        'z' => Some(2),
        _ => None,
    }
}

/// Parse one triplet component into a rotation row and a translation.
fn parse_row(row: &str) -> Result<([i32; 3], i32), String> {
    let chars: Vec<char> = row.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return Err("empty component".to_string());
    }
    let mut rot = [0i32; 3];
    let mut tran = 0i32;
    let mut pos = 0;
    while pos < chars.len() {
        let mut sign = 1;
        match chars[pos] {
            '+' => pos += 1,
            '-' => {
                sign = -1;
                pos += 1;
            }
            _ if pos > 0 => return Err(format!("expected '+' or '-' at '{}'", chars[pos])),
            _ => {}
        }
        if pos >= chars.len() {
            return Err("dangling sign".to_string());
        }

        if let Some(axis) = axis_of(chars[pos]) {
            rot[axis] += sign * DEN;
            pos += 1;
            continue;
        }

        let (units, next) = parse_number(&chars, pos)?;
        pos = next;
        let mut axis = None;
        if pos < chars.len() && chars[pos] == '*' {
            pos += 1;
            axis = chars.get(pos).copied().and_then(axis_of);
            if axis.is_none() {
                return Err("expected x, y or z after '*'".to_string());
            }
        } else if let Some(a) = chars.get(pos).copied().and_then(axis_of) {
            axis = Some(a);
        }
        match axis {
            Some(a) => {
                rot[a] += sign * units;
                pos += 1;
            }
            None => tran += sign * units,
        }
    }
    Ok((rot, tran))
}

/// Parse `n`, `n.m` or `n/d` starting at `start`, returning the value in
/// units of 1/[`DEN`].
fn parse_number(chars: &[char], start: usize) -> Result<(i32, usize), String> {
    let mut pos = start;
    while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
        pos += 1;
    }
    if pos == start {
        return Err(format!("unexpected character '{}'", chars[start]));
    }
    let numerator: String = chars[start..pos].iter().collect();
    let mut value: f64 = numerator
        .parse()
        .map_err(|_| format!("bad number '{numerator}'"))?;
    if pos < chars.len() && chars[pos] == '/' {
        pos += 1;
        let den_start = pos;
        while pos < chars.len() && chars[pos].is_ascii_digit() {
            pos += 1;
        }
        let denominator: String = chars[den_start..pos].iter().collect();
        let d: f64 = denominator
            .parse()
            .map_err(|_| format!("bad denominator '{denominator}'"))?;
        if d == 0.0 {
            return Err("zero denominator".to_string());
        }
        value /= d;
    }
    let scaled = value * DEN as f64;
    let units = scaled.round();
    if (scaled - units).abs() > 1e-6 {
        return Err(format!("{value} is not a multiple of 1/{DEN}"));
    }
    Ok((units as i32, pos))
}

fn gcd(a: i32, b: i32) -> i32 {
    if b == 0 {
        a.abs()
    } else {
        gcd(b, a % b)
    }
}

/// Format `units / DEN` as an integer or reduced fraction, without sign.
fn format_fraction(units: i32) -> String {
    let units = units.abs();
    let g = gcd(units, DEN);
    let (n, d) = (units / g, DEN / g);
    if d == 1 {
        n.to_string()
    } else {
        format!("{n}/{d}")
    }
}

fn format_row(rot: [i32; 3], tran: i32) -> String {
    let mut out = String::new();
    for (axis, &coef) in rot.iter().enumerate() {
        if coef == 0 {
            continue;
        }
        if coef < 0 {
            out.push('-');
        } else if !out.is_empty() {
            out.push('+');
        }
        if coef.abs() != DEN {
            out.push_str(&format_fraction(coef));
            out.push('*');
        }
        out.push(['x', 'y', 'z'][axis]);
    }
    if tran != 0 {
        if tran < 0 {
            out.push('-');
        } else if !out.is_empty() {
            out.push('+');
        }
        out.push_str(&format_fraction(tran));
    }
    if out.is_empty() {
        out.push('0');
    }
    out
}
