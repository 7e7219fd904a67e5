//! Completeness of a reflection table against the reciprocal lattice.

use std::collections::HashSet;

use ndarray::{Array1, ArrayView2, Axis};

use super::{bin_by_percentile, compute_dhkl, generate_reciprocal_cell, is_absent};
use crate::symmetry::SymOp;
use crate::types::{Crystal, CrystalError};

/// Observed and possible unique reflections per resolution shell.
#[derive(Debug, Clone, PartialEq)]
pub struct Completeness {
    /// `"dmax - dmin"` label of every shell, low resolution first.
    pub labels: Vec<String>,
    pub observed: Vec<usize>,
    pub possible: Vec<usize>,
}

impl Completeness {
    /// Observed fraction of each shell. NaN for a shell with no possible
    /// reflections.
    pub fn per_bin(&self) -> Vec<f64> {
        self.observed
            .iter()
            .zip(&self.possible)
            .map(|(&o, &p)| o as f64 / p as f64)
            .collect()
    }

    pub fn overall(&self) -> f64 {
        let observed: usize = self.observed.iter().sum();
        let possible: usize = self.possible.iter().sum();
        observed as f64 / possible as f64
    }
}

fn sign_key(hkl: [i32; 3]) -> [i32; 3] {
    [hkl[0].signum(), hkl[1].signum(), hkl[2].signum()]
}

/// Canonical member of each reflection's orbit under `ops`.
///
/// The representative is the image with the greatest sign tuple, ties
/// broken by the indices themselves, so every member of an orbit yields the
/// same key. Friedel mates share an orbit unless `anomalous`.
pub(crate) fn orbit_keys(
    hkls: ArrayView2<i32>,
    ops: &[SymOp],
    anomalous: bool,
) -> Result<Vec<[i32; 3]>, CrystalError> {
    let images = ops
        .iter()
        .map(|op| op.apply_to_hkls(hkls))
        .collect::<Result<Vec<_>, _>>()?;

    let keys = (0..hkls.nrows())
        .map(|row| {
            let mut best = [hkls[[row, 0]], hkls[[row, 1]], hkls[[row, 2]]];
            for image in &images {
                let h = [image[[row, 0]], image[[row, 1]], image[[row, 2]]];
                let candidates = [h, [-h[0], -h[1], -h[2]]];
                let n = if anomalous { 1 } else { 2 };
                for &c in &candidates[..n] {
                    if (sign_key(c), c) > (sign_key(best), best) {
                        best = c;
                    }
                }
            }
            best
        })
        .collect();
    Ok(keys)
}

/// Completeness of `crystal` in `bins` resolution shells.
///
/// Possible reflections are every unique, non-absent Miller index with
/// d ≥ `dmin` (default: the highest resolution in the table). Each row counts
/// as one observation of its Miller index; with `anomalous` the Friedel
/// halves of acentric reflections are counted separately. Rows outside the
/// possible set are ignored.
pub fn compute_completeness(
    crystal: &Crystal,
    bins: usize,
    anomalous: bool,
    dmin: Option<f64>,
) -> Result<Completeness, CrystalError> {
    let cell = crystal.require_cell()?;
    let sg = crystal.require_space_group()?;
    let ops = sg.operations();
    let hkls = crystal.hkls()?;

    let dmin = match dmin {
        Some(d) => d,
        None => compute_dhkl(hkls.view(), cell)
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(f64::INFINITY, f64::min),
    };
    if !dmin.is_finite() {
        return Err(CrystalError::InvalidArgument(
            "no reflections to take dmin from".to_string(),
        ));
    }

    let lattice = generate_reciprocal_cell(cell, dmin)?;
    let present: Vec<usize> = is_absent(lattice.view(), sg)
        .iter()
        .enumerate()
        .filter(|(_, &absent)| !absent)
        .map(|(row, _)| row)
        .collect();
    let lattice = lattice.select(Axis(0), &present);

    let mut seen = HashSet::new();
    let possible: Vec<[i32; 3]> = orbit_keys(lattice.view(), &ops, anomalous)?
        .into_iter()
        .filter(|k| seen.insert(*k))
        .collect();
    if possible.is_empty() {
        return Err(CrystalError::InvalidArgument(format!(
            "no reflections possible at {dmin} Å"
        )));
    }
    let observed: HashSet<[i32; 3]> = orbit_keys(hkls.view(), &ops, anomalous)?
        .into_iter()
        .collect();

    let d: Array1<f64> = possible.iter().map(|&h| cell.d_spacing(h)).collect();
    let (assignments, labels) = bin_by_percentile(&d, bins, false)?;
    let mut result = Completeness {
        observed: vec![0; labels.len()],
        possible: vec![0; labels.len()],
        labels,
    };
    for (key, &bin) in possible.iter().zip(assignments.iter()) {
        result.possible[bin] += 1;
        if observed.contains(key) {
            result.observed[bin] += 1;
        }
    }

    tracing::debug!(
        dmin,
        anomalous,
        possible = possible.len(),
        overall = result.overall(),
        "computed completeness"
    );
    Ok(result)
}
