//! Assigning values to bins.

use ndarray::Array1;

use crate::types::CrystalError;

/// Linear-interpolated percentile of sorted data. `q` is in [0, 100].
fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// `bins + 1` edges at evenly spaced percentiles of `data`, lowest value
/// first when `ascending`, highest first otherwise.
pub fn percentile_edges(data: &Array1<f64>, bins: usize, ascending: bool) -> Result<Vec<f64>, CrystalError> {
    if bins == 0 {
        return Err(CrystalError::InvalidArgument("bins must be at least 1".to_string()));
    }
    if data.is_empty() {
        return Err(CrystalError::InvalidArgument("cannot bin empty data".to_string()));
    }
    if data.iter().any(|v| v.is_nan()) {
        return Err(CrystalError::InvalidArgument("cannot bin NaN values".to_string()));
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut edges: Vec<f64> = (0..=bins)
        .map(|i| percentile_sorted(&sorted, 100.0 * i as f64 / bins as f64))
        .collect();
    if !ascending {
        edges.reverse();
    }
    Ok(edges)
}

/// Assign each value to the bin between consecutive `edges`.
///
/// `edges` must be monotonic (ascending or descending) and span every value.
/// `right` makes the right edge of each bin inclusive; the outermost edges
/// are always inclusive so the extreme values land in the first or last bin.
pub fn assign_with_binedges(data: &Array1<f64>, edges: &[f64], right: bool) -> Result<Array1<usize>, CrystalError> {
    if edges.len() < 2 {
        return Err(CrystalError::InvalidArgument(
            "at least two bin edges are required".to_string(),
        ));
    }
    let non_decreasing = edges.windows(2).all(|w| w[1] >= w[0]);
    let non_increasing = edges.windows(2).all(|w| w[1] <= w[0]);
    if !(non_decreasing || non_increasing) {
        return Err(CrystalError::InvalidArgument(format!(
            "bin edges are not monotonic: {edges:?}"
        )));
    }
    let first = edges[0];
    let last = edges[edges.len() - 1];
    let (lowest, highest) = (first.min(last), first.max(last));
    if data.iter().any(|&v| !(v >= lowest && v <= highest)) {
        return Err(CrystalError::InvalidArgument(
            "bin edges must contain every value".to_string(),
        ));
    }

    let ascending = first < last;
    let nbins = edges.len() as i64 - 1;
    let assignments = data.mapv(|v| {
        // Edges passed by v when walking the edge list in order
        let position = match (ascending, right) {
            (true, false) => edges.iter().filter(|&&e| e <= v).count(),
            (true, true) => edges.iter().filter(|&&e| e < v).count(),
            (false, false) => edges.iter().filter(|&&e| e > v).count(),
            (false, true) => edges.iter().filter(|&&e| e >= v).count(),
        };
        let mut bin = position as i64 - 1;
        match (right, ascending) {
            (true, true) if v == first => bin += 1,
            (true, false) if v == last => bin -= 1,
            (false, true) if v == last => bin -= 1,
            (false, false) if v == first => bin += 1,
            _ => {}
        }
        bin.clamp(0, nbins - 1) as usize
    });
    Ok(assignments)
}

/// Bin values into `bins` groups of roughly equal size.
///
/// Returns the bin of every value together with a `"lo - hi"` label per bin.
/// With `ascending == false` bin 0 holds the largest values.
pub fn bin_by_percentile(
    data: &Array1<f64>,
    bins: usize,
    ascending: bool,
) -> Result<(Array1<usize>, Vec<String>), CrystalError> {
    let edges = percentile_edges(data, bins, ascending)?;
    let assignments = assign_with_binedges(data, &edges, !ascending)?;
    let labels = edges
        .windows(2)
        .map(|w| format!("{:.2} - {:.2}", w[0], w[1]))
        .collect();
    Ok((assignments, labels))
}
