//! R-free test-set flags.

use std::collections::HashMap;

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::binning::bin_by_percentile;
use crate::config::{RfreeConfig, CCP4_RFREE_LABEL, DHKL_LABEL, PHENIX_RFREE_LABEL};
use crate::types::{Column, Crystal, CrystalError, Dtype};

/// Add an R-free flag column for cross-validated refinement.
///
/// Reflections are split into `config.bins` resolution shells of equal
/// population (shell 0 holds the lowest resolution) and each reflection
/// joins the test set with probability `config.fraction`. Under the
/// Phenix convention test reflections are flagged with their shell number
/// plus one and work reflections with 0; the CCP4 convention is the
/// reverse. A `dHKL` column is computed for binning when absent and is not
/// kept in the result.
pub fn add_rfree(crystal: &Crystal, config: &RfreeConfig) -> Result<Crystal, CrystalError> {
    if !(0.0..=1.0).contains(&config.fraction) {
        return Err(CrystalError::InvalidArgument(format!(
            "R-free fraction must be in [0, 1], got {}",
            config.fraction
        )));
    }
    let dhkl = match crystal.column(DHKL_LABEL) {
        Some(column) => column.to_f64(),
        None => crystal.compute_dhkl()?.values_f64(DHKL_LABEL)?,
    };
    let (shells, _) = bin_by_percentile(&dhkl, config.bins, false)?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut test_count = 0usize;
    let flags: Array1<f64> = shells
        .iter()
        .map(|&shell| {
            let test = rng.random::<f64>() <= config.fraction;
            if test {
                test_count += 1;
            }
            let flagged = test != config.ccp4_convention;
            if flagged {
                (shell + 1) as f64
            } else {
                0.0
            }
        })
        .collect();

    let mut out = crystal.clone();
    out.insert_column(Column::from_f64(config.label(), Dtype::MtzInt, flags)?)?;
    tracing::debug!(
        label = config.label(),
        test = test_count,
        rows = out.len(),
        "assigned R-free flags"
    );
    Ok(out)
}

/// Copy R-free flags from `source` onto `target`.
///
/// The flag column of `source` (Phenix label preferred, then CCP4) is
/// written to `target` under the same label. Reflections of `target` that
/// `source` lacks get flag 0.
pub fn copy_rfree(target: &Crystal, source: &Crystal) -> Result<Crystal, CrystalError> {
    let label = [PHENIX_RFREE_LABEL, CCP4_RFREE_LABEL]
        .into_iter()
        .find(|l| source.column(l).is_some())
        .ok_or_else(|| CrystalError::KeyMismatch("source has no R-free flags".to_string()))?;

    let source_flags = source.values_f64(label)?;
    let by_hkl: HashMap<[i32; 3], f64> = source
        .hkls()?
        .rows()
        .into_iter()
        .zip(source_flags.iter())
        .map(|(h, &flag)| ([h[0], h[1], h[2]], flag))
        .collect();

    let flags: Array1<f64> = target
        .hkls()?
        .rows()
        .into_iter()
        .map(|h| by_hkl.get(&[h[0], h[1], h[2]]).copied().unwrap_or(0.0))
        .collect();

    let mut out = target.clone();
    out.insert_column(Column::from_f64(label, Dtype::MtzInt, flags)?)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::crystal::tests::sample_crystal;
    use crate::utils::resolution::generate_reciprocal_cell;

    fn big_crystal() -> Crystal {
        let base = sample_crystal(&[[1, 0, 0]], &[0.0]);
        let cell = *base.cell().unwrap();
        let hkls = generate_reciprocal_cell(&cell, 6.0).unwrap();
        let rows: Vec<[i32; 3]> = hkls
            .rows()
            .into_iter()
            .map(|h| [h[0], h[1], h[2]])
            .collect();
        sample_crystal(&rows, &vec![0.0; rows.len()])
    }

    fn flags(crystal: &Crystal, label: &str) -> Vec<i32> {
        crystal.column(label).unwrap().as_i32().unwrap().to_vec()
    }

    #[test]
    fn phenix_convention() {
        let crystal = big_crystal();
        let config = RfreeConfig {
            fraction: 0.1,
            bins: 5,
            seed: Some(7),
            ..RfreeConfig::default()
        };
        let out = add_rfree(&crystal, &config).unwrap();
        let f = flags(&out, PHENIX_RFREE_LABEL);
        let test = f.iter().filter(|&&v| v != 0).count();
        assert!(test > 0 && test < f.len() / 2);
        assert!(f.iter().all(|&v| (0..=5).contains(&v)));
        assert!(out.column(DHKL_LABEL).is_none());
        assert_eq!(out.column(PHENIX_RFREE_LABEL).unwrap().dtype(), Dtype::MtzInt);
    }

    #[test]
    fn ccp4_convention_marks_test_set_with_zero() {
        let crystal = big_crystal();
        let config = RfreeConfig {
            fraction: 0.1,
            bins: 5,
            ccp4_convention: true,
            seed: Some(7),
        };
        let out = add_rfree(&crystal, &config).unwrap();
        let f = flags(&out, CCP4_RFREE_LABEL);
        let test = f.iter().filter(|&&v| v == 0).count();
        assert!(test > 0 && test < f.len() / 2);

        // Same seed, opposite convention: test rows swap flags
        let phenix = add_rfree(
            &crystal,
            &RfreeConfig {
                ccp4_convention: false,
                ..config
            },
        )
        .unwrap();
        let p = flags(&phenix, PHENIX_RFREE_LABEL);
        assert!(f.iter().zip(&p).all(|(&c, &p)| (c == 0) != (p == 0)));
    }

    #[test]
    fn shells_follow_resolution() {
        let crystal = big_crystal().compute_dhkl().unwrap();
        let config = RfreeConfig {
            fraction: 1.0,
            bins: 3,
            seed: Some(1),
            ..RfreeConfig::default()
        };
        let out = add_rfree(&crystal, &config).unwrap();
        let f = flags(&out, PHENIX_RFREE_LABEL);
        let d = out.values_f64(DHKL_LABEL).unwrap();
        // Shell 1 holds the lowest-resolution (largest d) reflections
        let (lowest, _) = d
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert_eq!(f[lowest], 1);
        assert!(f.iter().all(|&v| v >= 1));
    }

    #[test]
    fn rejects_bad_fraction() {
        let config = RfreeConfig {
            fraction: 1.5,
            ..RfreeConfig::default()
        };
        assert!(add_rfree(&big_crystal(), &config).is_err());
    }

    #[test]
    fn copies_flags_for_shared_reflections() {
        let mut source = sample_crystal(&[[1, 0, 0], [0, 1, 0]], &[0.0, 0.0]);
        source
            .insert_column(Column::int32(PHENIX_RFREE_LABEL, Dtype::MtzInt, vec![3, 0]).unwrap())
            .unwrap();
        let target = sample_crystal(&[[0, 0, 1], [1, 0, 0]], &[0.0, 0.0]);
        let out = copy_rfree(&target, &source).unwrap();
        assert_eq!(flags(&out, PHENIX_RFREE_LABEL), vec![0, 3]);

        assert!(matches!(
            copy_rfree(&source, &target),
            Err(CrystalError::KeyMismatch(_))
        ));
    }
}
