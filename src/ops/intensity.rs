//! Intensities from structure-factor amplitudes.

use crate::types::{Column, Crystal, CrystalError, Dtype};

impl Crystal {
    /// Add `I = F² + SigF²` and `SigI = |2·F·SigF|` columns.
    ///
    /// `outputs` names the new intensity and sigma columns; neither may
    /// already exist.
    pub fn compute_intensity_from_structurefactor(
        &self,
        f_key: &str,
        sigf_key: &str,
        outputs: (&str, &str),
    ) -> Result<Crystal, CrystalError> {
        let (i_key, sigi_key) = outputs;
        for key in [i_key, sigi_key] {
            if self.column(key).is_some() || self.index_level(key).is_some() {
                return Err(CrystalError::InvalidArgument(format!(
                    "column '{key}' already exists"
                )));
            }
        }
        let f = self.values_f64(f_key)?;
        let sigf = self.values_f64(sigf_key)?;

        let intensity = &f * &f + &sigf * &sigf;
        let sigma = (&f * &sigf).mapv(|v| (2.0 * v).abs());

        let mut out = self.clone();
        out.insert_column(Column::from_f64(i_key, Dtype::Intensity, intensity)?)?;
        out.insert_column(Column::from_f64(sigi_key, Dtype::Stddev, sigma)?)?;
        Ok(out)
    }

    /// In-place [`Crystal::compute_intensity_from_structurefactor`].
    pub fn compute_intensity_from_structurefactor_inplace(
        &mut self,
        f_key: &str,
        sigf_key: &str,
        outputs: (&str, &str),
    ) -> Result<(), CrystalError> {
        *self = self.compute_intensity_from_structurefactor(f_key, sigf_key, outputs)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::types::crystal::tests::sample_crystal;
    use crate::types::{Column, CrystalError, Dtype};

    #[test]
    fn squares_amplitudes() {
        let mut crystal = sample_crystal(&[[1, 0, 0], [0, 1, 0]], &[0.0, 0.0]);
        crystal
            .insert_column(Column::float32("SIGF", Dtype::Stddev, vec![1.0, 0.5]).unwrap())
            .unwrap();
        let out = crystal
            .compute_intensity_from_structurefactor("F", "SIGF", ("I", "SIGI"))
            .unwrap();
        let i = out.column("I").unwrap();
        assert_eq!(i.dtype(), Dtype::Intensity);
        assert_eq!(i.as_f32().unwrap().to_vec(), vec![101.0, 100.25]);
        let sigi = out.column("SIGI").unwrap();
        assert_eq!(sigi.dtype(), Dtype::Stddev);
        assert_eq!(sigi.as_f32().unwrap().to_vec(), vec![20.0, 10.0]);
        assert!(crystal.column("I").is_none());
    }

    #[test]
    fn refuses_to_overwrite_and_reports_missing_inputs() {
        let mut crystal = sample_crystal(&[[1, 0, 0]], &[0.0]);
        crystal
            .insert_column(Column::float32("SIGF", Dtype::Stddev, vec![1.0]).unwrap())
            .unwrap();
        assert!(matches!(
            crystal.compute_intensity_from_structurefactor("F", "SIGF", ("PHI", "SIGI")),
            Err(CrystalError::InvalidArgument(_))
        ));
        assert!(matches!(
            crystal.compute_intensity_from_structurefactor_inplace("F", "NOPE", ("I", "SIGI")),
            Err(CrystalError::KeyMismatch(_))
        ));
        assert!(crystal.column("I").is_none());
    }
}
