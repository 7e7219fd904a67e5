//! Unit cell constants and reciprocal-space metric.

use glam::{DMat3, DVec3};

use super::crystal::CrystalError;

/// Unit cell: edge lengths in Angstroms, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitCell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl UnitCell {
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Result<Self, CrystalError> {
        let cell = Self {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
        };
        if !(a > 0.0 && b > 0.0 && c > 0.0) {
            return Err(CrystalError::InvalidArgument(format!(
                "cell lengths must be positive: {a}, {b}, {c}"
            )));
        }
        let angles_ok = [alpha, beta, gamma]
            .iter()
            .all(|&ang| ang > 0.0 && ang < 180.0);
        if !angles_ok || cell.volume() <= 1e-6 * a * b * c {
            return Err(CrystalError::InvalidArgument(format!(
                "degenerate cell angles: {alpha}, {beta}, {gamma}"
            )));
        }
        Ok(cell)
    }

    pub fn from_parameters(p: [f64; 6]) -> Result<Self, CrystalError> {
        Self::new(p[0], p[1], p[2], p[3], p[4], p[5])
    }

    pub fn parameters(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.alpha, self.beta, self.gamma]
    }

    /// Real-space metric tensor G.
    pub fn metric_tensor(&self) -> DMat3 {
        let (ca, cb, cg) = (
            self.alpha.to_radians().cos(),
            self.beta.to_radians().cos(),
            self.gamma.to_radians().cos(),
        );
        let (a, b, c) = (self.a, self.b, self.c);
        DMat3::from_cols(
            DVec3::new(a * a, a * b * cg, a * c * cb),
            DVec3::new(a * b * cg, b * b, b * c * ca),
            DVec3::new(a * c * cb, b * c * ca, c * c),
        )
    }

    /// Reciprocal metric tensor G* = G⁻¹.
    pub fn reciprocal_metric_tensor(&self) -> DMat3 {
        self.metric_tensor().inverse()
    }

    /// Cell volume in cubic Angstroms.
    pub fn volume(&self) -> f64 {
        self.metric_tensor().determinant().max(0.0).sqrt()
    }

    /// Reciprocal edge lengths a*, b*, c*.
    pub fn reciprocal_lengths(&self) -> [f64; 3] {
        let g = self.reciprocal_metric_tensor();
        [g.x_axis.x.sqrt(), g.y_axis.y.sqrt(), g.z_axis.z.sqrt()]
    }

    /// 1/d² for a Miller index.
    pub fn inverse_d_squared(&self, hkl: [i32; 3]) -> f64 {
        let h = DVec3::new(hkl[0] as f64, hkl[1] as f64, hkl[2] as f64);
        h.dot(self.reciprocal_metric_tensor() * h)
    }

    /// Lattice-plane spacing d in Angstroms. Infinite for (0, 0, 0).
    pub fn d_spacing(&self, hkl: [i32; 3]) -> f64 {
        1.0 / self.inverse_d_squared(hkl).sqrt()
    }

    /// Largest |h|, |k|, |l| that can reach resolution `dmin`.
    pub fn hkl_limits(&self, dmin: f64) -> [i32; 3] {
        // Slack absorbs rounding in the metric inversion
        let limit = |r: f64| (1.0 / (dmin * r) + 1e-9) as i32;
        let [ar, br, cr] = self.reciprocal_lengths();
        [limit(ar), limit(br), limit(cr)]
    }
}
