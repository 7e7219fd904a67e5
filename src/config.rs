//! Crate-wide constants and tunable settings.

/// Absolute tolerance when comparing transformed Miller indices.
pub const HKL_TOLERANCE: f64 = 1e-8;
/// Tolerance, in turns, below which a phase shift counts as whole.
pub const PHASE_SHIFT_TOLERANCE: f64 = 1e-6;

/// Names of the Miller index key columns.
pub const HKL_KEYS: [&str; 3] = ["H", "K", "L"];

// Well-known column labels
pub const CENTRIC_LABEL: &str = "CENTRIC";
pub const DHKL_LABEL: &str = "dHKL";
pub const EPSILON_LABEL: &str = "EPSILON";
pub const PHENIX_RFREE_LABEL: &str = "R-free-flags";
pub const CCP4_RFREE_LABEL: &str = "FreeR_flag";

pub const DEFAULT_RFREE_FRACTION: f64 = 0.05;
pub const DEFAULT_RFREE_BINS: usize = 20;

/// Settings for R-free flag assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct RfreeConfig {
    /// Probability that a reflection lands in the test set.
    pub fraction: f64,
    /// Number of resolution bins the test set is spread over.
    pub bins: usize,
    /// CCP4 convention (`FreeR_flag`, test set == 0) instead of the
    /// Phenix/CNS convention (`R-free-flags`, test set != 0).
    pub ccp4_convention: bool,
    /// Fixed RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for RfreeConfig {
    fn default() -> Self {
        Self {
            fraction: DEFAULT_RFREE_FRACTION,
            bins: DEFAULT_RFREE_BINS,
            ccp4_convention: false,
            seed: None,
        }
    }
}

impl RfreeConfig {
    /// Column label implied by the chosen convention.
    pub fn label(&self) -> &'static str {
        if self.ccp4_convention {
            CCP4_RFREE_LABEL
        } else {
            PHENIX_RFREE_LABEL
        }
    }
}
