use serde::{Deserialize, Serialize};

use crate::error::NestError;

/// Millimeters per inch, for DPI conversions.
const MM_PER_INCH: f64 = 25.4;

/// Output sheet size in pixels at the target DPI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinSpec {
    pub width: f64,
    pub height: f64,
}

impl BinSpec {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Convert a physical sheet size to pixels.
    pub fn from_mm(mm_width: f64, mm_height: f64, dpi: f64) -> Self {
        Self {
            width: mm_width * dpi / MM_PER_INCH,
            height: mm_height * dpi / MM_PER_INCH,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), NestError> {
        if !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
        {
            return Err(NestError::InvalidInput(format!(
                "bin must have positive finite dimensions, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Parameters of the genetic fitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NestConfig {
    /// Number of generations to evolve.
    pub num_generations: usize,
    /// Number of candidate solutions per generation.
    pub population_size: usize,
    /// Mutation chance in percent, 0 disables mutation.
    pub mutation_rate: u32,
    /// Number of allowed orientations; the angle set is `{k * 360/n}`.
    pub rotations: u32,
    /// Worker threads for NFP computation and candidate evaluation.
    pub n_workers: usize,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for NestConfig {
    fn default() -> Self {
        Self {
            num_generations: 50,
            population_size: 20,
            mutation_rate: 10,
            rotations: 8,
            n_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            seed: None,
        }
    }
}

impl NestConfig {
    pub(crate) fn validate(&self) -> Result<(), NestError> {
        if self.num_generations < 1 {
            return Err(NestError::InvalidInput(
                "num_generations must be at least 1".into(),
            ));
        }
        if self.population_size < 2 {
            return Err(NestError::InvalidInput(
                "population_size must be at least 2".into(),
            ));
        }
        if self.mutation_rate > 100 {
            return Err(NestError::InvalidInput(
                "mutation_rate must be between 0 and 100".into(),
            ));
        }
        if !(1..=360).contains(&self.rotations) {
            return Err(NestError::InvalidInput(
                "rotations must be between 1 and 360".into(),
            ));
        }
        if self.n_workers < 1 {
            return Err(NestError::InvalidInput(
                "n_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_at_300_dpi() {
        let bin = BinSpec::from_mm(210.0, 297.0, 300.0);
        assert!((bin.width - 2480.3149606299213).abs() < 1e-9);
        assert!((bin.height - 3507.8740157480315).abs() < 1e-9);
    }

    #[test]
    fn rejects_out_of_range_params() {
        let mut cfg = NestConfig::default();
        cfg.population_size = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = NestConfig::default();
        cfg.rotations = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = NestConfig::default();
        cfg.mutation_rate = 101;
        assert!(cfg.validate().is_err());

        assert!(NestConfig::default().validate().is_ok());
        assert!(BinSpec::new(0.0, 10.0).validate().is_err());
        assert!(BinSpec::new(f64::NAN, 10.0).validate().is_err());
    }
}
