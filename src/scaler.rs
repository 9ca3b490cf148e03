//! Per-feature standardization fitted at training time
//!
//! The fitted mean/std pair is the one artifact whose behavior must be
//! reproduced exactly at inference: `x_scaled = (x - mean) / std` with the
//! training-time statistics, never recomputed on request data.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Zero-mean/unit-variance scaler over a fixed number of feature columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl StandardScaler {
    /// Fit on a training matrix of shape `(n_samples, n_features)`.
    ///
    /// Uses the population standard deviation. A constant column gets a
    /// divisor of 1.0 so transforming it centers without blowing up.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(Error::Computation(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Computation("mean over zero rows".to_string()))?;
        let std = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 0.0 { s } else { 1.0 });
        Ok(StandardScaler { mean, std })
    }

    /// Number of feature columns this scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardize `x` with the fitted statistics. The column count must
    /// match the fitted width; the check is what catches a training/inference
    /// schema drift before it silently corrupts predictions.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x)?;
        Ok((x - &self.mean) / &self.std)
    }

    /// Undo a [`transform`](Self::transform) using the stored statistics
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x)?;
        Ok(x * &self.std + &self.mean)
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features() {
            return Err(Error::Computation(format!(
                "feature matrix has {} columns, scaler was fitted on {}",
                x.ncols(),
                self.n_features()
            )));
        }
        Ok(())
    }

    /// Persist as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a persisted scaler. Failure here is fatal for the service.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Artifact(format!("failed to read scaler {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Artifact(format!("failed to parse scaler {}: {e}", path.display())))
    }
}
