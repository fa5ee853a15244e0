use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;

/// Min-max scaler fitted at training time
///
/// Maps column `j` from `[data_min[j], data_max[j]]` onto `feature_range`.
/// Constant columns (zero range) use a unit divisor so they map to the lower
/// bound instead of producing NaN.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub data_min: Vec<f64>,
    pub data_max: Vec<f64>,
    #[serde(default = "default_range")]
    pub feature_range: (f64, f64),
}

fn default_range() -> (f64, f64) {
    (0.0, 1.0)
}

impl MinMaxScaler {
    pub fn new(data_min: Vec<f64>, data_max: Vec<f64>) -> Result<Self, ArtifactError> {
        let scaler = Self { data_min, data_max, feature_range: default_range() };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Fits the scaler on the rows of `data`
    pub fn fit(data: &Array2<f64>) -> Result<Self, ArtifactError> {
        if data.nrows() == 0 {
            return Err(ArtifactError::Shape("cannot fit a scaler on zero rows".to_string()));
        }
        let data_min = data
            .axis_iter(Axis(1))
            .map(|column| column.fold(f64::INFINITY, |a, &b| a.min(b)))
            .collect();
        let data_max = data
            .axis_iter(Axis(1))
            .map(|column| column.fold(f64::NEG_INFINITY, |a, &b| a.max(b)))
            .collect();
        Self::new(data_min, data_max)
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.data_min.len() != self.data_max.len() {
            return Err(ArtifactError::Shape(format!(
                "scaler has {} minimums but {} maximums",
                self.data_min.len(),
                self.data_max.len()
            )));
        }
        if self.feature_range.0 >= self.feature_range.1 {
            return Err(ArtifactError::Inconsistent(format!(
                "scaler feature range {:?} is empty",
                self.feature_range
            )));
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.data_min.len()
    }

    fn scale(&self, j: usize) -> f64 {
        let range = self.data_max[j] - self.data_min[j];
        let range = if range == 0.0 { 1.0 } else { range };
        (self.feature_range.1 - self.feature_range.0) / range
    }

    pub fn transform_value(&self, j: usize, x: f64) -> f64 {
        (x - self.data_min[j]) * self.scale(j) + self.feature_range.0
    }

    pub fn inverse_transform_value(&self, j: usize, y: f64) -> f64 {
        (y - self.feature_range.0) / self.scale(j) + self.data_min[j]
    }

    /// Returns a scaled copy of `data`; columns must match the fit
    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>, ArtifactError> {
        self.check_width(data.ncols())?;
        let mut scaled = data.clone();
        for (j, mut column) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|x| self.transform_value(j, x));
        }
        Ok(scaled)
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, ArtifactError> {
        self.check_width(row.len())?;
        Ok(row.iter().enumerate().map(|(j, &x)| self.transform_value(j, x)).collect())
    }

    pub fn inverse_transform_row(&self, row: &[f64]) -> Result<Vec<f64>, ArtifactError> {
        self.check_width(row.len())?;
        Ok(row.iter().enumerate().map(|(j, &y)| self.inverse_transform_value(j, y)).collect())
    }

    fn check_width(&self, width: usize) -> Result<(), ArtifactError> {
        if width != self.n_features() {
            return Err(ArtifactError::Shape(format!(
                "scaler fitted on {} features, got {}",
                self.n_features(),
                width
            )));
        }
        Ok(())
    }
}
