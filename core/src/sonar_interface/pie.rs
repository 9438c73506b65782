use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::math::binning::cell_mean;
use crate::prelude::{CoreError, CoreResult};

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// One ping's binned water-column grid.
///
/// Rows are depth bins, columns are across-track bins. `values` holds the sum
/// of every amplitude that landed in a cell and `counts` how many did; a cell
/// with a zero count carries no data.
#[derive(Debug, Clone)]
pub struct Pie {
    values: Array2<f32>,
    counts: Array2<u32>,
    pub timestamp: f64,
    pub position: Option<Position>,
}

impl Pie {
    /// The empty grid emitted for partial or unusable records.
    pub fn zeroed(side: usize, timestamp: f64, position: Option<Position>) -> Self {
        Self {
            values: Array2::zeros((side, side)),
            counts: Array2::zeros((side, side)),
            timestamp,
            position,
        }
    }

    /// Wraps grids already known to be square and of equal shape.
    pub(crate) fn with_storage(
        values: Array2<f32>,
        counts: Array2<u32>,
        timestamp: f64,
        position: Option<Position>,
    ) -> Self {
        Self {
            values,
            counts,
            timestamp,
            position,
        }
    }

    pub fn from_grids(
        values: Array2<f32>,
        counts: Array2<u32>,
        timestamp: f64,
        position: Option<Position>,
    ) -> CoreResult<Self> {
        let (rows, cols) = values.dim();
        if rows != cols {
            return Err(CoreError::ShapeMismatch {
                expected: rows,
                found: cols,
            });
        }
        if counts.dim() != (rows, cols) {
            return Err(CoreError::ShapeMismatch {
                expected: rows,
                found: counts.nrows(),
            });
        }
        Ok(Self {
            values,
            counts,
            timestamp,
            position,
        })
    }

    pub fn side(&self) -> usize {
        self.values.nrows()
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    pub fn counts(&self) -> &Array2<u32> {
        &self.counts
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&count| count == 0)
    }

    pub(crate) fn accumulate(&mut self, row: usize, col: usize, amplitude: f32) {
        self.values[[row, col]] += amplitude;
        self.counts[[row, col]] += 1;
    }

    /// Mean amplitude of one cell, `None` where nothing was binned or the
    /// index lies outside the grid.
    pub fn cell_mean(&self, row: usize, col: usize) -> Option<f32> {
        let count = *self.counts.get([row, col])?;
        cell_mean(f64::from(self.values[[row, col]]), u64::from(count))
    }

    pub fn mean_grid(&self) -> Array2<Option<f32>> {
        let mut grid = Array2::from_elem(self.values.dim(), None);
        ndarray::Zip::from(&mut grid)
            .and(&self.values)
            .and(&self.counts)
            .for_each(|out, &value, &count| {
                *out = cell_mean(f64::from(value), u64::from(count));
            });
        grid
    }

    /// Hands the grid storage back for reuse.
    pub fn into_grids(self) -> (Array2<f32>, Array2<u32>) {
        (self.values, self.counts)
    }
}
