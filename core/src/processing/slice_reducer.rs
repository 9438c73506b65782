use std::ops::Range;
use std::sync::Arc;

use ndarray::s;

use crate::math::binning::{across_track_band, cell_mean, depth_band};
use crate::math::stats::StatsHelper;
use crate::prelude::{CoreError, CoreResult, ProcessingStage};
use crate::settings::GeometrySettings;
use crate::sonar_interface::{Pie, Position, SliceWindow};

/// Decides when the raw ring has gathered a fresh along-track window.
///
/// Fires on every N-th push while the ring holds at least N pies, which matches
/// "occupancy is a multiple of N" until the ring fills and keeps the same
/// cadence once occupancy is pinned at capacity.
#[derive(Debug, Default)]
pub struct WindowTrigger {
    pending: usize,
}

impl WindowTrigger {
    pub fn observe(&mut self, occupancy: usize, window: usize) -> bool {
        self.pending += 1;
        if occupancy > 0 && occupancy >= window && self.pending >= window {
            self.pending = 0;
            true
        } else {
            false
        }
    }
}

/// Collapses a window of pies into one vertical and one horizontal profile.
pub struct SliceReducer {
    settings: GeometrySettings,
    columns: Range<usize>,
    rows: Range<usize>,
}

impl SliceReducer {
    pub fn new(settings: GeometrySettings) -> Self {
        let columns = across_track_band(&settings);
        let rows = depth_band(&settings);
        Self {
            settings,
            columns,
            rows,
        }
    }

    pub fn settings(&self) -> &GeometrySettings {
        &self.settings
    }

    /// Across-track columns feeding the vertical profile.
    pub fn column_band(&self) -> Range<usize> {
        self.columns.clone()
    }

    /// Depth rows feeding the horizontal profile.
    pub fn row_band(&self) -> Range<usize> {
        self.rows.clone()
    }

    pub fn reduce(&self, pies: &[Arc<Pie>]) -> CoreResult<SliceWindow> {
        if pies.is_empty() {
            return Err(CoreError::Underflow {
                requested: self.settings.along_track_avg_ping,
                available: 0,
            });
        }
        let side = self.settings.grid_size;
        if let Some(pie) = pies.iter().find(|pie| pie.side() != side) {
            return Err(CoreError::ShapeMismatch {
                expected: side,
                found: pie.side(),
            });
        }

        let mut vertical_sum = vec![0.0f64; side];
        let mut vertical_count = vec![0u64; side];
        let mut horizontal_sum = vec![0.0f64; side];
        let mut horizontal_count = vec![0u64; side];

        for pie in pies {
            let columns = self.columns.clone();
            let rows = self.rows.clone();

            let band_values = pie.values().slice(s![.., columns.clone()]);
            let band_counts = pie.counts().slice(s![.., columns]);
            for (row, (values, counts)) in band_values
                .rows()
                .into_iter()
                .zip(band_counts.rows())
                .enumerate()
            {
                vertical_sum[row] += values.iter().map(|&v| f64::from(v)).sum::<f64>();
                vertical_count[row] += counts.iter().map(|&c| u64::from(c)).sum::<u64>();
            }

            let band_values = pie.values().slice(s![rows.clone(), ..]);
            let band_counts = pie.counts().slice(s![rows, ..]);
            for (col, (values, counts)) in band_values
                .columns()
                .into_iter()
                .zip(band_counts.columns())
                .enumerate()
            {
                horizontal_sum[col] += values.iter().map(|&v| f64::from(v)).sum::<f64>();
                horizontal_count[col] += counts.iter().map(|&c| u64::from(c)).sum::<u64>();
            }
        }

        Ok(SliceWindow {
            vertical_profile: divide(&vertical_sum, &vertical_count),
            horizontal_profile: divide(&horizontal_sum, &horizontal_count),
            timestamp: StatsHelper::mean(pies.iter().map(|pie| pie.timestamp)).unwrap_or(f64::NAN),
            position: mean_position(pies),
        })
    }
}

fn divide(sums: &[f64], counts: &[u64]) -> Vec<Option<f32>> {
    sums.iter()
        .zip(counts)
        .map(|(&sum, &count)| cell_mean(sum, count))
        .collect()
}

fn mean_position(pies: &[Arc<Pie>]) -> Option<Position> {
    let positions: Vec<Position> = pies.iter().filter_map(|pie| pie.position).collect();
    Some(Position {
        latitude: StatsHelper::mean(positions.iter().map(|p| p.latitude))?,
        longitude: StatsHelper::mean(positions.iter().map(|p| p.longitude))?,
    })
}

impl ProcessingStage for SliceReducer {
    type Input = Vec<Arc<Pie>>;
    type Output = SliceWindow;

    fn configure(&mut self, settings: &GeometrySettings) -> CoreResult<()> {
        settings.validate()?;
        *self = Self::new(settings.clone());
        Ok(())
    }

    fn execute(&mut self, input: Vec<Arc<Pie>>) -> CoreResult<SliceWindow> {
        self.reduce(&input)
    }
}
