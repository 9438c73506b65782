use serde::{Deserialize, Serialize};
use wccore::telemetry::MetricsSnapshot;
use wccore::processing::display_grid;
use wccore::{RingView, SliceWindow};

/// Ring and counter summary served to the renderer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VisualizationModel {
    pub raw_occupancy: usize,
    pub raw_capacity: usize,
    pub averaged_occupancy: usize,
    pub averaged_capacity: usize,
    pub records_processed: usize,
    pub empty_pies: usize,
    pub samples_discarded: usize,
    pub windows_reduced: usize,
    pub latest_slice: Option<SliceWindow>,
}

impl VisualizationModel {
    pub fn capture(view: &RingView, metrics: MetricsSnapshot) -> Self {
        Self {
            raw_occupancy: view.raw_occupancy(),
            raw_capacity: view.raw_capacity(),
            averaged_occupancy: view.averaged_occupancy(),
            averaged_capacity: view.averaged_capacity(),
            records_processed: metrics.records_processed,
            empty_pies: metrics.empty_pies,
            samples_discarded: metrics.samples_discarded,
            windows_reduced: metrics.windows_reduced,
            latest_slice: view.latest_slice().map(|slice| (*slice).clone()),
        }
    }
}

/// Newest pie as per-cell means, trimmed below the deepest data row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PieDisplay {
    pub timestamp: f64,
    pub rows: Vec<Vec<Option<f32>>>,
}

impl PieDisplay {
    pub fn capture(view: &RingView) -> Option<Self> {
        let pie = view.latest_pie()?;
        let grid = display_grid(&pie);
        Some(Self {
            timestamp: pie.timestamp,
            rows: grid.rows().into_iter().map(|row| row.to_vec()).collect(),
        })
    }
}
