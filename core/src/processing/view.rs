use std::sync::Arc;

use ndarray::{s, Array2, Axis};

use crate::prelude::CoreResult;
use crate::processing::ring_buffer::SharedRing;
use crate::sonar_interface::{Pie, SliceWindow};

/// Rows kept below the deepest populated row when trimming a display grid.
pub const DISPLAY_ROW_MARGIN: usize = 10;

/// Read-only access to both rings for a rendering collaborator. Nothing here
/// mutates ring state; returned entries may be evicted from the ring while the
/// caller still holds them.
#[derive(Debug, Clone)]
pub struct RingView {
    raw: SharedRing<Arc<Pie>>,
    averaged: SharedRing<Arc<SliceWindow>>,
}

impl RingView {
    pub fn new(raw: SharedRing<Arc<Pie>>, averaged: SharedRing<Arc<SliceWindow>>) -> Self {
        Self { raw, averaged }
    }

    pub fn raw_occupancy(&self) -> usize {
        self.raw.occupancy()
    }

    pub fn raw_capacity(&self) -> usize {
        self.raw.capacity()
    }

    pub fn averaged_occupancy(&self) -> usize {
        self.averaged.occupancy()
    }

    pub fn averaged_capacity(&self) -> usize {
        self.averaged.capacity()
    }

    pub fn latest_pie(&self) -> Option<Arc<Pie>> {
        self.raw.latest()
    }

    pub fn recent_pies(&self, n: usize) -> CoreResult<Vec<Arc<Pie>>> {
        self.raw.peek_window(n)
    }

    pub fn latest_slice(&self) -> Option<Arc<SliceWindow>> {
        self.averaged.latest()
    }

    pub fn recent_slices(&self, n: usize) -> CoreResult<Vec<Arc<SliceWindow>>> {
        self.averaged.peek_window(n)
    }

    /// Every buffered slice window, oldest first.
    pub fn slice_history(&self) -> Vec<Arc<SliceWindow>> {
        self.averaged.peek_all()
    }

    /// Mean grid of the newest pie, cut below the deepest row holding data
    /// plus [`DISPLAY_ROW_MARGIN`] rows.
    pub fn latest_pie_mean(&self) -> Option<Array2<Option<f32>>> {
        self.latest_pie().map(|pie| display_grid(&pie))
    }
}

/// Per-cell mean grid of `pie`, cut below the deepest row holding data plus
/// [`DISPLAY_ROW_MARGIN`] rows.
pub fn display_grid(pie: &Pie) -> Array2<Option<f32>> {
    let grid = pie.mean_grid();
    let populated = grid
        .axis_iter(Axis(0))
        .rposition(|row| row.iter().any(Option::is_some))
        .map_or(0, |row| row + 1);
    let keep = (populated + DISPLAY_ROW_MARGIN).min(grid.nrows());
    grid.slice(s![..keep, ..]).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> (RingView, SharedRing<Arc<Pie>>, SharedRing<Arc<SliceWindow>>) {
        let raw = SharedRing::new(4).unwrap();
        let averaged = SharedRing::new(2).unwrap();
        (RingView::new(raw.clone(), averaged.clone()), raw, averaged)
    }

    fn slice(timestamp: f64) -> Arc<SliceWindow> {
        Arc::new(SliceWindow {
            vertical_profile: vec![None; 3],
            horizontal_profile: vec![Some(1.0); 3],
            timestamp,
            position: None,
        })
    }

    #[test]
    fn empty_rings_have_nothing_to_show() {
        let (view, _, _) = view();
        assert!(view.latest_pie().is_none());
        assert!(view.latest_pie_mean().is_none());
        assert!(view.slice_history().is_empty());
        assert!(view.recent_pies(1).is_err());
    }

    #[test]
    fn latest_pie_mean_trims_below_data() {
        let (view, raw, _) = view();
        let mut pie = Pie::zeroed(40, 0.0, None);
        pie.accumulate(5, 7, -30.0);
        raw.push(Arc::new(pie));

        let grid = view.latest_pie_mean().unwrap();
        assert_eq!(grid.dim(), (16, 40));
        assert_eq!(grid[[5, 7]], Some(-30.0));
        assert_eq!(grid[[5, 8]], None);
    }

    #[test]
    fn trim_is_capped_at_grid_height() {
        let (view, raw, _) = view();
        let mut pie = Pie::zeroed(12, 0.0, None);
        pie.accumulate(11, 0, 1.0);
        raw.push(Arc::new(pie));
        assert_eq!(view.latest_pie_mean().unwrap().nrows(), 12);
    }

    #[test]
    fn reads_do_not_change_occupancy() {
        let (view, _, averaged) = view();
        averaged.push(slice(1.0));
        averaged.push(slice(2.0));
        averaged.push(slice(3.0));

        let history = view.slice_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].timestamp, 2.0);
        assert_eq!(view.latest_slice().unwrap().timestamp, 3.0);
        assert_eq!(view.recent_slices(1).unwrap()[0].timestamp, 3.0);
        assert_eq!(view.averaged_occupancy(), 2);
        assert_eq!(view.averaged_capacity(), 2);
    }
}
