//! Grid index arithmetic shared by projection and reduction.

use std::ops::Range;

use crate::settings::GeometrySettings;

/// Mean of an accumulated cell; a cell nothing landed in has no data.
pub fn cell_mean(sum: f64, count: u64) -> Option<f32> {
    if count == 0 {
        None
    } else {
        Some((sum / count as f64) as f32)
    }
}

/// Bin offset of a metric distance, rounded toward negative infinity.
/// `None` when the offset is not finite or too large to ever index a grid.
pub fn bin_offset(distance_m: f64, bin_size_m: f64) -> Option<i64> {
    let offset = (distance_m / bin_size_m).floor();
    if (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&offset) {
        Some(offset as i64)
    } else {
        None
    }
}

/// Index inside `[0, side)`, or `None` when it falls off the grid.
pub fn checked_index(index: i64, side: usize) -> Option<usize> {
    usize::try_from(index).ok().filter(|&idx| idx < side)
}

fn clamp_band(start: i64, end: i64, side: usize) -> Range<usize> {
    let side = side as i64;
    let start = start.clamp(0, side);
    let end = end.clamp(start, side);
    start as usize..end as usize
}

/// Across-track columns averaged into the vertical profile, centred on the
/// origin column.
pub fn across_track_band(settings: &GeometrySettings) -> Range<usize> {
    let center = settings.grid_size as f64 / 2.0;
    let half_width = (settings.across_track_avg_m / 2.0) / settings.bin_size_m;
    clamp_band(
        (center - half_width).floor() as i64,
        (center + half_width).ceil() as i64,
        settings.grid_size,
    )
}

/// Depth rows averaged into the horizontal profile, centred on the selected
/// depth below the heave margin.
pub fn depth_band(settings: &GeometrySettings) -> Range<usize> {
    let row = bin_offset(settings.depth_m, settings.bin_size_m)
        .map_or(i64::MAX, |depth| settings.heave_margin_bins().saturating_add(depth));
    let half_height = ((settings.depth_avg_m / 2.0) / settings.bin_size_m).ceil() as i64;
    clamp_band(
        row.saturating_sub(half_height),
        row.saturating_add(half_height),
        settings.grid_size,
    )
}
