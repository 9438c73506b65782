use std::time::Duration;

use log::{debug, warn};

use crate::math::binning::{bin_offset, checked_index};
use crate::math::stats::StatsHelper;
use crate::prelude::{CoreResult, ProcessingStage};
use crate::processing::grid_pool::GridPool;
use crate::settings::GeometrySettings;
use crate::sonar_interface::{DecodedRecord, Pie};
use crate::telemetry::log::ThrottledWarning;

const WARNING_INTERVAL: Duration = Duration::from_secs(1);

/// Samples dropped because they projected outside the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundsReport {
    pub across_track: usize,
    pub depth: usize,
    pub total: usize,
}

/// One record's projection result.
#[derive(Debug)]
pub struct Projection {
    pub pie: Pie,
    pub discarded: BoundsReport,
}

/// Projects water-column records from polar beam geometry onto the
/// depth / across-track grid.
pub struct PieBuilder {
    settings: GeometrySettings,
    pool: GridPool,
    across_track_warning: ThrottledWarning,
    depth_warning: ThrottledWarning,
}

impl PieBuilder {
    pub fn new(settings: GeometrySettings, pool_size: usize) -> Self {
        Self {
            settings,
            pool: GridPool::with_capacity(pool_size),
            across_track_warning: ThrottledWarning::new(
                "across-track width exceeds grid bounds, consider increasing bin size",
                WARNING_INTERVAL,
            ),
            depth_warning: ThrottledWarning::new(
                "heave or depth exceeds grid bounds, consider increasing maximum heave or bin size",
                WARNING_INTERVAL,
            ),
        }
    }

    pub fn settings(&self) -> &GeometrySettings {
        &self.settings
    }

    /// Returns a pie's storage to the pool once nothing else references it.
    pub fn recycle(&mut self, pie: Pie) {
        let (values, counts) = pie.into_grids();
        self.pool.release(values, counts);
    }

    fn empty_pie(&mut self, record: &DecodedRecord) -> Projection {
        let (values, counts) = self.pool.checkout(self.settings.grid_size);
        Projection {
            pie: Pie::with_storage(values, counts, record.header.timestamp, record.position),
            discarded: BoundsReport::default(),
        }
    }

    /// Builds exactly one pie. Partial or malformed records yield the empty
    /// pie rather than an error.
    pub fn build(&mut self, record: &DecodedRecord) -> Projection {
        if !record.header.all_partitions_received {
            debug!(
                "record at {} missing partitions, emitting empty pie",
                record.header.timestamp
            );
            return self.empty_pie(record);
        }
        if let Err(err) = record.validate() {
            warn!("{}, emitting empty pie", err);
            return self.empty_pie(record);
        }
        let detected = match fill_missing_detections(&record.beam_data.detected_range_samples) {
            Some(detected) => detected,
            None => {
                warn!(
                    "record at {} has no bottom detections, emitting empty pie",
                    record.header.timestamp
                );
                return self.empty_pie(record);
            }
        };

        let mut projection = self.empty_pie(record);
        let side = self.settings.grid_size;
        let bin_size = self.settings.bin_size_m;
        let row_margin = self.settings.heave_margin_bins();
        let center_col = self.settings.center_column();

        let rx = &record.rx_info;
        let beams = &record.beam_data;
        let range_per_sample = rx.sound_speed_m_per_s / (2.0 * rx.sample_freq_hz);
        let heave = record.tx_info.heave_m;
        let mut report = BoundsReport::default();

        for beam in 0..rx.beam_count {
            let beam_angle = beams.beam_angle_deg[beam].to_radians();
            let sector = beams.sector_index[beam];
            let tilt_angle = record.sector_data.tilt_angle_deg[sector].to_radians();
            let (sin_beam, cos_beam) = beam_angle.sin_cos();
            let depth_factor = tilt_angle.cos() * cos_beam;

            // Samples past the end of the stored amplitudes are absent, not
            // out of bounds.
            let samples = beams.amplitude_samples[beam].iter().take(detected[beam] + 1);
            for (sample_idx, &raw) in samples.enumerate() {
                let range = range_per_sample * sample_idx as f64;
                // Reflected so the grid reads in display orientation.
                let across = -(range * sin_beam);
                let depth = range * depth_factor + heave;

                let row = bin_offset(depth, bin_size)
                    .and_then(|offset| offset.checked_add(row_margin))
                    .and_then(|index| checked_index(index, side));
                let col = bin_offset(across, bin_size)
                    .and_then(|offset| offset.checked_add(center_col))
                    .and_then(|index| checked_index(index, side));
                match (row, col) {
                    (Some(row), Some(col)) => {
                        let amplitude = 0.5 * f32::from(raw) - rx.tvg_offset_db;
                        projection.pie.accumulate(row, col, amplitude);
                    }
                    (row, col) => {
                        report.total += 1;
                        if row.is_none() {
                            report.depth += 1;
                        }
                        if col.is_none() {
                            report.across_track += 1;
                        }
                    }
                }
            }
        }

        self.across_track_warning.record(report.across_track);
        self.depth_warning.record(report.depth);
        projection.discarded = report;
        projection
    }
}

/// Replaces zero ("no detection") ranges with the mean of the non-zero ones.
/// Returns `None` when no beam detected the bottom.
fn fill_missing_detections(detected: &[u32]) -> Option<Vec<usize>> {
    let fallback = StatsHelper::mean_nonzero(detected)?.floor() as usize;
    Some(
        detected
            .iter()
            .map(|&range| if range == 0 { fallback } else { range as usize })
            .collect(),
    )
}

impl ProcessingStage for PieBuilder {
    type Input = DecodedRecord;
    type Output = Projection;

    fn configure(&mut self, settings: &GeometrySettings) -> CoreResult<()> {
        settings.validate()?;
        if settings.grid_size != self.settings.grid_size {
            self.pool.reset();
        }
        self.settings = settings.clone();
        Ok(())
    }

    fn execute(&mut self, input: DecodedRecord) -> CoreResult<Projection> {
        Ok(self.build(&input))
    }

    fn cleanup(&mut self) {
        self.pool.reset();
    }
}
