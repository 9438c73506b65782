use anyhow::{ensure, Context};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use wccore::sonar_interface::{
    BeamData, DecodedRecord, Position, RecordHeader, RxInfo, SectorData, TxInfo,
};

use crate::generator::template::heave_at;

/// Amplitudes are carried in 0.5 dB steps.
const RAW_PER_DB: f64 = 2.0;
/// Samples stored past the bottom detection, as a real sonar keeps recording.
const TAIL_SAMPLES: usize = 32;

/// Configuration for generating synthetic water-column swaths over a flat
/// seafloor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub beam_count: usize,
    pub swath_deg: f64,
    pub sector_tilts_deg: Vec<f64>,
    pub seafloor_depth_m: f64,
    pub sample_freq_hz: f64,
    pub sound_speed_m_per_s: f64,
    pub tvg_offset_db: f32,
    pub background_db: f64,
    pub bottom_db: f64,
    pub noise_db: f64,
    pub heave_amplitude_m: f64,
    pub heave_period_pings: f64,
    /// Depth and across-track half width of a mid-water scatterer layer.
    pub target_depth_m: Option<f64>,
    pub target_half_width_m: f64,
    pub target_db: f64,
    /// Probability that a beam reports no bottom detection.
    pub dropout_probability: f64,
    /// Every n-th record arrives without all of its partitions.
    pub incomplete_every: Option<usize>,
    pub ping_interval_s: f64,
    pub start_time: f64,
    pub start_position: Position,
    pub drift_deg_per_ping: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            beam_count: 256,
            swath_deg: 120.0,
            sector_tilts_deg: vec![-1.0, 0.0, 1.0],
            seafloor_depth_m: 20.0,
            sample_freq_hz: 12_500.0,
            sound_speed_m_per_s: 1500.0,
            tvg_offset_db: 0.0,
            background_db: -50.0,
            bottom_db: -10.0,
            noise_db: 3.0,
            heave_amplitude_m: 0.3,
            heave_period_pings: 40.0,
            target_depth_m: Some(8.0),
            target_half_width_m: 4.0,
            target_db: -25.0,
            dropout_probability: 0.02,
            incomplete_every: None,
            ping_interval_s: 0.1,
            start_time: 0.0,
            start_position: Position {
                latitude: 43.07,
                longitude: -70.71,
            },
            drift_deg_per_ping: 1e-6,
            seed: 0,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.beam_count > 0, "beam_count must be positive");
        ensure!(
            !self.sector_tilts_deg.is_empty(),
            "at least one transmit sector is required"
        );
        ensure!(self.sample_freq_hz > 0.0, "sample_freq_hz must be positive");
        ensure!(
            self.sound_speed_m_per_s > 0.0,
            "sound_speed_m_per_s must be positive"
        );
        ensure!(
            self.seafloor_depth_m > 0.0,
            "seafloor_depth_m must be positive"
        );
        ensure!(
            self.swath_deg > 0.0 && self.swath_deg < 180.0,
            "swath_deg must lie in (0, 180)"
        );
        ensure!(
            (0.0..=1.0).contains(&self.dropout_probability),
            "dropout_probability must lie in [0, 1]"
        );
        Ok(())
    }

    fn beam_angle(&self, beam: usize) -> f64 {
        if self.beam_count == 1 {
            return 0.0;
        }
        -self.swath_deg / 2.0 + beam as f64 * self.swath_deg / (self.beam_count - 1) as f64
    }

    fn sector_of(&self, beam: usize) -> usize {
        beam * self.sector_tilts_deg.len() / self.beam_count
    }
}

/// Stateful source of synthetic records, one per ping.
pub struct SwathGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    ping: usize,
}

impl SwathGenerator {
    pub fn new(config: GeneratorConfig) -> anyhow::Result<Self> {
        config.validate().context("validating generator config")?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            rng,
            ping: 0,
        })
    }

    pub fn next_record(&mut self) -> DecodedRecord {
        let config = &self.config;
        let ping = self.ping;
        self.ping += 1;

        let heave = heave_at(ping, config.heave_amplitude_m, config.heave_period_pings);
        let metres_per_sample = config.sound_speed_m_per_s / (2.0 * config.sample_freq_hz);
        let mut beam_data = BeamData::default();

        for beam in 0..config.beam_count {
            let angle_deg = config.beam_angle(beam);
            let sector = config.sector_of(beam);
            let angle = angle_deg.to_radians();
            let tilt = config.sector_tilts_deg[sector].to_radians();
            let vertical = angle.cos() * tilt.cos();

            let slant_to_bottom = (config.seafloor_depth_m - heave).max(0.0) / vertical;
            let bottom_sample = (slant_to_bottom / metres_per_sample).round() as usize;
            let dropped = self.rng.gen_bool(config.dropout_probability);

            let mut samples = Vec::with_capacity(bottom_sample + TAIL_SAMPLES);
            for sample in 0..bottom_sample + TAIL_SAMPLES {
                let range = sample as f64 * metres_per_sample;
                let depth = range * vertical + heave;
                let across = range * angle.sin();
                let mut level = config.background_db;
                if sample.abs_diff(bottom_sample) <= 2 {
                    level = config.bottom_db;
                } else if let Some(target_depth) = config.target_depth_m {
                    if (depth - target_depth).abs() < 0.5
                        && across.abs() <= config.target_half_width_m
                    {
                        level = config.target_db;
                    }
                }
                let jitter = if config.noise_db > 0.0 {
                    self.rng.gen_range(-config.noise_db..config.noise_db)
                } else {
                    0.0
                };
                let raw = ((level + jitter) * RAW_PER_DB).round();
                samples.push(raw.clamp(f64::from(i8::MIN), f64::from(i8::MAX)) as i8);
            }

            beam_data.beam_angle_deg.push(angle_deg);
            beam_data.sector_index.push(sector);
            beam_data
                .detected_range_samples
                .push(if dropped { 0 } else { bottom_sample as u32 });
            beam_data.amplitude_samples.push(samples);
        }

        let complete = config
            .incomplete_every
            .map_or(true, |every| every == 0 || (ping + 1) % every != 0);

        DecodedRecord {
            header: RecordHeader {
                timestamp: config.start_time + ping as f64 * config.ping_interval_s,
                all_partitions_received: complete,
            },
            tx_info: TxInfo { heave_m: heave },
            sector_data: SectorData {
                tilt_angle_deg: config.sector_tilts_deg.clone(),
            },
            rx_info: RxInfo {
                beam_count: config.beam_count,
                tvg_offset_db: config.tvg_offset_db,
                sample_freq_hz: config.sample_freq_hz,
                sound_speed_m_per_s: config.sound_speed_m_per_s,
            },
            beam_data,
            position: Some(Position {
                latitude: config.start_position.latitude + ping as f64 * config.drift_deg_per_ping,
                longitude: config.start_position.longitude,
            }),
        }
    }
}

pub fn build_records(config: &GeneratorConfig, count: usize) -> anyhow::Result<Vec<DecodedRecord>> {
    let mut generator = SwathGenerator::new(config.clone())?;
    Ok((0..count).map(|_| generator.next_record()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> GeneratorConfig {
        GeneratorConfig {
            beam_count: 16,
            dropout_probability: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn generator_builds_consistent_records() {
        let records = build_records(&small_config(), 3).unwrap();
        assert_eq!(records.len(), 3);
        for record in &records {
            record.validate().unwrap();
            assert_eq!(record.beam_data.amplitude_samples.len(), 16);
        }
        assert_eq!(records[2].header.timestamp, 0.2);
    }

    #[test]
    fn bottom_detection_matches_flat_seafloor() {
        let config = GeneratorConfig {
            beam_count: 1,
            heave_amplitude_m: 0.0,
            sector_tilts_deg: vec![0.0],
            ..small_config()
        };
        let record = build_records(&config, 1).unwrap().remove(0);
        // 20 m at 0.06 m per sample.
        assert_eq!(record.beam_data.detected_range_samples, vec![333]);
        assert_eq!(record.beam_data.amplitude_samples[0].len(), 333 + TAIL_SAMPLES);
    }

    #[test]
    fn seeded_generators_repeat() {
        let first = build_records(&small_config(), 2).unwrap();
        let second = build_records(&small_config(), 2).unwrap();
        assert_eq!(
            first[1].beam_data.amplitude_samples,
            second[1].beam_data.amplitude_samples
        );
    }

    #[test]
    fn incomplete_records_follow_the_configured_cadence() {
        let config = GeneratorConfig {
            incomplete_every: Some(3),
            ..small_config()
        };
        let flags: Vec<bool> = build_records(&config, 6)
            .unwrap()
            .iter()
            .map(|record| record.header.all_partitions_received)
            .collect();
        assert_eq!(flags, vec![true, true, false, true, true, false]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = GeneratorConfig {
            beam_count: 0,
            ..Default::default()
        };
        assert!(SwathGenerator::new(config).is_err());
    }
}
