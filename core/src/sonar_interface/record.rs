use serde::{Deserialize, Serialize};

use crate::prelude::{CoreError, CoreResult};
use crate::sonar_interface::pie::Position;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordHeader {
    /// Seconds since the epoch.
    pub timestamp: f64,
    /// False when the capture stage did not receive every partition of the
    /// datagram.
    #[serde(default = "default_true")]
    pub all_partitions_received: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInfo {
    pub heave_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorData {
    /// Tilt angle of each transmit sector, degrees.
    pub tilt_angle_deg: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RxInfo {
    pub beam_count: usize,
    pub tvg_offset_db: f32,
    pub sample_freq_hz: f64,
    pub sound_speed_m_per_s: f64,
}

/// Per-beam arrays, all indexed by beam number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeamData {
    /// Beam pointing angle relative to vertical, degrees.
    pub beam_angle_deg: Vec<f64>,
    pub sector_index: Vec<usize>,
    pub detected_range_samples: Vec<u32>,
    /// Raw amplitude samples in 0.5 dB steps, one vector per beam.
    pub amplitude_samples: Vec<Vec<i8>>,
}

/// One water-column datagram as produced by the external decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedRecord {
    pub header: RecordHeader,
    pub tx_info: TxInfo,
    pub sector_data: SectorData,
    pub rx_info: RxInfo,
    pub beam_data: BeamData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl DecodedRecord {
    /// Checks the structural consistency the projection relies on.
    pub fn validate(&self) -> CoreResult<()> {
        let rx = &self.rx_info;
        if !(rx.sample_freq_hz.is_finite() && rx.sample_freq_hz > 0.0) {
            return Err(CoreError::MalformedRecord(format!(
                "sample frequency {} Hz",
                rx.sample_freq_hz
            )));
        }
        if !(rx.sound_speed_m_per_s.is_finite() && rx.sound_speed_m_per_s > 0.0) {
            return Err(CoreError::MalformedRecord(format!(
                "sound speed {} m/s",
                rx.sound_speed_m_per_s
            )));
        }
        if !self.tx_info.heave_m.is_finite() {
            return Err(CoreError::MalformedRecord("non-finite heave".into()));
        }
        if !rx.tvg_offset_db.is_finite() {
            return Err(CoreError::MalformedRecord("non-finite TVG offset".into()));
        }

        let beams = &self.beam_data;
        let lengths = [
            ("beam angles", beams.beam_angle_deg.len()),
            ("sector indices", beams.sector_index.len()),
            ("detected ranges", beams.detected_range_samples.len()),
            ("amplitude rows", beams.amplitude_samples.len()),
        ];
        for (name, len) in lengths {
            if len != rx.beam_count {
                return Err(CoreError::MalformedRecord(format!(
                    "{} has {} entries for {} beams",
                    name, len, rx.beam_count
                )));
            }
        }

        let sectors = self.sector_data.tilt_angle_deg.len();
        if let Some(bad) = beams.sector_index.iter().find(|&&idx| idx >= sectors) {
            return Err(CoreError::MalformedRecord(format!(
                "sector index {} with {} sectors",
                bad, sectors
            )));
        }

        if let Some(angle) = beams.beam_angle_deg.iter().find(|angle| !angle.is_finite()) {
            return Err(CoreError::MalformedRecord(format!("beam angle {}", angle)));
        }
        if let Some(tilt) = self
            .sector_data
            .tilt_angle_deg
            .iter()
            .find(|tilt| !tilt.is_finite())
        {
            return Err(CoreError::MalformedRecord(format!("tilt angle {}", tilt)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DecodedRecord {
        DecodedRecord {
            header: RecordHeader {
                timestamp: 1.0,
                all_partitions_received: true,
            },
            tx_info: TxInfo { heave_m: 0.0 },
            sector_data: SectorData {
                tilt_angle_deg: vec![0.0],
            },
            rx_info: RxInfo {
                beam_count: 2,
                tvg_offset_db: 0.0,
                sample_freq_hz: 50_000.0,
                sound_speed_m_per_s: 1500.0,
            },
            beam_data: BeamData {
                beam_angle_deg: vec![-10.0, 10.0],
                sector_index: vec![0, 0],
                detected_range_samples: vec![10, 10],
                amplitude_samples: vec![vec![0; 11], vec![0; 11]],
            },
            position: None,
        }
    }

    #[test]
    fn consistent_record_validates() {
        record().validate().unwrap();
    }

    #[test]
    fn short_beam_array_is_malformed() {
        let mut short = record();
        short.beam_data.beam_angle_deg.pop();
        assert!(matches!(
            short.validate(),
            Err(CoreError::MalformedRecord(_))
        ));
    }

    #[test]
    fn out_of_range_sector_is_malformed() {
        let mut bad = record();
        bad.beam_data.sector_index[1] = 3;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn zero_sample_frequency_is_malformed() {
        let mut bad = record();
        bad.rx_info.sample_freq_hz = 0.0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn non_finite_angles_are_malformed() {
        let mut bad_beam = record();
        bad_beam.beam_data.beam_angle_deg[0] = f64::NAN;
        assert!(matches!(
            bad_beam.validate(),
            Err(CoreError::MalformedRecord(_))
        ));

        let mut bad_tilt = record();
        bad_tilt.sector_data.tilt_angle_deg[0] = f64::INFINITY;
        assert!(bad_tilt.validate().is_err());
    }

    #[test]
    fn completeness_flag_defaults_to_true() {
        let header: RecordHeader = serde_json::from_str(r#"{"timestamp": 3.5}"#).unwrap();
        assert!(header.all_partitions_received);
    }
}
