use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use wccore::{BufferSettings, GeometrySettings};

use crate::generator::profile::GeneratorConfig;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub geometry: GeometrySettings,
    pub buffers: BufferSettings,
    pub generator: GeneratorConfig,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        bin_size_m: f64,
        grid_size: usize,
        along_track_avg_ping: usize,
        raw_ring_capacity: usize,
    ) -> Self {
        Self {
            geometry: GeometrySettings {
                bin_size_m,
                grid_size,
                along_track_avg_ping,
                ..Default::default()
            },
            buffers: BufferSettings {
                raw_ring_capacity,
                ..Default::default()
            },
            generator: GeneratorConfig::default(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.geometry.validate()?;
        self.buffers.validate(&self.geometry)?;
        self.generator.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_sets_geometry() {
        let cfg = WorkflowConfig::from_args(0.1, 800, 4, 2000);
        assert_eq!(cfg.geometry.grid_size, 800);
        assert_eq!(cfg.buffers.averaged_ring_capacity(&cfg.geometry), 500);
        cfg.validate().unwrap();
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"geometry:\n  bin_size_m: 0.1\n  along_track_avg_ping: 3\nbuffers:\n  raw_ring_capacity: 300\ngenerator:\n  beam_count: 64\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.geometry.bin_size_m, 0.1);
        assert_eq!(cfg.geometry.grid_size, 500);
        assert_eq!(cfg.buffers.raw_ring_capacity, 300);
        assert_eq!(cfg.generator.beam_count, 64);
    }

    #[test]
    fn config_load_rejects_invalid_geometry() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"geometry:\n  bin_size_m: -1.0\n").unwrap();
        let path = temp.into_temp_path();
        assert!(WorkflowConfig::load(&path).is_err());
    }

    #[test]
    fn bundled_workflow_loads() {
        let cfg =
            WorkflowConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/workflow.yaml")).unwrap();
        assert_eq!(cfg.geometry.grid_size, 500);
        assert_eq!(cfg.generator.incomplete_every, Some(50));
        assert_eq!(cfg.buffers.averaged_ring_capacity(&cfg.geometry), 1000);
    }
}
