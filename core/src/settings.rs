//! Geometry and buffer settings plus the snapshot channel that carries
//! geometry edits to the processing loops.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::prelude::{CoreError, CoreResult};

/// Projection and reduction geometry. Distances are in metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometrySettings {
    pub bin_size_m: f64,
    pub max_heave_m: f64,
    pub along_track_avg_ping: usize,
    pub across_track_avg_m: f64,
    pub depth_m: f64,
    pub depth_avg_m: f64,
    /// Side length of the square grid. Must be even so the across-track
    /// origin sits on a column boundary and reflecting about it maps whole
    /// columns onto whole columns.
    pub grid_size: usize,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self {
            bin_size_m: 0.20,
            max_heave_m: 5.0,
            along_track_avg_ping: 5,
            across_track_avg_m: 10.0,
            depth_m: 10.0,
            depth_avg_m: 10.0,
            grid_size: 500,
        }
    }
}

impl GeometrySettings {
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.bin_size_m.is_finite() && self.bin_size_m > 0.0) {
            return Err(CoreError::InvalidSettings(format!(
                "bin_size_m must be positive, got {}",
                self.bin_size_m
            )));
        }
        if !(self.max_heave_m.is_finite() && self.max_heave_m > 0.0) {
            return Err(CoreError::InvalidSettings(format!(
                "max_heave_m must be positive, got {}",
                self.max_heave_m
            )));
        }
        if self.along_track_avg_ping == 0 {
            return Err(CoreError::InvalidSettings(
                "along_track_avg_ping must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("across_track_avg_m", self.across_track_avg_m),
            ("depth_m", self.depth_m),
            ("depth_avg_m", self.depth_avg_m),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(CoreError::InvalidSettings(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.grid_size == 0 || self.grid_size % 2 != 0 {
            return Err(CoreError::InvalidSettings(format!(
                "grid_size must be a positive even number, got {}",
                self.grid_size
            )));
        }
        Ok(())
    }

    /// Rows reserved above the nominal sea surface for upward heave.
    pub fn heave_margin_bins(&self) -> i64 {
        (self.max_heave_m / self.bin_size_m).floor() as i64
    }

    /// Column holding the across-track origin.
    pub fn center_column(&self) -> i64 {
        (self.grid_size / 2) as i64
    }
}

/// Ring sizing and queue behaviour; fixed once the rings are allocated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    pub raw_ring_capacity: usize,
    pub queue_timeout_secs: u64,
    pub window_queue_depth: usize,
    pub grid_pool_size: usize,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            raw_ring_capacity: 5000,
            queue_timeout_secs: 60,
            window_queue_depth: 16,
            grid_pool_size: 8,
        }
    }
}

impl BufferSettings {
    pub fn validate(&self, geometry: &GeometrySettings) -> CoreResult<()> {
        if self.raw_ring_capacity < geometry.along_track_avg_ping {
            return Err(CoreError::InvalidSettings(format!(
                "raw_ring_capacity ({}) must hold at least one averaging window ({})",
                self.raw_ring_capacity, geometry.along_track_avg_ping
            )));
        }
        if self.window_queue_depth == 0 {
            return Err(CoreError::InvalidSettings(
                "window_queue_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn averaged_ring_capacity(&self, geometry: &GeometrySettings) -> usize {
        (self.raw_ring_capacity / geometry.along_track_avg_ping.max(1)).max(1)
    }
}

/// Single-writer handle publishing immutable geometry snapshots.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    tx: Arc<watch::Sender<Arc<GeometrySettings>>>,
    raw_ring_capacity: usize,
}

impl SettingsHandle {
    /// `raw_ring_capacity` bounds the averaging window any later edit may
    /// ask for.
    pub fn new(initial: GeometrySettings, raw_ring_capacity: usize) -> CoreResult<Self> {
        initial.validate()?;
        check_window(&initial, raw_ring_capacity)?;
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Ok(Self {
            tx: Arc::new(tx),
            raw_ring_capacity,
        })
    }

    pub fn current(&self) -> Arc<GeometrySettings> {
        self.tx.borrow().clone()
    }

    /// Publishes a new snapshot. The grid side length is fixed for the
    /// lifetime of the rings and cannot be edited, and the averaging window
    /// must still fit in the raw ring.
    pub fn update(&self, next: GeometrySettings) -> CoreResult<()> {
        next.validate()?;
        check_window(&next, self.raw_ring_capacity)?;
        let grid_size = self.tx.borrow().grid_size;
        if next.grid_size != grid_size {
            return Err(CoreError::InvalidSettings(format!(
                "grid_size is fixed at {} and cannot change to {}",
                grid_size, next.grid_size
            )));
        }
        debug!("publishing geometry settings {:?}", next);
        self.tx.send_replace(Arc::new(next));
        Ok(())
    }

    pub fn cache(&self) -> SettingsCache {
        let mut rx = self.tx.subscribe();
        let current = rx.borrow_and_update().clone();
        SettingsCache { rx, current }
    }
}

fn check_window(geometry: &GeometrySettings, raw_ring_capacity: usize) -> CoreResult<()> {
    if geometry.along_track_avg_ping > raw_ring_capacity {
        return Err(CoreError::InvalidSettings(format!(
            "along_track_avg_ping ({}) exceeds raw ring capacity ({})",
            geometry.along_track_avg_ping, raw_ring_capacity
        )));
    }
    Ok(())
}

/// Private per-loop copy of the geometry, refreshed only at iteration
/// boundaries.
#[derive(Debug)]
pub struct SettingsCache {
    rx: watch::Receiver<Arc<GeometrySettings>>,
    current: Arc<GeometrySettings>,
}

impl SettingsCache {
    /// Picks up a pending edit if one was published since the last call.
    /// Returns true when the cached snapshot changed.
    pub fn refresh(&mut self) -> bool {
        match self.rx.has_changed() {
            Ok(true) => {
                self.current = self.rx.borrow_and_update().clone();
                true
            }
            _ => false,
        }
    }

    pub fn get(&self) -> &GeometrySettings {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let geometry = GeometrySettings::default();
        geometry.validate().unwrap();
        BufferSettings::default().validate(&geometry).unwrap();
        assert_eq!(geometry.heave_margin_bins(), 25);
        assert_eq!(geometry.center_column(), 250);
    }

    #[test]
    fn validate_rejects_non_positive_bin_size() {
        let geometry = GeometrySettings {
            bin_size_m: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            geometry.validate(),
            Err(CoreError::InvalidSettings(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_window() {
        let geometry = GeometrySettings {
            along_track_avg_ping: 0,
            ..Default::default()
        };
        assert!(geometry.validate().is_err());
    }

    #[test]
    fn averaged_capacity_divides_raw_capacity() {
        let geometry = GeometrySettings::default();
        let buffers = BufferSettings::default();
        assert_eq!(buffers.averaged_ring_capacity(&geometry), 1000);
    }

    #[test]
    fn cache_only_changes_after_refresh() {
        let handle = SettingsHandle::new(GeometrySettings::default(), 5000).unwrap();
        let mut cache = handle.cache();
        assert!(!cache.refresh());

        handle
            .update(GeometrySettings {
                bin_size_m: 0.5,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cache.get().bin_size_m, 0.20);
        assert!(cache.refresh());
        assert_eq!(cache.get().bin_size_m, 0.5);
        assert!(!cache.refresh());
    }

    #[test]
    fn update_rejects_grid_size_change() {
        let handle = SettingsHandle::new(GeometrySettings::default(), 5000).unwrap();
        let result = handle.update(GeometrySettings {
            grid_size: 300,
            ..Default::default()
        });
        assert!(result.is_err());
        assert_eq!(handle.current().grid_size, 500);
    }

    #[test]
    fn settings_parse_from_json_with_defaults() {
        let geometry: GeometrySettings =
            serde_json::from_str(r#"{"bin_size_m": 0.1, "depth_m": 20.0}"#).unwrap();
        assert_eq!(geometry.bin_size_m, 0.1);
        assert_eq!(geometry.depth_m, 20.0);
        assert_eq!(geometry.grid_size, 500);
    }

    #[test]
    fn validate_rejects_odd_grid() {
        let geometry = GeometrySettings {
            grid_size: 501,
            ..Default::default()
        };
        assert!(geometry.validate().is_err());
    }

    #[test]
    fn update_rejects_window_larger_than_raw_ring() {
        let handle = SettingsHandle::new(GeometrySettings::default(), 8).unwrap();
        let result = handle.update(GeometrySettings {
            along_track_avg_ping: 10,
            ..Default::default()
        });
        assert!(matches!(result, Err(CoreError::InvalidSettings(_))));
        assert_eq!(handle.current().along_track_avg_ping, 5);

        handle
            .update(GeometrySettings {
                along_track_avg_ping: 8,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(handle.current().along_track_avg_ping, 8);
    }
}
