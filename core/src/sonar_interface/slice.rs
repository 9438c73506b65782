use serde::{Deserialize, Serialize};

use crate::sonar_interface::pie::Position;

/// Along-track average of N consecutive pies, collapsed to two profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceWindow {
    /// Mean amplitude per depth row inside the across-track band.
    pub vertical_profile: Vec<Option<f32>>,
    /// Mean amplitude per across-track column inside the depth band.
    pub horizontal_profile: Vec<Option<f32>>,
    pub timestamp: f64,
    pub position: Option<Position>,
}

impl SliceWindow {
    pub fn has_data(&self) -> bool {
        self.vertical_profile
            .iter()
            .chain(&self.horizontal_profile)
            .any(Option::is_some)
    }
}
