//! Water-column core for live multibeam sonar display.
//!
//! Decoded water-column records are projected onto a depth / across-track
//! grid ("pie"), buffered in a bounded raw ring, and collapsed every N pings
//! into vertical and horizontal profiles held in a second ring. A renderer
//! reads both rings through [`processing::RingView`] without ever blocking the
//! producer.

pub mod math;
pub mod prelude;
pub mod processing;
pub mod settings;
pub mod sonar_interface;
pub mod telemetry;

pub use prelude::{CoreError, CoreResult, ProcessingStage};
pub use processing::{Pipeline, RingView};
pub use settings::{BufferSettings, GeometrySettings, SettingsHandle};
pub use sonar_interface::{DecodedRecord, Pie, SliceWindow};
