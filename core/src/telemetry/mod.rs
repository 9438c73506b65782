pub mod log;
pub mod metrics;

pub use self::log::ThrottledWarning;
pub use metrics::{MetricsSnapshot, PipelineMetrics};
