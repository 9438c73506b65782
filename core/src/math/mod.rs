pub mod binning;
pub mod stats;

pub use stats::StatsHelper;
