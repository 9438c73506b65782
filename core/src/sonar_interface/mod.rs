pub mod pie;
pub mod record;
pub mod slice;

pub use pie::{Pie, Position};
pub use record::{BeamData, DecodedRecord, RecordHeader, RxInfo, SectorData, TxInfo};
pub use slice::SliceWindow;
