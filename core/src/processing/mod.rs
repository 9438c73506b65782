pub mod grid_pool;
pub mod pie_builder;
pub mod pipeline;
pub mod ring_buffer;
pub mod slice_reducer;
pub mod view;

pub use grid_pool::GridPool;
pub use pie_builder::{BoundsReport, PieBuilder, Projection};
pub use pipeline::{Pipeline, PipelineTasks};
pub use ring_buffer::{RingBuffer, SharedRing};
pub use slice_reducer::{SliceReducer, WindowTrigger};
pub use view::{display_grid, RingView};
