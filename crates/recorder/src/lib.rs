pub mod collector;
pub mod recorder;

pub use collector::{Collect, CompositeCollector, RecorderCollector};
pub use recorder::Recorder;
