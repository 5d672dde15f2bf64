pub mod call;
pub mod frame;
pub mod headers;
pub mod params;
pub mod request;
pub mod response;
pub mod timing;

pub use call::{NormalizedCall, Origin};
pub use frame::{Frame, RawFrame};
pub use headers::Headers;
pub use params::{QueryParams, QueryValue};
pub use request::RequestRecord;
pub use response::{ResponseRecord, Status};
pub use timing::{Checkpoint, Checkpoints, Phase, PhaseKind, Timing, compute_phases};
