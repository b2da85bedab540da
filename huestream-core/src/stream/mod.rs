pub mod dtls;
pub mod engine;
pub mod protocol;

pub use engine::StreamingEngine;
pub use protocol::{build_frame, FrameLight};
