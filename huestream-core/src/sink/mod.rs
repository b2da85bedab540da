//! The two frame consumers: a REST variant that emits PUTs and a streaming
//! variant that only mutates the Light Model for the Streaming Engine to
//! read.

pub mod rest;
pub mod stream;

pub use rest::RestSink;
pub use stream::StreamSink;

/// An sRGB triple with each channel in `0..=255`, one per LED position.
pub type RgbFrame = [(f64, f64, f64)];
