//! Color pipeline, bridge control plane and Entertainment streaming engine
//! for Philips Hue, wired together behind [`device::HueDevice`]'s outward
//! contract.

pub mod bridge;
pub mod color;
pub mod config;
pub mod device;
pub mod error;
pub mod light;
pub mod sink;
pub mod stream;

pub use color::{CiColor, CiColorTriangle};
pub use config::Config;
pub use device::HueDevice;
pub use error::{Error, Event, Result};
pub use light::PhilipsHueLight;
