pub mod client;
pub mod session;

pub use client::BridgeClient;
pub use session::{BridgeSession, Enumeration, GroupAttrs, LightAttrs, SessionState, StreamClaimState};
