pub mod forwarder;
pub mod id_types;
pub mod keyframe;
pub mod media;
pub mod metrics;
pub mod renegotiate;
pub mod room;
pub mod session;
pub mod sfu;
pub mod signaling;
pub mod web;

pub use room::{Room, SessionHandle};
pub use sfu::Sfu;
pub use signaling::{SignalEvent, SignalWriter, SignalingMessage};

#[cfg(test)]
mod tests;
