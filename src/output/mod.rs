//! Audio backends implementing [`crate::session::AudioOutput`].
//!
//! - [`SimulatedOutput`]: silent, scriptable backend with a lifecycle log
//! - `RodioOutput` (feature `rodio-output`): real playback on the default device

pub mod simulated;

#[cfg(feature = "rodio-output")]
pub mod device;

pub use simulated::{Lifecycle, SimulatedHandle, SimulatedOutput};

#[cfg(feature = "rodio-output")]
pub use device::{RodioOutput, TrackLoader};
