//! Control engine for a dual-layer hybrid digital synthesizer: parameter
//! graph/routing, the two-mode sequencer, the MIDI device layer, preset
//! lifecycle, and the event-router/timer substrate underneath all of it.
//!
//! The audio DSP engine, surface firmware, pixel-level GUI renderer, and
//! bank import/export/update/calibration are external collaborators,
//! reachable only through the contracts in `daw_bridge`/`gui_bridge`/
//! `surface_bridge`.

pub mod arp;
pub mod clock;
pub mod config;
pub mod context;
pub mod convert;
pub mod daw_bridge;
pub mod dispatch;
pub mod error;
pub mod gui_bridge;
pub mod midi_device;
pub mod param;
pub mod preset;
pub mod registry;
pub mod router;
pub mod sequencer;
pub mod surface_bridge;

pub use context::EngineContext;
pub use error::EngineError;
pub use param::Param;
pub use registry::Registry;
pub use router::EventRouter;
