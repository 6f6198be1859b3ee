//=========================================================================
// Input
//=========================================================================
//
// Raw device input: event vocabulary, the bounded producer queue, and
// the per-device accumulators that sensors poll.
//
// Nothing in this module reacts to input on its own. Events are queued
// by `InputSender`, drained once at the start of each controls tick, and
// folded into accumulators that only exist while some sensor needs them.
//
//=========================================================================

//=== Submodules ==========================================================

pub mod event;
pub mod accumulator;
pub(crate) mod event_collector;

//=== Public Exports ======================================================

pub use accumulator::{Accumulator, AccumulatorKey, ValueName};
pub use event::{DeviceClass, DeviceEvent, KeyCode, Modifiers, MouseButton, SurfaceId, TouchPoint};
pub use event_collector::{InputMessage, InputSender};
