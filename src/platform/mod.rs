//=========================================================================
// Platform Subsystem
//
// Bridges Winit window input into the controls input channel.
//
// Architecture:
// ```text
//  Main Thread (Winit):                 Controls owner thread:
//  ┌──────────────────────────┐        ┌──────────────────────┐
//  │  ApplicationHandler      │        │  Controls::update()  │
//  │   ↓ window_event()       │        │   ↓                  │
//  │  WinitInputBridge        │        │  EventCollector      │
//  │   ├─ InputProcessor      │        │   ↓                  │
//  │   │   └─ sticky mods     │        │  Accumulators        │
//  │   ↓                      │        │   ↓                  │
//  │  InputSender ────────────┼───────>│  Sensors / Manifolds │
//  └──────────────────────────┘        └──────────────────────┘
// ```
//
// One bridge per window: every event it forwards is tagged with the
// bridge's `SurfaceId`. The host keeps its own event loop and calls
// `handle_window_event` from `ApplicationHandler::window_event`.
//
// A full queue or a dropped `Controls` is logged and the event is lost;
// the window keeps running either way.
//
//=========================================================================

//=== Submodules ==========================================================

mod input_processor;

//=== External Crates =====================================================

use log::{trace, warn};
use winit::event::WindowEvent;

//=== Internal Imports ====================================================

use crate::core::error::ControlsError;
use crate::core::input::{DeviceEvent, InputSender, SurfaceId};
use input_processor::InputProcessor;

//=== WinitInputBridge ====================================================

/// Forwards the input events of one Winit window to [`Controls`](crate::Controls).
///
/// # Examples
///
/// ```
/// use aetheric_controls::prelude::*;
///
/// let controls = ControlsBuilder::new().build();
/// let bridge = WinitInputBridge::new(controls.input_sender(), SurfaceId::PRIMARY);
/// assert_eq!(bridge.surface(), SurfaceId::PRIMARY);
/// ```
pub struct WinitInputBridge {
    surface: SurfaceId,
    sender: InputSender,
    input_processor: InputProcessor,
    dropped: u64,
}

impl WinitInputBridge {
    //--- Construction -----------------------------------------------------

    pub fn new(sender: InputSender, surface: SurfaceId) -> Self {
        Self {
            surface,
            sender,
            input_processor: InputProcessor::new(),
            dropped: 0,
        }
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Events lost to a full or disconnected queue since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    //--- Event Handling ---------------------------------------------------

    /// Translates and forwards one window event.
    ///
    /// Returns `true` when the event was input-related and consumed
    /// (including modifier changes and filtered repeats), `false` for
    /// events the host should handle itself.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        let translated = match event {
            WindowEvent::ModifiersChanged(modifiers) => {
                self.input_processor.update_modifiers(modifiers.state());
                None
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.input_processor
                    .process_key(event.physical_key, event.state, event.repeat)
            }
            WindowEvent::MouseInput { state, button, .. } => {
                Some(self.input_processor.process_mouse_button(*button, *state))
            }
            WindowEvent::CursorMoved { position, .. } => {
                Some(self.input_processor.process_cursor(*position))
            }
            WindowEvent::MouseWheel { delta, .. } => self.input_processor.process_wheel(*delta),
            WindowEvent::Touch(touch) => Some(self.input_processor.process_touch(
                touch.id,
                touch.phase,
                touch.location,
            )),
            _ => return false,
        };

        if let Some(event) = translated {
            self.forward(event);
        }
        true
    }

    fn forward(&mut self, event: DeviceEvent) {
        trace!(target: "platform::input", "{:?} → {:?}", self.surface, event);

        match self.sender.send(self.surface, event) {
            Ok(()) => {}
            Err(ControlsError::InputDisconnected) => {
                self.dropped += 1;
                warn!(target: "platform::input", "Controls dropped, discarding window input");
            }
            Err(e) => {
                self.dropped += 1;
                warn!(target: "platform::input", "Dropped window input: {}", e);
            }
        }
    }
}

//=========================================================================
// Tests
//=========================================================================
