//=========================================================================
// Input Processor
//=========================================================================
//
// Converts Winit window input into controls `DeviceEvent`s.
//
// Architecture:
//   WindowEvent → InputProcessor → DeviceEvent → InputSender
//
// Stateful modifier tracking: caches modifier state from ModifiersChanged
// events and applies it to all subsequent key/button events. Unmapped keys
// (F-keys, media keys, exotic layouts) and key repeats are filtered
// (returns None).
//
//=========================================================================

//=== External Dependencies ===============================================

use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, TouchPhase},
    keyboard::{KeyCode as WinitKeyCode, ModifiersState, PhysicalKey},
};

//=== Internal Dependencies ===============================================

use crate::core::input::{DeviceEvent, KeyCode, Modifiers, MouseButton, TouchPoint};

/// Raw wheel units per line, matching the DOM/Win32 notch size.
pub(crate) const WHEEL_UNITS_PER_LINE: f64 = 120.0;

//=== InputProcessor ======================================================

/// Converts Winit input to device events with sticky modifier tracking.
pub(crate) struct InputProcessor {
    current_modifiers: Modifiers,
}

impl InputProcessor {
    //--- Construction -----------------------------------------------------

    pub(crate) fn new() -> Self {
        Self {
            current_modifiers: Modifiers::NONE,
        }
    }

    //--- Modifier State Management ----------------------------------------

    /// Updates cached modifier state (applied to subsequent events).
    pub(crate) fn update_modifiers(&mut self, modifiers_state: ModifiersState) {
        self.current_modifiers = Modifiers::from(modifiers_state);
    }

    pub(crate) fn current_modifiers(&self) -> Modifiers {
        self.current_modifiers
    }

    //--- Event Processing -------------------------------------------------

    /// Key press or release. Repeats and unmapped keys yield `None`.
    pub(crate) fn process_key(
        &self,
        physical_key: PhysicalKey,
        state: ElementState,
        repeat: bool,
    ) -> Option<DeviceEvent> {
        if repeat {
            return None;
        }

        let key = match physical_key {
            PhysicalKey::Code(code) => KeyCode::from(code),
            PhysicalKey::Unidentified(_) => return None,
        };
        if key == KeyCode::Unidentified {
            return None;
        }

        let modifiers = self.current_modifiers;
        Some(match state {
            ElementState::Pressed => DeviceEvent::KeyDown { key, modifiers },
            ElementState::Released => DeviceEvent::KeyUp { key, modifiers },
        })
    }

    pub(crate) fn process_mouse_button(
        &self,
        button: WinitMouseButton,
        state: ElementState,
    ) -> DeviceEvent {
        let button = MouseButton::from(button);
        let modifiers = self.current_modifiers;

        match state {
            ElementState::Pressed => DeviceEvent::MouseButtonDown { button, modifiers },
            ElementState::Released => DeviceEvent::MouseButtonUp { button, modifiers },
        }
    }

    /// Cursor position in surface pixels.
    pub(crate) fn process_cursor(&self, position: PhysicalPosition<f64>) -> DeviceEvent {
        DeviceEvent::MouseMoved {
            x: position.x,
            y: position.y,
        }
    }

    /// Vertical scroll in raw wheel units. Horizontal-only scrolls yield `None`.
    pub(crate) fn process_wheel(&self, delta: MouseScrollDelta) -> Option<DeviceEvent> {
        let delta = match delta {
            MouseScrollDelta::LineDelta(_, lines) => f64::from(lines) * WHEEL_UNITS_PER_LINE,
            MouseScrollDelta::PixelDelta(pixels) => pixels.y,
        };

        (delta != 0.0).then_some(DeviceEvent::MouseWheel { delta })
    }

    pub(crate) fn process_touch(
        &self,
        id: u64,
        phase: TouchPhase,
        location: PhysicalPosition<f64>,
    ) -> DeviceEvent {
        let point = TouchPoint {
            id,
            x: location.x,
            y: location.y,
        };

        match phase {
            TouchPhase::Started => DeviceEvent::TouchStarted(point),
            TouchPhase::Moved => DeviceEvent::TouchMoved(point),
            TouchPhase::Ended | TouchPhase::Cancelled => DeviceEvent::TouchEnded { id },
        }
    }
}

//=========================================================================
// Winit Conversions
//=========================================================================

/// Winit normalizes platform keys (macOS Cmd → Ctrl, Option → Alt).
impl From<ModifiersState> for Modifiers {
    fn from(state: ModifiersState) -> Self {
        Self {
            shift: state.shift_key(),
            ctrl: state.control_key(),
            alt: state.alt_key(),
        }
    }
}

/// Converts Winit physical key codes to engine key codes.
///
/// Unmapped keys return `KeyCode::Unidentified`.
impl From<WinitKeyCode> for KeyCode {
    fn from(code: WinitKeyCode) -> Self {
        use WinitKeyCode::*;
        match code {
            //--- Digits -------------------------------------------------------

            Digit0 => KeyCode::Digit0,
            Digit1 => KeyCode::Digit1,
            Digit2 => KeyCode::Digit2,
            Digit3 => KeyCode::Digit3,
            Digit4 => KeyCode::Digit4,
            Digit5 => KeyCode::Digit5,
            Digit6 => KeyCode::Digit6,
            Digit7 => KeyCode::Digit7,
            Digit8 => KeyCode::Digit8,
            Digit9 => KeyCode::Digit9,

            //--- Letters ------------------------------------------------------

            KeyA => KeyCode::KeyA,
            KeyB => KeyCode::KeyB,
            KeyC => KeyCode::KeyC,
            KeyD => KeyCode::KeyD,
            KeyE => KeyCode::KeyE,
            KeyF => KeyCode::KeyF,
            KeyG => KeyCode::KeyG,
            KeyH => KeyCode::KeyH,
            KeyI => KeyCode::KeyI,
            KeyJ => KeyCode::KeyJ,
            KeyK => KeyCode::KeyK,
            KeyL => KeyCode::KeyL,
            KeyM => KeyCode::KeyM,
            KeyN => KeyCode::KeyN,
            KeyO => KeyCode::KeyO,
            KeyP => KeyCode::KeyP,
            KeyQ => KeyCode::KeyQ,
            KeyR => KeyCode::KeyR,
            KeyS => KeyCode::KeyS,
            KeyT => KeyCode::KeyT,
            KeyU => KeyCode::KeyU,
            KeyV => KeyCode::KeyV,
            KeyW => KeyCode::KeyW,
            KeyX => KeyCode::KeyX,
            KeyY => KeyCode::KeyY,
            KeyZ => KeyCode::KeyZ,

            //--- Numpad -------------------------------------------------------

            Numpad0 => KeyCode::Numpad0,
            Numpad1 => KeyCode::Numpad1,
            Numpad2 => KeyCode::Numpad2,
            Numpad3 => KeyCode::Numpad3,
            Numpad4 => KeyCode::Numpad4,
            Numpad5 => KeyCode::Numpad5,
            Numpad6 => KeyCode::Numpad6,
            Numpad7 => KeyCode::Numpad7,
            Numpad8 => KeyCode::Numpad8,
            Numpad9 => KeyCode::Numpad9,

            //--- Arrows -------------------------------------------------------

            ArrowUp => KeyCode::ArrowUp,
            ArrowDown => KeyCode::ArrowDown,
            ArrowLeft => KeyCode::ArrowLeft,
            ArrowRight => KeyCode::ArrowRight,

            //--- Special ------------------------------------------------------

            Space => KeyCode::Space,
            Enter => KeyCode::Enter,
            Escape => KeyCode::Escape,
            Tab => KeyCode::Tab,
            Backspace => KeyCode::Backspace,
            Delete => KeyCode::Delete,
            ShiftLeft => KeyCode::ShiftLeft,
            ShiftRight => KeyCode::ShiftRight,
            ControlLeft => KeyCode::ControlLeft,
            ControlRight => KeyCode::ControlRight,
            AltLeft => KeyCode::AltLeft,
            AltRight => KeyCode::AltRight,

            _ => KeyCode::Unidentified,
        }
    }
}

/// Left/Right/Middle mapped directly; Back/Forward/Other → Other.
impl From<WinitMouseButton> for MouseButton {
    fn from(button: WinitMouseButton) -> Self {
        match button {
            WinitMouseButton::Left => MouseButton::Left,
            WinitMouseButton::Right => MouseButton::Right,
            WinitMouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Other,
        }
    }
}

//=========================================================================
// Tests
//=========================================================================
