//=========================================================================
// Device Event Types
//=========================================================================
//
// Engine-side representation of raw device input.
//
// Platform layers (Winit, a browser shell, a sensor daemon) translate
// their native callbacks into `DeviceEvent`s and queue them for the
// controls core. Nothing here is applied immediately: events are consumed
// by accumulators at tick boundaries only.
//
// Event Flow:
// ```text
// Platform Layer (Winit, gyro, gamepad poller)
//         ↓
//    DeviceEvent (this module) ── InputSender ──┐
//                                               ↓
//    Accumulator (per device class + surface) ← EventCollector
//         ↓
//    Sensor refresh → Manifold → callback
// ```
//
//=========================================================================

//=== DeviceClass =========================================================

/// Physical device family an event or sensor belongs to.
///
/// Gamepads are addressed by slot (0-3). Orientation and head-mounted
/// devices are global: they always live on [`SurfaceId::PRIMARY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Keyboard,
    Mouse,
    Touch,
    Gyro,
    Hmd,
    Gamepad(u8),
}

impl DeviceClass {
    /// Number of gamepad slots tracked by the engine.
    pub const GAMEPAD_SLOTS: u8 = 4;

    /// Returns `true` for devices that are not bound to a target surface.
    pub fn is_global(self) -> bool {
        matches!(self, Self::Gyro | Self::Hmd | Self::Gamepad(_))
    }
}

//=== SurfaceId ===========================================================

/// Identifies the target surface (window, canvas, viewport) that produced
/// pointer, keyboard or touch input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

impl SurfaceId {
    /// The main surface; also used for all global devices.
    pub const PRIMARY: Self = Self(0);
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::PRIMARY
    }
}

//=== MouseButton =========================================================

/// Physical mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Primary button (typically left).
    Left,

    /// Secondary button (typically right).
    Right,

    /// Middle button (wheel click).
    Middle,

    /// Any other button (side buttons, thumb buttons, macro keys).
    Other,
}

//=== KeyCode =============================================================

/// Physical keyboard key identifier.
///
/// Represents the physical key location, not the character produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    //--- Numeric Keys -----------------------------------------------------

    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    //--- Alphabetic Keys --------------------------------------------------

    KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI,
    KeyJ, KeyK, KeyL, KeyM, KeyN, KeyO, KeyP, KeyQ, KeyR,
    KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,

    //--- Numpad Keys ------------------------------------------------------

    Numpad0, Numpad1, Numpad2, Numpad3, Numpad4,
    Numpad5, Numpad6, Numpad7, Numpad8, Numpad9,

    //--- Arrow Keys -------------------------------------------------------

    ArrowDown,
    ArrowLeft,
    ArrowRight,
    ArrowUp,

    //--- Special Keys -----------------------------------------------------

    Space,
    Enter,
    Escape,
    Tab,
    Backspace,
    Delete,
    ShiftLeft,
    ShiftRight,
    ControlLeft,
    ControlRight,
    AltLeft,
    AltRight,

    /// Fallback for keys not explicitly mapped by the input layer.
    Unidentified,
}

//=== Modifiers ===========================================================

/// Modifier key state (Shift, Ctrl, Alt).
///
/// Left and right variants are not distinguished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    /// No modifiers held.
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
    };

    /// Shift only.
    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
        alt: false,
    };

    /// Ctrl only.
    pub const CTRL: Self = Self {
        shift: false,
        ctrl: true,
        alt: false,
    };

    /// Alt only.
    pub const ALT: Self = Self {
        shift: false,
        ctrl: false,
        alt: true,
    };
}

//=== TouchPoint ==========================================================

/// One active finger on a touch surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    /// Platform finger identifier, stable for the duration of a touch.
    pub id: u64,
    pub x: f64,
    pub y: f64,
}

//=== DeviceEvent =========================================================

/// Raw device sample queued by a platform layer.
///
/// # Units
///
/// - Pointer and touch coordinates: surface pixels, top-left origin
/// - `MouseWheel::delta`: raw platform units (120 per notch, positive
///   away from the user); scaled by the configured notch multiplier
/// - Orientation angles: degrees (alpha, beta, gamma)
/// - Quaternions: `[x, y, z, w]`
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Key pressed down.
    KeyDown { key: KeyCode, modifiers: Modifiers },

    /// Key released.
    KeyUp { key: KeyCode, modifiers: Modifiers },

    /// Mouse button pressed.
    MouseButtonDown { button: MouseButton, modifiers: Modifiers },

    /// Mouse button released.
    MouseButtonUp { button: MouseButton, modifiers: Modifiers },

    /// Cursor moved to a new position.
    MouseMoved { x: f64, y: f64 },

    /// Wheel scrolled.
    MouseWheel { delta: f64 },

    /// A finger touched the surface.
    TouchStarted(TouchPoint),

    /// A finger moved.
    TouchMoved(TouchPoint),

    /// A finger left the surface (or the touch was cancelled).
    TouchEnded { id: u64 },

    /// Device orientation sample in degrees.
    Orientation { alpha: f64, beta: f64, gamma: f64 },

    /// Head-mounted device pose sample.
    HmdPose { orientation: [f64; 4], position: [f64; 3] },

    /// Gamepad button state (analog buttons report 0.0..=1.0).
    GamepadButton { slot: u8, button: u8, value: f64 },

    /// Gamepad axis state (-1.0..=1.0).
    GamepadAxis { slot: u8, axis: u8, value: f64 },

    /// Gamepad unplugged; all its state returns to neutral.
    GamepadDisconnected { slot: u8 },

    /// Unrecognized or unsupported event.
    Unidentified,
}

impl DeviceEvent {
    /// Returns the device family this event belongs to, if any.
    pub fn device_class(&self) -> Option<DeviceClass> {
        match self {
            Self::KeyDown { .. } | Self::KeyUp { .. } => Some(DeviceClass::Keyboard),
            Self::MouseButtonDown { .. }
            | Self::MouseButtonUp { .. }
            | Self::MouseMoved { .. }
            | Self::MouseWheel { .. } => Some(DeviceClass::Mouse),
            Self::TouchStarted(_) | Self::TouchMoved(_) | Self::TouchEnded { .. } => {
                Some(DeviceClass::Touch)
            }
            Self::Orientation { .. } => Some(DeviceClass::Gyro),
            Self::HmdPose { .. } => Some(DeviceClass::Hmd),
            Self::GamepadButton { slot, .. }
            | Self::GamepadAxis { slot, .. }
            | Self::GamepadDisconnected { slot } => Some(DeviceClass::Gamepad(*slot)),
            Self::Unidentified => None,
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
