//=========================================================================
// Accumulator
//=========================================================================
//
// Per (device class, surface) demultiplexer of raw device events.
//
// Architecture:
//   DeviceEvent → digest() → device state (keys held, pointer, fingers…)
//                                ↓
//                       Sensor refresh polls state
//
// Tick lifecycle: digest()* → prepare() → [sensor refresh + callbacks]
//                 → finish_tick()
//
// Registration: every logical value ("keys", "wheel", …) carries a
// reference count. An event feeding a value with a zero count is dropped,
// mirroring the absence of a platform subscription for it.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::{HashMap, HashSet};

use log::trace;

//=== Internal Dependencies ===============================================

use super::event::{DeviceClass, DeviceEvent, KeyCode, MouseButton, SurfaceId, TouchPoint};
use crate::core::backend::{ObjectId, SceneBackend};

//=== AccumulatorKey ======================================================

/// Identifies one accumulator: a device class bound to a target surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccumulatorKey {
    pub device: DeviceClass,
    pub surface: SurfaceId,
}

impl AccumulatorKey {
    /// Creates a key, folding global devices onto the primary surface.
    pub fn new(device: DeviceClass, surface: SurfaceId) -> Self {
        let surface = if device.is_global() { SurfaceId::PRIMARY } else { surface };
        Self { device, surface }
    }
}

//=== ValueName ===========================================================

/// Logical value an accumulator can be subscribed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueName {
    /// Pressed-key table.
    Keys,
    /// Pressed mouse buttons.
    Buttons,
    /// Cursor location.
    Location,
    /// Wheel delta.
    Wheel,
    /// Active fingers.
    Touches,
    /// Object under pointer/finger on press (lazy pick).
    Selection,
    /// Device orientation angles.
    Orientation,
    /// Head-mounted device pose.
    Pose,
    /// Gamepad buttons and axes.
    Gamepad,
}

impl ValueName {
    /// Value fed by a device event, if any.
    fn of(event: &DeviceEvent) -> Option<Self> {
        match event {
            DeviceEvent::KeyDown { .. } | DeviceEvent::KeyUp { .. } => Some(Self::Keys),
            DeviceEvent::MouseButtonDown { .. } | DeviceEvent::MouseButtonUp { .. } => {
                Some(Self::Buttons)
            }
            DeviceEvent::MouseMoved { .. } => Some(Self::Location),
            DeviceEvent::MouseWheel { .. } => Some(Self::Wheel),
            DeviceEvent::TouchStarted(_)
            | DeviceEvent::TouchMoved(_)
            | DeviceEvent::TouchEnded { .. } => Some(Self::Touches),
            DeviceEvent::Orientation { .. } => Some(Self::Orientation),
            DeviceEvent::HmdPose { .. } => Some(Self::Pose),
            DeviceEvent::GamepadButton { .. }
            | DeviceEvent::GamepadAxis { .. }
            | DeviceEvent::GamepadDisconnected { .. } => Some(Self::Gamepad),
            DeviceEvent::Unidentified => None,
        }
    }
}

//=== AccumulatorLimits ===================================================

/// Configuration copied into every accumulator at creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AccumulatorLimits {
    pub wheel_notch_multiplier: f64,
    pub max_touches: usize,
}

//=== Device State ========================================================

#[derive(Debug, Default)]
pub(crate) struct PointerState {
    pub position: Option<(f64, f64)>,
    pub last_position: Option<(f64, f64)>,
    pub buttons_down: HashSet<MouseButton>,
    pub press_started: bool,
    pub press_position: (f64, f64),
    pub wheel: f64,
    pub picked: Option<Option<ObjectId>>,
}

impl PointerState {
    /// Movement since the previous tick.
    pub fn delta(&self) -> (f64, f64) {
        match (self.position, self.last_position) {
            (Some(curr), Some(last)) => (curr.0 - last.0, curr.1 - last.1),
            _ => (0.0, 0.0),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct TouchState {
    pub touches: Vec<TouchPoint>,
    pub last_touches: Vec<TouchPoint>,
    pub touch_started: bool,
    pub picked: Option<Option<ObjectId>>,
}

impl TouchState {
    fn last_of(&self, id: u64) -> Option<&TouchPoint> {
        self.last_touches.iter().find(|t| t.id == id)
    }

    /// Movement of the single panning finger since the previous tick.
    pub fn pan_delta(&self) -> (f64, f64) {
        if self.touches.len() != 1 {
            return (0.0, 0.0);
        }
        let curr = self.touches[0];
        match self.last_of(curr.id) {
            Some(last) => (curr.x - last.x, curr.y - last.y),
            None => (0.0, 0.0),
        }
    }

    /// Returns the first two fingers, now and last tick, if both were
    /// already down last tick.
    fn pinch_pair(&self) -> Option<([TouchPoint; 2], [TouchPoint; 2])> {
        if self.touches.len() < 2 {
            return None;
        }
        let (a, b) = (self.touches[0], self.touches[1]);
        let last_a = *self.last_of(a.id)?;
        let last_b = *self.last_of(b.id)?;
        Some(([a, b], [last_a, last_b]))
    }

    /// Change of the distance between the first two fingers.
    pub fn zoom_delta(&self) -> f64 {
        match self.pinch_pair() {
            Some((curr, last)) => finger_distance(&curr) - finger_distance(&last),
            None => 0.0,
        }
    }

    /// Change of the angle of the line through the first two fingers,
    /// in radians within `[-PI, PI]`.
    pub fn rotate_delta(&self) -> f64 {
        match self.pinch_pair() {
            Some((curr, last)) => {
                let delta = finger_angle(&curr) - finger_angle(&last);
                wrap_angle(delta)
            }
            None => 0.0,
        }
    }
}

fn finger_distance(pair: &[TouchPoint; 2]) -> f64 {
    let (dx, dy) = (pair[0].x - pair[1].x, pair[0].y - pair[1].y);
    (dx * dx + dy * dy).sqrt()
}

fn finger_angle(pair: &[TouchPoint; 2]) -> f64 {
    (pair[1].y - pair[0].y).atan2(pair[1].x - pair[0].x)
}

fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a < -PI {
        a += TAU;
    }
    a
}

#[derive(Debug, Default)]
pub(crate) struct OrientationState {
    pub angles: Option<[f64; 3]>,
    pub last_angles: Option<[f64; 3]>,
}

impl OrientationState {
    /// Angle change since the previous tick, per axis.
    pub fn delta(&self) -> [f64; 3] {
        match (self.angles, self.last_angles) {
            (Some(curr), Some(last)) => [curr[0] - last[0], curr[1] - last[1], curr[2] - last[2]],
            _ => [0.0; 3],
        }
    }

    /// Orientation as a quaternion `[x, y, z, w]` (Z-X'-Y'' intrinsic order,
    /// as reported by device orientation APIs).
    pub fn quat(&self) -> Option<[f64; 4]> {
        self.angles.map(euler_zxy_to_quat)
    }
}

fn euler_zxy_to_quat(angles: [f64; 3]) -> [f64; 4] {
    let half = |deg: f64| deg.to_radians() * 0.5;
    let (z, x, y) = (half(angles[0]), half(angles[1]), half(angles[2]));
    let (cz, sz) = (z.cos(), z.sin());
    let (cx, sx) = (x.cos(), x.sin());
    let (cy, sy) = (y.cos(), y.sin());

    [
        cz * sx * cy - sz * cx * sy,
        cz * cx * sy + sz * sx * cy,
        sz * cx * cy + cz * sx * sy,
        cz * cx * cy - sz * sx * sy,
    ]
}

#[derive(Debug, Default)]
pub(crate) struct HmdState {
    pub orientation: Option<[f64; 4]>,
    pub position: Option<[f64; 3]>,
}

#[derive(Debug, Default)]
pub(crate) struct GamepadState {
    pub buttons: HashMap<u8, f64>,
    pub axes: HashMap<u8, f64>,
}

/// Demultiplexed state, one shape per device family.
#[derive(Debug)]
pub(crate) enum DeviceState {
    Keyboard(HashSet<KeyCode>),
    Pointer(PointerState),
    Touch(TouchState),
    Orientation(OrientationState),
    Hmd(HmdState),
    Gamepad(GamepadState),
}

impl DeviceState {
    fn for_device(device: DeviceClass) -> Self {
        match device {
            DeviceClass::Keyboard => Self::Keyboard(HashSet::new()),
            DeviceClass::Mouse => Self::Pointer(PointerState::default()),
            DeviceClass::Touch => Self::Touch(TouchState::default()),
            DeviceClass::Gyro => Self::Orientation(OrientationState::default()),
            DeviceClass::Hmd => Self::Hmd(HmdState::default()),
            DeviceClass::Gamepad(_) => Self::Gamepad(GamepadState::default()),
        }
    }
}

//=== Accumulator =========================================================

/// Tick-polled state for one device class on one surface.
#[derive(Debug)]
pub struct Accumulator {
    key: AccumulatorKey,
    limits: AccumulatorLimits,
    registered: HashMap<ValueName, u32>,
    state: DeviceState,
}

impl Accumulator {
    pub(crate) fn new(key: AccumulatorKey, limits: AccumulatorLimits) -> Self {
        Self {
            key,
            limits,
            registered: HashMap::new(),
            state: DeviceState::for_device(key.device),
        }
    }

    /// Returns the key this accumulator is bound to.
    pub fn key(&self) -> AccumulatorKey {
        self.key
    }

    //--- Registration -----------------------------------------------------

    /// Increments the count for `name`.
    ///
    /// Returns `true` on the 0→1 transition (subscription must be created).
    pub(crate) fn register_value(&mut self, name: ValueName) -> bool {
        let count = self.registered.entry(name).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Decrements the count for `name`.
    ///
    /// Returns `true` on the 1→0 transition (subscription must be dropped).
    ///
    /// # Panics
    ///
    /// Panics when the count is already zero: registration is asymmetric.
    pub(crate) fn unregister_value(&mut self, name: ValueName) -> bool {
        let count = match self.registered.get_mut(&name) {
            Some(count) if *count > 0 => count,
            _ => panic!(
                "Accumulator {:?}: unregister of {:?} below zero",
                self.key, name
            ),
        };
        *count -= 1;

        if *count == 0 {
            self.registered.remove(&name);
            self.reset_value(name);
            true
        } else {
            false
        }
    }

    /// Returns the registration count for `name`.
    pub fn registration_count(&self, name: ValueName) -> u32 {
        self.registered.get(&name).copied().unwrap_or(0)
    }

    /// Returns `true` when no value is registered anymore.
    pub fn is_idle(&self) -> bool {
        self.registered.is_empty()
    }

    fn is_registered(&self, name: ValueName) -> bool {
        self.registered.contains_key(&name)
    }

    /// Drops state fed by an unsubscribed value so that a later
    /// subscription starts from neutral.
    fn reset_value(&mut self, name: ValueName) {
        match (&mut self.state, name) {
            (DeviceState::Keyboard(keys), ValueName::Keys) => keys.clear(),
            (DeviceState::Pointer(p), ValueName::Buttons) => {
                p.buttons_down.clear();
                p.press_started = false;
            }
            (DeviceState::Pointer(p), ValueName::Location) => {
                p.position = None;
                p.last_position = None;
            }
            (DeviceState::Pointer(p), ValueName::Wheel) => p.wheel = 0.0,
            (DeviceState::Pointer(p), ValueName::Selection) => p.picked = None,
            (DeviceState::Touch(t), ValueName::Touches) => *t = TouchState::default(),
            (DeviceState::Touch(t), ValueName::Selection) => t.picked = None,
            (DeviceState::Orientation(o), ValueName::Orientation) => {
                *o = OrientationState::default()
            }
            (DeviceState::Hmd(h), ValueName::Pose) => *h = HmdState::default(),
            (DeviceState::Gamepad(g), ValueName::Gamepad) => *g = GamepadState::default(),
            _ => {}
        }
    }

    //--- Event Digestion --------------------------------------------------

    /// Applies one raw event to the device state.
    ///
    /// Events for values without a subscription are dropped.
    pub(crate) fn digest(&mut self, event: &DeviceEvent) {
        let Some(name) = ValueName::of(event) else {
            return;
        };
        if !self.is_registered(name) {
            trace!(
                target: "controls::input",
                "{:?}: dropping {:?} (no subscription for {:?})",
                self.key, event, name
            );
            return;
        }

        let limits = self.limits;

        match (&mut self.state, event) {
            //--- Keyboard ----------------------------------------------------
            (DeviceState::Keyboard(keys), DeviceEvent::KeyDown { key, .. }) => {
                keys.insert(*key);
            }
            (DeviceState::Keyboard(keys), DeviceEvent::KeyUp { key, .. }) => {
                keys.remove(key);
            }

            //--- Pointer -----------------------------------------------------
            (DeviceState::Pointer(p), DeviceEvent::MouseButtonDown { button, .. }) => {
                if p.buttons_down.insert(*button) {
                    p.press_started = true;
                    p.press_position = p.position.unwrap_or((0.0, 0.0));
                }
            }
            (DeviceState::Pointer(p), DeviceEvent::MouseButtonUp { button, .. }) => {
                p.buttons_down.remove(button);
            }
            (DeviceState::Pointer(p), DeviceEvent::MouseMoved { x, y }) => {
                if p.position.is_none() {
                    p.last_position = Some((*x, *y));
                }
                p.position = Some((*x, *y));
            }
            (DeviceState::Pointer(p), DeviceEvent::MouseWheel { delta }) => {
                p.wheel += delta * limits.wheel_notch_multiplier;
            }

            //--- Touch -------------------------------------------------------
            (DeviceState::Touch(t), DeviceEvent::TouchStarted(point)) => {
                if t.touches.iter().any(|f| f.id == point.id) {
                    return;
                }
                if t.touches.len() >= limits.max_touches {
                    trace!(
                        target: "controls::input",
                        "{:?}: finger limit {} reached, ignoring touch {}",
                        self.key, limits.max_touches, point.id
                    );
                    return;
                }
                t.touches.push(*point);
                t.touch_started = true;
            }
            (DeviceState::Touch(t), DeviceEvent::TouchMoved(point)) => {
                if let Some(finger) = t.touches.iter_mut().find(|f| f.id == point.id) {
                    *finger = *point;
                }
            }
            (DeviceState::Touch(t), DeviceEvent::TouchEnded { id }) => {
                t.touches.retain(|f| f.id != *id);
            }

            //--- Orientation / HMD -------------------------------------------
            (DeviceState::Orientation(o), DeviceEvent::Orientation { alpha, beta, gamma }) => {
                let angles = [*alpha, *beta, *gamma];
                if o.angles.is_none() {
                    o.last_angles = Some(angles);
                }
                o.angles = Some(angles);
            }
            (DeviceState::Hmd(h), DeviceEvent::HmdPose { orientation, position }) => {
                h.orientation = Some(*orientation);
                h.position = Some(*position);
            }

            //--- Gamepad -----------------------------------------------------
            (DeviceState::Gamepad(g), DeviceEvent::GamepadButton { button, value, .. }) => {
                g.buttons.insert(*button, *value);
            }
            (DeviceState::Gamepad(g), DeviceEvent::GamepadAxis { axis, value, .. }) => {
                g.axes.insert(*axis, *value);
            }
            (DeviceState::Gamepad(g), DeviceEvent::GamepadDisconnected { .. }) => {
                *g = GamepadState::default();
            }

            (_, other) => {
                trace!(
                    target: "controls::input",
                    "{:?}: event {:?} does not belong to this device",
                    self.key, other
                );
            }
        }
    }

    //--- Tick Phases ------------------------------------------------------

    /// Resolves lazy per-tick lookups before any sensor refresh.
    ///
    /// The object under the pointer/finger is picked at most once per tick,
    /// and only when a press started and a selection is subscribed.
    pub(crate) fn prepare(&mut self, scene: &mut dyn SceneBackend) {
        let surface = self.key.surface;
        let wants_pick = self.is_registered(ValueName::Selection);

        match &mut self.state {
            DeviceState::Pointer(p) if wants_pick && p.press_started && p.picked.is_none() => {
                let (x, y) = p.press_position;
                p.picked = Some(scene.pick_object(surface, x, y));
            }
            DeviceState::Touch(t) if wants_pick && t.touch_started && t.picked.is_none() => {
                if let Some(first) = t.touches.first() {
                    t.picked = Some(scene.pick_object(surface, first.x, first.y));
                }
            }
            _ => {}
        }
    }

    /// Advances double-buffered state after all callbacks of the tick.
    pub(crate) fn finish_tick(&mut self) {
        match &mut self.state {
            DeviceState::Pointer(p) => {
                p.last_position = p.position;
                p.wheel = 0.0;
                p.press_started = false;
                p.picked = None;
            }
            DeviceState::Touch(t) => {
                t.last_touches.clone_from(&t.touches);
                t.touch_started = false;
                t.picked = None;
            }
            DeviceState::Orientation(o) => o.last_angles = o.angles,
            DeviceState::Keyboard(_) | DeviceState::Hmd(_) | DeviceState::Gamepad(_) => {}
        }
    }

    //--- Query API --------------------------------------------------------

    /// Returns `true` while `key` is held (keyboard accumulators only).
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        matches!(&self.state, DeviceState::Keyboard(keys) if keys.contains(&key))
    }

    pub(crate) fn pointer(&self) -> Option<&PointerState> {
        match &self.state {
            DeviceState::Pointer(p) => Some(p),
            _ => None,
        }
    }

    pub(crate) fn touch(&self) -> Option<&TouchState> {
        match &self.state {
            DeviceState::Touch(t) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn orientation(&self) -> Option<&OrientationState> {
        match &self.state {
            DeviceState::Orientation(o) => Some(o),
            _ => None,
        }
    }

    pub(crate) fn hmd(&self) -> Option<&HmdState> {
        match &self.state {
            DeviceState::Hmd(h) => Some(h),
            _ => None,
        }
    }

    pub(crate) fn gamepad(&self) -> Option<&GamepadState> {
        match &self.state {
            DeviceState::Gamepad(g) => Some(g),
            _ => None,
        }
    }

    /// Object resolved under the pointer or first finger this tick.
    ///
    /// Outer `None`: nothing was pressed (no resolution this tick).
    pub(crate) fn picked(&self) -> Option<Option<ObjectId>> {
        match &self.state {
            DeviceState::Pointer(p) => p.picked,
            DeviceState::Touch(t) => t.picked,
            _ => None,
        }
    }

    /// Returns `true` while any button or finger is down.
    pub(crate) fn is_pressing(&self) -> bool {
        match &self.state {
            DeviceState::Pointer(p) => !p.buttons_down.is_empty(),
            DeviceState::Touch(t) => !t.touches.is_empty(),
            _ => false,
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
