//=========================================================================
// Sensor
//=========================================================================
//
// Atomic signal sources polled once per tick.
//
// Architecture:
//   Accumulator / timeline / physics probe / scene
//                    ↓
//   Sensor::refresh() (once per tick, stamped) → value + payload
//                    ↓
//   Manifold logic (read-only)
//                    ↓
//   Sensor::discharge() (transient kinds only, after every callback)
//
// A sensor is created by a `create_*_sensor` factory and stays inert until
// the first manifold references it. Activation registers the accumulator
// values it reads (or attaches its physics probe); the last manifold
// release undoes exactly that.
//
//=========================================================================

//=== Submodules ==========================================================

mod factory;
mod refresh;

pub(crate) use refresh::RefreshContext;

//=== External Dependencies ===============================================

use std::fmt;

//=== Internal Dependencies ===============================================

use crate::core::backend::{CollisionHit, ObjectId, ProbeId, ProbeRequest, RayHit, SceneBackend};
use crate::core::input::{AccumulatorKey, DeviceClass, KeyCode, MouseButton, SurfaceId, ValueName};
use crate::core::manifold::ManifoldHandle;

//=== SensorHandle ========================================================

/// Stable reference to a sensor in the controls arena.
///
/// Handles are invalidated when the last manifold referencing the sensor
/// is removed, and by `Controls::reset`; using one afterwards reports [`ControlsError::StaleSensorHandle`](crate::core::error::ControlsError).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorHandle {
    pub(crate) index: usize,
    pub(crate) epoch: u32,
}

//=== Parameter Types =====================================================

/// Axis selector for pointer and touch movement sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveAxis {
    X,
    Y,
    /// Length of the movement vector.
    #[default]
    XY,
}

impl MoveAxis {
    fn select(self, (dx, dy): (f64, f64)) -> f64 {
        match self {
            Self::X => dx,
            Self::Y => dy,
            Self::XY => (dx * dx + dy * dy).sqrt(),
        }
    }
}

/// Touch gesture a touch sensor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchGesture {
    Pan,
    Zoom,
    Rotate,
    Tap,
}

//=== SensorPayload =======================================================

/// Kind-specific structured sample attached to a sensor value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorPayload {
    /// Pointer coordinates (mouse click sensors).
    Pointer { x: f64, y: f64 },

    /// Gesture and the coordinates of its anchor point (first finger,
    /// or the midpoint of a two-finger gesture).
    Touch { gesture: TouchGesture, x: f64, y: f64 },

    Collision(CollisionHit),

    Ray(RayHit),

    /// Instantaneous (unsmoothed) velocities.
    Motion { linear: f64, angular: f64 },

    /// Instantaneous vertical speed.
    VerticalVelocity(f64),

    /// Orientation angles or angle deltas (alpha, beta, gamma), or a position.
    Vector([f64; 3]),

    /// Quaternion `[x, y, z, w]`.
    Quat([f64; 4]),
}

//=== Kind State ==========================================================

/// Last sample and smoothed velocities of a motion sensor.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MotionState {
    pub object: ObjectId,
    pub threshold: f64,
    pub rotation_threshold: f64,
    pub trans_last: [f64; 3],
    pub quat_last: [f64; 4],
    pub avg_linear: f64,
    pub avg_angular: f64,
}

/// Last sample and smoothed speed of a vertical velocity sensor.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VerticalState {
    pub object: ObjectId,
    pub threshold: f64,
    pub height_last: f64,
    pub avg_vertical: f64,
}

/// Period and reset time of a timer sensor.
///
/// A negative (or negative-zero) period marks an expired one-shot timer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TimerState {
    pub period: f64,
    pub repeat: bool,
    pub time_last: f64,
}

impl TimerState {
    pub fn is_expired(&self) -> bool {
        self.period.is_sign_negative()
    }
}

/// Value function of a callback sensor: `f(timeline, elapsed) -> value`.
pub type SensorFn = Box<dyn FnMut(f64, f64) -> f64>;

//=== SensorKind ==========================================================

/// Closed set of sensor kinds, each carrying its own parameters and
/// per-kind memory.
pub(crate) enum SensorKind {
    //--- Generic ----------------------------------------------------------
    Custom { target: f64 },
    Callback(SensorFn),

    //--- Time -------------------------------------------------------------
    Timer(TimerState),
    Elapsed { time_last: Option<f64> },
    Timeline,

    //--- Keyboard / Pointer -----------------------------------------------
    Keyboard { key: KeyCode, surface: SurfaceId },
    MouseClick { button: Option<MouseButton>, surface: SurfaceId },
    MouseWheel { surface: SurfaceId },
    MouseMove { axis: MoveAxis, surface: SurfaceId },

    //--- Touch ------------------------------------------------------------
    TouchMove { axis: MoveAxis, surface: SurfaceId },
    TouchZoom { surface: SurfaceId },
    TouchRotate { surface: SurfaceId },
    TouchTap { surface: SurfaceId },

    //--- Physics Probes ---------------------------------------------------
    Collision {
        object: ObjectId,
        collision_id: Option<String>,
        probe: Option<ProbeId>,
    },
    CollisionImpulse {
        object: ObjectId,
        probe: Option<ProbeId>,
    },
    Ray {
        object: ObjectId,
        from: [f64; 3],
        to: [f64; 3],
        local: bool,
        collision_id: Option<String>,
        binary: bool,
        probe: Option<ProbeId>,
    },

    //--- Scene ------------------------------------------------------------
    Motion(MotionState),
    VerticalVelocity(VerticalState),
    Selection {
        object: ObjectId,
        auto_release: bool,
        surface: SurfaceId,
        selected: bool,
    },

    //--- Optional Devices -------------------------------------------------
    GyroDelta,
    GyroAngles,
    GyroQuat,
    HmdQuat,
    HmdPosition,
    GamepadButton { slot: u8, button: u8 },
    GamepadAxis { slot: u8, axis: u8 },
}

impl SensorKind {
    /// Short kind name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Custom { .. } => "custom",
            Self::Callback(_) => "callback",
            Self::Timer(_) => "timer",
            Self::Elapsed { .. } => "elapsed",
            Self::Timeline => "timeline",
            Self::Keyboard { .. } => "keyboard",
            Self::MouseClick { .. } => "mouse_click",
            Self::MouseWheel { .. } => "mouse_wheel",
            Self::MouseMove { .. } => "mouse_move",
            Self::TouchMove { .. } => "touch_move",
            Self::TouchZoom { .. } => "touch_zoom",
            Self::TouchRotate { .. } => "touch_rotate",
            Self::TouchTap { .. } => "touch_tap",
            Self::Collision { .. } => "collision",
            Self::CollisionImpulse { .. } => "collision_impulse",
            Self::Ray { .. } => "ray",
            Self::Motion(_) => "motion",
            Self::VerticalVelocity(_) => "vertical_velocity",
            Self::Selection { .. } => "selection",
            Self::GyroDelta => "gyro_delta",
            Self::GyroAngles => "gyro_angles",
            Self::GyroQuat => "gyro_quat",
            Self::HmdQuat => "hmd_quat",
            Self::HmdPosition => "hmd_position",
            Self::GamepadButton { .. } => "gamepad_button",
            Self::GamepadAxis { .. } => "gamepad_axis",
        }
    }

    /// Device the kind depends on, for kinds backed by optional hardware.
    pub fn optional_device(&self) -> Option<DeviceClass> {
        match self {
            Self::GyroDelta | Self::GyroAngles | Self::GyroQuat => Some(DeviceClass::Gyro),
            Self::HmdQuat | Self::HmdPosition => Some(DeviceClass::Hmd),
            Self::GamepadButton { slot, .. } | Self::GamepadAxis { slot, .. } => {
                Some(DeviceClass::Gamepad(*slot))
            }
            _ => None,
        }
    }

    /// Delta-like kinds reset to neutral after every callback of a tick.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::MouseWheel { .. }
            | Self::MouseMove { .. }
            | Self::TouchMove { .. }
            | Self::TouchZoom { .. }
            | Self::TouchRotate { .. }
            | Self::TouchTap { .. }
            | Self::GyroDelta => true,
            // Fired timers only; an idle timer is already neutral
            Self::Timer(_) => true,
            _ => false,
        }
    }

    /// Accumulator values read by this kind while live.
    pub fn inputs(&self) -> Vec<(AccumulatorKey, ValueName)> {
        use DeviceClass::{Gamepad, Gyro, Hmd, Keyboard, Mouse, Touch};

        let at = |device, surface, value| (AccumulatorKey::new(device, surface), value);
        let global = |device, value| (AccumulatorKey::new(device, SurfaceId::PRIMARY), value);

        match self {
            Self::Keyboard { surface, .. } => vec![at(Keyboard, *surface, ValueName::Keys)],
            Self::MouseClick { surface, .. } => vec![
                at(Mouse, *surface, ValueName::Buttons),
                at(Mouse, *surface, ValueName::Location),
            ],
            Self::MouseWheel { surface } => vec![at(Mouse, *surface, ValueName::Wheel)],
            Self::MouseMove { surface, .. } => vec![at(Mouse, *surface, ValueName::Location)],
            Self::TouchMove { surface, .. }
            | Self::TouchZoom { surface }
            | Self::TouchRotate { surface }
            | Self::TouchTap { surface } => vec![at(Touch, *surface, ValueName::Touches)],
            Self::Selection { surface, .. } => vec![
                at(Mouse, *surface, ValueName::Buttons),
                at(Mouse, *surface, ValueName::Location),
                at(Mouse, *surface, ValueName::Selection),
                at(Touch, *surface, ValueName::Touches),
                at(Touch, *surface, ValueName::Selection),
            ],
            Self::GyroDelta | Self::GyroAngles | Self::GyroQuat => {
                vec![global(Gyro, ValueName::Orientation)]
            }
            Self::HmdQuat | Self::HmdPosition => vec![global(Hmd, ValueName::Pose)],
            Self::GamepadButton { slot, .. } | Self::GamepadAxis { slot, .. } => {
                vec![global(Gamepad(*slot), ValueName::Gamepad)]
            }
            _ => Vec::new(),
        }
    }

    /// Physics probe backing this kind, if any.
    pub fn probe_request(&self) -> Option<ProbeRequest> {
        match self {
            Self::Collision { object, collision_id, .. } => Some(ProbeRequest::Contact {
                object: *object,
                collision_id: collision_id.clone(),
            }),
            Self::CollisionImpulse { object, .. } => {
                Some(ProbeRequest::Impulse { object: *object })
            }
            Self::Ray { object, from, to, local, collision_id, .. } => Some(ProbeRequest::Ray {
                object: *object,
                from: *from,
                to: *to,
                local: *local,
                collision_id: collision_id.clone(),
            }),
            _ => None,
        }
    }

    /// Slot holding the attached probe id, for probe kinds.
    pub fn probe_slot(&mut self) -> Option<&mut Option<ProbeId>> {
        match self {
            Self::Collision { probe, .. }
            | Self::CollisionImpulse { probe, .. }
            | Self::Ray { probe, .. } => Some(probe),
            _ => None,
        }
    }
}

impl fmt::Debug for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//=== Sensor ==============================================================

/// One arena entry: kind, current sample and the manifolds reading it.
#[derive(Debug)]
pub struct Sensor {
    pub(crate) kind: SensorKind,
    pub(crate) value: f64,
    pub(crate) payload: Option<SensorPayload>,
    /// `false` when the backing device is absent; the sensor stays neutral.
    pub(crate) available: bool,
    /// Subscriptions and probes are held.
    pub(crate) active: bool,
    pub(crate) users: Vec<ManifoldHandle>,
    pub(crate) refreshed_at: Option<u64>,
}

impl Sensor {
    pub(crate) fn new(kind: SensorKind, available: bool) -> Self {
        let value = match &kind {
            SensorKind::Custom { target } => *target,
            _ => 0.0,
        };
        Self {
            kind,
            value,
            payload: None,
            available,
            active: false,
            users: Vec::new(),
            refreshed_at: None,
        }
    }

    /// Current sample.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Current structured sample, if the kind produces one.
    pub fn payload(&self) -> Option<SensorPayload> {
        self.payload
    }

    /// Returns `true` while at least one manifold references the sensor.
    pub fn is_live(&self) -> bool {
        !self.users.is_empty()
    }

    /// Number of manifold references.
    pub fn users(&self) -> usize {
        self.users.len()
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Resets a transient sample to neutral.
    pub(crate) fn discharge(&mut self) {
        if self.kind.is_transient() {
            self.value = 0.0;
        }
    }

    /// Drops the current sample when the sensor goes dormant.
    pub(crate) fn reset_sample(&mut self) {
        self.value = match &self.kind {
            SensorKind::Custom { target } => *target,
            _ => 0.0,
        };
        self.payload = None;
        self.refreshed_at = None;
    }

    /// Restarts per-kind history when the sensor goes live, so the first
    /// sample after a dormant period is not measured against stale state.
    ///
    /// Timers count their period from `timeline`; an expired one-shot timer
    /// stays expired.
    pub(crate) fn reseed(&mut self, timeline: f64, scene: &dyn SceneBackend) {
        match &mut self.kind {
            SensorKind::Timer(timer) => timer.time_last = timeline,
            SensorKind::Elapsed { time_last } => *time_last = None,
            SensorKind::Motion(motion) => {
                if let Some(transform) = scene.transform(motion.object) {
                    motion.trans_last = transform.translation;
                    motion.quat_last = transform.rotation;
                }
                motion.avg_linear = 0.0;
                motion.avg_angular = 0.0;
            }
            SensorKind::VerticalVelocity(vertical) => {
                if let Some(transform) = scene.transform(vertical.object) {
                    vertical.height_last = transform.translation[1];
                }
                vertical.avg_vertical = 0.0;
            }
            SensorKind::Selection { selected, .. } => *selected = false,
            _ => {}
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
