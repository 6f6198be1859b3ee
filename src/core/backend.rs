//=========================================================================
// Collaborator Backends
//=========================================================================
//
// Interfaces to the systems the controls core polls but does not own:
// physics probes, scene transforms and picking, device subscriptions.
//
// Each trait has a null implementation so a `Controls` instance can run
// with keyboard/pointer/touch input only.
//
//=========================================================================

//=== Internal Dependencies ===============================================

use crate::core::input::{AccumulatorKey, DeviceClass, SurfaceId, ValueName};

//=== Shared Types ========================================================

/// Opaque identifier of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Identifier of a probe attached to the physics backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeId(pub u64);

/// World-space placement of an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: [f64; 3],
    /// Quaternion `[x, y, z, w]`.
    pub rotation: [f64; 4],
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };
}

/// Contact reported by a collision probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionHit {
    pub point: [f64; 3],
    pub normal: [f64; 3],
    pub distance: f64,
}

/// Hit reported by a ray probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Hit position along the ray, `0.0..=1.0`.
    pub fraction: f64,
    pub point: [f64; 3],
    pub normal: [f64; 3],
    pub object: Option<ObjectId>,
}

/// Probe description handed to the physics backend on sensor activation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeRequest {
    /// Contact test between `object` and anything tagged `collision_id`
    /// (any object when `None`).
    Contact {
        object: ObjectId,
        collision_id: Option<String>,
    },

    /// Collision impulse applied to `object`.
    Impulse { object: ObjectId },

    /// Ray cast from `from` to `to`, relative to `object` when `local`.
    Ray {
        object: ObjectId,
        from: [f64; 3],
        to: [f64; 3],
        local: bool,
        collision_id: Option<String>,
    },
}

//=== PhysicsBackend ======================================================

/// Executes collision and ray queries on behalf of probe sensors.
///
/// Probes are attached when a sensor becomes live and detached when its
/// last manifold goes away. Polling happens once per tick per probe.
pub trait PhysicsBackend {
    /// Returns `true` if `object` carries a physics body.
    fn has_physics(&self, object: ObjectId) -> bool;

    fn attach_probe(&mut self, request: &ProbeRequest) -> ProbeId;

    fn detach_probe(&mut self, probe: ProbeId);

    /// Current contact, if any.
    fn poll_contact(&mut self, probe: ProbeId) -> Option<CollisionHit>;

    /// Magnitude of the collision impulse applied this step.
    fn poll_impulse(&mut self, probe: ProbeId) -> f64;

    /// Current ray hit, if any.
    fn poll_ray(&mut self, probe: ProbeId) -> Option<RayHit>;
}

//=== SceneBackend ========================================================

/// Scene-graph queries used by motion and selection sensors.
pub trait SceneBackend {
    /// World transform of `object`, if it exists.
    fn transform(&self, _object: ObjectId) -> Option<Transform> {
        None
    }

    /// Object rendered under the given surface coordinates.
    fn pick_object(&mut self, surface: SurfaceId, x: f64, y: f64) -> Option<ObjectId>;
}

//=== DeviceBackend =======================================================

/// Platform device subscriptions.
///
/// `subscribe`/`unsubscribe` are called exactly on the 0→1 and 1→0
/// registration transitions of an accumulator value.
pub trait DeviceBackend {
    /// Returns `true` if the device is present.
    fn is_available(&self, device: DeviceClass) -> bool;

    fn subscribe(&mut self, _key: AccumulatorKey, _value: ValueName) {}

    fn unsubscribe(&mut self, _key: AccumulatorKey, _value: ValueName) {}
}

//=== Null Implementations ================================================

/// Physics backend for scenes without physics: no object has a body.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPhysics;

impl PhysicsBackend for NullPhysics {
    fn has_physics(&self, _object: ObjectId) -> bool {
        false
    }

    fn attach_probe(&mut self, _request: &ProbeRequest) -> ProbeId {
        ProbeId(0)
    }

    fn detach_probe(&mut self, _probe: ProbeId) {}

    fn poll_contact(&mut self, _probe: ProbeId) -> Option<CollisionHit> {
        None
    }

    fn poll_impulse(&mut self, _probe: ProbeId) -> f64 {
        0.0
    }

    fn poll_ray(&mut self, _probe: ProbeId) -> Option<RayHit> {
        None
    }
}

/// Scene backend with no objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScene;

impl SceneBackend for NullScene {
    fn pick_object(&mut self, _surface: SurfaceId, _x: f64, _y: f64) -> Option<ObjectId> {
        None
    }
}

/// Desktop-style device set: keyboard, mouse and touch are present;
/// orientation, head-mounted devices and gamepads are not.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDevices;

impl DeviceBackend for NullDevices {
    fn is_available(&self, device: DeviceClass) -> bool {
        matches!(device, DeviceClass::Keyboard | DeviceClass::Mouse | DeviceClass::Touch)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
