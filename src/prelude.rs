//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use aetheric_controls::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Engine
pub use crate::builder::ControlsBuilder;
pub use crate::core::{Controls, ControlsStats};
pub use crate::core::error::ControlsError;

// Manifolds
pub use crate::core::manifold::{CallbackParam, ControlType, Logic, ManifoldEvent, Pulse};
pub use crate::core::registry::Owner;

// Sensors
pub use crate::core::sensor::{MoveAxis, SensorHandle, SensorPayload, TouchGesture};

// Input
pub use crate::core::input::{
    DeviceClass, DeviceEvent, InputSender, KeyCode, Modifiers, MouseButton, SurfaceId,
    TouchPoint,
};

// Collaborators
pub use crate::core::backend::{
    CollisionHit, DeviceBackend, NullDevices, NullPhysics, NullScene, ObjectId, PhysicsBackend,
    ProbeId, ProbeRequest, RayHit, SceneBackend, Transform,
};

// Platform
pub use crate::platform::WinitInputBridge;
