//=========================================================================
// Controls Error
//=========================================================================
//
// Recoverable usage errors reported by the controls API.
//
// Internal cache corruption is not represented here: it panics at the
// point of detection. An absent optional device is not an error either;
// the affected sensor simply stays neutral.
//
//=========================================================================

//=== Internal Dependencies ===============================================

use crate::core::backend::ObjectId;
use crate::core::registry::Owner;
use crate::core::sensor::SensorHandle;

//=== ControlsError =======================================================

/// Usage errors: logged at the call site and returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlsError {
    /// No manifold is registered under this owner.
    UnknownOwner(Owner),

    /// The owner exists but has no manifold with this id.
    UnknownManifold { owner: Owner, id: String },

    /// Sensor index past the end of the manifold's sensor list.
    SensorIndexOutOfRange { id: String, index: usize, len: usize },

    /// Handle from before the last `reset()`, or never issued.
    StaleSensorHandle(SensorHandle),

    /// Collision probes need a physics body on the source object.
    MissingPhysicsBody(ObjectId),

    /// Motion probes need a scene transform on the source object.
    MissingTransform(ObjectId),

    /// `reset_timer_sensor` addressed a sensor that is not a timer.
    NotATimer { id: String, index: usize },

    /// `set_custom_sensor`/`get_custom_sensor` on a non-custom sensor.
    NotACustomSensor(SensorHandle),

    /// The bounded input queue is at capacity; the event was dropped.
    InputQueueFull,

    /// The controls instance owning the input queue was dropped.
    InputDisconnected,
}

impl std::fmt::Display for ControlsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOwner(owner) => write!(f, "No manifolds registered for {}", owner),
            Self::UnknownManifold { owner, id } => {
                write!(f, "Manifold \"{}\" not found for {}", id, owner)
            }
            Self::SensorIndexOutOfRange { id, index, len } => write!(
                f,
                "Sensor index {} out of range for manifold \"{}\" ({} sensors)",
                index, id, len
            ),
            Self::StaleSensorHandle(handle) => write!(f, "Stale sensor handle {:?}", handle),
            Self::MissingPhysicsBody(obj) => write!(f, "Object {} has no physics body", obj.0),
            Self::MissingTransform(obj) => write!(f, "Object {} has no transform", obj.0),
            Self::NotATimer { id, index } => {
                write!(f, "Sensor {} of manifold \"{}\" is not a timer", index, id)
            }
            Self::NotACustomSensor(handle) => {
                write!(f, "Sensor {:?} is not a custom sensor", handle)
            }
            Self::InputQueueFull => write!(f, "Input queue full, event dropped"),
            Self::InputDisconnected => write!(f, "Input queue disconnected"),
        }
    }
}

impl std::error::Error for ControlsError {}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_manifold() {
        let err = ControlsError::UnknownManifold {
            owner: Owner::Object(ObjectId(3)),
            id: "JUMP".to_string(),
        };
        let msg = err.to_string();

        assert!(msg.contains("JUMP"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn display_reports_index_and_length() {
        let err = ControlsError::SensorIndexOutOfRange {
            id: "MOVE".to_string(),
            index: 4,
            len: 2,
        };
        assert_eq!(
            err.to_string(),
            "Sensor index 4 out of range for manifold \"MOVE\" (2 sensors)"
        );
    }

    #[test]
    fn is_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&ControlsError::InputQueueFull);
    }
}
