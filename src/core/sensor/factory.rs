//=========================================================================
// Sensor Factories
//=========================================================================
//
// `create_*_sensor` constructors on `Controls`.
//
// Factories only allocate: nothing is subscribed or attached until a
// manifold references the sensor. Kinds backed by optional hardware are
// checked against the device backend here and created neutral when the
// device is absent.
//
//=========================================================================

//=== External Dependencies ===============================================

use log::{debug, error};

//=== Internal Dependencies ===============================================

use super::{MotionState, MoveAxis, Sensor, SensorHandle, SensorKind, TimerState, VerticalState};
use crate::core::backend::ObjectId;
use crate::core::error::ControlsError;
use crate::core::input::{DeviceClass, KeyCode, MouseButton, SurfaceId};
use crate::core::Controls;

impl Controls {
    fn add_sensor(&mut self, kind: SensorKind) -> SensorHandle {
        let available = match kind.optional_device() {
            Some(DeviceClass::Gamepad(slot)) if slot >= DeviceClass::GAMEPAD_SLOTS => false,
            Some(device) => self.devices.is_available(device),
            None => true,
        };
        let name = kind.name();
        let handle = self.registry.add_sensor(Sensor::new(kind, available));

        if available {
            debug!(target: "controls::sensor", "Created {} sensor {:?}", name, handle);
        } else {
            debug!(
                target: "controls::sensor",
                "Created {} sensor {:?} without device, it will stay neutral",
                name, handle
            );
        }
        handle
    }

    fn require_physics(&self, factory: &str, object: ObjectId) -> Result<(), ControlsError> {
        if self.physics.has_physics(object) {
            Ok(())
        } else {
            let e = ControlsError::MissingPhysicsBody(object);
            error!(target: "controls::sensor", "{}(): {}", factory, e);
            Err(e)
        }
    }

    //--- Generic ----------------------------------------------------------

    /// Sensor reporting a caller-set value, see [`Controls::set_custom_sensor`].
    pub fn create_custom_sensor(&mut self, value: f64) -> SensorHandle {
        self.add_sensor(SensorKind::Custom { target: value })
    }

    /// Sensor whose value is `f(timeline, elapsed)`, evaluated every tick.
    pub fn create_callback_sensor(
        &mut self,
        f: impl FnMut(f64, f64) -> f64 + 'static,
    ) -> SensorHandle {
        self.add_sensor(SensorKind::Callback(Box::new(f)))
    }

    //--- Time -------------------------------------------------------------

    /// Sensor reporting 1 for one tick each time `period` seconds passed
    /// since creation or the last firing. A one-shot timer (`repeat ==
    /// false`) fires once, until re-armed by [`Controls::reset_timer_sensor`].
    pub fn create_timer_sensor(&mut self, period: f64, repeat: bool) -> SensorHandle {
        let timer = TimerState {
            period: period.max(0.0),
            repeat,
            time_last: self.timeline,
        };
        self.add_sensor(SensorKind::Timer(timer))
    }

    /// Sensor reporting the time since the previous tick (0 on its first).
    pub fn create_elapsed_sensor(&mut self) -> SensorHandle {
        self.add_sensor(SensorKind::Elapsed { time_last: None })
    }

    /// Sensor reporting the absolute timeline.
    pub fn create_timeline_sensor(&mut self) -> SensorHandle {
        self.add_sensor(SensorKind::Timeline)
    }

    //--- Keyboard / Pointer -----------------------------------------------

    /// 1 while `key` is held.
    pub fn create_keyboard_sensor(&mut self, key: KeyCode, surface: SurfaceId) -> SensorHandle {
        self.add_sensor(SensorKind::Keyboard { key, surface })
    }

    /// 1 while `button` (any button for `None`) is held; payload holds
    /// the pointer position.
    pub fn create_mouse_click_sensor(
        &mut self,
        button: Option<MouseButton>,
        surface: SurfaceId,
    ) -> SensorHandle {
        self.add_sensor(SensorKind::MouseClick { button, surface })
    }

    /// Wheel notches scrolled this tick.
    pub fn create_mouse_wheel_sensor(&mut self, surface: SurfaceId) -> SensorHandle {
        self.add_sensor(SensorKind::MouseWheel { surface })
    }

    /// Pointer movement this tick along `axis`.
    pub fn create_mouse_move_sensor(&mut self, axis: MoveAxis, surface: SurfaceId) -> SensorHandle {
        self.add_sensor(SensorKind::MouseMove { axis, surface })
    }

    //--- Touch ------------------------------------------------------------

    /// Single-finger pan this tick along `axis`.
    pub fn create_touch_move_sensor(&mut self, axis: MoveAxis, surface: SurfaceId) -> SensorHandle {
        self.add_sensor(SensorKind::TouchMove { axis, surface })
    }

    /// Change of the two-finger distance this tick.
    pub fn create_touch_zoom_sensor(&mut self, surface: SurfaceId) -> SensorHandle {
        self.add_sensor(SensorKind::TouchZoom { surface })
    }

    /// Change of the two-finger angle this tick (radians).
    pub fn create_touch_rotate_sensor(&mut self, surface: SurfaceId) -> SensorHandle {
        self.add_sensor(SensorKind::TouchRotate { surface })
    }

    /// 1 on the tick a finger touches down.
    pub fn create_touch_tap_sensor(&mut self, surface: SurfaceId) -> SensorHandle {
        self.add_sensor(SensorKind::TouchTap { surface })
    }

    //--- Physics Probes ---------------------------------------------------

    /// 1 while `object` touches anything tagged `collision_id` (anything
    /// for `None`); payload holds the contact.
    ///
    /// # Errors
    ///
    /// [`ControlsError::MissingPhysicsBody`] if `object` has no physics body.
    pub fn create_collision_sensor(
        &mut self,
        object: ObjectId,
        collision_id: Option<&str>,
    ) -> Result<SensorHandle, ControlsError> {
        self.require_physics("create_collision_sensor", object)?;
        Ok(self.add_sensor(SensorKind::Collision {
            object,
            collision_id: collision_id.map(str::to_string),
            probe: None,
        }))
    }

    /// Collision impulse magnitude applied to `object`.
    ///
    /// # Errors
    ///
    /// [`ControlsError::MissingPhysicsBody`] if `object` has no physics body.
    pub fn create_collision_impulse_sensor(
        &mut self,
        object: ObjectId,
    ) -> Result<SensorHandle, ControlsError> {
        self.require_physics("create_collision_impulse_sensor", object)?;
        Ok(self.add_sensor(SensorKind::CollisionImpulse { object, probe: None }))
    }

    /// Ray cast from `from` to `to` (relative to `object` when `local`).
    ///
    /// Reports 1 on hit when `binary`, otherwise the hit fraction along
    /// the ray; 0 on miss. Payload holds the hit.
    pub fn create_ray_sensor(
        &mut self,
        object: ObjectId,
        from: [f64; 3],
        to: [f64; 3],
        local: bool,
        collision_id: Option<&str>,
        binary: bool,
    ) -> SensorHandle {
        self.add_sensor(SensorKind::Ray {
            object,
            from,
            to,
            local,
            collision_id: collision_id.map(str::to_string),
            binary,
            probe: None,
        })
    }

    //--- Scene ------------------------------------------------------------

    /// 1 while the smoothed linear or angular speed of `object` reaches
    /// its threshold; payload holds the instantaneous speeds.
    ///
    /// # Errors
    ///
    /// [`ControlsError::MissingTransform`] if the scene has no such object.
    pub fn create_motion_sensor(
        &mut self,
        object: ObjectId,
        threshold: f64,
        rotation_threshold: f64,
    ) -> Result<SensorHandle, ControlsError> {
        let Some(transform) = self.scene.transform(object) else {
            let e = ControlsError::MissingTransform(object);
            error!(target: "controls::sensor", "create_motion_sensor(): {}", e);
            return Err(e);
        };

        Ok(self.add_sensor(SensorKind::Motion(MotionState {
            object,
            threshold,
            rotation_threshold,
            trans_last: transform.translation,
            quat_last: transform.rotation,
            avg_linear: 0.0,
            avg_angular: 0.0,
        })))
    }

    /// 1 while the smoothed vertical speed of `object` reaches `threshold`.
    ///
    /// # Errors
    ///
    /// [`ControlsError::MissingTransform`] if the scene has no such object.
    pub fn create_vertical_velocity_sensor(
        &mut self,
        object: ObjectId,
        threshold: f64,
    ) -> Result<SensorHandle, ControlsError> {
        let Some(transform) = self.scene.transform(object) else {
            let e = ControlsError::MissingTransform(object);
            error!(target: "controls::sensor", "create_vertical_velocity_sensor(): {}", e);
            return Err(e);
        };

        Ok(self.add_sensor(SensorKind::VerticalVelocity(VerticalState {
            object,
            threshold,
            height_last: transform.translation[1],
            avg_vertical: 0.0,
        })))
    }

    /// 1 while `object` is selected: a press (mouse or touch) on `object`
    /// selects it, a press elsewhere deselects it. With `auto_release`
    /// the selection also ends on release.
    pub fn create_selection_sensor(
        &mut self,
        object: ObjectId,
        auto_release: bool,
        surface: SurfaceId,
    ) -> SensorHandle {
        self.add_sensor(SensorKind::Selection {
            object,
            auto_release,
            surface,
            selected: false,
        })
    }

    //--- Optional Devices -------------------------------------------------

    /// 1 when the device orientation changed this tick; payload holds the
    /// per-axis angle deltas in degrees.
    pub fn create_gyro_delta_sensor(&mut self) -> SensorHandle {
        self.add_sensor(SensorKind::GyroDelta)
    }

    /// 1 once an orientation sample exists; payload holds the angles.
    pub fn create_gyro_angles_sensor(&mut self) -> SensorHandle {
        self.add_sensor(SensorKind::GyroAngles)
    }

    /// 1 once an orientation sample exists; payload holds it as a quaternion.
    pub fn create_gyro_quat_sensor(&mut self) -> SensorHandle {
        self.add_sensor(SensorKind::GyroQuat)
    }

    /// 1 once a head pose exists; payload holds the orientation.
    pub fn create_hmd_quat_sensor(&mut self) -> SensorHandle {
        self.add_sensor(SensorKind::HmdQuat)
    }

    /// 1 once a head pose exists; payload holds the position.
    pub fn create_hmd_position_sensor(&mut self) -> SensorHandle {
        self.add_sensor(SensorKind::HmdPosition)
    }

    /// Value of gamepad `button` in `slot` (analog buttons `0.0..=1.0`).
    pub fn create_gamepad_btn_sensor(&mut self, slot: u8, button: u8) -> SensorHandle {
        self.add_sensor(SensorKind::GamepadButton { slot, button })
    }

    /// Value of gamepad `axis` in `slot` (`-1.0..=1.0`).
    pub fn create_gamepad_axis_sensor(&mut self, slot: u8, axis: u8) -> SensorHandle {
        self.add_sensor(SensorKind::GamepadAxis { slot, axis })
    }
}
