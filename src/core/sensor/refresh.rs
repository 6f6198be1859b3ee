//=========================================================================
// Sensor Refresh
//=========================================================================
//
// Per-kind sampling run by the update loop's refresh phase.
//
// Every live sensor is refreshed exactly once per tick, after all queued
// input has been digested and before any manifold logic runs. Kinds that
// depend on elapsed time skip ticks with a zero time step so that their
// velocity and period math never divides by zero.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;

//=== Internal Dependencies ===============================================

use super::{Sensor, SensorKind, SensorPayload, TouchGesture};
use crate::core::backend::{PhysicsBackend, SceneBackend};
use crate::core::input::{Accumulator, AccumulatorKey, DeviceClass, SurfaceId, TouchPoint};

//=== RefreshContext ======================================================

/// Everything a sensor may read during one refresh phase.
pub(crate) struct RefreshContext<'a> {
    pub timeline: f64,
    pub elapsed: f64,
    pub smooth_period: f64,
    pub accumulators: &'a HashMap<AccumulatorKey, Accumulator>,
    pub physics: &'a mut dyn PhysicsBackend,
    pub scene: &'a dyn SceneBackend,
}

impl RefreshContext<'_> {
    fn accumulator(&self, device: DeviceClass, surface: SurfaceId) -> Option<&Accumulator> {
        self.accumulators.get(&AccumulatorKey::new(device, surface))
    }
}

//=== Math Helpers ========================================================

/// Exponential smoothing of `curr` towards `last` with time-constant `period`.
pub(crate) fn smooth(curr: f64, last: f64, delta: f64, period: f64) -> f64 {
    if period <= 0.0 {
        return curr;
    }
    let e = (-delta / period).exp();
    (1.0 - e) * curr + e * last
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let (dx, dy, dz) = (a[0] - b[0], a[1] - b[1], a[2] - b[2]);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Rotation angle between two orientations, in radians.
fn rotation_angle(last: [f64; 4], curr: [f64; 4]) -> f64 {
    let norm = |q: [f64; 4]| (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    let (nl, nc) = (norm(last), norm(curr));
    if nl == 0.0 || nc == 0.0 {
        return 0.0;
    }

    // w component of curr * inverse(last), both normalized
    let w = (curr[0] * last[0] + curr[1] * last[1] + curr[2] * last[2] + curr[3] * last[3])
        / (nl * nc);
    (2.0 * w.clamp(-1.0, 1.0).acos()).abs()
}

fn midpoint(touches: &[TouchPoint]) -> (f64, f64) {
    match touches {
        [] => (0.0, 0.0),
        [only] => (only.x, only.y),
        [a, b, ..] => ((a.x + b.x) * 0.5, (a.y + b.y) * 0.5),
    }
}

fn flag(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

//=== Sensor::refresh =====================================================

impl Sensor {
    /// Samples the sensor's source and stores the new value and payload.
    pub(crate) fn refresh(&mut self, ctx: &mut RefreshContext<'_>) {
        if !self.available {
            return;
        }

        let timed = matches!(
            self.kind,
            SensorKind::Timer(_)
                | SensorKind::Elapsed { .. }
                | SensorKind::Timeline
                | SensorKind::Motion(_)
                | SensorKind::VerticalVelocity(_)
        );
        if timed && ctx.elapsed <= 0.0 {
            return;
        }

        match &mut self.kind {
            //--- Generic ------------------------------------------------------
            SensorKind::Custom { target } => self.value = *target,
            SensorKind::Callback(f) => self.value = f(ctx.timeline, ctx.elapsed),

            //--- Time ---------------------------------------------------------
            SensorKind::Timer(timer) => {
                if !timer.is_expired() && ctx.timeline - timer.time_last >= timer.period {
                    self.value = 1.0;
                    timer.time_last = ctx.timeline;
                    if !timer.repeat {
                        timer.period = -timer.period;
                    }
                }
            }
            SensorKind::Elapsed { time_last } => {
                let last = time_last.unwrap_or(ctx.timeline);
                self.value = ctx.timeline - last;
                *time_last = Some(ctx.timeline);
            }
            SensorKind::Timeline => self.value = ctx.timeline,

            //--- Keyboard / Pointer -------------------------------------------
            SensorKind::Keyboard { key, surface } => {
                let down = ctx
                    .accumulator(DeviceClass::Keyboard, *surface)
                    .is_some_and(|acc| acc.is_key_down(*key));
                self.value = flag(down);
            }
            SensorKind::MouseClick { button, surface } => {
                let Some(p) = ctx.accumulator(DeviceClass::Mouse, *surface).and_then(|a| a.pointer())
                else {
                    self.value = 0.0;
                    return;
                };
                let down = match button {
                    Some(b) => p.buttons_down.contains(&*b),
                    None => !p.buttons_down.is_empty(),
                };
                self.value = flag(down);
                if down {
                    let (x, y) = p.position.unwrap_or(p.press_position);
                    self.payload = Some(SensorPayload::Pointer { x, y });
                }
            }
            SensorKind::MouseWheel { surface } => {
                self.value = ctx
                    .accumulator(DeviceClass::Mouse, *surface)
                    .and_then(|a| a.pointer())
                    .map_or(0.0, |p| p.wheel);
            }
            SensorKind::MouseMove { axis, surface } => {
                self.value = ctx
                    .accumulator(DeviceClass::Mouse, *surface)
                    .and_then(|a| a.pointer())
                    .map_or(0.0, |p| axis.select(p.delta()));
            }

            //--- Touch --------------------------------------------------------
            SensorKind::TouchMove { surface, .. }
            | SensorKind::TouchZoom { surface }
            | SensorKind::TouchRotate { surface }
            | SensorKind::TouchTap { surface } => {
                let Some(t) = ctx.accumulator(DeviceClass::Touch, *surface).and_then(|a| a.touch())
                else {
                    self.value = 0.0;
                    return;
                };
                let (gesture, value) = match &self.kind {
                    SensorKind::TouchMove { axis, .. } => (TouchGesture::Pan, axis.select(t.pan_delta())),
                    SensorKind::TouchZoom { .. } => (TouchGesture::Zoom, t.zoom_delta()),
                    SensorKind::TouchRotate { .. } => (TouchGesture::Rotate, t.rotate_delta()),
                    _ => (TouchGesture::Tap, flag(t.touch_started)),
                };
                self.value = value;
                if value != 0.0 {
                    let (x, y) = midpoint(&t.touches);
                    self.payload = Some(SensorPayload::Touch { gesture, x, y });
                }
            }

            //--- Physics Probes -----------------------------------------------
            SensorKind::Collision { probe: Some(probe), .. } => {
                let hit = ctx.physics.poll_contact(*probe);
                self.value = flag(hit.is_some());
                if let Some(hit) = hit {
                    self.payload = Some(SensorPayload::Collision(hit));
                }
            }
            SensorKind::CollisionImpulse { probe: Some(probe), .. } => {
                self.value = ctx.physics.poll_impulse(*probe);
            }
            SensorKind::Ray { probe: Some(probe), binary, .. } => match ctx.physics.poll_ray(*probe) {
                Some(hit) => {
                    self.value = if *binary { 1.0 } else { hit.fraction };
                    self.payload = Some(SensorPayload::Ray(hit));
                }
                None => self.value = 0.0,
            },
            SensorKind::Collision { probe: None, .. }
            | SensorKind::CollisionImpulse { probe: None, .. }
            | SensorKind::Ray { probe: None, .. } => {}

            //--- Scene --------------------------------------------------------
            SensorKind::Motion(motion) => {
                let Some(transform) = ctx.scene.transform(motion.object) else {
                    return;
                };
                let dist = distance(motion.trans_last, transform.translation);
                let angle = rotation_angle(motion.quat_last, transform.rotation);

                let linear = dist / ctx.elapsed;
                let angular = angle / ctx.elapsed;
                motion.avg_linear = smooth(linear, motion.avg_linear, ctx.elapsed, ctx.smooth_period);
                motion.avg_angular =
                    smooth(angular, motion.avg_angular, ctx.elapsed, ctx.smooth_period);

                self.value = flag(
                    motion.avg_linear >= motion.threshold
                        || motion.avg_angular >= motion.rotation_threshold,
                );
                self.payload = Some(SensorPayload::Motion { linear, angular });

                motion.trans_last = transform.translation;
                motion.quat_last = transform.rotation;
            }
            SensorKind::VerticalVelocity(vertical) => {
                let Some(transform) = ctx.scene.transform(vertical.object) else {
                    return;
                };
                // Y-up
                let height = transform.translation[1];
                let speed = (height - vertical.height_last).abs() / ctx.elapsed;
                vertical.avg_vertical =
                    smooth(speed, vertical.avg_vertical, ctx.elapsed, ctx.smooth_period);

                self.value = flag(vertical.avg_vertical >= vertical.threshold);
                self.payload = Some(SensorPayload::VerticalVelocity(speed));

                vertical.height_last = height;
            }
            SensorKind::Selection { object, auto_release, surface, selected } => {
                let mut pressing = false;
                for device in [DeviceClass::Mouse, DeviceClass::Touch] {
                    let Some(acc) = ctx.accumulator(device, *surface) else {
                        continue;
                    };
                    if let Some(picked) = acc.picked() {
                        *selected = picked == Some(*object);
                    }
                    pressing |= acc.is_pressing();
                }
                if *auto_release && !pressing {
                    *selected = false;
                }
                self.value = flag(*selected);
            }

            //--- Optional Devices ---------------------------------------------
            SensorKind::GyroDelta => {
                let delta = ctx
                    .accumulator(DeviceClass::Gyro, SurfaceId::PRIMARY)
                    .and_then(|a| a.orientation())
                    .map_or([0.0; 3], |o| o.delta());
                let moved = delta.iter().any(|d| *d != 0.0);
                self.value = flag(moved);
                if moved {
                    self.payload = Some(SensorPayload::Vector(delta));
                }
            }
            SensorKind::GyroAngles => {
                let angles = ctx
                    .accumulator(DeviceClass::Gyro, SurfaceId::PRIMARY)
                    .and_then(|a| a.orientation())
                    .and_then(|o| o.angles);
                self.value = flag(angles.is_some());
                self.payload = angles.map(SensorPayload::Vector);
            }
            SensorKind::GyroQuat => {
                let quat = ctx
                    .accumulator(DeviceClass::Gyro, SurfaceId::PRIMARY)
                    .and_then(|a| a.orientation())
                    .and_then(|o| o.quat());
                self.value = flag(quat.is_some());
                self.payload = quat.map(SensorPayload::Quat);
            }
            SensorKind::HmdQuat => {
                let quat = ctx
                    .accumulator(DeviceClass::Hmd, SurfaceId::PRIMARY)
                    .and_then(|a| a.hmd())
                    .and_then(|h| h.orientation);
                self.value = flag(quat.is_some());
                self.payload = quat.map(SensorPayload::Quat);
            }
            SensorKind::HmdPosition => {
                let position = ctx
                    .accumulator(DeviceClass::Hmd, SurfaceId::PRIMARY)
                    .and_then(|a| a.hmd())
                    .and_then(|h| h.position);
                self.value = flag(position.is_some());
                self.payload = position.map(SensorPayload::Vector);
            }
            SensorKind::GamepadButton { slot, button } => {
                self.value = ctx
                    .accumulator(DeviceClass::Gamepad(*slot), SurfaceId::PRIMARY)
                    .and_then(|a| a.gamepad())
                    .and_then(|g| g.buttons.get(&*button).copied())
                    .unwrap_or(0.0);
            }
            SensorKind::GamepadAxis { slot, axis } => {
                self.value = ctx
                    .accumulator(DeviceClass::Gamepad(*slot), SurfaceId::PRIMARY)
                    .and_then(|a| a.gamepad())
                    .and_then(|g| g.axes.get(&*axis).copied())
                    .unwrap_or(0.0);
            }
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::{NullPhysics, ObjectId, Transform};
    use crate::core::input::accumulator::AccumulatorLimits;
    use crate::core::input::{DeviceEvent, KeyCode, Modifiers, ValueName};
    use crate::core::sensor::{MotionState, MoveAxis, TimerState, VerticalState};
    use approx::assert_relative_eq;
    use std::cell::Cell;

    //--- Test Helpers -----------------------------------------------------

    struct MovingScene {
        transform: Cell<Transform>,
    }

    impl SceneBackend for MovingScene {
        fn transform(&self, _object: ObjectId) -> Option<Transform> {
            Some(self.transform.get())
        }

        fn pick_object(&mut self, _surface: SurfaceId, _x: f64, _y: f64) -> Option<ObjectId> {
            None
        }
    }

    fn scene_at(translation: [f64; 3]) -> MovingScene {
        MovingScene {
            transform: Cell::new(Transform { translation, rotation: [0.0, 0.0, 0.0, 1.0] }),
        }
    }

    fn refresh(
        sensor: &mut Sensor,
        accumulators: &HashMap<AccumulatorKey, Accumulator>,
        scene: &dyn SceneBackend,
        timeline: f64,
        elapsed: f64,
    ) {
        let mut physics = NullPhysics;
        let mut ctx = RefreshContext {
            timeline,
            elapsed,
            smooth_period: 0.3,
            accumulators,
            physics: &mut physics,
            scene,
        };
        sensor.refresh(&mut ctx);
    }

    fn accumulator(device: DeviceClass, value: ValueName) -> HashMap<AccumulatorKey, Accumulator> {
        let key = AccumulatorKey::new(device, SurfaceId::PRIMARY);
        let mut acc = Accumulator::new(
            key,
            AccumulatorLimits { wheel_notch_multiplier: 1.0 / 120.0, max_touches: 10 },
        );
        acc.register_value(value);
        HashMap::from([(key, acc)])
    }

    fn timer(period: f64, repeat: bool) -> Sensor {
        Sensor::new(
            SensorKind::Timer(TimerState { period, repeat, time_last: 0.0 }),
            true,
        )
    }

    //=====================================================================
    // Math Tests
    //=====================================================================

    #[test]
    fn smooth_weights_by_elapsed_time() {
        let e = (-0.1f64 / 0.3).exp();
        assert_relative_eq!(smooth(10.0, 0.0, 0.1, 0.3), (1.0 - e) * 10.0);
        assert_eq!(smooth(10.0, 3.0, 0.1, 0.0), 10.0);
    }

    #[test]
    fn rotation_angle_of_quarter_turn() {
        let half = std::f64::consts::FRAC_PI_4;
        let quarter_z = [0.0, 0.0, half.sin(), half.cos()];
        assert_relative_eq!(
            rotation_angle([0.0, 0.0, 0.0, 1.0], quarter_z),
            std::f64::consts::FRAC_PI_2,
            epsilon = 1e-12
        );
    }

    //=====================================================================
    // Time Sensor Tests
    //=====================================================================

    #[test]
    fn repeating_timer_fires_each_period() {
        let mut sensor = timer(1.0, true);
        let accs = HashMap::new();

        refresh(&mut sensor, &accs, &scene_at([0.0; 3]), 0.5, 0.5);
        assert_eq!(sensor.value(), 0.0);

        refresh(&mut sensor, &accs, &scene_at([0.0; 3]), 1.0, 0.5);
        assert_eq!(sensor.value(), 1.0);
        sensor.discharge();

        refresh(&mut sensor, &accs, &scene_at([0.0; 3]), 1.5, 0.5);
        assert_eq!(sensor.value(), 0.0);

        refresh(&mut sensor, &accs, &scene_at([0.0; 3]), 2.0, 0.5);
        assert_eq!(sensor.value(), 1.0);
    }

    #[test]
    fn one_shot_timer_expires_after_firing() {
        let mut sensor = timer(1.0, false);
        let accs = HashMap::new();
        let scene = scene_at([0.0; 3]);

        refresh(&mut sensor, &accs, &scene, 1.0, 1.0);
        assert_eq!(sensor.value(), 1.0);
        sensor.discharge();

        for t in 2..6 {
            refresh(&mut sensor, &accs, &scene, t as f64, 1.0);
            assert_eq!(sensor.value(), 0.0);
        }
    }

    #[test]
    fn elapsed_sensor_seeds_on_first_tick() {
        let mut sensor = Sensor::new(SensorKind::Elapsed { time_last: None }, true);
        let accs = HashMap::new();
        let scene = scene_at([0.0; 3]);

        refresh(&mut sensor, &accs, &scene, 5.0, 0.1);
        assert_eq!(sensor.value(), 0.0);

        refresh(&mut sensor, &accs, &scene, 5.25, 0.25);
        assert_relative_eq!(sensor.value(), 0.25);
    }

    #[test]
    fn zero_time_step_is_skipped() {
        let mut sensor = Sensor::new(SensorKind::Timeline, true);
        refresh(&mut sensor, &HashMap::new(), &scene_at([0.0; 3]), 7.0, 0.0);
        assert_eq!(sensor.value(), 0.0);
    }

    #[test]
    fn callback_sensor_receives_time() {
        let mut sensor = Sensor::new(SensorKind::Callback(Box::new(|t, dt| t * 10.0 + dt)), true);
        refresh(&mut sensor, &HashMap::new(), &scene_at([0.0; 3]), 2.0, 0.5);
        assert_eq!(sensor.value(), 20.5);
    }

    //=====================================================================
    // Scene Sensor Tests
    //=====================================================================

    #[test]
    fn motion_sensor_reports_threshold_crossing() {
        let scene = scene_at([0.0; 3]);
        let mut sensor = Sensor::new(
            SensorKind::Motion(MotionState {
                object: ObjectId(1),
                threshold: 1.0,
                rotation_threshold: 10.0,
                trans_last: [0.0; 3],
                quat_last: [0.0, 0.0, 0.0, 1.0],
                avg_linear: 0.0,
                avg_angular: 0.0,
            }),
            true,
        );
        let accs = HashMap::new();

        refresh(&mut sensor, &accs, &scene, 0.1, 0.1);
        assert_eq!(sensor.value(), 0.0);

        // 10 units/s for several ticks pushes the smoothed speed past 1.0
        let mut x = 0.0;
        for tick in 2..10 {
            x += 1.0;
            scene.transform.set(Transform { translation: [x, 0.0, 0.0], ..Transform::IDENTITY });
            refresh(&mut sensor, &accs, &scene, tick as f64 * 0.1, 0.1);
        }
        assert_eq!(sensor.value(), 1.0);
        match sensor.payload() {
            Some(SensorPayload::Motion { linear, angular }) => {
                assert_relative_eq!(linear, 10.0);
                assert_eq!(angular, 0.0);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn vertical_velocity_ignores_horizontal_motion() {
        let scene = scene_at([0.0; 3]);
        let mut sensor = Sensor::new(
            SensorKind::VerticalVelocity(VerticalState {
                object: ObjectId(1),
                threshold: 0.5,
                height_last: 0.0,
                avg_vertical: 0.0,
            }),
            true,
        );

        scene.transform.set(Transform { translation: [5.0, 0.0, 5.0], ..Transform::IDENTITY });
        refresh(&mut sensor, &HashMap::new(), &scene, 1.0, 1.0);

        assert_eq!(sensor.value(), 0.0);
        assert_eq!(sensor.payload(), Some(SensorPayload::VerticalVelocity(0.0)));
    }

    //=====================================================================
    // Input Sensor Tests
    //=====================================================================

    #[test]
    fn keyboard_sensor_follows_key_state() {
        let mut accs = accumulator(DeviceClass::Keyboard, ValueName::Keys);
        let key = AccumulatorKey::new(DeviceClass::Keyboard, SurfaceId::PRIMARY);
        let mut sensor = Sensor::new(
            SensorKind::Keyboard { key: KeyCode::Space, surface: SurfaceId::PRIMARY },
            true,
        );

        accs.get_mut(&key).unwrap().digest(&DeviceEvent::KeyDown {
            key: KeyCode::Space,
            modifiers: Modifiers::NONE,
        });
        refresh(&mut sensor, &accs, &scene_at([0.0; 3]), 0.0, 0.0);
        assert_eq!(sensor.value(), 1.0);
    }

    #[test]
    fn mouse_move_sensor_reads_delta() {
        let mut accs = accumulator(DeviceClass::Mouse, ValueName::Location);
        let key = AccumulatorKey::new(DeviceClass::Mouse, SurfaceId::PRIMARY);
        let mut sensor = Sensor::new(
            SensorKind::MouseMove { axis: MoveAxis::X, surface: SurfaceId::PRIMARY },
            true,
        );

        let acc = accs.get_mut(&key).unwrap();
        acc.digest(&DeviceEvent::MouseMoved { x: 0.0, y: 0.0 });
        acc.finish_tick();
        acc.digest(&DeviceEvent::MouseMoved { x: 12.0, y: 3.0 });

        refresh(&mut sensor, &accs, &scene_at([0.0; 3]), 0.0, 0.0);
        assert_eq!(sensor.value(), 12.0);
    }

    #[test]
    fn gamepad_axis_defaults_to_neutral() {
        let accs = accumulator(DeviceClass::Gamepad(0), ValueName::Gamepad);
        let mut sensor = Sensor::new(SensorKind::GamepadAxis { slot: 0, axis: 3 }, true);

        refresh(&mut sensor, &accs, &scene_at([0.0; 3]), 0.0, 0.1);
        assert_eq!(sensor.value(), 0.0);
    }

    #[test]
    fn unavailable_sensor_stays_neutral() {
        let mut accs = accumulator(DeviceClass::Gyro, ValueName::Orientation);
        let key = AccumulatorKey::new(DeviceClass::Gyro, SurfaceId::PRIMARY);
        accs.get_mut(&key).unwrap().digest(&DeviceEvent::Orientation {
            alpha: 1.0,
            beta: 2.0,
            gamma: 3.0,
        });

        let mut sensor = Sensor::new(SensorKind::GyroAngles, false);
        refresh(&mut sensor, &accs, &scene_at([0.0; 3]), 0.0, 0.1);

        assert_eq!(sensor.value(), 0.0);
        assert_eq!(sensor.payload(), None);
    }
}
