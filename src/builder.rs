//=========================================================================
// Controls Builder
//
// Configuration entry point for the controls engine.
//
// Architecture:
// ```text
//     ControlsBuilder  ──build()──>  Controls  ──update()──>  [per tick]
//         │
//         ├─ with_smooth_period()
//         ├─ with_wheel_notch_multiplier()
//         ├─ with_max_touches()
//         ├─ with_channel_capacity() / with_max_events_per_tick()
//         └─ with_physics() / with_scene() / with_devices()
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use log::info;

//=== Internal Dependencies ===============================================

use crate::core::backend::{
    DeviceBackend, NullDevices, NullPhysics, NullScene, PhysicsBackend, SceneBackend,
};
use crate::core::{Controls, ControlsConfig};

//=== ControlsBuilder =====================================================

/// Builder for configuring and constructing [`Controls`].
///
/// # Default Values
///
/// - **Smoothing period**: 0.3 s (motion and velocity sensors)
/// - **Wheel notch multiplier**: 1/120
/// - **Touch limit**: 10 fingers per surface
/// - **Channel capacity**: 128 events
/// - **Drain bound**: 256 events per tick
/// - **Backends**: no physics, empty scene, keyboard/mouse/touch only
///
/// # Examples
///
/// ```
/// use aetheric_controls::ControlsBuilder;
///
/// let mut controls = ControlsBuilder::new()
///     .with_smooth_period(0.5)
///     .with_channel_capacity(256)
///     .build();
///
/// controls.update(0.016, 0.016);
/// assert_eq!(controls.tick(), 1);
/// ```
pub struct ControlsBuilder {
    config: ControlsConfig,
    physics: Box<dyn PhysicsBackend>,
    scene: Box<dyn SceneBackend>,
    devices: Box<dyn DeviceBackend>,
}

impl ControlsBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ControlsConfig::default(),
            physics: Box::new(NullPhysics),
            scene: Box::new(NullScene),
            devices: Box::new(NullDevices),
        }
    }

    /// Sets the exponential smoothing time-constant (seconds) used by
    /// motion and vertical velocity sensors.
    ///
    /// Default: 0.3
    ///
    /// # Panics
    ///
    /// Panics if `period <= 0.0`.
    pub fn with_smooth_period(mut self, period: f64) -> Self {
        assert!(period > 0.0, "Smoothing period must be positive, got {}", period);
        self.config.smooth_period = period;
        self
    }

    /// Sets the factor converting raw wheel deltas into notches.
    ///
    /// Default: 1/120
    ///
    /// # Panics
    ///
    /// Panics if `multiplier` is zero or not finite.
    pub fn with_wheel_notch_multiplier(mut self, multiplier: f64) -> Self {
        assert!(
            multiplier != 0.0 && multiplier.is_finite(),
            "Wheel notch multiplier must be finite and non-zero, got {}",
            multiplier
        );
        self.config.wheel_notch_multiplier = multiplier;
        self
    }

    /// Sets the finger limit per touch surface. Extra fingers are ignored.
    ///
    /// Default: 10
    ///
    /// # Panics
    ///
    /// Panics if `max == 0`.
    pub fn with_max_touches(mut self, max: usize) -> Self {
        assert!(max > 0, "Touch limit must be positive");
        self.config.max_touches = max;
        self
    }

    /// Sets the capacity of the input queue.
    ///
    /// Producers get [`ControlsError::InputQueueFull`](crate::core::error::ControlsError)
    /// once the queue holds this many undrained events.
    ///
    /// Default: 128
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "Channel capacity must be positive");
        self.config.channel_capacity = capacity;
        self
    }

    /// Sets how many queued events one `update` call drains at most.
    ///
    /// Default: 256
    ///
    /// # Panics
    ///
    /// Panics if `max == 0`.
    pub fn with_max_events_per_tick(mut self, max: usize) -> Self {
        assert!(max > 0, "Events per tick must be positive");
        self.config.max_events_per_tick = max;
        self
    }

    /// Installs the physics backend executing collision and ray probes.
    pub fn with_physics(mut self, physics: impl PhysicsBackend + 'static) -> Self {
        self.physics = Box::new(physics);
        self
    }

    /// Installs the scene backend used for transforms and picking.
    pub fn with_scene(mut self, scene: impl SceneBackend + 'static) -> Self {
        self.scene = Box::new(scene);
        self
    }

    /// Installs the device backend reporting availability and receiving
    /// subscribe/unsubscribe notifications.
    pub fn with_devices(mut self, devices: impl DeviceBackend + 'static) -> Self {
        self.devices = Box::new(devices);
        self
    }

    /// Builds the controls instance.
    pub fn build(self) -> Controls {
        info!(
            target: "controls",
            "Building controls (smooth: {}s, wheel: {}, touches: {}, channel: {}, drain: {})",
            self.config.smooth_period,
            self.config.wheel_notch_multiplier,
            self.config.max_touches,
            self.config.channel_capacity,
            self.config.max_events_per_tick
        );

        Controls::new(self.config, self.physics, self.scene, self.devices)
    }
}

impl Default for ControlsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
