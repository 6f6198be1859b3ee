//=========================================================================
// Controls
//
// Per-tick driver of the sensor/manifold engine and its in-process API.
//
// Tick (`update`):
// ```text
//   1. route queued DeviceEvents → accumulators
//   2. accumulators: prepare (lazy picks)
//   3. sensors: refresh every live sensor once
//   4. owners → manifolds: pulse → callback (rescan on registry mutation)
//   5. sensors: discharge transient samples
//   6. accumulators: trailing update (current → previous)
//   7. tick += 1
// ```
//
// Notes:
// Everything runs on the caller's thread inside `update`. Callbacks get
// `&mut Controls` and may create or remove manifolds and sensors; the
// loop detects this through the registry generation and rescans, with
// per-tick stamps keeping every manifold to one evaluation.
//
//=========================================================================

//=== Submodules ==========================================================

pub mod backend;
pub mod error;
pub mod input;
pub mod manifold;
pub mod registry;
pub mod sensor;

//=== External Dependencies ===============================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, error, info, trace, warn};

//=== Internal Dependencies ===============================================

use backend::{DeviceBackend, PhysicsBackend, SceneBackend};
use error::ControlsError;
use input::accumulator::AccumulatorLimits;
use input::event_collector::EventCollector;
use input::{Accumulator, AccumulatorKey, DeviceEvent, InputSender, KeyCode, SurfaceId};
use manifold::{
    CallbackParam, ControlType, Logic, Manifold, ManifoldCallback, ManifoldEvent, ManifoldHandle,
    PulseState,
};
use registry::{Owner, Registry};
use sensor::{RefreshContext, Sensor, SensorHandle, SensorKind, SensorPayload};

//=== ControlsConfig ======================================================

/// Tunables set through [`ControlsBuilder`](crate::ControlsBuilder).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ControlsConfig {
    pub smooth_period: f64,
    pub wheel_notch_multiplier: f64,
    pub max_touches: usize,
    pub channel_capacity: usize,
    pub max_events_per_tick: usize,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            smooth_period: 0.3,
            wheel_notch_multiplier: 1.0 / 120.0,
            max_touches: 10,
            channel_capacity: 128,
            max_events_per_tick: 256,
        }
    }
}

//=== ControlsStats =======================================================

/// Snapshot of registry sizes, see [`Controls::debug_summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlsStats {
    pub owners: usize,
    pub manifolds: usize,
    pub sensors: usize,
    pub live_sensors: usize,
    pub collision_probes: usize,
    pub ray_probes: usize,
    pub accumulators: usize,
    pub tick: u64,
}

//=== Controls ============================================================

/// The sensor/manifold control engine.
///
/// Create via [`ControlsBuilder`](crate::ControlsBuilder).
///
/// # Examples
///
/// ```
/// use aetheric_controls::prelude::*;
///
/// let mut controls = ControlsBuilder::new().build();
/// let jump = controls.create_keyboard_sensor(KeyCode::Space, SurfaceId::PRIMARY);
///
/// controls
///     .create_sensor_manifold(
///         Owner::Global,
///         "JUMP",
///         ControlType::Trigger,
///         &[jump],
///         None,
///         |_controls, event| println!("jump {:?}", event.pulse),
///         None,
///     )
///     .unwrap();
///
/// controls
///     .push_device_event(
///         SurfaceId::PRIMARY,
///         DeviceEvent::KeyDown { key: KeyCode::Space, modifiers: Modifiers::NONE },
///     )
///     .unwrap();
/// controls.update(0.016, 0.016);
/// ```
pub struct Controls {
    config: ControlsConfig,
    registry: Registry,
    accumulators: HashMap<AccumulatorKey, Accumulator>,
    collector: EventCollector,
    physics: Box<dyn PhysicsBackend>,
    scene: Box<dyn SceneBackend>,
    devices: Box<dyn DeviceBackend>,
    tick: u64,
    timeline: f64,
    in_update: bool,
}

impl Controls {
    //--- Construction -----------------------------------------------------

    pub(crate) fn new(
        config: ControlsConfig,
        physics: Box<dyn PhysicsBackend>,
        scene: Box<dyn SceneBackend>,
        devices: Box<dyn DeviceBackend>,
    ) -> Self {
        Self {
            config,
            registry: Registry::new(),
            accumulators: HashMap::new(),
            collector: EventCollector::new(config.channel_capacity, config.max_events_per_tick),
            physics,
            scene,
            devices,
            tick: 0,
            timeline: 0.0,
            in_update: false,
        }
    }

    /// Current update counter; incremented at the end of every `update`.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Timeline value passed to the most recent `update`.
    pub fn timeline(&self) -> f64 {
        self.timeline
    }

    //--- Input ------------------------------------------------------------

    /// Returns a cloneable producer for device events.
    pub fn input_sender(&self) -> InputSender {
        self.collector.sender()
    }

    /// Queues a device event from the controls' own thread.
    ///
    /// Goes through the same queue as [`InputSender`], so ordering with
    /// events from other producers is preserved.
    pub fn push_device_event(
        &self,
        surface: SurfaceId,
        event: DeviceEvent,
    ) -> Result<(), ControlsError> {
        self.collector.sender().send(surface, event).map_err(|e| {
            warn!(target: "controls::input", "push_device_event(): {}", e);
            e
        })
    }

    /// Read access to a device accumulator, if some live sensor uses it.
    pub fn accumulator(&self, key: AccumulatorKey) -> Option<&Accumulator> {
        self.accumulators.get(&key)
    }

    //--- Sensor Access ----------------------------------------------------

    /// Direct read access to a sensor.
    pub fn sensor(&self, handle: SensorHandle) -> Option<&Sensor> {
        self.registry.sensor(handle).ok()
    }

    /// Sets the value a custom sensor reports from its next refresh on.
    ///
    /// Returns `false` (and logs) for stale handles and non-custom sensors.
    pub fn set_custom_sensor(&mut self, handle: SensorHandle, value: f64) -> bool {
        match self.registry.sensor_mut(handle) {
            Ok(Sensor { kind: SensorKind::Custom { target }, .. }) => {
                *target = value;
                true
            }
            Ok(_) => {
                error!(
                    target: "controls::sensor",
                    "set_custom_sensor(): {}",
                    ControlsError::NotACustomSensor(handle)
                );
                false
            }
            Err(e) => {
                error!(target: "controls::sensor", "set_custom_sensor(): {}", e);
                false
            }
        }
    }

    /// Returns the most recently set value of a custom sensor.
    pub fn get_custom_sensor(&self, handle: SensorHandle) -> Option<f64> {
        match self.registry.sensor(handle) {
            Ok(Sensor { kind: SensorKind::Custom { target }, .. }) => Some(*target),
            Ok(_) => {
                error!(
                    target: "controls::sensor",
                    "get_custom_sensor(): {}",
                    ControlsError::NotACustomSensor(handle)
                );
                None
            }
            Err(e) => {
                error!(target: "controls::sensor", "get_custom_sensor(): {}", e);
                None
            }
        }
    }

    //--- Manifold Lifecycle -----------------------------------------------

    /// Registers a manifold under `(owner, id)`, replacing any existing one.
    ///
    /// `logic` defaults to [`Logic::And`]. The callback runs inside
    /// `update` on every non-neutral pulse.
    ///
    /// # Errors
    ///
    /// [`ControlsError::StaleSensorHandle`] if any handle predates the last
    /// [`reset`](Self::reset). Nothing is registered in that case.
    #[allow(clippy::too_many_arguments)]
    pub fn create_sensor_manifold<F>(
        &mut self,
        owner: impl Into<Owner>,
        id: &str,
        control: ControlType,
        sensors: &[SensorHandle],
        logic: Option<Logic>,
        callback: F,
        param: Option<CallbackParam>,
    ) -> Result<(), ControlsError>
    where
        F: FnMut(&mut Controls, &ManifoldEvent) + 'static,
    {
        let owner = owner.into();
        if let Err(e) = self.registry.check_handles(sensors) {
            error!(target: "controls", "create_sensor_manifold(\"{}\"): {}", id, e);
            return Err(e);
        }

        let callback: ManifoldCallback = Rc::new(RefCell::new(callback));
        let initial_values = sensors
            .iter()
            .map(|s| self.registry.listed(*s).value)
            .collect();

        let manifold = Manifold {
            owner,
            id: id.to_string(),
            control,
            sensors: sensors.to_vec(),
            logic: logic.unwrap_or_default(),
            callback,
            param,
            pulse: PulseState::new(initial_values),
            stamp: None,
        };

        match self.registry.find(owner, id) {
            Some(handle) => {
                // Acquire before release so shared sensors never drop to zero
                let old = self.registry.replace(handle, manifold);
                self.acquire_sensors(handle, sensors);
                self.release_sensors(handle, &old.sensors);
                debug!(target: "controls", "Replaced manifold \"{}\" of {}", id, owner);
            }
            None => {
                let handle = self.registry.insert(manifold);
                self.acquire_sensors(handle, sensors);
                debug!(
                    target: "controls",
                    "Created {:?} manifold \"{}\" of {} ({} sensors)",
                    control, id, owner, sensors.len()
                );
            }
        }

        Ok(())
    }

    /// Creates a keyboard sensor and a single-sensor manifold on it.
    pub fn create_kb_sensor_manifold<F>(
        &mut self,
        owner: impl Into<Owner>,
        id: &str,
        control: ControlType,
        key: KeyCode,
        callback: F,
        param: Option<CallbackParam>,
    ) -> Result<SensorHandle, ControlsError>
    where
        F: FnMut(&mut Controls, &ManifoldEvent) + 'static,
    {
        let sensor = self.create_keyboard_sensor(key, SurfaceId::PRIMARY);
        self.create_sensor_manifold(owner, id, control, &[sensor], None, callback, param)?;
        Ok(sensor)
    }

    /// Removes one manifold, or every manifold of `owner` when `id` is
    /// `None`. Unknown owners and ids are ignored.
    pub fn remove_sensor_manifold(&mut self, owner: impl Into<Owner>, id: Option<&str>) {
        let owner = owner.into();

        let handles: Vec<ManifoldHandle> = match id {
            Some(id) => self.registry.find(owner, id).into_iter().collect(),
            None => self
                .registry
                .manifolds_of(owner)
                .map(<[ManifoldHandle]>::to_vec)
                .unwrap_or_default(),
        };

        if handles.is_empty() {
            trace!(target: "controls", "remove_sensor_manifold(): nothing registered for {} {:?}", owner, id);
            return;
        }

        for handle in handles {
            let manifold = self.registry.remove(handle);
            self.release_sensors(handle, &manifold.sensors);
            debug!(target: "controls", "Removed manifold \"{}\" of {}", manifold.id, owner);
        }
    }

    /// Checks for a manifold `(owner, id)`, or for any manifold of `owner`
    /// when `id` is `None`.
    pub fn check_sensor_manifold(&self, owner: impl Into<Owner>, id: Option<&str>) -> bool {
        let owner = owner.into();
        match id {
            Some(id) => self.registry.find(owner, id).is_some(),
            None => self.registry.manifolds_of(owner).is_some_and(|list| !list.is_empty()),
        }
    }

    /// Returns `true` if any manifold is registered at all.
    pub fn check_sensor_manifolds(&self) -> bool {
        !self.registry.owners().is_empty()
    }

    //--- Manifold-indexed Queries -----------------------------------------

    fn lookup_sensor(
        &self,
        owner: Owner,
        id: &str,
        index: usize,
    ) -> Result<SensorHandle, ControlsError> {
        if self.registry.manifolds_of(owner).is_none() {
            return Err(ControlsError::UnknownOwner(owner));
        }
        let handle = self
            .registry
            .find(owner, id)
            .ok_or_else(|| ControlsError::UnknownManifold { owner, id: id.to_string() })?;

        // Listed handles are validated at creation and cleared with reset
        let sensors = &self
            .registry
            .manifold(handle)
            .unwrap_or_else(|| panic!("Owner table lists vacant manifold {:?}", handle))
            .sensors;

        sensors.get(index).copied().ok_or_else(|| ControlsError::SensorIndexOutOfRange {
            id: id.to_string(),
            index,
            len: sensors.len(),
        })
    }

    /// Value of the `index`-th sensor of manifold `(owner, id)`.
    pub fn get_sensor_value(&self, owner: impl Into<Owner>, id: &str, index: usize) -> Option<f64> {
        match self.lookup_sensor(owner.into(), id, index) {
            Ok(handle) => Some(self.registry.listed(handle).value),
            Err(e) => {
                error!(target: "controls", "get_sensor_value(): {}", e);
                None
            }
        }
    }

    /// Payload of the `index`-th sensor of manifold `(owner, id)`.
    ///
    /// `None` also when the sensor has not produced a payload yet.
    pub fn get_sensor_payload(
        &self,
        owner: impl Into<Owner>,
        id: &str,
        index: usize,
    ) -> Option<SensorPayload> {
        match self.lookup_sensor(owner.into(), id, index) {
            Ok(handle) => self.registry.listed(handle).payload,
            Err(e) => {
                error!(target: "controls", "get_sensor_payload(): {}", e);
                None
            }
        }
    }

    /// Re-arms the timer at `index` of manifold `(owner, id)` with a new
    /// period, counted from the current timeline.
    pub fn reset_timer_sensor(
        &mut self,
        owner: impl Into<Owner>,
        id: &str,
        index: usize,
        period: f64,
    ) -> bool {
        let handle = match self.lookup_sensor(owner.into(), id, index) {
            Ok(handle) => handle,
            Err(e) => {
                error!(target: "controls", "reset_timer_sensor(): {}", e);
                return false;
            }
        };

        let timeline = self.timeline;
        match &mut self.registry.listed_mut(handle).kind {
            SensorKind::Timer(timer) => {
                timer.period = period.abs();
                timer.time_last = timeline;
                true
            }
            _ => {
                let e = ControlsError::NotATimer { id: id.to_string(), index };
                error!(target: "controls", "reset_timer_sensor(): {}", e);
                false
            }
        }
    }

    //--- Sensor Activation ------------------------------------------------

    fn acquire_sensors(&mut self, manifold: ManifoldHandle, sensors: &[SensorHandle]) {
        for sensor in sensors {
            if self.registry.acquire(*sensor, manifold) {
                self.activate_sensor(*sensor);
            }
        }
    }

    /// Drops the manifold's references; sensors left without users are
    /// torn down and freed.
    fn release_sensors(&mut self, manifold: ManifoldHandle, sensors: &[SensorHandle]) {
        for sensor in sensors {
            if self.registry.release(*sensor, manifold) {
                self.deactivate_sensor(*sensor);
                let freed = self.registry.free_sensor(*sensor);
                trace!(target: "controls::sensor", "Freed sensor {:?} ({})", sensor, freed.kind.name());
            }
        }
    }

    /// Registers the sensor's accumulator values and attaches its probe.
    fn activate_sensor(&mut self, handle: SensorHandle) {
        let timeline = self.timeline;
        let sensor = self.registry.listed_mut(handle);
        if sensor.active {
            return;
        }
        sensor.active = true;
        sensor.reseed(timeline, &*self.scene);
        if !sensor.available {
            debug!(
                target: "controls::sensor",
                "Sensor {:?} ({}) live without device, reporting neutral",
                handle,
                sensor.kind.name()
            );
            return;
        }

        let inputs = sensor.kind.inputs();
        if let Some(request) = sensor.kind.probe_request() {
            let probe = self.physics.attach_probe(&request);
            if let Some(slot) = self.registry.listed_mut(handle).kind.probe_slot() {
                *slot = Some(probe);
            }
        }

        let limits = AccumulatorLimits {
            wheel_notch_multiplier: self.config.wheel_notch_multiplier,
            max_touches: self.config.max_touches,
        };
        for (key, value) in inputs {
            let acc = self
                .accumulators
                .entry(key)
                .or_insert_with(|| Accumulator::new(key, limits));
            if acc.register_value(value) {
                debug!(target: "controls::input", "Subscribing {:?} {:?}", key, value);
                self.devices.subscribe(key, value);
            }
        }

        debug!(
            target: "controls::sensor",
            "Activated sensor {:?} ({})",
            handle,
            self.registry.listed(handle).kind.name()
        );
    }

    /// Undoes exactly what `activate_sensor` did.
    fn deactivate_sensor(&mut self, handle: SensorHandle) {
        let sensor = self.registry.listed_mut(handle);
        if !sensor.active {
            return;
        }
        sensor.active = false;
        if !sensor.available {
            return;
        }

        if let Some(probe) = sensor.kind.probe_slot().and_then(Option::take) {
            self.physics.detach_probe(probe);
        }
        sensor.reset_sample();

        for (key, value) in self.registry.listed(handle).kind.inputs() {
            let Some(acc) = self.accumulators.get_mut(&key) else {
                panic!("Sensor {:?} lost its accumulator {:?}", handle, key);
            };
            if acc.unregister_value(value) {
                debug!(target: "controls::input", "Unsubscribing {:?} {:?}", key, value);
                self.devices.unsubscribe(key, value);
            }
            if acc.is_idle() {
                self.accumulators.remove(&key);
            }
        }

        debug!(
            target: "controls::sensor",
            "Deactivated sensor {:?} ({})",
            handle,
            self.registry.listed(handle).kind.name()
        );
    }

    //--- update() ---------------------------------------------------------

    /// Runs one tick. Call once per host frame.
    ///
    /// `timeline` is the absolute host time, `elapsed` the time since the
    /// previous call (both in seconds). Calls from inside a callback are
    /// ignored with a warning.
    pub fn update(&mut self, timeline: f64, elapsed: f64) {
        if self.in_update {
            warn!(target: "controls", "update() called from a manifold callback, ignoring");
            return;
        }
        self.in_update = true;
        self.timeline = timeline;

        //--- Step 1: Route queued input --------------------------------------
        self.route_input();

        //--- Step 2: Prepare accumulators ------------------------------------
        for acc in self.accumulators.values_mut() {
            acc.prepare(&mut *self.scene);
        }

        //--- Step 3: Refresh sensors -----------------------------------------
        self.refresh_sensors(timeline, elapsed);

        //--- Step 4: Evaluate manifolds, fire callbacks ----------------------
        let fired = self.dispatch();

        //--- Step 5: Discharge transient sensors -----------------------------
        for sensor in self.registry.sensors_mut().filter(|s| s.is_live()) {
            sensor.discharge();
        }

        //--- Step 6: Trailing accumulator update -----------------------------
        for acc in self.accumulators.values_mut() {
            acc.finish_tick();
        }

        trace!(target: "controls", "Tick {} done: {} callbacks", self.tick, fired);

        //--- Step 7: Advance tick --------------------------------------------
        self.tick += 1;
        self.in_update = false;
    }

    fn route_input(&mut self) {
        if self.collector.collect_tick() == 0 {
            return;
        }

        for message in self.collector.take_batch() {
            let Some(device) = message.event.device_class() else {
                continue;
            };
            let key = AccumulatorKey::new(device, message.surface);
            match self.accumulators.get_mut(&key) {
                Some(acc) => acc.digest(&message.event),
                None => trace!(
                    target: "controls::input",
                    "No accumulator for {:?}, dropping {:?}",
                    key, message.event
                ),
            }
        }
    }

    fn refresh_sensors(&mut self, timeline: f64, elapsed: f64) {
        // Sensors left dormant by cleanup() come back with their manifolds
        let dormant: Vec<SensorHandle> = self
            .registry
            .sensors()
            .filter(|(_, s)| s.is_live() && !s.active)
            .map(|(handle, _)| handle)
            .collect();
        for handle in dormant {
            self.activate_sensor(handle);
        }

        let tick = self.tick;
        let mut ctx = RefreshContext {
            timeline,
            elapsed,
            smooth_period: self.config.smooth_period,
            accumulators: &self.accumulators,
            physics: &mut *self.physics,
            scene: &*self.scene,
        };

        for sensor in self.registry.sensors_mut() {
            if sensor.is_live() && sensor.refreshed_at != Some(tick) {
                sensor.refresh(&mut ctx);
                sensor.refreshed_at = Some(tick);
            }
        }
    }

    /// Evaluates every manifold once, owner by owner. Returns the number
    /// of callbacks fired.
    fn dispatch(&mut self) -> usize {
        let mut fired = 0;

        loop {
            let mut dirty = false;
            let owners = self.registry.owners().to_vec();

            for owner in owners {
                // Rescan this owner until a pass completes without mutation
                loop {
                    let Some(handles) = self.registry.manifolds_of(owner).map(<[_]>::to_vec)
                    else {
                        break;
                    };
                    let generation = self.registry.generation();
                    let mut mutated = false;

                    for handle in handles {
                        if self.process_manifold(handle) {
                            fired += 1;
                        }
                        if self.registry.generation() != generation {
                            mutated = true;
                            break;
                        }
                    }

                    if !mutated {
                        break;
                    }
                    dirty = true;
                    trace!(target: "controls", "Registry changed during {} scan, rescanning", owner);
                }
            }

            // Mutations may have added owners or manifolds elsewhere
            if !dirty {
                break;
            }
        }

        fired
    }

    /// Evaluates one manifold and runs its callback on a non-neutral pulse.
    fn process_manifold(&mut self, handle: ManifoldHandle) -> bool {
        let tick = self.tick;
        let Some(manifold) = self.registry.manifold(handle) else {
            return false;
        };
        if manifold.stamp == Some(tick) {
            return false;
        }

        let values: Vec<f64> = manifold
            .sensors
            .iter()
            .map(|s| self.registry.listed(*s).value)
            .collect();

        let Some(manifold) = self.registry.manifold_mut(handle) else {
            return false;
        };
        let Some(event) = manifold.evaluate(tick, &values) else {
            return false;
        };
        let callback = Rc::clone(&manifold.callback);

        let mut callback = callback.borrow_mut();
        (&mut *callback)(self, &event);
        true
    }

    //--- Lifecycle --------------------------------------------------------

    /// Deactivates every sensor, releasing subscriptions and probes, and
    /// drops accumulated device state and queued input.
    ///
    /// Manifolds stay registered; their sensors are reactivated by the
    /// next `update`.
    pub fn cleanup(&mut self) {
        let active: Vec<SensorHandle> = self
            .registry
            .sensors()
            .filter(|(_, s)| s.active)
            .map(|(handle, _)| handle)
            .collect();
        let count = active.len();

        for handle in active {
            self.deactivate_sensor(handle);
        }
        debug_assert!(self.accumulators.is_empty(), "Accumulators left after cleanup");
        self.accumulators.clear();

        let dropped = self.collector.discard_pending();
        self.timeline = 0.0;

        info!(
            target: "controls",
            "Cleanup: deactivated {} sensors, dropped {} queued events",
            count, dropped
        );
    }

    /// Cleanup plus removal of every manifold and sensor. Outstanding
    /// sensor handles become stale.
    pub fn reset(&mut self) {
        self.cleanup();
        let manifolds = self.registry.manifold_count();
        self.registry.clear();
        info!(target: "controls", "Reset: removed {} manifolds", manifolds);
    }

    //--- Diagnostics ------------------------------------------------------

    /// Counts owners, manifolds, sensors and probes, and logs them at
    /// debug level.
    pub fn debug_summary(&self) -> ControlsStats {
        let live = || self.registry.sensors().map(|(_, s)| s).filter(|s| s.is_live());
        let stats = ControlsStats {
            owners: self.registry.owners().len(),
            manifolds: self.registry.manifold_count(),
            sensors: self.registry.sensor_count(),
            live_sensors: live().count(),
            collision_probes: live()
                .filter(|s| {
                    matches!(s.kind, SensorKind::Collision { .. } | SensorKind::CollisionImpulse { .. })
                })
                .count(),
            ray_probes: live().filter(|s| matches!(s.kind, SensorKind::Ray { .. })).count(),
            accumulators: self.accumulators.len(),
            tick: self.tick,
        };

        debug!(target: "controls", "{:?}", stats);
        stats
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::{CollisionHit, ObjectId, ProbeId, ProbeRequest, RayHit, Transform};
    use crate::core::input::{DeviceClass, Modifiers, MouseButton, ValueName};
    use crate::core::manifold::Pulse;
    use crate::core::sensor::MoveAxis;
    use crate::ControlsBuilder;
    use approx::assert_relative_eq;

    //--- Test Helpers -----------------------------------------------------

    type Log = Rc<RefCell<Vec<(String, i8)>>>;
    type Counts = Rc<RefCell<HashMap<String, usize>>>;
    type Subscriptions = Rc<RefCell<Vec<(AccumulatorKey, ValueName)>>>;

    fn controls() -> Controls {
        ControlsBuilder::new().build()
    }

    fn recording(log: &Log) -> impl FnMut(&mut Controls, &ManifoldEvent) + 'static {
        let log = Rc::clone(log);
        move |_: &mut Controls, event: &ManifoldEvent| {
            log.borrow_mut().push((event.id.clone(), event.pulse.sign()));
        }
    }

    fn counter(counts: &Counts) -> impl FnMut(&mut Controls, &ManifoldEvent) + 'static {
        let counts = Rc::clone(counts);
        move |_: &mut Controls, event: &ManifoldEvent| {
            *counts.borrow_mut().entry(event.id.clone()).or_insert(0) += 1;
        }
    }

    fn entries(log: &Log) -> Vec<(String, i8)> {
        log.borrow().clone()
    }

    fn fired(id: &str, sign: i8) -> (String, i8) {
        (id.to_string(), sign)
    }

    fn key_event(key: KeyCode, down: bool) -> DeviceEvent {
        if down {
            DeviceEvent::KeyDown { key, modifiers: Modifiers::NONE }
        } else {
            DeviceEvent::KeyUp { key, modifiers: Modifiers::NONE }
        }
    }

    #[derive(Default)]
    struct RecordingDevices {
        subscribed: Subscriptions,
        unsubscribed: Subscriptions,
        gyro: bool,
    }

    impl DeviceBackend for RecordingDevices {
        fn is_available(&self, device: DeviceClass) -> bool {
            match device {
                DeviceClass::Gyro => self.gyro,
                DeviceClass::Keyboard | DeviceClass::Mouse | DeviceClass::Touch => true,
                _ => false,
            }
        }

        fn subscribe(&mut self, key: AccumulatorKey, value: ValueName) {
            self.subscribed.borrow_mut().push((key, value));
        }

        fn unsubscribe(&mut self, key: AccumulatorKey, value: ValueName) {
            self.unsubscribed.borrow_mut().push((key, value));
        }
    }

    #[derive(Default)]
    struct PhysicsLog {
        attached: Vec<ProbeRequest>,
        detached: Vec<ProbeId>,
        contact: Option<CollisionHit>,
    }

    /// Object 0 has no physics body; every other object does.
    struct RecordingPhysics(Rc<RefCell<PhysicsLog>>);

    impl PhysicsBackend for RecordingPhysics {
        fn has_physics(&self, object: ObjectId) -> bool {
            object.0 != 0
        }

        fn attach_probe(&mut self, request: &ProbeRequest) -> ProbeId {
            let mut log = self.0.borrow_mut();
            log.attached.push(request.clone());
            ProbeId(log.attached.len() as u64)
        }

        fn detach_probe(&mut self, probe: ProbeId) {
            self.0.borrow_mut().detached.push(probe);
        }

        fn poll_contact(&mut self, _probe: ProbeId) -> Option<CollisionHit> {
            self.0.borrow().contact
        }

        fn poll_impulse(&mut self, _probe: ProbeId) -> f64 {
            0.0
        }

        fn poll_ray(&mut self, _probe: ProbeId) -> Option<RayHit> {
            None
        }
    }

    /// Every press hits the same object.
    struct PickScene(Option<ObjectId>);

    impl SceneBackend for PickScene {
        fn transform(&self, _object: ObjectId) -> Option<Transform> {
            Some(Transform::IDENTITY)
        }

        fn pick_object(&mut self, _surface: SurfaceId, _x: f64, _y: f64) -> Option<ObjectId> {
            self.0
        }
    }

    /// Every object shares one transform the test moves around.
    struct MovingScene(Rc<RefCell<Transform>>);

    impl SceneBackend for MovingScene {
        fn transform(&self, _object: ObjectId) -> Option<Transform> {
            Some(*self.0.borrow())
        }

        fn pick_object(&mut self, _surface: SurfaceId, _x: f64, _y: f64) -> Option<ObjectId> {
            None
        }
    }

    fn with_devices(gyro: bool) -> (Controls, Subscriptions, Subscriptions) {
        let devices = RecordingDevices { gyro, ..RecordingDevices::default() };
        let subscribed = Rc::clone(&devices.subscribed);
        let unsubscribed = Rc::clone(&devices.unsubscribed);
        (ControlsBuilder::new().with_devices(devices).build(), subscribed, unsubscribed)
    }

    fn with_physics() -> (Controls, Rc<RefCell<PhysicsLog>>) {
        let log = Rc::new(RefCell::new(PhysicsLog::default()));
        let controls = ControlsBuilder::new()
            .with_physics(RecordingPhysics(Rc::clone(&log)))
            .build();
        (controls, log)
    }

    const PRIMARY: SurfaceId = SurfaceId::PRIMARY;

    //=====================================================================
    // Dispatch Tests
    //=====================================================================

    #[test]
    fn continuous_manifold_through_update() {
        let mut c = controls();
        let s = c.create_custom_sensor(0.0);
        let log = Log::default();
        c.create_sensor_manifold(Owner::Global, "HOLD", ControlType::Continuous, &[s], None, recording(&log), None)
            .unwrap();

        for (tick, value) in [0.0, 1.0, 1.0, 0.0].into_iter().enumerate() {
            c.set_custom_sensor(s, value);
            c.update(tick as f64 * 0.1, 0.1);
        }

        assert_eq!(entries(&log), vec![fired("HOLD", 1), fired("HOLD", 1), fired("HOLD", -1)]);
        assert_eq!(c.tick(), 4);
    }

    #[test]
    fn keyboard_trigger_fires_on_press_and_release() {
        let mut c = controls();
        let log = Log::default();
        c.create_kb_sensor_manifold(Owner::Global, "JUMP", ControlType::Trigger, KeyCode::Space, recording(&log), None)
            .unwrap();

        c.update(0.0, 0.016);
        c.push_device_event(PRIMARY, key_event(KeyCode::Space, true)).unwrap();
        c.update(0.016, 0.016);
        c.update(0.032, 0.016);
        c.push_device_event(PRIMARY, key_event(KeyCode::Space, false)).unwrap();
        c.update(0.048, 0.016);

        assert_eq!(entries(&log), vec![fired("JUMP", 1), fired("JUMP", -1)]);
    }

    #[test]
    fn callback_receives_owner_and_param() {
        let mut c = controls();
        let s = c.create_custom_sensor(1.0);
        let seen: Rc<RefCell<Option<(Owner, u32)>>> = Rc::default();
        let sink = Rc::clone(&seen);

        c.create_sensor_manifold(
            ObjectId(4),
            "PARAM",
            ControlType::Positive,
            &[s],
            None,
            move |_, event| {
                *sink.borrow_mut() = Some((event.owner, *event.param::<u32>().unwrap()));
            },
            Some(Rc::new(11u32)),
        )
        .unwrap();
        c.update(0.1, 0.1);

        assert_eq!(*seen.borrow(), Some((Owner::Object(ObjectId(4)), 11)));
    }

    #[test]
    fn or_logic_combines_sensors() {
        let mut c = controls();
        let a = c.create_custom_sensor(0.0);
        let b = c.create_custom_sensor(0.0);
        let log = Log::default();
        c.create_sensor_manifold(Owner::Global, "ANY", ControlType::Trigger, &[a, b], Some(Logic::Or), recording(&log), None)
            .unwrap();

        c.update(0.1, 0.1);
        c.set_custom_sensor(b, 1.0);
        c.update(0.2, 0.1);

        assert_eq!(entries(&log), vec![fired("ANY", 1)]);
    }

    #[test]
    fn change_manifold_fires_on_any_raw_change() {
        let mut c = controls();
        let a = c.create_custom_sensor(3.0);
        let log = Log::default();
        c.create_sensor_manifold(Owner::Global, "DIFF", ControlType::Change, &[a], None, recording(&log), None)
            .unwrap();

        c.update(0.1, 0.1);
        c.update(0.2, 0.1);
        assert!(entries(&log).is_empty(), "No change since creation");

        c.set_custom_sensor(a, 0.0);
        c.update(0.3, 0.1);
        assert_eq!(entries(&log), vec![fired("DIFF", 1)]);
    }

    //=====================================================================
    // Discharge Tests
    //=====================================================================

    #[test]
    fn shared_transient_sensor_is_discharged_after_all_callbacks() {
        let mut c = controls();
        let mv = c.create_mouse_move_sensor(MoveAxis::X, PRIMARY);
        let seen: Rc<RefCell<Vec<(String, f64)>>> = Rc::default();

        for id in ["CAMERA", "CURSOR"] {
            let seen = Rc::clone(&seen);
            c.create_sensor_manifold(
                Owner::Global,
                id,
                ControlType::Continuous,
                &[mv],
                None,
                move |controls, event| {
                    let value = controls.get_sensor_value(event.owner, &event.id, 0).unwrap();
                    seen.borrow_mut().push((event.id.clone(), value));
                },
                None,
            )
            .unwrap();
        }

        c.push_device_event(PRIMARY, DeviceEvent::MouseMoved { x: 10.0, y: 10.0 }).unwrap();
        c.update(0.0, 0.016);
        c.push_device_event(PRIMARY, DeviceEvent::MouseMoved { x: 25.0, y: 10.0 }).unwrap();
        c.update(0.016, 0.016);

        assert_eq!(
            *seen.borrow(),
            vec![("CAMERA".to_string(), 15.0), ("CURSOR".to_string(), 15.0)]
        );
        assert_eq!(c.sensor(mv).unwrap().value(), 0.0);
    }

    #[test]
    fn wheel_sensor_reports_notches_for_one_tick() {
        let mut c = controls();
        let wheel = c.create_mouse_wheel_sensor(PRIMARY);
        let log = Log::default();
        c.create_sensor_manifold(Owner::Global, "ZOOM", ControlType::Positive, &[wheel], None, recording(&log), None)
            .unwrap();

        c.push_device_event(PRIMARY, DeviceEvent::MouseWheel { delta: -240.0 }).unwrap();
        c.update(0.0, 0.016);
        let during = log.borrow().len();
        c.update(0.016, 0.016);

        assert_eq!(during, 1);
        assert_eq!(log.borrow().len(), 1, "Wheel delta must not linger");
    }

    //=====================================================================
    // Re-entrancy Tests
    //=====================================================================

    #[test]
    fn callback_replacing_own_manifold_processes_everything_once() {
        let mut c = controls();
        let on = c.create_custom_sensor(1.0);
        let counts = Counts::default();
        let owner = ObjectId(7);

        let inner = Rc::clone(&counts);
        c.create_sensor_manifold(
            owner,
            "M1",
            ControlType::Positive,
            &[on],
            None,
            move |controls, event| {
                *inner.borrow_mut().entry(event.id.clone()).or_insert(0) += 1;
                controls.remove_sensor_manifold(owner, Some("M1"));
                controls
                    .create_sensor_manifold(owner, "M4", ControlType::Positive, &[on], None, counter(&inner), None)
                    .unwrap();
            },
            None,
        )
        .unwrap();
        for id in ["M2", "M3"] {
            c.create_sensor_manifold(owner, id, ControlType::Positive, &[on], None, counter(&counts), None)
                .unwrap();
        }

        c.update(0.1, 0.1);

        let counts_after = counts.borrow().clone();
        for id in ["M1", "M2", "M3", "M4"] {
            assert_eq!(counts_after.get(id), Some(&1), "{} must run exactly once", id);
        }
        assert!(!c.check_sensor_manifold(owner, Some("M1")));
        assert!(c.check_sensor_manifold(owner, Some("M4")));
        assert_eq!(c.sensor(on).unwrap().users(), 3);

        c.update(0.2, 0.1);
        assert_eq!(counts.borrow().get("M1"), Some(&1));
        assert_eq!(counts.borrow().get("M4"), Some(&2));
    }

    #[test]
    fn manifold_created_for_new_owner_runs_same_tick() {
        let mut c = controls();
        let on = c.create_custom_sensor(1.0);
        let counts = Counts::default();

        let inner = Rc::clone(&counts);
        c.create_sensor_manifold(
            Owner::Global,
            "SPAWN",
            ControlType::Shot,
            &[on],
            None,
            move |controls, _| {
                controls
                    .create_sensor_manifold(ObjectId(9), "CHILD", ControlType::Positive, &[on], None, counter(&inner), None)
                    .unwrap();
            },
            None,
        )
        .unwrap();

        c.update(0.1, 0.1);

        assert_eq!(counts.borrow().get("CHILD"), Some(&1));
    }

    #[test]
    fn nested_update_is_ignored() {
        let mut c = controls();
        let on = c.create_custom_sensor(1.0);
        c.create_sensor_manifold(
            Owner::Global,
            "NEST",
            ControlType::Positive,
            &[on],
            None,
            |controls, _| controls.update(99.0, 1.0),
            None,
        )
        .unwrap();

        c.update(0.5, 0.1);

        assert_eq!(c.tick(), 1);
        assert_eq!(c.timeline(), 0.5);
    }

    //=====================================================================
    // Lifecycle Tests
    //=====================================================================

    #[test]
    fn shared_probe_is_attached_and_detached_once() {
        let (mut c, physics) = with_physics();
        let s = c.create_collision_sensor(ObjectId(1), Some("GROUND")).unwrap();
        assert!(physics.borrow().attached.is_empty(), "Activation is lazy");

        c.create_sensor_manifold(ObjectId(1), "A", ControlType::Positive, &[s], None, |_, _| {}, None)
            .unwrap();
        c.create_sensor_manifold(ObjectId(1), "B", ControlType::Positive, &[s], None, |_, _| {}, None)
            .unwrap();
        assert_eq!(physics.borrow().attached.len(), 1);

        c.remove_sensor_manifold(ObjectId(1), Some("A"));
        c.remove_sensor_manifold(ObjectId(1), Some("A"));
        assert!(physics.borrow().detached.is_empty());
        assert_eq!(c.sensor(s).unwrap().users(), 1);

        c.remove_sensor_manifold(ObjectId(1), Some("B"));
        assert_eq!(physics.borrow().attached.len(), 1);
        assert_eq!(physics.borrow().detached.len(), 1);
        assert!(c.sensor(s).is_none(), "Last release frees the sensor");
    }

    #[test]
    fn collision_sensor_reports_contact_payload() {
        let (mut c, physics) = with_physics();
        let s = c.create_collision_sensor(ObjectId(1), None).unwrap();
        c.create_sensor_manifold(ObjectId(1), "HIT", ControlType::Positive, &[s], None, |_, _| {}, None)
            .unwrap();

        let hit = CollisionHit { point: [1.0, 2.0, 3.0], normal: [0.0, 1.0, 0.0], distance: 0.0 };
        physics.borrow_mut().contact = Some(hit);
        c.update(0.1, 0.1);

        assert_eq!(c.get_sensor_value(ObjectId(1), "HIT", 0), Some(1.0));
        assert_eq!(c.get_sensor_payload(ObjectId(1), "HIT", 0), Some(SensorPayload::Collision(hit)));
    }

    #[test]
    fn collision_sensor_requires_physics_body() {
        let (mut c, physics) = with_physics();

        assert_eq!(
            c.create_collision_sensor(ObjectId(0), None),
            Err(ControlsError::MissingPhysicsBody(ObjectId(0)))
        );
        assert!(physics.borrow().attached.is_empty());
    }

    #[test]
    fn shared_key_sensor_subscribes_once() {
        let (mut c, subscribed, unsubscribed) = with_devices(false);
        let k = c.create_keyboard_sensor(KeyCode::KeyW, PRIMARY);

        c.create_sensor_manifold(Owner::Global, "A", ControlType::Positive, &[k], None, |_, _| {}, None)
            .unwrap();
        c.create_sensor_manifold(Owner::Global, "B", ControlType::Positive, &[k], None, |_, _| {}, None)
            .unwrap();
        assert_eq!(subscribed.borrow().len(), 1);

        c.remove_sensor_manifold(Owner::Global, Some("A"));
        assert!(unsubscribed.borrow().is_empty());

        c.remove_sensor_manifold(Owner::Global, None);
        assert_eq!(
            *unsubscribed.borrow(),
            vec![(AccumulatorKey::new(DeviceClass::Keyboard, PRIMARY), ValueName::Keys)]
        );
        assert!(c.accumulator(AccumulatorKey::new(DeviceClass::Keyboard, PRIMARY)).is_none());
    }

    #[test]
    fn replacing_manifold_keeps_subscriptions() {
        let (mut c, subscribed, unsubscribed) = with_devices(false);
        let w = c.create_keyboard_sensor(KeyCode::KeyW, PRIMARY);
        let s = c.create_keyboard_sensor(KeyCode::KeyS, PRIMARY);

        c.create_sensor_manifold(Owner::Global, "MOVE", ControlType::Positive, &[w], None, |_, _| {}, None)
            .unwrap();
        c.create_sensor_manifold(Owner::Global, "MOVE", ControlType::Positive, &[w], None, |_, _| {}, None)
            .unwrap();
        c.create_sensor_manifold(Owner::Global, "MOVE", ControlType::Positive, &[s], None, |_, _| {}, None)
            .unwrap();

        assert_eq!(subscribed.borrow().len(), 1);
        assert!(unsubscribed.borrow().is_empty());
        assert_eq!(c.debug_summary().manifolds, 1);
        assert!(c.sensor(w).is_none());
        assert!(c.sensor(s).unwrap().is_live());
    }

    #[test]
    fn released_sensors_are_freed_and_slots_reused() {
        let mut c = controls();

        for round in 0..1000 {
            c.create_kb_sensor_manifold(Owner::Global, "JUMP", ControlType::Trigger, KeyCode::Space, |_, _| {}, None)
                .unwrap();
            if round % 2 == 1 {
                c.remove_sensor_manifold(Owner::Global, Some("JUMP"));
            }
            c.update(round as f64 * 0.1, 0.1);
        }

        let stats = c.debug_summary();
        assert_eq!(stats.manifolds, 0);
        assert_eq!(stats.sensors, 0);
        assert_eq!(stats.accumulators, 0);

        c.create_kb_sensor_manifold(Owner::Global, "JUMP", ControlType::Trigger, KeyCode::Space, |_, _| {}, None)
            .unwrap();
        assert_eq!(c.debug_summary().sensors, 1);
    }

    #[test]
    fn sensor_of_removed_manifold_cannot_be_reattached() {
        let mut c = controls();
        let e = c.create_elapsed_sensor();
        c.create_sensor_manifold(Owner::Global, "DT", ControlType::Positive, &[e], None, |_, _| {}, None)
            .unwrap();
        c.remove_sensor_manifold(Owner::Global, Some("DT"));

        let fresh = c.create_custom_sensor(0.0);

        assert!(c.sensor(fresh).is_some());
        assert_eq!(
            c.create_sensor_manifold(Owner::Global, "DT", ControlType::Positive, &[e], None, |_, _| {}, None),
            Err(ControlsError::StaleSensorHandle(e))
        );
    }

    #[test]
    fn reactivated_elapsed_sensor_starts_from_zero() {
        let mut c = controls();
        let e = c.create_elapsed_sensor();
        c.create_sensor_manifold(Owner::Global, "DT", ControlType::Positive, &[e], None, |_, _| {}, None)
            .unwrap();
        c.update(1.0, 0.1);
        c.update(1.1, 0.1);
        assert_relative_eq!(c.get_sensor_value(Owner::Global, "DT", 0).unwrap(), 0.1, epsilon = 1e-9);

        c.cleanup();
        c.update(50.0, 0.1);
        assert_eq!(c.get_sensor_value(Owner::Global, "DT", 0), Some(0.0));

        c.update(50.1, 0.1);
        assert_relative_eq!(c.get_sensor_value(Owner::Global, "DT", 0).unwrap(), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn motion_sensor_joining_later_measures_from_current_pose() {
        let scene = Rc::new(RefCell::new(Transform::IDENTITY));
        let mut c = ControlsBuilder::new().with_scene(MovingScene(Rc::clone(&scene))).build();
        let m = c.create_motion_sensor(ObjectId(3), 1.0, 100.0).unwrap();

        // The object travels far while nothing references the sensor
        scene.borrow_mut().translation = [40.0, 0.0, 0.0];
        c.update(1.0, 0.1);
        let log = Log::default();
        c.create_sensor_manifold(ObjectId(3), "MOVING", ControlType::Positive, &[m], None, recording(&log), None)
            .unwrap();
        c.update(1.1, 0.1);

        assert!(log.borrow().is_empty());
        assert_eq!(
            c.get_sensor_payload(ObjectId(3), "MOVING", 0),
            Some(SensorPayload::Motion { linear: 0.0, angular: 0.0 })
        );
    }

    #[test]
    fn remove_unknown_manifold_is_noop() {
        let mut c = controls();
        c.remove_sensor_manifold(ObjectId(1), Some("NOPE"));
        c.remove_sensor_manifold(Owner::Global, None);
        assert!(!c.check_sensor_manifolds());
    }

    #[test]
    fn cleanup_releases_and_update_restores() {
        let (mut c, subscribed, unsubscribed) = with_devices(false);
        let k = c.create_keyboard_sensor(KeyCode::KeyA, PRIMARY);
        c.create_sensor_manifold(Owner::Global, "A", ControlType::Positive, &[k], None, |_, _| {}, None)
            .unwrap();

        c.cleanup();
        assert_eq!(unsubscribed.borrow().len(), 1);
        assert!(c.check_sensor_manifolds());
        assert_eq!(c.debug_summary().accumulators, 0);

        c.update(0.1, 0.1);
        assert_eq!(subscribed.borrow().len(), 2);
    }

    #[test]
    fn reset_clears_everything_and_invalidates_handles() {
        let (mut c, _subscribed, unsubscribed) = with_devices(false);
        let k = c.create_keyboard_sensor(KeyCode::KeyA, PRIMARY);
        c.create_sensor_manifold(ObjectId(2), "A", ControlType::Positive, &[k], None, |_, _| {}, None)
            .unwrap();

        c.reset();

        assert_eq!(unsubscribed.borrow().len(), 1);
        assert!(!c.check_sensor_manifolds());
        assert!(c.sensor(k).is_none());
        assert_eq!(
            c.create_sensor_manifold(Owner::Global, "B", ControlType::Positive, &[k], None, |_, _| {}, None),
            Err(ControlsError::StaleSensorHandle(k))
        );
    }

    //=====================================================================
    // Query Tests
    //=====================================================================

    #[test]
    fn sensor_queries_report_usage_errors_as_none() {
        let mut c = controls();
        let s = c.create_custom_sensor(2.0);
        c.create_sensor_manifold(Owner::Global, "A", ControlType::Positive, &[s], None, |_, _| {}, None)
            .unwrap();

        assert_eq!(c.get_sensor_value(ObjectId(5), "A", 0), None);
        assert_eq!(c.get_sensor_value(Owner::Global, "B", 0), None);
        assert_eq!(c.get_sensor_value(Owner::Global, "A", 3), None);
        assert_eq!(c.get_sensor_value(Owner::Global, "A", 0), Some(2.0));
        assert_eq!(c.get_sensor_payload(Owner::Global, "A", 0), None);
        assert!(!c.reset_timer_sensor(Owner::Global, "A", 0, 1.0));
    }

    #[test]
    fn check_sensor_manifold_with_and_without_id() {
        let mut c = controls();
        let s = c.create_custom_sensor(0.0);
        c.create_sensor_manifold(ObjectId(1), "A", ControlType::Positive, &[s], None, |_, _| {}, None)
            .unwrap();

        assert!(c.check_sensor_manifold(ObjectId(1), None));
        assert!(c.check_sensor_manifold(ObjectId(1), Some("A")));
        assert!(!c.check_sensor_manifold(ObjectId(1), Some("B")));
        assert!(!c.check_sensor_manifold(Owner::Global, None));
        assert!(c.check_sensor_manifolds());
    }

    #[test]
    fn custom_sensor_value_applies_on_refresh() {
        let mut c = controls();
        let s = c.create_custom_sensor(0.0);
        let timer = c.create_timer_sensor(1.0, true);
        c.create_sensor_manifold(Owner::Global, "A", ControlType::Positive, &[s, timer], None, |_, _| {}, None)
            .unwrap();

        assert!(c.set_custom_sensor(s, 4.0));
        assert_eq!(c.get_custom_sensor(s), Some(4.0));
        assert_eq!(c.sensor(s).unwrap().value(), 0.0);

        c.update(0.1, 0.1);
        assert_eq!(c.sensor(s).unwrap().value(), 4.0);

        assert!(!c.set_custom_sensor(timer, 1.0));
        assert_eq!(c.get_custom_sensor(timer), None);
    }

    #[test]
    fn one_shot_timer_can_be_rearmed() {
        let mut c = controls();
        let t = c.create_timer_sensor(1.0, false);
        let log = Log::default();
        c.create_sensor_manifold(Owner::Global, "T", ControlType::Positive, &[t], None, recording(&log), None)
            .unwrap();

        c.update(1.0, 1.0);
        c.update(2.0, 1.0);
        c.update(3.0, 1.0);
        assert_eq!(log.borrow().len(), 1);

        assert!(c.reset_timer_sensor(Owner::Global, "T", 0, 0.5));
        c.update(3.25, 0.25);
        assert_eq!(log.borrow().len(), 1);
        c.update(3.5, 0.25);
        assert_eq!(log.borrow().len(), 2);
    }

    //=====================================================================
    // Device Tests
    //=====================================================================

    #[test]
    fn missing_gyro_sensor_stays_neutral() {
        let mut c = controls();
        let g = c.create_gyro_angles_sensor();
        c.create_sensor_manifold(Owner::Global, "TILT", ControlType::Positive, &[g], None, |_, _| {}, None)
            .unwrap();

        c.push_device_event(PRIMARY, DeviceEvent::Orientation { alpha: 1.0, beta: 2.0, gamma: 3.0 })
            .unwrap();
        c.update(0.1, 0.1);

        let sensor = c.sensor(g).unwrap();
        assert!(!sensor.is_available());
        assert_eq!(sensor.value(), 0.0);
        assert_eq!(c.debug_summary().accumulators, 0);
    }

    #[test]
    fn present_gyro_sensor_reports_angles() {
        let (mut c, subscribed, _) = with_devices(true);
        let g = c.create_gyro_angles_sensor();
        c.create_sensor_manifold(Owner::Global, "TILT", ControlType::Positive, &[g], None, |_, _| {}, None)
            .unwrap();
        assert_eq!(
            *subscribed.borrow(),
            vec![(AccumulatorKey::new(DeviceClass::Gyro, PRIMARY), ValueName::Orientation)]
        );

        // Global devices land on the primary surface whatever the sender says
        c.push_device_event(SurfaceId(3), DeviceEvent::Orientation { alpha: 1.0, beta: 2.0, gamma: 3.0 })
            .unwrap();
        c.update(0.1, 0.1);

        assert_eq!(c.get_sensor_value(Owner::Global, "TILT", 0), Some(1.0));
        assert_eq!(
            c.get_sensor_payload(Owner::Global, "TILT", 0),
            Some(SensorPayload::Vector([1.0, 2.0, 3.0]))
        );
    }

    #[test]
    fn gamepad_slot_out_of_range_is_unavailable() {
        let mut c = controls();
        let pad = c.create_gamepad_axis_sensor(DeviceClass::GAMEPAD_SLOTS, 0);
        assert!(!c.sensor(pad).unwrap().is_available());
    }

    #[test]
    fn selection_follows_press_with_auto_release() {
        let mut c = ControlsBuilder::new().with_scene(PickScene(Some(ObjectId(3)))).build();
        let sel = c.create_selection_sensor(ObjectId(3), true, PRIMARY);
        let log = Log::default();
        c.create_sensor_manifold(Owner::Global, "SEL", ControlType::Trigger, &[sel], None, recording(&log), None)
            .unwrap();

        c.push_device_event(PRIMARY, DeviceEvent::MouseMoved { x: 5.0, y: 5.0 }).unwrap();
        c.push_device_event(
            PRIMARY,
            DeviceEvent::MouseButtonDown { button: MouseButton::Left, modifiers: Modifiers::NONE },
        )
        .unwrap();
        c.update(0.1, 0.1);
        c.update(0.2, 0.1);
        c.push_device_event(
            PRIMARY,
            DeviceEvent::MouseButtonUp { button: MouseButton::Left, modifiers: Modifiers::NONE },
        )
        .unwrap();
        c.update(0.3, 0.1);

        assert_eq!(entries(&log), vec![fired("SEL", 1), fired("SEL", -1)]);
    }

    #[test]
    fn motion_sensor_requires_transform() {
        let mut c = controls();
        assert_eq!(
            c.create_motion_sensor(ObjectId(1), 1.0, 1.0),
            Err(ControlsError::MissingTransform(ObjectId(1)))
        );

        let mut c = ControlsBuilder::new().with_scene(PickScene(None)).build();
        assert!(c.create_motion_sensor(ObjectId(1), 1.0, 1.0).is_ok());
    }

    #[test]
    fn full_input_queue_is_reported() {
        let c = ControlsBuilder::new().with_channel_capacity(1).build();

        c.push_device_event(PRIMARY, key_event(KeyCode::KeyA, true)).unwrap();
        assert_eq!(
            c.push_device_event(PRIMARY, key_event(KeyCode::KeyA, false)),
            Err(ControlsError::InputQueueFull)
        );
    }

    #[test]
    fn sender_from_other_thread_feeds_next_update() {
        let mut c = controls();
        let log = Log::default();
        c.create_kb_sensor_manifold(Owner::Global, "FIRE", ControlType::Shot, KeyCode::Enter, recording(&log), None)
            .unwrap();

        let sender = c.input_sender();
        std::thread::spawn(move || {
            sender.send_primary(key_event(KeyCode::Enter, true)).unwrap();
        })
        .join()
        .unwrap();
        c.update(0.1, 0.1);

        assert_eq!(entries(&log), vec![fired("FIRE", Pulse::Positive.sign())]);
    }

    //=====================================================================
    // Diagnostics Tests
    //=====================================================================

    #[test]
    fn debug_summary_counts_registry() {
        let (mut c, _) = with_physics();
        let col = c.create_collision_sensor(ObjectId(1), None).unwrap();
        let ray = c.create_ray_sensor(ObjectId(1), [0.0; 3], [0.0, -1.0, 0.0], true, None, true);
        let key = c.create_keyboard_sensor(KeyCode::KeyE, PRIMARY);
        let idle = c.create_custom_sensor(0.0);

        c.create_sensor_manifold(ObjectId(1), "GROUND", ControlType::Positive, &[col, ray], None, |_, _| {}, None)
            .unwrap();
        c.create_sensor_manifold(Owner::Global, "USE", ControlType::Trigger, &[key], None, |_, _| {}, None)
            .unwrap();
        c.update(0.1, 0.1);

        let stats = c.debug_summary();
        assert_eq!(stats.owners, 2);
        assert_eq!(stats.manifolds, 2);
        assert_eq!(stats.sensors, 4);
        assert_eq!(stats.live_sensors, 3);
        assert_eq!(stats.collision_probes, 1);
        assert_eq!(stats.ray_probes, 1);
        assert_eq!(stats.accumulators, 1);
        assert_eq!(stats.tick, 1);
        assert!(!c.sensor(idle).unwrap().is_live());
    }
}
