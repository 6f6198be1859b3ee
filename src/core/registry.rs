//=========================================================================
// Registry
//=========================================================================
//
// Arena storage for sensors and manifolds plus the owner table.
//
// Layout:
//   sensors:   Vec<SensorSlot>          (handle = slot + slot epoch, free list reuse)
//   manifolds: Vec<Option<Manifold>>    (handle = slot, free list reuse)
//   owners:    Owner → [ManifoldHandle] (insertion ordered)
//
// Every manifold mutation bumps `generation`. The update loop compares
// generations around each callback to detect re-entrant mutation.
//
// Sensor reference counting lives on the sensor itself (`users`); the
// registry keeps it consistent with the manifolds that list the sensor.
// A sensor slot is freed once its last user lets go; freeing bumps the
// slot epoch so outstanding handles go stale before the slot is reused.
// Side effects of activation (subscriptions, probes) belong to `Controls`.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::fmt;

//=== Internal Dependencies ===============================================

use crate::core::backend::ObjectId;
use crate::core::error::ControlsError;
use crate::core::manifold::{Manifold, ManifoldHandle};
use crate::core::sensor::{Sensor, SensorHandle};

//=== Owner ===============================================================

/// Key grouping a set of manifolds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    /// The reserved "no owner" singleton.
    Global,
    Object(ObjectId),
}

impl From<ObjectId> for Owner {
    fn from(object: ObjectId) -> Self {
        Self::Object(object)
    }
}

impl From<Option<ObjectId>> for Owner {
    fn from(object: Option<ObjectId>) -> Self {
        object.map_or(Self::Global, Self::Object)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global owner"),
            Self::Object(obj) => write!(f, "object {}", obj.0),
        }
    }
}

//=== Registry ============================================================

#[derive(Debug)]
struct SensorSlot {
    epoch: u32,
    sensor: Option<Sensor>,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    sensors: Vec<SensorSlot>,
    free_sensors: Vec<usize>,
    manifolds: Vec<Option<Manifold>>,
    free: Vec<usize>,
    owner_order: Vec<Owner>,
    owners: HashMap<Owner, Vec<ManifoldHandle>>,
    generation: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    //--- Sensors ----------------------------------------------------------

    pub fn add_sensor(&mut self, sensor: Sensor) -> SensorHandle {
        let index = match self.free_sensors.pop() {
            Some(index) => {
                self.sensors[index].sensor = Some(sensor);
                index
            }
            None => {
                self.sensors.push(SensorSlot { epoch: 0, sensor: Some(sensor) });
                self.sensors.len() - 1
            }
        };
        SensorHandle {
            index,
            epoch: self.sensors[index].epoch,
        }
    }

    /// Vacates the sensor's slot and invalidates its handles.
    pub fn free_sensor(&mut self, handle: SensorHandle) -> Sensor {
        let slot = &mut self.sensors[handle.index];
        let Some(sensor) = slot.sensor.take() else {
            panic!("Freeing vacant sensor slot {:?}", handle);
        };
        assert!(sensor.users.is_empty(), "Freeing sensor {:?} still in use", handle);
        slot.epoch = slot.epoch.wrapping_add(1);
        self.free_sensors.push(handle.index);
        sensor
    }

    fn check_handle(&self, handle: SensorHandle) -> Result<(), ControlsError> {
        match self.sensors.get(handle.index) {
            Some(SensorSlot { epoch, sensor: Some(_) }) if *epoch == handle.epoch => Ok(()),
            _ => Err(ControlsError::StaleSensorHandle(handle)),
        }
    }

    /// Validates every handle of a sensor list.
    pub fn check_handles(&self, handles: &[SensorHandle]) -> Result<(), ControlsError> {
        handles.iter().try_for_each(|h| self.check_handle(*h))
    }

    pub fn sensor(&self, handle: SensorHandle) -> Result<&Sensor, ControlsError> {
        self.check_handle(handle)?;
        Ok(self.listed(handle))
    }

    pub fn sensor_mut(&mut self, handle: SensorHandle) -> Result<&mut Sensor, ControlsError> {
        self.check_handle(handle)?;
        Ok(self.listed_mut(handle))
    }

    /// Sensor referenced by a registered manifold.
    ///
    /// # Panics
    ///
    /// Panics on a vacant slot: listed sensors hold a user and are never freed.
    pub fn listed(&self, handle: SensorHandle) -> &Sensor {
        self.sensors[handle.index]
            .sensor
            .as_ref()
            .unwrap_or_else(|| panic!("Manifold lists vacant sensor {:?}", handle))
    }

    pub fn listed_mut(&mut self, handle: SensorHandle) -> &mut Sensor {
        self.sensors[handle.index]
            .sensor
            .as_mut()
            .unwrap_or_else(|| panic!("Manifold lists vacant sensor {:?}", handle))
    }

    /// Occupied sensor slots with their current handles.
    pub fn sensors(&self) -> impl Iterator<Item = (SensorHandle, &Sensor)> {
        self.sensors.iter().enumerate().filter_map(|(index, slot)| {
            let handle = SensorHandle { index, epoch: slot.epoch };
            slot.sensor.as_ref().map(|sensor| (handle, sensor))
        })
    }

    pub fn sensors_mut(&mut self) -> impl Iterator<Item = &mut Sensor> {
        self.sensors.iter_mut().filter_map(|slot| slot.sensor.as_mut())
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len() - self.free_sensors.len()
    }

    /// Adds `manifold` to the sensor's users.
    ///
    /// Returns `true` when this is the sensor's first user.
    pub fn acquire(&mut self, sensor: SensorHandle, manifold: ManifoldHandle) -> bool {
        let users = &mut self.listed_mut(sensor).users;
        users.push(manifold);
        users.len() == 1
    }

    /// Removes one `manifold` entry from the sensor's users.
    ///
    /// Returns `true` when the sensor has no users left.
    ///
    /// # Panics
    ///
    /// Panics when the manifold is not a user of the sensor.
    pub fn release(&mut self, sensor: SensorHandle, manifold: ManifoldHandle) -> bool {
        let users = &mut self.listed_mut(sensor).users;
        let Some(pos) = users.iter().position(|m| *m == manifold) else {
            panic!(
                "Sensor {:?} missing user {:?}: reference counts out of sync",
                sensor, manifold
            );
        };
        users.swap_remove(pos);
        users.is_empty()
    }

    //--- Manifolds --------------------------------------------------------

    pub fn find(&self, owner: Owner, id: &str) -> Option<ManifoldHandle> {
        self.owners
            .get(&owner)?
            .iter()
            .copied()
            .find(|h| self.manifold(*h).is_some_and(|m| m.id == id))
    }

    pub fn manifold(&self, handle: ManifoldHandle) -> Option<&Manifold> {
        self.manifolds.get(handle.0).and_then(Option::as_ref)
    }

    pub fn manifold_mut(&mut self, handle: ManifoldHandle) -> Option<&mut Manifold> {
        self.manifolds.get_mut(handle.0).and_then(Option::as_mut)
    }

    /// Registers a new manifold at the end of its owner's list.
    pub fn insert(&mut self, manifold: Manifold) -> ManifoldHandle {
        let owner = manifold.owner;
        let handle = match self.free.pop() {
            Some(slot) => {
                self.manifolds[slot] = Some(manifold);
                ManifoldHandle(slot)
            }
            None => {
                self.manifolds.push(Some(manifold));
                ManifoldHandle(self.manifolds.len() - 1)
            }
        };

        self.owners
            .entry(owner)
            .or_insert_with(|| {
                self.owner_order.push(owner);
                Vec::new()
            })
            .push(handle);
        self.generation += 1;
        handle
    }

    /// Swaps the manifold in `handle`'s slot, keeping its position.
    pub fn replace(&mut self, handle: ManifoldHandle, manifold: Manifold) -> Manifold {
        let slot = self
            .manifolds
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("Replacing vacant manifold slot {:?}", handle));
        assert_eq!(slot.owner, manifold.owner, "Manifold replacement across owners");

        self.generation += 1;
        std::mem::replace(slot, manifold)
    }

    /// Unregisters a manifold and drops its owner entry once empty.
    ///
    /// # Panics
    ///
    /// Panics when the owner table does not list the handle.
    pub fn remove(&mut self, handle: ManifoldHandle) -> Manifold {
        let manifold = self
            .manifolds
            .get_mut(handle.0)
            .and_then(Option::take)
            .unwrap_or_else(|| panic!("Removing vacant manifold slot {:?}", handle));
        self.free.push(handle.0);

        let owner = manifold.owner;
        let list = self
            .owners
            .get_mut(&owner)
            .unwrap_or_else(|| panic!("Owner table lost {} for {:?}", owner, handle));
        let Some(pos) = list.iter().position(|h| *h == handle) else {
            panic!("Owner table for {} does not list {:?}", owner, handle);
        };
        list.remove(pos);

        if list.is_empty() {
            self.owners.remove(&owner);
            self.owner_order.retain(|o| *o != owner);
        }

        self.generation += 1;
        manifold
    }

    //--- Owners -----------------------------------------------------------

    /// Owners in registration order.
    pub fn owners(&self) -> &[Owner] {
        &self.owner_order
    }

    pub fn manifolds_of(&self, owner: Owner) -> Option<&[ManifoldHandle]> {
        self.owners.get(&owner).map(Vec::as_slice)
    }

    pub fn manifold_count(&self) -> usize {
        self.owners.values().map(Vec::len).sum()
    }

    //--- Lifecycle --------------------------------------------------------

    /// Drops everything and invalidates all outstanding sensor handles.
    pub fn clear(&mut self) {
        self.free_sensors.clear();
        for (index, slot) in self.sensors.iter_mut().enumerate().rev() {
            slot.sensor = None;
            slot.epoch = slot.epoch.wrapping_add(1);
            self.free_sensors.push(index);
        }
        self.manifolds.clear();
        self.free.clear();
        self.owner_order.clear();
        self.owners.clear();
        self.generation += 1;
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifold::{ControlType, Logic, ManifoldEvent, PulseState};
    use crate::core::sensor::SensorKind;
    use crate::core::Controls;
    use std::cell::RefCell;
    use std::rc::Rc;

    //--- Test Helpers -----------------------------------------------------

    fn manifold(owner: Owner, id: &str, sensors: Vec<SensorHandle>) -> Manifold {
        Manifold {
            owner,
            id: id.to_string(),
            control: ControlType::Positive,
            sensors,
            logic: Logic::And,
            callback: Rc::new(RefCell::new(|_: &mut Controls, _: &ManifoldEvent| {})),
            param: None,
            pulse: PulseState::new(Vec::new()),
            stamp: None,
        }
    }

    fn custom() -> Sensor {
        Sensor::new(SensorKind::Custom { target: 0.0 }, true)
    }

    const A: Owner = Owner::Object(ObjectId(1));
    const B: Owner = Owner::Object(ObjectId(2));

    //=====================================================================
    // Owner Table Tests
    //=====================================================================

    #[test]
    fn owners_keep_registration_order() {
        let mut reg = Registry::new();
        reg.insert(manifold(B, "x", vec![]));
        reg.insert(manifold(Owner::Global, "y", vec![]));
        reg.insert(manifold(A, "z", vec![]));
        reg.insert(manifold(B, "w", vec![]));

        assert_eq!(reg.owners(), &[B, Owner::Global, A]);
        assert_eq!(reg.manifolds_of(B).unwrap().len(), 2);
        assert_eq!(reg.manifold_count(), 4);
    }

    #[test]
    fn removing_last_manifold_drops_owner() {
        let mut reg = Registry::new();
        let h = reg.insert(manifold(A, "only", vec![]));

        reg.remove(h);

        assert!(reg.owners().is_empty());
        assert!(reg.manifolds_of(A).is_none());
        assert_eq!(reg.find(A, "only"), None);
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut reg = Registry::new();
        let first = reg.insert(manifold(A, "a", vec![]));
        reg.remove(first);
        let second = reg.insert(manifold(B, "b", vec![]));

        assert_eq!(first, second);
        assert_eq!(reg.manifold(second).unwrap().id, "b");
    }

    #[test]
    fn replace_keeps_position() {
        let mut reg = Registry::new();
        let first = reg.insert(manifold(A, "first", vec![]));
        reg.insert(manifold(A, "second", vec![]));

        let old = reg.replace(first, manifold(A, "first", vec![]));

        assert_eq!(old.id, "first");
        assert_eq!(reg.manifolds_of(A).unwrap()[0], first);
    }

    #[test]
    fn mutations_bump_generation() {
        let mut reg = Registry::new();
        let g0 = reg.generation();
        let h = reg.insert(manifold(A, "a", vec![]));
        let g1 = reg.generation();
        reg.remove(h);

        assert!(g1 > g0);
        assert!(reg.generation() > g1);
    }

    //=====================================================================
    // Sensor Reference Tests
    //=====================================================================

    #[test]
    fn acquire_and_release_report_transitions() {
        let mut reg = Registry::new();
        let s = reg.add_sensor(custom());
        let (m1, m2) = (ManifoldHandle(0), ManifoldHandle(1));

        assert!(reg.acquire(s, m1));
        assert!(!reg.acquire(s, m2));
        assert!(!reg.release(s, m1));
        assert!(reg.release(s, m2));
    }

    #[test]
    #[should_panic(expected = "reference counts out of sync")]
    fn release_of_unknown_user_panics() {
        let mut reg = Registry::new();
        let s = reg.add_sensor(custom());
        reg.release(s, ManifoldHandle(3));
    }

    #[test]
    fn freed_sensor_slot_is_reused_with_new_epoch() {
        let mut reg = Registry::new();
        let first = reg.add_sensor(custom());
        reg.acquire(first, ManifoldHandle(0));
        assert!(reg.release(first, ManifoldHandle(0)));
        reg.free_sensor(first);

        let second = reg.add_sensor(custom());

        assert_eq!(second.index, first.index);
        assert_ne!(second, first);
        assert_eq!(reg.sensor(first).unwrap_err(), ControlsError::StaleSensorHandle(first));
        assert!(reg.sensor(second).is_ok());
        assert_eq!(reg.sensor_count(), 1);
    }

    #[test]
    #[should_panic(expected = "still in use")]
    fn freeing_used_sensor_panics() {
        let mut reg = Registry::new();
        let s = reg.add_sensor(custom());
        reg.acquire(s, ManifoldHandle(0));
        reg.free_sensor(s);
    }

    #[test]
    fn clear_invalidates_handles() {
        let mut reg = Registry::new();
        let s = reg.add_sensor(custom());
        reg.clear();
        let fresh = reg.add_sensor(custom());

        assert_eq!(reg.sensor(s).unwrap_err(), ControlsError::StaleSensorHandle(s));
        assert_eq!(fresh.index, s.index);
        assert_eq!(reg.sensor_count(), 1);
    }
}
