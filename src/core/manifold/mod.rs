//=========================================================================
// Manifold
//=========================================================================
//
// Named composition of sensors, a logic function, a control type and a
// callback.
//
// Evaluation (once per tick, stamped):
//   sensor values → Logic::evaluate() → PulseState::next(control type)
//                                            ↓
//                       Some(pulse) → callback(controls, event)
//
// Manifolds are addressed by (owner, id). They never mutate sensors; the
// only state they advance is their own pulse memory.
//
//=========================================================================

//=== Submodules ==========================================================

mod pulse;

pub use pulse::Pulse;
pub(crate) use pulse::PulseState;

//=== External Dependencies ===============================================

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

//=== Internal Dependencies ===============================================

use crate::core::registry::Owner;
use crate::core::sensor::SensorHandle;
use crate::core::Controls;

//=== ManifoldHandle ======================================================

/// Arena slot of a registered manifold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManifoldHandle(pub(crate) usize);

//=== ControlType =========================================================

/// Selects how a logic result is turned into a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlType {
    /// Positive pulse on every tick the logic result is truthy.
    Positive,
    /// Positive pulse while truthy, one negative pulse when it turns falsy.
    Continuous,
    /// Positive pulse on the rising edge, negative on the falling edge.
    Trigger,
    /// Positive pulse on the rising edge only.
    Shot,
    /// Positive pulse whenever the logic result differs from last tick.
    Level,
    /// Positive pulse whenever any raw sensor value differs from last tick.
    /// The logic function is not consulted.
    Change,
}

//=== Logic ===============================================================

/// Reduces a manifold's sensor values to one result.
///
/// Results are numbers; `0.0` and `NaN` are falsy.
pub enum Logic {
    /// First falsy value, or the last value.
    And,
    /// First truthy value, or the last value.
    Or,
    Custom(Box<dyn Fn(&[f64]) -> f64>),
}

impl Logic {
    /// Wraps a numeric reduction.
    pub fn custom(f: impl Fn(&[f64]) -> f64 + 'static) -> Self {
        Self::Custom(Box::new(f))
    }

    /// Wraps a boolean predicate (`true` → `1.0`).
    pub fn predicate(f: impl Fn(&[f64]) -> bool + 'static) -> Self {
        Self::Custom(Box::new(move |values| if f(values) { 1.0 } else { 0.0 }))
    }

    /// Applies the logic to `values`. An empty list yields `0.0`.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        match self {
            Self::And => values
                .iter()
                .copied()
                .find(|v| !is_truthy(*v))
                .or_else(|| values.last().copied())
                .unwrap_or(0.0),
            Self::Or => values
                .iter()
                .copied()
                .find(|v| is_truthy(*v))
                .or_else(|| values.last().copied())
                .unwrap_or(0.0),
            Self::Custom(f) => f(values),
        }
    }
}

impl Default for Logic {
    fn default() -> Self {
        Self::And
    }
}

impl fmt::Debug for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("And"),
            Self::Or => f.write_str("Or"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

pub(crate) fn is_truthy(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

//=== ManifoldEvent =======================================================

/// Opaque user value handed back to the callback on every pulse.
pub type CallbackParam = Rc<dyn Any>;

/// Arguments of a manifold callback.
#[derive(Clone)]
pub struct ManifoldEvent {
    pub owner: Owner,
    pub id: String,
    pub pulse: Pulse,
    pub param: Option<CallbackParam>,
}

impl ManifoldEvent {
    /// Downcasts the callback parameter.
    pub fn param<T: 'static>(&self) -> Option<&T> {
        self.param.as_deref().and_then(|p| p.downcast_ref::<T>())
    }
}

impl fmt::Debug for ManifoldEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifoldEvent")
            .field("owner", &self.owner)
            .field("id", &self.id)
            .field("pulse", &self.pulse)
            .field("param", &self.param.is_some())
            .finish()
    }
}

/// Shared callback slot. Cloned out of the manifold before invocation so
/// the callback may freely mutate the registry.
pub type ManifoldCallback = Rc<RefCell<dyn FnMut(&mut Controls, &ManifoldEvent)>>;

//=== Manifold ============================================================

pub(crate) struct Manifold {
    pub owner: Owner,
    pub id: String,
    pub control: ControlType,
    pub sensors: Vec<SensorHandle>,
    pub logic: Logic,
    pub callback: ManifoldCallback,
    pub param: Option<CallbackParam>,
    pub pulse: PulseState,
    /// Tick at which this manifold was last evaluated.
    pub stamp: Option<u64>,
}

impl Manifold {
    /// Evaluates the manifold for `tick` and advances its pulse memory.
    ///
    /// Returns the event to dispatch, or `None` for a neutral pulse or
    /// when the manifold was already evaluated this tick.
    pub fn evaluate(&mut self, tick: u64, values: &[f64]) -> Option<ManifoldEvent> {
        if self.stamp == Some(tick) {
            return None;
        }
        self.stamp = Some(tick);

        let pulse = self.pulse.next(self.control, &self.logic, values)?;
        Some(ManifoldEvent {
            owner: self.owner,
            id: self.id.clone(),
            pulse,
            param: self.param.clone(),
        })
    }
}

impl fmt::Debug for Manifold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manifold")
            .field("owner", &self.owner)
            .field("id", &self.id)
            .field("control", &self.control)
            .field("sensors", &self.sensors)
            .field("logic", &self.logic)
            .field("stamp", &self.stamp)
            .finish()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
