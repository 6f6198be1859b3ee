//=========================================================================
// Pulse Generation
//=========================================================================
//
// Turns a manifold's per-tick logic result into a discrete pulse.
//
// Each control type is one small state machine over the manifold's pulse
// memory. State is advanced while computing the pulse, before any
// callback runs, so a callback that queries its own manifold already sees
// the post-tick state.
//
//=========================================================================

//=== Internal Dependencies ===============================================

use super::{is_truthy, ControlType, Logic};

//=== Pulse ===============================================================

/// Non-neutral dispatch signal delivered to manifold callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pulse {
    Positive,
    Negative,
}

impl Pulse {
    /// `1` or `-1`.
    pub fn sign(self) -> i8 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }
}

//=== PulseState ==========================================================

/// Per-manifold pulse memory.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PulseState {
    /// Sign of the last registered edge; starts negative (armed).
    last_pulse: i8,
    /// Previous logic result (LEVEL).
    last_result: f64,
    /// Previous raw sensor values (CHANGE).
    last_values: Vec<f64>,
}

impl PulseState {
    /// Creates armed pulse memory. `initial_values` seeds CHANGE detection.
    pub fn new(initial_values: Vec<f64>) -> Self {
        Self {
            last_pulse: -1,
            last_result: 0.0,
            last_values: initial_values,
        }
    }

    /// Computes this tick's pulse from the current sensor values.
    pub fn next(&mut self, control: ControlType, logic: &Logic, values: &[f64]) -> Option<Pulse> {
        let edge = match control {
            ControlType::Positive => Edge::Positive,
            ControlType::Continuous => Edge::Continuous,
            ControlType::Trigger => Edge::Trigger,
            ControlType::Shot => Edge::Shot,
            ControlType::Level => Edge::Level,
            ControlType::Change => return self.diff(values),
        };

        let result = logic.evaluate(values);
        let pulse = self.edge(edge, result);
        self.last_result = result;
        pulse
    }

    /// CHANGE: any raw value differs from the previous tick.
    fn diff(&mut self, values: &[f64]) -> Option<Pulse> {
        let changed = self.last_values.len() != values.len()
            || self
                .last_values
                .iter()
                .zip(values)
                .any(|(last, curr)| !same_value(*last, *curr));
        self.last_values.clear();
        self.last_values.extend_from_slice(values);
        changed.then_some(Pulse::Positive)
    }

    fn edge(&mut self, edge: Edge, result: f64) -> Option<Pulse> {
        let truthy = is_truthy(result);

        match edge {
            Edge::Positive => truthy.then_some(Pulse::Positive),

            Edge::Continuous => {
                if truthy {
                    self.last_pulse = 1;
                    Some(Pulse::Positive)
                } else if self.last_pulse == 1 {
                    self.last_pulse = -1;
                    Some(Pulse::Negative)
                } else {
                    None
                }
            }

            Edge::Trigger => {
                if truthy && self.last_pulse == -1 {
                    self.last_pulse = 1;
                    Some(Pulse::Positive)
                } else if !truthy && self.last_pulse == 1 {
                    self.last_pulse = -1;
                    Some(Pulse::Negative)
                } else {
                    None
                }
            }

            Edge::Shot => {
                if truthy && self.last_pulse == -1 {
                    self.last_pulse = 1;
                    Some(Pulse::Positive)
                } else {
                    if !truthy && self.last_pulse == 1 {
                        // Falling edge re-arms silently
                        self.last_pulse = -1;
                    }
                    None
                }
            }

            Edge::Level => (!same_value(result, self.last_result)).then_some(Pulse::Positive),
        }
    }
}

//--- Helpers --------------------------------------------------------------

/// Control types driven by the logic result.
#[derive(Debug, Clone, Copy)]
enum Edge {
    Positive,
    Continuous,
    Trigger,
    Shot,
    Level,
}

/// Equality where NaN matches NaN, so a sensor stuck at NaN stays quiet.
fn same_value(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

//=========================================================================
// Unit Tests
//=========================================================================
