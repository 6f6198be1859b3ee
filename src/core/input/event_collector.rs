//=========================================================================
// Event Collector
//=========================================================================
//
// Bounded input queue between platform producers and the controls tick.
//
// Architecture:
//   InputSender (any thread) → Sender<InputMessage> ─┐
//                                                    ↓
//   update() → EventCollector::collect_tick() → batch → accumulators
//
// Bounded polling keeps a flooding producer from starving the tick; the
// remainder stays queued for the next one.
//
//=========================================================================

//=== External Dependencies ===============================================

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use log::warn;

//=== Internal Dependencies ===============================================

use super::event::{DeviceEvent, SurfaceId};
use crate::core::error::ControlsError;

//=== InputMessage ========================================================

/// One device event addressed to a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct InputMessage {
    pub surface: SurfaceId,
    pub event: DeviceEvent,
}

//=== InputSender =========================================================

/// Cloneable producer handle for queuing device events.
///
/// Events are never applied on send; they are routed to accumulators at
/// the start of the next `update`.
#[derive(Debug, Clone)]
pub struct InputSender {
    sender: Sender<InputMessage>,
}

impl InputSender {
    /// Queues `event` for `surface` without blocking.
    ///
    /// # Errors
    ///
    /// - [`ControlsError::InputQueueFull`] when the queue is at capacity
    /// - [`ControlsError::InputDisconnected`] when the controls were dropped
    pub fn send(&self, surface: SurfaceId, event: DeviceEvent) -> Result<(), ControlsError> {
        self.sender
            .try_send(InputMessage { surface, event })
            .map_err(|e| match e {
                TrySendError::Full(_) => ControlsError::InputQueueFull,
                TrySendError::Disconnected(_) => ControlsError::InputDisconnected,
            })
    }

    /// Queues `event` for the primary surface.
    pub fn send_primary(&self, event: DeviceEvent) -> Result<(), ControlsError> {
        self.send(SurfaceId::PRIMARY, event)
    }
}

//=== EventCollector ======================================================

/// Owns the receiving end of the input queue.
pub(crate) struct EventCollector {
    sender: Sender<InputMessage>,
    receiver: Receiver<InputMessage>,
    batch: Vec<InputMessage>,
    max_events_per_tick: usize,
}

impl EventCollector {
    pub(crate) fn new(capacity: usize, max_events_per_tick: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            batch: Vec::with_capacity(max_events_per_tick.min(64)),
            max_events_per_tick,
        }
    }

    /// Creates a new producer handle.
    pub(crate) fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
        }
    }

    /// Drains pending messages (bounded to prevent starvation).
    ///
    /// Returns the number of messages collected this tick.
    pub(crate) fn collect_tick(&mut self) -> usize {
        self.batch.clear();

        while self.batch.len() < self.max_events_per_tick {
            match self.receiver.try_recv() {
                Ok(message) => self.batch.push(message),
                // The collector holds a sender, so this cannot disconnect
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if self.batch.len() >= self.max_events_per_tick && !self.receiver.is_empty() {
            warn!(
                target: "controls::input",
                "Input backlog: drained {} events this tick, {} deferred",
                self.batch.len(),
                self.receiver.len()
            );
        }

        self.batch.len()
    }

    /// Takes ownership of the collected batch, leaving an empty vec.
    pub(crate) fn take_batch(&mut self) -> Vec<InputMessage> {
        std::mem::take(&mut self.batch)
    }

    /// Discards everything still queued.
    pub(crate) fn discard_pending(&mut self) -> usize {
        self.batch.clear();
        self.receiver.try_iter().count()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
