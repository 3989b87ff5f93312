//! Simulation events for the presentation layer.
//!
//! The engine records what happened to balls during each step (spawns,
//! arrivals, observations, merges, consumption) into a pre-allocated
//! [`EventBuffer`] ring. A UI reads or drains the buffer between steps; when
//! nobody drains it, the oldest events are dropped.

use crate::color::Color;
use crate::fixed::SimTime;
use crate::id::{BallId, ComponentId, PortId};

/// Default ring capacity used by the engine.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A simulation event. Every event carries the simulated instant it
/// occurred at, which may lie inside the step that recorded it.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    BallSpawned {
        ball: BallId,
        component: ComponentId,
        time: SimTime,
    },
    BallArrived {
        ball: BallId,
        component: ComponentId,
        port: PortId,
        time: SimTime,
    },
    /// An observable component reported a reading to the tracker.
    BallObserved {
        ball: BallId,
        component: ComponentId,
        reading: Color,
        time: SimTime,
    },
    BallsMerged {
        parents: [BallId; 2],
        child: BallId,
        component: ComponentId,
        time: SimTime,
    },
    /// A sink destroyed the ball. `belief_in_truth` is the probability the
    /// tracker assigned to the true color at that moment.
    BallConsumed {
        ball: BallId,
        component: ComponentId,
        truth: Color,
        belief_in_truth: f64,
        time: SimTime,
    },
    /// The ball left through an output port with nothing wired to it.
    BallLost {
        ball: BallId,
        component: ComponentId,
        port: PortId,
        time: SimTime,
    },
}

impl SimEvent {
    pub fn time(&self) -> SimTime {
        match self {
            SimEvent::BallSpawned { time, .. }
            | SimEvent::BallArrived { time, .. }
            | SimEvent::BallObserved { time, .. }
            | SimEvent::BallsMerged { time, .. }
            | SimEvent::BallConsumed { time, .. }
            | SimEvent::BallLost { time, .. } => *time,
        }
    }

    /// The component the event happened at.
    pub fn component(&self) -> ComponentId {
        match self {
            SimEvent::BallSpawned { component, .. }
            | SimEvent::BallArrived { component, .. }
            | SimEvent::BallObserved { component, .. }
            | SimEvent::BallsMerged { component, .. }
            | SimEvent::BallConsumed { component, .. }
            | SimEvent::BallLost { component, .. } => *component,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<SimEvent>>,
    /// Next write position.
    head: usize,
    len: usize,
    /// Total events ever written, including dropped ones.
    total_written: u64,
    /// Events handed out by `drain` or discarded by `clear`.
    drained: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
            drained: 0,
        }
    }

    pub fn push(&mut self, event: SimEvent) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Events lost to overwriting since creation.
    pub fn dropped_count(&self) -> u64 {
        self.total_written
            .saturating_sub(self.len as u64)
            .saturating_sub(self.drained)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> EventBufferIter<'_> {
        EventBufferIter {
            buffer: self,
            index: self.oldest(),
            remaining: self.len,
        }
    }

    /// Remove and return every stored event, oldest first.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        let start = self.oldest();
        let cap = self.capacity();
        let mut out = Vec::with_capacity(self.len);
        for i in 0..self.len {
            if let Some(e) = self.events[(start + i) % cap].take() {
                out.push(e);
            }
        }
        self.drained += out.len() as u64;
        self.head = 0;
        self.len = 0;
        out
    }

    pub fn clear(&mut self) {
        self.drained += self.len as u64;
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }

    fn oldest(&self) -> usize {
        if self.len < self.capacity() {
            (self.head + self.capacity() - self.len) % self.capacity()
        } else {
            self.head
        }
    }
}

/// Iterator over an [`EventBuffer`], oldest to newest.
pub struct EventBufferIter<'a> {
    buffer: &'a EventBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventBufferIter<'a> {
    type Item = &'a SimEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.buffer.events[self.index].as_ref();
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventBufferIter<'_> {}
