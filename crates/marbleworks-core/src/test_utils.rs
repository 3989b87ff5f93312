//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use std::sync::atomic::{AtomicU32, Ordering};

use slotmap::KeyData;

use crate::ball::BallArena;
use crate::color::{Color, Palette};
use crate::component::{ComponentParams, ComponentSpec, TransitionContext};
use crate::engine::{Engine, SimError};
use crate::event::{EventBuffer, SimEvent};
use crate::fixed::{SimTime, seconds};
use crate::geometry::{Direction, GridPosition};
use crate::id::{BallId, ComponentId, ComponentTypeId};
use crate::level::{ComponentInstance, LevelBuilder};
use crate::registry::ComponentRegistry;
use crate::render::{Shape, Surface};
use crate::sim::SimulationStrategy;
use crate::tracker::BayesianTracker;

// ===========================================================================
// Instances and a bench to run transitions on
// ===========================================================================

static NEXT_INSTANCE: AtomicU32 = AtomicU32::new(0);

/// A free-standing instance of `spec` at `position`, with a fresh id.
pub fn instance(spec: &ComponentSpec, position: (i32, i32), params: ComponentParams) -> ComponentInstance {
    let index = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
    ComponentInstance {
        id: ComponentId::from(KeyData::from_ffi((1u64 << 32) | u64::from(index))),
        type_id: ComponentTypeId(0),
        type_name: spec.type_name.clone(),
        kind: spec.kind,
        position: GridPosition::from(position),
        params,
    }
}

/// The engine-owned state a transition touches, without an engine.
pub struct Workbench {
    pub balls: BallArena,
    pub tracker: BayesianTracker,
    pub events: EventBuffer,
}

impl Workbench {
    pub fn new(palette: Palette) -> Self {
        Self {
            balls: BallArena::new(),
            tracker: BayesianTracker::new(palette),
            events: EventBuffer::new(256),
        }
    }

    pub fn ctx(&mut self, time: SimTime) -> TransitionContext<'_> {
        TransitionContext {
            time,
            balls: &mut self.balls,
            tracker: &mut self.tracker,
            events: &mut self.events,
        }
    }

    /// A tracked ball of `color` sitting at the center of `instance`, in the
    /// kind's initial state.
    pub fn ball(&mut self, color: Color, instance: &ComponentInstance) -> BallId {
        let id = self.balls.spawn(
            color,
            instance.id,
            instance.kind.initial_state(),
            instance.position.center(),
            SimTime::ZERO,
        );
        // Fresh ids are never registered twice.
        let _ = self.tracker.register(id);
        id
    }
}

// ===========================================================================
// Levels and engines
// ===========================================================================

pub fn builder() -> LevelBuilder {
    LevelBuilder::new(ComponentRegistry::with_builtins().unwrap())
}

pub fn facing(direction: Direction) -> ComponentParams {
    ComponentParams {
        direction,
        ..ComponentParams::default()
    }
}

/// Source params emitting exactly `colors`, one per `interval` seconds.
pub fn emitting(colors: &[Color], interval: f64) -> ComponentParams {
    ComponentParams {
        sequence: colors.to_vec(),
        interval,
        ..ComponentParams::default()
    }
}

pub fn fixed_step(timestep: f64) -> SimulationStrategy {
    SimulationStrategy::Fixed {
        timestep: seconds(timestep),
    }
}

/// Step until the engine is idle or `max_steps` have run. Returns the
/// number of steps taken.
pub fn run_until_idle(engine: &mut Engine, max_steps: u64) -> Result<u64, SimError> {
    let mut steps = 0;
    while !engine.is_idle() && steps < max_steps {
        engine.step()?;
        steps += 1;
    }
    Ok(steps)
}

/// `(truth, belief_in_truth)` for every consumption, in event order.
pub fn consumed(events: &[SimEvent]) -> Vec<(Color, f64)> {
    events
        .iter()
        .filter_map(|e| match e {
            SimEvent::BallConsumed {
                truth,
                belief_in_truth,
                ..
            } => Some((*truth, *belief_in_truth)),
            _ => None,
        })
        .collect()
}

// ===========================================================================
// Rendering
// ===========================================================================

/// A surface that records what it is asked to draw.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub grid_size: Option<f64>,
    pub shapes: Vec<Shape>,
}

impl RecordingSurface {
    pub fn new(grid_size: Option<f64>) -> Self {
        Self {
            grid_size,
            shapes: Vec::new(),
        }
    }
}

impl Surface for RecordingSurface {
    fn grid_size(&self) -> Option<f64> {
        self.grid_size
    }

    fn draw(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }
}
