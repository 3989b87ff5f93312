//! The simulation engine: owns the balls, the tracker, and per-instance
//! state, and drives them through a [`Level`].
//!
//! # Step pipeline
//!
//! Each step covers the half-open interval `(now, now + dt]` and runs:
//! 1. **Schedule** -- every source emission and every unparked ball
//!    completion due by the end of the step goes on a time-ordered agenda.
//! 2. **Run** -- agenda entries are handled earliest first, ties broken by
//!    emissions before completions and then by spawn order. A completion
//!    runs the transition at its exact instant and, on exit, hands the ball
//!    to whatever the output port is wired to. Balls spawned or rescheduled
//!    along the way join the same agenda, so the outcome does not depend on
//!    the step length.
//! 3. **Bookkeeping** -- clock, tick counter, state hash.
//!
//! Any error aborts the step and is returned to the caller.

use std::collections::BTreeSet;

use slotmap::{Key, SecondaryMap};

use crate::ball::{Ball, BallArena};
use crate::color::Color;
use crate::component::source::{self, SourceState};
use crate::component::{
    Completion, ComponentKind, InstanceState, TransitionContext, on_arrival,
    on_trajectory_complete,
};
use crate::distribution::DistributionError;
use crate::event::{DEFAULT_EVENT_CAPACITY, EventBuffer, SimEvent};
use crate::fixed::SimTime;
use crate::id::{BallId, ComponentId};
use crate::level::Level;
use crate::rng::SimRng;
use crate::sim::{AdvanceResult, SimState, SimulationStrategy, StateHash};
use crate::tracker::{BayesianTracker, TrackerError};
use crate::trajectory::TrajectoryError;

/// Completions one ball may go through in a single step before the engine
/// assumes it is stuck in a zero-length loop.
pub const DEFAULT_HOP_LIMIT: u32 = 64;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("unknown ball {0:?}")]
    UnknownBall(BallId),
    #[error("unknown component {0:?}")]
    UnknownComponent(ComponentId),
    #[error("component {0:?} has no runtime state of the expected kind")]
    MissingInstanceState(ComponentId),
    #[error("component {0:?} has no output ports")]
    NoOutputs(ComponentId),
    #[error("component {0:?} has no input ports")]
    NoInput(ComponentId),
    #[error("ball {ball:?} finished its path in {component:?} without an exit port")]
    NoExit { component: ComponentId, ball: BallId },
    #[error("trajectory in component {component:?}")]
    Trajectory {
        component: ComponentId,
        #[source]
        source: TrajectoryError,
    },
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error("source interval must be positive, got {0}")]
    InvalidInterval(f64),
    #[error("step length must be positive, got {0}")]
    InvalidStep(SimTime),
    #[error("ball {ball:?} completed more than {limit} paths in one step")]
    HopLimitExceeded { ball: BallId, limit: u32 },
    #[error("ball {0:?} finishes its path outside the representable time range")]
    TimeOverflow(BallId),
    #[error("simulation clock overflowed")]
    ClockOverflow,
}

/// Something due to happen inside the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Agendum {
    /// A source's next emission, keyed by the source's position in the level.
    Emit(usize, ComponentId),
    /// A ball's current trajectory completes, keyed by spawn order.
    Complete(u64, BallId),
}

/// Work for one step, ordered by `(instant, emissions first, spawn order)`.
/// Anything past the end of the step is left for a later step.
#[derive(Debug)]
struct Agenda {
    end: SimTime,
    entries: BTreeSet<(SimTime, Agendum)>,
}

impl Agenda {
    fn new(end: SimTime) -> Self {
        Self {
            end,
            entries: BTreeSet::new(),
        }
    }

    fn push(&mut self, at: SimTime, item: Agendum) {
        if at <= self.end {
            self.entries.insert((at, item));
        }
    }

    fn pop(&mut self) -> Option<(SimTime, Agendum)> {
        self.entries.pop_first()
    }
}

/// The simulation engine.
#[derive(Debug)]
pub struct Engine {
    level: Level,
    strategy: SimulationStrategy,
    sim_state: SimState,
    balls: BallArena,
    tracker: BayesianTracker,
    events: EventBuffer,
    instance_states: SecondaryMap<ComponentId, InstanceState>,
    hop_limit: u32,
    last_state_hash: u64,
}

impl Engine {
    /// Set up runtime state for every instance in `level`.
    ///
    /// Each source draws its color schedule, and each sensor seeds its noise,
    /// from its own stream derived from the level seed and the instance's
    /// position in the level.
    pub fn new(level: Level, strategy: SimulationStrategy) -> Result<Self, SimError> {
        match strategy {
            SimulationStrategy::Fixed { timestep } if timestep <= SimTime::ZERO => {
                return Err(SimError::InvalidStep(timestep));
            }
            _ => {}
        }

        let tracker = BayesianTracker::with_prior(level.palette().clone(), level.prior().clone())?;
        let mut instance_states = SecondaryMap::new();
        for (index, instance) in level.instances().enumerate() {
            let stream = SimRng::derive(level.seed(), index as u64);
            let state = match instance.kind {
                ComponentKind::Splitter => InstanceState::Splitter { next: 0 },
                ComponentKind::Mixer => InstanceState::Mixer { waiting: None },
                ComponentKind::Sensor => InstanceState::Sensor { rng: stream },
                ComponentKind::Source => {
                    let mut rng = stream;
                    InstanceState::Source(SourceState::new(&instance.params, level.prior(), &mut rng)?)
                }
                ComponentKind::Conveyor | ComponentKind::Painter | ComponentKind::Sink => {
                    InstanceState::Stateless
                }
            };
            instance_states.insert(instance.id, state);
        }

        tracing::debug!(
            level = %level.name(),
            instances = level.len(),
            seed = level.seed(),
            "engine created"
        );

        let mut engine = Self {
            level,
            strategy,
            sim_state: SimState::new(),
            balls: BallArena::new(),
            tracker,
            events: EventBuffer::new(DEFAULT_EVENT_CAPACITY),
            instance_states,
            hop_limit: DEFAULT_HOP_LIMIT,
            last_state_hash: 0,
        };
        engine.last_state_hash = engine.compute_state_hash();
        Ok(engine)
    }

    /// Replace the event buffer with an empty one of `capacity`.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventBuffer::new(capacity);
        self
    }

    pub fn with_hop_limit(mut self, limit: u32) -> Self {
        self.hop_limit = limit.max(1);
        self
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Advance the simulation by `dt` according to the strategy.
    ///
    /// - **Fixed**: `dt` is accumulated; as many whole timesteps run as fit.
    /// - **Variable**: exactly one step of length `dt` runs.
    pub fn advance(&mut self, dt: SimTime) -> Result<AdvanceResult, SimError> {
        if dt < SimTime::ZERO {
            return Err(SimError::InvalidStep(dt));
        }
        let mut result = AdvanceResult::default();
        match self.strategy {
            SimulationStrategy::Fixed { timestep } => {
                self.sim_state.accumulator = self
                    .sim_state
                    .accumulator
                    .checked_add(dt)
                    .ok_or(SimError::ClockOverflow)?;
                while self.sim_state.accumulator >= timestep {
                    self.sim_state.accumulator -= timestep;
                    self.step_internal(timestep)?;
                    result.steps_run += 1;
                }
            }
            SimulationStrategy::Variable => {
                self.step_internal(dt)?;
                result.steps_run += 1;
            }
        }
        Ok(result)
    }

    /// Run one step of the strategy's natural length. In variable mode that
    /// is a zero-length step.
    pub fn step(&mut self) -> Result<AdvanceResult, SimError> {
        self.step_internal(self.strategy.step_length())?;
        Ok(AdvanceResult { steps_run: 1 })
    }

    fn step_internal(&mut self, dt: SimTime) -> Result<(), SimError> {
        let end = self
            .sim_state
            .time
            .checked_add(dt)
            .ok_or(SimError::ClockOverflow)?;

        let mut agenda = Agenda::new(end);
        self.phase_schedule(&mut agenda)?;
        self.phase_run(&mut agenda)?;
        self.phase_bookkeeping(end);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Phase 1: Schedule
    // -----------------------------------------------------------------------

    /// Seed the agenda with every source emission and every unparked ball
    /// completion that falls inside the step.
    fn phase_schedule(&mut self, agenda: &mut Agenda) -> Result<(), SimError> {
        for (index, instance) in self.level.instances().enumerate() {
            let Some(InstanceState::Source(source)) = self.instance_states.get(instance.id) else {
                continue;
            };
            if let Some(at) = source.next_emit() {
                agenda.push(at, Agendum::Emit(index, instance.id));
            }
        }
        let live: Vec<BallId> = self.balls.order().to_vec();
        for ball in live {
            self.schedule_ball(agenda, ball)?;
        }
        Ok(())
    }

    fn schedule_ball(&self, agenda: &mut Agenda, ball: BallId) -> Result<(), SimError> {
        let Some(b) = self.balls.get(ball) else {
            return Ok(());
        };
        if b.parked {
            return Ok(());
        }
        let done = b.completes_at().ok_or(SimError::TimeOverflow(ball))?;
        agenda.push(done, Agendum::Complete(b.seq, ball));
        Ok(())
    }

    /// Schedule every ball spawned at or after `since`.
    fn schedule_spawned(&self, agenda: &mut Agenda, since: u64) -> Result<(), SimError> {
        let fresh: Vec<BallId> = self
            .balls
            .order()
            .iter()
            .rev()
            .filter_map(|id| self.balls.get(*id))
            .take_while(|b| b.seq >= since)
            .map(|b| b.id)
            .collect();
        for ball in fresh.into_iter().rev() {
            self.schedule_ball(agenda, ball)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Phase 2: Run
    // -----------------------------------------------------------------------

    /// Pop agenda entries in time order until nothing is left inside the
    /// step. Everything an entry spawns or reschedules goes back on the
    /// agenda, so same-step arrivals are handled at their own instants.
    fn phase_run(&mut self, agenda: &mut Agenda) -> Result<(), SimError> {
        let mut hops: SecondaryMap<BallId, u32> = SecondaryMap::new();
        while let Some((at, item)) = agenda.pop() {
            match item {
                Agendum::Emit(index, source) => self.run_emission(agenda, index, source, at)?,
                Agendum::Complete(_, ball) => self.run_completion(agenda, &mut hops, ball, at)?,
            }
        }
        Ok(())
    }

    fn run_emission(
        &mut self,
        agenda: &mut Agenda,
        index: usize,
        source: ComponentId,
        at: SimTime,
    ) -> Result<(), SimError> {
        let instance = self
            .level
            .instance(source)
            .ok_or(SimError::UnknownComponent(source))?;
        let spec = self
            .level
            .spec_of(source)
            .ok_or(SimError::UnknownComponent(source))?;
        let state = self
            .instance_states
            .get_mut(source)
            .ok_or(SimError::MissingInstanceState(source))?;
        let mut ctx = TransitionContext {
            time: at,
            balls: &mut self.balls,
            tracker: &mut self.tracker,
            events: &mut self.events,
        };
        let spawned = source::emit_due(&mut ctx, spec, instance, state, at)?;
        if let InstanceState::Source(s) = state {
            if let Some(next) = s.next_emit() {
                agenda.push(next, Agendum::Emit(index, source));
            }
        }
        for ball in spawned {
            self.schedule_ball(agenda, ball)?;
        }
        Ok(())
    }

    fn run_completion(
        &mut self,
        agenda: &mut Agenda,
        hops: &mut SecondaryMap<BallId, u32>,
        ball: BallId,
        at: SimTime,
    ) -> Result<(), SimError> {
        // Entries go stale when a ball is removed, parked, or re-routed.
        let Some(b) = self.balls.get(ball) else {
            return Ok(());
        };
        if b.parked || b.completes_at() != Some(at) {
            return Ok(());
        }
        let component = b.component;

        let count = hops.get(ball).copied().unwrap_or(0) + 1;
        if count > self.hop_limit {
            return Err(SimError::HopLimitExceeded {
                ball,
                limit: self.hop_limit,
            });
        }
        hops.insert(ball, count);

        let since = self.balls.next_seq();
        let instance = self
            .level
            .instance(component)
            .ok_or(SimError::UnknownComponent(component))?;
        let spec = self
            .level
            .spec_of(component)
            .ok_or(SimError::UnknownComponent(component))?;
        let state = self
            .instance_states
            .get_mut(component)
            .ok_or(SimError::MissingInstanceState(component))?;
        let mut ctx = TransitionContext {
            time: at,
            balls: &mut self.balls,
            tracker: &mut self.tracker,
            events: &mut self.events,
        };
        let port = match on_trajectory_complete(&mut ctx, spec, instance, state, ball)? {
            Completion::Exit(port) => port,
            Completion::Parked | Completion::Removed => {
                return self.schedule_spawned(agenda, since);
            }
        };

        let Some(link) = self.level.connection(component, port).copied() else {
            tracing::debug!(?ball, ?component, %port, "ball lost at unconnected output");
            self.tracker.forget(ball);
            self.balls.remove(ball);
            self.events.push(SimEvent::BallLost {
                ball,
                component,
                port,
                time: at,
            });
            return Ok(());
        };

        let next = self
            .level
            .instance(link.to)
            .ok_or(SimError::UnknownComponent(link.to))?;
        let next_spec = self
            .level
            .spec_of(link.to)
            .ok_or(SimError::UnknownComponent(link.to))?;
        let next_state = self
            .instance_states
            .get_mut(link.to)
            .ok_or(SimError::MissingInstanceState(link.to))?;
        let mut ctx = TransitionContext {
            time: at,
            balls: &mut self.balls,
            tracker: &mut self.tracker,
            events: &mut self.events,
        };
        on_arrival(&mut ctx, next_spec, next, next_state, ball, Some(link.to_port))?;
        self.schedule_ball(agenda, ball)?;
        self.schedule_spawned(agenda, since)
    }

    // -----------------------------------------------------------------------
    // Phase 3: Bookkeeping
    // -----------------------------------------------------------------------

    fn phase_bookkeeping(&mut self, end: SimTime) {
        self.sim_state.time = end;
        self.sim_state.tick += 1;
        self.last_state_hash = self.compute_state_hash();
    }

    /// Deterministic hash over the clock, every live ball, its belief, and
    /// every instance's runtime state.
    fn compute_state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.sim_state.tick);
        hasher.write_time(self.sim_state.time);

        for ball in self.balls.iter() {
            hasher.write_u64(ball.id.data().as_ffi());
            hasher.write_u64(ball.component.data().as_ffi());
            hasher.write_u8(ball.color.index());
            hasher.write_u8(ball.state.index());
            hasher.write_u8(u8::from(ball.parked));
            hasher.write_time(ball.trajectory_start);
            if let Ok(belief) = self.tracker.belief(ball.id) {
                for (color, p) in belief.iter() {
                    hasher.write_u8(color.index());
                    hasher.write_f64(p);
                }
            }
        }

        for instance in self.level.instances() {
            match self.instance_states.get(instance.id) {
                Some(InstanceState::Splitter { next }) => hasher.write_u64(*next as u64),
                Some(InstanceState::Mixer { waiting }) => {
                    hasher.write_u64(waiting.map_or(0, |b| b.data().as_ffi()));
                }
                Some(InstanceState::Sensor { rng }) => hasher.write_u64(rng.state()),
                Some(InstanceState::Source(s)) => hasher.write_u64(s.emitted() as u64),
                Some(InstanceState::Stateless) | None => hasher.write_u8(0),
            }
        }

        hasher.finish()
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Put a new ball of `color` into `component` through its first input
    /// port, at the current time. The tracker starts it on the level prior.
    pub fn place_ball(&mut self, color: Color, component: ComponentId) -> Result<BallId, SimError> {
        let instance = self
            .level
            .instance(component)
            .ok_or(SimError::UnknownComponent(component))?;
        let spec = self
            .level
            .spec_of(component)
            .ok_or(SimError::UnknownComponent(component))?;
        let port = spec
            .ports
            .primary_input()
            .ok_or(SimError::NoInput(component))?;
        let state = self
            .instance_states
            .get_mut(component)
            .ok_or(SimError::MissingInstanceState(component))?;

        let now = self.sim_state.time;
        let at = port.point(instance.position, instance.params.direction);
        let ball = self
            .balls
            .spawn(color, component, spec.kind.initial_state(), at, now);
        self.tracker.register(ball)?;
        self.events.push(SimEvent::BallSpawned {
            ball,
            component,
            time: now,
        });
        tracing::debug!(?ball, ?component, "ball placed");

        let mut ctx = TransitionContext {
            time: now,
            balls: &mut self.balls,
            tracker: &mut self.tracker,
            events: &mut self.events,
        };
        on_arrival(&mut ctx, spec, instance, state, ball, Some(port.id))?;
        Ok(ball)
    }

    // -----------------------------------------------------------------------
    // Query API (read-only)
    // -----------------------------------------------------------------------

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn strategy(&self) -> SimulationStrategy {
        self.strategy
    }

    pub fn ball(&self, id: BallId) -> Option<&Ball> {
        self.balls.get(id)
    }

    /// Live balls in insertion order.
    pub fn balls(&self) -> impl Iterator<Item = &Ball> + '_ {
        self.balls.iter()
    }

    pub fn ball_count(&self) -> usize {
        self.balls.len()
    }

    pub fn tracker(&self) -> &BayesianTracker {
        &self.tracker
    }

    pub fn instance_state(&self, component: ComponentId) -> Option<&InstanceState> {
        self.instance_states.get(component)
    }

    pub fn time(&self) -> SimTime {
        self.sim_state.time
    }

    pub fn tick(&self) -> u64 {
        self.sim_state.tick
    }

    pub fn sim_state(&self) -> &SimState {
        &self.sim_state
    }

    /// Hash of the state at the end of the last step.
    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    pub fn events(&self) -> &EventBuffer {
        &self.events
    }

    /// Take all buffered events, oldest first.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }

    /// True once every source has emitted its schedule and no ball is left.
    pub fn is_idle(&self) -> bool {
        self.balls.is_empty()
            && self.instance_states.values().all(|s| match s {
                InstanceState::Source(source) => source.remaining() == 0,
                _ => true,
            })
    }
}
