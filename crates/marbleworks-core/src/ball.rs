//! Balls and the arena that owns them.
//!
//! A ball belongs to exactly one component at a time. Only the engine
//! mutates balls, through the owning component's transitions; everything
//! else reads them by [`BallId`].

use slotmap::SlotMap;

use crate::color::Color;
use crate::component::BallState;
use crate::fixed::{SimTime, checked_seconds, to_seconds};
use crate::geometry::Point;
use crate::id::{BallId, ComponentId, PortId};
use crate::trajectory::Trajectory;

/// A ball travelling through the factory.
#[derive(Debug, Clone)]
pub struct Ball {
    pub id: BallId,
    /// Hidden. Transitions read and write it; the presentation layer only
    /// sees the tracker's belief.
    pub(crate) color: Color,
    pub component: ComponentId,
    pub state: BallState,
    pub trajectory: Trajectory,
    /// When the current trajectory started.
    pub trajectory_start: SimTime,
    /// Port the ball entered its current component through. `None` for balls
    /// that were emitted or merged in place.
    pub entry_port: Option<PortId>,
    /// Port the ball will leave through, once chosen.
    pub exit_port: Option<PortId>,
    /// Parked balls hold position until a transition releases them.
    pub parked: bool,
    pub spawned_at: SimTime,
    /// Position in spawn order. Never reused within an arena.
    pub seq: u64,
}

impl Ball {
    /// The true color. For grading and tests, never for inference.
    pub fn ground_truth(&self) -> Color {
        self.color
    }

    /// The instant the current trajectory finishes, or `None` if it lies
    /// outside the representable time range.
    pub fn completes_at(&self) -> Option<SimTime> {
        let duration = checked_seconds(self.trajectory.duration())?;
        self.trajectory_start.checked_add(duration)
    }

    /// Position at simulated time `now`. Clamped to the trajectory's ends.
    pub fn position_at(&self, now: SimTime) -> Point {
        let elapsed = to_seconds(now.saturating_sub(self.trajectory_start));
        self.trajectory.position_at(elapsed)
    }

    /// Replace the trajectory, starting it at `start`.
    pub(crate) fn set_trajectory(&mut self, trajectory: Trajectory, start: SimTime) {
        self.trajectory = trajectory;
        self.trajectory_start = start;
    }
}

// ---------------------------------------------------------------------------
// BallArena
// ---------------------------------------------------------------------------

/// Ball storage keyed by [`BallId`], remembering insertion order.
///
/// Iteration follows insertion order so that same-instant arrivals update
/// the tracker in the same sequence on every run.
#[derive(Debug, Default)]
pub struct BallArena {
    balls: SlotMap<BallId, Ball>,
    order: Vec<BallId>,
    next_seq: u64,
}

impl BallArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ball owned by `component`. The caller attaches the real
    /// trajectory via the component's arrival transition.
    pub fn spawn(
        &mut self,
        color: Color,
        component: ComponentId,
        state: BallState,
        at: Point,
        time: SimTime,
    ) -> BallId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = self.balls.insert_with_key(|id| Ball {
            id,
            color,
            component,
            state,
            trajectory: Trajectory::stationary(at),
            trajectory_start: time,
            entry_port: None,
            exit_port: None,
            parked: false,
            spawned_at: time,
            seq,
        });
        self.order.push(id);
        id
    }

    pub fn remove(&mut self, id: BallId) -> Option<Ball> {
        let ball = self.balls.remove(id)?;
        self.order.retain(|b| *b != id);
        Some(ball)
    }

    pub fn get(&self, id: BallId) -> Option<&Ball> {
        self.balls.get(id)
    }

    pub fn get_mut(&mut self, id: BallId) -> Option<&mut Ball> {
        self.balls.get_mut(id)
    }

    pub fn contains(&self, id: BallId) -> bool {
        self.balls.contains_key(id)
    }

    /// Live balls, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Ball> + '_ {
        self.order.iter().filter_map(|id| self.balls.get(*id))
    }

    /// The `seq` the next spawned ball will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Ids in insertion order.
    pub fn order(&self) -> &[BallId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.balls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balls.is_empty()
    }
}
