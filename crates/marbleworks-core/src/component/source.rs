//! Sources emit balls on a fixed schedule.
//!
//! The colors a source will emit are drawn when the engine is built, from a
//! per-source RNG stream derived from the level seed. Emission itself is then
//! pure bookkeeping: at `k * interval` the `k`-th scheduled ball appears at
//! the source's center and heads for its output.

use crate::color::Color;
use crate::distribution::{Distribution, DistributionError};
use crate::engine::SimError;
use crate::event::SimEvent;
use crate::fixed::{SimTime, checked_seconds};
use crate::geometry::RelativeSide;
use crate::id::{BallId, PortId};
use crate::level::ComponentInstance;
use crate::port::{PortSet, PortSpec};
use crate::rng::SimRng;
use crate::tracker::Belief;

use super::{
    BallState, ComponentKind, ComponentParams, ComponentSpec, EditorMetadata, Glyph,
    InstanceState, StateDescriptor, TransitionContext, VisualHint, VisualSpec, enter_state,
};

pub fn spec() -> ComponentSpec {
    let mut editor = EditorMetadata::new("Source", "source", "io");
    editor.default_params.count = 5;
    ComponentSpec {
        type_name: "source".to_string(),
        kind: ComponentKind::Source,
        is_observable: false,
        ports: PortSet::new(
            Vec::new(),
            vec![PortSpec::relative(PortId::OUT, RelativeSide::Front).required()],
        ),
        states: vec![StateDescriptor::new(BallState::Emitting, VisualHint::Moving)],
        visual: VisualSpec {
            fill: [0x5f, 0x8f, 0x4e],
            glyph: Glyph::Spout,
        },
        editor,
    }
}

/// Emission schedule and progress of one source instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceState {
    schedule: Vec<Color>,
    emitted: usize,
    next_emit: SimTime,
    interval: SimTime,
    /// Prior for emitted balls when the source's mix is known.
    prior: Option<Belief>,
}

impl SourceState {
    /// Draw the emission schedule for a source with `params`.
    ///
    /// An explicit `sequence` is used as is. Otherwise `count` colors are
    /// drawn from `weights`, or from `level_prior` when no weights are set.
    pub fn new(params: &ComponentParams, level_prior: &Belief, rng: &mut SimRng) -> Result<Self, SimError> {
        let interval = checked_seconds(params.interval)
            .filter(|t| *t > SimTime::ZERO)
            .ok_or(SimError::InvalidInterval(params.interval))?;

        let mix = if params.weights.is_empty() {
            None
        } else {
            Some(Distribution::from_weights(params.weights.iter().copied())?)
        };

        let schedule = if !params.sequence.is_empty() {
            params.sequence.clone()
        } else {
            let draw_from = mix.as_ref().unwrap_or(level_prior);
            let items: Vec<(Color, f64)> = draw_from.iter().map(|(c, p)| (*c, p)).collect();
            (0..params.count)
                .map(|_| rng.choose_weighted(&items).ok_or(DistributionError::ZeroMass))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            schedule,
            emitted: 0,
            next_emit: SimTime::ZERO,
            interval,
            prior: if params.sequence.is_empty() { mix } else { None },
        })
    }

    pub fn schedule(&self) -> &[Color] {
        &self.schedule
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn remaining(&self) -> usize {
        self.schedule.len() - self.emitted
    }

    /// When the next ball appears, if any are left.
    pub fn next_emit(&self) -> Option<SimTime> {
        (self.emitted < self.schedule.len()).then_some(self.next_emit)
    }

    fn due(&self, now: SimTime) -> Option<(Color, SimTime)> {
        let at = self.next_emit()?;
        (at <= now).then(|| (self.schedule[self.emitted], at))
    }

    fn advance(&mut self) {
        self.emitted += 1;
        match self.next_emit.checked_add(self.interval) {
            Some(t) => self.next_emit = t,
            None => self.emitted = self.schedule.len(),
        }
    }
}

/// Emit every ball scheduled at or before `now`, each at its own instant.
pub fn emit_due(
    ctx: &mut TransitionContext<'_>,
    spec: &ComponentSpec,
    instance: &ComponentInstance,
    state: &mut InstanceState,
    now: SimTime,
) -> Result<Vec<BallId>, SimError> {
    let InstanceState::Source(source) = state else {
        return Err(SimError::MissingInstanceState(instance.id));
    };
    let mut spawned = Vec::new();
    while let Some((color, at)) = source.due(now) {
        ctx.time = at;
        let ball = ctx.balls.spawn(
            color,
            instance.id,
            BallState::Emitting,
            instance.position.center(),
            at,
        );
        match &source.prior {
            Some(prior) => ctx.tracker.register_with_prior(ball, prior.clone())?,
            None => ctx.tracker.register(ball)?,
        }
        tracing::debug!(?ball, component = ?instance.id, time = %at, "ball spawned");
        ctx.events.push(SimEvent::BallSpawned {
            ball,
            component: instance.id,
            time: at,
        });
        enter_state(ctx, spec, instance, ball, BallState::Emitting)?;
        source.advance();
        spawned.push(ball);
    }
    Ok(spawned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Palette;
    use crate::fixed::seconds;
    use crate::test_utils::{Workbench, instance};

    fn uniform() -> Belief {
        Distribution::uniform(Palette::primaries().iter()).unwrap()
    }

    #[test]
    fn sequence_overrides_count() {
        let params = ComponentParams {
            sequence: vec![Color::Blue, Color::Red],
            count: 9,
            ..ComponentParams::default()
        };
        let s = SourceState::new(&params, &uniform(), &mut SimRng::new(0)).unwrap();
        assert_eq!(s.schedule(), &[Color::Blue, Color::Red]);
        assert_eq!(s.remaining(), 2);
    }

    #[test]
    fn weights_restrict_schedule() {
        let params = ComponentParams {
            weights: vec![(Color::Yellow, 1.0), (Color::Blue, 0.0)],
            count: 20,
            ..ComponentParams::default()
        };
        let s = SourceState::new(&params, &uniform(), &mut SimRng::new(3)).unwrap();
        assert_eq!(s.schedule().len(), 20);
        assert!(s.schedule().iter().all(|c| *c == Color::Yellow));
    }

    #[test]
    fn same_seed_same_schedule() {
        let params = ComponentParams {
            count: 50,
            ..ComponentParams::default()
        };
        let a = SourceState::new(&params, &uniform(), &mut SimRng::new(42)).unwrap();
        let b = SourceState::new(&params, &uniform(), &mut SimRng::new(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_interval_is_rejected() {
        let params = ComponentParams {
            interval: 0.0,
            ..ComponentParams::default()
        };
        assert!(matches!(
            SourceState::new(&params, &uniform(), &mut SimRng::new(0)),
            Err(SimError::InvalidInterval(_))
        ));
    }

    #[test]
    fn emits_on_schedule_at_exact_instants() {
        let spec = spec();
        let params = ComponentParams {
            sequence: vec![Color::Red, Color::Yellow, Color::Blue],
            interval: 0.5,
            ..ComponentParams::default()
        };
        let inst = instance(&spec, (0, 0), params.clone());
        let mut state = InstanceState::Source(
            SourceState::new(&params, &uniform(), &mut SimRng::new(0)).unwrap(),
        );
        let mut bench = Workbench::new(Palette::primaries());

        let first = emit_due(&mut bench.ctx(seconds(0.75)), &spec, &inst, &mut state, seconds(0.75)).unwrap();
        assert_eq!(first.len(), 2);
        let starts: Vec<SimTime> = first
            .iter()
            .map(|b| bench.balls.get(*b).unwrap().trajectory_start)
            .collect();
        assert_eq!(starts, vec![seconds(0.0), seconds(0.5)]);
        assert_eq!(bench.balls.get(first[0]).unwrap().exit_port, Some(PortId::OUT));

        let rest = emit_due(&mut bench.ctx(seconds(5.0)), &spec, &inst, &mut state, seconds(5.0)).unwrap();
        assert_eq!(rest.len(), 1);
        let InstanceState::Source(source) = &state else {
            panic!("source state expected");
        };
        assert_eq!(source.next_emit(), None);
    }
}
