//! Splitters route each ball to one of their outputs.
//!
//! `alternate` cycles through the outputs in declaration order with a
//! per-instance counter. `filter(color)` sends matching balls out of the
//! first output and everything else out of the last. A filter is a color
//! gate: unless the instance is `plex`, the branch a ball takes is reported
//! to the tracker as exact evidence.

use crate::color::Color;
use crate::engine::SimError;
use crate::geometry::RelativeSide;
use crate::id::{BallId, PortId};
use crate::level::ComponentInstance;
use crate::port::{PortSet, PortSpec};

use super::{
    BallState, ComponentKind, ComponentSpec, EditorMetadata, Glyph, InstanceState, SplitPolicy,
    StateDescriptor, TransitionContext, VisualHint, VisualSpec,
};

pub const LEFT: PortId = PortId("left");
pub const RIGHT: PortId = PortId("right");

pub fn spec() -> ComponentSpec {
    ComponentSpec {
        type_name: "splitter".to_string(),
        kind: ComponentKind::Splitter,
        is_observable: false,
        ports: PortSet::new(
            vec![PortSpec::relative(PortId::IN, RelativeSide::Back).required()],
            vec![
                PortSpec::relative(LEFT, RelativeSide::Left).required(),
                PortSpec::relative(RIGHT, RelativeSide::Right).required(),
            ],
        ),
        states: vec![StateDescriptor::new(BallState::Routing, VisualHint::Moving)],
        visual: VisualSpec {
            fill: [0x4d, 0x7e, 0xa8],
            glyph: Glyph::Fork,
        },
        editor: EditorMetadata::new("Splitter", "splitter", "routing"),
    }
}

/// Pick the output for a ball of color `truth`.
pub fn choose_exit(
    instance: &ComponentInstance,
    state: &mut InstanceState,
    ports: &PortSet,
    truth: Color,
) -> Result<PortId, SimError> {
    let outputs = &ports.outputs;
    let (Some(first), Some(last)) = (outputs.first(), outputs.last()) else {
        return Err(SimError::NoOutputs(instance.id));
    };
    match instance.params.split {
        SplitPolicy::Filter(color) => Ok(if truth == color { first.id } else { last.id }),
        SplitPolicy::Alternate => {
            let InstanceState::Splitter { next } = state else {
                return Err(SimError::MissingInstanceState(instance.id));
            };
            let port = outputs[*next % outputs.len()].id;
            *next = (*next + 1) % outputs.len();
            Ok(port)
        }
    }
}

/// Tell the tracker what a filter's choice of `exit` says about `ball`.
/// Alternating and shielded splitters learn nothing.
pub fn report_route(
    ctx: &mut TransitionContext<'_>,
    instance: &ComponentInstance,
    ports: &PortSet,
    ball: BallId,
    exit: PortId,
) -> Result<(), SimError> {
    let SplitPolicy::Filter(color) = instance.params.split else {
        return Ok(());
    };
    if instance.params.plex {
        return Ok(());
    }
    let matched = ports.outputs.first().is_some_and(|p| p.id == exit);
    ctx.tracker.on_evidence(ball, |c| (*c == color) == matched)?;
    tracing::trace!(?ball, component = ?instance.id, %color, matched, "filter evidence");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Palette;
    use crate::component::{ComponentParams, on_arrival};
    use crate::fixed::seconds;
    use crate::geometry::Point;
    use crate::test_utils::{Workbench, instance};

    #[test]
    fn alternate_round_robins() {
        let spec = spec();
        let inst = instance(&spec, (0, 0), ComponentParams::default());
        let mut state = InstanceState::Splitter { next: 0 };
        let picks: Vec<PortId> = (0..4)
            .map(|_| choose_exit(&inst, &mut state, &spec.ports, Color::Red).unwrap())
            .collect();
        assert_eq!(picks, vec![LEFT, RIGHT, LEFT, RIGHT]);
    }

    #[test]
    fn filter_sorts_by_color() {
        let spec = spec();
        let params = ComponentParams {
            split: SplitPolicy::Filter(Color::Blue),
            ..ComponentParams::default()
        };
        let inst = instance(&spec, (0, 0), params);
        let mut state = InstanceState::Splitter { next: 0 };
        assert_eq!(choose_exit(&inst, &mut state, &spec.ports, Color::Blue).unwrap(), LEFT);
        assert_eq!(choose_exit(&inst, &mut state, &spec.ports, Color::Red).unwrap(), RIGHT);
        assert_eq!(state, InstanceState::Splitter { next: 0 });
    }

    fn filter(color: Color, plex: bool) -> ComponentParams {
        ComponentParams {
            split: SplitPolicy::Filter(color),
            plex,
            ..ComponentParams::default()
        }
    }

    #[test]
    fn filter_branch_is_evidence() {
        let spec = spec();
        let inst = instance(&spec, (0, 0), filter(Color::Blue, false));
        let mut bench = Workbench::new(Palette::primaries());
        let mut state = InstanceState::Splitter { next: 0 };

        let blue = bench.ball(Color::Blue, &inst);
        on_arrival(&mut bench.ctx(seconds(0.0)), &spec, &inst, &mut state, blue, Some(PortId::IN)).unwrap();
        assert_eq!(bench.balls.get(blue).unwrap().exit_port, Some(LEFT));
        assert_eq!(bench.tracker.belief(blue).unwrap().probability(&Color::Blue), 1.0);

        let red = bench.ball(Color::Red, &inst);
        on_arrival(&mut bench.ctx(seconds(0.0)), &spec, &inst, &mut state, red, Some(PortId::IN)).unwrap();
        assert_eq!(bench.balls.get(red).unwrap().exit_port, Some(RIGHT));
        let belief = bench.tracker.belief(red).unwrap();
        assert_eq!(belief.probability(&Color::Blue), 0.0);
        assert!((belief.probability(&Color::Red) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn plexed_filter_reports_nothing() {
        let spec = spec();
        let inst = instance(&spec, (0, 0), filter(Color::Blue, true));
        let mut bench = Workbench::new(Palette::primaries());
        let mut state = InstanceState::Splitter { next: 0 };
        let ball = bench.ball(Color::Blue, &inst);
        on_arrival(&mut bench.ctx(seconds(0.0)), &spec, &inst, &mut state, ball, Some(PortId::IN)).unwrap();
        assert_eq!(bench.balls.get(ball).unwrap().exit_port, Some(LEFT));
        assert_eq!(bench.tracker.observation_count(ball).unwrap(), 0);
        assert!((bench.tracker.belief(ball).unwrap().probability(&Color::Blue) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn routing_passes_through_center() {
        let spec = spec();
        let inst = instance(&spec, (1, 1), ComponentParams::default());
        let mut bench = Workbench::new(Palette::primaries());
        let ball = bench.ball(Color::Yellow, &inst);
        let mut state = InstanceState::Splitter { next: 0 };
        on_arrival(&mut bench.ctx(seconds(0.0)), &spec, &inst, &mut state, ball, Some(PortId::IN)).unwrap();

        let b = bench.balls.get(ball).unwrap();
        assert_eq!(b.exit_port, Some(LEFT));
        // Facing right, the left output is on the top edge.
        assert_eq!(
            b.trajectory.waypoints(),
            &[Point::new(1.0, 1.5), Point::new(1.5, 1.5), Point::new(1.5, 1.0)]
        );
        // Splitters are not observable.
        assert_eq!(bench.tracker.observation_count(ball).unwrap(), 0);
    }
}
