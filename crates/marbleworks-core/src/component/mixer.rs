//! Mixers merge two balls into one.
//!
//! The first ball to reach the center parks there. When a second one
//! arrives both are destroyed and a child with the mixed color is emitted
//! from the center. The child's belief is the push-forward of the two
//! parents' beliefs through the mixing rule.

use crate::color::Color;
use crate::engine::SimError;
use crate::event::SimEvent;
use crate::geometry::RelativeSide;
use crate::id::{BallId, PortId};
use crate::level::ComponentInstance;
use crate::port::{PortSet, PortSpec};

use super::{
    BallState, Completion, ComponentKind, ComponentSpec, EditorMetadata, Glyph, InstanceState,
    StateDescriptor, TransitionContext, VisualHint, VisualSpec, enter_state,
};

pub const IN_A: PortId = PortId("in_a");
pub const IN_B: PortId = PortId("in_b");

pub fn spec() -> ComponentSpec {
    ComponentSpec {
        type_name: "mixer".to_string(),
        kind: ComponentKind::Mixer,
        is_observable: false,
        ports: PortSet::new(
            vec![
                PortSpec::relative(IN_A, RelativeSide::Back).required(),
                PortSpec::relative(IN_B, RelativeSide::Left).required(),
            ],
            vec![PortSpec::relative(PortId::OUT, RelativeSide::Front).required()],
        ),
        states: vec![
            StateDescriptor::new(BallState::Entering, VisualHint::Moving),
            StateDescriptor::new(BallState::Waiting, VisualHint::Held),
            StateDescriptor::new(BallState::Emitting, VisualHint::Moving),
        ],
        visual: VisualSpec {
            fill: [0x8e, 0x5a, 0x9e],
            glyph: Glyph::Funnel,
        },
        editor: EditorMetadata::new("Mixer", "mixer", "transform"),
    }
}

/// A ball has reached the mixer's center: park it, or merge it with the
/// ball already waiting.
pub fn settle(
    ctx: &mut TransitionContext<'_>,
    spec: &ComponentSpec,
    instance: &ComponentInstance,
    state: &mut InstanceState,
    ball: BallId,
) -> Result<Completion, SimError> {
    let InstanceState::Mixer { waiting } = state else {
        return Err(SimError::MissingInstanceState(instance.id));
    };

    let Some(partner) = waiting.take() else {
        enter_state(ctx, spec, instance, ball, BallState::Waiting)?;
        if let Some(b) = ctx.balls.get_mut(ball) {
            b.parked = true;
        }
        *waiting = Some(ball);
        return Ok(Completion::Parked);
    };

    let first = ctx
        .balls
        .get(partner)
        .ok_or(SimError::UnknownBall(partner))?
        .color;
    let second = ctx.balls.get(ball).ok_or(SimError::UnknownBall(ball))?.color;
    let child = ctx.balls.spawn(
        Color::mix(first, second),
        instance.id,
        BallState::Emitting,
        instance.position.center(),
        ctx.time,
    );
    ctx.tracker.combine(child, [partner, ball], Color::mix)?;
    for parent in [partner, ball] {
        ctx.tracker.forget(parent);
        ctx.balls.remove(parent);
    }
    tracing::debug!(?partner, ?ball, ?child, component = ?instance.id, "balls merged");
    ctx.events.push(SimEvent::BallsMerged {
        parents: [partner, ball],
        child,
        component: instance.id,
        time: ctx.time,
    });
    enter_state(ctx, spec, instance, child, BallState::Emitting)?;
    Ok(Completion::Removed)
}
