//! Sinks consume balls and report how well the tracker knew them.

use crate::engine::SimError;
use crate::event::SimEvent;
use crate::geometry::RelativeSide;
use crate::id::{BallId, PortId};
use crate::level::ComponentInstance;
use crate::port::{PortSet, PortSpec};

use super::{
    BallState, Completion, ComponentKind, ComponentSpec, EditorMetadata, Glyph, StateDescriptor,
    TransitionContext, VisualHint, VisualSpec,
};

pub fn spec() -> ComponentSpec {
    ComponentSpec {
        type_name: "sink".to_string(),
        kind: ComponentKind::Sink,
        is_observable: false,
        ports: PortSet::new(
            vec![PortSpec::relative(PortId::IN, RelativeSide::Back).required()],
            Vec::new(),
        ),
        states: vec![StateDescriptor::new(BallState::Consuming, VisualHint::Fading)],
        visual: VisualSpec {
            fill: [0x3a, 0x3a, 0x3a],
            glyph: Glyph::Target,
        },
        editor: EditorMetadata::new("Sink", "sink", "io"),
    }
}

/// Destroy `ball`, recording the tracker's final belief in its true color.
pub fn consume(
    ctx: &mut TransitionContext<'_>,
    instance: &ComponentInstance,
    ball: BallId,
) -> Result<Completion, SimError> {
    let truth = ctx
        .balls
        .get(ball)
        .ok_or(SimError::UnknownBall(ball))?
        .color;
    let belief_in_truth = ctx.tracker.belief(ball)?.probability(&truth);
    tracing::debug!(?ball, component = ?instance.id, %truth, belief_in_truth, "ball consumed");
    ctx.events.push(SimEvent::BallConsumed {
        ball,
        component: instance.id,
        truth,
        belief_in_truth,
        time: ctx.time,
    });
    ctx.tracker.forget(ball);
    ctx.balls.remove(ball);
    Ok(Completion::Removed)
}
