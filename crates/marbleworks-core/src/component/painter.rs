//! Painters recolor every ball that passes through them.

use crate::color::Color;
use crate::distribution::Distribution;
use crate::engine::SimError;
use crate::geometry::RelativeSide;
use crate::id::{BallId, PortId};
use crate::port::{PortSet, PortSpec};

use super::{
    BallState, ComponentKind, ComponentSpec, EditorMetadata, Glyph, StateDescriptor,
    TransitionContext, VisualHint, VisualSpec,
};

pub fn spec() -> ComponentSpec {
    ComponentSpec {
        type_name: "painter".to_string(),
        kind: ComponentKind::Painter,
        is_observable: false,
        ports: PortSet::new(
            vec![PortSpec::relative(PortId::IN, RelativeSide::Back)],
            vec![PortSpec::relative(PortId::OUT, RelativeSide::Front)],
        ),
        states: vec![StateDescriptor::new(BallState::Painting, VisualHint::Moving)],
        visual: VisualSpec {
            fill: [0xc9, 0x7b, 0x3c],
            glyph: Glyph::Brush,
        },
        editor: EditorMetadata::new("Painter", "painter", "transform"),
    }
}

/// Recolor `ball` and move its belief onto the paint color.
pub fn apply(ctx: &mut TransitionContext<'_>, ball: BallId, paint: Color) -> Result<(), SimError> {
    let b = ctx.balls.get_mut(ball).ok_or(SimError::UnknownBall(ball))?;
    b.color = paint;
    ctx.tracker.push_forward(ball, |_| Distribution::point(paint))?;
    Ok(())
}
