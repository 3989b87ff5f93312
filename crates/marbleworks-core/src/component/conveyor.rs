//! Conveyors carry a ball straight from their back edge to their front edge.

use crate::geometry::RelativeSide;
use crate::id::PortId;
use crate::port::{PortSet, PortSpec};

use super::{
    BallState, ComponentKind, ComponentSpec, EditorMetadata, Glyph, StateDescriptor, VisualHint,
    VisualSpec,
};

pub fn spec() -> ComponentSpec {
    ComponentSpec {
        type_name: "conveyor".to_string(),
        kind: ComponentKind::Conveyor,
        is_observable: true,
        ports: PortSet::new(
            vec![PortSpec::relative(PortId::IN, RelativeSide::Back)],
            vec![PortSpec::relative(PortId::OUT, RelativeSide::Front)],
        ),
        states: vec![StateDescriptor::new(BallState::Traveling, VisualHint::Moving)],
        visual: VisualSpec {
            fill: [0x6e, 0x6e, 0x73],
            glyph: Glyph::Arrow,
        },
        editor: EditorMetadata::new("Conveyor", "conveyor", "transport"),
    }
}
