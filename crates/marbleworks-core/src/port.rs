//! Ports: where balls enter and leave a component.
//!
//! A port sits on one side of its component's cell. Its side is either
//! relative to the instance's `direction` parameter (the usual case: a
//! conveyor's input is at its back whichever way it faces) or fixed to an
//! absolute direction.

use crate::geometry::{Direction, GridPosition, Point, RelativeSide};
use crate::id::PortId;

/// Where on the cell a port sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPlacement {
    /// Follows the instance's facing direction.
    Relative(RelativeSide),
    /// Always on this side, whatever the instance's direction.
    Fixed(Direction),
}

/// A single port declaration on a component spec.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    pub id: PortId,
    pub placement: PortPlacement,
    /// Fraction along the side, `0.0..=1.0`, measured from the top or left end.
    pub anchor: f64,
    /// A required port must be wired when the level loads.
    pub required: bool,
}

impl PortSpec {
    /// A relative port centred on its side.
    pub fn relative(id: PortId, side: RelativeSide) -> Self {
        Self {
            id,
            placement: PortPlacement::Relative(side),
            anchor: 0.5,
            required: false,
        }
    }

    /// A port fixed to an absolute side.
    pub fn fixed(id: PortId, side: Direction) -> Self {
        Self {
            id,
            placement: PortPlacement::Fixed(side),
            anchor: 0.5,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_anchor(mut self, anchor: f64) -> Self {
        self.anchor = anchor;
        self
    }

    /// The explicit direction constraint, if any. `None` means the side
    /// follows the instance's direction.
    pub fn direction_constraint(&self) -> Option<Direction> {
        match self.placement {
            PortPlacement::Fixed(d) => Some(d),
            PortPlacement::Relative(_) => None,
        }
    }

    /// The absolute side of the cell this port sits on.
    pub fn side(&self, facing: Direction) -> Direction {
        match self.placement {
            PortPlacement::Relative(side) => side.resolve(facing),
            PortPlacement::Fixed(d) => d,
        }
    }

    /// The point where balls cross this port.
    pub fn point(&self, cell: GridPosition, facing: Direction) -> Point {
        cell.side_point(self.side(facing), self.anchor)
    }
}

/// The inputs and outputs of a component spec, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortSet {
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
}

impl PortSet {
    pub fn new(inputs: Vec<PortSpec>, outputs: Vec<PortSpec>) -> Self {
        Self { inputs, outputs }
    }

    pub fn input(&self, id: PortId) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn output(&self, id: PortId) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.id == id)
    }

    /// The input port facing `side` for an instance facing `facing`.
    pub fn input_on_side(&self, side: Direction, facing: Direction) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.side(facing) == side)
    }

    /// First declared input, used when a ball is placed without a port.
    pub fn primary_input(&self) -> Option<&PortSpec> {
        self.inputs.first()
    }

    /// Port ids that appear more than once across inputs and outputs.
    pub fn duplicate_ids(&self) -> Vec<PortId> {
        let mut seen: Vec<PortId> = Vec::new();
        let mut dups = Vec::new();
        for p in self.inputs.iter().chain(self.outputs.iter()) {
            if seen.contains(&p.id) {
                if !dups.contains(&p.id) {
                    dups.push(p.id);
                }
            } else {
                seen.push(p.id);
            }
        }
        dups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conveyor_ports() -> PortSet {
        PortSet::new(
            vec![PortSpec::relative(PortId::IN, RelativeSide::Back)],
            vec![PortSpec::relative(PortId::OUT, RelativeSide::Front)],
        )
    }

    #[test]
    fn relative_ports_follow_facing() {
        let ports = conveyor_ports();
        let input = ports.input(PortId::IN).unwrap();
        assert_eq!(input.side(Direction::Right), Direction::Left);
        assert_eq!(input.side(Direction::Up), Direction::Down);
        assert_eq!(input.direction_constraint(), None);
    }

    #[test]
    fn fixed_port_ignores_facing() {
        let p = PortSpec::fixed(PortId("top"), Direction::Up);
        assert_eq!(p.side(Direction::Left), Direction::Up);
        assert_eq!(p.direction_constraint(), Some(Direction::Up));
    }

    #[test]
    fn port_points_use_anchor() {
        let cell = GridPosition::new(2, 3);
        let ports = conveyor_ports();
        assert_eq!(
            ports.input(PortId::IN).unwrap().point(cell, Direction::Right),
            Point::new(2.0, 3.5)
        );
        assert_eq!(
            ports.output(PortId::OUT).unwrap().point(cell, Direction::Right),
            Point::new(3.0, 3.5)
        );
        let off = PortSpec::relative(PortId::IN, RelativeSide::Back).with_anchor(0.25);
        assert_eq!(off.point(cell, Direction::Down), Point::new(2.25, 3.0));
    }

    #[test]
    fn input_on_side_lookup() {
        let ports = conveyor_ports();
        assert!(ports.input_on_side(Direction::Left, Direction::Right).is_some());
        assert!(ports.input_on_side(Direction::Up, Direction::Right).is_none());
    }

    #[test]
    fn duplicate_port_ids_are_reported() {
        let ports = PortSet::new(
            vec![PortSpec::relative(PortId::IN, RelativeSide::Back)],
            vec![
                PortSpec::relative(PortId::IN, RelativeSide::Front),
                PortSpec::relative(PortId::OUT, RelativeSide::Left),
            ],
        );
        assert_eq!(ports.duplicate_ids(), vec![PortId::IN]);
        assert!(conveyor_ports().duplicate_ids().is_empty());
    }
}
