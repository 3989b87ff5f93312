//! Levels: component instances on a grid, wired together by geometry.
//!
//! An output port on side `d` of cell `p` connects to the instance at
//! `p + d` if that instance has an input port on side `opposite(d)`. Wiring
//! is resolved once, when the [`LevelBuilder`] is built; a required port left
//! unwired fails the build.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use slotmap::SlotMap;

use crate::color::{Color, Palette};
use crate::component::{ComponentKind, ComponentParams, ComponentSpec};
use crate::distribution::Distribution;
use crate::geometry::GridPosition;
use crate::id::{ComponentId, ComponentTypeId, PortId};
use crate::registry::{ComponentRegistry, RegistryError};
use crate::tracker::{BayesianTracker, Belief};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LevelError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("cell ({}, {}) is already occupied", .0.x, .0.y)]
    Occupied(GridPosition),
    #[error("{type_name} at ({}, {}): {reason}", .position.x, .position.y)]
    InvalidParam {
        type_name: String,
        position: GridPosition,
        reason: String,
    },
    #[error("{type_name} at ({}, {}): required port `{port}` is not connected", .position.x, .position.y)]
    DanglingPort {
        type_name: String,
        position: GridPosition,
        port: PortId,
    },
    #[error("invalid level prior: {0}")]
    InvalidPrior(String),
}

/// A component placed in a level.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInstance {
    pub id: ComponentId,
    pub type_id: ComponentTypeId,
    pub type_name: String,
    pub kind: ComponentKind,
    pub position: GridPosition,
    pub params: ComponentParams,
}

/// A resolved link from an output port to an input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub from: ComponentId,
    pub from_port: PortId,
    pub to: ComponentId,
    pub to_port: PortId,
}

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// A validated, fully wired level.
#[derive(Debug, Clone)]
pub struct Level {
    name: String,
    registry: Arc<ComponentRegistry>,
    palette: Palette,
    prior: Belief,
    seed: u64,
    instances: SlotMap<ComponentId, ComponentInstance>,
    order: Vec<ComponentId>,
    by_position: BTreeMap<GridPosition, ComponentId>,
    outgoing: HashMap<(ComponentId, PortId), Connection>,
    incoming: HashMap<(ComponentId, PortId), Connection>,
}

impl Level {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Default prior for balls whose origin says nothing about their color.
    pub fn prior(&self) -> &Belief {
        &self.prior
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn instance(&self, id: ComponentId) -> Option<&ComponentInstance> {
        self.instances.get(id)
    }

    /// Instances in the order they were added.
    pub fn instances(&self) -> impl Iterator<Item = &ComponentInstance> + '_ {
        self.order.iter().filter_map(|id| self.instances.get(*id))
    }

    pub fn instance_at(&self, position: GridPosition) -> Option<&ComponentInstance> {
        self.by_position
            .get(&position)
            .and_then(|id| self.instances.get(*id))
    }

    pub fn spec_of(&self, id: ComponentId) -> Option<&ComponentSpec> {
        let instance = self.instances.get(id)?;
        self.registry.spec(instance.type_id)
    }

    /// Where a ball leaving `component` through `port` goes.
    pub fn connection(&self, component: ComponentId, port: PortId) -> Option<&Connection> {
        self.outgoing.get(&(component, port))
    }

    /// What feeds `component` through input `port`.
    pub fn feeder(&self, component: ComponentId, port: PortId) -> Option<&Connection> {
        self.incoming.get(&(component, port))
    }

    /// All connections, ordered by source instance then port declaration.
    pub fn connections(&self) -> Vec<Connection> {
        let mut out = Vec::with_capacity(self.outgoing.len());
        for id in &self.order {
            if let Some(spec) = self.spec_of(*id) {
                for port in &spec.ports.outputs {
                    if let Some(c) = self.outgoing.get(&(*id, port.id)) {
                        out.push(*c);
                    }
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

// ---------------------------------------------------------------------------
// LevelBuilder
// ---------------------------------------------------------------------------

/// Places instances, then validates and wires them into a [`Level`].
#[derive(Debug)]
pub struct LevelBuilder {
    registry: Arc<ComponentRegistry>,
    name: String,
    palette: Palette,
    prior: Option<Belief>,
    seed: u64,
    instances: SlotMap<ComponentId, ComponentInstance>,
    order: Vec<ComponentId>,
    by_position: BTreeMap<GridPosition, ComponentId>,
}

impl LevelBuilder {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self {
            registry,
            name: String::new(),
            palette: Palette::default(),
            prior: None,
            seed: 0,
            instances: SlotMap::with_key(),
            order: Vec::new(),
            by_position: BTreeMap::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Default ball prior. Uniform over the palette when unset.
    pub fn prior(mut self, prior: Belief) -> Self {
        self.prior = Some(prior);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Place an instance of `type_name` at `position`.
    pub fn add(
        &mut self,
        type_name: &str,
        position: GridPosition,
        params: ComponentParams,
    ) -> Result<ComponentId, LevelError> {
        let type_id = self
            .registry
            .id_of(type_name)
            .ok_or_else(|| RegistryError::UnknownComponentType(type_name.to_string()))?;
        let kind = self.registry.get(type_name)?.kind;
        if self.by_position.contains_key(&position) {
            return Err(LevelError::Occupied(position));
        }
        let id = self.instances.insert_with_key(|id| ComponentInstance {
            id,
            type_id,
            type_name: type_name.to_string(),
            kind,
            position,
            params,
        });
        self.order.push(id);
        self.by_position.insert(position, id);
        Ok(id)
    }

    /// Place an instance with the type's editor defaults.
    pub fn add_default(&mut self, type_name: &str, position: GridPosition) -> Result<ComponentId, LevelError> {
        let params = self.registry.get(type_name)?.editor.default_params.clone();
        self.add(type_name, position, params)
    }

    /// Validate parameters and resolve wiring.
    pub fn build(self) -> Result<Level, LevelError> {
        let prior = match self.prior {
            Some(p) => {
                BayesianTracker::with_prior(self.palette.clone(), p.clone())
                    .map_err(|e| LevelError::InvalidPrior(e.to_string()))?;
                p
            }
            None => Distribution::uniform(self.palette.iter())
                .map_err(|e| LevelError::InvalidPrior(e.to_string()))?,
        };

        for id in &self.order {
            let instance = &self.instances[*id];
            validate_params(instance, &self.palette).map_err(|reason| LevelError::InvalidParam {
                type_name: instance.type_name.clone(),
                position: instance.position,
                reason,
            })?;
        }

        let mut outgoing = HashMap::new();
        let mut incoming = HashMap::new();
        for id in &self.order {
            let instance = &self.instances[*id];
            let spec = self.registry.get(&instance.type_name)?;
            for port in &spec.ports.outputs {
                let side = port.side(instance.params.direction);
                let target = self
                    .by_position
                    .get(&instance.position.offset(side))
                    .map(|tid| &self.instances[*tid]);
                let link = match target {
                    Some(t) => {
                        let tspec = self.registry.get(&t.type_name)?;
                        tspec
                            .ports
                            .input_on_side(side.opposite(), t.params.direction)
                            .map(|input| Connection {
                                from: instance.id,
                                from_port: port.id,
                                to: t.id,
                                to_port: input.id,
                            })
                    }
                    None => None,
                };
                match link {
                    Some(c) => {
                        tracing::debug!(
                            from = %instance.type_name,
                            from_port = %c.from_port,
                            to_port = %c.to_port,
                            "wired"
                        );
                        outgoing.insert((c.from, c.from_port), c);
                        incoming.insert((c.to, c.to_port), c);
                    }
                    None if port.required => {
                        return Err(LevelError::DanglingPort {
                            type_name: instance.type_name.clone(),
                            position: instance.position,
                            port: port.id,
                        });
                    }
                    None => {}
                }
            }
        }

        for id in &self.order {
            let instance = &self.instances[*id];
            let spec = self.registry.get(&instance.type_name)?;
            if let Some(port) = spec
                .ports
                .inputs
                .iter()
                .find(|p| p.required && !incoming.contains_key(&(instance.id, p.id)))
            {
                return Err(LevelError::DanglingPort {
                    type_name: instance.type_name.clone(),
                    position: instance.position,
                    port: port.id,
                });
            }
        }

        tracing::debug!(
            level = %self.name,
            instances = self.order.len(),
            connections = outgoing.len(),
            "level built"
        );

        Ok(Level {
            name: self.name,
            registry: self.registry,
            palette: self.palette,
            prior,
            seed: self.seed,
            instances: self.instances,
            order: self.order,
            by_position: self.by_position,
            outgoing,
            incoming,
        })
    }
}

fn validate_params(instance: &ComponentInstance, palette: &Palette) -> Result<(), String> {
    let p = &instance.params;
    if !p.speed.is_finite() || p.speed <= 0.0 {
        return Err(format!("speed must be finite and positive, got {}", p.speed));
    }
    let in_palette = |c: &Color| {
        if palette.contains(*c) {
            Ok(())
        } else {
            Err(format!("color {c} is not in the level palette"))
        }
    };
    match instance.kind {
        ComponentKind::Sensor => {
            if !p.accuracy.is_finite() || p.accuracy <= 0.0 || p.accuracy > 1.0 {
                return Err(format!("accuracy must be in (0, 1], got {}", p.accuracy));
            }
        }
        ComponentKind::Painter => in_palette(&p.paint)?,
        ComponentKind::Source => {
            if !p.interval.is_finite() || p.interval <= 0.0 {
                return Err(format!("interval must be finite and positive, got {}", p.interval));
            }
            for (c, w) in &p.weights {
                in_palette(c)?;
                if !w.is_finite() || *w < 0.0 {
                    return Err(format!("weight for {c} must be finite and non-negative"));
                }
            }
            if !p.weights.is_empty() && p.weights.iter().all(|(_, w)| *w == 0.0) {
                return Err("weights have no positive entry".into());
            }
            for c in &p.sequence {
                in_palette(c)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Direction;

    fn params(direction: Direction) -> ComponentParams {
        ComponentParams {
            direction,
            ..ComponentParams::default()
        }
    }

    fn builder() -> LevelBuilder {
        LevelBuilder::new(ComponentRegistry::with_builtins().unwrap())
    }

    #[test]
    fn straight_line_wires_front_to_back() {
        let mut b = builder();
        let src = b.add("source", GridPosition::new(0, 0), params(Direction::Right)).unwrap();
        let belt = b.add("conveyor", GridPosition::new(1, 0), params(Direction::Right)).unwrap();
        let sink = b.add("sink", GridPosition::new(2, 0), params(Direction::Right)).unwrap();
        let level = b.build().unwrap();

        let c = level.connection(src, PortId::OUT).unwrap();
        assert_eq!((c.to, c.to_port), (belt, PortId::IN));
        assert_eq!(level.connection(belt, PortId::OUT).unwrap().to, sink);
        assert_eq!(level.feeder(sink, PortId::IN).unwrap().from, belt);
        assert_eq!(level.connections().len(), 2);
        assert_eq!(level.instance_at(GridPosition::new(1, 0)).unwrap().id, belt);
    }

    #[test]
    fn turning_corner() {
        let mut b = builder();
        b.add("source", GridPosition::new(0, 0), params(Direction::Down)).unwrap();
        let belt = b.add("conveyor", GridPosition::new(0, 1), params(Direction::Right)).unwrap();
        b.add("sink", GridPosition::new(1, 1), params(Direction::Right)).unwrap();
        // The conveyor's input faces left, so a source above it does not feed it.
        let err = b.build().unwrap_err();
        assert!(matches!(err, LevelError::DanglingPort { port: PortId::OUT, .. }));

        let mut b = builder();
        b.add("source", GridPosition::new(0, 0), params(Direction::Down)).unwrap();
        let down = b.add("conveyor", GridPosition::new(0, 1), params(Direction::Down)).unwrap();
        b.add("sink", GridPosition::new(0, 2), params(Direction::Down)).unwrap();
        let level = b.build().unwrap();
        assert!(level.connection(down, PortId::OUT).is_some());
        let _ = belt;
    }

    #[test]
    fn sink_without_feeder_is_dangling() {
        let mut b = builder();
        b.add("sink", GridPosition::new(5, 5), params(Direction::Right)).unwrap();
        assert!(matches!(
            b.build(),
            Err(LevelError::DanglingPort { port: PortId::IN, .. })
        ));
    }

    #[test]
    fn optional_output_may_dangle() {
        let mut b = builder();
        let belt = b.add("conveyor", GridPosition::new(0, 0), params(Direction::Right)).unwrap();
        let level = b.build().unwrap();
        assert!(level.connection(belt, PortId::OUT).is_none());
    }

    #[test]
    fn occupied_cell_and_unknown_type() {
        let mut b = builder();
        b.add("conveyor", GridPosition::new(0, 0), params(Direction::Right)).unwrap();
        assert_eq!(
            b.add("conveyor", GridPosition::new(0, 0), params(Direction::Right)),
            Err(LevelError::Occupied(GridPosition::new(0, 0)))
        );
        assert_eq!(
            b.add("splitter_v9", GridPosition::new(1, 0), params(Direction::Right)),
            Err(LevelError::Registry(RegistryError::UnknownComponentType(
                "splitter_v9".into()
            )))
        );
    }

    #[test]
    fn invalid_params_fail_build() {
        let mut b = builder();
        let bad = ComponentParams {
            speed: 0.0,
            ..ComponentParams::default()
        };
        b.add("conveyor", GridPosition::new(0, 0), bad).unwrap();
        assert!(matches!(b.build(), Err(LevelError::InvalidParam { .. })));

        let mut b = builder();
        let off_palette = ComponentParams {
            paint: Color::Green,
            ..ComponentParams::default()
        };
        b.add("painter", GridPosition::new(0, 0), off_palette).unwrap();
        assert!(matches!(b.build(), Err(LevelError::InvalidParam { .. })));
    }

    #[test]
    fn prior_must_fit_palette() {
        let b = builder().prior(Distribution::point(Color::Green));
        assert!(matches!(b.build(), Err(LevelError::InvalidPrior(_))));
        let level = builder().seed(9).name("empty").build().unwrap();
        assert_eq!(level.seed(), 9);
        assert!(level.is_empty());
        assert!(level.prior().is_normalized(1e-9));
    }
}
