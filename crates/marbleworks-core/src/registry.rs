//! The component registry: type name to [`ComponentSpec`].
//!
//! Two-phase lifecycle: specs are registered on a [`RegistryBuilder`], then
//! `build()` validates them and freezes an immutable [`ComponentRegistry`]
//! that levels and engines share through an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::component::{ComponentKind, ComponentSpec};
use crate::id::ComponentTypeId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("component type `{0}` is already registered")]
    DuplicateType(String),
    #[error("unknown component type `{0}`")]
    UnknownComponentType(String),
    #[error("invalid spec for `{type_name}`: {reason}")]
    InvalidSpec { type_name: String, reason: String },
}

/// Collects specs before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    specs: Vec<ComponentSpec>,
    name_to_id: HashMap<String, ComponentTypeId>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder pre-loaded with the seven built-in kinds, each under its
    /// kind name.
    pub fn with_builtins() -> Result<Self, RegistryError> {
        let mut b = Self::new();
        for kind in ComponentKind::ALL {
            b.register(ComponentSpec::builtin(kind))?;
        }
        Ok(b)
    }

    /// Register a spec. Fails if its type name is already taken.
    pub fn register(&mut self, spec: ComponentSpec) -> Result<ComponentTypeId, RegistryError> {
        if self.name_to_id.contains_key(&spec.type_name) {
            return Err(RegistryError::DuplicateType(spec.type_name));
        }
        let id = ComponentTypeId(self.specs.len() as u32);
        self.name_to_id.insert(spec.type_name.clone(), id);
        self.specs.push(spec);
        Ok(id)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.name_to_id.contains_key(type_name)
    }

    /// Validate every spec and freeze the registry.
    pub fn build(self) -> Result<ComponentRegistry, RegistryError> {
        for spec in &self.specs {
            validate(spec).map_err(|reason| RegistryError::InvalidSpec {
                type_name: spec.type_name.clone(),
                reason,
            })?;
        }
        tracing::debug!(types = self.specs.len(), "component registry built");
        Ok(ComponentRegistry {
            specs: self.specs,
            name_to_id: self.name_to_id,
        })
    }
}

fn validate(spec: &ComponentSpec) -> Result<(), String> {
    if spec.type_name.is_empty() {
        return Err("type name is empty".into());
    }
    if let Some(dup) = spec.ports.duplicate_ids().first() {
        return Err(format!("port `{dup}` is declared twice"));
    }
    for port in spec.ports.inputs.iter().chain(&spec.ports.outputs) {
        if !(0.0..=1.0).contains(&port.anchor) {
            return Err(format!(
                "port `{}` anchor {} is outside [0, 1]",
                port.id, port.anchor
            ));
        }
    }
    if spec.states.is_empty() {
        return Err("no states declared".into());
    }
    let initial = spec.kind.initial_state();
    if spec.state(initial).is_none() {
        return Err(format!("initial state `{}` is not declared", initial.name()));
    }
    let (inputs, outputs) = (spec.ports.inputs.len(), spec.ports.outputs.len());
    match spec.kind {
        ComponentKind::Source if inputs > 0 => Err("sources take no inputs".into()),
        ComponentKind::Sink if outputs > 0 => Err("sinks have no outputs".into()),
        ComponentKind::Mixer if inputs < 2 => Err("mixers need two inputs".into()),
        ComponentKind::Splitter if outputs < 2 => Err("splitters need at least two outputs".into()),
        ComponentKind::Sink => Ok(()),
        _ if outputs == 0 => Err(format!("{} kinds need an output", spec.kind)),
        _ => Ok(()),
    }
}

/// Immutable registry. Frozen after `build()`.
#[derive(Debug)]
pub struct ComponentRegistry {
    specs: Vec<ComponentSpec>,
    name_to_id: HashMap<String, ComponentTypeId>,
}

impl ComponentRegistry {
    /// The built-in kinds, frozen and ready to share.
    pub fn with_builtins() -> Result<Arc<Self>, RegistryError> {
        Ok(Arc::new(RegistryBuilder::with_builtins()?.build()?))
    }

    /// Look up a spec by type name.
    pub fn get(&self, type_name: &str) -> Result<&ComponentSpec, RegistryError> {
        self.id_of(type_name)
            .and_then(|id| self.spec(id))
            .ok_or_else(|| RegistryError::UnknownComponentType(type_name.to_string()))
    }

    pub fn id_of(&self, type_name: &str) -> Option<ComponentTypeId> {
        self.name_to_id.get(type_name).copied()
    }

    pub fn spec(&self, id: ComponentTypeId) -> Option<&ComponentSpec> {
        self.specs.get(id.0 as usize)
    }

    /// Specs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentTypeId, &ComponentSpec)> {
        self.specs
            .iter()
            .enumerate()
            .map(|(i, s)| (ComponentTypeId(i as u32), s))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
