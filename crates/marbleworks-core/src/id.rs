use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a component instance placed in a level.
    pub struct ComponentId;

    /// Identifies a ball in the engine's ball arena.
    pub struct BallId;
}

/// Identifies a component type in the registry. Resolved once at level load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentTypeId(pub u32);

/// Names a port on a component spec (`"in"`, `"out"`, `"left"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortId(pub &'static str);

impl PortId {
    pub const IN: PortId = PortId("in");
    pub const OUT: PortId = PortId("out");

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_type_id_copy() {
        let a = ComponentTypeId(5);
        let b = a;
        assert_eq!(a, b);
    }

    #[test]
    fn port_ids_compare_by_name() {
        assert_eq!(PortId::IN, PortId("in"));
        assert_ne!(PortId::IN, PortId::OUT);
        assert_eq!(PortId::OUT.to_string(), "out");
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ComponentTypeId(0), "conveyor");
        map.insert(ComponentTypeId(1), "splitter");
        assert_eq!(map[&ComponentTypeId(1)], "splitter");
    }
}
