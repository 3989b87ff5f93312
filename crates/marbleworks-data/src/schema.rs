//! Serde data file structs for level definitions.
//!
//! These structs define the on-disk format of a level: its palette, prior,
//! seed, simulation settings, custom component types, and placed components.
//! They are deserialized from RON, JSON, or TOML and then resolved into core
//! types by the loader.

use marbleworks_core::color::Color;
use marbleworks_core::component::{ComponentKind, ComponentParams, SplitPolicy};
use marbleworks_core::geometry::Direction;
use serde::Deserialize;

// ===========================================================================
// Level
// ===========================================================================

/// A whole level file.
#[derive(Debug, Clone, Deserialize)]
pub struct LevelData {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_palette")]
    pub palette: Vec<Color>,
    /// Default ball prior as `(color, weight)` pairs. Uniform when empty.
    #[serde(default)]
    pub prior: Vec<(Color, f64)>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub simulation: SimulationData,
    /// Level-local component types built on the built-in kinds.
    #[serde(default)]
    pub types: Vec<TypeData>,
    pub components: Vec<ComponentData>,
}

/// How the runner drives the level.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationData {
    /// Fixed step length in seconds.
    #[serde(default = "default_timestep")]
    pub timestep: f64,
    /// Seconds to simulate when run headless.
    #[serde(default = "default_duration")]
    pub duration: f64,
}

fn default_palette() -> Vec<Color> {
    Color::PRIMARIES.to_vec()
}

fn default_timestep() -> f64 {
    0.05
}

fn default_duration() -> f64 {
    30.0
}

impl Default for SimulationData {
    fn default() -> Self {
        Self {
            timestep: default_timestep(),
            duration: default_duration(),
        }
    }
}

// ===========================================================================
// Component types and placements
// ===========================================================================

/// A custom component type: a built-in kind under a new name, optionally
/// with different observability and editor defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeData {
    pub name: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub observable: Option<bool>,
    #[serde(default)]
    pub params: ParamsData,
}

/// One placed component.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentData {
    #[serde(rename = "type")]
    pub type_name: String,
    pub position: (i32, i32),
    #[serde(default)]
    pub params: ParamsData,
}

/// Per-instance parameter overrides. Every field is optional; unset fields
/// keep the value from the type's editor defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParamsData {
    /// Free-form so that an unknown name falls back instead of failing.
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub plex: Option<bool>,
    #[serde(default)]
    pub observable: Option<bool>,
    #[serde(default)]
    pub split: Option<SplitPolicy>,
    #[serde(default)]
    pub paint: Option<Color>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub interval: Option<f64>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub weights: Option<Vec<(Color, f64)>>,
    #[serde(default)]
    pub sequence: Option<Vec<Color>>,
}

impl ParamsData {
    /// Overlay the set fields onto `base`.
    pub fn apply(&self, base: &ComponentParams) -> ComponentParams {
        let mut p = base.clone();
        if let Some(direction) = &self.direction {
            p.direction = Direction::resolve_param(Some(direction));
        }
        if let Some(v) = self.speed {
            p.speed = v;
        }
        if let Some(v) = self.plex {
            p.plex = v;
        }
        if self.observable.is_some() {
            p.observable = self.observable;
        }
        if let Some(v) = self.split {
            p.split = v;
        }
        if let Some(v) = self.paint {
            p.paint = v;
        }
        if let Some(v) = self.accuracy {
            p.accuracy = v;
        }
        if let Some(v) = self.interval {
            p.interval = v;
        }
        if let Some(v) = self.count {
            p.count = v;
        }
        if let Some(v) = &self.weights {
            p.weights = v.clone();
        }
        if let Some(v) = &self.sequence {
            p.sequence = v.clone();
        }
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_keeps_unset_fields() {
        let base = ComponentParams {
            count: 5,
            ..ComponentParams::default()
        };
        let data = ParamsData {
            direction: Some("Down".into()),
            speed: Some(2.0),
            ..ParamsData::default()
        };
        let p = data.apply(&base);
        assert_eq!(p.direction, Direction::Down);
        assert_eq!(p.speed, 2.0);
        assert_eq!(p.count, 5);
    }

    #[test]
    fn unknown_direction_overlays_as_right() {
        let base = ComponentParams {
            direction: Direction::Up,
            ..ComponentParams::default()
        };
        let data = ParamsData {
            direction: Some("diagonal".into()),
            ..ParamsData::default()
        };
        assert_eq!(data.apply(&base).direction, Direction::Right);
    }

    #[test]
    fn level_defaults() {
        let level: LevelData = ron::from_str(r#"(components: [])"#).unwrap();
        assert_eq!(level.palette, Color::PRIMARIES.to_vec());
        assert!(level.prior.is_empty());
        assert_eq!(level.seed, 0);
        assert_eq!(level.simulation.timestep, 0.05);
        assert!(level.types.is_empty());
    }

    #[test]
    fn component_entry_from_json() {
        let c: ComponentData = serde_json::from_str(
            r#"{"type": "splitter", "position": [3, -1], "params": {"split": {"filter": "blue"}}}"#,
        )
        .unwrap();
        assert_eq!(c.type_name, "splitter");
        assert_eq!(c.position, (3, -1));
        assert_eq!(c.params.split, Some(SplitPolicy::Filter(Color::Blue)));
    }
}
