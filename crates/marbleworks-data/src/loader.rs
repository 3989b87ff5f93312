//! Resolution pipeline: reads a level file, registers its custom types, and
//! builds a wired [`Level`].
//!
//! Provides format detection (RON/JSON/TOML) and deserialization helpers
//! used by the higher-level loading pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use marbleworks_core::color::Palette;
use marbleworks_core::component::ComponentSpec;
use marbleworks_core::distribution::Distribution;
use marbleworks_core::fixed::{SimTime, checked_seconds};
use marbleworks_core::geometry::GridPosition;
use marbleworks_core::level::{Level, LevelBuilder, LevelError};
use marbleworks_core::registry::{ComponentRegistry, RegistryBuilder, RegistryError};
use marbleworks_core::sim::SimulationStrategy;
use serde::de::DeserializeOwned;

use crate::schema::LevelData;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during level loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A custom type could not be registered.
    #[error("component types in {file}: {source}")]
    Registry {
        file: PathBuf,
        #[source]
        source: RegistryError,
    },

    /// Placement, parameter, or wiring error.
    #[error("level {file}: {source}")]
    Level {
        file: PathBuf,
        #[source]
        source: LevelError,
    },

    #[error("invalid palette in {file}: {detail}")]
    InvalidPalette { file: PathBuf, detail: String },

    #[error("invalid prior in {file}: {detail}")]
    InvalidPrior { file: PathBuf, detail: String },

    #[error("invalid simulation settings in {file}: {detail}")]
    InvalidSimulation { file: PathBuf, detail: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize `content` in the given format. `file` is only used in errors.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    file: &Path,
) -> Result<T, DataLoadError> {
    let parse_err = |detail: String| DataLoadError::Parse {
        file: file.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, path)
}

// ===========================================================================
// Resolution
// ===========================================================================

/// A level ready to hand to the engine, with the settings to run it.
#[derive(Debug)]
pub struct LoadedLevel {
    pub level: Level,
    pub timestep: SimTime,
    pub duration: SimTime,
}

impl LoadedLevel {
    pub fn strategy(&self) -> SimulationStrategy {
        SimulationStrategy::Fixed {
            timestep: self.timestep,
        }
    }

    /// Whole timesteps needed to cover `duration`, rounded up.
    pub fn steps(&self) -> u64 {
        if self.timestep <= SimTime::ZERO {
            return 0;
        }
        let ratio = self.duration / self.timestep;
        ratio.ceil().to_num::<u64>()
    }
}

/// Load and resolve the level at `path`.
pub fn load_level(path: &Path) -> Result<LoadedLevel, DataLoadError> {
    let data: LevelData = deserialize_file(path)?;
    resolve_level(data, path)
}

/// Parse and resolve a level held in memory.
pub fn parse_level_str(content: &str, format: Format) -> Result<LoadedLevel, DataLoadError> {
    let file = PathBuf::from("<memory>");
    let data: LevelData = deserialize_str(content, format, &file)?;
    resolve_level(data, &file)
}

/// Turn parsed level data into a wired [`Level`].
pub fn resolve_level(data: LevelData, file: &Path) -> Result<LoadedLevel, DataLoadError> {
    let registry = build_registry(&data, file)?;

    let palette = Palette::new(data.palette.iter().copied()).map_err(|e| DataLoadError::InvalidPalette {
        file: file.to_path_buf(),
        detail: e.to_string(),
    })?;

    let level_err = |source: LevelError| DataLoadError::Level {
        file: file.to_path_buf(),
        source,
    };

    let mut builder = LevelBuilder::new(registry.clone())
        .name(&data.name)
        .palette(palette)
        .seed(data.seed);
    if !data.prior.is_empty() {
        let prior = Distribution::from_weights(data.prior.iter().copied()).map_err(|e| {
            DataLoadError::InvalidPrior {
                file: file.to_path_buf(),
                detail: e.to_string(),
            }
        })?;
        builder = builder.prior(prior);
    }

    for component in &data.components {
        let defaults = &registry
            .get(&component.type_name)
            .map_err(|e| level_err(e.into()))?
            .editor
            .default_params;
        let params = component.params.apply(defaults);
        builder
            .add(&component.type_name, GridPosition::from(component.position), params)
            .map_err(level_err)?;
    }
    let level = builder.build().map_err(level_err)?;

    let sim_err = |detail: String| DataLoadError::InvalidSimulation {
        file: file.to_path_buf(),
        detail,
    };
    let timestep = checked_seconds(data.simulation.timestep)
        .filter(|t| *t > SimTime::ZERO)
        .ok_or_else(|| sim_err(format!("timestep {} is not a positive time", data.simulation.timestep)))?;
    let duration = checked_seconds(data.simulation.duration)
        .filter(|t| *t >= SimTime::ZERO)
        .ok_or_else(|| sim_err(format!("duration {} is not a valid time", data.simulation.duration)))?;

    tracing::debug!(
        file = %file.display(),
        level = %level.name(),
        components = level.len(),
        "level loaded"
    );

    Ok(LoadedLevel {
        level,
        timestep,
        duration,
    })
}

/// Built-in kinds plus the level's custom types.
fn build_registry(data: &LevelData, file: &Path) -> Result<Arc<ComponentRegistry>, DataLoadError> {
    let registry_err = |source: RegistryError| DataLoadError::Registry {
        file: file.to_path_buf(),
        source,
    };
    let mut builder = RegistryBuilder::with_builtins().map_err(registry_err)?;
    for t in &data.types {
        let base = ComponentSpec::builtin(t.kind);
        let defaults = t.params.apply(&base.editor.default_params);
        let mut spec = ComponentSpec::derived(&t.name, t.kind).with_default_params(defaults);
        if let Some(observable) = t.observable {
            spec = spec.with_observable(observable);
        }
        builder.register(spec).map_err(registry_err)?;
    }
    Ok(Arc::new(builder.build().map_err(registry_err)?))
}

// ===========================================================================
// Tests
// ===========================================================================
