//! Level files for Marbleworks: RON, TOML, or JSON in, a wired
//! [`marbleworks_core::level::Level`] out.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, Format, LoadedLevel, load_level, parse_level_str};
