//! Ball colors and level palettes.
//!
//! Color is the hidden attribute the tracker reasons about. A level's
//! [`Palette`] bounds the hypothesis space: beliefs, priors, and inverse
//! models only ever range over palette colors.

use serde::{Deserialize, Serialize};

/// The hidden attribute carried by every ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Yellow,
    Blue,
    Orange,
    Green,
    Purple,
    Brown,
}

impl Color {
    /// Every color, primaries first.
    pub const ALL: [Color; 7] = [
        Color::Red,
        Color::Yellow,
        Color::Blue,
        Color::Orange,
        Color::Green,
        Color::Purple,
        Color::Brown,
    ];

    pub const PRIMARIES: [Color; 3] = [Color::Red, Color::Yellow, Color::Blue];

    pub fn name(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Yellow => "yellow",
            Color::Blue => "blue",
            Color::Orange => "orange",
            Color::Green => "green",
            Color::Purple => "purple",
            Color::Brown => "brown",
        }
    }

    pub fn from_name(name: &str) -> Option<Color> {
        Color::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Stable index, used for hashing.
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Paint mixing. Equal colors stay as they are, two distinct primaries
    /// make their secondary, and anything else turns brown.
    pub fn mix(a: Color, b: Color) -> Color {
        if a == b {
            return a;
        }
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        match (lo, hi) {
            (Color::Red, Color::Yellow) => Color::Orange,
            (Color::Yellow, Color::Blue) => Color::Green,
            (Color::Red, Color::Blue) => Color::Purple,
            _ => Color::Brown,
        }
    }

    /// Display color for rendering.
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            Color::Red => [0xd6, 0x3a, 0x2f],
            Color::Yellow => [0xf2, 0xc7, 0x2e],
            Color::Blue => [0x2f, 0x6f, 0xd6],
            Color::Orange => [0xee, 0x8a, 0x22],
            Color::Green => [0x3c, 0xa5, 0x4a],
            Color::Purple => [0x8a, 0x4f, 0xc2],
            Color::Brown => [0x7a, 0x55, 0x33],
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaletteError {
    #[error("palette must contain at least one color")]
    Empty,
}

/// The ordered, duplicate-free set of colors a level can produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Color>", into = "Vec<Color>")]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    /// Build a palette, dropping duplicates but keeping first-seen order.
    pub fn new(colors: impl IntoIterator<Item = Color>) -> Result<Self, PaletteError> {
        let mut out: Vec<Color> = Vec::new();
        for c in colors {
            if !out.contains(&c) {
                out.push(c);
            }
        }
        if out.is_empty() {
            return Err(PaletteError::Empty);
        }
        Ok(Self { colors: out })
    }

    /// Red, yellow, and blue.
    pub fn primaries() -> Self {
        Self {
            colors: Color::PRIMARIES.to_vec(),
        }
    }

    /// Every color.
    pub fn full() -> Self {
        Self {
            colors: Color::ALL.to_vec(),
        }
    }

    pub fn contains(&self, color: Color) -> bool {
        self.colors.contains(&color)
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn iter(&self) -> impl Iterator<Item = Color> + '_ {
        self.colors.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::primaries()
    }
}

impl TryFrom<Vec<Color>> for Palette {
    type Error = PaletteError;

    fn try_from(colors: Vec<Color>) -> Result<Self, Self::Error> {
        Palette::new(colors)
    }
}

impl From<Palette> for Vec<Color> {
    fn from(palette: Palette) -> Self {
        palette.colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixing_primaries() {
        assert_eq!(Color::mix(Color::Red, Color::Yellow), Color::Orange);
        assert_eq!(Color::mix(Color::Yellow, Color::Red), Color::Orange);
        assert_eq!(Color::mix(Color::Blue, Color::Yellow), Color::Green);
        assert_eq!(Color::mix(Color::Red, Color::Blue), Color::Purple);
    }

    #[test]
    fn mixing_same_color_is_identity() {
        for c in Color::ALL {
            assert_eq!(Color::mix(c, c), c);
        }
    }

    #[test]
    fn mixing_anything_else_is_brown() {
        assert_eq!(Color::mix(Color::Orange, Color::Blue), Color::Brown);
        assert_eq!(Color::mix(Color::Green, Color::Purple), Color::Brown);
    }

    #[test]
    fn mixing_is_commutative() {
        for a in Color::ALL {
            for b in Color::ALL {
                assert_eq!(Color::mix(a, b), Color::mix(b, a));
            }
        }
    }

    #[test]
    fn names_round_trip() {
        for c in Color::ALL {
            assert_eq!(Color::from_name(c.name()), Some(c));
        }
        assert_eq!(Color::from_name("RED"), Some(Color::Red));
        assert_eq!(Color::from_name("teal"), None);
    }

    #[test]
    fn palette_dedups_in_order() {
        let p = Palette::new([Color::Blue, Color::Red, Color::Blue]).unwrap();
        assert_eq!(p.colors(), &[Color::Blue, Color::Red]);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn empty_palette_is_rejected() {
        assert_eq!(Palette::new([]), Err(PaletteError::Empty));
    }

    #[test]
    fn palette_deserializes_from_list() {
        let p: Palette = serde_json::from_str(r#"["red","green"]"#).unwrap();
        assert_eq!(p.colors(), &[Color::Red, Color::Green]);
        let empty: Result<Palette, _> = serde_json::from_str("[]");
        assert!(empty.is_err());
    }
}
