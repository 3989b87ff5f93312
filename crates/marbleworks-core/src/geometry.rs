//! Grid cells, continuous points, and the four cardinal directions.
//!
//! The grid uses screen orientation: `x` grows to the right and `y` grows
//! downward, so [`Direction::Up`] is `(0, -1)`. A cell at `(x, y)` covers the
//! unit square `[x, x + 1] x [y, y + 1]`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Points
// ---------------------------------------------------------------------------

/// A continuous position in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Linear interpolation towards `other`; `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Scale both coordinates, e.g. grid units to pixels.
    pub fn scaled(&self, factor: f64) -> Point {
        Point {
            x: self.x * factor,
            y: self.y * factor,
        }
    }
}

// ---------------------------------------------------------------------------
// Grid positions
// ---------------------------------------------------------------------------

/// A cell on the level grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell in the given direction.
    pub fn offset(&self, direction: Direction) -> GridPosition {
        let (dx, dy) = direction.offset();
        GridPosition::new(self.x + dx, self.y + dy)
    }

    /// Center of the cell.
    pub fn center(&self) -> Point {
        Point::new(f64::from(self.x) + 0.5, f64::from(self.y) + 0.5)
    }

    /// Top-left corner of the cell.
    pub fn origin(&self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }

    /// A point on one side of the cell. `anchor` is the fraction along that
    /// side measured from its top or left end.
    pub fn side_point(&self, side: Direction, anchor: f64) -> Point {
        let x = f64::from(self.x);
        let y = f64::from(self.y);
        match side {
            Direction::Left => Point::new(x, y + anchor),
            Direction::Right => Point::new(x + 1.0, y + anchor),
            Direction::Up => Point::new(x + anchor, y),
            Direction::Down => Point::new(x + anchor, y + 1.0),
        }
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }
}

impl From<(i32, i32)> for GridPosition {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

/// Cardinal directions, as used by the `direction` component parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    #[default]
    Right,
}

impl Direction {
    /// All four cardinal directions.
    pub fn all() -> [Direction; 4] {
        [
            Direction::Up,
            Direction::Right,
            Direction::Down,
            Direction::Left,
        ]
    }

    /// Grid offset for one step in this direction.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Rotate 90 degrees clockwise.
    pub fn rotate_cw(self) -> Self {
        match self {
            Direction::Up => Direction::Right,
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
        }
    }

    /// Rotate 90 degrees counter-clockwise.
    pub fn rotate_ccw(self) -> Self {
        match self {
            Direction::Up => Direction::Left,
            Direction::Left => Direction::Down,
            Direction::Down => Direction::Right,
            Direction::Right => Direction::Up,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Parse a level-file direction name. Case-insensitive; `None` for
    /// anything that is not one of the four names.
    pub fn from_param(name: &str) -> Option<Direction> {
        match name.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }

    /// Resolve an optional direction parameter. Missing or unrecognized values
    /// fall back to [`Direction::Right`] (enter on the left, leave on the
    /// right); unrecognized values are logged.
    pub fn resolve_param(name: Option<&str>) -> Direction {
        let Some(name) = name else {
            return Direction::default();
        };
        match Direction::from_param(name) {
            Some(direction) => direction,
            None => {
                tracing::warn!(
                    value = name,
                    fallback = Direction::default().name(),
                    "unrecognized direction parameter, using default entry/exit"
                );
                Direction::default()
            }
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A side of a component relative to the way it faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeSide {
    Back,
    Front,
    Left,
    Right,
}

impl RelativeSide {
    /// The absolute side for a component facing `facing`.
    pub fn resolve(self, facing: Direction) -> Direction {
        match self {
            RelativeSide::Front => facing,
            RelativeSide::Back => facing.opposite(),
            RelativeSide::Left => facing.rotate_ccw(),
            RelativeSide::Right => facing.rotate_cw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn distance_and_lerp() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_relative_eq!(a.distance(&b), 5.0, epsilon = 1e-9);
        assert_eq!(a.lerp(&b, 0.5), Point::new(1.5, 2.0));
    }

    #[test]
    fn side_points_of_a_cell() {
        let cell = GridPosition::new(2, 3);
        assert_eq!(cell.side_point(Direction::Left, 0.5), Point::new(2.0, 3.5));
        assert_eq!(cell.side_point(Direction::Right, 0.5), Point::new(3.0, 3.5));
        assert_eq!(cell.side_point(Direction::Up, 0.25), Point::new(2.25, 3.0));
        assert_eq!(cell.side_point(Direction::Down, 0.5), Point::new(2.5, 4.0));
        assert_eq!(cell.center(), Point::new(2.5, 3.5));
    }

    #[test]
    fn offsets_and_opposites() {
        let p = GridPosition::new(0, 0);
        assert_eq!(p.offset(Direction::Up), GridPosition::new(0, -1));
        assert_eq!(p.offset(Direction::Right), GridPosition::new(1, 0));
        for d in Direction::all() {
            assert_eq!(d.opposite().opposite(), d);
            assert_eq!(d.rotate_cw().rotate_ccw(), d);
            assert_eq!(p.offset(d).offset(d.opposite()), p);
        }
    }

    #[test]
    fn relative_sides() {
        assert_eq!(RelativeSide::Front.resolve(Direction::Up), Direction::Up);
        assert_eq!(RelativeSide::Back.resolve(Direction::Up), Direction::Down);
        assert_eq!(RelativeSide::Left.resolve(Direction::Up), Direction::Left);
        assert_eq!(RelativeSide::Right.resolve(Direction::Up), Direction::Right);
        assert_eq!(RelativeSide::Left.resolve(Direction::Right), Direction::Up);
        assert_eq!(RelativeSide::Right.resolve(Direction::Right), Direction::Down);
    }

    #[test]
    fn parse_direction_names() {
        assert_eq!(Direction::from_param("Up"), Some(Direction::Up));
        assert_eq!(Direction::from_param(" left "), Some(Direction::Left));
        assert_eq!(Direction::from_param("diagonal"), None);
    }

    #[test]
    fn unknown_direction_falls_back_to_right() {
        assert_eq!(Direction::resolve_param(Some("sideways")), Direction::Right);
        assert_eq!(Direction::resolve_param(None), Direction::Right);
        assert_eq!(Direction::resolve_param(Some("down")), Direction::Down);
    }

    #[test]
    fn manhattan() {
        let a = GridPosition::new(0, 0);
        let b = GridPosition::new(3, -4);
        assert_eq!(a.manhattan_distance(&b), 7);
    }
}
