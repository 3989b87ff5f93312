//! The rendering contract.
//!
//! The core never draws. It describes components and balls as [`Shape`]s in
//! surface units and hands them to a [`Surface`] the host implements. A
//! surface must report how many surface units one grid cell spans; without
//! that scale nothing can be placed, so rendering fails immediately.

use crate::ball::Ball;
use crate::component::{ComponentSpec, Glyph};
use crate::fixed::SimTime;
use crate::geometry::{Direction, Point};
use crate::level::ComponentInstance;
use crate::tracker::Belief;

/// Ball radius as a fraction of the cell size.
pub const BALL_RADIUS: f64 = 0.18;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("surface did not report a grid size")]
    MissingGridScale,
    #[error("grid size must be finite and positive, got {0}")]
    InvalidGridScale(f64),
}

/// A primitive the surface knows how to draw. Coordinates are in surface
/// units, y pointing down.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect {
        origin: Point,
        size: f64,
        fill: [u8; 3],
    },
    Circle {
        center: Point,
        radius: f64,
        fill: [u8; 3],
    },
    Glyph {
        center: Point,
        size: f64,
        glyph: Glyph,
        facing: Direction,
    },
}

/// Something shapes can be drawn onto.
pub trait Surface {
    /// Surface units per grid cell.
    fn grid_size(&self) -> Option<f64>;

    fn draw(&mut self, shape: Shape);
}

fn scale(surface: &dyn Surface) -> Result<f64, RenderError> {
    let size = surface.grid_size().ok_or(RenderError::MissingGridScale)?;
    if !size.is_finite() || size <= 0.0 {
        return Err(RenderError::InvalidGridScale(size));
    }
    Ok(size)
}

/// Draw `instance`: its cell, then its glyph turned to face its direction.
pub fn render_component(
    surface: &mut dyn Surface,
    spec: &ComponentSpec,
    instance: &ComponentInstance,
) -> Result<(), RenderError> {
    let size = scale(surface)?;
    surface.draw(Shape::Rect {
        origin: instance.position.origin().scaled(size),
        size,
        fill: spec.visual.fill,
    });
    surface.draw(Shape::Glyph {
        center: instance.position.center().scaled(size),
        size: size * 0.6,
        glyph: spec.visual.glyph,
        facing: instance.params.direction,
    });
    Ok(())
}

/// Draw `ball` where its current trajectory puts it at `now`, in its true
/// color.
pub fn render_ball(surface: &mut dyn Surface, ball: &Ball, now: SimTime) -> Result<(), RenderError> {
    let size = scale(surface)?;
    surface.draw(Shape::Circle {
        center: ball.position_at(now).scaled(size),
        radius: BALL_RADIUS * size,
        fill: ball.ground_truth().rgb(),
    });
    Ok(())
}

/// Draw `ball` in the tracker's view: the belief-weighted blend of palette
/// colors. A player-facing display shows this instead of the truth.
pub fn render_belief(
    surface: &mut dyn Surface,
    ball: &Ball,
    belief: &Belief,
    now: SimTime,
) -> Result<(), RenderError> {
    let size = scale(surface)?;
    let mut rgb = [0.0f64; 3];
    for (color, p) in belief.iter() {
        for (acc, channel) in rgb.iter_mut().zip(color.rgb()) {
            *acc += p * f64::from(channel);
        }
    }
    surface.draw(Shape::Circle {
        center: ball.position_at(now).scaled(size),
        radius: BALL_RADIUS * size,
        fill: rgb.map(|c| c.round().clamp(0.0, 255.0) as u8),
    });
    Ok(())
}
