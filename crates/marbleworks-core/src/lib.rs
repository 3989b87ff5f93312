//! Marbleworks Core -- simulation of a ball factory whose ball colors are
//! hidden and have to be inferred.
//!
//! Balls flow between grid-placed components along kinematic trajectories.
//! Each component kind imposes a small state machine on the balls it owns.
//! Observable components report what they see to a [`tracker::BayesianTracker`],
//! which keeps a belief over every ball's color; component forward models
//! support backward reasoning through [`inference`].
//!
//! # Step Pipeline
//!
//! Each call to [`engine::Engine::step`] runs three phases:
//!
//! 1. **Schedule** -- Source emissions and trajectory completions due by the
//!    end of the step are queued by instant.
//! 2. **Run** -- Entries resolve earliest first at their exact instant; exits
//!    hand balls to the wired neighbour and new work joins the queue.
//! 3. **Bookkeeping** -- Advance the clock and compute the state hash.
//!
//! # Key Types
//!
//! - [`registry::ComponentRegistry`] -- Immutable map from type name to
//!   [`component::ComponentSpec`], frozen by [`registry::RegistryBuilder`].
//! - [`level::Level`] -- Instances on a grid, wired by port geometry.
//! - [`trajectory::Trajectory`] -- Constant-speed piecewise-linear paths.
//! - [`tracker::BayesianTracker`] -- Per-ball color beliefs.
//! - [`engine::Engine`] -- Owns balls, tracker, and instance state; drives
//!   the pipeline.
//! - [`fixed::SimTime`] -- Q32.32 fixed-point clock.
//! - [`render::Surface`] -- Host-implemented drawing callback.

pub mod ball;
pub mod color;
pub mod component;
pub mod distribution;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod geometry;
pub mod id;
pub mod inference;
pub mod level;
pub mod port;
pub mod registry;
pub mod render;
pub mod rng;
pub mod sim;
pub mod tracker;
pub mod trajectory;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
