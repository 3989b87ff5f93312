//! Kinematic trajectories: waypoint paths parameterized by time.
//!
//! Motion is purely kinematic. A trajectory is a polyline traversed at a
//! constant speed, so its duration is the polyline length divided by the
//! speed, and its parameterization is proportional to arc length rather than
//! uniform per segment.

use crate::geometry::Point;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrajectoryError {
    #[error("trajectory needs at least one waypoint")]
    Empty,
    #[error("speed must be finite and positive, got {0}")]
    InvalidSpeed(f64),
}

/// Total Euclidean length of the polyline through `waypoints`.
pub fn path_length(waypoints: &[Point]) -> f64 {
    waypoints.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

/// Time to traverse `waypoints` at `speed`.
///
/// A single waypoint (or a polyline of coincident points) has length zero and
/// therefore duration zero; the division is never by zero because `speed` is
/// validated first.
pub fn compute_trajectory_duration(waypoints: &[Point], speed: f64) -> Result<f64, TrajectoryError> {
    if waypoints.is_empty() {
        return Err(TrajectoryError::Empty);
    }
    if !speed.is_finite() || speed <= 0.0 {
        return Err(TrajectoryError::InvalidSpeed(speed));
    }
    Ok(path_length(waypoints) / speed)
}

/// Build `path(t)` for `t` in `[0, 1]`, see [`PiecewiseLinearPath::sample`].
pub fn create_piecewise_linear_trajectory(
    waypoints: &[Point],
) -> Result<impl Fn(f64) -> Point + use<>, TrajectoryError> {
    let path = PiecewiseLinearPath::new(waypoints.to_vec())?;
    Ok(move |t| path.sample(t))
}

// ---------------------------------------------------------------------------
// PiecewiseLinearPath
// ---------------------------------------------------------------------------

/// A polyline with precomputed cumulative arc lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseLinearPath {
    waypoints: Vec<Point>,
    /// `cumulative[i]` is the arc length from the start to `waypoints[i]`.
    cumulative: Vec<f64>,
}

impl PiecewiseLinearPath {
    pub fn new(waypoints: Vec<Point>) -> Result<Self, TrajectoryError> {
        if waypoints.is_empty() {
            return Err(TrajectoryError::Empty);
        }
        let mut cumulative = Vec::with_capacity(waypoints.len());
        let mut acc = 0.0;
        cumulative.push(acc);
        for w in waypoints.windows(2) {
            acc += w[0].distance(&w[1]);
            cumulative.push(acc);
        }
        Ok(Self {
            waypoints,
            cumulative,
        })
    }

    pub fn waypoints(&self) -> &[Point] {
        &self.waypoints
    }

    pub fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn start(&self) -> Point {
        self.waypoints[0]
    }

    pub fn end(&self) -> Point {
        self.waypoints[self.waypoints.len() - 1]
    }

    /// Position at normalized arc length `t`, clamped to `[0, 1]`.
    ///
    /// `t = 0` is the first waypoint and `t = 1` the last, exactly. A
    /// zero-length path returns its first waypoint for every `t`.
    pub fn sample(&self, t: f64) -> Point {
        let total = self.length();
        if total <= 0.0 || t <= 0.0 || t.is_nan() {
            return self.start();
        }
        if t >= 1.0 {
            return self.end();
        }
        let target = t * total;
        // First waypoint whose cumulative length reaches the target.
        let idx = self.cumulative.partition_point(|&c| c < target);
        if idx == 0 {
            return self.start();
        }
        let seg_start = self.cumulative[idx - 1];
        let seg_len = self.cumulative[idx] - seg_start;
        if seg_len <= 0.0 {
            return self.waypoints[idx];
        }
        let local = (target - seg_start) / seg_len;
        self.waypoints[idx - 1].lerp(&self.waypoints[idx], local)
    }
}

// ---------------------------------------------------------------------------
// Trajectory
// ---------------------------------------------------------------------------

/// A path plus the time it takes to traverse it.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    path: PiecewiseLinearPath,
    duration: f64,
}

impl Trajectory {
    /// Build a constant-speed trajectory through `waypoints`.
    pub fn build(waypoints: Vec<Point>, speed: f64) -> Result<Self, TrajectoryError> {
        let duration = compute_trajectory_duration(&waypoints, speed)?;
        let path = PiecewiseLinearPath::new(waypoints)?;
        Ok(Self { path, duration })
    }

    /// A motionless trajectory holding `point`.
    pub fn stationary(point: Point) -> Self {
        Self {
            path: PiecewiseLinearPath {
                waypoints: vec![point],
                cumulative: vec![0.0],
            },
            duration: 0.0,
        }
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn waypoints(&self) -> &[Point] {
        self.path.waypoints()
    }

    pub fn path(&self) -> &PiecewiseLinearPath {
        &self.path
    }

    /// Position `elapsed` seconds after the trajectory started.
    pub fn position_at(&self, elapsed: f64) -> Point {
        if self.duration <= 0.0 {
            return self.path.end();
        }
        self.path.sample(elapsed / self.duration)
    }
}
