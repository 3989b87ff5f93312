use fixed::types::I32F32;

/// Simulated time in seconds, Q32.32 fixed-point.
///
/// Geometry and probabilities stay in `f64`; only the clock is fixed-point so
/// that accumulating step deltas and comparing arrival instants give the same
/// answer on every platform.
pub type SimTime = I32F32;

/// Convert seconds to [`SimTime`]. Use for configuration, not in the hot loop.
#[inline]
pub fn seconds(v: f64) -> SimTime {
    SimTime::from_num(v)
}

/// Convert seconds to [`SimTime`], returning `None` for NaN, infinities, or
/// values outside the Q32.32 range.
#[inline]
pub fn checked_seconds(v: f64) -> Option<SimTime> {
    if !v.is_finite() {
        return None;
    }
    SimTime::checked_from_num(v)
}

/// Convert [`SimTime`] to seconds. Use for display and interpolation.
#[inline]
pub fn to_seconds(t: SimTime) -> f64 {
    t.to_num::<f64>()
}
