//! Simulation strategy and state types.
//!
//! The engine is parameterized by a [`SimulationStrategy`] that determines how
//! `advance(dt)` maps onto steps. Every step runs the same three phases
//! (spawn, motion, bookkeeping); strategies only differ in step size and in
//! how many steps one `advance()` call runs.

use crate::fixed::SimTime;

// ---------------------------------------------------------------------------
// Simulation strategy
// ---------------------------------------------------------------------------

/// How the engine advances time. Chosen at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SimulationStrategy {
    /// Fixed-size steps. `advance(dt)` accumulates time and runs as many
    /// steps of `timestep` as fit, carrying the remainder forward.
    /// `step()` always advances by exactly `timestep`.
    Fixed {
        /// Duration of one step, in seconds.
        timestep: SimTime,
    },

    /// Frame-driven. Each `advance(dt)` runs one step of length `dt`.
    Variable,
}

impl SimulationStrategy {
    /// The length of a bare `step()` call. Variable mode has no natural step,
    /// so `step()` there is a zero-length step that still resolves arrivals
    /// due at the current instant.
    pub fn step_length(&self) -> SimTime {
        match self {
            SimulationStrategy::Fixed { timestep } => *timestep,
            SimulationStrategy::Variable => SimTime::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable clock state tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Number of completed steps.
    pub tick: u64,

    /// Simulated time at the end of the last step.
    pub time: SimTime,

    /// Unspent time in fixed mode. Always less than one timestep between
    /// `advance()` calls. Unused in variable mode.
    pub accumulator: SimTime,
}

impl SimState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            time: SimTime::ZERO,
            accumulator: SimTime::ZERO,
        }
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of an `Engine::advance()` call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AdvanceResult {
    /// Number of simulation steps actually executed.
    pub steps_run: u64,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A deterministic hash of simulation state, used to check that two runs of
/// the same level agree.
///
/// FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write(&[v]);
    }

    pub fn write_time(&mut self, v: SimTime) {
        self.write(&v.to_bits().to_le_bytes());
    }

    /// Feed an `f64` by bit pattern. `0.0` and `-0.0` hash differently.
    pub fn write_f64(&mut self, v: f64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
