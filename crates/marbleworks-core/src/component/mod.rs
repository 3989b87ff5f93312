//! Component specs and the per-ball state machine they impose.
//!
//! A [`ComponentSpec`] is the registered, immutable description of one
//! component type: its [`ComponentKind`], ports, states, observability, and
//! editor metadata. The kind is a closed enum, so every transition below is
//! a `match` rather than a lookup by name.
//!
//! # Arrival
//!
//! [`on_arrival`] runs when a ball crosses into a component:
//!
//! 1. The ball is handed to the component and put in the kind's initial
//!    state. Kind hooks run here: a splitter picks its exit, a painter
//!    recolors the ball and pushes the tracker belief forward.
//! 2. If the component is observable and not plexed, the tracker is told
//!    what the component saw.
//! 3. The state's trajectory is computed and started at the arrival time.
//!
//! # Completion
//!
//! [`on_trajectory_complete`] runs when the current trajectory ends and
//! says what the engine should do next; see [`Completion`].

pub mod conveyor;
pub mod mixer;
pub mod painter;
pub mod sensor;
pub mod sink;
pub mod source;
pub mod splitter;

use serde::{Deserialize, Serialize};

use crate::ball::BallArena;
use crate::color::{Color, Palette};
use crate::distribution::Distribution;
use crate::engine::SimError;
use crate::event::{EventBuffer, SimEvent};
use crate::fixed::SimTime;
use crate::geometry::{Direction, Point};
use crate::id::{BallId, PortId};
use crate::inference::{Hypothesis, enumerate_inverse};
use crate::level::ComponentInstance;
use crate::port::PortSet;
use crate::rng::SimRng;
use crate::tracker::{BayesianTracker, ObservationModel};
use crate::trajectory::{Trajectory, TrajectoryError};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// The state a ball is in while owned by a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BallState {
    /// Leaving the component's center through its output.
    Emitting,
    /// Straight through, input to output.
    Traveling,
    /// Through the center, then out of the chosen output.
    Routing,
    /// Input to center, then wait for a partner.
    Entering,
    /// Parked at the center.
    Waiting,
    /// Through the center past the sensor head.
    Scanning,
    /// Through the center under the paint nozzle.
    Painting,
    /// Input to center, then destroyed.
    Consuming,
}

impl BallState {
    pub fn name(&self) -> &'static str {
        match self {
            BallState::Emitting => "emitting",
            BallState::Traveling => "traveling",
            BallState::Routing => "routing",
            BallState::Entering => "entering",
            BallState::Waiting => "waiting",
            BallState::Scanning => "scanning",
            BallState::Painting => "painting",
            BallState::Consuming => "consuming",
        }
    }

    /// Stable index, used for hashing.
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Whether the state's path ends at an output port.
    pub fn leaves(&self) -> bool {
        matches!(
            self,
            BallState::Emitting
                | BallState::Traveling
                | BallState::Routing
                | BallState::Scanning
                | BallState::Painting
        )
    }
}

/// How the renderer should present a ball in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualHint {
    Moving,
    Held,
    Inspected,
    Fading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDescriptor {
    pub state: BallState,
    pub visual: VisualHint,
}

impl StateDescriptor {
    pub const fn new(state: BallState, visual: VisualHint) -> Self {
        Self { state, visual }
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// How a splitter picks an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicy {
    /// Round-robin over outputs in declaration order.
    #[default]
    Alternate,
    /// Balls of this color take the first output, everything else the last.
    Filter(Color),
}

/// Per-instance parameters. Every kind reads the fields it cares about and
/// ignores the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentParams {
    pub direction: Direction,
    /// Travel speed in cells per second.
    pub speed: f64,
    /// Opacity shield: hides the ball from an otherwise observable component.
    pub plex: bool,
    /// Overrides the type's `is_observable` when set.
    pub observable: Option<bool>,
    pub split: SplitPolicy,
    pub paint: Color,
    /// Probability that a sensor reads the true color.
    pub accuracy: f64,
    /// Seconds between source emissions.
    pub interval: f64,
    /// Number of balls a source emits.
    pub count: u32,
    /// Source color mix. Empty means the level prior.
    pub weights: Vec<(Color, f64)>,
    /// Exact source emission order. Overrides `weights` and `count`.
    pub sequence: Vec<Color>,
}

impl Default for ComponentParams {
    fn default() -> Self {
        Self {
            direction: Direction::Right,
            speed: 1.0,
            plex: false,
            observable: None,
            split: SplitPolicy::Alternate,
            paint: Color::Red,
            accuracy: 0.9,
            interval: 1.0,
            count: 1,
            weights: Vec::new(),
            sequence: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Visual and editor metadata
// ---------------------------------------------------------------------------

/// The symbol drawn on a component cell, oriented by its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Glyph {
    Spout,
    Arrow,
    Fork,
    Funnel,
    Eye,
    Brush,
    Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualSpec {
    pub fill: [u8; 3],
    pub glyph: Glyph,
}

/// What the level editor shows in its palette of parts.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorMetadata {
    pub display_name: String,
    pub icon: String,
    pub category: String,
    pub default_params: ComponentParams,
}

impl EditorMetadata {
    pub fn new(display_name: &str, icon: &str, category: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            icon: icon.to_string(),
            category: category.to_string(),
            default_params: ComponentParams::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// The closed set of component behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Source,
    Conveyor,
    Splitter,
    Mixer,
    Sensor,
    Painter,
    Sink,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 7] = [
        ComponentKind::Source,
        ComponentKind::Conveyor,
        ComponentKind::Splitter,
        ComponentKind::Mixer,
        ComponentKind::Sensor,
        ComponentKind::Painter,
        ComponentKind::Sink,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Source => "source",
            ComponentKind::Conveyor => "conveyor",
            ComponentKind::Splitter => "splitter",
            ComponentKind::Mixer => "mixer",
            ComponentKind::Sensor => "sensor",
            ComponentKind::Painter => "painter",
            ComponentKind::Sink => "sink",
        }
    }

    /// Number of input balls that produce one output ball.
    pub fn arity(&self) -> usize {
        match self {
            ComponentKind::Source => 0,
            ComponentKind::Mixer => 2,
            _ => 1,
        }
    }

    pub fn initial_state(&self) -> BallState {
        match self {
            ComponentKind::Source => BallState::Emitting,
            ComponentKind::Conveyor => BallState::Traveling,
            ComponentKind::Splitter => BallState::Routing,
            ComponentKind::Mixer => BallState::Entering,
            ComponentKind::Sensor => BallState::Scanning,
            ComponentKind::Painter => BallState::Painting,
            ComponentKind::Sink => BallState::Consuming,
        }
    }

    /// Kinds whose output color is always the input color.
    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            ComponentKind::Conveyor
                | ComponentKind::Splitter
                | ComponentKind::Sensor
                | ComponentKind::Sink
        )
    }

    /// Distribution of the output color given the input colors, in port
    /// order. `None` when `inputs` does not match the kind's arity.
    pub fn forward(&self, params: &ComponentParams, inputs: &[Color]) -> Option<Distribution<Color>> {
        if inputs.len() != self.arity() || *self == ComponentKind::Source {
            return None;
        }
        let out = match self {
            ComponentKind::Painter => params.paint,
            ComponentKind::Mixer => Color::mix(inputs[0], inputs[1]),
            _ => inputs[0],
        };
        Some(Distribution::point(out))
    }

    /// Which inputs could have produced `output`, with probabilities.
    pub fn possible_inputs(
        &self,
        output: Color,
        params: &ComponentParams,
        palette: &Palette,
    ) -> Vec<Hypothesis> {
        match self {
            ComponentKind::Source => vec![Hypothesis::new(Vec::new(), 1.0)],
            k if k.is_identity() => vec![Hypothesis::new(vec![output], 1.0)],
            k => enumerate_inverse(palette, k.arity(), output, |inputs| k.forward(params, inputs)),
        }
    }

    /// How readings at this kind relate to the true color.
    pub fn observation_model(&self, params: &ComponentParams) -> ObservationModel {
        match self {
            ComponentKind::Sensor => ObservationModel::Noisy {
                accuracy: params.accuracy,
            },
            _ => ObservationModel::Exact,
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ComponentSpec
// ---------------------------------------------------------------------------

/// Static description of one component type.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpec {
    pub type_name: String,
    pub kind: ComponentKind,
    pub is_observable: bool,
    pub ports: PortSet,
    pub states: Vec<StateDescriptor>,
    pub visual: VisualSpec,
    pub editor: EditorMetadata,
}

impl ComponentSpec {
    /// The built-in spec for `kind`, registered under the kind's name.
    pub fn builtin(kind: ComponentKind) -> Self {
        match kind {
            ComponentKind::Source => source::spec(),
            ComponentKind::Conveyor => conveyor::spec(),
            ComponentKind::Splitter => splitter::spec(),
            ComponentKind::Mixer => mixer::spec(),
            ComponentKind::Sensor => sensor::spec(),
            ComponentKind::Painter => painter::spec(),
            ComponentKind::Sink => sink::spec(),
        }
    }

    /// A custom type reusing a built-in kind's ports and states.
    pub fn derived(type_name: &str, kind: ComponentKind) -> Self {
        let mut spec = Self::builtin(kind);
        spec.type_name = type_name.to_string();
        spec.editor.display_name = type_name.to_string();
        spec
    }

    pub fn with_observable(mut self, observable: bool) -> Self {
        self.is_observable = observable;
        self
    }

    pub fn with_default_params(mut self, params: ComponentParams) -> Self {
        self.editor.default_params = params;
        self
    }

    /// Whether an instance with `params` reports what it sees.
    pub fn observes(&self, params: &ComponentParams) -> bool {
        params.observable.unwrap_or(self.is_observable) && !params.plex
    }

    pub fn possible_inputs(
        &self,
        output: Color,
        params: &ComponentParams,
        palette: &Palette,
    ) -> Vec<Hypothesis> {
        self.kind.possible_inputs(output, params, palette)
    }

    pub fn state(&self, state: BallState) -> Option<&StateDescriptor> {
        self.states.iter().find(|d| d.state == state)
    }

    /// Where `port` sits for `instance`.
    pub fn port_point(&self, instance: &ComponentInstance, port: PortId) -> Option<Point> {
        let facing = instance.params.direction;
        self.ports
            .input(port)
            .or_else(|| self.ports.output(port))
            .map(|p| p.point(instance.position, facing))
    }

    /// The path a ball in `state` follows. Missing ports fall back to the
    /// cell center.
    pub fn waypoints(
        &self,
        state: BallState,
        instance: &ComponentInstance,
        entry: Option<PortId>,
        exit: Option<PortId>,
    ) -> Vec<Point> {
        let center = instance.position.center();
        let at = |port: Option<PortId>| {
            port.and_then(|p| self.port_point(instance, p))
                .unwrap_or(center)
        };
        match state {
            BallState::Traveling => vec![at(entry), at(exit)],
            BallState::Routing | BallState::Scanning | BallState::Painting => {
                vec![at(entry), center, at(exit)]
            }
            BallState::Entering | BallState::Consuming => vec![at(entry), center],
            BallState::Emitting => vec![center, at(exit)],
            BallState::Waiting => vec![center],
        }
    }

    /// Constant-speed trajectory for `state` at the instance's speed.
    pub fn trajectory(
        &self,
        state: BallState,
        instance: &ComponentInstance,
        entry: Option<PortId>,
        exit: Option<PortId>,
    ) -> Result<Trajectory, TrajectoryError> {
        Trajectory::build(
            self.waypoints(state, instance, entry, exit),
            instance.params.speed,
        )
    }
}

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

/// Mutable per-instance state, owned by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceState {
    Stateless,
    Splitter { next: usize },
    Mixer { waiting: Option<BallId> },
    Sensor { rng: SimRng },
    Source(source::SourceState),
}

/// Everything a transition may touch besides its own component.
pub struct TransitionContext<'a> {
    /// The instant the transition happens at.
    pub time: SimTime,
    pub balls: &'a mut BallArena,
    pub tracker: &'a mut BayesianTracker,
    pub events: &'a mut EventBuffer,
}

/// What the engine does after a trajectory completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Hand the ball to whatever is wired to this output.
    Exit(PortId),
    /// The ball stays put until another transition releases it.
    Parked,
    /// The ball no longer exists (consumed or merged).
    Removed,
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Hand `ball` to `instance`, entering through `port`.
pub fn on_arrival(
    ctx: &mut TransitionContext<'_>,
    spec: &ComponentSpec,
    instance: &ComponentInstance,
    state: &mut InstanceState,
    ball: BallId,
    port: Option<PortId>,
) -> Result<(), SimError> {
    let initial = spec.kind.initial_state();
    let truth = {
        let b = ctx.balls.get_mut(ball).ok_or(SimError::UnknownBall(ball))?;
        b.component = instance.id;
        b.state = initial;
        b.entry_port = port;
        b.exit_port = None;
        b.parked = false;
        b.color
    };

    match spec.kind {
        ComponentKind::Splitter => {
            let exit = splitter::choose_exit(instance, state, &spec.ports, truth)?;
            if let Some(b) = ctx.balls.get_mut(ball) {
                b.exit_port = Some(exit);
            }
            splitter::report_route(ctx, instance, &spec.ports, ball, exit)?;
        }
        ComponentKind::Painter => painter::apply(ctx, ball, instance.params.paint)?,
        _ => {}
    }

    if let Some(port) = port {
        tracing::trace!(?ball, component = ?instance.id, %port, kind = %spec.kind, "arrival");
        ctx.events.push(SimEvent::BallArrived {
            ball,
            component: instance.id,
            port,
            time: ctx.time,
        });
    }

    if spec.observes(&instance.params) {
        observe(ctx, spec, instance, state, ball)?;
    }

    enter_state(ctx, spec, instance, ball, initial)
}

/// Report what `instance` sees of `ball` to the tracker.
fn observe(
    ctx: &mut TransitionContext<'_>,
    spec: &ComponentSpec,
    instance: &ComponentInstance,
    state: &mut InstanceState,
    ball: BallId,
) -> Result<(), SimError> {
    let truth = ctx
        .balls
        .get(ball)
        .ok_or(SimError::UnknownBall(ball))?
        .color;
    let model = spec.kind.observation_model(&instance.params);
    let reading = match (model, state) {
        (ObservationModel::Noisy { accuracy }, InstanceState::Sensor { rng }) => {
            sensor::read(truth, accuracy, ctx.tracker.palette(), rng)
        }
        _ => truth,
    };
    ctx.tracker.on_observation(ball, reading, model)?;
    ctx.events.push(SimEvent::BallObserved {
        ball,
        component: instance.id,
        reading,
        time: ctx.time,
    });
    Ok(())
}

/// Put `ball` in `state` and start that state's trajectory at `ctx.time`.
pub(crate) fn enter_state(
    ctx: &mut TransitionContext<'_>,
    spec: &ComponentSpec,
    instance: &ComponentInstance,
    ball: BallId,
    state: BallState,
) -> Result<(), SimError> {
    let b = ctx.balls.get_mut(ball).ok_or(SimError::UnknownBall(ball))?;
    b.state = state;
    if state.leaves() && b.exit_port.is_none() {
        b.exit_port = spec.ports.outputs.first().map(|p| p.id);
    }
    let trajectory = spec
        .trajectory(state, instance, b.entry_port, b.exit_port)
        .map_err(|source| SimError::Trajectory {
            component: instance.id,
            source,
        })?;
    b.set_trajectory(trajectory, ctx.time);
    Ok(())
}

/// Resolve the end of `ball`'s current trajectory.
pub fn on_trajectory_complete(
    ctx: &mut TransitionContext<'_>,
    spec: &ComponentSpec,
    instance: &ComponentInstance,
    state: &mut InstanceState,
    ball: BallId,
) -> Result<Completion, SimError> {
    let (current, exit) = {
        let b = ctx.balls.get(ball).ok_or(SimError::UnknownBall(ball))?;
        (b.state, b.exit_port)
    };
    match current {
        BallState::Emitting
        | BallState::Traveling
        | BallState::Routing
        | BallState::Scanning
        | BallState::Painting => exit.map(Completion::Exit).ok_or(SimError::NoExit {
            component: instance.id,
            ball,
        }),
        BallState::Entering => mixer::settle(ctx, spec, instance, state, ball),
        BallState::Waiting => Ok(Completion::Parked),
        BallState::Consuming => sink::consume(ctx, instance, ball),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::check_normalized;

    #[test]
    fn identity_kinds_return_the_output() {
        let params = ComponentParams::default();
        let palette = Palette::primaries();
        for kind in [
            ComponentKind::Conveyor,
            ComponentKind::Splitter,
            ComponentKind::Sensor,
        ] {
            assert_eq!(
                kind.possible_inputs(Color::Yellow, &params, &palette),
                vec![Hypothesis::new(vec![Color::Yellow], 1.0)]
            );
        }
    }

    #[test]
    fn every_producible_output_is_normalized() {
        let palette = Palette::full();
        let params = ComponentParams {
            paint: Color::Green,
            ..ComponentParams::default()
        };
        for kind in ComponentKind::ALL {
            for output in palette.iter() {
                let hyps = kind.possible_inputs(output, &params, &palette);
                if hyps.is_empty() {
                    continue;
                }
                check_normalized(&hyps).unwrap();
            }
        }
    }

    #[test]
    fn painter_inverse_is_uniform_over_palette() {
        let palette = Palette::primaries();
        let params = ComponentParams {
            paint: Color::Blue,
            ..ComponentParams::default()
        };
        let hyps = ComponentKind::Painter.possible_inputs(Color::Blue, &params, &palette);
        assert_eq!(hyps.len(), 3);
        assert!(
            ComponentKind::Painter
                .possible_inputs(Color::Red, &params, &palette)
                .is_empty()
        );
    }

    #[test]
    fn forward_checks_arity() {
        let params = ComponentParams::default();
        assert!(ComponentKind::Mixer.forward(&params, &[Color::Red]).is_none());
        assert!(ComponentKind::Source.forward(&params, &[]).is_none());
        assert_eq!(
            ComponentKind::Mixer.forward(&params, &[Color::Red, Color::Blue]),
            Some(Distribution::point(Color::Purple))
        );
    }

    #[test]
    fn plex_hides_observable_components() {
        let spec = ComponentSpec::builtin(ComponentKind::Conveyor);
        assert!(spec.observes(&ComponentParams::default()));
        let plexed = ComponentParams {
            plex: true,
            ..ComponentParams::default()
        };
        assert!(!spec.observes(&plexed));
        let forced = ComponentParams {
            observable: Some(true),
            ..ComponentParams::default()
        };
        assert!(ComponentSpec::builtin(ComponentKind::Painter).observes(&forced));
    }

    #[test]
    fn derived_spec_keeps_kind() {
        let tunnel = ComponentSpec::derived("tunnel", ComponentKind::Conveyor).with_observable(false);
        assert_eq!(tunnel.type_name, "tunnel");
        assert_eq!(tunnel.kind, ComponentKind::Conveyor);
        assert!(!tunnel.observes(&ComponentParams::default()));
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: ComponentParams =
            serde_json::from_str(r#"{"speed": 2.0, "split": {"filter": "red"}}"#).unwrap();
        assert_eq!(params.speed, 2.0);
        assert_eq!(params.split, SplitPolicy::Filter(Color::Red));
        assert_eq!(params.direction, Direction::Right);
        assert_eq!(params.count, 1);
    }
}
