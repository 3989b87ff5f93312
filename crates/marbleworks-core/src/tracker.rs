//! Per-ball belief tracking.
//!
//! The tracker keeps one [`Belief`] per live ball: a normalized distribution
//! over the level palette. Observations reported by observable components
//! reweight it by Bayes' rule; transforms (painters, mixers) push it through
//! the component's forward model. Records live exactly as long as their ball.

use slotmap::SecondaryMap;

use crate::color::{Color, Palette};
use crate::distribution::{Distribution, DistributionError, PROBABILITY_TOLERANCE};
use crate::id::BallId;

/// What the tracker currently knows about a ball's color.
pub type Belief = Distribution<Color>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    #[error("ball {0:?} is not tracked")]
    UnknownBall(BallId),
    #[error("ball {0:?} is already tracked")]
    AlreadyRegistered(BallId),
    #[error("observation of {observed} for ball {ball:?} contradicts its belief")]
    ContradictoryEvidence { ball: BallId, observed: Color },
    #[error("evidence for ball {0:?} rules out every color it could have")]
    RuledOut(BallId),
    #[error("invalid prior: {0}")]
    InvalidPrior(String),
    #[error("observation accuracy must be in (0, 1], got {0}")]
    InvalidAccuracy(f64),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

/// How a reading relates to the true color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObservationModel {
    /// The reading is the true color.
    Exact,
    /// The reading is the true color with probability `accuracy`, otherwise
    /// one of the other palette colors chosen uniformly.
    Noisy { accuracy: f64 },
}

impl ObservationModel {
    /// `P(observed | truth)`. Wrong readings are drawn from the palette
    /// colors other than the truth.
    pub fn likelihood(&self, observed: Color, truth: Color, palette: &Palette) -> f64 {
        match *self {
            ObservationModel::Exact => {
                if observed == truth {
                    1.0
                } else {
                    0.0
                }
            }
            ObservationModel::Noisy { accuracy } => {
                if observed == truth {
                    return accuracy;
                }
                let others = palette.iter().filter(|c| *c != truth).count();
                if others > 0 && palette.contains(observed) {
                    (1.0 - accuracy) / others as f64
                } else {
                    0.0
                }
            }
        }
    }

    fn validate(&self) -> Result<(), TrackerError> {
        match *self {
            ObservationModel::Noisy { accuracy }
                if !accuracy.is_finite() || accuracy <= 0.0 || accuracy > 1.0 =>
            {
                Err(TrackerError::InvalidAccuracy(accuracy))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BeliefRecord {
    belief: Belief,
    observations: u32,
}

/// Belief store for every live ball.
#[derive(Debug, Clone)]
pub struct BayesianTracker {
    palette: Palette,
    prior: Belief,
    records: SecondaryMap<BallId, BeliefRecord>,
}

impl BayesianTracker {
    /// A tracker whose default prior is uniform over `palette`.
    pub fn new(palette: Palette) -> Self {
        let prior = uniform_over(&palette);
        Self {
            palette,
            prior,
            records: SecondaryMap::new(),
        }
    }

    /// A tracker with an explicit default prior.
    pub fn with_prior(palette: Palette, prior: Belief) -> Result<Self, TrackerError> {
        check_prior(&palette, &prior)?;
        Ok(Self {
            palette,
            prior,
            records: SecondaryMap::new(),
        })
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn prior(&self) -> &Belief {
        &self.prior
    }

    /// Start tracking `ball` with the default prior.
    pub fn register(&mut self, ball: BallId) -> Result<(), TrackerError> {
        let prior = self.prior.clone();
        self.insert(ball, prior)
    }

    /// Start tracking `ball` with its own prior, e.g. a source's known mix.
    pub fn register_with_prior(&mut self, ball: BallId, prior: Belief) -> Result<(), TrackerError> {
        check_prior(&self.palette, &prior)?;
        self.insert(ball, prior)
    }

    fn insert(&mut self, ball: BallId, belief: Belief) -> Result<(), TrackerError> {
        if self.records.contains_key(ball) {
            return Err(TrackerError::AlreadyRegistered(ball));
        }
        self.records.insert(
            ball,
            BeliefRecord {
                belief,
                observations: 0,
            },
        );
        Ok(())
    }

    /// Condition the ball's belief on a reading.
    ///
    /// The posterior is proportional to belief times likelihood, so colors
    /// with zero belief stay at zero. If the reading is impossible under the
    /// current belief the record is left untouched and
    /// [`TrackerError::ContradictoryEvidence`] is returned.
    pub fn on_observation(
        &mut self,
        ball: BallId,
        observed: Color,
        model: ObservationModel,
    ) -> Result<&Belief, TrackerError> {
        model.validate()?;
        let palette = &self.palette;
        let record = self
            .records
            .get_mut(ball)
            .ok_or(TrackerError::UnknownBall(ball))?;
        let posterior = record
            .belief
            .condition(|truth| model.likelihood(observed, *truth, palette))
            .map_err(|e| match e {
                DistributionError::ZeroMass => TrackerError::ContradictoryEvidence { ball, observed },
                other => TrackerError::Distribution(other),
            })?;
        record.belief = posterior;
        record.observations += 1;
        Ok(&record.belief)
    }

    /// Condition the ball's belief on exact evidence that its color is one of
    /// the colors `allowed` accepts. Counts as an observation.
    pub fn on_evidence<F>(&mut self, ball: BallId, allowed: F) -> Result<&Belief, TrackerError>
    where
        F: Fn(&Color) -> bool,
    {
        let record = self
            .records
            .get_mut(ball)
            .ok_or(TrackerError::UnknownBall(ball))?;
        let posterior = record
            .belief
            .condition(|truth| if allowed(truth) { 1.0 } else { 0.0 })
            .map_err(|e| match e {
                DistributionError::ZeroMass => TrackerError::RuledOut(ball),
                other => TrackerError::Distribution(other),
            })?;
        record.belief = posterior;
        record.observations += 1;
        Ok(&record.belief)
    }

    pub fn belief(&self, ball: BallId) -> Result<&Belief, TrackerError> {
        self.records
            .get(ball)
            .map(|r| &r.belief)
            .ok_or(TrackerError::UnknownBall(ball))
    }

    pub fn observation_count(&self, ball: BallId) -> Result<u32, TrackerError> {
        self.records
            .get(ball)
            .map(|r| r.observations)
            .ok_or(TrackerError::UnknownBall(ball))
    }

    /// Replace the ball's belief with its image under a forward model.
    pub fn push_forward<F>(&mut self, ball: BallId, forward: F) -> Result<&Belief, TrackerError>
    where
        F: Fn(&Color) -> Distribution<Color>,
    {
        let record = self
            .records
            .get_mut(ball)
            .ok_or(TrackerError::UnknownBall(ball))?;
        record.belief = record.belief.push_forward(forward)?;
        Ok(&record.belief)
    }

    /// Register `child` with the belief obtained by combining two independent
    /// parents through `merge`. The parents stay registered.
    pub fn combine<F>(&mut self, child: BallId, parents: [BallId; 2], merge: F) -> Result<&Belief, TrackerError>
    where
        F: Fn(Color, Color) -> Color,
    {
        let a = self.belief(parents[0])?;
        let b = self.belief(parents[1])?;
        let mut joint = Vec::with_capacity(a.len() * b.len());
        for (ca, pa) in a.iter() {
            for (cb, pb) in b.iter() {
                joint.push((merge(*ca, *cb), pa * pb));
            }
        }
        let belief = Distribution::from_weights(joint)?;
        let observations = self.records[parents[0]]
            .observations
            .max(self.records[parents[1]].observations);
        if self.records.contains_key(child) {
            return Err(TrackerError::AlreadyRegistered(child));
        }
        self.records.insert(
            child,
            BeliefRecord {
                belief,
                observations,
            },
        );
        Ok(&self.records[child].belief)
    }

    /// Drop the record of a destroyed ball.
    pub fn forget(&mut self, ball: BallId) -> Option<Belief> {
        self.records.remove(ball).map(|r| r.belief)
    }

    pub fn contains(&self, ball: BallId) -> bool {
        self.records.contains_key(ball)
    }

    /// Number of tracked balls.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn uniform_over(palette: &Palette) -> Belief {
    // Palettes are never empty.
    Distribution::uniform(palette.iter()).unwrap_or_else(|_| Distribution::point(palette.colors()[0]))
}

fn check_prior(palette: &Palette, prior: &Belief) -> Result<(), TrackerError> {
    if !prior.is_normalized(PROBABILITY_TOLERANCE) {
        return Err(TrackerError::InvalidPrior(format!(
            "mass sums to {}",
            prior.total()
        )));
    }
    if let Some(c) = prior.support().find(|c| !palette.contains(**c)) {
        return Err(TrackerError::InvalidPrior(format!(
            "{c} is not in the level palette"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use slotmap::SlotMap;

    fn balls(n: usize) -> Vec<BallId> {
        let mut m: SlotMap<BallId, ()> = SlotMap::with_key();
        (0..n).map(|_| m.insert(())).collect()
    }

    #[test]
    fn register_uses_uniform_prior() {
        let ids = balls(1);
        let mut t = BayesianTracker::new(Palette::primaries());
        t.register(ids[0]).unwrap();
        let b = t.belief(ids[0]).unwrap();
        assert_relative_eq!(b.probability(&Color::Red), 1.0 / 3.0, epsilon = 1e-9);
        assert_eq!(t.observation_count(ids[0]).unwrap(), 0);
        assert_eq!(t.register(ids[0]), Err(TrackerError::AlreadyRegistered(ids[0])));
    }

    #[test]
    fn membership_evidence_narrows_and_counts() {
        let ids = balls(2);
        let mut t = BayesianTracker::new(Palette::primaries());
        t.register(ids[0]).unwrap();
        let b = t.on_evidence(ids[0], |c| *c != Color::Red).unwrap();
        assert_eq!(b.probability(&Color::Red), 0.0);
        assert_relative_eq!(b.probability(&Color::Blue), 0.5, epsilon = 1e-9);
        assert_eq!(t.observation_count(ids[0]).unwrap(), 1);

        // Evidence that excludes everything left is rejected and changes nothing.
        t.register_with_prior(ids[1], Distribution::point(Color::Blue)).unwrap();
        assert_eq!(
            t.on_evidence(ids[1], |c| *c == Color::Red),
            Err(TrackerError::RuledOut(ids[1]))
        );
        assert_eq!(t.belief(ids[1]).unwrap().probability(&Color::Blue), 1.0);
        assert_eq!(t.observation_count(ids[1]).unwrap(), 0);
    }

    #[test]
    fn exact_observation_collapses() {
        let ids = balls(1);
        let mut t = BayesianTracker::new(Palette::primaries());
        t.register(ids[0]).unwrap();
        let b = t.on_observation(ids[0], Color::Red, ObservationModel::Exact).unwrap();
        assert_eq!(b.probability(&Color::Red), 1.0);
        assert_eq!(t.observation_count(ids[0]).unwrap(), 1);
    }

    #[test]
    fn contradiction_leaves_belief_unchanged() {
        let ids = balls(1);
        let mut t = BayesianTracker::new(Palette::primaries());
        t.register(ids[0]).unwrap();
        t.on_observation(ids[0], Color::Red, ObservationModel::Exact).unwrap();
        let before = t.belief(ids[0]).unwrap().clone();
        let err = t
            .on_observation(ids[0], Color::Blue, ObservationModel::Exact)
            .unwrap_err();
        assert!(matches!(err, TrackerError::ContradictoryEvidence { observed: Color::Blue, .. }));
        assert_eq!(t.belief(ids[0]).unwrap(), &before);
        assert_eq!(t.observation_count(ids[0]).unwrap(), 1);
    }

    #[test]
    fn noisy_observation_narrows_without_collapsing() {
        let ids = balls(1);
        let mut t = BayesianTracker::new(Palette::primaries());
        t.register(ids[0]).unwrap();
        let b = t
            .on_observation(ids[0], Color::Blue, ObservationModel::Noisy { accuracy: 0.8 })
            .unwrap();
        assert_relative_eq!(b.probability(&Color::Blue), 0.8, epsilon = 1e-9);
        assert_relative_eq!(b.probability(&Color::Red), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn noisy_likelihood_for_colors_outside_palette() {
        let palette = Palette::primaries();
        let model = ObservationModel::Noisy { accuracy: 0.7 };
        assert_relative_eq!(model.likelihood(Color::Red, Color::Orange, &palette), 0.1, epsilon = 1e-9);
        assert_relative_eq!(model.likelihood(Color::Orange, Color::Orange, &palette), 0.7, epsilon = 1e-9);
        assert_eq!(model.likelihood(Color::Green, Color::Orange, &palette), 0.0);
    }

    #[test]
    fn invalid_accuracy_is_rejected() {
        let ids = balls(1);
        let mut t = BayesianTracker::new(Palette::primaries());
        t.register(ids[0]).unwrap();
        assert_eq!(
            t.on_observation(ids[0], Color::Red, ObservationModel::Noisy { accuracy: 0.0 })
                .unwrap_err(),
            TrackerError::InvalidAccuracy(0.0)
        );
    }

    #[test]
    fn unknown_ball_errors() {
        let ids = balls(1);
        let mut t = BayesianTracker::new(Palette::primaries());
        assert_eq!(t.belief(ids[0]).unwrap_err(), TrackerError::UnknownBall(ids[0]));
        assert!(
            t.on_observation(ids[0], Color::Red, ObservationModel::Exact)
                .is_err()
        );
    }

    #[test]
    fn prior_outside_palette_is_invalid() {
        let ids = balls(1);
        let mut t = BayesianTracker::new(Palette::primaries());
        let err = t
            .register_with_prior(ids[0], Distribution::point(Color::Green))
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidPrior(_)));
        assert!(BayesianTracker::with_prior(Palette::primaries(), Distribution::point(Color::Green)).is_err());
    }

    #[test]
    fn combine_pushes_joint_belief_through_merge() {
        let ids = balls(3);
        let mut t = BayesianTracker::new(Palette::primaries());
        t.register_with_prior(ids[0], Distribution::point(Color::Red)).unwrap();
        t.register_with_prior(
            ids[1],
            Distribution::uniform([Color::Yellow, Color::Blue]).unwrap(),
        )
        .unwrap();
        let child = t.combine(ids[2], [ids[0], ids[1]], Color::mix).unwrap();
        assert_relative_eq!(child.probability(&Color::Orange), 0.5, epsilon = 1e-9);
        assert_relative_eq!(child.probability(&Color::Purple), 0.5, epsilon = 1e-9);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn push_forward_and_forget() {
        let ids = balls(1);
        let mut t = BayesianTracker::new(Palette::primaries());
        t.register(ids[0]).unwrap();
        let b = t
            .push_forward(ids[0], |_| Distribution::point(Color::Blue))
            .unwrap();
        assert!(b.is_certain());
        assert!(t.forget(ids[0]).is_some());
        assert!(!t.contains(ids[0]));
        assert!(t.is_empty());
    }
}
