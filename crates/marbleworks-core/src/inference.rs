//! Backward reasoning over component forward models.
//!
//! Every component kind has a forward model mapping input colors to a
//! distribution over the output color. The inverse question, "which inputs
//! could have produced this output", is answered by conditioning the forward
//! model on the output under a uniform prior over palette inputs.

use crate::color::{Color, Palette};
use crate::component::{ComponentKind, ComponentParams};
use crate::distribution::{Distribution, DistributionError, PROBABILITY_TOLERANCE};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("hypothesis mass sums to {total}, expected 1")]
    MalformedMass { total: f64 },
    #[error("{0} components are not unary and cannot be chained")]
    NotUnary(&'static str),
    #[error("output {0} cannot be produced by this chain")]
    Impossible(Color),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

/// One explanation of an observed output: the inputs, in port order, and
/// its posterior probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub inputs: Vec<Color>,
    pub probability: f64,
}

impl Hypothesis {
    pub fn new(inputs: Vec<Color>, probability: f64) -> Self {
        Self {
            inputs,
            probability,
        }
    }
}

/// Enumerate input tuples of length `arity` over `palette` that explain
/// `output`, weighted by `P(output | inputs)` and normalized.
///
/// `forward` returns `None` for tuples it has no model for; those carry no
/// weight. Tuples are produced in lexicographic palette order. Returns an
/// empty list when no tuple can produce `output`.
pub fn enumerate_inverse<F>(palette: &Palette, arity: usize, output: Color, forward: F) -> Vec<Hypothesis>
where
    F: Fn(&[Color]) -> Option<Distribution<Color>>,
{
    let colors = palette.colors();
    let mut hyps = Vec::new();
    let mut idx = vec![0usize; arity];
    let mut tuple = vec![colors[0]; arity];
    loop {
        for (slot, &i) in tuple.iter_mut().zip(&idx) {
            *slot = colors[i];
        }
        let weight = forward(&tuple).map_or(0.0, |d| d.probability(&output));
        if weight > 0.0 {
            hyps.push(Hypothesis::new(tuple.clone(), weight));
        }
        // Odometer increment; an arity of zero visits the empty tuple once.
        let mut pos = arity;
        loop {
            if pos == 0 {
                return normalize(hyps);
            }
            pos -= 1;
            idx[pos] += 1;
            if idx[pos] < colors.len() {
                break;
            }
            idx[pos] = 0;
        }
    }
}

fn normalize(mut hyps: Vec<Hypothesis>) -> Vec<Hypothesis> {
    let total: f64 = hyps.iter().map(|h| h.probability).sum();
    if total > 0.0 {
        for h in &mut hyps {
            h.probability /= total;
        }
    }
    hyps
}

/// Check that hypothesis mass sums to one within [`PROBABILITY_TOLERANCE`].
///
/// An empty list has mass zero and fails.
pub fn check_normalized(hyps: &[Hypothesis]) -> Result<(), InferenceError> {
    let total: f64 = hyps.iter().map(|h| h.probability).sum();
    let well_formed = hyps
        .iter()
        .all(|h| h.probability.is_finite() && h.probability >= 0.0);
    if !well_formed || (total - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(InferenceError::MalformedMass { total });
    }
    Ok(())
}

/// Distribution of the color that entered a chain of unary components,
/// given the color that came out of the last one.
///
/// Runs each input color forward through the whole chain to get the
/// likelihood of `output`, then applies Bayes' rule against `prior`.
pub fn infer_chain_input(
    chain: &[(ComponentKind, &ComponentParams)],
    prior: &Distribution<Color>,
    output: Color,
) -> Result<Distribution<Color>, InferenceError> {
    for (kind, _) in chain {
        if kind.arity() != 1 {
            return Err(InferenceError::NotUnary(kind.name()));
        }
    }
    let likelihood = |input: &Color| -> f64 {
        let mut dist = Distribution::point(*input);
        for (kind, params) in chain {
            // Unary kinds always have a forward model.
            let step = |c: &Color| kind.forward(params, &[*c]).unwrap_or_else(|| Distribution::point(*c));
            match dist.push_forward(step) {
                Ok(next) => dist = next,
                Err(_) => return 0.0,
            }
        }
        dist.probability(&output)
    };
    prior.condition(likelihood).map_err(|e| match e {
        DistributionError::ZeroMass => InferenceError::Impossible(output),
        other => InferenceError::Distribution(other),
    })
}
