//! Evaluator contract for batched position evaluation.
//!
//! The evaluator supplies a value estimate and child priors for each leaf
//! the driver harvests. In AlphaZero-style training this is a neural
//! network running on an accelerator; the whole point of batching the
//! searches is to hand it many positions per call. The core never inspects
//! game states itself, so terminal detection is also the evaluator's job:
//! returning an empty expansion marks the position as game over and the
//! value as its final score.

use thiserror::Error;

/// Errors surfaced by an evaluator.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("model error: {0}")]
    ModelError(String),
}

/// One child of a freshly evaluated position.
#[derive(Debug, Clone)]
pub struct ExpansionEntry<S, M> {
    /// Move that produces this child.
    pub mv: M,

    /// Game state after playing `mv`.
    pub game_state: S,

    /// Prior probability for the move. Used as given by PUCT; the
    /// evaluator is expected, not required, to normalize over siblings.
    pub prior: f64,
}

/// Evaluator output for a single position.
///
/// `value` is the estimate from the side-to-move perspective of the
/// evaluated position. An empty `expansion` marks the position terminal
/// with `value` as its final score.
#[derive(Debug, Clone)]
pub struct Evaluation<S, M> {
    pub value: f64,
    pub expansion: Vec<ExpansionEntry<S, M>>,
}

/// Trait for batch position evaluators.
///
/// The driver calls this once per cycle with every harvested leaf state,
/// in game order. The output must contain exactly one [`Evaluation`] per
/// input state, in the same order; the driver rejects any other shape.
///
/// Takes `&mut self` so evaluators may keep scratch buffers, sessions, or
/// channels to an inference server without interior mutability.
pub trait BatchEvaluator<S, M> {
    fn evaluate(&mut self, states: &[&S]) -> Result<Vec<Evaluation<S, M>>, EvaluatorError>;
}

/// Plain closures work as evaluators.
impl<S, M, F> BatchEvaluator<S, M> for F
where
    F: FnMut(&[&S]) -> Result<Vec<Evaluation<S, M>>, EvaluatorError>,
{
    fn evaluate(&mut self, states: &[&S]) -> Result<Vec<Evaluation<S, M>>, EvaluatorError> {
        self(states)
    }
}
