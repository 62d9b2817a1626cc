//! Toy game and evaluator shared across the crate's tests.
//!
//! Nim with one pile: a move takes 1 or 2 stones and taking the last
//! stone wins, so a position with no stones left is a loss for the side
//! to move. Small enough that full self-play games finish in a handful
//! of turns.

use crate::evaluator::{Evaluation, EvaluatorError, ExpansionEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NimState {
    pub stones: u32,
}

pub(crate) type NimMove = u32;

pub(crate) fn evaluate_nim(state: NimState) -> Evaluation<NimState, NimMove> {
    if state.stones == 0 {
        return Evaluation {
            value: -1.0,
            expansion: Vec::new(),
        };
    }

    let max_take = state.stones.min(2);
    let prior = 1.0 / f64::from(max_take);

    Evaluation {
        value: 0.0,
        expansion: (1..=max_take)
            .map(|take| ExpansionEntry {
                mv: take,
                game_state: NimState {
                    stones: state.stones - take,
                },
                prior,
            })
            .collect(),
    }
}

/// Batch evaluator with uniform priors and a neutral value estimate.
pub(crate) fn nim_evaluator(
) -> impl FnMut(&[&NimState]) -> Result<Vec<Evaluation<NimState, NimMove>>, EvaluatorError> {
    |states: &[&NimState]| Ok(states.iter().map(|&&state| evaluate_nim(state)).collect())
}
