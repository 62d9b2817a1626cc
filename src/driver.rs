//! Lock-step driver for batched self-play.
//!
//! The driver owns one [`Search`] per concurrent game and advances them
//! together: each cycle it harvests the current leaf of every live game,
//! ships the whole batch to the evaluator in one call, and applies the
//! results back in order. Games that hit a terminal below the root this
//! cycle simply sit the batch out. The evaluator (typically a neural
//! network on an accelerator) is the only blocking point; batching is what
//! keeps it fed.
//!
//! Turn pacing follows self-play convention: once a game has spent its
//! per-turn simulation budget, the driver commits a move proportionally to
//! visit counts, optionally mixing Dirichlet noise into the new root's
//! priors at the start of the next turn. Finished games are collected and
//! drop out; the run ends when every game has been collected.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::evaluator::{BatchEvaluator, EvaluatorError};
use crate::search::{GameResult, Leaf, Search, SearchError};

/// Errors that abort a driver run.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("evaluator returned {actual} results for a batch of {expected}")]
    EvaluationMismatch { expected: usize, actual: usize },

    #[error("evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("search error: {0}")]
    Search(#[from] SearchError),
}

/// Batched self-play driver over `n_games` independent searches.
pub struct BatchDriver<S, M, E> {
    config: DriverConfig,
    searches: Vec<Search<S, M>>,
    evaluator: E,
}

impl<S, M, E> BatchDriver<S, M, E>
where
    S: Clone,
    M: Clone,
    E: BatchEvaluator<S, M>,
{
    /// Create a driver with every game at `initial_state`, each search
    /// seeded from OS entropy.
    pub fn new(config: DriverConfig, initial_state: S, phony_move: M, evaluator: E) -> Self {
        let searches = (0..config.n_games)
            .map(|_| {
                Search::new(
                    config.c_init,
                    config.c_base,
                    initial_state.clone(),
                    phony_move.clone(),
                )
            })
            .collect();

        Self {
            config,
            searches,
            evaluator,
        }
    }

    /// Create a driver with reproducible sampling; game `i` is seeded with
    /// `seed + i`.
    pub fn with_seed(
        config: DriverConfig,
        initial_state: S,
        phony_move: M,
        evaluator: E,
        seed: u64,
    ) -> Self {
        let searches = (0..config.n_games)
            .map(|i| {
                Search::with_seed(
                    config.c_init,
                    config.c_base,
                    initial_state.clone(),
                    phony_move.clone(),
                    seed + i as u64,
                )
            })
            .collect();

        Self {
            config,
            searches,
            evaluator,
        }
    }

    /// The underlying searches, for inspection.
    pub fn searches(&self) -> &[Search<S, M>] {
        &self.searches
    }

    /// Play every game to completion and return one result per game, in
    /// game order. Evaluator failure aborts the run.
    pub fn run(mut self) -> Result<Vec<GameResult<S, M>>, DriverError> {
        let mut results: Vec<Option<GameResult<S, M>>> =
            (0..self.searches.len()).map(|_| None).collect();
        let mut remaining = self.searches.len();
        let mut cycle = 0u64;

        while remaining > 0 {
            self.run_cycle(&mut results, &mut remaining, cycle)?;
            cycle += 1;
        }

        info!(games = results.len(), cycles = cycle, "self-play run finished");

        Ok(results
            .into_iter()
            .map(|result| result.expect("all games collected"))
            .collect())
    }

    /// One evaluation cycle: pace turns, harvest leaves in game order,
    /// evaluate the batch, apply the expansions in the same order.
    fn run_cycle(
        &mut self,
        results: &mut [Option<GameResult<S, M>>],
        remaining: &mut usize,
        cycle: u64,
    ) -> Result<(), DriverError> {
        let mut pending: Vec<(usize, Leaf)> = Vec::with_capacity(*remaining);

        for (index, search) in self.searches.iter_mut().enumerate() {
            if results[index].is_some() {
                continue;
            }

            if search.expanded() {
                if search.complete() || search.turns() >= self.config.max_turns {
                    if !search.complete() {
                        warn!(game = index, turns = search.turns(), "game truncated");
                    }
                    results[index] = Some(search.collect_result()?);
                    *remaining -= 1;
                    continue;
                }

                if search.searches_this_turn() >= self.config.n_evaluations {
                    search.move_proportional()?;

                    if search.complete() || search.turns() >= self.config.max_turns {
                        if !search.complete() {
                            warn!(game = index, turns = search.turns(), "game truncated");
                        }
                        results[index] = Some(search.collect_result()?);
                        *remaining -= 1;
                        continue;
                    }
                }

                // A fresh turn: the root was expanded by the previous
                // cycle and no other simulation has run yet.
                if search.searches_this_turn() == 1 && self.config.dirichlet_fraction > 0.0 {
                    search
                        .add_dirichlet_noise(self.config.dirichlet_alpha, self.config.dirichlet_fraction)?;
                }
            }

            if let Some(leaf) = search.select_leaf() {
                pending.push((index, leaf));
            }
        }

        if pending.is_empty() {
            return Ok(());
        }

        let states: Vec<&S> = pending
            .iter()
            .map(|(index, leaf)| self.searches[*index].leaf_state(leaf))
            .collect();

        let evaluations = self.evaluator.evaluate(&states)?;

        if evaluations.len() != pending.len() {
            return Err(DriverError::EvaluationMismatch {
                expected: pending.len(),
                actual: evaluations.len(),
            });
        }

        debug!(cycle, batch = pending.len(), remaining = *remaining, "evaluation cycle");

        for ((index, leaf), evaluation) in pending.into_iter().zip(evaluations) {
            self.searches[index].expand_leaf(leaf, evaluation.value, evaluation.expansion)?;
        }

        Ok(())
    }
}
