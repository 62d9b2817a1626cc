//! Batched Monte Carlo Tree Search driven by an external evaluator.
//!
//! This crate is the decision engine of an AlphaZero-style self-play
//! trainer: given a game position and a policy/value oracle, it grows a
//! search tree with PUCT, commits moves, and records the visit
//! distributions a trainer uses as policy targets.
//!
//! The search is split into phases rather than run as a closed loop,
//! because the expensive step, evaluating a position, lives outside the
//! crate (typically a neural network on an accelerator that wants large
//! batches). Each simulation is:
//!
//! 1. **Selection**: descend from the root by PUCT to an unexpanded node
//! 2. **Evaluation**: the caller asks the external evaluator for a value
//!    and per-move priors at that node
//! 3. **Expansion**: install the children and the value
//! 4. **Backpropagation**: push the value up the path with alternating
//!    signs (consecutive plies belong to opposing players)
//!
//! [`Search`] exposes the phases for one game. [`BatchDriver`] runs many
//! games in lock-step, harvesting one leaf per game per cycle and handing
//! the whole batch to a [`BatchEvaluator`] in a single call.
//!
//! # Usage
//!
//! ```rust,ignore
//! use batch_mcts::{BatchDriver, DriverConfig, Evaluation, ExpansionEntry};
//!
//! let evaluator = |states: &[&GameState]| {
//!     let output = model.infer(states)?;
//!     Ok(output
//!         .into_iter()
//!         .map(|(value, moves)| Evaluation { value, expansion: moves })
//!         .collect())
//! };
//!
//! let driver = BatchDriver::new(
//!     DriverConfig::for_training().with_games(64),
//!     GameState::opening(),
//!     Move::none(),
//!     evaluator,
//! );
//!
//! for result in driver.run()? {
//!     replay_buffer.ingest(result.score, result.history);
//! }
//! ```
//!
//! The game rules never enter the crate: `GameState` and `Move` are opaque
//! type parameters, and legality, successor states, and terminal detection
//! are all encoded in the expansions the evaluator returns. An empty
//! expansion marks a position terminal, with the evaluation value as its
//! final score.

mod config;
mod driver;
mod evaluator;
mod node;
mod search;
mod tree;

pub use config::DriverConfig;
pub use driver::{BatchDriver, DriverError};
pub use evaluator::{BatchEvaluator, Evaluation, EvaluatorError, ExpansionEntry};
pub use search::{GameResult, HistoryEntry, Leaf, Search, SearchError};
pub use tree::TreeStats;

#[cfg(test)]
pub(crate) mod test_game;

#[cfg(test)]
mod scenario_tests;
