//! Single-game tree search.
//!
//! [`Search`] owns one game tree and exposes the search as separate
//! phases instead of a closed loop: the caller asks for a leaf, has it
//! evaluated elsewhere, and hands the expansion back. That split is what
//! allows [`BatchDriver`](crate::driver::BatchDriver) to interleave many
//! games against one batched evaluator.
//!
//! A turn is a sequence of simulations. Each simulation descends from the
//! root by PUCT; it either reaches an unexpanded node (returned as a
//! [`Leaf`] for evaluation) or revisits a terminal, whose stored value is
//! pushed back up so finished lines keep absorbing visit mass. Committing
//! a move records the visit distribution over the root's children as a
//! training target and discards every other subtree into the node pool's
//! freelist.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Gamma};
use thiserror::Error;
use tracing::trace;

use crate::evaluator::ExpansionEntry;
use crate::node::{Node, NodeId};
use crate::tree::{NodePool, TreeStats};

/// Errors from calling a search operation in the wrong state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("root node has not been expanded")]
    RootNotExpanded,

    #[error("game is over")]
    GameComplete,

    #[error("result was already collected")]
    AlreadyCollected,

    #[error("leaf handle was invalidated by a later mutation")]
    StaleLeaf,
}

/// Handle to an unexpanded node awaiting evaluation.
///
/// Returned by [`Search::select_leaf`] and consumed by
/// [`Search::expand_leaf`]. The handle is single-use and is invalidated by
/// any mutation of its search (`expand_leaf`, a move commit,
/// `collect_result`, `reset`); a stale handle is rejected with
/// [`SearchError::StaleLeaf`].
#[derive(Debug)]
pub struct Leaf {
    node: NodeId,
    generation: u32,
}

/// One committed position, recorded as a training example.
#[derive(Debug, Clone)]
pub struct HistoryEntry<S, M> {
    /// Root state at the moment the move was committed.
    pub game_state: S,

    /// Per-child `(move, visit fraction)` in sibling order. Fractions sum
    /// to 1 unless the move was committed before any simulation descended
    /// past the root, in which case they are all 0.
    pub search_probabilities: Vec<(M, f64)>,
}

/// Final outcome of one self-play game.
#[derive(Debug, Clone)]
pub struct GameResult<S, M> {
    /// Terminal value normalized to the perspective of the player to move
    /// at the initial position.
    pub score: f64,

    /// One entry per committed move, plus a final entry for the position
    /// the game ended on.
    pub history: Vec<HistoryEntry<S, M>>,
}

/// PUCT tree search over one game.
///
/// The search is generic over the game state `S` and move `M`; both are
/// opaque to it. Game knowledge enters only through expansions.
pub struct Search<S, M> {
    c_init: f64,
    c_base: f64,
    pool: NodePool<S, M>,
    root: NodeId,
    history: Vec<HistoryEntry<S, M>>,
    searches_this_turn: u32,
    generation: u32,
    rng: ChaCha20Rng,
}

impl<S, M> Search<S, M> {
    /// Create a search over a fresh game, seeded from OS entropy.
    pub fn new(c_init: f64, c_base: f64, initial_state: S, phony_move: M) -> Self {
        Self::with_rng(
            c_init,
            c_base,
            initial_state,
            phony_move,
            ChaCha20Rng::from_entropy(),
        )
    }

    /// Create a search with a fixed seed for reproducible sampling.
    pub fn with_seed(c_init: f64, c_base: f64, initial_state: S, phony_move: M, seed: u64) -> Self {
        Self::with_rng(
            c_init,
            c_base,
            initial_state,
            phony_move,
            ChaCha20Rng::seed_from_u64(seed),
        )
    }

    fn with_rng(c_init: f64, c_base: f64, initial_state: S, phony_move: M, rng: ChaCha20Rng) -> Self {
        debug_assert!(c_base != 0.0, "c_base must be nonzero");

        let mut pool = NodePool::new();
        let root = pool.alloc(Node::unexpanded(phony_move, initial_state, 1.0));

        Self {
            c_init,
            c_base,
            pool,
            root,
            history: Vec::new(),
            searches_this_turn: 0,
            generation: 0,
            rng,
        }
    }

    /// Game state at the current root.
    ///
    /// # Panics
    ///
    /// Panics if the result was already collected.
    pub fn game_state(&self) -> &S {
        assert!(!self.collected(), "game_state on a collected search");
        &self.pool.get(self.root).state
    }

    /// Whether the root has received its first evaluation.
    pub fn expanded(&self) -> bool {
        self.root.is_some() && self.pool.get(self.root).is_expanded()
    }

    /// Whether the game has reached a terminal root.
    pub fn complete(&self) -> bool {
        self.root.is_some() && self.pool.get(self.root).is_terminal()
    }

    /// Whether [`collect_result`](Self::collect_result) has been called.
    pub fn collected(&self) -> bool {
        self.root.is_none()
    }

    /// 1-based turn number of the current position.
    pub fn turns(&self) -> usize {
        self.history.len() + 1
    }

    /// Simulations completed since the last committed move: expansions
    /// plus terminal revisits.
    pub fn searches_this_turn(&self) -> u32 {
        self.searches_this_turn
    }

    /// Game state at a pending leaf.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn leaf_state(&self, leaf: &Leaf) -> &S {
        assert_eq!(
            leaf.generation, self.generation,
            "leaf handle was invalidated by a later mutation"
        );
        &self.pool.get(leaf.node).state
    }

    /// Snapshot of the tree for logging and tests.
    pub fn tree_stats(&self) -> TreeStats {
        let (root_visits, root_value) = if self.root.is_some() {
            let root = self.pool.get(self.root);
            (root.visit_count, root.mean_value())
        } else {
            (0, 0.0)
        };

        TreeStats {
            live_nodes: self.pool.live_nodes(),
            free_nodes: self.pool.free_nodes(),
            root_visits,
            root_value,
        }
    }

    /// Mix Dirichlet(alpha) noise into the root children's priors:
    /// `prior' = fraction * noise + (1 - fraction) * prior`.
    ///
    /// Called at the start of a turn so that self-play explores moves the
    /// evaluator currently dislikes.
    pub fn add_dirichlet_noise(&mut self, alpha: f64, fraction: f64) -> Result<(), SearchError> {
        if self.collected() {
            return Err(SearchError::AlreadyCollected);
        }
        if !self.expanded() {
            return Err(SearchError::RootNotExpanded);
        }
        if self.complete() {
            return Err(SearchError::GameComplete);
        }

        let gamma = Gamma::new(alpha, 1.0).unwrap();

        let mut children = Vec::new();
        let mut noise = Vec::new();
        let mut sum = 0.0;

        let mut current = self.pool.get(self.root).first_child;
        while current.is_some() {
            let value = gamma.sample(&mut self.rng);
            children.push(current);
            noise.push(value);
            sum += value;
            current = self.pool.get(current).next_sibling;
        }

        if sum > 0.0 {
            for value in &mut noise {
                *value /= sum;
            }
        }

        for (child, value) in children.into_iter().zip(noise) {
            let node = self.pool.get_mut(child);
            node.prior = fraction * value + (1.0 - fraction) * node.prior;
        }

        Ok(())
    }

    /// Run one PUCT descent from the root.
    ///
    /// Returns the unexpanded node the descent stopped at, or `None` when
    /// it landed on a terminal. A terminal hit still counts as a
    /// simulation: the terminal's visit count is bumped and its stored
    /// value is pushed back up from its parent, so finished lines keep
    /// feeding visit mass into their ancestors.
    ///
    /// # Panics
    ///
    /// Panics if the result was already collected.
    pub fn select_leaf(&mut self) -> Option<Leaf> {
        assert!(!self.collected(), "select_leaf on a collected search");

        let mut current = self.root;

        loop {
            let node = self.pool.get(current);

            if !node.is_expanded() {
                return Some(Leaf {
                    node: current,
                    generation: self.generation,
                });
            }

            if node.is_terminal() {
                let parent = node.parent;
                let value = -node.value_sum;

                self.pool.get_mut(current).visit_count += 1;
                self.pool.backpropagate(parent, value);
                self.searches_this_turn += 1;

                trace!(node = current.0, value, "terminal revisit");
                return None;
            }

            current = self.best_child(current);
        }
    }

    /// Pick the child maximizing Q + U.
    ///
    /// `best_score` starts at 0 and the first candidate is adopted
    /// unconditionally, so with everything tied (or everything negative)
    /// the first child in sibling order wins. Selection depends on this
    /// ordering.
    fn best_child(&self, parent: NodeId) -> NodeId {
        let node = self.pool.get(parent);
        let parent_visits = f64::from(node.visit_count);
        let exploration = ((1.0 + parent_visits + self.c_base) / self.c_base).ln() + self.c_init;
        let sqrt_parent = parent_visits.sqrt();

        let mut best = NodeId::NONE;
        let mut best_score = 0.0;

        let mut current = node.first_child;
        while current.is_some() {
            let child = self.pool.get(current);

            let q = child.mean_value();
            let u = exploration * child.prior * sqrt_parent / (1.0 + f64::from(child.visit_count));
            let score = q + u;

            if best.is_none() || score > best_score {
                best = current;
                best_score = score;
            }

            current = child.next_sibling;
        }

        debug_assert!(best.is_some(), "expanded non-terminal node has children");
        best
    }

    /// Install the evaluator's output at a pending leaf.
    ///
    /// Children are linked in input order; the order is observable through
    /// selection tie-breaks and history entries. An empty expansion marks
    /// the leaf terminal with `value` as its final score. The value is
    /// then backpropagated with alternating signs, the leaf itself
    /// included (its first visit is the simulation that found it).
    pub fn expand_leaf(
        &mut self,
        leaf: Leaf,
        value: f64,
        expansion: Vec<ExpansionEntry<S, M>>,
    ) -> Result<(), SearchError> {
        if leaf.generation != self.generation {
            return Err(SearchError::StaleLeaf);
        }

        let leaf_id = leaf.node;
        debug_assert!(!self.pool.get(leaf_id).is_expanded());

        let mut prev = NodeId::NONE;
        for entry in expansion {
            let mut child = Node::unexpanded(entry.mv, entry.game_state, entry.prior);
            child.parent = leaf_id;
            let child_id = self.pool.alloc(child);

            if prev.is_none() {
                self.pool.get_mut(leaf_id).first_child = child_id;
            } else {
                self.pool.get_mut(prev).next_sibling = child_id;
            }
            prev = child_id;
        }

        self.pool.backpropagate(leaf_id, value);
        self.searches_this_turn += 1;
        self.generation += 1;

        Ok(())
    }

    /// Commit the most-visited child; earlier siblings win ties.
    pub fn move_greedy(&mut self) -> Result<&M, SearchError> {
        self.check_can_move()?;

        let mut best = self.pool.get(self.root).first_child;
        let mut best_visits = self.pool.get(best).visit_count;

        let mut current = self.pool.get(best).next_sibling;
        while current.is_some() {
            let node = self.pool.get(current);
            if node.visit_count > best_visits {
                best = current;
                best_visits = node.visit_count;
            }
            current = node.next_sibling;
        }

        let index = self.commit(best);
        Ok(self.committed_move(index))
    }

    /// Commit a child sampled proportionally to its visit count.
    ///
    /// The draw is a single integer in `[0, root_visits - 2]` resolved by
    /// a prefix scan over the children (their visit counts sum to
    /// `root_visits - 1`). When no simulation has descended past the root
    /// yet, every child has zero visits and the choice falls back to a
    /// uniform reservoir pass over the children.
    pub fn move_proportional(&mut self) -> Result<&M, SearchError> {
        self.check_can_move()?;

        let root_visits = self.pool.get(self.root).visit_count;

        if root_visits == 1 {
            let mut chosen = self.pool.get(self.root).first_child;
            let mut seen = 1u32;

            let mut current = self.pool.get(chosen).next_sibling;
            while current.is_some() {
                if self.rng.gen_range(0..=seen) == 0 {
                    chosen = current;
                }
                seen += 1;
                current = self.pool.get(current).next_sibling;
            }

            let index = self.commit(chosen);
            return Ok(self.committed_move(index));
        }

        let mut selector = self.rng.gen_range(0..=root_visits - 2);

        let mut chosen = self.pool.get(self.root).first_child;
        loop {
            let node = self.pool.get(chosen);
            if selector < node.visit_count || node.next_sibling.is_none() {
                break;
            }
            selector -= node.visit_count;
            chosen = node.next_sibling;
        }

        let index = self.commit(chosen);
        Ok(self.committed_move(index))
    }

    /// Finish the game: record a final history entry for the position the
    /// game ended on, free the tree, and return the score and history.
    ///
    /// The raw score is the terminal root's accumulated value (0 when the
    /// game was cut off before completion), taken from the perspective of
    /// the player to move at the final position. It is negated when the
    /// final history length is even, which normalizes it to the player to
    /// move at the initial position.
    pub fn collect_result(&mut self) -> Result<GameResult<S, M>, SearchError> {
        if self.collected() {
            return Err(SearchError::AlreadyCollected);
        }

        let root = self.pool.get(self.root);
        let mut score = if root.is_terminal() { root.value_sum } else { 0.0 };

        self.commit(NodeId::NONE);

        if self.history.len() % 2 == 0 {
            score = -score;
        }

        Ok(GameResult {
            score,
            history: std::mem::take(&mut self.history),
        })
    }

    /// Drop the current tree into the freelist and start a fresh game.
    /// Node capacity is retained across games.
    pub fn reset(&mut self, initial_state: S, phony_move: M) {
        if self.root.is_some() {
            self.pool.release_subtree(self.root);
        }

        self.root = self
            .pool
            .alloc(Node::unexpanded(phony_move, initial_state, 1.0));
        self.history.clear();
        self.searches_this_turn = 0;
        self.generation += 1;
    }

    fn check_can_move(&self) -> Result<(), SearchError> {
        if self.collected() {
            return Err(SearchError::AlreadyCollected);
        }
        if !self.expanded() {
            return Err(SearchError::RootNotExpanded);
        }
        if self.complete() {
            return Err(SearchError::GameComplete);
        }
        Ok(())
    }

    /// Shared commit bookkeeping for move commits and result collection.
    ///
    /// Records the visit distribution over the root's children, frees
    /// every subtree except `new_root`, appends the history entry, and
    /// adopts `new_root` (NONE when collecting). Returns the committed
    /// child's index into the recorded probabilities.
    fn commit(&mut self, new_root: NodeId) -> Option<usize> {
        let root_node = self.pool.release(self.root);
        let denom = f64::from(root_node.visit_count.saturating_sub(1));

        // The old root's inbound move migrates to the new root; the new
        // root's own move is about to be moved into the history entry.
        let mut inherited_mv = Some(root_node.mv);
        let root_state = root_node.state;

        let mut search_probabilities = Vec::new();
        let mut new_root_index = None;

        let mut current = root_node.first_child;
        while current.is_some() {
            if current == new_root {
                let node = self.pool.get_mut(current);
                let next = node.next_sibling;
                let probability = if denom == 0.0 {
                    0.0
                } else {
                    f64::from(node.visit_count) / denom
                };

                let mv =
                    std::mem::replace(&mut node.mv, inherited_mv.take().expect("one new root"));
                node.parent = NodeId::NONE;
                node.next_sibling = NodeId::NONE;

                new_root_index = Some(search_probabilities.len());
                search_probabilities.push((mv, probability));
                current = next;
            } else {
                let node = self.pool.release_subtree(current);
                let probability = if denom == 0.0 {
                    0.0
                } else {
                    f64::from(node.visit_count) / denom
                };

                search_probabilities.push((node.mv, probability));
                current = node.next_sibling;
            }
        }

        debug_assert_eq!(new_root.is_some(), new_root_index.is_some());

        self.history.push(HistoryEntry {
            game_state: root_state,
            search_probabilities,
        });

        self.root = new_root;
        self.searches_this_turn = 0;
        self.generation += 1;

        new_root_index
    }

    fn committed_move(&self, index: Option<usize>) -> &M {
        let entry = self.history.last().expect("commit recorded an entry");
        &entry.search_probabilities[index.expect("move commits name a child")].0
    }
}
