//! Driver configuration parameters.

/// Configuration for a batched self-play run.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Number of concurrent games driven in lock-step.
    pub n_games: usize,

    /// Simulation budget per turn. Once a game's search has performed this
    /// many simulations since its last committed move, the driver commits
    /// the next move.
    pub n_evaluations: u32,

    /// PUCT exploitation constant, added to the log-growth term.
    /// AlphaZero uses 1.25.
    pub c_init: f64,

    /// PUCT exploration base in `ln((1 + N + c_base) / c_base)`.
    /// AlphaZero uses 19652. Must be nonzero.
    pub c_base: f64,

    /// Dirichlet concentration for root exploration noise.
    pub dirichlet_alpha: f64,

    /// Fraction of each root prior replaced by noise at the start of a
    /// turn. Set to 0.0 to disable noise (for evaluation play).
    pub dirichlet_fraction: f64,

    /// Hard cap on committed moves per game. A game reaching the cap is
    /// collected as a draw in progress (raw score 0).
    pub max_turns: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            n_games: 32,
            n_evaluations: 200,
            c_init: 1.25,
            c_base: 19652.0,
            dirichlet_alpha: 0.3,
            dirichlet_fraction: 0.25,
            max_turns: 1_000_000,
        }
    }
}

impl DriverConfig {
    /// Config for self-play training (with exploration noise).
    pub fn for_training() -> Self {
        Self::default()
    }

    /// Fast config for tests: few games, tiny budget, no noise.
    pub fn for_testing() -> Self {
        Self {
            n_games: 4,
            n_evaluations: 16,
            c_init: 1.25,
            c_base: 19652.0,
            dirichlet_alpha: 0.0,
            dirichlet_fraction: 0.0,
            max_turns: 256,
        }
    }

    /// Builder pattern: set the number of concurrent games.
    pub fn with_games(mut self, n: usize) -> Self {
        self.n_games = n;
        self
    }

    /// Builder pattern: set the per-turn simulation budget.
    pub fn with_evaluations(mut self, n: u32) -> Self {
        self.n_evaluations = n;
        self
    }

    /// Builder pattern: set the PUCT constants.
    pub fn with_puct(mut self, c_init: f64, c_base: f64) -> Self {
        self.c_init = c_init;
        self.c_base = c_base;
        self
    }

    /// Builder pattern: set the Dirichlet noise parameters.
    pub fn with_noise(mut self, alpha: f64, fraction: f64) -> Self {
        self.dirichlet_alpha = alpha;
        self.dirichlet_fraction = fraction;
        self
    }

    /// Builder pattern: set the per-game turn cap.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }
}
