//! End-to-end scenarios exercising the public surface only.

use crate::config::DriverConfig;
use crate::driver::BatchDriver;
use crate::evaluator::{Evaluation, EvaluatorError, ExpansionEntry};
use crate::search::Search;
use crate::test_game::{nim_evaluator, NimMove, NimState};

fn entry(mv: char, state: &'static str, prior: f64) -> ExpansionEntry<&'static str, char> {
    ExpansionEntry {
        mv,
        game_state: state,
        prior,
    }
}

/// A full two-move game driven phase by phase: expand the root, explore
/// until a winning terminal dominates, commit, collect.
#[test]
fn test_two_move_game_phase_by_phase() {
    let mut search: Search<&'static str, char> = Search::with_seed(1.25, 19652.0, "start", '-', 0);

    // First selection lands on the fresh root.
    let leaf = search.select_leaf().unwrap();
    assert_eq!(*search.leaf_state(&leaf), "start");
    search
        .expand_leaf(leaf, 0.0, vec![entry('a', "a", 0.5), entry('b', "b", 0.5)])
        .unwrap();

    // Equal priors and values: the first child wins the tie.
    let leaf = search.select_leaf().unwrap();
    assert_eq!(*search.leaf_state(&leaf), "a");
    search.expand_leaf(leaf, 1.0, Vec::new()).unwrap();

    // The next descent revisits the terminal and feeds -1 to the root.
    assert!(search.select_leaf().is_none());
    let stats = search.tree_stats();
    assert_eq!(stats.root_visits, 3);
    assert!((stats.root_value * 3.0 - (-2.0)).abs() < 1e-9);

    // Greedy commit picks the visited child and records the distribution.
    let mv = *search.move_greedy().unwrap();
    assert_eq!(mv, 'a');
    assert_eq!(search.turns(), 2);
    assert!(search.complete());

    let result = search.collect_result().unwrap();
    assert_eq!(result.history.len(), 2);

    assert_eq!(result.history[0].game_state, "start");
    assert_eq!(
        result.history[0].search_probabilities,
        vec![('a', 1.0), ('b', 0.0)]
    );
    assert_eq!(result.history[1].game_state, "a");
    assert!(result.history[1].search_probabilities.is_empty());

    // The terminal value +1 belongs to the side to move after 'a'; the
    // even-length history flips it to the first player's perspective.
    assert!((result.score - (-1.0)).abs() < 1e-12);

    assert!(search.collected());
    assert!(!search.expanded());
}

/// Driver-level self-play over a batch of games, checking the training
/// record invariants the trainer relies on.
#[test]
fn test_nim_self_play_training_records() {
    let driver = BatchDriver::with_seed(
        DriverConfig::for_testing().with_games(8).with_evaluations(24),
        NimState { stones: 6 },
        0 as NimMove,
        nim_evaluator(),
        17,
    );

    let results = driver.run().unwrap();
    assert_eq!(results.len(), 8);

    for result in &results {
        assert!((result.score.abs() - 1.0).abs() < 1e-9);
        assert_eq!(result.history[0].game_state, NimState { stones: 6 });

        let (final_entry, committed) = result.history.split_last().unwrap();
        assert_eq!(final_entry.game_state, NimState { stones: 0 });
        assert!(final_entry.search_probabilities.is_empty());

        // Stones strictly decrease along the recorded line, each committed
        // entry distributes exactly one unit of probability mass, and the
        // recorded moves connect consecutive states.
        for (index, entry) in committed.iter().enumerate() {
            let total: f64 = entry.search_probabilities.iter().map(|(_, p)| p).sum();
            assert!((total - 1.0).abs() < 1e-9);

            let next = &result.history[index + 1];
            assert!(next.game_state.stones < entry.game_state.stones);

            let taken = entry.game_state.stones - next.game_state.stones;
            assert!(entry
                .search_probabilities
                .iter()
                .any(|(mv, probability)| *mv == taken && *probability > 0.0));
        }
    }
}

/// A forced single-move chain pins the committed-move count, so the
/// reported score parity is exact: the player left to move in the empty
/// position loses, and the score is always reported from the first
/// player's perspective.
#[test]
fn test_score_parity_over_forced_chains() {
    let forced_chain = |states: &[&u32]| -> Result<Vec<Evaluation<u32, u32>>, EvaluatorError> {
        Ok(states
            .iter()
            .map(|&&stones| {
                if stones == 0 {
                    Evaluation::<u32, u32> {
                        value: -1.0,
                        expansion: Vec::new(),
                    }
                } else {
                    Evaluation {
                        value: 0.0,
                        expansion: vec![ExpansionEntry {
                            mv: 1,
                            game_state: stones - 1,
                            prior: 1.0,
                        }],
                    }
                }
            })
            .collect())
    };

    let play = |length: u32| {
        BatchDriver::with_seed(
            DriverConfig::for_testing().with_games(3).with_evaluations(4),
            length,
            0u32,
            forced_chain,
            11,
        )
        .run()
        .unwrap()
    };

    // Two forced moves: the first player faces the empty position.
    for result in play(2) {
        assert_eq!(result.history.len(), 3);
        assert!((result.score - (-1.0)).abs() < 1e-12);
    }

    // Three forced moves: the second player faces the empty position.
    for result in play(3) {
        assert_eq!(result.history.len(), 4);
        assert!((result.score - 1.0).abs() < 1e-12);
    }
}
