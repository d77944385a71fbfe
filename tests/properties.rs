//! Property tests for the pure decision logic.

use std::time::Duration;

use proptest::prelude::*;

use lander_duel::{decide_winner, Action, InputState, RepeatConfig, RepeatController, Winner};

proptest! {
    /// The batch size never leaves its fixed range and never jumps by more
    /// than one per observation, whatever latencies the link produces.
    #[test]
    fn repeat_stays_bounded_and_moves_one_step_at_a_time(
        dts in prop::collection::vec(0u64..2_000, 0..200),
    ) {
        let mut ctrl = RepeatController::new(RepeatConfig::default());
        let mut previous = ctrl.current();
        for ms in dts {
            ctrl.observe(Duration::from_millis(ms));
            let current = ctrl.current();
            prop_assert!((1..=6).contains(&current));
            prop_assert!(current.abs_diff(previous) <= 1);
            previous = current;
        }
    }

    /// Reset drops straight back to the floor from anywhere.
    #[test]
    fn reset_always_returns_to_the_floor(
        dts in prop::collection::vec(0u64..2_000, 0..50),
    ) {
        let mut ctrl = RepeatController::new(RepeatConfig::default());
        for ms in dts {
            ctrl.observe(Duration::from_millis(ms));
        }
        ctrl.reset();
        prop_assert_eq!(ctrl.current(), 1);
    }

    /// Swapping the two accumulators swaps the verdict.
    #[test]
    fn winner_is_antisymmetric(a in -1e6f64..1e6, b in -1e6f64..1e6) {
        let forward = decide_winner(a, b);
        let backward = decide_winner(b, a);
        match forward {
            Winner::Human => prop_assert_eq!(backward, Winner::Agent),
            Winner::Agent => prop_assert_eq!(backward, Winner::Human),
            Winner::Tie => prop_assert_eq!(backward, Winner::Tie),
        }
    }

    /// The main thruster wins over any direction combination, and without it
    /// a direction conflict cancels to neutral.
    #[test]
    fn action_mapping_priority_holds(left: bool, right: bool, thrust: bool) {
        let action = InputState { left, right, thrust }.action();
        if thrust {
            prop_assert_eq!(action, Action::Main);
        } else if left && right {
            prop_assert_eq!(action, Action::Neutral);
        } else if left {
            prop_assert_eq!(action, Action::Left);
        } else if right {
            prop_assert_eq!(action, Action::Right);
        } else {
            prop_assert_eq!(action, Action::Neutral);
        }
    }
}
