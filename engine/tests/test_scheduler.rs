//! Round Flow Tests
//!
//! The round loop as driven through `Game`: the allocation, trading,
//! operating cycle, turn counting, phase changes, the consolidation
//! trigger gates, and the awaiting-input latch.

use magnate_core::{Game, GameConfig, GameError, RoundKind, TransitionError};

// ============================================================================
// Test Helpers
// ============================================================================

fn new_game() -> Game {
    let config = GameConfig::standard(&[("a", "Alma"), ("b", "Bren"), ("c", "Cato")]);
    Game::new(config).unwrap()
}

fn operating(index: usize, total: usize) -> RoundKind {
    RoundKind::Operating { index, total }
}

/// Advance and return only the round kind entered.
fn advance(game: &mut Game) -> RoundKind {
    game.advance_round().unwrap().round
}

// ============================================================================
// The Plain Cycle
// ============================================================================

#[test]
fn test_opening_cycle_with_one_operating_round() {
    let mut game = new_game();
    assert_eq!(*game.round(), RoundKind::Allocation);
    assert_eq!(game.turn(), 1);

    assert_eq!(advance(&mut game), RoundKind::Trading);
    assert_eq!(advance(&mut game), operating(1, 1));
    assert_eq!(game.turn(), 1);

    assert_eq!(advance(&mut game), RoundKind::Trading);
    assert_eq!(game.turn(), 2, "a completed cycle advances the turn");
    assert_eq!(
        game.event_log().events_of_type("turn_advanced").len(),
        1
    );
}

#[test]
fn test_round_ordinals_stamp_the_log() {
    let mut game = new_game();
    let first = game.advance_round().unwrap();
    let second = game.advance_round().unwrap();

    assert_eq!(first.ordinal, 1);
    assert_eq!(second.ordinal, 2);
    assert_eq!(
        game.event_log().events_in_round(2).len(),
        1,
        "round 2 opened with exactly its round_started event"
    );
}

// ============================================================================
// Phases
// ============================================================================

#[test]
fn test_phase_sets_the_operating_round_count() {
    let mut game = new_game();
    game.enter_phase("2.1").unwrap();

    assert_eq!(advance(&mut game), RoundKind::Trading);
    assert_eq!(advance(&mut game), operating(1, 2));
    assert_eq!(advance(&mut game), operating(2, 2));
    assert_eq!(advance(&mut game), RoundKind::Trading);
    assert_eq!(game.turn(), 2);
}

#[test]
fn test_phase_change_mid_cycle_applies_from_the_next_cycle() {
    let mut game = new_game();
    advance(&mut game); // trading
    assert_eq!(advance(&mut game), operating(1, 1));

    game.enter_phase("2.1").unwrap();

    // The running cycle keeps its length; the next one grows.
    assert_eq!(advance(&mut game), RoundKind::Trading);
    assert_eq!(advance(&mut game), operating(1, 2));
}

#[test]
fn test_unknown_phase_and_regression_are_rejected() {
    let mut game = new_game();
    game.enter_phase("2.1").unwrap();

    assert_eq!(
        game.enter_phase("9.9"),
        Err(GameError::Transition(TransitionError::UnknownPhase(
            "9.9".to_string()
        )))
    );
    assert_eq!(
        game.enter_phase("1.2"),
        Err(GameError::Transition(TransitionError::PhaseRegression {
            from: "2.1".to_string(),
            to: "1.2".to_string(),
        }))
    );
}

#[test]
fn test_reentering_the_current_phase_is_silent() {
    let mut game = new_game();
    game.enter_phase("2.1").unwrap();
    assert_eq!(game.enter_phase("2.1"), Ok(None));
    assert_eq!(
        game.event_log().events_of_type("phase_changed").len(),
        1,
        "a no-op phase entry leaves no trace in the log"
    );
}

#[test]
fn test_phase_event_surfaces_on_entry() {
    let mut game = new_game();
    assert_eq!(
        game.enter_phase("2.3").unwrap(),
        Some(magnate_core::config::PhaseEvent::ConsolidationReady)
    );
    assert_eq!(game.enter_phase("2.4").unwrap(), None);
}

// ============================================================================
// Consolidation Trigger Gates
// ============================================================================

#[test]
fn test_trigger_rejected_outside_operating_rounds() {
    let mut game = new_game();

    assert_eq!(
        game.trigger_consolidation(),
        Err(GameError::Transition(
            TransitionError::TriggerOutsideOperating(RoundKind::Allocation)
        ))
    );

    advance(&mut game);
    assert_eq!(
        game.trigger_consolidation(),
        Err(GameError::Transition(
            TransitionError::TriggerOutsideOperating(RoundKind::Trading)
        ))
    );
}

#[test]
fn test_trigger_is_idempotent_within_one_operating_round() {
    let mut game = new_game();
    game.enter_phase("2.1").unwrap();
    advance(&mut game); // trading
    advance(&mut game); // operating 1 of 2

    game.trigger_consolidation().unwrap();
    game.trigger_consolidation().unwrap();

    assert_eq!(
        game.event_log().events_of_type("consolidation_armed").len(),
        1,
        "re-arming must not log a second arming"
    );
    assert_eq!(advance(&mut game), RoundKind::Consolidation);
}

#[test]
fn test_consolidation_interrupts_and_resumes_the_cycle() {
    let mut game = new_game();
    game.enter_phase("2.1").unwrap();
    advance(&mut game); // trading
    advance(&mut game); // operating 1 of 2
    game.trigger_consolidation().unwrap();

    assert_eq!(advance(&mut game), RoundKind::Consolidation);
    assert_eq!(game.turn(), 1, "an interrupted cycle has not completed");

    assert_eq!(advance(&mut game), operating(2, 2));
    assert_eq!(advance(&mut game), RoundKind::Trading);
    assert_eq!(game.turn(), 2);
}

#[test]
fn test_trigger_at_cycle_end_bumps_the_turn_before_the_detour() {
    let mut game = new_game();
    advance(&mut game); // trading
    advance(&mut game); // operating 1 of 1
    game.trigger_consolidation().unwrap();

    let ctx = game.advance_round().unwrap();
    assert_eq!(ctx.round, RoundKind::Consolidation);
    assert_eq!(
        ctx.turn, 2,
        "the cycle completed with its last operating round"
    );

    assert_eq!(advance(&mut game), RoundKind::Trading);
    assert_eq!(game.turn(), 2, "no second bump when the detour ends");
}

#[test]
fn test_trigger_after_consolidation_ran_is_rejected() {
    let mut game = new_game();
    advance(&mut game); // trading
    advance(&mut game); // operating
    game.trigger_consolidation().unwrap();
    advance(&mut game); // consolidation runs

    // Still inside the consolidation round, and ever after: the successor
    // exists, so a second consolidation can never be armed.
    assert_eq!(
        game.trigger_consolidation(),
        Err(GameError::Transition(
            TransitionError::ConsolidationAlreadyDone
        ))
    );

    advance(&mut game); // back to trading
    advance(&mut game); // operating again
    assert_eq!(
        game.trigger_consolidation(),
        Err(GameError::Transition(
            TransitionError::ConsolidationAlreadyDone
        ))
    );
}

// ============================================================================
// Awaiting Input
// ============================================================================

#[test]
fn test_awaiting_input_blocks_advance() {
    let mut game = new_game();
    game.mark_awaiting_input();

    assert_eq!(
        game.advance_round().map(|ctx| ctx.round),
        Err(GameError::Transition(TransitionError::AwaitingInput))
    );
    assert_eq!(*game.round(), RoundKind::Allocation, "nothing moved");

    game.clear_awaiting_input();
    assert_eq!(advance(&mut game), RoundKind::Trading);
}

// ============================================================================
// Game End
// ============================================================================

#[test]
fn test_depleted_bank_ends_the_game_at_the_trading_boundary() {
    let mut game = new_game();
    advance(&mut game); // trading
    advance(&mut game); // operating 1 of 1

    let bank_cash = game.state().bank().cash();
    game.state_mut().bank_mut().pay(bank_cash);

    assert_eq!(advance(&mut game), RoundKind::Finished);
    assert!(game.is_finished());
    assert_eq!(game.event_log().events_of_type("game_finished").len(), 1);
}

#[test]
fn test_depletion_is_ignored_between_operating_rounds() {
    let mut game = new_game();
    game.enter_phase("2.1").unwrap();
    advance(&mut game); // trading
    advance(&mut game); // operating 1 of 2

    let bank_cash = game.state().bank().cash();
    game.state_mut().bank_mut().pay(bank_cash);

    assert_eq!(
        advance(&mut game),
        operating(2, 2),
        "the cycle runs to completion before the end is observed"
    );
    assert_eq!(advance(&mut game), RoundKind::Finished);
}

#[test]
fn test_depletion_surfaces_when_the_consolidation_detour_ends() {
    let mut game = new_game();
    advance(&mut game); // trading
    advance(&mut game); // operating 1 of 1
    game.trigger_consolidation().unwrap();

    let bank_cash = game.state().bank().cash();
    game.state_mut().bank_mut().pay(bank_cash);

    // The detour still runs on an empty bank; the stored trading
    // transition is where the end is observed.
    assert_eq!(advance(&mut game), RoundKind::Consolidation);
    assert_eq!(game.turn(), 2);

    assert_eq!(advance(&mut game), RoundKind::Finished);
    assert!(game.is_finished());
    assert_eq!(game.event_log().events_of_type("game_finished").len(), 1);
}

#[test]
fn test_finished_game_rejects_everything() {
    let mut game = new_game();
    advance(&mut game); // trading
    advance(&mut game); // operating
    let bank_cash = game.state().bank().cash();
    game.state_mut().bank_mut().pay(bank_cash);
    advance(&mut game); // finished

    assert_eq!(
        game.advance_round().map(|ctx| ctx.round),
        Err(GameError::Transition(TransitionError::GameOver))
    );
    assert_eq!(
        game.trigger_consolidation(),
        Err(GameError::Transition(TransitionError::GameOver))
    );
    assert_eq!(
        game.event_log().events_of_type("game_finished").len(),
        1,
        "the finish is logged exactly once"
    );
}
