//! End-to-End Game Tests
//!
//! The standard scenario played through its opening turns: minors dealt
//! out and equipped, the phase ladder climbed to the consolidation
//! event, the consolidation executed mid-cycle, and the game run on to
//! the bank-depletion finish.

use magnate_core::config::PhaseEvent;
use magnate_core::{Event, Game, GameConfig, Holder, RoundKind, Token, Train};

// ============================================================================
// Test Helpers
// ============================================================================

const SEATS: [(&str, &str); 4] = [
    ("alma", "Alma"),
    ("bren", "Bren"),
    ("cato", "Cato"),
    ("dita", "Dita"),
];

fn party(id: &str) -> Holder {
    Holder::Party(id.to_string())
}

fn new_game() -> Game {
    Game::new(GameConfig::standard(&SEATS)).unwrap()
}

/// Deal the six provincial minors around the table in seating order.
fn deal_minors(game: &mut Game) {
    for n in 1..=6 {
        let (seat, _) = SEATS[(n - 1) % SEATS.len()];
        game.transfer_certificates(vec![format!("P{}_01", n)], party(seat), true)
            .unwrap();
    }
}

/// Give the minors the assets they would have earned by the time the
/// consolidation fires. Two of them token the same location.
fn seed_minor_assets(game: &mut Game) {
    let cash = [120, 85, 60, 45, 90, 30];
    let homes = ["Aachen", "Kassel", "Erfurt", "Aachen", "Stettin", "Trier"];
    let state = game.state_mut();
    for n in 1..=6 {
        let minor = state.require_enterprise_mut(&format!("P{}", n)).unwrap();
        minor.credit(cash[n - 1]);
        minor.add_token(Token::bound(homes[n - 1], 40));
        minor.add_train(Train::new("2"));
    }
}

// ============================================================================
// The Full Arc
// ============================================================================

#[test]
fn test_standard_game_through_consolidation() {
    let mut game = new_game();
    deal_minors(&mut game);

    game.advance_round().unwrap(); // trading
    game.advance_round().unwrap(); // operating 1 of 1
    seed_minor_assets(&mut game);
    let total_cash = game.state().total_cash();

    game.enter_phase("2.1").unwrap();
    game.advance_round().unwrap(); // trading, turn 2
    assert_eq!(game.turn(), 2);
    game.advance_round().unwrap(); // operating 1 of 2

    assert_eq!(
        game.enter_phase("2.3").unwrap(),
        Some(PhaseEvent::ConsolidationReady)
    );
    game.trigger_consolidation().unwrap();

    let ctx = game.advance_round().unwrap();
    assert_eq!(ctx.round, RoundKind::Consolidation);
    assert_eq!(ctx.turn, 2, "a mid-cycle consolidation does not end the turn");

    let outcome = ctx.consolidation.unwrap();
    assert_eq!(outcome.successor_id, "UCR");
    assert_eq!(outcome.predecessors_merged, 6);
    assert_eq!(outcome.cash_absorbed, 120 + 85 + 60 + 45 + 90 + 30);
    assert_eq!(outcome.certificates_exchanged, 6);
    assert_eq!(outcome.tokens_migrated, 6);
    assert_eq!(outcome.token_conflicts, 1, "two minors shared Aachen");
    assert_eq!(outcome.equipment_moved, 6);
    assert_eq!(outcome.controlling_owner, Some("alma".to_string()));

    // The successor sits on the reserved cell with everything absorbed.
    let ucr = game.state().get_enterprise("UCR").unwrap();
    assert_eq!(game.state().grid().price(ucr.cell().unwrap()), Some(154));
    assert_eq!(ucr.cash(), 400 + 430);
    assert_eq!(ucr.trains().len(), 7);
    assert_eq!(ucr.trains()[0].tier(), "4");
    assert_eq!(ucr.tokens().len(), 6);
    assert_eq!(ucr.tokens().iter().filter(|t| t.is_bound()).count(), 5);
    assert!(ucr.tokens().last().map(|t| !t.is_bound()).unwrap_or(false));
    assert_eq!(ucr.controlling_owner(), Some("alma"));

    // Two minors apiece for the first two seats, one for the others.
    assert_eq!(game.state().aggregate_percent("UCR", &party("alma")), 20);
    assert_eq!(game.state().aggregate_percent("UCR", &party("bren")), 20);
    assert_eq!(game.state().aggregate_percent("UCR", &party("cato")), 10);
    assert_eq!(game.state().aggregate_percent("UCR", &party("dita")), 10);

    // Minors settle at zero: no par valuation, no cash either way.
    for seat in ["alma", "bren", "cato", "dita"] {
        assert_eq!(game.state().require_party(seat).unwrap().cash(), 475);
    }
    assert_eq!(game.state().bank().cash(), 12_000 - 400);
    assert_eq!(game.state().total_cash(), total_cash);
    assert_eq!(game.state().check_invariants(), Ok(()));

    // The interrupted cycle resumes and completes.
    let resumed = game.advance_round().unwrap();
    assert_eq!(resumed.round, RoundKind::Operating { index: 2, total: 2 });
    assert_eq!(resumed.turn, 2);
    let next = game.advance_round().unwrap();
    assert_eq!(next.round, RoundKind::Trading);
    assert_eq!(next.turn, 3);
}

#[test]
fn test_majors_are_untouched_by_the_consolidation() {
    let mut game = new_game();
    deal_minors(&mut game);
    game.transfer_certificates(vec!["NR_01".to_string()], party("dita"), true)
        .unwrap();

    game.advance_round().unwrap();
    game.advance_round().unwrap();
    game.trigger_consolidation().unwrap();
    game.advance_round().unwrap();

    let nr = game.state().get_enterprise("NR").unwrap();
    assert!(!nr.closed());
    assert_eq!(nr.controlling_owner(), Some("dita"));
    assert_eq!(game.state().aggregate_percent("NR", &party("dita")), 20);
    assert_eq!(game.state().aggregate_percent("UCR", &party("dita")), 10);
}

// ============================================================================
// Game End
// ============================================================================

#[test]
fn test_bank_depletion_after_the_consolidation_cycle() {
    let mut game = new_game();
    deal_minors(&mut game);
    game.enter_phase("2.1").unwrap();
    game.advance_round().unwrap(); // trading
    game.advance_round().unwrap(); // operating 1 of 2
    game.trigger_consolidation().unwrap();
    game.advance_round().unwrap(); // consolidation
    game.advance_round().unwrap(); // operating 2 of 2

    let bank = game.state().bank().cash();
    game.state_mut().bank_mut().pay(bank);

    let ctx = game.advance_round().unwrap();
    assert_eq!(ctx.round, RoundKind::Finished);
    assert!(game.is_finished());
    assert_eq!(
        ctx.turn, 2,
        "the completed cycle still advances the turn before the end"
    );

    let finishes = game.event_log().events_of_type("game_finished");
    assert_eq!(finishes.len(), 1);
    match finishes[0] {
        Event::GameFinished { reason, .. } => assert_eq!(reason, "bank depleted"),
        _ => unreachable!(),
    }
}

// ============================================================================
// Event Log
// ============================================================================

#[test]
fn test_event_log_tells_the_story() {
    let mut game = new_game();
    deal_minors(&mut game);
    seed_minor_assets(&mut game);
    game.advance_round().unwrap();
    game.advance_round().unwrap();
    game.trigger_consolidation().unwrap();
    game.advance_round().unwrap();

    let lines = game.event_log().render(&game.config().currency);

    assert!(lines.iter().any(|l| l == "-- Turn 1, allocation round --"));
    assert!(lines.iter().any(|l| l == "P1 merges into UCR"));
    assert!(lines.iter().any(|l| l == "UCR receives 120M"));
    assert!(lines
        .iter()
        .any(|l| l == "alma becomes the controlling owner of UCR"));
    assert!(lines
        .iter()
        .any(|l| l.contains("already has a token at Aachen")));

    // Every consolidation event carries the consolidation round's stamp.
    let consolidation_round = game.scheduler().round_ordinal();
    for event in game.event_log().events_in_round(consolidation_round) {
        assert_eq!(event.round(), consolidation_round);
    }
}

#[test]
fn test_round_stamps_partition_the_log() {
    let mut game = new_game();
    deal_minors(&mut game);
    game.advance_round().unwrap();
    game.advance_round().unwrap();

    // Setup events stamp round zero; the deals happened before any
    // advance, so they share it.
    let setup = game.event_log().events_in_round(0);
    assert!(setup
        .iter()
        .any(|e| e.event_type() == "enterprise_opened"));
    assert!(setup
        .iter()
        .any(|e| e.event_type() == "certificates_transferred"));

    assert_eq!(game.event_log().events_in_round(1).len(), 1);
    assert!(game.event_log().events_in_round(99).is_empty());
}
