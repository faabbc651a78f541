//! Consolidation Protocol Tests
//!
//! A purpose-built scenario with three predecessors keeps every settlement
//! amount small enough to check by hand:
//!
//!   HB  minor, one 100% controlling certificate, no par
//!   GJ  major at par 84, controlling 20% plus eight 10% certificates
//!   VL  major at par 60, same scheme
//!
//! The successor UCR opens on the reserved 70 cell, so a GJ certificate
//! settles at +14 per 5% exchanged and a VL certificate at -10.

use magnate_core::config::{CertificateSpec, EnterpriseConfig};
use magnate_core::{
    CellId, ConsolidationOutcome, EnterpriseClass, Event, Game, GameConfig, Holder, RoundKind,
    Token, Train,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn party(id: &str) -> Holder {
    Holder::Party(id.to_string())
}

fn treasury(id: &str) -> Holder {
    Holder::Enterprise(id.to_string())
}

fn merger_config() -> GameConfig {
    let mut config = GameConfig::standard(&[("a", "Alma"), ("b", "Bren"), ("c", "Cato")]);
    config.grid_rows = vec![
        vec!["40p", "60p", "84p", "92p", "110"]
            .into_iter()
            .map(str::to_string)
            .collect(),
        vec!["35", "55", "70P", "85", "105"]
            .into_iter()
            .map(str::to_string)
            .collect(),
    ];
    config.enterprises = vec![
        EnterpriseConfig {
            id: "HB".to_string(),
            name: "Harbor Belt".to_string(),
            class: EnterpriseClass::Minor,
            scheme: vec![CertificateSpec::controlling(100)],
            par_price: None,
        },
        EnterpriseConfig {
            id: "GJ".to_string(),
            name: "Grand Junction".to_string(),
            class: EnterpriseClass::Major,
            scheme: vec![
                CertificateSpec::controlling(20),
                CertificateSpec::ordinary(10, 8),
            ],
            par_price: Some(84),
        },
        EnterpriseConfig {
            id: "VL".to_string(),
            name: "Valley Line".to_string(),
            class: EnterpriseClass::Major,
            scheme: vec![
                CertificateSpec::controlling(20),
                CertificateSpec::ordinary(10, 8),
            ],
            par_price: Some(60),
        },
    ];
    config.consolidation.predecessors =
        vec!["HB".to_string(), "GJ".to_string(), "VL".to_string()];
    config
}

fn new_game() -> Game {
    Game::new(merger_config()).unwrap()
}

/// Deal treasury certificates out during the allocation round, guard
/// released.
fn deal(game: &mut Game, cert_ids: &[&str], to: Holder) {
    game.transfer_certificates(
        cert_ids.iter().map(|id| id.to_string()).collect(),
        to,
        true,
    )
    .unwrap();
}

/// Walk the opening cycle, arm the trigger in the operating round, and
/// advance into the consolidation.
fn run_consolidation(game: &mut Game) -> ConsolidationOutcome {
    game.advance_round().unwrap(); // trading
    game.advance_round().unwrap(); // operating 1 of 1
    game.trigger_consolidation().unwrap();
    let ctx = game.advance_round().unwrap();
    assert_eq!(ctx.round, RoundKind::Consolidation);
    ctx.consolidation.unwrap()
}

fn exchange_events(game: &Game) -> Vec<(Holder, String, u8, i64)> {
    game.event_log()
        .events_of_type("certificates_exchanged")
        .iter()
        .map(|event| match event {
            Event::CertificatesExchanged {
                holder,
                predecessor_id,
                percent,
                cash,
                ..
            } => (holder.clone(), predecessor_id.clone(), *percent, *cash),
            _ => unreachable!(),
        })
        .collect()
}

// ============================================================================
// Successor Formation
// ============================================================================

#[test]
fn test_successor_opens_on_the_reserved_cell() {
    let mut game = new_game();
    let outcome = run_consolidation(&mut game);

    assert_eq!(outcome.successor_id, "UCR");
    assert_eq!(outcome.predecessors_merged, 3);

    let ucr = game.state().get_enterprise("UCR").unwrap();
    assert!(ucr.opened());
    assert!(ucr.floated());
    assert_eq!(ucr.cell(), Some(CellId { row: 1, col: 2 }));
    assert_eq!(ucr.par_cell(), ucr.cell());
    assert_eq!(game.state().grid().price(ucr.cell().unwrap()), Some(70));
    assert_eq!(ucr.cash(), 400, "seed capital only, nothing absorbed");
    assert_eq!(ucr.trains().len(), 1);
    assert_eq!(ucr.trains()[0].tier(), "4");

    assert_eq!(
        game.state().bank().cash(),
        12_000 - 400,
        "the bank pays the seed capital"
    );

    for id in ["HB", "GJ", "VL"] {
        let pred = game.state().get_enterprise(id).unwrap();
        assert!(pred.closed());
        assert_eq!(
            game.state().aggregate_percent(id, &treasury(id)),
            100,
            "{} certificates are reclaimed at close",
            id
        );
    }
}

#[test]
fn test_treasury_held_predecessors_exchange_nothing() {
    let mut game = new_game();
    let outcome = run_consolidation(&mut game);

    assert_eq!(outcome.certificates_exchanged, 0);
    assert_eq!(outcome.controlling_owner, None);
    assert_eq!(
        game.state().aggregate_percent("UCR", &treasury("UCR")),
        100
    );
}

// ============================================================================
// Certificate Exchange and Settlement
// ============================================================================

#[test]
fn test_ordinary_certificate_settles_at_par_minus_successor_price() {
    let mut game = new_game();
    deal(&mut game, &["GJ_02"], party("a"));

    let outcome = run_consolidation(&mut game);

    // 10% of GJ at par 84 against the successor's 70: one 5% certificate
    // and (84 - 70) * 10 / 5 = 28 in cash.
    assert_eq!(outcome.certificates_exchanged, 1);
    assert_eq!(game.state().aggregate_percent("UCR", &party("a")), 5);
    assert_eq!(game.state().require_party("a").unwrap().cash(), 628);
    assert_eq!(game.state().bank().cash(), 12_000 - 400 - 28);

    assert_eq!(
        exchange_events(&game),
        vec![(party("a"), "GJ".to_string(), 5, 28)]
    );

    // 5% is below the ownership threshold.
    assert_eq!(outcome.controlling_owner, None);
    assert!(game
        .event_log()
        .events_of_type("control_assigned")
        .is_empty());
}

#[test]
fn test_controlling_certificate_exchanges_for_a_ten() {
    let mut game = new_game();
    deal(&mut game, &["GJ_01"], party("a"));

    let outcome = run_consolidation(&mut game);

    assert_eq!(game.state().aggregate_percent("UCR", &party("a")), 10);
    assert_eq!(
        game.state().require_party("a").unwrap().cash(),
        600 + (84 - 70) * 20 / 5
    );
    assert_eq!(
        exchange_events(&game),
        vec![(party("a"), "GJ".to_string(), 10, 56)]
    );

    // The sole ten-percent holder takes control and already holds the
    // controlling certificate, so no corrective swap happens.
    assert_eq!(outcome.controlling_owner, Some("a".to_string()));
    assert!(game
        .state()
        .certificates_held_by(&party("a"))
        .iter()
        .any(|c| c.enterprise_id() == "UCR" && c.controlling()));
    assert!(game
        .event_log()
        .events_of_type("controlling_certificate_swapped")
        .is_empty());
}

#[test]
fn test_negative_settlement_is_paid_to_the_bank() {
    let mut game = new_game();
    deal(&mut game, &["VL_02"], party("b"));

    run_consolidation(&mut game);

    // 10% of VL at par 60 against 70 settles at -20.
    assert_eq!(game.state().require_party("b").unwrap().cash(), 580);
    assert_eq!(game.state().require_party("b").unwrap().debt(), 0);
    assert_eq!(game.state().bank().cash(), 12_000 - 400 + 20);
    assert_eq!(
        exchange_events(&game),
        vec![(party("b"), "VL".to_string(), 5, -20)]
    );
    assert!(game.event_log().events_of_type("debt_accrued").is_empty());
}

#[test]
fn test_shortfall_becomes_debt_and_a_negative_balance() {
    let mut game = new_game();
    deal(&mut game, &["VL_02"], party("b"));
    game.state_mut()
        .require_party_mut("b")
        .unwrap()
        .credit(-595); // down to 5 before the settlement

    run_consolidation(&mut game);

    let b = game.state().require_party("b").unwrap();
    assert_eq!(b.cash(), -15, "the full settlement is charged");
    assert_eq!(b.debt(), 15, "only the uncovered part becomes debt");
    assert_eq!(
        game.state().bank().cash(),
        12_000 - 400 + 20,
        "the bank receives the full amount regardless"
    );

    let debts = game.event_log().events_of_type("debt_accrued");
    assert_eq!(debts.len(), 1);
    match debts[0] {
        Event::DebtAccrued {
            party_id,
            amount,
            balance,
            ..
        } => {
            assert_eq!(party_id, "b");
            assert_eq!(*amount, 15);
            assert_eq!(*balance, -15);
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_enterprise_held_certificates_convert_to_the_pool() {
    let mut game = new_game();
    deal(&mut game, &["GJ_02"], treasury("VL"));

    run_consolidation(&mut game);

    // The 5% successor certificate lands in the market pool, and the
    // settlement that a party would have received moves nothing.
    assert_eq!(game.state().aggregate_percent("UCR", &Holder::Market), 5);
    assert_eq!(
        exchange_events(&game),
        vec![(Holder::Market, "GJ".to_string(), 5, 0)]
    );
    assert_eq!(game.state().bank().cash(), 12_000 - 400);
}

// ============================================================================
// Controlling Owner Determination
// ============================================================================

#[test]
fn test_owner_tie_breaks_by_predecessor_priority() {
    let mut game = new_game();
    deal(&mut game, &["GJ_01"], party("a"));
    deal(&mut game, &["VL_01"], party("b"));

    let outcome = run_consolidation(&mut game);

    // Both end at 10%. GJ folds before VL, so its prior owner wins.
    assert_eq!(game.state().aggregate_percent("UCR", &party("a")), 10);
    assert_eq!(game.state().aggregate_percent("UCR", &party("b")), 10);
    assert_eq!(outcome.controlling_owner, Some("a".to_string()));
    assert_eq!(
        game.state().get_enterprise("UCR").unwrap().controlling_owner(),
        Some("a")
    );

    // GJ's controlling certificate was the first ten drawn, so the winner
    // already holds the controlling successor certificate.
    assert!(game
        .event_log()
        .events_of_type("controlling_certificate_swapped")
        .is_empty());
    assert!(game
        .event_log()
        .events_of_type("qualifying_certificate_granted")
        .is_empty());
}

#[test]
fn test_qualifying_certificate_granted_against_two_fives() {
    let mut game = new_game();
    // a reaches 10% through two 5% certificates; b holds a real ten.
    deal(&mut game, &["GJ_02", "GJ_03"], party("a"));
    deal(&mut game, &["VL_01"], party("b"));

    let outcome = run_consolidation(&mut game);

    assert_eq!(outcome.controlling_owner, Some("a".to_string()));

    // The grant takes b's only ten (which happens to be the controlling
    // certificate) and compensates with a's two fives. Aggregates of both
    // parties are unchanged.
    assert_eq!(game.state().aggregate_percent("UCR", &party("a")), 10);
    assert_eq!(game.state().aggregate_percent("UCR", &party("b")), 10);
    assert!(game
        .state()
        .certificates_held_by(&party("a"))
        .iter()
        .any(|c| c.enterprise_id() == "UCR" && c.controlling()));
    assert_eq!(
        game.state()
            .certificates_held_by(&party("b"))
            .iter()
            .filter(|c| c.enterprise_id() == "UCR" && c.percent() == 5)
            .count(),
        2
    );

    let grants = game
        .event_log()
        .events_of_type("qualifying_certificate_granted");
    assert_eq!(grants.len(), 1);
    match grants[0] {
        Event::QualifyingCertificateGranted { party_id, donor, .. } => {
            assert_eq!(party_id, "a");
            assert_eq!(*donor, party("b"));
        }
        _ => unreachable!(),
    }
    // The granted certificate was already the controlling one, so no swap
    // was needed on top.
    assert!(game
        .event_log()
        .events_of_type("controlling_certificate_swapped")
        .is_empty());
}

#[test]
fn test_controlling_certificate_swaps_to_the_owner() {
    let mut game = new_game();
    // b exchanges first and draws the controlling ten; a ends on 15% and
    // must receive it through the corrective swap.
    deal(&mut game, &["GJ_01"], party("b"));
    deal(&mut game, &["VL_01", "VL_02"], party("a"));

    let outcome = run_consolidation(&mut game);

    assert_eq!(outcome.controlling_owner, Some("a".to_string()));
    assert_eq!(game.state().aggregate_percent("UCR", &party("a")), 15);
    assert_eq!(
        game.state().aggregate_percent("UCR", &party("b")),
        10,
        "the swap leaves the previous holder's aggregate unchanged"
    );
    assert!(game
        .state()
        .certificates_held_by(&party("a"))
        .iter()
        .any(|c| c.enterprise_id() == "UCR" && c.controlling()));

    let swaps = game
        .event_log()
        .events_of_type("controlling_certificate_swapped");
    assert_eq!(swaps.len(), 1);
    match swaps[0] {
        Event::ControllingCertificateSwapped {
            party_id,
            previous_holder,
            ..
        } => {
            assert_eq!(party_id, "a");
            assert_eq!(*previous_holder, party("b"));
        }
        _ => unreachable!(),
    }
}

// ============================================================================
// Asset Migration
// ============================================================================

#[test]
fn test_cash_tokens_and_equipment_migrate() {
    let mut game = new_game();
    {
        let state = game.state_mut();
        let hb = state.require_enterprise_mut("HB").unwrap();
        hb.credit(120);
        hb.add_token(Token::bound("Aachen", 20));
        hb.add_train(Train::new("2"));
        let gj = state.require_enterprise_mut("GJ").unwrap();
        gj.add_token(Token::bound("Aachen", 40));
        gj.add_token(Token::bound("Kassel", 60));
        gj.add_train(Train::new("3"));
    }

    let outcome = run_consolidation(&mut game);

    assert_eq!(outcome.cash_absorbed, 120);
    assert_eq!(outcome.tokens_migrated, 3);
    assert_eq!(outcome.token_conflicts, 1, "the second Aachen token");
    assert_eq!(outcome.equipment_moved, 2);

    let ucr = game.state().get_enterprise("UCR").unwrap();
    assert_eq!(ucr.cash(), 400 + 120);

    // Bound tokens first, the conflicted replacement left spare at the
    // end; every replacement is minted at the configured price.
    let tokens = ucr.tokens();
    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[0].location(), Some("Aachen"));
    assert_eq!(tokens[1].location(), Some("Kassel"));
    assert!(!tokens[2].is_bound());
    assert!(tokens.iter().all(|t| t.price() == 100));

    let tiers: Vec<&str> = ucr.trains().iter().map(|t| t.tier()).collect();
    assert_eq!(tiers, vec!["4", "2", "3"], "own equipment first, then absorbed");

    for id in ["HB", "GJ", "VL"] {
        let pred = game.state().get_enterprise(id).unwrap();
        assert_eq!(pred.cash(), 0);
        assert!(pred.tokens().is_empty());
        assert!(pred.trains().is_empty());
    }

    assert_eq!(game.event_log().events_of_type("token_conflict").len(), 1);
    assert_eq!(game.event_log().events_of_type("tokens_migrated").len(), 2);
    assert_eq!(
        game.event_log().events_of_type("equipment_migrated").len(),
        2
    );
}

#[test]
fn test_cash_absorption_is_logged_even_at_zero() {
    let mut game = new_game();
    run_consolidation(&mut game);

    let absorbed = game.event_log().events_of_type("cash_absorbed");
    assert_eq!(absorbed.len(), 3, "one entry per predecessor");
}

// ============================================================================
// Conservation
// ============================================================================

#[test]
fn test_consolidation_preserves_total_cash_and_invariants() {
    let mut game = new_game();
    deal(&mut game, &["GJ_02"], party("a"));
    deal(&mut game, &["VL_02"], party("b"));
    game.state_mut()
        .require_party_mut("b")
        .unwrap()
        .credit(-595);
    let total_before = game.state().total_cash();

    run_consolidation(&mut game);

    assert_eq!(
        game.state().total_cash(),
        total_before,
        "settlements and seed capital only move cash, never create it"
    );
    assert_eq!(game.state().check_invariants(), Ok(()));

    for id in ["HB", "GJ", "VL", "UCR"] {
        let total: u32 = game
            .state()
            .party_aggregates(id)
            .iter()
            .map(|(_, pct)| *pct)
            .sum::<u32>()
            + game.state().aggregate_percent(id, &Holder::Market)
            + game.state().aggregate_percent(id, &treasury(id));
        assert_eq!(total, 100, "{} certificates are conserved", id);
    }
}
