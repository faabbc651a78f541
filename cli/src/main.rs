//! Scripted demonstration game.
//!
//! Plays the standard scenario far enough to show the interesting part of
//! the engine: certificates are dealt in the allocation round, a few
//! turns pass, the phase carrying the consolidation event arrives, and
//! the six provincial minors fold into the national railway mid operating
//! cycle. The full event log and final standings are printed.

use std::process;

use magnate_core::config::PhaseEvent;
use magnate_core::{Game, GameConfig, GameError, Holder, RoundKind, Token, Train};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), GameError> {
    let config = GameConfig::standard(&[
        ("alma", "Alma"),
        ("bren", "Bren"),
        ("cato", "Cato"),
        ("dita", "Dita"),
    ]);
    let mut game = Game::new(config)?;

    // Allocation round: deal the six provincial minors out. Alma ends up
    // with two, so she is the natural candidate for control of the
    // national railway later.
    let deals = [
        ("P1", "alma"),
        ("P2", "bren"),
        ("P3", "cato"),
        ("P4", "dita"),
        ("P5", "alma"),
        ("P6", "bren"),
    ];
    for (enterprise, party) in deals {
        if let Some(cert) = first_certificate(&game, enterprise) {
            game.transfer_certificates(vec![cert], Holder::Party(party.to_string()), true)?;
        }
    }

    // Turn 1 under phase 1.1: one operating round per cycle.
    expect_round(game.advance_round()?.round, "trading");
    expect_round(game.advance_round()?.round, "operating");
    seed_minor_assets(&mut game);

    // The first tier-3 purchase would bring phase 2.1 in; from here cycles
    // run two operating rounds.
    game.enter_phase("2.1")?;
    expect_round(game.advance_round()?.round, "trading");
    expect_round(game.advance_round()?.round, "operating");

    // Mid cycle, the first tier-4 purchase fires the consolidation event.
    if game.enter_phase("2.3")? == Some(PhaseEvent::ConsolidationReady) {
        game.trigger_consolidation()?;
    }

    let ctx = game.advance_round()?;
    if let Some(outcome) = &ctx.consolidation {
        println!(
            "consolidation: {} predecessors folded into {}, {} absorbed, controlling owner {}",
            outcome.predecessors_merged,
            outcome.successor_id,
            game.format_currency(outcome.cash_absorbed),
            outcome
                .controlling_owner
                .as_deref()
                .unwrap_or("none")
        );
        println!();
    }

    // The interrupted cycle resumes where it left off.
    expect_round(game.advance_round()?.round, "operating");
    expect_round(game.advance_round()?.round, "trading");

    print_log(&game);
    print_standings(&game);
    Ok(())
}

fn first_certificate(game: &Game, enterprise: &str) -> Option<String> {
    game.state()
        .certificates_of(enterprise)
        .first()
        .map(|c| c.id().to_string())
}

/// Give the minors the treasuries, tokens, and equipment they would have
/// earned through operating rounds, which this demonstration skips.
fn seed_minor_assets(game: &mut Game) {
    let homes = [
        ("P1", "Aachen", 120),
        ("P2", "Kassel", 85),
        ("P3", "Erfurt", 60),
        ("P4", "Aachen", 45),
        ("P5", "Stettin", 90),
        ("P6", "Trier", 30),
    ];
    let state = game.state_mut();
    for (id, home, cash) in homes {
        if let Some(minor) = state.get_enterprise_mut(id) {
            minor.credit(cash);
            minor.add_token(Token::bound(home, 0));
            minor.add_train(Train::new("2"));
        }
    }
}

fn expect_round(round: RoundKind, label: &str) {
    let matches = match round {
        RoundKind::Trading => label == "trading",
        RoundKind::Operating { .. } => label == "operating",
        _ => false,
    };
    if !matches {
        eprintln!("unexpected round: {}", round);
    }
}

fn print_log(game: &Game) {
    println!("=== Event log ===");
    for line in game.event_log().render(&game.config().currency) {
        println!("{}", line);
    }
    println!();
}

fn print_standings(game: &Game) {
    let state = game.state();
    println!(
        "=== Standings after {} rounds ===",
        game.event_log().events().last().map(|e| e.round()).unwrap_or(0)
    );
    for id in state.party_order() {
        if let Some(party) = state.get_party(id) {
            let national = state.aggregate_percent("UCR", &Holder::Party(id.to_string()));
            println!(
                "{:<6} cash {:>6}  debt {:>5}  national holding {:>3}%",
                party.name(),
                game.format_currency(party.cash()),
                game.format_currency(party.debt()),
                national
            );
        }
    }
    if let Some(national) = state.get_enterprise("UCR") {
        let bound = national.tokens().iter().filter(|t| t.is_bound()).count();
        println!(
            "{} holds {} with {} trains, {} tokens ({} on the map), controlled by {}",
            national.name(),
            game.format_currency(national.cash()),
            national.trains().len(),
            national.tokens().len(),
            bound,
            national.controlling_owner().unwrap_or("nobody")
        );
    }
    println!(
        "bank {}  (game {})",
        game.format_currency(state.bank().cash()),
        if game.is_finished() { "finished" } else { "running" }
    );
}
