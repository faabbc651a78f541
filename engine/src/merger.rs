//! Consolidation protocol
//!
//! The consolidation folds a configured list of predecessor enterprises
//! into one newly created national successor, in a single in-place pass:
//!
//! 1. The successor opens on the reserved grid cell with seed capital and
//!    its starting equipment.
//! 2. Each predecessor, in priority order, hands over its treasury, its
//!    tokens, and its equipment; its certificates are exchanged for
//!    successor certificates with a cash settlement; then it closes.
//! 3. The successor's tokens are reordered bound-first.
//! 4. The controlling owner of the successor is determined and the
//!    certificate guarantees are enforced.
//!
//! There is no rollback: every step validates what it needs before
//! mutating, and a failure mid-protocol is fatal to the game.
//!
//! # Settlement
//!
//! A holder exchanging certificates of one predecessor settles at
//! `(predecessor par - successor price) / 5` per percentage point
//! exchanged. Predecessors that never had a par valuation settle at zero.
//! A negative settlement is paid by the holder; a party that cannot cover
//! it absorbs the shortfall as a negative balance and matching debt. The
//! market pool neither pays nor receives.

use crate::config::GameConfig;
use crate::market::CellTag;
use crate::models::certificate::{CertificateBundle, Holder};
use crate::models::enterprise::Train;
use crate::models::event::{Event, EventLog};
use crate::models::state::{GameState, InvariantViolation};
use crate::{ledger, migration, registry};

/// What a completed consolidation did.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationOutcome {
    pub successor_id: String,
    pub controlling_owner: Option<String>,
    pub predecessors_merged: usize,
    /// Treasury cash moved into the successor, seed capital excluded.
    pub cash_absorbed: i64,
    /// Successor certificates delivered to exchanging holders.
    pub certificates_exchanged: usize,
    pub tokens_migrated: usize,
    pub token_conflicts: usize,
    pub equipment_moved: usize,
}

/// Run the whole consolidation protocol. Called by the game engine when a
/// consolidation round begins.
pub fn run_consolidation(
    state: &mut GameState,
    config: &GameConfig,
    log: &mut EventLog,
    round: usize,
) -> Result<ConsolidationOutcome, InvariantViolation> {
    let plan = &config.consolidation;
    let successor_id = plan.successor.id.clone();

    // STEP 1: OPEN THE SUCCESSOR
    // First reserved cell in grid order; its price is both the par and the
    // starting valuation.
    let cell = state
        .grid()
        .cells_of_type(CellTag::MergerPar)
        .into_iter()
        .next()
        .ok_or(InvariantViolation::MissingConsolidationCell)?;
    let successor_price = state
        .grid()
        .price(cell)
        .ok_or(InvariantViolation::MissingConsolidationCell)?;

    registry::open_enterprise_at_cell(
        state,
        &successor_id,
        &plan.successor.name,
        plan.successor.class,
        &plan.successor.scheme,
        cell,
    )?;

    let seed_cash = plan.successor.starting_cash;
    state.bank_mut().pay(seed_cash);
    let successor = state.require_enterprise_mut(&successor_id)?;
    successor.mark_floated();
    successor.credit(seed_cash);
    successor.add_train(Train::new(&plan.successor.starting_equipment));

    log.log(Event::SuccessorOpened {
        round,
        enterprise_id: successor_id.clone(),
        price: successor_price,
        cash: seed_cash,
        equipment_tier: plan.successor.starting_equipment.clone(),
    });

    let mut outcome = ConsolidationOutcome {
        successor_id: successor_id.clone(),
        controlling_owner: None,
        predecessors_merged: 0,
        cash_absorbed: 0,
        certificates_exchanged: 0,
        tokens_migrated: 0,
        token_conflicts: 0,
        equipment_moved: 0,
    };

    // STEP 2: FOLD EACH PREDECESSOR, IN PRIORITY ORDER
    // Controlling owners are collected as encountered; the list doubles as
    // the tie-break order for the determination below.
    let mut prior_owners: Vec<String> = Vec::new();
    for predecessor_id in &plan.predecessors {
        log.log(Event::PredecessorMerging {
            round,
            enterprise_id: predecessor_id.clone(),
            successor_id: successor_id.clone(),
        });

        if let Some(owner) = state.require_enterprise(predecessor_id)?.controlling_owner() {
            let owner = owner.to_string();
            if !prior_owners.contains(&owner) {
                prior_owners.push(owner);
            }
        }

        // 2a: treasury
        let amount = state.require_enterprise_mut(predecessor_id)?.take_cash();
        state.require_enterprise_mut(&successor_id)?.credit(amount);
        outcome.cash_absorbed += amount;
        log.log(Event::CashAbsorbed {
            round,
            enterprise_id: predecessor_id.clone(),
            successor_id: successor_id.clone(),
            amount,
        });

        // 2b: tokens
        let tokens =
            migration::migrate_tokens(state, predecessor_id, &successor_id, plan.token_price)?;
        outcome.tokens_migrated += tokens.locations.len();
        outcome.token_conflicts += tokens.conflicts.len();
        if !tokens.locations.is_empty() {
            log.log(Event::TokensMigrated {
                round,
                enterprise_id: predecessor_id.clone(),
                successor_id: successor_id.clone(),
                locations: tokens.locations,
            });
        }
        for location in tokens.conflicts {
            log.log(Event::TokenConflict {
                round,
                successor_id: successor_id.clone(),
                location,
            });
        }

        // 2c: equipment
        let tiers = migration::migrate_equipment(state, predecessor_id, &successor_id)?;
        outcome.equipment_moved += tiers.len();
        if !tiers.is_empty() {
            log.log(Event::EquipmentMigrated {
                round,
                enterprise_id: predecessor_id.clone(),
                successor_id: successor_id.clone(),
                tiers,
            });
        }

        // 2d: certificates
        outcome.certificates_exchanged +=
            exchange_certificates(state, predecessor_id, &successor_id, successor_price, log, round)?;

        // 2e: retire the predecessor
        registry::close_enterprise(state, predecessor_id)?;
        log.log(Event::PredecessorClosed {
            round,
            enterprise_id: predecessor_id.clone(),
        });
        outcome.predecessors_merged += 1;
    }

    // STEP 3: TOKEN ORDER
    state
        .require_enterprise_mut(&successor_id)?
        .sort_tokens_bound_first();

    // STEP 4: CONTROLLING OWNER
    outcome.controlling_owner =
        determine_controlling_owner(state, &successor_id, &prior_owners, log, round)?;

    state.check_invariants()?;
    Ok(outcome)
}

/// Exchange every certificate of one predecessor for successor
/// certificates, holder by holder, settling cash as it goes. Returns the
/// number of successor certificates delivered.
///
/// The controlling predecessor certificate converts to a 10% successor
/// certificate, every other one to 5%. Certificates held by enterprises
/// are redirected to the market pool. Successor certificates are drawn
/// from its treasury in creation order.
fn exchange_certificates(
    state: &mut GameState,
    predecessor_id: &str,
    successor_id: &str,
    successor_price: i64,
    log: &mut EventLog,
    round: usize,
) -> Result<usize, InvariantViolation> {
    let predecessor = state.require_enterprise(predecessor_id)?;
    let predecessor_par = predecessor
        .par_cell()
        .and_then(|cell| state.grid().price(cell));

    // Snapshot before mutating: (id, percent, controlling, holder) in
    // creation order.
    let certs: Vec<(String, u8, bool, Holder)> = state
        .certificates_of(predecessor_id)
        .iter()
        .map(|c| {
            (
                c.id().to_string(),
                c.percent(),
                c.controlling(),
                c.holder().clone(),
            )
        })
        .collect();

    let mut holders: Vec<Holder> = Vec::new();
    for (_, _, _, holder) in &certs {
        if !holders.contains(holder) {
            holders.push(holder.clone());
        }
    }

    let mut delivered_total = 0usize;
    for holder in holders {
        // The predecessor's own treasury does not exchange; its
        // certificates are reclaimed when it closes.
        if holder == Holder::Enterprise(predecessor_id.to_string()) {
            continue;
        }
        // Certificates held by any other enterprise convert into
        // market-pool holdings.
        let destination = match &holder {
            Holder::Enterprise(_) => Holder::Market,
            other => other.clone(),
        };

        let mut exchanged_percent: u32 = 0;
        let mut delivered_percent: u32 = 0;
        for (_, percent, controlling, cert_holder) in &certs {
            if *cert_holder != holder {
                continue;
            }
            let needed: u8 = if *controlling { 10 } else { 5 };
            let drawn = state
                .certificates_of(successor_id)
                .iter()
                .find(|c| {
                    *c.holder() == Holder::Enterprise(successor_id.to_string())
                        && c.percent() == needed
                })
                .map(|c| c.id().to_string())
                .ok_or(InvariantViolation::PoolExhausted {
                    enterprise_id: successor_id.to_string(),
                    percent: needed,
                })?;
            state
                .require_certificate_mut(&drawn)?
                .set_holder(destination.clone());
            exchanged_percent += u32::from(*percent);
            delivered_percent += u32::from(needed);
            delivered_total += 1;
        }

        let cash_per_unit = predecessor_par
            .map(|par| par - successor_price)
            .unwrap_or(0);
        let cash = cash_per_unit * i64::from(exchanged_percent) / 5;
        let settled = settle_exchange(state, &destination, cash, log, round)?;

        log.log(Event::CertificatesExchanged {
            round,
            holder: destination,
            predecessor_id: predecessor_id.to_string(),
            percent: delivered_percent as u8,
            cash: settled,
        });
    }

    Ok(delivered_total)
}

/// Apply one holder's settlement and return the amount actually moved.
/// Positive amounts come from the bank; negative amounts go to the bank,
/// with party shortfalls converted to debt. The market pool settles
/// nothing regardless of the computed amount.
fn settle_exchange(
    state: &mut GameState,
    destination: &Holder,
    cash: i64,
    log: &mut EventLog,
    round: usize,
) -> Result<i64, InvariantViolation> {
    match destination {
        Holder::Market => Ok(0),
        Holder::Party(party_id) => {
            if cash > 0 {
                state.bank_mut().pay(cash);
                state.require_party_mut(party_id)?.credit(cash);
            } else if cash < 0 {
                let owed = -cash;
                let shortfall = state.require_party_mut(party_id)?.pay_absorbing_debt(owed);
                state.bank_mut().receive(owed);
                if shortfall > 0 {
                    let balance = state.require_party(party_id)?.cash();
                    log.log(Event::DebtAccrued {
                        round,
                        party_id: party_id.clone(),
                        amount: shortfall,
                        balance,
                    });
                }
            }
            Ok(cash)
        }
        Holder::Enterprise(_) if cash < 0 => Err(InvariantViolation::NonPartyDebt {
            holder: destination.to_string(),
            amount: -cash,
        }),
        Holder::Enterprise(_) => Ok(0),
    }
}

/// Determine who controls the successor once every predecessor has folded.
///
/// The winner is the party with the largest aggregate holding, ties broken
/// by the order prior controlling owners were encountered during the fold;
/// parties absent from that order sort after all present in it. A maximum
/// below 10% leaves the successor without a controlling owner, which is
/// legal.
///
/// Two guarantees are then enforced with the control guard engaged, so a
/// slip here cannot move control: the owner must hold a certificate of 10%
/// denomination (granted against two 5% certificates if not), and the
/// owner must hold the controlling certificate (swapped against an
/// ordinary 10% certificate if not). Neither swap changes any uninvolved
/// party's aggregate.
fn determine_controlling_owner(
    state: &mut GameState,
    successor_id: &str,
    priority: &[String],
    log: &mut EventLog,
    round: usize,
) -> Result<Option<String>, InvariantViolation> {
    let aggregates = state.party_aggregates(successor_id);
    let max = aggregates.iter().map(|(_, pct)| *pct).max().unwrap_or(0);
    if max < 10 {
        return Ok(None);
    }

    let mut candidates: Vec<String> = aggregates
        .into_iter()
        .filter(|(_, pct)| *pct == max)
        .map(|(id, _)| id)
        .collect();
    candidates.sort_by_key(|id| {
        priority
            .iter()
            .position(|p| p == id)
            .unwrap_or(priority.len())
    });
    let owner = match candidates.first() {
        Some(owner) => owner.clone(),
        None => return Ok(None),
    };
    let owner_holder = Holder::Party(owner.clone());

    // Qualifying-certificate guarantee.
    let has_ten = state
        .certificates_of(successor_id)
        .iter()
        .any(|c| *c.holder() == owner_holder && c.percent() == 10);
    if !has_ten {
        let donor_cert = state
            .certificates_of(successor_id)
            .into_iter()
            .find(|c| *c.holder() == Holder::Market && c.percent() == 10)
            .or_else(|| {
                priority.last().and_then(|lowest| {
                    let lowest = Holder::Party(lowest.clone());
                    state
                        .certificates_of(successor_id)
                        .into_iter()
                        .find(|c| *c.holder() == lowest && c.percent() == 10)
                })
            })
            .map(|c| (c.id().to_string(), c.holder().clone()))
            .ok_or_else(|| InvariantViolation::QualifyingCertUnavailable {
                enterprise_id: successor_id.to_string(),
                party_id: owner.clone(),
            })?;
        let (donor_cert_id, donor) = donor_cert;

        let compensation: Vec<String> = state
            .certificates_of(successor_id)
            .iter()
            .filter(|c| *c.holder() == owner_holder && c.percent() == 5 && !c.controlling())
            .take(2)
            .map(|c| c.id().to_string())
            .collect();
        if compensation.len() < 2 {
            return Err(InvariantViolation::QualifyingCertUnavailable {
                enterprise_id: successor_id.to_string(),
                party_id: owner.clone(),
            });
        }

        ledger::transfer(
            state,
            &CertificateBundle::single(&donor_cert_id),
            &owner_holder,
            false,
        )?;
        ledger::transfer(state, &CertificateBundle::new(compensation), &donor, false)?;
        log.log(Event::QualifyingCertificateGranted {
            round,
            enterprise_id: successor_id.to_string(),
            party_id: owner.clone(),
            donor,
        });
    }

    // Controlling-certificate guarantee.
    let controlling = state
        .certificates_of(successor_id)
        .iter()
        .find(|c| c.controlling())
        .map(|c| (c.id().to_string(), c.holder().clone()));
    if let Some((controlling_id, previous_holder)) = controlling {
        if previous_holder != owner_holder {
            let ordinary_ten = state
                .certificates_of(successor_id)
                .iter()
                .find(|c| *c.holder() == owner_holder && c.percent() == 10 && !c.controlling())
                .map(|c| c.id().to_string())
                .ok_or_else(|| InvariantViolation::SwapCertUnavailable {
                    enterprise_id: successor_id.to_string(),
                    party_id: owner.clone(),
                })?;

            ledger::transfer(
                state,
                &CertificateBundle::single(&controlling_id),
                &owner_holder,
                false,
            )?;
            ledger::transfer(
                state,
                &CertificateBundle::single(&ordinary_ten),
                &previous_holder,
                false,
            )?;
            log.log(Event::ControllingCertificateSwapped {
                round,
                enterprise_id: successor_id.to_string(),
                party_id: owner.clone(),
                previous_holder,
            });
        }
    }

    state
        .require_enterprise_mut(successor_id)?
        .set_controlling_owner(Some(owner.clone()));
    log.log(Event::ControlAssigned {
        round,
        enterprise_id: successor_id.to_string(),
        party_id: owner.clone(),
    });

    Ok(Some(owner))
}
