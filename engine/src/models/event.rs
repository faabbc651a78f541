//! Event system
//!
//! Every externally visible thing the engine does is recorded as an event:
//! round transitions, phase changes, each step of a consolidation, debt,
//! control changes, and game end. Events are append-only and stamped with
//! the ordinal of the round they happened in (0 is setup), so a log read
//! top to bottom replays the game.
//!
//! Events are not part of a checkpoint; restoring a snapshot starts a
//! fresh log.

use crate::config::CurrencyFormat;
use crate::models::certificate::Holder;
use crate::scheduler::RoundKind;

/// A single recorded occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A new round was entered.
    RoundStarted {
        round: usize,
        kind: RoundKind,
        turn: usize,
    },

    /// The turn counter advanced (a full operating cycle completed).
    TurnAdvanced { round: usize, turn: usize },

    /// The game moved to a new phase.
    PhaseChanged { round: usize, phase: String },

    /// The consolidation trigger was armed during an operating round.
    ConsolidationArmed { round: usize },

    /// An enterprise opened, with a par valuation if one was placed.
    EnterpriseOpened {
        round: usize,
        enterprise_id: String,
        par_price: Option<i64>,
    },

    /// The consolidation successor came into existence.
    SuccessorOpened {
        round: usize,
        enterprise_id: String,
        price: i64,
        cash: i64,
        equipment_tier: String,
    },

    /// A predecessor began folding into the successor.
    PredecessorMerging {
        round: usize,
        enterprise_id: String,
        successor_id: String,
    },

    /// Treasury cash moved from a predecessor to the successor. Logged even
    /// when the amount is zero.
    CashAbsorbed {
        round: usize,
        enterprise_id: String,
        successor_id: String,
        amount: i64,
    },

    /// Tokens migrated from a predecessor; `locations` lists each migrated
    /// token's binding (`None` for spares), in charter order.
    TokensMigrated {
        round: usize,
        enterprise_id: String,
        successor_id: String,
        locations: Vec<Option<String>>,
    },

    /// A migrating token found the successor already present at its
    /// location and was discarded; the replacement stays spare.
    TokenConflict {
        round: usize,
        successor_id: String,
        location: String,
    },

    /// Equipment moved from a predecessor to the successor.
    EquipmentMigrated {
        round: usize,
        enterprise_id: String,
        successor_id: String,
        tiers: Vec<String>,
    },

    /// A holder exchanged predecessor certificates for successor ones.
    /// `percent` is the successor percentage delivered; `cash` the
    /// settlement amount (negative when the holder paid).
    CertificatesExchanged {
        round: usize,
        holder: Holder,
        predecessor_id: String,
        percent: u8,
        cash: i64,
    },

    /// A party took on debt to complete a settlement.
    DebtAccrued {
        round: usize,
        party_id: String,
        amount: i64,
        balance: i64,
    },

    /// A predecessor finished folding and closed.
    PredecessorClosed { round: usize, enterprise_id: String },

    /// The controlling owner was granted a 10% certificate in exchange for
    /// two 5% ones, so their holding includes a qualifying denomination.
    QualifyingCertificateGranted {
        round: usize,
        enterprise_id: String,
        party_id: String,
        donor: Holder,
    },

    /// The controlling certificate was swapped into the controlling
    /// owner's hands against an ordinary 10% certificate.
    ControllingCertificateSwapped {
        round: usize,
        enterprise_id: String,
        party_id: String,
        previous_holder: Holder,
    },

    /// A controlling owner was determined at the end of a consolidation.
    ControlAssigned {
        round: usize,
        enterprise_id: String,
        party_id: String,
    },

    /// A certificate transfer changed the recorded controlling owner.
    ControlChanged {
        round: usize,
        enterprise_id: String,
        previous: Option<String>,
        party_id: String,
    },

    /// A certificate bundle changed hands outside consolidation.
    CertificatesTransferred {
        round: usize,
        to: Holder,
        count: usize,
    },

    /// The game reached its end.
    GameFinished { round: usize, reason: String },
}

impl Event {
    /// Ordinal of the round the event belongs to (0 = setup).
    pub fn round(&self) -> usize {
        match self {
            Event::RoundStarted { round, .. }
            | Event::TurnAdvanced { round, .. }
            | Event::PhaseChanged { round, .. }
            | Event::ConsolidationArmed { round }
            | Event::EnterpriseOpened { round, .. }
            | Event::SuccessorOpened { round, .. }
            | Event::PredecessorMerging { round, .. }
            | Event::CashAbsorbed { round, .. }
            | Event::TokensMigrated { round, .. }
            | Event::TokenConflict { round, .. }
            | Event::EquipmentMigrated { round, .. }
            | Event::CertificatesExchanged { round, .. }
            | Event::DebtAccrued { round, .. }
            | Event::PredecessorClosed { round, .. }
            | Event::QualifyingCertificateGranted { round, .. }
            | Event::ControllingCertificateSwapped { round, .. }
            | Event::ControlAssigned { round, .. }
            | Event::ControlChanged { round, .. }
            | Event::CertificatesTransferred { round, .. }
            | Event::GameFinished { round, .. } => *round,
        }
    }

    /// Short type tag, for filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::RoundStarted { .. } => "round_started",
            Event::TurnAdvanced { .. } => "turn_advanced",
            Event::PhaseChanged { .. } => "phase_changed",
            Event::ConsolidationArmed { .. } => "consolidation_armed",
            Event::EnterpriseOpened { .. } => "enterprise_opened",
            Event::SuccessorOpened { .. } => "successor_opened",
            Event::PredecessorMerging { .. } => "predecessor_merging",
            Event::CashAbsorbed { .. } => "cash_absorbed",
            Event::TokensMigrated { .. } => "tokens_migrated",
            Event::TokenConflict { .. } => "token_conflict",
            Event::EquipmentMigrated { .. } => "equipment_migrated",
            Event::CertificatesExchanged { .. } => "certificates_exchanged",
            Event::DebtAccrued { .. } => "debt_accrued",
            Event::PredecessorClosed { .. } => "predecessor_closed",
            Event::QualifyingCertificateGranted { .. } => "qualifying_certificate_granted",
            Event::ControllingCertificateSwapped { .. } => "controlling_certificate_swapped",
            Event::ControlAssigned { .. } => "control_assigned",
            Event::ControlChanged { .. } => "control_changed",
            Event::CertificatesTransferred { .. } => "certificates_transferred",
            Event::GameFinished { .. } => "game_finished",
        }
    }

    /// Human-readable one-line rendering, with amounts formatted in the
    /// game's currency.
    pub fn describe(&self, currency: &CurrencyFormat) -> String {
        match self {
            Event::RoundStarted { kind, turn, .. } => {
                format!("-- Turn {}, {} --", turn, kind)
            }
            Event::TurnAdvanced { turn, .. } => format!("Turn advances to {}", turn),
            Event::PhaseChanged { phase, .. } => format!("-- Phase {} --", phase),
            Event::ConsolidationArmed { .. } => {
                "-- Event: consolidation is ready and will form at the end of this operating round --"
                    .to_string()
            }
            Event::EnterpriseOpened {
                enterprise_id,
                par_price,
                ..
            } => match par_price {
                Some(price) => format!(
                    "{} opens with a par valuation of {}",
                    enterprise_id,
                    currency.render(*price)
                ),
                None => format!("{} opens", enterprise_id),
            },
            Event::SuccessorOpened {
                enterprise_id,
                price,
                cash,
                equipment_tier,
                ..
            } => format!(
                "{} forms at {} with {} and a {} train",
                enterprise_id,
                currency.render(*price),
                currency.render(*cash),
                equipment_tier
            ),
            Event::PredecessorMerging {
                enterprise_id,
                successor_id,
                ..
            } => format!("{} merges into {}", enterprise_id, successor_id),
            Event::CashAbsorbed {
                successor_id,
                amount,
                ..
            } => format!("{} receives {}", successor_id, currency.render(*amount)),
            Event::TokensMigrated {
                successor_id,
                locations,
                ..
            } => {
                let rendered: Vec<&str> = locations
                    .iter()
                    .map(|l| l.as_deref().unwrap_or("charter"))
                    .collect();
                format!(
                    "{} receives {} token{}: {}",
                    successor_id,
                    locations.len(),
                    if locations.len() == 1 { "" } else { "s" },
                    rendered.join(", ")
                )
            }
            Event::TokenConflict {
                successor_id,
                location,
                ..
            } => format!(
                "{} already has a token at {}, keeping the replacement on the charter",
                successor_id, location
            ),
            Event::EquipmentMigrated {
                successor_id,
                tiers,
                ..
            } => format!(
                "{} receives {} train{}: {}",
                successor_id,
                tiers.len(),
                if tiers.len() == 1 { "" } else { "s" },
                tiers.join(", ")
            ),
            Event::CertificatesExchanged {
                holder,
                predecessor_id,
                percent,
                cash,
                ..
            } => {
                if *cash > 0 {
                    format!(
                        "{} receives {} and {}% for {}",
                        holder,
                        currency.render(*cash),
                        percent,
                        predecessor_id
                    )
                } else if *cash < 0 {
                    format!(
                        "{} pays {} and receives {}% for {}",
                        holder,
                        currency.render(-cash),
                        percent,
                        predecessor_id
                    )
                } else {
                    format!("{} receives {}% for {}", holder, percent, predecessor_id)
                }
            }
            Event::DebtAccrued {
                party_id,
                amount,
                balance,
                ..
            } => format!(
                "{} takes {} of debt to complete payment (balance {})",
                party_id,
                currency.render(*amount),
                currency.render(*balance)
            ),
            Event::PredecessorClosed { enterprise_id, .. } => {
                format!("{} closes", enterprise_id)
            }
            Event::QualifyingCertificateGranted {
                party_id, donor, ..
            } => format!(
                "{} trades two 5% certificates with {} for a 10% certificate",
                party_id, donor
            ),
            Event::ControllingCertificateSwapped {
                party_id,
                previous_holder,
                ..
            } => format!(
                "{} takes the controlling certificate from {}",
                party_id, previous_holder
            ),
            Event::ControlAssigned {
                enterprise_id,
                party_id,
                ..
            } => format!("{} becomes the controlling owner of {}", party_id, enterprise_id),
            Event::ControlChanged {
                enterprise_id,
                party_id,
                ..
            } => format!("{} takes control of {}", party_id, enterprise_id),
            Event::CertificatesTransferred { to, count, .. } => format!(
                "{} certificate{} transferred to {}",
                count,
                if *count == 1 { "" } else { "s" },
                to
            ),
            Event::GameFinished { reason, .. } => format!("-- Game over: {} --", reason),
        }
    }
}

/// Append-only log of everything that happened in a game.
///
/// # Example
/// ```
/// use magnate_core::models::event::{Event, EventLog};
///
/// let mut log = EventLog::new();
/// log.log(Event::ConsolidationArmed { round: 4 });
///
/// assert_eq!(log.len(), 1);
/// assert_eq!(log.events_of_type("consolidation_armed").len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Append an event.
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events, oldest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events stamped with round ordinal `round`.
    pub fn events_in_round(&self, round: usize) -> Vec<&Event> {
        self.events.iter().filter(|e| e.round() == round).collect()
    }

    /// Events of one type tag.
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Render the whole log as one line per event.
    pub fn render(&self, currency: &CurrencyFormat) -> Vec<String> {
        self.events.iter().map(|e| e.describe(currency)).collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
