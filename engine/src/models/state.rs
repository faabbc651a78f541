//! Game state
//!
//! `GameState` is the single container for everything mutable in a game:
//! parties, enterprises, certificates, the bank, and the valuation grid.
//! Entities live in maps keyed by id, with parallel order vectors so
//! iteration is deterministic regardless of hash order. All mutation goes
//! through the operation modules (ledger, registry, migration, merger);
//! this module only provides storage, accessors, and the invariant check.
//!
//! # Critical Invariants
//!
//! - Certificate percentages of every enterprise sum to exactly 100.
//! - Certificates are never destroyed; a closed enterprise's certificates
//!   sit in its own treasury.
//! - An enterprise never has two bound tokens at the same location.
//! - Party debt never goes negative.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::market::ValuationGrid;
use crate::models::certificate::{Certificate, Holder};
use crate::models::enterprise::Enterprise;
use crate::models::party::Party;

/// A violation of a structural invariant. These are fatal: game state that
/// produces one is corrupt and must not be advanced further.
#[derive(Debug, Error, PartialEq)]
pub enum InvariantViolation {
    #[error("certificate percentages of {enterprise_id} sum to {total}, expected 100")]
    PercentSum { enterprise_id: String, total: u32 },

    #[error("unknown party: {0}")]
    UnknownParty(String),

    #[error("unknown enterprise: {0}")]
    UnknownEnterprise(String),

    #[error("unknown certificate: {0}")]
    UnknownCertificate(String),

    #[error("duplicate enterprise id: {0}")]
    DuplicateEnterprise(String),

    #[error("duplicate certificate id: {0}")]
    DuplicateCertificate(String),

    #[error("transfer would move control of {enterprise_id} from {from} to {to}")]
    ControlGuard {
        enterprise_id: String,
        from: String,
        to: String,
    },

    #[error("{holder} cannot carry debt ({amount} owed)")]
    NonPartyDebt { holder: String, amount: i64 },

    #[error("no unissued {percent}% certificate of {enterprise_id} remains")]
    PoolExhausted { enterprise_id: String, percent: u8 },

    #[error("no qualifying 10% certificate of {enterprise_id} available for {party_id}")]
    QualifyingCertUnavailable {
        enterprise_id: String,
        party_id: String,
    },

    #[error("{party_id} holds no ordinary 10% certificate of {enterprise_id} for the control swap")]
    SwapCertUnavailable {
        enterprise_id: String,
        party_id: String,
    },

    #[error("{enterprise_id} holds two bound tokens at {location}")]
    DuplicateBoundToken {
        enterprise_id: String,
        location: String,
    },

    #[error("no par cell priced {0} in the valuation grid")]
    MissingParCell(i64),

    #[error("the valuation grid has no reserved consolidation cell")]
    MissingConsolidationCell,

    #[error("consolidation round entered with no stored resumption")]
    MissingResumption,

    #[error("a pending resumption is already stored")]
    ResumptionAlreadyStored,

    #[error("party debt of {party_id} is negative ({debt})")]
    NegativeDebt { party_id: String, debt: i64 },

    #[error("snapshot integrity: {0}")]
    SnapshotIntegrity(String),
}

/// The bank. Pays settlements and absorbs payments; the game ends once its
/// cash is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    cash: i64,
}

impl Bank {
    pub fn new(cash: i64) -> Self {
        Self { cash }
    }

    pub fn cash(&self) -> i64 {
        self.cash
    }

    /// Pay out `amount`. The bank may overdraw; depletion is observed at
    /// the round boundary.
    pub fn pay(&mut self, amount: i64) {
        self.cash -= amount;
    }

    pub fn receive(&mut self, amount: i64) {
        self.cash += amount;
    }

    /// Whether the bank has run dry.
    pub fn is_depleted(&self) -> bool {
        self.cash <= 0
    }
}

/// Complete mutable state of one game.
///
/// # Example
/// ```
/// use magnate_core::market::{SellMovement, ValuationGrid};
/// use magnate_core::models::party::Party;
/// use magnate_core::models::state::GameState;
///
/// let grid = ValuationGrid::from_spec(
///     &[vec!["100p".to_string()]],
///     SellMovement::DownBlock,
/// ).unwrap();
/// let state = GameState::new(vec![Party::new("p1", "Alma", 475)], grid, 12_000);
///
/// assert_eq!(state.get_party("p1").unwrap().cash(), 475);
/// assert_eq!(state.bank().cash(), 12_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    parties: HashMap<String, Party>,
    party_order: Vec<String>,
    enterprises: HashMap<String, Enterprise>,
    enterprise_order: Vec<String>,
    certificates: HashMap<String, Certificate>,
    /// Global creation order of certificates. Per-enterprise creation order
    /// is this order filtered by enterprise.
    certificate_order: Vec<String>,
    bank: Bank,
    grid: ValuationGrid,
    phase_index: usize,
}

impl GameState {
    pub fn new(parties: Vec<Party>, grid: ValuationGrid, bank_cash: i64) -> Self {
        let party_order: Vec<String> = parties.iter().map(|p| p.id().to_string()).collect();
        let parties = parties
            .into_iter()
            .map(|p| (p.id().to_string(), p))
            .collect();
        Self {
            parties,
            party_order,
            enterprises: HashMap::new(),
            enterprise_order: Vec::new(),
            certificates: HashMap::new(),
            certificate_order: Vec::new(),
            bank: Bank::new(bank_cash),
            grid,
            phase_index: 0,
        }
    }

    // ========================================================================
    // PARTIES
    // ========================================================================

    pub fn get_party(&self, id: &str) -> Option<&Party> {
        self.parties.get(id)
    }

    pub fn get_party_mut(&mut self, id: &str) -> Option<&mut Party> {
        self.parties.get_mut(id)
    }

    /// Like `get_party`, but an absent id is an invariant violation.
    pub fn require_party(&self, id: &str) -> Result<&Party, InvariantViolation> {
        self.parties
            .get(id)
            .ok_or_else(|| InvariantViolation::UnknownParty(id.to_string()))
    }

    pub fn require_party_mut(&mut self, id: &str) -> Result<&mut Party, InvariantViolation> {
        self.parties
            .get_mut(id)
            .ok_or_else(|| InvariantViolation::UnknownParty(id.to_string()))
    }

    /// Party ids in seating order.
    pub fn party_order(&self) -> &[String] {
        &self.party_order
    }

    pub fn num_parties(&self) -> usize {
        self.party_order.len()
    }

    // ========================================================================
    // ENTERPRISES
    // ========================================================================

    pub fn add_enterprise(&mut self, enterprise: Enterprise) -> Result<(), InvariantViolation> {
        let id = enterprise.id().to_string();
        if self.enterprises.contains_key(&id) {
            return Err(InvariantViolation::DuplicateEnterprise(id));
        }
        self.enterprise_order.push(id.clone());
        self.enterprises.insert(id, enterprise);
        Ok(())
    }

    pub fn get_enterprise(&self, id: &str) -> Option<&Enterprise> {
        self.enterprises.get(id)
    }

    pub fn get_enterprise_mut(&mut self, id: &str) -> Option<&mut Enterprise> {
        self.enterprises.get_mut(id)
    }

    pub fn require_enterprise(&self, id: &str) -> Result<&Enterprise, InvariantViolation> {
        self.enterprises
            .get(id)
            .ok_or_else(|| InvariantViolation::UnknownEnterprise(id.to_string()))
    }

    pub fn require_enterprise_mut(
        &mut self,
        id: &str,
    ) -> Result<&mut Enterprise, InvariantViolation> {
        self.enterprises
            .get_mut(id)
            .ok_or_else(|| InvariantViolation::UnknownEnterprise(id.to_string()))
    }

    /// Enterprise ids in creation order.
    pub fn enterprise_order(&self) -> &[String] {
        &self.enterprise_order
    }

    pub fn has_enterprise(&self, id: &str) -> bool {
        self.enterprises.contains_key(id)
    }

    // ========================================================================
    // CERTIFICATES
    // ========================================================================

    pub fn add_certificate(&mut self, certificate: Certificate) -> Result<(), InvariantViolation> {
        let id = certificate.id().to_string();
        if self.certificates.contains_key(&id) {
            return Err(InvariantViolation::DuplicateCertificate(id));
        }
        self.certificate_order.push(id.clone());
        self.certificates.insert(id, certificate);
        Ok(())
    }

    pub fn get_certificate(&self, id: &str) -> Option<&Certificate> {
        self.certificates.get(id)
    }

    pub fn get_certificate_mut(&mut self, id: &str) -> Option<&mut Certificate> {
        self.certificates.get_mut(id)
    }

    pub fn require_certificate(&self, id: &str) -> Result<&Certificate, InvariantViolation> {
        self.certificates
            .get(id)
            .ok_or_else(|| InvariantViolation::UnknownCertificate(id.to_string()))
    }

    pub fn require_certificate_mut(
        &mut self,
        id: &str,
    ) -> Result<&mut Certificate, InvariantViolation> {
        self.certificates
            .get_mut(id)
            .ok_or_else(|| InvariantViolation::UnknownCertificate(id.to_string()))
    }

    /// Certificate ids in global creation order.
    pub fn certificate_order(&self) -> &[String] {
        &self.certificate_order
    }

    /// Certificates of one enterprise, in creation order.
    pub fn certificates_of(&self, enterprise_id: &str) -> Vec<&Certificate> {
        self.certificate_order
            .iter()
            .filter_map(|id| self.certificates.get(id))
            .filter(|c| c.enterprise_id() == enterprise_id)
            .collect()
    }

    /// Certificates currently held by `holder`, in creation order.
    pub fn certificates_held_by(&self, holder: &Holder) -> Vec<&Certificate> {
        self.certificate_order
            .iter()
            .filter_map(|id| self.certificates.get(id))
            .filter(|c| c.holder() == holder)
            .collect()
    }

    /// Sum of percentages of `enterprise_id` certificates held by `holder`.
    pub fn aggregate_percent(&self, enterprise_id: &str, holder: &Holder) -> u32 {
        self.certificates_of(enterprise_id)
            .iter()
            .filter(|c| c.holder() == holder)
            .map(|c| u32::from(c.percent()))
            .sum()
    }

    /// Per-party aggregate holdings of one enterprise, in seating order.
    /// Non-party holders are excluded; control is a property of parties.
    pub fn party_aggregates(&self, enterprise_id: &str) -> Vec<(String, u32)> {
        self.party_order
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    self.aggregate_percent(enterprise_id, &Holder::Party(id.clone())),
                )
            })
            .collect()
    }

    /// The party holding strictly more of `enterprise_id` than every other
    /// party, if one exists. Ties and all-zero holdings yield `None`.
    pub fn unique_top_party(&self, enterprise_id: &str) -> Option<String> {
        unique_top(&self.party_aggregates(enterprise_id))
    }

    // ========================================================================
    // BANK, GRID, PHASE
    // ========================================================================

    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut Bank {
        &mut self.bank
    }

    pub fn grid(&self) -> &ValuationGrid {
        &self.grid
    }

    pub fn phase_index(&self) -> usize {
        self.phase_index
    }

    pub fn set_phase_index(&mut self, index: usize) {
        self.phase_index = index;
    }

    /// Total cash across parties, enterprises, and the bank. Constant over
    /// every operation in this engine: debt settlements pay the bank in
    /// full while the payer's balance goes negative.
    pub fn total_cash(&self) -> i64 {
        let parties: i64 = self.parties.values().map(Party::cash).sum();
        let enterprises: i64 = self.enterprises.values().map(Enterprise::cash).sum();
        parties + enterprises + self.bank.cash()
    }

    // ========================================================================
    // INVARIANTS
    // ========================================================================

    /// Check every structural invariant of the state.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for id in &self.enterprise_order {
            let total: u32 = self
                .certificates_of(id)
                .iter()
                .map(|c| u32::from(c.percent()))
                .sum();
            if total != 100 {
                return Err(InvariantViolation::PercentSum {
                    enterprise_id: id.clone(),
                    total,
                });
            }
        }

        for cert in self.certificates.values() {
            if !self.enterprises.contains_key(cert.enterprise_id()) {
                return Err(InvariantViolation::UnknownEnterprise(
                    cert.enterprise_id().to_string(),
                ));
            }
            match cert.holder() {
                Holder::Party(id) if !self.parties.contains_key(id) => {
                    return Err(InvariantViolation::UnknownParty(id.clone()));
                }
                Holder::Enterprise(id) if !self.enterprises.contains_key(id) => {
                    return Err(InvariantViolation::UnknownEnterprise(id.clone()));
                }
                _ => {}
            }
        }

        for party in self.parties.values() {
            if party.debt() < 0 {
                return Err(InvariantViolation::NegativeDebt {
                    party_id: party.id().to_string(),
                    debt: party.debt(),
                });
            }
        }

        for enterprise in self.enterprises.values() {
            let mut seen: Vec<&str> = Vec::new();
            for token in enterprise.tokens() {
                if let Some(location) = token.location() {
                    if seen.contains(&location) {
                        return Err(InvariantViolation::DuplicateBoundToken {
                            enterprise_id: enterprise.id().to_string(),
                            location: location.to_string(),
                        });
                    }
                    seen.push(location);
                }
            }
        }

        Ok(())
    }
}

/// The index-free core of `unique_top_party`, shared with the ledger's
/// pre-transfer projection.
pub(crate) fn unique_top(aggregates: &[(String, u32)]) -> Option<String> {
    let max = aggregates.iter().map(|(_, pct)| *pct).max()?;
    if max == 0 {
        return None;
    }
    let mut at_max = aggregates.iter().filter(|(_, pct)| *pct == max);
    let top = at_max.next()?;
    if at_max.next().is_some() {
        return None;
    }
    Some(top.0.clone())
}
