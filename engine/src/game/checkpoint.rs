//! Checkpoints
//!
//! A snapshot captures everything needed to resume a game under the same
//! configuration: party finances, enterprise assets, certificate holders,
//! the bank, the phase index, and the complete scheduler including a
//! stored resumption. The configuration itself is not embedded; a SHA-256
//! hash of its canonical JSON form ties the snapshot to it, and restoring
//! under a different configuration is rejected.
//!
//! Restoration is defensive: the snapshot's internal consistency is
//! validated before a state is built from it, and the rebuilt state must
//! pass the full invariant check.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::GameConfig;
use crate::game::engine::GameError;
use crate::market::{CellId, ValuationGrid};
use crate::models::certificate::{Certificate, Holder};
use crate::models::enterprise::{Enterprise, EnterpriseClass, Token, Train};
use crate::models::party::Party;
use crate::models::state::{GameState, InvariantViolation};
use crate::scheduler::{RoundKind, RoundScheduler};

/// Persistent image of one party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartySnapshot {
    pub id: String,
    pub name: String,
    pub cash: i64,
    pub debt: i64,
}

impl From<&Party> for PartySnapshot {
    fn from(party: &Party) -> Self {
        Self {
            id: party.id().to_string(),
            name: party.name().to_string(),
            cash: party.cash(),
            debt: party.debt(),
        }
    }
}

/// Persistent image of one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub location: Option<String>,
    pub price: i64,
}

impl From<&Token> for TokenSnapshot {
    fn from(token: &Token) -> Self {
        Self {
            location: token.location().map(str::to_string),
            price: token.price(),
        }
    }
}

/// Persistent image of one enterprise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnterpriseSnapshot {
    pub id: String,
    pub name: String,
    pub class: EnterpriseClass,
    pub cell: Option<CellId>,
    pub par_cell: Option<CellId>,
    pub opened: bool,
    pub floated: bool,
    pub closed: bool,
    pub cash: i64,
    pub tokens: Vec<TokenSnapshot>,
    /// Equipment tiers, in roster order.
    pub trains: Vec<String>,
    pub controlling_owner: Option<String>,
}

impl From<&Enterprise> for EnterpriseSnapshot {
    fn from(enterprise: &Enterprise) -> Self {
        Self {
            id: enterprise.id().to_string(),
            name: enterprise.name().to_string(),
            class: enterprise.class(),
            cell: enterprise.cell(),
            par_cell: enterprise.par_cell(),
            opened: enterprise.opened(),
            floated: enterprise.floated(),
            closed: enterprise.closed(),
            cash: enterprise.cash(),
            tokens: enterprise.tokens().iter().map(TokenSnapshot::from).collect(),
            trains: enterprise
                .trains()
                .iter()
                .map(|t| t.tier().to_string())
                .collect(),
            controlling_owner: enterprise.controlling_owner().map(str::to_string),
        }
    }
}

/// Persistent image of one certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateSnapshot {
    pub id: String,
    pub enterprise_id: String,
    pub percent: u8,
    pub controlling: bool,
    pub double: bool,
    pub holder: Holder,
}

impl From<&Certificate> for CertificateSnapshot {
    fn from(cert: &Certificate) -> Self {
        Self {
            id: cert.id().to_string(),
            enterprise_id: cert.enterprise_id().to_string(),
            percent: cert.percent(),
            controlling: cert.controlling(),
            double: cert.double(),
            holder: cert.holder().clone(),
        }
    }
}

/// Complete persistent image of one game. Entity vectors preserve creation
/// order; the event log is deliberately not included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub config_hash: String,
    pub scheduler: RoundScheduler,
    pub phase_index: usize,
    pub bank_cash: i64,
    pub parties: Vec<PartySnapshot>,
    pub enterprises: Vec<EnterpriseSnapshot>,
    pub certificates: Vec<CertificateSnapshot>,
}

/// SHA-256 over the canonical JSON form of the configuration. Canonical
/// means every object's keys sorted, recursively, so the hash does not
/// depend on serialization order.
pub fn compute_config_hash(config: &GameConfig) -> Result<String, GameError> {
    let value =
        serde_json::to_value(config).map_err(|e| GameError::Serialization(e.to_string()))?;
    let canonical = canonicalize(&value);
    let serialized =
        serde_json::to_string(&canonical).map_err(|e| GameError::Serialization(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

/// Capture the current state of a game.
pub fn create_snapshot(
    state: &GameState,
    scheduler: &RoundScheduler,
    config: &GameConfig,
) -> Result<GameSnapshot, GameError> {
    let mut parties = Vec::with_capacity(state.party_order().len());
    for id in state.party_order() {
        parties.push(PartySnapshot::from(state.require_party(id)?));
    }
    let mut enterprises = Vec::with_capacity(state.enterprise_order().len());
    for id in state.enterprise_order() {
        enterprises.push(EnterpriseSnapshot::from(state.require_enterprise(id)?));
    }
    let mut certificates = Vec::with_capacity(state.certificate_order().len());
    for id in state.certificate_order() {
        certificates.push(CertificateSnapshot::from(state.require_certificate(id)?));
    }

    Ok(GameSnapshot {
        config_hash: compute_config_hash(config)?,
        scheduler: scheduler.clone(),
        phase_index: state.phase_index(),
        bank_cash: state.bank().cash(),
        parties,
        enterprises,
        certificates,
    })
}

/// Check a snapshot's internal consistency against its configuration.
/// The config hash is checked separately by [`restore`].
pub fn validate_snapshot(
    snapshot: &GameSnapshot,
    config: &GameConfig,
) -> Result<(), InvariantViolation> {
    let fail = |msg: String| Err(InvariantViolation::SnapshotIntegrity(msg));

    // Scheduler consistency: a stored resumption belongs to a
    // consolidation round and to nothing else.
    let scheduler = &snapshot.scheduler;
    let in_consolidation = *scheduler.round() == RoundKind::Consolidation;
    if in_consolidation && scheduler.resumption().is_none() {
        return fail("consolidation round without a stored resumption".to_string());
    }
    if !in_consolidation && scheduler.resumption().is_some() {
        return fail("stored resumption outside a consolidation round".to_string());
    }
    if scheduler.consolidation_pending()
        && !matches!(
            scheduler.round(),
            RoundKind::Operating { .. } | RoundKind::Consolidation
        )
    {
        return fail("consolidation trigger armed outside an operating round".to_string());
    }
    if scheduler.turn() == 0 {
        return fail("turn counter at zero".to_string());
    }

    if snapshot.phase_index >= config.phases.len() {
        return fail(format!("phase index {} out of range", snapshot.phase_index));
    }

    // Identity: parties must match the configured seats exactly.
    let mut party_ids: Vec<&str> = Vec::new();
    for party in &snapshot.parties {
        if party_ids.contains(&party.id.as_str()) {
            return fail(format!("duplicate party {}", party.id));
        }
        party_ids.push(&party.id);
        if !config.parties.iter().any(|p| p.id == party.id) {
            return fail(format!("party {} is not configured", party.id));
        }
        if party.debt < 0 {
            return Err(InvariantViolation::NegativeDebt {
                party_id: party.id.clone(),
                debt: party.debt,
            });
        }
    }
    if party_ids.len() != config.parties.len() {
        return fail("party roster does not match the configuration".to_string());
    }

    // Enterprises: every configured one, plus at most the successor.
    let successor_id = &config.consolidation.successor.id;
    let mut enterprise_ids: Vec<&str> = Vec::new();
    for enterprise in &snapshot.enterprises {
        if enterprise_ids.contains(&enterprise.id.as_str()) {
            return fail(format!("duplicate enterprise {}", enterprise.id));
        }
        enterprise_ids.push(&enterprise.id);
        let configured = config.enterprises.iter().any(|e| e.id == enterprise.id)
            || &enterprise.id == successor_id;
        if !configured {
            return fail(format!("enterprise {} is not configured", enterprise.id));
        }

        let mut locations: Vec<&str> = Vec::new();
        for token in &enterprise.tokens {
            if let Some(location) = &token.location {
                if locations.contains(&location.as_str()) {
                    return Err(InvariantViolation::DuplicateBoundToken {
                        enterprise_id: enterprise.id.clone(),
                        location: location.clone(),
                    });
                }
                locations.push(location);
            }
        }
    }
    for configured in &config.enterprises {
        if !enterprise_ids.contains(&configured.id.as_str()) {
            return fail(format!("enterprise {} missing from snapshot", configured.id));
        }
    }

    // Certificates: unique, referencing known enterprises and holders,
    // summing to 100% per enterprise.
    let mut cert_ids: Vec<&str> = Vec::new();
    let mut sums: BTreeMap<&str, u32> = BTreeMap::new();
    for cert in &snapshot.certificates {
        if cert_ids.contains(&cert.id.as_str()) {
            return fail(format!("duplicate certificate {}", cert.id));
        }
        cert_ids.push(&cert.id);
        if !enterprise_ids.contains(&cert.enterprise_id.as_str()) {
            return fail(format!(
                "certificate {} references unknown enterprise {}",
                cert.id, cert.enterprise_id
            ));
        }
        match &cert.holder {
            Holder::Party(id) if !party_ids.contains(&id.as_str()) => {
                return fail(format!("certificate {} held by unknown party {}", cert.id, id));
            }
            Holder::Enterprise(id) if !enterprise_ids.contains(&id.as_str()) => {
                return fail(format!(
                    "certificate {} held by unknown enterprise {}",
                    cert.id, id
                ));
            }
            _ => {}
        }
        *sums.entry(cert.enterprise_id.as_str()).or_insert(0) += u32::from(cert.percent);
    }
    for id in &enterprise_ids {
        let total = sums.get(id).copied().unwrap_or(0);
        if total != 100 {
            return Err(InvariantViolation::PercentSum {
                enterprise_id: id.to_string(),
                total,
            });
        }
    }

    Ok(())
}

/// Rebuild state and scheduler from a snapshot. Verifies the config hash,
/// validates the snapshot, and runs the full invariant check on the
/// rebuilt state.
pub fn restore(
    config: &GameConfig,
    snapshot: &GameSnapshot,
) -> Result<(GameState, RoundScheduler), GameError> {
    let expected = compute_config_hash(config)?;
    if expected != snapshot.config_hash {
        return Err(InvariantViolation::SnapshotIntegrity(
            "snapshot was taken under a different configuration".to_string(),
        )
        .into());
    }
    validate_snapshot(snapshot, config)?;

    let grid = ValuationGrid::from_spec(&config.grid_rows, config.sell_movement.clone())
        .map_err(GameError::InvalidConfig)?;
    let parties: Vec<Party> = snapshot
        .parties
        .iter()
        .map(|p| Party::from_snapshot(&p.id, &p.name, p.cash, p.debt))
        .collect();
    let mut state = GameState::new(parties, grid, snapshot.bank_cash);
    state.set_phase_index(snapshot.phase_index);

    for shot in &snapshot.enterprises {
        let mut enterprise = Enterprise::new(&shot.id, &shot.name, shot.class);
        if let Some(cell) = shot.cell {
            enterprise.set_cell(cell);
        }
        if let Some(cell) = shot.par_cell {
            enterprise.set_par_cell(cell);
        }
        if shot.opened {
            enterprise.mark_opened();
        }
        if shot.floated {
            enterprise.mark_floated();
        }
        if shot.closed {
            enterprise.mark_closed();
        }
        enterprise.credit(shot.cash);
        for token in &shot.tokens {
            enterprise.add_token(match &token.location {
                Some(location) => Token::bound(location, token.price),
                None => Token::spare(token.price),
            });
        }
        for tier in &shot.trains {
            enterprise.add_train(Train::new(tier));
        }
        enterprise.set_controlling_owner(shot.controlling_owner.clone());
        state.add_enterprise(enterprise).map_err(GameError::from)?;
    }

    for shot in &snapshot.certificates {
        state
            .add_certificate(Certificate::new(
                &shot.id,
                &shot.enterprise_id,
                shot.percent,
                shot.controlling,
                shot.double,
                shot.holder.clone(),
            ))
            .map_err(GameError::from)?;
    }

    state.check_invariants().map_err(GameError::from)?;
    Ok((state, snapshot.scheduler.clone()))
}
