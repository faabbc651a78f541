//! Ownership ledger
//!
//! All certificate movement goes through [`transfer`]. A transfer is atomic:
//! it either moves every certificate in the bundle or, when validation or
//! the control guard rejects it, moves nothing at all.
//!
//! # Control guard
//!
//! Control of an enterprise belongs to the party holding strictly more of
//! it than every other party; ties mean no party is on top. With the guard
//! engaged a transfer that would hand the top spot from one party to
//! another is rejected before any mutation. Transfers into or out of a tie
//! are allowed either way, because no party loses the top spot to another.
//! With the guard released, the recorded controlling owner follows the new
//! unique top party and the change is reported to the caller for logging.

use std::collections::HashMap;

use crate::models::certificate::{CertificateBundle, Holder};
use crate::models::state::{unique_top, GameState, InvariantViolation};

/// A recorded change of controlling owner caused by a transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlChange {
    pub enterprise_id: String,
    pub previous: Option<String>,
    pub new: String,
}

/// What a transfer did, beyond moving the certificates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransferOutcome {
    /// Controlling-owner updates, only ever non-empty when the guard was
    /// released.
    pub control_changes: Vec<ControlChange>,
}

/// Move every certificate in `bundle` to `to`.
///
/// Validates the bundle and destination first, then checks the control
/// guard against a projection of the post-transfer holdings, and only then
/// mutates. `allow_controlling_owner_change` releases the guard and lets
/// the recorded controlling owner track the outcome instead.
pub fn transfer(
    state: &mut GameState,
    bundle: &CertificateBundle,
    to: &Holder,
    allow_controlling_owner_change: bool,
) -> Result<TransferOutcome, InvariantViolation> {
    match to {
        Holder::Party(id) => {
            state.require_party(id)?;
        }
        Holder::Enterprise(id) => {
            state.require_enterprise(id)?;
        }
        Holder::Market => {}
    }

    let mut touched: Vec<String> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for cert_id in bundle.ids() {
        if seen.contains(&cert_id.as_str()) {
            return Err(InvariantViolation::DuplicateCertificate(cert_id.clone()));
        }
        seen.push(cert_id);
        let cert = state.require_certificate(cert_id)?;
        if !touched.contains(&cert.enterprise_id().to_string()) {
            touched.push(cert.enterprise_id().to_string());
        }
    }

    if !allow_controlling_owner_change {
        for enterprise_id in &touched {
            let before = state.unique_top_party(enterprise_id);
            let after = projected_top(state, enterprise_id, bundle, to)?;
            if let (Some(from), Some(into)) = (&before, &after) {
                if from != into {
                    return Err(InvariantViolation::ControlGuard {
                        enterprise_id: enterprise_id.clone(),
                        from: from.clone(),
                        to: into.clone(),
                    });
                }
            }
        }
    }

    for cert_id in bundle.ids() {
        state.require_certificate_mut(cert_id)?.set_holder(to.clone());
    }

    let mut outcome = TransferOutcome::default();
    if allow_controlling_owner_change {
        for enterprise_id in &touched {
            if let Some(new_top) = state.unique_top_party(enterprise_id) {
                let enterprise = state.require_enterprise(enterprise_id)?;
                if enterprise.controlling_owner() != Some(new_top.as_str()) {
                    let previous = enterprise.controlling_owner().map(str::to_string);
                    state
                        .require_enterprise_mut(enterprise_id)?
                        .set_controlling_owner(Some(new_top.clone()));
                    outcome.control_changes.push(ControlChange {
                        enterprise_id: enterprise_id.clone(),
                        previous,
                        new: new_top,
                    });
                }
            }
        }
    }

    Ok(outcome)
}

/// The unique top party of `enterprise_id` as it would stand after the
/// transfer, computed without mutating anything.
fn projected_top(
    state: &GameState,
    enterprise_id: &str,
    bundle: &CertificateBundle,
    to: &Holder,
) -> Result<Option<String>, InvariantViolation> {
    let mut deltas: HashMap<&str, i64> = HashMap::new();
    for cert_id in bundle.ids() {
        let cert = state.require_certificate(cert_id)?;
        if cert.enterprise_id() != enterprise_id {
            continue;
        }
        if let Holder::Party(loser) = cert.holder() {
            *deltas.entry(loser.as_str()).or_insert(0) -= i64::from(cert.percent());
        }
        if let Holder::Party(gainer) = to {
            *deltas.entry(gainer.as_str()).or_insert(0) += i64::from(cert.percent());
        }
    }

    let projected: Vec<(String, u32)> = state
        .party_aggregates(enterprise_id)
        .into_iter()
        .map(|(party, pct)| {
            let adjusted = i64::from(pct) + deltas.get(party.as_str()).copied().unwrap_or(0);
            (party, adjusted.max(0) as u32)
        })
        .collect();

    Ok(unique_top(&projected))
}
