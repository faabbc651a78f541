//! Enterprise lifecycle
//!
//! Opening an enterprise is the single moment its certificates come into
//! existence: the full scheme is minted into the enterprise's own treasury,
//! and no certificate is ever created or destroyed afterwards. Closing an
//! enterprise reclaims its certificates into its treasury and retires it
//! from play without deleting the record.

use crate::config::CertificateSpec;
use crate::market::CellId;
use crate::models::certificate::{Certificate, Holder};
use crate::models::enterprise::{Enterprise, EnterpriseClass};
use crate::models::state::{GameState, InvariantViolation};

/// Create and open an enterprise, optionally placing a par valuation.
///
/// With a par price, the valuation lands on the first par-tagged grid cell
/// carrying that exact price. Certificates are minted into the enterprise's
/// treasury in scheme order.
pub fn open_enterprise(
    state: &mut GameState,
    id: &str,
    name: &str,
    class: EnterpriseClass,
    scheme: &[CertificateSpec],
    par_price: Option<i64>,
) -> Result<(), InvariantViolation> {
    let cell = match par_price {
        Some(price) => Some(
            state
                .grid()
                .par_cell_for(price)
                .ok_or(InvariantViolation::MissingParCell(price))?,
        ),
        None => None,
    };

    let mut enterprise = Enterprise::new(id, name, class);
    if let Some(cell) = cell {
        enterprise.set_par_cell(cell);
        enterprise.set_cell(cell);
    }
    enterprise.mark_opened();
    state.add_enterprise(enterprise)?;
    mint_certificates(state, id, scheme)
}

/// Create and open an enterprise directly on a known grid cell. Used by the
/// consolidation to place the successor on the reserved cell.
pub fn open_enterprise_at_cell(
    state: &mut GameState,
    id: &str,
    name: &str,
    class: EnterpriseClass,
    scheme: &[CertificateSpec],
    cell: CellId,
) -> Result<(), InvariantViolation> {
    let mut enterprise = Enterprise::new(id, name, class);
    enterprise.set_par_cell(cell);
    enterprise.set_cell(cell);
    enterprise.mark_opened();
    state.add_enterprise(enterprise)?;
    mint_certificates(state, id, scheme)
}

/// Quietly retire an enterprise: reclaim every one of its certificates into
/// its treasury and mark it closed. The record stays in the state.
pub fn close_enterprise(state: &mut GameState, id: &str) -> Result<(), InvariantViolation> {
    state.require_enterprise(id)?;

    let cert_ids: Vec<String> = state
        .certificates_of(id)
        .iter()
        .map(|c| c.id().to_string())
        .collect();
    for cert_id in cert_ids {
        let holder = Holder::Enterprise(id.to_string());
        state
            .require_certificate_mut(&cert_id)?
            .set_holder(holder);
    }

    state.require_enterprise_mut(id)?.mark_closed();
    Ok(())
}

fn mint_certificates(
    state: &mut GameState,
    enterprise_id: &str,
    scheme: &[CertificateSpec],
) -> Result<(), InvariantViolation> {
    let mut seq = 0usize;
    for spec in scheme {
        for _ in 0..spec.count {
            seq += 1;
            let cert = Certificate::new(
                &format!("{}_{:02}", enterprise_id, seq),
                enterprise_id,
                spec.percent,
                spec.controlling,
                spec.double,
                Holder::Enterprise(enterprise_id.to_string()),
            );
            state.add_certificate(cert)?;
        }
    }
    Ok(())
}
