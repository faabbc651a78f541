//! Asset migration
//!
//! When an enterprise folds into the consolidation successor its physical
//! assets move here: station tokens are replaced by freshly minted
//! successor tokens, and equipment changes roster wholesale. The functions
//! return what happened; the caller records the events.

use crate::models::enterprise::Token;
use crate::models::state::{GameState, InvariantViolation};

/// Result of migrating one predecessor's tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenMigration {
    /// Binding of each fresh successor token, in charter order. `None` for
    /// spares, including replacements parked by a conflict.
    pub locations: Vec<Option<String>>,
    /// Locations where the predecessor's token was discarded because the
    /// successor was already present.
    pub conflicts: Vec<String>,
}

/// Replace every token of `from_id` with a fresh successor token.
///
/// A fresh token is minted per predecessor token regardless of binding. A
/// bound token carries its binding over unless the successor already has a
/// token at that location; then the predecessor token is discarded and the
/// fresh token stays spare on the charter. Bindings made here bypass
/// placement legality on purpose.
pub fn migrate_tokens(
    state: &mut GameState,
    from_id: &str,
    to_id: &str,
    token_price: i64,
) -> Result<TokenMigration, InvariantViolation> {
    let predecessor_tokens = state.require_enterprise_mut(from_id)?.take_tokens();

    let successor = state.require_enterprise_mut(to_id)?;
    let mut outcome = TokenMigration {
        locations: Vec::new(),
        conflicts: Vec::new(),
    };
    for token in predecessor_tokens {
        let mut fresh = Token::spare(token_price);
        if let Some(location) = token.location() {
            if successor.has_token_at(location) {
                outcome.conflicts.push(location.to_string());
            } else {
                fresh.bind(location);
            }
        }
        outcome.locations.push(fresh.location().map(str::to_string));
        successor.add_token(fresh);
    }

    Ok(outcome)
}

/// Move the whole equipment roster of `from_id` to `to_id`, preserving
/// order. Returns the migrated tiers.
pub fn migrate_equipment(
    state: &mut GameState,
    from_id: &str,
    to_id: &str,
) -> Result<Vec<String>, InvariantViolation> {
    let trains = state.require_enterprise_mut(from_id)?.take_trains();
    let tiers: Vec<String> = trains.iter().map(|t| t.tier().to_string()).collect();

    let successor = state.require_enterprise_mut(to_id)?;
    for train in trains {
        successor.add_train(train);
    }
    Ok(tiers)
}
