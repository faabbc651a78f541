//! Enterprise model
//!
//! An enterprise is a chartered company on the valuation grid: it has a
//! class (minor, major, national), an optional par and current valuation
//! cell, a treasury, station tokens, and equipment. Certificates of the
//! enterprise live in the global ledger, not on the enterprise itself.
//!
//! # Lifecycle
//!
//! Enterprises are created through the registry when they open, which is
//! also the one moment their certificates come into existence. A closed
//! enterprise stays in the state as a record (its certificates return to
//! its treasury) but takes no further part in play.

use serde::{Deserialize, Serialize};

use crate::market::CellId;

/// The class of an enterprise, used for phase holding limits and for
/// consolidation eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnterpriseClass {
    Minor,
    Major,
    National,
}

/// A station token. A token is either bound to a named location on the map
/// or spare on the enterprise's charter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    location: Option<String>,
    price: i64,
}

impl Token {
    /// A spare token not yet bound to any location.
    pub fn spare(price: i64) -> Self {
        Self {
            location: None,
            price,
        }
    }

    /// A token bound to `location`.
    pub fn bound(location: &str, price: i64) -> Self {
        Self {
            location: Some(location.to_string()),
            price,
        }
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn price(&self) -> i64 {
        self.price
    }

    pub fn is_bound(&self) -> bool {
        self.location.is_some()
    }

    /// Bind the token to a location. Placement legality is the caller's
    /// concern; consolidation binds tokens outside the normal placement
    /// rules.
    pub fn bind(&mut self, location: &str) {
        self.location = Some(location.to_string());
    }
}

/// A piece of revenue equipment, identified by its tier in the equipment
/// catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    tier: String,
}

impl Train {
    pub fn new(tier: &str) -> Self {
        Self {
            tier: tier.to_string(),
        }
    }

    pub fn tier(&self) -> &str {
        &self.tier
    }
}

/// A chartered enterprise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enterprise {
    id: String,
    name: String,
    class: EnterpriseClass,
    /// Current valuation cell. `None` until the enterprise is placed on the
    /// grid.
    cell: Option<CellId>,
    /// The cell the par valuation was placed on, kept even after the
    /// current valuation moves away.
    par_cell: Option<CellId>,
    opened: bool,
    floated: bool,
    closed: bool,
    cash: i64,
    tokens: Vec<Token>,
    trains: Vec<Train>,
    /// The party recorded as holding control, maintained by the ledger and
    /// the consolidation protocol. `None` when no party qualifies.
    controlling_owner: Option<String>,
}

impl Enterprise {
    pub fn new(id: &str, name: &str, class: EnterpriseClass) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            class,
            cell: None,
            par_cell: None,
            opened: false,
            floated: false,
            closed: false,
            cash: 0,
            tokens: Vec::new(),
            trains: Vec::new(),
            controlling_owner: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> EnterpriseClass {
        self.class
    }

    pub fn cell(&self) -> Option<CellId> {
        self.cell
    }

    pub fn par_cell(&self) -> Option<CellId> {
        self.par_cell
    }

    pub fn opened(&self) -> bool {
        self.opened
    }

    pub fn floated(&self) -> bool {
        self.floated
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    pub fn cash(&self) -> i64 {
        self.cash
    }

    pub fn controlling_owner(&self) -> Option<&str> {
        self.controlling_owner.as_deref()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn trains(&self) -> &[Train] {
        &self.trains
    }

    /// Move the current valuation to `cell`. Grid movement rules live in
    /// the market module; this only records the result.
    pub fn set_cell(&mut self, cell: CellId) {
        self.cell = Some(cell);
    }

    pub(crate) fn set_par_cell(&mut self, cell: CellId) {
        self.par_cell = Some(cell);
    }

    pub(crate) fn mark_opened(&mut self) {
        self.opened = true;
    }

    pub(crate) fn mark_floated(&mut self) {
        self.floated = true;
    }

    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub(crate) fn set_controlling_owner(&mut self, owner: Option<String>) {
        self.controlling_owner = owner;
    }

    pub fn credit(&mut self, amount: i64) {
        self.cash += amount;
    }

    /// Drain the treasury, returning what was in it.
    pub(crate) fn take_cash(&mut self) -> i64 {
        std::mem::take(&mut self.cash)
    }

    pub fn add_token(&mut self, token: Token) {
        self.tokens.push(token);
    }

    /// Drain every token off the charter.
    pub(crate) fn take_tokens(&mut self) -> Vec<Token> {
        std::mem::take(&mut self.tokens)
    }

    /// Whether a bound token of this enterprise already sits at `location`.
    pub fn has_token_at(&self, location: &str) -> bool {
        self.tokens.iter().any(|t| t.location() == Some(location))
    }

    /// Reorder tokens so bound ones come before spares, preserving relative
    /// order within each group.
    pub(crate) fn sort_tokens_bound_first(&mut self) {
        self.tokens.sort_by_key(|t| !t.is_bound());
    }

    pub fn add_train(&mut self, train: Train) {
        self.trains.push(train);
    }

    /// Drain the equipment roster.
    pub(crate) fn take_trains(&mut self) -> Vec<Train> {
        std::mem::take(&mut self.trains)
    }
}
