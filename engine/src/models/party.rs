//! Participant model
//!
//! A party is a human seat at the table: it holds capital, may incur debt,
//! and owns certificates through the ownership ledger (certificates record
//! their holder; parties do not keep a mirror list).

use serde::{Deserialize, Serialize};

/// A participant in the game.
///
/// Capital is tracked in whole currency units as `i64`. The balance is
/// allowed to go negative: a settlement a party cannot cover converts the
/// uncovered portion into debt while the balance records the overdraft.
/// Debt only ever grows during play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    id: String,
    name: String,
    cash: i64,
    debt: i64,
}

impl Party {
    /// Create a party with starting capital and no debt.
    ///
    /// # Example
    /// ```
    /// use magnate_core::models::party::Party;
    ///
    /// let p = Party::new("p1", "Alma", 475);
    /// assert_eq!(p.cash(), 475);
    /// assert_eq!(p.debt(), 0);
    /// ```
    pub fn new(id: &str, name: &str, cash: i64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            cash,
            debt: 0,
        }
    }

    /// Rebuild a party from persisted fields, debt included.
    pub fn from_snapshot(id: &str, name: &str, cash: i64, debt: i64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            cash,
            debt,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current capital balance. Negative once debt has been absorbed.
    pub fn cash(&self) -> i64 {
        self.cash
    }

    /// Accumulated debt. Never negative.
    pub fn debt(&self) -> i64 {
        self.debt
    }

    /// Receive a payment.
    pub fn credit(&mut self, amount: i64) {
        self.cash += amount;
    }

    /// Pay `amount`, converting any uncovered portion into debt.
    ///
    /// The full amount always leaves the balance; the portion not covered by
    /// positive capital is added to the debt counter and returned so the
    /// caller can record it.
    ///
    /// # Example
    /// ```
    /// use magnate_core::models::party::Party;
    ///
    /// let mut p = Party::new("p1", "Alma", 5);
    /// let shortfall = p.pay_absorbing_debt(20);
    /// assert_eq!(shortfall, 15);
    /// assert_eq!(p.cash(), -15);
    /// assert_eq!(p.debt(), 15);
    /// ```
    pub fn pay_absorbing_debt(&mut self, amount: i64) -> i64 {
        let covered = self.cash.clamp(0, amount);
        let shortfall = amount - covered;
        self.cash -= amount;
        self.debt += shortfall;
        shortfall
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pay_fully_covered() {
        let mut p = Party::new("p1", "Alma", 100);
        assert_eq!(p.pay_absorbing_debt(40), 0);
        assert_eq!(p.cash(), 60);
        assert_eq!(p.debt(), 0);
    }

    #[test]
    fn test_pay_from_negative_balance() {
        let mut p = Party::from_snapshot("p1", "Alma", -15, 15);
        // Nothing is covered once the balance is already negative.
        assert_eq!(p.pay_absorbing_debt(10), 10);
        assert_eq!(p.cash(), -25);
        assert_eq!(p.debt(), 25);
    }
}
