//! Certificates and holders
//!
//! Every enterprise's ownership is divided into certificates created once,
//! when the enterprise opens, and never destroyed afterwards. A certificate
//! records who currently holds it; all changes of holder go through the
//! ownership ledger so control bookkeeping cannot be bypassed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Anything that can hold a certificate.
///
/// This enum is closed on purpose: the engine reasons exhaustively about
/// holder kinds (settlement, debt rules, control aggregation), and a new
/// kind of holder must visit every one of those decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Holder {
    /// A participant, by party id.
    Party(String),
    /// An enterprise's own treasury, by enterprise id. Certificates start
    /// here when the enterprise opens.
    Enterprise(String),
    /// The open market pool.
    Market,
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Holder::Party(id) => write!(f, "party {}", id),
            Holder::Enterprise(id) => write!(f, "enterprise {}", id),
            Holder::Market => write!(f, "the market pool"),
        }
    }
}

/// A single ownership certificate of one enterprise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    id: String,
    enterprise_id: String,
    percent: u8,
    controlling: bool,
    double: bool,
    holder: Holder,
}

impl Certificate {
    pub fn new(
        id: &str,
        enterprise_id: &str,
        percent: u8,
        controlling: bool,
        double: bool,
        holder: Holder,
    ) -> Self {
        Self {
            id: id.to_string(),
            enterprise_id: enterprise_id.to_string(),
            percent,
            controlling,
            double,
            holder,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The enterprise this certificate is a share of.
    pub fn enterprise_id(&self) -> &str {
        &self.enterprise_id
    }

    /// Ownership percentage this certificate represents.
    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Whether this is the enterprise's controlling certificate.
    pub fn controlling(&self) -> bool {
        self.controlling
    }

    /// Whether the certificate counts as a single slot against holding
    /// limits despite its doubled percentage.
    pub fn double(&self) -> bool {
        self.double
    }

    pub fn holder(&self) -> &Holder {
        &self.holder
    }

    /// Reassign the holder. Only the ownership ledger and the consolidation
    /// exchange should call this.
    pub(crate) fn set_holder(&mut self, holder: Holder) {
        self.holder = holder;
    }
}

/// An ordered group of certificates moved as one atomic unit.
///
/// The bundle itself is just the ids; percentages are summed against live
/// state when the bundle is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateBundle {
    certificate_ids: Vec<String>,
}

impl CertificateBundle {
    pub fn new(certificate_ids: Vec<String>) -> Self {
        Self { certificate_ids }
    }

    /// Bundle holding a single certificate.
    pub fn single(certificate_id: &str) -> Self {
        Self {
            certificate_ids: vec![certificate_id.to_string()],
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.certificate_ids
    }

    pub fn len(&self) -> usize {
        self.certificate_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificate_ids.is_empty()
    }
}
