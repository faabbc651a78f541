//! Domain models: parties, enterprises, certificates, events, and the
//! aggregate game state.

pub mod certificate;
pub mod enterprise;
pub mod event;
pub mod party;
pub mod state;

pub use certificate::{Certificate, CertificateBundle, Holder};
pub use enterprise::{Enterprise, EnterpriseClass, Token, Train};
pub use event::{Event, EventLog};
pub use party::Party;
pub use state::{Bank, GameState, InvariantViolation};
