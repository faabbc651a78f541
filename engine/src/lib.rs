//! # Magnate Core
//!
//! Rules engine for a turn-based economic strategy game of railway
//! enterprises: parties buy into enterprises on a shared valuation grid,
//! rounds alternate between trading and operating, and at a configured
//! point in the game a set of minor enterprises consolidates into one
//! national successor. This crate owns the round scheduling and the full
//! consolidation protocol; trading and operating mechanics are driven from
//! outside against the state it exposes.
//!
//! # Architecture
//!
//! - **config**: scenario data (grid, phases, equipment, enterprise roster,
//!   consolidation plan) with up-front validation
//! - **market**: the valuation grid and price movement rules
//! - **models**: parties, enterprises, certificates, events, and the
//!   aggregate `GameState`
//! - **ledger**: atomic certificate transfers with the control guard
//! - **registry**: enterprise opening and closing; the only place
//!   certificates are minted
//! - **migration**: token and equipment movement during consolidation
//! - **merger**: the consolidation protocol itself
//! - **scheduler**: the round state machine, including the serializable
//!   resumption a consolidation postpones
//! - **game**: the `Game` facade and checkpointing
//!
//! # Critical Invariants
//!
//! - Certificate percentages of every enterprise always sum to 100; no
//!   operation creates or destroys a certificate after its enterprise
//!   opens.
//! - Transfers are atomic and, with the control guard engaged, never move
//!   the top holding from one party to another.
//! - The turn counter advances the moment an operating cycle completes,
//!   even when a consolidation round is spliced in before the next trading
//!   round.
//! - Scheduling rejections leave the game playable; invariant violations
//!   mean the state is corrupt and advancement must stop.
//!
//! # Example
//!
//! ```
//! use magnate_core::config::GameConfig;
//! use magnate_core::game::Game;
//! use magnate_core::models::Holder;
//! use magnate_core::scheduler::RoundKind;
//!
//! let config = GameConfig::standard(&[("a", "Alma"), ("b", "Bren"), ("c", "Cato")]);
//! let mut game = Game::new(config).unwrap();
//!
//! // Allocation: hand the first minor's certificate to a party.
//! let cert_id = game.state().certificates_of("P1")[0].id().to_string();
//! game.transfer_certificates(vec![cert_id], Holder::Party("a".to_string()), true)
//!     .unwrap();
//!
//! let ctx = game.advance_round().unwrap();
//! assert_eq!(ctx.round, RoundKind::Trading);
//! ```

pub mod config;
pub mod game;
pub mod ledger;
pub mod market;
pub mod merger;
pub mod migration;
pub mod models;
pub mod registry;
pub mod scheduler;

pub use config::GameConfig;
pub use game::{Game, GameError, GameSnapshot, RoundContext};
pub use market::{CellId, CellTag, SellMovement, ValuationGrid};
pub use merger::ConsolidationOutcome;
pub use models::{
    Bank, Certificate, CertificateBundle, Enterprise, EnterpriseClass, Event, EventLog, GameState,
    Holder, InvariantViolation, Party, Token, Train,
};
pub use scheduler::{PendingResumption, RoundKind, RoundScheduler, TransitionError};
