//! Game orchestration: the engine facade and checkpointing.

pub mod checkpoint;
pub mod engine;

pub use checkpoint::{compute_config_hash, GameSnapshot};
pub use engine::{Game, GameError, RoundContext};
