//! Round scheduler
//!
//! The game moves through rounds in a fixed grammar: one allocation round,
//! then alternating trading rounds and operating cycles, with an optional
//! consolidation round spliced in. The scheduler owns that grammar and
//! nothing else; what happens inside a round is the caller's business.
//!
//! Allocation -> Trading -> Operating(1..K) -> Trading -> Operating(1..K') ...
//!
//! The number of operating rounds per cycle is sampled from the current
//! phase when a cycle begins and then held for the whole cycle, even if a
//! phase change mid-cycle would raise it.
//!
//! # Consolidation splicing
//!
//! Arming the trigger during an operating round makes the transition out of
//! that round detour: the transition that would have happened is stored as
//! a serializable resumption, the consolidation round runs, and the next
//! advance performs the stored transition. The turn counter still advances
//! at the moment the last operating round of a cycle ends, consolidation or
//! not.
//!
//! # Critical Invariants
//!
//! - A resumption is stored if and only if a consolidation round is
//!   current. Entering consolidation with one already stored, or leaving
//!   without one, is state corruption and fails fatally.
//! - The trigger flag survives into the consolidation round and is cleared
//!   together with the resumption on the way out.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::state::InvariantViolation;

/// The kind of round currently being played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundKind {
    /// Initial distribution of starting certificates. Played once.
    Allocation,
    /// Certificates change hands.
    Trading,
    /// Enterprises operate, `index` of `total` in this cycle.
    Operating { index: usize, total: usize },
    /// The consolidation protocol runs.
    Consolidation,
    /// Nothing further will be scheduled.
    Finished,
}

impl fmt::Display for RoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundKind::Allocation => write!(f, "allocation round"),
            RoundKind::Trading => write!(f, "trading round"),
            RoundKind::Operating { index, total } => {
                write!(f, "operating round {} of {}", index, total)
            }
            RoundKind::Consolidation => write!(f, "consolidation round"),
            RoundKind::Finished => write!(f, "finished"),
        }
    }
}

/// The transition a consolidation round postponed, stored in a
/// serializable form so a checkpoint taken mid-consolidation survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingResumption {
    /// Continue the interrupted operating cycle.
    Operating { index: usize, total: usize },
    /// The cycle was complete; open the next trading round.
    Trading,
}

/// A recoverable scheduling rejection. The machine is untouched when one
/// of these comes back.
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("consolidation can only be triggered during an operating round (current: {0})")]
    TriggerOutsideOperating(RoundKind),

    #[error("the consolidation has already run")]
    ConsolidationAlreadyDone,

    #[error("the current round is awaiting participant input")]
    AwaitingInput,

    #[error("the game is finished")]
    GameOver,

    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    #[error("cannot re-enter phase {to} from {from}")]
    PhaseRegression { from: String, to: String },
}

/// The round state machine.
///
/// # Example
/// ```
/// use magnate_core::scheduler::{RoundKind, RoundScheduler};
///
/// let mut s = RoundScheduler::new();
/// assert_eq!(*s.round(), RoundKind::Allocation);
///
/// s.advance(2, false).unwrap();
/// assert_eq!(*s.round(), RoundKind::Trading);
/// s.advance(2, false).unwrap();
/// assert_eq!(*s.round(), RoundKind::Operating { index: 1, total: 2 });
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundScheduler {
    round: RoundKind,
    turn: usize,
    /// Count of rounds entered since setup; stamps events.
    round_ordinal: usize,
    consolidation_pending: bool,
    resumption: Option<PendingResumption>,
    awaiting_input: bool,
}

impl Default for RoundScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundScheduler {
    pub fn new() -> Self {
        Self {
            round: RoundKind::Allocation,
            turn: 1,
            round_ordinal: 0,
            consolidation_pending: false,
            resumption: None,
            awaiting_input: false,
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn round(&self) -> &RoundKind {
        &self.round
    }

    /// Current turn number, starting at 1. A turn is one trading round plus
    /// its operating cycle.
    pub fn turn(&self) -> usize {
        self.turn
    }

    pub fn round_ordinal(&self) -> usize {
        self.round_ordinal
    }

    pub fn consolidation_pending(&self) -> bool {
        self.consolidation_pending
    }

    pub fn resumption(&self) -> Option<&PendingResumption> {
        self.resumption.as_ref()
    }

    pub fn awaiting_input(&self) -> bool {
        self.awaiting_input
    }

    pub fn is_finished(&self) -> bool {
        self.round == RoundKind::Finished
    }

    // ========================================================================
    // INPUT GATE
    // ========================================================================

    /// Block round advancement until participant input arrives.
    pub fn mark_awaiting_input(&mut self) {
        self.awaiting_input = true;
    }

    pub fn clear_awaiting_input(&mut self) {
        self.awaiting_input = false;
    }

    // ========================================================================
    // TRANSITIONS
    // ========================================================================

    /// Arm the consolidation trigger. Legal only during an operating round;
    /// arming an already armed trigger is a no-op.
    pub fn arm_consolidation(&mut self) -> Result<(), TransitionError> {
        match self.round {
            RoundKind::Finished => Err(TransitionError::GameOver),
            RoundKind::Operating { .. } => {
                self.consolidation_pending = true;
                Ok(())
            }
            _ => Err(TransitionError::TriggerOutsideOperating(self.round.clone())),
        }
    }

    /// Check the recoverable preconditions for advancing. Split from
    /// [`advance`] so callers can distinguish a rejected request from
    /// corrupted state.
    pub fn ensure_can_advance(&self) -> Result<(), TransitionError> {
        if self.is_finished() {
            return Err(TransitionError::GameOver);
        }
        if self.awaiting_input {
            return Err(TransitionError::AwaitingInput);
        }
        Ok(())
    }

    /// Move to the next round.
    ///
    /// `operating_rounds` is the cycle length the current phase prescribes;
    /// it is read only when a new operating cycle begins. `bank_depleted`
    /// ends the game instead of opening the next trading round.
    ///
    /// Errors from here are fatal: they mean the stored resumption state
    /// contradicts the current round.
    pub fn advance(
        &mut self,
        operating_rounds: usize,
        bank_depleted: bool,
    ) -> Result<RoundKind, InvariantViolation> {
        let next = match &self.round {
            RoundKind::Finished => return Ok(RoundKind::Finished),
            RoundKind::Allocation => trading_or_finished(bank_depleted),
            RoundKind::Trading => RoundKind::Operating {
                index: 1,
                total: operating_rounds.max(1),
            },
            RoundKind::Operating { index, total } => {
                let resumption = if index < total {
                    PendingResumption::Operating {
                        index: index + 1,
                        total: *total,
                    }
                } else {
                    // The cycle is complete the moment its last operating
                    // round ends, even when a consolidation intervenes.
                    self.turn += 1;
                    PendingResumption::Trading
                };
                if self.consolidation_pending {
                    if self.resumption.is_some() {
                        return Err(InvariantViolation::ResumptionAlreadyStored);
                    }
                    self.resumption = Some(resumption);
                    RoundKind::Consolidation
                } else {
                    resume(resumption, bank_depleted)
                }
            }
            RoundKind::Consolidation => {
                let stored = self
                    .resumption
                    .take()
                    .ok_or(InvariantViolation::MissingResumption)?;
                self.consolidation_pending = false;
                resume(stored, bank_depleted)
            }
        };

        self.round = next.clone();
        self.round_ordinal += 1;
        Ok(next)
    }
}

fn resume(resumption: PendingResumption, bank_depleted: bool) -> RoundKind {
    match resumption {
        PendingResumption::Operating { index, total } => RoundKind::Operating { index, total },
        PendingResumption::Trading => trading_or_finished(bank_depleted),
    }
}

fn trading_or_finished(bank_depleted: bool) -> RoundKind {
    if bank_depleted {
        RoundKind::Finished
    } else {
        RoundKind::Trading
    }
}
