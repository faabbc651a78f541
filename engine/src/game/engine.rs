//! Game engine
//!
//! `Game` ties the pieces together: validated configuration, the round
//! scheduler, mutable game state, and the event log. It owns the round
//! loop's bookkeeping; what happens inside trading and operating rounds is
//! driven from outside through [`Game::state_mut`] and
//! [`Game::transfer_certificates`], while consolidation runs here because
//! it is a whole round by itself.

use thiserror::Error;

use crate::config::{GameConfig, Phase, PhaseEvent};
use crate::game::checkpoint::{self, GameSnapshot};
use crate::ledger;
use crate::market::ValuationGrid;
use crate::merger::{self, ConsolidationOutcome};
use crate::models::certificate::{CertificateBundle, Holder};
use crate::models::event::{Event, EventLog};
use crate::models::party::Party;
use crate::models::state::{GameState, InvariantViolation};
use crate::registry;
use crate::scheduler::{RoundKind, RoundScheduler, TransitionError};

/// Top-level error type of the engine.
#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A request was rejected; the game is unchanged and playable.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// State corruption; the game must not be advanced further.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// What `advance_round` entered.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundContext {
    pub round: RoundKind,
    pub turn: usize,
    /// Ordinal of the entered round; events carry the same stamp.
    pub ordinal: usize,
    /// Present when the entered round was a consolidation.
    pub consolidation: Option<ConsolidationOutcome>,
}

/// One running game.
///
/// # Example
/// ```
/// use magnate_core::config::GameConfig;
/// use magnate_core::game::engine::Game;
/// use magnate_core::scheduler::RoundKind;
///
/// let config = GameConfig::standard(&[
///     ("a", "Alma"),
///     ("b", "Bren"),
///     ("c", "Cato"),
/// ]);
/// let mut game = Game::new(config).unwrap();
///
/// let ctx = game.advance_round().unwrap();
/// assert_eq!(ctx.round, RoundKind::Trading);
/// ```
#[derive(Debug)]
pub struct Game {
    config: GameConfig,
    state: GameState,
    scheduler: RoundScheduler,
    log: EventLog,
}

impl Game {
    /// Validate `config` and set up a game at the start of its allocation
    /// round: parties seated with starting capital, every configured
    /// enterprise opened with its certificates minted. The consolidation
    /// successor does not exist yet; it is created when consolidation
    /// fires.
    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        config.validate().map_err(GameError::InvalidConfig)?;

        let grid = ValuationGrid::from_spec(&config.grid_rows, config.sell_movement.clone())
            .map_err(GameError::InvalidConfig)?;
        let starting_cash = config
            .starting_cash_for(config.parties.len())
            .ok_or_else(|| {
                GameError::InvalidConfig(format!(
                    "no starting capital defined for {} parties",
                    config.parties.len()
                ))
            })?;

        let parties: Vec<Party> = config
            .parties
            .iter()
            .map(|p| Party::new(&p.id, &p.name, starting_cash))
            .collect();
        let mut state = GameState::new(parties, grid, config.bank_cash);

        let mut log = EventLog::new();
        for enterprise in &config.enterprises {
            registry::open_enterprise(
                &mut state,
                &enterprise.id,
                &enterprise.name,
                enterprise.class,
                &enterprise.scheme,
                enterprise.par_price,
            )?;
            log.log(Event::EnterpriseOpened {
                round: 0,
                enterprise_id: enterprise.id.clone(),
                par_price: enterprise.par_price,
            });
        }

        let scheduler = RoundScheduler::new();
        log.log(Event::RoundStarted {
            round: 0,
            kind: scheduler.round().clone(),
            turn: scheduler.turn(),
        });

        Ok(Self {
            config,
            state,
            scheduler,
            log,
        })
    }

    // ========================================================================
    // ROUND LOOP
    // ========================================================================

    /// Close the current round and enter the next one. When the entered
    /// round is a consolidation, the whole consolidation protocol runs
    /// before this returns.
    pub fn advance_round(&mut self) -> Result<RoundContext, GameError> {
        self.scheduler.ensure_can_advance()?;

        let operating_rounds = self.require_phase()?.operating_rounds;
        let bank_depleted = self.state.bank().is_depleted();
        let turn_before = self.scheduler.turn();

        let entered = self.scheduler.advance(operating_rounds, bank_depleted)?;
        let ordinal = self.scheduler.round_ordinal();
        let turn = self.scheduler.turn();

        if turn > turn_before {
            self.log.log(Event::TurnAdvanced { round: ordinal, turn });
        }
        if entered == RoundKind::Finished {
            self.log.log(Event::GameFinished {
                round: ordinal,
                reason: "bank depleted".to_string(),
            });
        } else {
            self.log.log(Event::RoundStarted {
                round: ordinal,
                kind: entered.clone(),
                turn,
            });
        }

        let consolidation = if entered == RoundKind::Consolidation {
            Some(merger::run_consolidation(
                &mut self.state,
                &self.config,
                &mut self.log,
                ordinal,
            )?)
        } else {
            None
        };

        Ok(RoundContext {
            round: entered,
            turn,
            ordinal,
            consolidation,
        })
    }

    /// Arm the consolidation trigger. Legal only during an operating round
    /// and only while the consolidation has not run yet; the protocol
    /// itself runs when the current operating round ends.
    pub fn trigger_consolidation(&mut self) -> Result<(), GameError> {
        if self.state.has_enterprise(&self.config.consolidation.successor.id) {
            return Err(TransitionError::ConsolidationAlreadyDone.into());
        }
        let newly_armed = !self.scheduler.consolidation_pending();
        self.scheduler.arm_consolidation()?;
        if newly_armed {
            self.log.log(Event::ConsolidationArmed {
                round: self.scheduler.round_ordinal(),
            });
        }
        Ok(())
    }

    /// Move to a later phase by name. Returns the phase's event, if it
    /// carries one, for the caller to act on (for example by triggering
    /// consolidation). Entering the current phase again is a no-op.
    pub fn enter_phase(&mut self, name: &str) -> Result<Option<PhaseEvent>, GameError> {
        let index = self
            .config
            .find_phase(name)
            .ok_or_else(|| TransitionError::UnknownPhase(name.to_string()))?;
        let current = self.state.phase_index();
        if index == current {
            return Ok(None);
        }
        if index < current {
            let from = self
                .phase()
                .map(|p| p.name.clone())
                .unwrap_or_default();
            return Err(TransitionError::PhaseRegression {
                from,
                to: name.to_string(),
            }
            .into());
        }

        self.state.set_phase_index(index);
        self.log.log(Event::PhaseChanged {
            round: self.scheduler.round_ordinal(),
            phase: name.to_string(),
        });
        Ok(self.config.phases.get(index).and_then(|p| p.event))
    }

    /// Block `advance_round` until participant input arrives.
    pub fn mark_awaiting_input(&mut self) {
        self.scheduler.mark_awaiting_input();
    }

    pub fn clear_awaiting_input(&mut self) {
        self.scheduler.clear_awaiting_input();
    }

    // ========================================================================
    // OWNERSHIP
    // ========================================================================

    /// Move a certificate bundle to `to` through the ownership ledger,
    /// recording the transfer and any control change in the event log.
    /// Atomic: on error nothing has moved.
    pub fn transfer_certificates(
        &mut self,
        certificate_ids: Vec<String>,
        to: Holder,
        allow_controlling_owner_change: bool,
    ) -> Result<(), GameError> {
        let bundle = CertificateBundle::new(certificate_ids);
        let outcome = ledger::transfer(
            &mut self.state,
            &bundle,
            &to,
            allow_controlling_owner_change,
        )?;

        let round = self.scheduler.round_ordinal();
        self.log.log(Event::CertificatesTransferred {
            round,
            to,
            count: bundle.len(),
        });
        for change in outcome.control_changes {
            self.log.log(Event::ControlChanged {
                round,
                enterprise_id: change.enterprise_id,
                previous: change.previous,
                party_id: change.new,
            });
        }
        Ok(())
    }

    // ========================================================================
    // CHECKPOINTS
    // ========================================================================

    /// Capture the full game state, scheduler included. The event log is
    /// not part of a snapshot.
    pub fn snapshot(&self) -> Result<GameSnapshot, GameError> {
        checkpoint::create_snapshot(&self.state, &self.scheduler, &self.config)
    }

    /// Rebuild a game from a snapshot taken under the same configuration.
    /// The snapshot is validated against the config hash and the state
    /// invariants before anything is accepted. Restoration starts a fresh
    /// event log.
    pub fn restore(config: GameConfig, snapshot: &GameSnapshot) -> Result<Self, GameError> {
        config.validate().map_err(GameError::InvalidConfig)?;
        let (state, scheduler) = checkpoint::restore(&config, snapshot)?;
        Ok(Self {
            config,
            state,
            scheduler,
            log: EventLog::new(),
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Mutable state access: the seam through which trading and operating
    /// round implementations (which live outside this crate) apply their
    /// effects.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn scheduler(&self) -> &RoundScheduler {
        &self.scheduler
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn round(&self) -> &RoundKind {
        self.scheduler.round()
    }

    pub fn turn(&self) -> usize {
        self.scheduler.turn()
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    /// The current phase, if the phase index is in range (it always is for
    /// a game built through `new` or `restore`).
    pub fn phase(&self) -> Option<&Phase> {
        self.config.phases.get(self.state.phase_index())
    }

    fn require_phase(&self) -> Result<&Phase, InvariantViolation> {
        self.phase().ok_or_else(|| {
            InvariantViolation::SnapshotIntegrity(format!(
                "phase index {} out of range",
                self.state.phase_index()
            ))
        })
    }

    /// Render an amount in the configured currency.
    pub fn format_currency(&self, amount: i64) -> String {
        self.config.currency.render(amount)
    }
}
