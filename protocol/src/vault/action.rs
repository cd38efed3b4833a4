//! Deposit/withdraw action state machine.
//!
//! ```text
//! Idle → Validating → Submitting → AwaitingUserConfirmation
//!            │             │                  │
//!            └──► Failed ◄─┘                  ├──► Accepted
//!                                             ├──► Cancelled
//!                                             └──► Failed
//! terminal → Idle
//! ```
//!
//! The current phase is published on a `watch` channel so a UI can render
//! it. `Accepted` schedules one balance refresh after a fixed delay. The
//! refresh may still see the pre-transaction balance; nothing waits for
//! confirmation.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::client::{validate_deposit_amount, TransactionReceipt, VaultBalance, VaultClient};
use super::codes::translate_error;
use super::error::{ErrorKind, VaultError};
use crate::config::POST_SUBMIT_REFRESH_DELAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Deposit,
    Withdraw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum ActionPhase {
    Idle,
    Validating,
    Submitting,
    AwaitingUserConfirmation,
    Accepted { receipt: TransactionReceipt },
    Cancelled,
    Failed { message: String },
}

impl ActionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            ActionPhase::Idle => "idle",
            ActionPhase::Validating => "validating",
            ActionPhase::Submitting => "submitting",
            ActionPhase::AwaitingUserConfirmation => "awaiting_user_confirmation",
            ActionPhase::Accepted { .. } => "accepted",
            ActionPhase::Cancelled => "cancelled",
            ActionPhase::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionPhase::Accepted { .. } | ActionPhase::Cancelled | ActionPhase::Failed { .. }
        )
    }

    pub fn can_advance_to(&self, next: &ActionPhase) -> bool {
        use ActionPhase::*;
        match (self, next) {
            (Idle, Validating) => true,
            (Validating, Submitting) | (Validating, Failed { .. }) => true,
            (Submitting, AwaitingUserConfirmation) | (Submitting, Failed { .. }) => true,
            (AwaitingUserConfirmation, Accepted { .. })
            | (AwaitingUserConfirmation, Cancelled)
            | (AwaitingUserConfirmation, Failed { .. }) => true,
            (from, Idle) => from.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("illegal transition {from} -> {to}")]
    Illegal {
        from: &'static str,
        to: &'static str,
    },
}

/// What [`VaultAction::run`] ended with.
#[derive(Debug)]
pub struct ActionOutcome {
    pub phase: ActionPhase,
    /// Delayed balance refresh, present only after `Accepted`.
    pub refresh: Option<JoinHandle<Result<VaultBalance, VaultError>>>,
}

/// One deposit or withdraw form, driven through the phases.
pub struct VaultAction {
    id: Uuid,
    kind: ActionKind,
    client: Arc<VaultClient>,
    phase: watch::Sender<ActionPhase>,
    refresh_delay: Duration,
}

impl VaultAction {
    pub fn new(kind: ActionKind, client: Arc<VaultClient>) -> Self {
        let (phase, _rx) = watch::channel(ActionPhase::Idle);
        Self {
            id: Uuid::new_v4(),
            kind,
            client,
            phase,
            refresh_delay: POST_SUBMIT_REFRESH_DELAY,
        }
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn phase(&self) -> ActionPhase {
        self.phase.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ActionPhase> {
        self.phase.subscribe()
    }

    /// Moves to `next` if the machine allows it.
    pub fn advance(&self, next: ActionPhase) -> Result<(), TransitionError> {
        let mut illegal = None;
        self.phase.send_if_modified(|current| {
            if current.can_advance_to(&next) {
                debug!(action = %self.id, from = current.name(), to = next.name(), "action phase");
                *current = next.clone();
                true
            } else {
                illegal = Some(current.name());
                false
            }
        });
        match illegal {
            Some(from) => Err(TransitionError::Illegal {
                from,
                to: next.name(),
            }),
            None => Ok(()),
        }
    }

    /// Back to `Idle` from a terminal phase.
    pub fn reset(&self) -> Result<(), TransitionError> {
        if *self.phase.borrow() == ActionPhase::Idle {
            return Ok(());
        }
        self.advance(ActionPhase::Idle)
    }

    /// Runs one submission from raw form input.
    ///
    /// Fails only if an earlier run is still in flight. Every other outcome,
    /// including validation and wallet errors, is reported as the final
    /// phase.
    pub async fn run(&self, input: &str) -> Result<ActionOutcome, TransitionError> {
        self.reset()?;
        self.advance(ActionPhase::Validating)?;

        let amount = match validate_deposit_amount(input) {
            Ok(amount) => amount,
            Err(e) => return self.fail(e),
        };
        let address = match self.client.ensure_signed_in() {
            Ok(address) => address,
            Err(e) => return self.fail(e),
        };

        self.advance(ActionPhase::Submitting)?;
        self.advance(ActionPhase::AwaitingUserConfirmation)?;

        let submitted = match self.kind {
            ActionKind::Deposit => self.client.deposit(amount).await,
            ActionKind::Withdraw => self.client.withdraw(amount).await,
        };

        match submitted {
            Ok(receipt) => {
                info!(action = %self.id, tx_id = %receipt.tx_id, kind = ?self.kind, "action accepted");
                let phase = ActionPhase::Accepted { receipt };
                self.advance(phase.clone())?;
                Ok(ActionOutcome {
                    phase,
                    refresh: Some(self.schedule_refresh(address)),
                })
            }
            Err(VaultError::UserCancelled) => {
                self.advance(ActionPhase::Cancelled)?;
                Ok(ActionOutcome {
                    phase: ActionPhase::Cancelled,
                    refresh: None,
                })
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&self, err: VaultError) -> Result<ActionOutcome, TransitionError> {
        let message = match err.kind() {
            ErrorKind::Validation | ErrorKind::Session => err.to_string(),
            _ => translate_error(&err),
        };
        warn!(action = %self.id, error = %err, "action failed");
        let phase = ActionPhase::Failed { message };
        self.advance(phase.clone())?;
        Ok(ActionOutcome {
            phase,
            refresh: None,
        })
    }

    fn schedule_refresh(&self, address: String) -> JoinHandle<Result<VaultBalance, VaultError>> {
        let client = Arc::clone(&self.client);
        let delay = self.refresh_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            client.get_user_balance(&address).await
        })
    }
}
