//! Debounced previews for form input.
//!
//! Each keystroke calls [`PreviewDebouncer::submit`]. The newest input
//! replaces any pending one; only after the input has been quiet for the
//! debounce delay is the vault asked. Results land on a `watch` channel
//! tagged with the input that produced them, so a late answer for stale
//! input is never shown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::client::{validate_deposit_amount, VaultClient};
use super::codes::translate_error;
use crate::config::PREVIEW_DEBOUNCE;

/// Which preview the input feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    /// Amount in, shares out.
    Deposit,
    /// Shares in, amount out.
    Withdraw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PreviewState {
    Empty,
    Pending { input: String },
    Ready { input: String, amount: u64, result: u64 },
    Invalid { input: String, message: String },
    Failed { input: String, message: String },
}

pub struct PreviewDebouncer {
    client: Arc<VaultClient>,
    kind: PreviewKind,
    delay: Duration,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
    state: Arc<watch::Sender<PreviewState>>,
}

impl PreviewDebouncer {
    pub fn new(client: Arc<VaultClient>, kind: PreviewKind) -> Self {
        let (tx, _rx) = watch::channel(PreviewState::Empty);
        Self {
            client,
            kind,
            delay: PREVIEW_DEBOUNCE,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            state: Arc::new(tx),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn state(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.state.subscribe()
    }

    /// Replaces the pending input. Bad input is reported at once and never
    /// reaches the vault.
    pub fn submit(&self, input: impl Into<String>) {
        let input = input.into();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.abort_pending();

        if input.trim().is_empty() {
            self.state.send_replace(PreviewState::Empty);
            return;
        }
        let amount = match validate_deposit_amount(&input) {
            Ok(amount) => amount,
            Err(e) => {
                self.state.send_replace(PreviewState::Invalid {
                    input,
                    message: e.to_string(),
                });
                return;
            }
        };

        self.state.send_replace(PreviewState::Pending {
            input: input.clone(),
        });

        let client = Arc::clone(&self.client);
        let current = Arc::clone(&self.generation);
        let state = Arc::clone(&self.state);
        let (kind, delay) = (self.kind, self.delay);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            debug!(?kind, amount, "running preview");
            let result = match kind {
                PreviewKind::Deposit => client.preview_deposit(amount).await,
                PreviewKind::Withdraw => client.preview_withdraw(amount).await,
            };
            let next = match result {
                Ok(result) => PreviewState::Ready {
                    input,
                    amount,
                    result,
                },
                Err(e) => PreviewState::Failed {
                    input,
                    message: translate_error(&e),
                },
            };
            state.send_if_modified(|s| {
                if current.load(Ordering::SeqCst) == generation {
                    *s = next;
                    true
                } else {
                    false
                }
            });
        });
        *self.pending.lock() = Some(handle);
    }

    /// Drops any pending preview and clears the state.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.abort_pending();
        self.state.send_replace(PreviewState::Empty);
    }

    fn abort_pending(&self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for PreviewDebouncer {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clarity::ClarityValue;
    use crate::config::{functions, Network};
    use crate::session::Session;
    use crate::vault::testing::{vault_id, ScriptedReader, ScriptedSigner};

    fn debouncer(reader: ScriptedReader, kind: PreviewKind) -> PreviewDebouncer {
        let client = VaultClient::new(
            vault_id(),
            Network::Testnet,
            Arc::new(reader),
            Arc::new(ScriptedSigner::tx("0x")),
            Session::new(),
        );
        PreviewDebouncer::new(Arc::new(client), kind)
    }

    fn shares_reader() -> ScriptedReader {
        ScriptedReader::new().with(
            functions::PREVIEW_DEPOSIT,
            Ok(ClarityValue::ResponseOk(Box::new(ClarityValue::UInt(950_000)))),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn only_latest_input_is_queried() {
        let reader = shares_reader();
        let args = reader.args();
        let d = debouncer(reader, PreviewKind::Deposit);
        let mut rx = d.subscribe();

        d.submit("1");
        tokio::time::sleep(Duration::from_millis(200)).await;
        d.submit("12");
        tokio::time::sleep(Duration::from_millis(200)).await;
        d.submit("1");

        loop {
            rx.changed().await.unwrap();
            if let PreviewState::Ready { .. } = *rx.borrow_and_update() {
                break;
            }
        }

        assert_eq!(
            d.state(),
            PreviewState::Ready {
                input: "1".into(),
                amount: 1_000_000,
                result: 950_000
            }
        );
        assert_eq!(args.lock().as_slice(), &[vec![ClarityValue::UInt(1_000_000)]]);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_input_skips_network() {
        let reader = shares_reader();
        let args = reader.args();
        let d = debouncer(reader, PreviewKind::Deposit);

        d.submit("abc");
        assert!(matches!(d.state(), PreviewState::Invalid { ref input, .. } if input == "abc"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(args.lock().is_empty());

        d.submit("   ");
        assert_eq!(d.state(), PreviewState::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_translated() {
        let reader = ScriptedReader::new().with(
            functions::PREVIEW_WITHDRAW,
            Ok(ClarityValue::ResponseErr(Box::new(ClarityValue::UInt(102)))),
        );
        let d = debouncer(reader, PreviewKind::Withdraw);
        let mut rx = d.subscribe();
        d.submit("5");
        loop {
            rx.changed().await.unwrap();
            if let PreviewState::Failed { ref message, .. } = *rx.borrow_and_update() {
                assert_eq!(message, "Invalid shares amount");
                break;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending() {
        let reader = shares_reader();
        let args = reader.args();
        let d = debouncer(reader, PreviewKind::Deposit);

        d.submit("2");
        assert!(matches!(d.state(), PreviewState::Pending { .. }));
        d.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(d.state(), PreviewState::Empty);
        assert!(args.lock().is_empty());
    }
}
