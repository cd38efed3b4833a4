//! # Session Context
//!
//! Who is signed in. Owned by whatever drives the wallet connection and
//! handed to everything that needs the current address; observers
//! subscribe to changes instead of polling. Dropping a receiver is the
//! unsubscribe.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::address::is_valid_address;

/// Snapshot of the sign-in state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub address: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn is_signed_in(&self) -> bool {
        self.address.is_some()
    }
}

/// Shared handle to the sign-in state. Clones observe and mutate the same
/// session.
#[derive(Debug, Clone)]
pub struct Session {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A signed-out session.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self { tx: Arc::new(tx) }
    }

    /// A session already signed in as `address`.
    pub fn signed_in(address: impl Into<String>) -> Self {
        let session = Self::new();
        session.connect(address);
        session
    }

    /// Records a wallet connection. Reconnecting with the same address is
    /// a no-op and does not wake subscribers.
    pub fn connect(&self, address: impl Into<String>) {
        let address = address.into();
        if !is_valid_address(&address) {
            warn!(address = %address, "connecting with an address that failed shape check");
        }
        let changed = self.tx.send_if_modified(|state| {
            if state.address.as_deref() == Some(address.as_str()) {
                return false;
            }
            *state = SessionState {
                address: Some(address.clone()),
                connected_at: Some(Utc::now()),
            };
            true
        });
        if changed {
            info!(address = %address, "wallet connected");
        }
    }

    pub fn disconnect(&self) {
        let changed = self.tx.send_if_modified(|state| {
            if state.address.is_none() {
                return false;
            }
            *state = SessionState::default();
            true
        });
        if changed {
            info!("wallet disconnected");
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.tx.borrow().is_signed_in()
    }

    pub fn address(&self) -> Option<String> {
        self.tx.borrow().address.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }
}
