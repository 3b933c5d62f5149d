//! One-shot authorization decision broker
//!
//! Tracks pending authorization prompts by correlation ticket. Each
//! invocation registers exactly one decision slot; the prompt backend
//! resolves it once, and resolution removes the slot so a second delivery
//! has nothing to fire.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Correlation token for one pending authorization prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromptTicket(pub u64);

impl std::fmt::Display for PromptTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered decision slot, awaited by the suspended request
pub struct PendingDecision {
    rx: oneshot::Receiver<bool>,
}

impl PendingDecision {
    /// Wait for the outcome; a dropped slot counts as a denial
    pub async fn outcome(self) -> bool {
        self.rx.await.unwrap_or(false)
    }
}

/// Pending-prompt table shared between requests and the prompt backend
#[derive(Default)]
pub struct PermissionBroker {
    pending: Mutex<HashMap<PromptTicket, oneshot::Sender<bool>>>,
    next_ticket: AtomicU64,
}

impl PermissionBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decision slot for a new prompt
    pub fn register(&self) -> (PromptTicket, PendingDecision) {
        let ticket = PromptTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = oneshot::channel();
        self.table().insert(ticket, tx);
        debug!("Registered authorization prompt {}", ticket);
        (ticket, PendingDecision { rx })
    }

    /// Deliver the outcome for a pending prompt
    ///
    /// Returns false when the ticket has no pending slot: already resolved,
    /// cancelled, or never registered.
    pub fn resolve(&self, ticket: PromptTicket, granted: bool) -> bool {
        match self.table().remove(&ticket) {
            Some(tx) => {
                debug!("Prompt {} resolved: granted={}", ticket, granted);
                // The waiter may have timed out; delivery is best-effort.
                let _ = tx.send(granted);
                true
            }
            None => {
                warn!("Ignoring outcome for unknown prompt {}", ticket);
                false
            }
        }
    }

    /// Drop a pending slot without delivering an outcome
    pub fn cancel(&self, ticket: PromptTicket) {
        if self.table().remove(&ticket).is_some() {
            debug!("Cancelled authorization prompt {}", ticket);
        }
    }

    /// Number of prompts currently awaiting an outcome
    pub fn pending_count(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<PromptTicket, oneshot::Sender<bool>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}
