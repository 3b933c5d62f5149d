//! Authorization negotiation
//!
//! Decides whether a caller may access a device. A device already in the
//! grant set is authorized synchronously; anything else registers a
//! one-shot decision slot, hands the prompt to the backend, and suspends
//! the request until the backend answers or the wait times out.

pub mod broker;
pub mod grants;
pub mod prompt;

pub use broker::{PermissionBroker, PromptTicket};
pub use grants::GrantStore;
pub use prompt::{CommandPrompter, Prompter, StaticPrompter};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-device authorization front end
pub struct Authorizer {
    grants: GrantStore,
    broker: Arc<PermissionBroker>,
    prompter: Arc<dyn Prompter>,
    timeout: Option<Duration>,
}

impl Authorizer {
    pub fn new(
        grants: GrantStore,
        broker: Arc<PermissionBroker>,
        prompter: Arc<dyn Prompter>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            grants,
            broker,
            prompter,
            timeout,
        }
    }

    /// Resolve authorization for a device
    ///
    /// Delivers exactly one outcome per call. The synchronous path never
    /// touches the broker; the suspended path owns exactly one pending slot
    /// until it is resolved, timed out, or cancelled.
    pub async fn authorize(&self, device: &str) -> bool {
        if self.grants.contains(device) {
            debug!("Device {} already authorized", device);
            return true;
        }

        let (ticket, decision) = self.broker.register();
        self.prompter.begin_prompt(device, ticket);

        let granted = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, decision.outcome()).await {
                Ok(granted) => granted,
                Err(_) => {
                    warn!("Authorization prompt {} for {} timed out", ticket, device);
                    self.broker.cancel(ticket);
                    false
                }
            },
            None => decision.outcome().await,
        };

        if granted {
            info!("Authorization granted for {}", device);
            self.grants.grant(device);
        } else {
            info!("Authorization denied for {}", device);
        }
        granted
    }
}
