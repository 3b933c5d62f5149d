//! Prompt backends
//!
//! The host-integration layer that answers authorization prompts. A backend
//! receives a (device, ticket) pair and must eventually resolve the ticket
//! through the broker, exactly once.

use crate::permission::broker::{PermissionBroker, PromptTicket};
use std::sync::Arc;
use tracing::{debug, warn};

/// Answers authorization prompts
pub trait Prompter: Send + Sync {
    fn begin_prompt(&self, device: &str, ticket: PromptTicket);
}

/// Resolves prompts by running a configured helper command
///
/// The device reference is appended to the argv; exit status zero grants.
/// A helper that cannot be spawned resolves as a denial.
pub struct CommandPrompter {
    broker: Arc<PermissionBroker>,
    argv: Vec<String>,
}

impl CommandPrompter {
    pub fn new(broker: Arc<PermissionBroker>, argv: Vec<String>) -> Self {
        Self { broker, argv }
    }
}

impl Prompter for CommandPrompter {
    fn begin_prompt(&self, device: &str, ticket: PromptTicket) {
        let broker = self.broker.clone();
        let argv = self.argv.clone();
        let device = device.to_string();

        tokio::spawn(async move {
            let granted = match run_helper(&argv, &device).await {
                Ok(granted) => granted,
                Err(e) => {
                    warn!("Authorization helper failed for {}: {}", device, e);
                    false
                }
            };
            broker.resolve(ticket, granted);
        });
    }
}

async fn run_helper(argv: &[String], device: &str) -> std::io::Result<bool> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(false);
    };
    let status = tokio::process::Command::new(program)
        .args(args)
        .arg(device)
        .status()
        .await?;
    debug!("Helper for {} exited with {}", device, status);
    Ok(status.success())
}

/// Resolves every prompt with a fixed verdict
///
/// Used when no helper command is configured: deny-by-default, or grant
/// everything on hosts that opt into auto-grant.
pub struct StaticPrompter {
    broker: Arc<PermissionBroker>,
    verdict: bool,
}

impl StaticPrompter {
    pub fn new(broker: Arc<PermissionBroker>, verdict: bool) -> Self {
        Self { broker, verdict }
    }
}

impl Prompter for StaticPrompter {
    fn begin_prompt(&self, _device: &str, ticket: PromptTicket) {
        self.broker.resolve(ticket, self.verdict);
    }
}

/// Records prompts without ever resolving them
#[cfg(test)]
pub struct RecordingPrompter {
    pub prompts: std::sync::Mutex<Vec<(String, PromptTicket)>>,
}

#[cfg(test)]
impl RecordingPrompter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            prompts: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn last_ticket(&self) -> Option<PromptTicket> {
        self.prompts.lock().unwrap().last().map(|(_, t)| *t)
    }
}

#[cfg(test)]
impl Prompter for RecordingPrompter {
    fn begin_prompt(&self, device: &str, ticket: PromptTicket) {
        self.prompts.lock().unwrap().push((device.to_string(), ticket));
    }
}

/// Fails the test if the bridge is ever invoked
#[cfg(test)]
pub struct PanicPrompter;

#[cfg(test)]
impl Prompter for PanicPrompter {
    fn begin_prompt(&self, device: &str, _ticket: PromptTicket) {
        panic!("unexpected authorization prompt for {}", device);
    }
}
