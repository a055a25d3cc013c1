//! Command confirmation
//!
//! Issuing a command and observing its effect are two separate steps:
//! [`CommandDispatcher::issue`] hands the command off, [`await_transition`]
//! waits on a tracker for the entity to report the expected status.
//! [`StateWatcher::observe_and_command`] composes them, subscribing first so
//! a fast device cannot slip its transition past the watch.

use std::sync::Arc;
use std::time::Duration;

use res_scene_core::{Command, EntityId, State};
use tracing::{debug, instrument};

use crate::error::DispatchError;
use crate::host::{CommandDispatcher, Host, StatusFeed, StatusTracker};

/// Outcome of one confirmed command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub entity_id: EntityId,
    pub old_state: Option<State>,
    pub new_state: Option<State>,
    pub matched: bool,
    pub timed_out: bool,
}

impl CommandResult {
    fn timed_out(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            old_state: None,
            new_state: None,
            matched: false,
            timed_out: true,
        }
    }

    pub fn old_value(&self) -> Option<&str> {
        self.old_state.as_ref().map(|s| s.state.as_str())
    }

    pub fn new_value(&self) -> Option<&str> {
        self.new_state.as_ref().map(|s| s.state.as_str())
    }

    /// Matched before the deadline
    pub fn succeeded(&self) -> bool {
        self.matched && !self.timed_out
    }

    /// Short reason for log lines
    pub fn failure(&self) -> &'static str {
        if self.timed_out {
            "timed out"
        } else if !self.matched {
            "state mismatch"
        } else {
            "ok"
        }
    }
}

/// Wait for `entity_id` to report a transition
///
/// With `expected`, only a transition to that status counts; without it,
/// any transition does, whatever caused it. Two watches on one entity at
/// the same time will see each other's transitions. A feed that closes
/// early counts as a timeout.
pub async fn await_transition(
    mut tracker: StatusTracker,
    entity_id: &EntityId,
    expected: Option<&str>,
    timeout: Duration,
) -> CommandResult {
    let wait = async {
        while let Some(change) = tracker.next().await {
            if change.entity_id != *entity_id {
                continue;
            }
            if let Some(expected) = expected {
                if change.new_value() != Some(expected) {
                    continue;
                }
            }
            return Some(change);
        }
        None
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(Some(change)) => CommandResult {
            entity_id: entity_id.clone(),
            old_state: change.old_state,
            new_state: change.new_state,
            matched: true,
            timed_out: false,
        },
        Ok(None) | Err(_) => CommandResult::timed_out(entity_id.clone()),
    }
}

/// Issues commands and confirms them against the status feed
#[derive(Clone)]
pub struct StateWatcher {
    dispatcher: Arc<dyn CommandDispatcher>,
    feed: Arc<dyn StatusFeed>,
}

impl StateWatcher {
    pub fn new(dispatcher: Arc<dyn CommandDispatcher>, feed: Arc<dyn StatusFeed>) -> Self {
        Self { dispatcher, feed }
    }

    pub fn from_host(host: &Host) -> Self {
        Self::new(host.dispatcher.clone(), host.feed.clone())
    }

    /// Hand a command off without watching it
    pub fn issue(&self, command: Command) -> Result<(), DispatchError> {
        self.dispatcher.issue(command)
    }

    /// Subscribe to the target, issue `command`, then wait for the
    /// transition. The subscription ends on every exit path.
    #[instrument(skip(self, command), fields(entity_id = %command.target, service = %command.service_id()))]
    pub async fn observe_and_command(
        &self,
        command: Command,
        timeout: Duration,
        expected: Option<&str>,
    ) -> Result<CommandResult, DispatchError> {
        let entity_id = command.target.clone();
        let tracker = self.feed.track(std::slice::from_ref(&entity_id));

        self.dispatcher.issue(command)?;

        let result = await_transition(tracker, &entity_id, expected, timeout).await;
        debug!(
            matched = result.matched,
            timed_out = result.timed_out,
            new_value = ?result.new_value(),
            "Watch finished"
        );
        Ok(result)
    }
}
