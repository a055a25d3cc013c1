//! Ordered execution of one entity's commands
//!
//! Each step is fully resolved (matched, missed or timed out) before the
//! next one is issued. Different entities run their sequences side by side.

use std::time::Duration;

use res_scene_core::Command;
use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::mapper::PlannedCommand;
use crate::watcher::{CommandResult, StateWatcher};

/// One command plus how to confirm it
#[derive(Debug, Clone)]
pub struct SequenceStep {
    pub command: Command,
    pub expected: Option<String>,
    /// Falls back to the sequencer's timeout when unset
    pub timeout: Option<Duration>,
}

impl SequenceStep {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            expected: None,
            timeout: None,
        }
    }

    pub fn expect(mut self, status: impl Into<String>) -> Self {
        self.expected = Some(status.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Clone)]
pub struct CommandSequencer {
    watcher: StateWatcher,
    default_timeout: Duration,
    command_delay: Duration,
}

impl CommandSequencer {
    pub fn new(watcher: StateWatcher, default_timeout: Duration, command_delay: Duration) -> Self {
        Self {
            watcher,
            default_timeout,
            command_delay,
        }
    }

    pub fn watcher(&self) -> &StateWatcher {
        &self.watcher
    }

    /// Run steps strictly in order, confirming each one
    ///
    /// Stops at the first command that cannot be handed off.
    pub async fn run_sequence(
        &self,
        steps: Vec<SequenceStep>,
    ) -> Result<Vec<CommandResult>, DispatchError> {
        let mut results = Vec::with_capacity(steps.len());
        for step in steps {
            let timeout = step.timeout.unwrap_or(self.default_timeout);
            let result = self
                .watcher
                .observe_and_command(step.command, timeout, step.expected.as_deref())
                .await?;
            results.push(result);
        }
        Ok(results)
    }

    /// Run a restore plan for one entity
    ///
    /// Confirmed commands are watched with `timeout`; a miss is logged and
    /// the plan continues. Paced commands are only issued, with the command
    /// delay before the next one.
    pub async fn run_plan(
        &self,
        plan: Vec<PlannedCommand>,
        timeout: Duration,
    ) -> Result<Vec<CommandResult>, DispatchError> {
        let mut results = Vec::new();
        let mut plan = plan.into_iter().peekable();

        while let Some(planned) = plan.next() {
            match planned {
                PlannedCommand::Confirmed { command, expected } => {
                    let entity_id = command.target.clone();
                    let result = self
                        .watcher
                        .observe_and_command(command, timeout, Some(&expected))
                        .await?;
                    if !result.succeeded() {
                        warn!(
                            entity_id = %entity_id,
                            expected = %expected,
                            timeout = ?timeout,
                            "Failed to restore entity: {}",
                            result.failure()
                        );
                    }
                    results.push(result);
                }
                PlannedCommand::Paced(command) => {
                    debug!(entity_id = %command.target, service = %command.service_id(), "Issuing paced command");
                    self.watcher.issue(command)?;
                    if plan.peek().is_some() && !self.command_delay.is_zero() {
                        tokio::time::sleep(self.command_delay).await;
                    }
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Host;
    use res_scene_core::{Context, EntityId};
    use res_scene_hass::Hass;
    use std::collections::HashMap;

    fn id(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn setup() -> (Hass, CommandSequencer) {
        let hass = Hass::new(".");
        hass.install_virtual_devices(Duration::ZERO).unwrap();
        let watcher = StateWatcher::from_host(&Host::from_hass(&hass));
        let sequencer = CommandSequencer::new(watcher, Duration::from_secs(1), Duration::ZERO);
        (hass, sequencer)
    }

    #[tokio::test]
    async fn test_run_sequence_in_order() {
        let (hass, sequencer) = setup();
        let lamp = id("light.lamp");
        hass.states
            .set(lamp.clone(), "off", HashMap::new(), Context::new());

        let results = sequencer
            .run_sequence(vec![
                SequenceStep::new(Command::new("light", "turn_on", lamp.clone())).expect("on"),
                SequenceStep::new(Command::new("light", "turn_off", lamp.clone())).expect("off"),
            ])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].new_value(), Some("on"));
        assert_eq!(results[1].new_value(), Some("off"));
        assert!(results.iter().all(CommandResult::succeeded));
        assert_eq!(hass.bus.tracker_count(), 0);
    }

    #[tokio::test]
    async fn test_run_sequence_stops_on_dispatch_error() {
        let (hass, sequencer) = setup();
        let lamp = id("light.lamp");
        hass.states
            .set(lamp.clone(), "off", HashMap::new(), Context::new());

        let result = sequencer
            .run_sequence(vec![
                SequenceStep::new(Command::new("light", "blink", lamp.clone())),
                SequenceStep::new(Command::new("light", "turn_on", lamp.clone())).expect("on"),
            ])
            .await;

        assert!(matches!(result, Err(DispatchError::UnknownService(_))));
        assert_eq!(hass.states.get_state(&lamp).unwrap(), "off");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_plan_paces_commands() {
        let hass = Hass::new(".");
        hass.install_virtual_devices(Duration::ZERO).unwrap();
        let watcher = StateWatcher::from_host(&Host::from_hass(&hass));
        let sequencer =
            CommandSequencer::new(watcher, Duration::from_secs(1), Duration::from_secs(1));

        let thermostat = id("climate.hall");
        hass.states
            .set(thermostat.clone(), "off", HashMap::new(), Context::new());

        let started = tokio::time::Instant::now();
        let plan = vec![
            PlannedCommand::Paced(
                Command::new("climate", "set_hvac_mode", thermostat.clone()).with("hvac_mode", "heat"),
            ),
            PlannedCommand::Paced(
                Command::new("climate", "set_fan_mode", thermostat.clone()).with("fan_mode", "low"),
            ),
        ];
        let results = sequencer.run_plan(plan, Duration::from_secs(1)).await.unwrap();
        assert!(results.is_empty());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_secs(2));

        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        let state = hass.states.get(&thermostat).unwrap();
        assert_eq!(state.state, "heat");
        assert_eq!(state.attributes["fan_mode"], "low");
    }
}
