//! Snapshot capture
//!
//! Most entities are recorded straight from their live state. Lights that
//! are off only reveal their color and brightness while on, so with
//! `restore_light_attributes` they are briefly switched on, read and
//! switched back off. Those probes run concurrently, one per light.
//! Anything that ends up without a usable snapshot may fall back to what
//! the same scene stored for it last time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use indexmap::IndexMap;
use res_scene_core::{Command, Domain, EntityId, STATE_OFF, STATE_ON, STATE_UNAVAILABLE};
use tracing::{debug, info, instrument, warn};

use crate::host::StatusSource;
use crate::options::RestoreOptions;
use crate::sequencer::{CommandSequencer, SequenceStep};
use crate::snapshot::{EntitySnapshot, SceneData};

/// Result of one capture round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capture {
    /// Snapshots in request order
    pub entities: IndexMap<EntityId, EntitySnapshot>,
    /// Restorable entities that ended up without a snapshot
    pub missing: Vec<EntityId>,
}

pub struct SnapshotCapturer {
    status: Arc<dyn StatusSource>,
    sequencer: CommandSequencer,
}

impl SnapshotCapturer {
    pub fn new(status: Arc<dyn StatusSource>, sequencer: CommandSequencer) -> Self {
        Self { status, sequencer }
    }

    /// Snapshot `entity_ids`, reusing `previous` (the scene being replaced)
    /// for entities that could not be captured now
    #[instrument(skip(self, entity_ids, options, previous), fields(entities = entity_ids.len()))]
    pub async fn capture(
        &self,
        scene_id: &str,
        entity_ids: &[EntityId],
        options: &RestoreOptions,
        previous: Option<&SceneData>,
    ) -> Capture {
        let mut seen = HashSet::new();
        let requested: Vec<&EntityId> = entity_ids
            .iter()
            .filter(|id| seen.insert(*id))
            .filter(|id| {
                let restorable = id.kind().is_restorable();
                if !restorable {
                    warn!(entity_id = %id, "Domain {} is not supported in scenes", id.domain());
                }
                restorable
            })
            .collect();

        let mut captured: HashMap<EntityId, EntitySnapshot> = HashMap::new();
        let mut probes = Vec::new();
        for &entity_id in &requested {
            let Some(state) = self.status.get_status(entity_id) else {
                debug!(entity_id = %entity_id, "No live state");
                continue;
            };
            if options.restore_light_attributes
                && entity_id.kind() == Domain::Light
                && state.state == STATE_OFF
            {
                probes.push(entity_id);
            } else {
                captured.insert(entity_id.clone(), EntitySnapshot::from_state(&state));
            }
        }

        let probed = join_all(
            probes
                .iter()
                .map(|id| self.probe_light(id, options.action_timeout)),
        )
        .await;
        for (entity_id, snapshot) in probes.into_iter().zip(probed) {
            if let Some(snapshot) = snapshot {
                captured.insert(entity_id.clone(), snapshot);
            }
        }

        for &entity_id in &requested {
            let usable = captured
                .get(entity_id)
                .is_some_and(|s| s.status != STATE_UNAVAILABLE);
            if usable {
                continue;
            }

            let fallback = previous
                .and_then(|scene| scene.get(entity_id))
                .filter(|prev| prev.is_valid_fallback());
            match fallback {
                Some(prev) => {
                    info!(entity_id = %entity_id, scene_id, "Using previous snapshot (current state unavailable)");
                    captured.insert(entity_id.clone(), prev.clone());
                }
                None => {
                    captured.remove(entity_id);
                    warn!(entity_id = %entity_id, scene_id, "No usable state or previous snapshot, leaving entity out");
                }
            }
        }

        let mut capture = Capture::default();
        for entity_id in requested {
            match captured.remove(entity_id) {
                Some(snapshot) => {
                    capture.entities.insert(entity_id.clone(), snapshot);
                }
                None => capture.missing.push(entity_id.clone()),
            }
        }
        capture
    }

    /// Switch an off light on and back off, keeping the attributes it
    /// reported while on. The recorded status stays "off".
    async fn probe_light(&self, entity_id: &EntityId, timeout: Duration) -> Option<EntitySnapshot> {
        let turn_on = Command::new("light", "turn_on", entity_id.clone()).with("transition", 0);
        let turn_off = Command::new("light", "turn_off", entity_id.clone()).with("transition", 0);
        let steps = vec![
            SequenceStep::new(turn_on)
                .expect(STATE_ON)
                .with_timeout(timeout),
            SequenceStep::new(turn_off)
                .expect(STATE_OFF)
                .with_timeout(timeout),
        ];

        let results = match self.sequencer.run_sequence(steps).await {
            Ok(results) => results,
            Err(e) => {
                warn!(entity_id = %entity_id, "Failed to capture light attributes: {}", e);
                return None;
            }
        };

        let turned_on = results.first()?;
        if !turned_on.succeeded() {
            warn!(
                entity_id = %entity_id,
                "Failed to capture light attributes: turn_on {}",
                turned_on.failure()
            );
            return None;
        }
        if let Some(turned_off) = results.get(1).filter(|r| !r.succeeded()) {
            warn!(
                entity_id = %entity_id,
                "Light did not return to off after capture: {}",
                turned_off.failure()
            );
        }

        let state = turned_on.new_state.as_ref()?;
        Some(EntitySnapshot::with_status(state, STATE_OFF))
    }
}
