//! Scene store manager
//!
//! Owns the map of all scenes. Saving captures and persists a scene,
//! applying replays it entity by entity, and every change to the set of
//! scenes is announced through the notifier.

use std::sync::{Arc, RwLock};

use futures::future::join_all;
use res_scene_core::{EntityId, SceneEvent};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::capture::SnapshotCapturer;
use crate::error::{DispatchError, PlanError, SceneError, SceneResult};
use crate::host::{Host, SceneStorage};
use crate::mapper::compute_commands;
use crate::options::{EngineSettings, FallbackPolicy, OptionsOverlay, RestoreOptions};
use crate::sequencer::CommandSequencer;
use crate::snapshot::{EntitySnapshot, SceneData, SceneMap};
use crate::watcher::StateWatcher;

pub struct SceneManager {
    host: Host,
    storage: Arc<dyn SceneStorage>,
    sequencer: CommandSequencer,
    capturer: SnapshotCapturer,
    settings: EngineSettings,
    scenes: Mutex<SceneMap>,
    user_options: RwLock<OptionsOverlay>,
}

impl SceneManager {
    pub fn new(
        host: Host,
        storage: Arc<dyn SceneStorage>,
        scenes: SceneMap,
        settings: EngineSettings,
    ) -> Self {
        let sequencer = CommandSequencer::new(
            StateWatcher::from_host(&host),
            RestoreOptions::default().action_timeout,
            settings.command_delay,
        );
        let capturer = SnapshotCapturer::new(host.status.clone(), sequencer.clone());

        Self {
            host,
            storage,
            sequencer,
            capturer,
            settings,
            scenes: Mutex::new(scenes),
            user_options: RwLock::new(OptionsOverlay::default()),
        }
    }

    /// Build a manager over the scenes currently in storage
    pub async fn load(
        host: Host,
        storage: Arc<dyn SceneStorage>,
        settings: EngineSettings,
    ) -> SceneResult<Self> {
        let scenes = storage.load().await?.unwrap_or_default();
        debug!(scenes = scenes.len(), "Loaded scene document");
        Ok(Self::new(host, storage, scenes, settings))
    }

    /// Announce every stored scene again
    pub async fn restore_all(&self) {
        let scenes = self.scenes.lock().await;
        for scene_id in scenes.keys() {
            self.host
                .notifier
                .publish(SceneEvent::Added(scene_id.clone()));
        }
        info!("Restored {} scenes", scenes.len());
    }

    /// Capture `entity_ids` into `scene_id`, replacing any previous scene
    ///
    /// `options` overrides the user options for this capture and is stored
    /// with the scene. If the document cannot be written the previous scene
    /// is put back and nothing is announced.
    #[instrument(skip(self, entity_ids, options), fields(entities = entity_ids.len()))]
    pub async fn save(
        &self,
        scene_id: &str,
        entity_ids: &[EntityId],
        options: Option<OptionsOverlay>,
    ) -> SceneResult<()> {
        let resolved = RestoreOptions::resolve(&self.get_user_options(), options.as_ref());
        let previous = self.scenes.lock().await.get(scene_id).cloned();

        let capture = self
            .capturer
            .capture(scene_id, entity_ids, &resolved, previous.as_ref())
            .await;

        if !capture.missing.is_empty() {
            if self.settings.fallback_policy == FallbackPolicy::Strict {
                warn!(missing = ?capture.missing, "Rejecting incomplete capture");
                return Err(SceneError::IncompleteCapture {
                    scene_id: scene_id.to_string(),
                    missing: capture.missing,
                });
            }
            warn!(missing = ?capture.missing, "Saving scene without some entities");
        }

        let scene = SceneData::new(capture.entities).with_overlay(options.as_ref());
        let count = scene.len();
        {
            let mut scenes = self.scenes.lock().await;
            let replaced = scenes.insert(scene_id.to_string(), scene);
            if let Err(e) = self.storage.save(&scenes).await {
                match replaced {
                    Some(previous) => {
                        scenes.insert(scene_id.to_string(), previous);
                    }
                    None => {
                        scenes.shift_remove(scene_id);
                    }
                }
                return Err(e.into());
            }
        }

        self.host
            .notifier
            .publish(SceneEvent::Added(scene_id.to_string()));
        info!("Saved scene '{}' with {} entities", scene_id, count);
        Ok(())
    }

    /// Replay a scene; false when it is unknown or a command could not be
    /// handed off
    ///
    /// Entities are restored concurrently and independently. Confirmation
    /// misses and skipped entities are logged without affecting the result.
    #[instrument(skip(self))]
    pub async fn apply(&self, scene_id: &str) -> bool {
        let Some(scene) = self.scenes.lock().await.get(scene_id).cloned() else {
            warn!("Scene not found");
            return false;
        };

        let overlay = scene.overlay(scene_id);
        let options = RestoreOptions::resolve(&self.get_user_options(), overlay.as_ref());

        let outcomes = join_all(
            scene
                .entities
                .iter()
                .map(|(entity_id, snapshot)| self.restore_entity(entity_id, snapshot, &options)),
        )
        .await;

        let mut success = true;
        for (entity_id, outcome) in scene.entities.keys().zip(outcomes) {
            if let Err(e) = outcome {
                success = false;
                error!(entity_id = %entity_id, "Failed to apply state: {}", e);
            }
        }

        if success {
            info!("Applied scene successfully");
        } else {
            warn!("Scene applied with errors");
        }
        success
    }

    async fn restore_entity(
        &self,
        entity_id: &EntityId,
        snapshot: &EntitySnapshot,
        options: &RestoreOptions,
    ) -> Result<(), DispatchError> {
        let usable = self
            .host
            .status
            .get_status(entity_id)
            .is_some_and(|state| state.is_usable());
        if !usable {
            warn!(entity_id = %entity_id, "{}", PlanError::UnusableTarget(entity_id.clone()));
            return Ok(());
        }

        let plan = match compute_commands(entity_id, snapshot, options) {
            Ok(plan) => plan,
            Err(e @ (PlanError::InvalidState { .. } | PlanError::UnknownMediaState { .. })) => {
                warn!(entity_id = %entity_id, "Skipping entity: {}", e);
                return Ok(());
            }
            Err(e) => {
                debug!(entity_id = %entity_id, "Skipping entity: {}", e);
                return Ok(());
            }
        };

        self.sequencer
            .run_plan(plan, options.action_timeout)
            .await
            .map(|_| ())
    }

    /// Remove a scene; `scene_removed` is published even if it was unknown
    #[instrument(skip(self))]
    pub async fn delete(&self, scene_id: &str) -> SceneResult<()> {
        {
            let mut scenes = self.scenes.lock().await;
            if let Some((index, key, scene)) = scenes.shift_remove_full(scene_id) {
                if let Err(e) = self.storage.save(&scenes).await {
                    scenes.shift_insert(index, key, scene);
                    return Err(e.into());
                }
                info!("Deleted scene");
            } else {
                warn!("Scene not found in store");
            }
        }

        self.host
            .notifier
            .publish(SceneEvent::Removed(scene_id.to_string()));
        Ok(())
    }

    /// Move a scene to a new id
    ///
    /// Nothing happens when `from` is unknown or `to` is blank. A `to` that
    /// names another existing scene is refused.
    #[instrument(skip(self))]
    pub async fn rename(&self, from: &str, to: &str) -> SceneResult<()> {
        let to = to.trim();
        if to.is_empty() {
            debug!("Empty rename target, nothing to do");
            return Ok(());
        }

        {
            let mut scenes = self.scenes.lock().await;
            let Some(index) = scenes.get_index_of(from) else {
                warn!("Scene to rename not found");
                return Ok(());
            };
            if to != from && scenes.contains_key(to) {
                warn!("Scene {} already exists, skipping rename from {}", to, from);
                return Err(SceneError::AlreadyExists(to.to_string()));
            }

            if let Some(scene) = scenes.shift_remove(from) {
                scenes.shift_insert(index, to.to_string(), scene);
            }
            if let Err(e) = self.storage.save(&scenes).await {
                if let Some(scene) = scenes.shift_remove(to) {
                    scenes.shift_insert(index, from.to_string(), scene);
                }
                return Err(e.into());
            }
        }

        self.host
            .notifier
            .publish(SceneEvent::Removed(from.to_string()));
        self.host
            .notifier
            .publish(SceneEvent::Added(to.to_string()));
        info!("Renamed scene");
        Ok(())
    }

    pub async fn get(&self, scene_id: &str) -> Option<SceneData> {
        self.scenes.lock().await.get(scene_id).cloned()
    }

    /// Scene ids, sorted
    pub async fn scene_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.scenes.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.scenes.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Replace the global user options
    pub fn set_user_options(&self, options: OptionsOverlay) {
        match self.user_options.write() {
            Ok(mut current) => *current = options,
            Err(poisoned) => *poisoned.into_inner() = options,
        }
    }

    /// A copy of the global user options
    pub fn get_user_options(&self) -> OptionsOverlay {
        match self.user_options.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}
