//! Entity registry
//!
//! Records which entities exist and how they are organized into areas and
//! labels. Scene creation expands areas and labels through it.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use indexmap::IndexMap;
use res_scene_core::EntityId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A registered entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEntry {
    pub entity_id: EntityId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,

    #[serde(default)]
    pub labels: HashSet<String>,
}

impl EntityEntry {
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            name: None,
            area_id: None,
            labels: HashSet::new(),
        }
    }

    pub fn with_area(mut self, area_id: impl Into<String>) -> Self {
        self.area_id = Some(area_id.into());
        self
    }

    pub fn with_label(mut self, label_id: impl Into<String>) -> Self {
        self.labels.insert(label_id.into());
        self
    }
}

/// Entity registry indexed by id, area and label
///
/// Entries are stored as `Arc<EntityEntry>`; reads never clone the entry.
/// The primary index keeps registration order.
pub struct EntityRegistry {
    by_entity_id: RwLock<IndexMap<EntityId, Arc<EntityEntry>>>,
    by_area_id: DashMap<String, HashSet<EntityId>>,
    by_label_id: DashMap<String, HashSet<EntityId>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            by_entity_id: RwLock::new(IndexMap::new()),
            by_area_id: DashMap::new(),
            by_label_id: DashMap::new(),
        }
    }

    /// Register an entry, replacing any previous entry for the same entity
    pub fn register(&self, entry: EntityEntry) -> Arc<EntityEntry> {
        if let Some(previous) = self.get(&entry.entity_id) {
            self.unindex(&previous);
        }

        let entry = Arc::new(entry);
        if let Some(area_id) = &entry.area_id {
            self.by_area_id
                .entry(area_id.clone())
                .or_default()
                .insert(entry.entity_id.clone());
        }
        for label_id in &entry.labels {
            self.by_label_id
                .entry(label_id.clone())
                .or_default()
                .insert(entry.entity_id.clone());
        }
        if let Ok(mut idx) = self.by_entity_id.write() {
            idx.insert(entry.entity_id.clone(), entry.clone());
        }

        debug!(entity_id = %entry.entity_id, "Registered entity");
        entry
    }

    fn unindex(&self, entry: &EntityEntry) {
        if let Some(area_id) = &entry.area_id {
            if let Some(mut ids) = self.by_area_id.get_mut(area_id) {
                ids.remove(&entry.entity_id);
            }
        }
        for label_id in &entry.labels {
            if let Some(mut ids) = self.by_label_id.get_mut(label_id) {
                ids.remove(&entry.entity_id);
            }
        }
        if let Ok(mut idx) = self.by_entity_id.write() {
            idx.shift_remove(&entry.entity_id);
        }
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<Arc<EntityEntry>> {
        self.by_entity_id
            .read()
            .ok()
            .and_then(|idx| idx.get(entity_id).cloned())
    }

    pub fn remove(&self, entity_id: &EntityId) -> Option<Arc<EntityEntry>> {
        let entry = self.get(entity_id)?;
        self.unindex(&entry);
        Some(entry)
    }

    pub fn is_registered(&self, entity_id: &EntityId) -> bool {
        self.get(entity_id).is_some()
    }

    /// Entities assigned to an area, sorted
    pub fn entities_for_area(&self, area_id: &str) -> Vec<EntityId> {
        sorted(self.by_area_id.get(area_id).map(|ids| ids.clone()))
    }

    /// Entities carrying a label, sorted
    pub fn entities_with_label(&self, label_id: &str) -> Vec<EntityId> {
        sorted(self.by_label_id.get(label_id).map(|ids| ids.clone()))
    }

    /// All entity ids in registration order
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.by_entity_id
            .read()
            .map(|idx| idx.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_entity_id.read().map(|idx| idx.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sorted(ids: Option<HashSet<EntityId>>) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = ids.unwrap_or_default().into_iter().collect();
    ids.sort();
    ids
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
