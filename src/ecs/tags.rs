use crate::engine_assert;
use bevy_ecs::entity::Entity;
use std::collections::HashMap;

/// Two-way entity/tag relation. Both maps are updated together by every method.
#[derive(Debug, Default)]
pub struct TagIndex {
    by_entity: HashMap<Entity, Vec<String>>,
    by_tag: HashMap<String, Vec<Entity>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding a tag the entity already has is an invariant violation and leaves the index unchanged.
    pub fn add(&mut self, entity: Entity, tag: &str) -> bool {
        if !engine_assert!(!self.has_tag(entity, tag), "[tags] entity {entity} already tagged '{tag}'") {
            return false;
        }
        self.by_entity.entry(entity).or_default().push(tag.to_string());
        self.by_tag.entry(tag.to_string()).or_default().push(entity);
        true
    }

    pub fn remove(&mut self, entity: Entity, tag: &str) -> bool {
        let Some(tags) = self.by_entity.get_mut(&entity) else {
            return false;
        };
        let Some(pos) = tags.iter().position(|t| t == tag) else {
            return false;
        };
        tags.remove(pos);
        if tags.is_empty() {
            self.by_entity.remove(&entity);
        }
        if let Some(entities) = self.by_tag.get_mut(tag) {
            entities.retain(|e| *e != entity);
            if entities.is_empty() {
                self.by_tag.remove(tag);
            }
        }
        true
    }

    /// Drops every tag of `entity`.
    pub fn remove_entity(&mut self, entity: Entity) {
        let Some(tags) = self.by_entity.remove(&entity) else {
            return;
        };
        for tag in tags {
            if let Some(entities) = self.by_tag.get_mut(&tag) {
                entities.retain(|e| *e != entity);
                if entities.is_empty() {
                    self.by_tag.remove(&tag);
                }
            }
        }
    }

    pub fn has_tag(&self, entity: Entity, tag: &str) -> bool {
        self.by_entity.get(&entity).is_some_and(|tags| tags.iter().any(|t| t == tag))
    }

    pub fn tags(&self, entity: Entity) -> &[String] {
        self.by_entity.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entities carrying `tag`, in tagging order.
    pub fn entities_with(&self, tag: &str) -> &[Entity] {
        self.by_tag.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first_with(&self, tag: &str) -> Option<Entity> {
        let found = self.entities_with(tag).first().copied();
        if found.is_none() {
            log::warn!("[tags] no entity tagged '{tag}'");
        }
        found
    }

    pub fn tag_count(&self) -> usize {
        self.by_tag.len()
    }

    pub fn clear(&mut self) {
        self.by_entity.clear();
        self.by_tag.clear();
    }
}
