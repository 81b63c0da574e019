use super::physics::PhysicsWorld;
use super::store::{ComponentSet, ComponentStore};
use super::systems::{self, System, SystemRegistry};
use super::tags::TagIndex;
use super::types::{NativeScriptComponent, RigidBody, ScriptedObjectComponent, Sprite, Transform};
use crate::assets::{TextureCache, TextureHandle, TextureLoader};
use crate::config::EngineConfig;
use crate::engine_assert;
use crate::input::Input;
use crate::renderer::RenderQueue;
use anyhow::{anyhow, Context, Result};
use bevy_ecs::component::ComponentId;
use bevy_ecs::prelude::*;
use bevy_ecs::query::{QueryData, ROQueryItem, ReadOnlyQueryData};

/// A component type the scene knows how to finish attaching.
///
/// `on_added` runs right after the value is stored, so side effects such as texture loading stay out of
/// the constructor and their failures surface from [`SceneWorld::add`].
pub trait SceneComponent: Component + Sized {
    fn on_added(_world: &mut SceneWorld, _entity: Entity) -> Result<()> {
        Ok(())
    }
}

impl SceneComponent for Transform {}
impl SceneComponent for RigidBody {}
impl SceneComponent for NativeScriptComponent {}
impl SceneComponent for ScriptedObjectComponent {}

impl SceneComponent for Sprite {
    fn on_added(world: &mut SceneWorld, entity: Entity) -> Result<()> {
        let path = match world.store.get::<Sprite>(entity) {
            Some(sprite) if sprite.texture.is_none() => sprite.path.clone(),
            _ => return Ok(()),
        };
        let texture = world.load_texture(&path)?;
        if let Some(sprite) = world.store.get_mut::<Sprite>(entity) {
            sprite.texture = texture;
        }
        Ok(())
    }
}

pub type RemovalHook = fn(&mut SceneWorld, Entity);

/// Everything systems operate on: components, tags, textures and input.
pub struct SceneWorld {
    pub store: ComponentStore,
    pub tags: TagIndex,
    pub textures: TextureCache,
    pub input: Input,
    removal_hooks: Vec<(ComponentId, RemovalHook)>,
}

impl Default for SceneWorld {
    fn default() -> Self {
        Self::new(TextureCache::default())
    }
}

impl SceneWorld {
    pub fn new(textures: TextureCache) -> Self {
        let mut world = Self {
            store: ComponentStore::new(),
            tags: TagIndex::new(),
            textures,
            input: Input::new(),
            removal_hooks: Vec::new(),
        };
        // Bodies go first so contact-end still reaches scripts that are about to be unbound.
        world.register_removal_hook::<RigidBody>(systems::physics::detach_entity);
        world.register_removal_hook::<NativeScriptComponent>(systems::native_script::unbind);
        world.register_removal_hook::<ScriptedObjectComponent>(systems::scripted_object::unbind);
        world
    }

    /// Runs `hook` whenever a `T` leaves an entity, before the value is dropped.
    pub fn register_removal_hook<T: Component>(&mut self, hook: RemovalHook) {
        let id = self.store.component_id::<T>();
        self.removal_hooks.push((id, hook));
    }

    pub fn create_entity(&mut self, tags: &[&str]) -> Entity {
        let entity = self.store.spawn();
        self.store.add(entity, Transform::default());
        for tag in tags {
            self.tags.add(entity, tag);
        }
        entity
    }

    /// Runs removal hooks for every hooked component, drops the tags and frees the identifier.
    pub fn destroy_entity(&mut self, entity: Entity) {
        if !self.is_valid(entity) {
            log::warn!("[scene] destroy of stale entity {entity}");
            return;
        }
        for (id, hook) in self.removal_hooks.clone() {
            if self.store.has_component_id(entity, id) {
                hook(self, entity);
            }
        }
        self.tags.remove_entity(entity);
        self.store.despawn(entity);
    }

    pub fn is_valid(&self, entity: Entity) -> bool {
        self.store.contains_entity(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.store.len()
    }

    /// Attaches `component` and runs its post-add step. If that step fails the component is removed
    /// again and the error returned.
    pub fn add<T: SceneComponent>(&mut self, entity: Entity, component: T) -> Result<&mut T> {
        if !engine_assert!(self.is_valid(entity), "[scene] add to stale entity {entity}") {
            return Err(anyhow!("Entity {entity} does not exist"));
        }
        let fresh = !self.store.has::<T>(entity);
        self.store.add(entity, component);
        if fresh {
            if let Err(err) = T::on_added(self, entity) {
                self.store.remove::<T>(entity);
                return Err(err).with_context(|| {
                    format!("Adding {} to {entity}", std::any::type_name::<T>())
                });
            }
        }
        self.store.get_mut::<T>(entity).ok_or_else(|| anyhow!("Component vanished from {entity}"))
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> bool {
        self.remove_all::<(T,)>(entity)
    }

    /// Removes every type in `S` the entity has. Removal hooks run first, once per hooked type, in
    /// hook registration order.
    pub fn remove_all<S: ComponentSet>(&mut self, entity: Entity) -> bool {
        if !self.store.has_any::<S>(entity) {
            return false;
        }
        let ids = self.store.component_ids::<S>();
        for (hook_id, hook) in self.removal_hooks.clone() {
            if ids.contains(&hook_id) && self.store.has_component_id(entity, hook_id) {
                hook(self, entity);
            }
        }
        self.store.remove::<S>(entity)
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.store.get::<T>(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.store.get_mut::<T>(entity)
    }

    /// Several components of one entity at once, e.g. `fetch::<(&Transform, &Sprite)>(e)`. `None`
    /// unless the entity has all of them.
    pub fn fetch<D: ReadOnlyQueryData>(&mut self, entity: Entity) -> Option<ROQueryItem<'_, D>> {
        self.store.fetch::<D>(entity)
    }

    pub fn fetch_mut<D: QueryData>(&mut self, entity: Entity) -> Option<D::Item<'_>> {
        self.store.fetch_mut::<D>(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.store.has::<T>(entity)
    }

    pub fn has_all<S: ComponentSet>(&self, entity: Entity) -> bool {
        self.store.has_all::<S>(entity)
    }

    pub fn has_any<S: ComponentSet>(&self, entity: Entity) -> bool {
        self.store.has_any::<S>(entity)
    }

    pub fn view<S: ComponentSet>(&mut self) -> Vec<Entity> {
        self.store.view::<S>()
    }

    pub fn add_tag(&mut self, entity: Entity, tag: &str) -> bool {
        self.tags.add(entity, tag)
    }

    pub fn remove_tag(&mut self, entity: Entity, tag: &str) -> bool {
        self.tags.remove(entity, tag)
    }

    pub fn has_tag(&self, entity: Entity, tag: &str) -> bool {
        self.tags.has_tag(entity, tag)
    }

    pub fn entities_by_tag(&self, tag: &str) -> Vec<Entity> {
        self.tags.entities_with(tag).to_vec()
    }

    pub fn entity_by_tag(&self, tag: &str) -> Option<Entity> {
        self.tags.first_with(tag)
    }

    /// Loads through the cache. The undefined path yields `Ok(None)`.
    pub fn load_texture(&mut self, path: &str) -> Result<Option<TextureHandle>> {
        self.textures.load(path)
    }

    pub fn physics(&self) -> Option<&PhysicsWorld> {
        self.store.resource::<PhysicsWorld>()
    }

    pub fn physics_mut(&mut self) -> Option<&mut PhysicsWorld> {
        self.store.resource_mut::<PhysicsWorld>()
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.tags.clear();
        self.textures.clear();
    }
}

/// Entity store plus the systems that run over it every frame.
pub struct Scene {
    name: String,
    world: SceneWorld,
    systems: SystemRegistry,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_textures(name, TextureCache::default())
    }

    pub fn with_texture_loader(name: impl Into<String>, loader: impl TextureLoader + 'static) -> Self {
        Self::with_textures(name, TextureCache::new(loader))
    }

    pub fn with_textures(name: impl Into<String>, textures: TextureCache) -> Self {
        Self { name: name.into(), world: SceneWorld::new(textures), systems: SystemRegistry::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut SceneWorld {
        &mut self.world
    }

    pub fn create_entity(&mut self, tags: &[&str]) -> Entity {
        self.world.create_entity(tags)
    }

    pub fn destroy_entity(&mut self, entity: Entity) {
        self.world.destroy_entity(entity);
    }

    pub fn entity_valid(&self, entity: Entity) -> bool {
        self.world.is_valid(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.world.entity_count()
    }

    pub fn add<T: SceneComponent>(&mut self, entity: Entity, component: T) -> Result<&mut T> {
        self.world.add(entity, component)
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> bool {
        self.world.remove::<T>(entity)
    }

    pub fn remove_all<S: ComponentSet>(&mut self, entity: Entity) -> bool {
        self.world.remove_all::<S>(entity)
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.world.get::<T>(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.world.get_mut::<T>(entity)
    }

    pub fn fetch<D: ReadOnlyQueryData>(&mut self, entity: Entity) -> Option<ROQueryItem<'_, D>> {
        self.world.fetch::<D>(entity)
    }

    pub fn fetch_mut<D: QueryData>(&mut self, entity: Entity) -> Option<D::Item<'_>> {
        self.world.fetch_mut::<D>(entity)
    }

    pub fn has_all<S: ComponentSet>(&self, entity: Entity) -> bool {
        self.world.has_all::<S>(entity)
    }

    pub fn has_any<S: ComponentSet>(&self, entity: Entity) -> bool {
        self.world.has_any::<S>(entity)
    }

    pub fn view<S: ComponentSet>(&mut self) -> Vec<Entity> {
        self.world.view::<S>()
    }

    pub fn add_tag(&mut self, entity: Entity, tag: &str) -> bool {
        self.world.add_tag(entity, tag)
    }

    pub fn remove_tag(&mut self, entity: Entity, tag: &str) -> bool {
        self.world.remove_tag(entity, tag)
    }

    pub fn has_tag(&self, entity: Entity, tag: &str) -> bool {
        self.world.has_tag(entity, tag)
    }

    pub fn tags(&self, entity: Entity) -> &[String] {
        self.world.tags.tags(entity)
    }

    pub fn entities_by_tag(&self, tag: &str) -> Vec<Entity> {
        self.world.entities_by_tag(tag)
    }

    pub fn entity_by_tag(&self, tag: &str) -> Option<Entity> {
        self.world.entity_by_tag(tag)
    }

    pub fn load_texture(&mut self, path: &str) -> Result<Option<TextureHandle>> {
        self.world.load_texture(path)
    }

    pub fn input(&self) -> &Input {
        &self.world.input
    }

    pub fn input_mut(&mut self) -> &mut Input {
        &mut self.world.input
    }

    pub fn add_system<T: System>(&mut self, system: T) -> &mut T {
        self.systems.add(system)
    }

    pub fn remove_system<T: System>(&mut self) -> Option<T> {
        self.systems.remove::<T>()
    }

    pub fn get_system<T: System>(&self) -> Option<&T> {
        self.systems.get::<T>()
    }

    pub fn get_system_mut<T: System>(&mut self) -> Option<&mut T> {
        self.systems.get_mut::<T>()
    }

    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    /// Physics, render, native scripts, scripted objects: physics settles positions before anything
    /// reads them.
    pub fn add_default_systems(&mut self, config: &EngineConfig) {
        self.add_system(systems::PhysicsSystem::new(config.physics.clone()));
        self.add_system(systems::RenderSystem::new());
        self.add_system(systems::NativeScriptSystem::new());
        self.add_system(systems::ScriptedObjectSystem::new(&config.scripts));
    }

    pub fn init(&mut self) -> Result<()> {
        self.systems.init(&mut self.world)
    }

    pub fn update(&mut self, dt: f32) -> Result<()> {
        self.systems.update(&mut self.world, dt)
    }

    pub fn render(&mut self, queue: &mut RenderQueue) -> Result<()> {
        self.systems.render(&mut self.world, queue)
    }

    /// Tears down every system first, then clears components, tags and textures.
    pub fn destroy(&mut self) -> Result<()> {
        let result = self.systems.destroy(&mut self.world);
        self.world.clear();
        result
    }
}
