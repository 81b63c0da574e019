use crate::engine_assert;
use bevy_ecs::component::ComponentId;
use bevy_ecs::prelude::*;
use bevy_ecs::query::{QueryData, QueryFilter, ReadOnlyQueryData, ROQueryItem};
use bevy_ecs::world::EntityRef;

/// A fixed list of component types, written as a tuple: `(Transform,)`, `(Transform, Sprite)`, ...
pub trait ComponentSet: Bundle {
    type Filter: QueryFilter;

    fn all_present(entity: &EntityRef<'_>) -> bool;
    fn any_present(entity: &EntityRef<'_>) -> bool;
    fn component_ids(world: &mut World) -> Vec<ComponentId>;
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            type Filter = ($(With<$name>,)+);

            fn all_present(entity: &EntityRef<'_>) -> bool {
                $(entity.contains::<$name>())&&+
            }

            fn any_present(entity: &EntityRef<'_>) -> bool {
                $(entity.contains::<$name>())||+
            }

            fn component_ids(world: &mut World) -> Vec<ComponentId> {
                vec![$(world.register_component::<$name>()),+]
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);

/// Per-type component storage keyed by entity, backed by a `bevy_ecs` world.
pub struct ComponentStore {
    world: World,
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentStore {
    pub fn new() -> Self {
        Self { world: World::new() }
    }

    pub fn spawn(&mut self) -> Entity {
        self.world.spawn_empty().id()
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.world.despawn(entity)
    }

    pub fn contains_entity(&self, entity: Entity) -> bool {
        self.world.get_entity(entity).is_ok()
    }

    pub fn len(&self) -> usize {
        self.world.entities().len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live entities in ascending index order.
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.world.iter_entities().map(|entity| entity.id()).collect();
        entities.sort_by_key(|entity| entity.index());
        entities
    }

    /// Attaches `component`. Adding a type the entity already has is an invariant violation; outside
    /// debug builds the existing value is kept.
    pub fn add<T: Component>(&mut self, entity: Entity, component: T) -> Option<&mut T> {
        let Ok(mut entity_mut) = self.world.get_entity_mut(entity) else {
            engine_assert!(false, "[ecs] add {} to dead entity {entity}", std::any::type_name::<T>());
            return None;
        };
        if engine_assert!(
            !entity_mut.contains::<T>(),
            "[ecs] entity {entity} already has {}",
            std::any::type_name::<T>()
        ) {
            entity_mut.insert(component);
        }
        entity_mut.into_mut::<T>().map(Mut::into_inner)
    }

    /// Attaches or replaces `component` without the duplicate check.
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> bool {
        match self.world.get_entity_mut(entity) {
            Ok(mut entity_mut) => {
                entity_mut.insert(component);
                true
            }
            Err(_) => false,
        }
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.world.get::<T>(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.world.get_mut::<T>(entity).map(Mut::into_inner)
    }

    /// Fetches several components at once, e.g. `fetch::<(&Transform, &Sprite)>(e)`.
    pub fn fetch<D: ReadOnlyQueryData>(&mut self, entity: Entity) -> Option<ROQueryItem<'_, D>> {
        let mut state = self.world.query::<D>();
        state.get(&self.world, entity).ok()
    }

    pub fn fetch_mut<D: QueryData>(&mut self, entity: Entity) -> Option<D::Item<'_>> {
        let mut state = self.world.query::<D>();
        state.get_mut(&mut self.world, entity).ok()
    }

    /// Removes every component type in `B` that the entity has.
    pub fn remove<B: Bundle>(&mut self, entity: Entity) -> bool {
        match self.world.get_entity_mut(entity) {
            Ok(mut entity_mut) => {
                entity_mut.remove::<B>();
                true
            }
            Err(_) => false,
        }
    }

    pub fn take<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.world.get_entity_mut(entity).ok()?.take::<T>()
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.world.get_entity(entity).map(|entity| entity.contains::<T>()).unwrap_or(false)
    }

    pub fn has_all<S: ComponentSet>(&self, entity: Entity) -> bool {
        self.world.get_entity(entity).map(|entity| S::all_present(&entity)).unwrap_or(false)
    }

    pub fn has_any<S: ComponentSet>(&self, entity: Entity) -> bool {
        self.world.get_entity(entity).map(|entity| S::any_present(&entity)).unwrap_or(false)
    }

    pub fn has_component_id(&self, entity: Entity, id: ComponentId) -> bool {
        self.world.get_entity(entity).map(|entity| entity.contains_id(id)).unwrap_or(false)
    }

    /// Entities holding every type in `S`, snapshotted so callers can mutate while walking it.
    pub fn view<S: ComponentSet>(&mut self) -> Vec<Entity> {
        let mut state = self.world.query_filtered::<Entity, S::Filter>();
        state.iter(&self.world).collect()
    }

    pub fn component_id<T: Component>(&mut self) -> ComponentId {
        self.world.register_component::<T>()
    }

    pub fn component_ids<S: ComponentSet>(&mut self) -> Vec<ComponentId> {
        <S as ComponentSet>::component_ids(&mut self.world)
    }

    pub fn clear(&mut self) {
        self.world.clear_entities();
    }

    pub fn insert_resource<R: Resource>(&mut self, resource: R) {
        self.world.insert_resource(resource);
    }

    pub fn remove_resource<R: Resource>(&mut self) -> Option<R> {
        self.world.remove_resource::<R>()
    }

    pub fn has_resource<R: Resource>(&self) -> bool {
        self.world.contains_resource::<R>()
    }

    pub fn resource<R: Resource>(&self) -> Option<&R> {
        self.world.get_resource::<R>()
    }

    pub fn resource_mut<R: Resource>(&mut self) -> Option<&mut R> {
        self.world.get_resource_mut::<R>().map(Mut::into_inner)
    }

    /// Runs `f` with the resource lifted out of the world, so components can be borrowed alongside it.
    pub fn resource_scope<R: Resource, U>(&mut self, f: impl FnOnce(&mut World, Mut<R>) -> U) -> Option<U> {
        if !self.world.contains_resource::<R>() {
            return None;
        }
        Some(self.world.resource_scope(f))
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}
