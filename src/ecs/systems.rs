use super::world::SceneWorld;
use crate::engine_assert;
use crate::renderer::RenderQueue;
use anyhow::Result;
use std::any::{type_name, Any, TypeId};

pub(crate) mod native_script;
pub(crate) mod physics;
mod render;
pub(crate) mod scripted_object;

pub use native_script::NativeScriptSystem;
pub use physics::PhysicsSystem;
pub use render::RenderSystem;
pub use scripted_object::ScriptedObjectSystem;

pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Per-frame logic over a [`SceneWorld`]. Every hook defaults to doing nothing.
pub trait System: AsAny {
    fn init(&mut self, _world: &mut SceneWorld) -> Result<()> {
        Ok(())
    }

    fn destroy(&mut self, _world: &mut SceneWorld) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, _world: &mut SceneWorld, _dt: f32) -> Result<()> {
        Ok(())
    }

    fn render(&mut self, _world: &mut SceneWorld, _queue: &mut RenderQueue) -> Result<()> {
        Ok(())
    }
}

struct Entry {
    type_id: TypeId,
    name: &'static str,
    system: Box<dyn System>,
}

/// At most one system per type, called in insertion order.
#[derive(Default)]
pub struct SystemRegistry {
    entries: Vec<Entry>,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering a second system of the same type is an invariant violation; the first one is kept.
    pub fn add<T: System>(&mut self, system: T) -> &mut T {
        let index = match self.position::<T>() {
            Some(index) => {
                engine_assert!(false, "[systems] {} already registered", type_name::<T>());
                index
            }
            None => {
                self.entries.push(Entry { type_id: TypeId::of::<T>(), name: type_name::<T>(), system: Box::new(system) });
                self.entries.len() - 1
            }
        };
        match (*self.entries[index].system).as_any_mut().downcast_mut::<T>() {
            Some(system) => system,
            None => unreachable!("system entry type mismatch"),
        }
    }

    pub fn remove<T: System>(&mut self) -> Option<T> {
        let Some(index) = self.position::<T>() else {
            engine_assert!(false, "[systems] {} is not registered", type_name::<T>());
            return None;
        };
        let entry = self.entries.remove(index);
        entry.system.into_any().downcast::<T>().ok().map(|system| *system)
    }

    pub fn get<T: System>(&self) -> Option<&T> {
        let index = self.position::<T>()?;
        (*self.entries[index].system).as_any().downcast_ref::<T>()
    }

    pub fn get_mut<T: System>(&mut self) -> Option<&mut T> {
        let index = self.position::<T>()?;
        (*self.entries[index].system).as_any_mut().downcast_mut::<T>()
    }

    pub fn contains<T: System>(&self) -> bool {
        self.position::<T>().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Type names in call order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    fn position<T: System>(&self) -> Option<usize> {
        let id = TypeId::of::<T>();
        self.entries.iter().position(|entry| entry.type_id == id)
    }

    pub fn init(&mut self, world: &mut SceneWorld) -> Result<()> {
        for entry in &mut self.entries {
            entry.system.init(world)?;
        }
        Ok(())
    }

    pub fn update(&mut self, world: &mut SceneWorld, dt: f32) -> Result<()> {
        for entry in &mut self.entries {
            entry.system.update(world, dt)?;
        }
        Ok(())
    }

    pub fn render(&mut self, world: &mut SceneWorld, queue: &mut RenderQueue) -> Result<()> {
        for entry in &mut self.entries {
            entry.system.render(world, queue)?;
        }
        Ok(())
    }

    /// Every system gets its teardown even if an earlier one failed; the first error is returned.
    pub fn destroy(&mut self, world: &mut SceneWorld) -> Result<()> {
        let mut first_error = None;
        for entry in &mut self.entries {
            if let Err(err) = entry.system.destroy(world) {
                log::error!("[systems] {} destroy failed: {err:?}", entry.name);
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct First(Log);
    struct Second(Log);

    impl System for First {
        fn update(&mut self, _world: &mut SceneWorld, _dt: f32) -> Result<()> {
            self.0.lock().unwrap().push("first");
            Ok(())
        }
    }

    impl System for Second {
        fn update(&mut self, _world: &mut SceneWorld, _dt: f32) -> Result<()> {
            self.0.lock().unwrap().push("second");
            Ok(())
        }
    }

    struct Counter(u32);
    impl System for Counter {}

    #[test]
    fn calls_follow_insertion_order() {
        let log: Log = Arc::default();
        let mut registry = SystemRegistry::new();
        registry.add(Second(log.clone()));
        registry.add(First(log.clone()));
        let mut world = SceneWorld::default();
        registry.update(&mut world, 0.016).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
    }

    #[test]
    fn typed_lookup_and_removal() {
        let mut registry = SystemRegistry::new();
        registry.add(Counter(1)).0 += 1;
        assert_eq!(registry.get::<Counter>().map(|c| c.0), Some(2));
        registry.get_mut::<Counter>().unwrap().0 = 9;
        assert!(registry.get::<First>().is_none());
        let removed = registry.remove::<Counter>().unwrap();
        assert_eq!(removed.0, 9);
        assert!(registry.is_empty());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "already registered"))]
    fn duplicate_system_is_rejected() {
        let mut registry = SystemRegistry::new();
        registry.add(Counter(1));
        let kept = registry.add(Counter(5)).0;
        assert_eq!(kept, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "is not registered"))]
    fn removing_missing_system_is_rejected() {
        let mut registry = SystemRegistry::new();
        assert!(registry.remove::<Counter>().is_none());
    }
}
