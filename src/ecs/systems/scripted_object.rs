use super::System;
use crate::config::ScriptConfig;
use crate::ecs::types::ScriptedObjectComponent;
use crate::ecs::world::SceneWorld;
use crate::input::Input;
use crate::scripts::{build_engine, RhaiScript, ScriptContext, ScriptedObject};
use anyhow::{Context, Result};
use bevy_ecs::prelude::*;
use rhai::Engine;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Binds, initializes and updates rhai-backed scripted objects.
pub struct ScriptedObjectSystem {
    engine: Arc<Engine>,
    root: PathBuf,
    input: Arc<Mutex<Input>>,
    failed: HashSet<Entity>,
    last_error: Option<String>,
}

impl Default for ScriptedObjectSystem {
    fn default() -> Self {
        Self::new(&ScriptConfig::default())
    }
}

impl ScriptedObjectSystem {
    pub fn new(config: &ScriptConfig) -> Self {
        let input = Arc::new(Mutex::new(Input::new()));
        let engine = Arc::new(build_engine(input.clone()));
        Self { engine, root: config.root.clone(), input, failed: HashSet::new(), last_error: None }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn engine(&self) -> Arc<Engine> {
        self.engine.clone()
    }

    /// Most recent script that could not be loaded.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn refresh_input(&self, world: &SceneWorld) {
        if let Ok(mut snapshot) = self.input.lock() {
            *snapshot = world.input.clone();
        }
    }

    /// Presses consumed by scripts since the last refresh are consumed for the whole scene.
    fn commit_input(&self, world: &mut SceneWorld) {
        if let Ok(snapshot) = self.input.lock() {
            world.input.keep_unconsumed(&snapshot);
        }
    }

    /// Compiles the component's script if nothing is bound yet. Failures are logged once per entity.
    fn bind(&mut self, world: &mut SceneWorld, entity: Entity) {
        if self.failed.contains(&entity) {
            return;
        }
        let path = match world.get::<ScriptedObjectComponent>(entity) {
            Some(component) if !component.is_bound() && !component.script_path.is_empty() => {
                self.root.join(&component.script_path)
            }
            _ => return,
        };
        match RhaiScript::load(self.engine.clone(), &path) {
            Ok(script) => {
                if let Some(component) = world.get_mut::<ScriptedObjectComponent>(entity) {
                    component.bind_instance(Box::new(script));
                }
                log::debug!("[script] bound {} to {entity}", path.display());
            }
            Err(err) => {
                log::error!("[script] {err:#}");
                self.last_error = Some(format!("{err:#}"));
                self.failed.insert(entity);
            }
        }
    }

    fn init_entity(&mut self, world: &mut SceneWorld, entity: Entity) -> Result<()> {
        self.bind(world, entity);
        let pending = world
            .get::<ScriptedObjectComponent>(entity)
            .is_some_and(|component| component.is_bound() && !component.is_initialized());
        if !pending {
            return Ok(());
        }
        if let Some(result) = with_instance(world, entity, |script, ctx| script.init(ctx)) {
            result.with_context(|| format!("Initializing scripted object on {entity}"))?;
            if let Some(component) = world.get_mut::<ScriptedObjectComponent>(entity) {
                component.set_initialized(true);
            }
        }
        Ok(())
    }
}

impl System for ScriptedObjectSystem {
    fn init(&mut self, world: &mut SceneWorld) -> Result<()> {
        self.refresh_input(world);
        let result = world
            .view::<(ScriptedObjectComponent,)>()
            .into_iter()
            .try_for_each(|entity| self.init_entity(world, entity));
        self.commit_input(world);
        result
    }

    fn update(&mut self, world: &mut SceneWorld, dt: f32) -> Result<()> {
        self.refresh_input(world);
        self.failed.retain(|&entity| world.is_valid(entity));
        let result = self.update_all(world, dt);
        self.commit_input(world);
        result
    }

    fn destroy(&mut self, world: &mut SceneWorld) -> Result<()> {
        for entity in world.view::<(ScriptedObjectComponent,)>() {
            if world.is_valid(entity) {
                unbind(world, entity);
            }
        }
        self.failed.clear();
        Ok(())
    }
}

impl ScriptedObjectSystem {
    fn update_all(&mut self, world: &mut SceneWorld, dt: f32) -> Result<()> {
        for entity in world.view::<(ScriptedObjectComponent,)>() {
            if !world.is_valid(entity) {
                continue;
            }
            self.init_entity(world, entity)?;
            let initialized = world.get::<ScriptedObjectComponent>(entity).is_some_and(|c| c.is_initialized());
            if !initialized {
                continue;
            }
            if let Some(result) = with_instance(world, entity, |script, ctx| script.update(ctx, dt)) {
                result.with_context(|| format!("Updating scripted object on {entity}"))?;
            }
        }
        Ok(())
    }
}

fn with_instance<R>(
    world: &mut SceneWorld,
    entity: Entity,
    f: impl FnOnce(&mut dyn ScriptedObject, &mut ScriptContext<'_>) -> R,
) -> Option<R> {
    let component = world.get_mut::<ScriptedObjectComponent>(entity)?;
    let initialized = component.is_initialized();
    let mut script = component.take_instance()?;
    let result = f(script.as_mut(), &mut ScriptContext::new(world, entity));
    let orphan = match world.get_mut::<ScriptedObjectComponent>(entity) {
        Some(component) => component.restore_instance(script),
        None => Some(script),
    };
    // Removed while lent out: the removal hook had nothing to release.
    if let Some(mut script) = orphan {
        if initialized {
            if let Err(err) = script.destroy(&mut ScriptContext::new(world, entity)) {
                log::error!("[script] destroy on {entity} failed: {err:#}");
            }
        }
    }
    Some(result)
}

/// Releases the bound object, running its `destroy` hook if `init` already ran.
pub(crate) fn unbind(world: &mut SceneWorld, entity: Entity) {
    let Some(component) = world.get_mut::<ScriptedObjectComponent>(entity) else {
        return;
    };
    let initialized = component.is_initialized();
    component.set_initialized(false);
    let Some(mut script) = component.take_instance() else {
        return;
    };
    if initialized {
        if let Err(err) = script.destroy(&mut ScriptContext::new(world, entity)) {
            log::error!("[script] destroy on {entity} failed: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::types::Transform;
    use crate::input::Key;
    use glam::Vec2;
    use std::fs;

    fn system_in(dir: &Path) -> ScriptedObjectSystem {
        ScriptedObjectSystem::new(&ScriptConfig { root: dir.to_path_buf() })
    }

    #[test]
    fn binds_lazily_and_moves_entity() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("walker.rhai"), "fn update(dt) { if key_held(\"right\") { this.x += dt; } }").unwrap();
        let mut world = SceneWorld::default();
        let entity = world.create_entity(&[]);
        world.add(entity, ScriptedObjectComponent::new("walker.rhai")).unwrap();
        assert!(!world.get::<ScriptedObjectComponent>(entity).unwrap().is_bound());

        let mut system = system_in(dir.path());
        system.init(&mut world).unwrap();
        assert!(world.get::<ScriptedObjectComponent>(entity).unwrap().is_initialized());

        system.update(&mut world, 1.0).unwrap();
        assert_eq!(world.get::<Transform>(entity).unwrap().position, Vec2::ZERO);

        world.input.press(Key::Right);
        system.update(&mut world, 0.25).unwrap();
        let transform = world.get::<Transform>(entity).unwrap();
        assert_eq!(transform.position, Vec2::new(0.25, 0.0));
        assert!(transform.dirty);
    }

    #[test]
    fn missing_script_is_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = SceneWorld::default();
        let entity = world.create_entity(&[]);
        world.add(entity, ScriptedObjectComponent::new("absent.rhai")).unwrap();
        let mut system = system_in(dir.path());
        system.init(&mut world).unwrap();
        system.update(&mut world, 0.1).unwrap();
        assert!(system.last_error().is_some_and(|err| err.contains("absent.rhai")));
        assert!(!world.get::<ScriptedObjectComponent>(entity).unwrap().is_bound());
    }

    #[test]
    fn destroy_hook_runs_on_removal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("flag.rhai"), "fn destroy() { log(\"bye\"); this.layer = 9; }").unwrap();
        let mut world = SceneWorld::default();
        let entity = world.create_entity(&[]);
        world.add(entity, ScriptedObjectComponent::new("flag.rhai")).unwrap();
        system_in(dir.path()).init(&mut world).unwrap();
        assert!(world.remove::<ScriptedObjectComponent>(entity));
        assert_eq!(world.get::<Transform>(entity).unwrap().layer, 9);
    }

    #[test]
    fn a_press_is_seen_on_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("jump.rhai"), "fn update(dt) { if key_pressed(\"space\") { this.x += 1.0; } }").unwrap();
        let mut world = SceneWorld::default();
        let entity = world.create_entity(&[]);
        world.add(entity, ScriptedObjectComponent::new("jump.rhai")).unwrap();
        let mut system = system_in(dir.path());
        system.init(&mut world).unwrap();

        world.input.press(Key::Space);
        for _ in 0..5 {
            system.update(&mut world, 0.1).unwrap();
        }
        assert_eq!(world.get::<Transform>(entity).unwrap().position.x, 1.0);
        assert!(!world.input.peek_pressed(Key::Space));
        assert!(world.input.key_held(Key::Space));
    }

    struct Vanishing(Arc<Mutex<u32>>);

    impl ScriptedObject for Vanishing {
        fn init(&mut self, _ctx: &mut ScriptContext<'_>) -> Result<()> {
            Ok(())
        }

        fn update(&mut self, ctx: &mut ScriptContext<'_>, _dt: f32) -> Result<()> {
            let entity = ctx.entity();
            ctx.world_mut().destroy_entity(entity);
            Ok(())
        }

        fn destroy(&mut self, _ctx: &mut ScriptContext<'_>) -> Result<()> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn object_destroying_its_entity_gets_destroy() {
        let destroyed = Arc::new(Mutex::new(0));
        let mut world = SceneWorld::default();
        let entity = world.create_entity(&[]);
        world.add(entity, ScriptedObjectComponent::from_instance(Box::new(Vanishing(destroyed.clone())))).unwrap();
        let mut system = ScriptedObjectSystem::default();
        system.init(&mut world).unwrap();
        system.update(&mut world, 0.1).unwrap();
        assert!(!world.is_valid(entity));
        assert_eq!(*destroyed.lock().unwrap(), 1);

        system.destroy(&mut world).unwrap();
        assert_eq!(*destroyed.lock().unwrap(), 1);
    }
}
