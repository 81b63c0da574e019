use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use bevy_ecs::prelude::{Component, Entity};
use glam::Vec2;
use rhai::{CallFnOptions, Dynamic, Engine, FuncArgs, Map, Scope, AST, FLOAT, INT};

use crate::ecs::physics::PhysicsWorld;
use crate::ecs::types::{RigidBody, Transform};
use crate::ecs::SceneWorld;
use crate::input::{Input, Key};

/// What a script can reach while one of its hooks runs: its own entity and the rest of the scene.
pub struct ScriptContext<'a> {
    world: &'a mut SceneWorld,
    entity: Entity,
}

impl<'a> ScriptContext<'a> {
    pub fn new(world: &'a mut SceneWorld, entity: Entity) -> Self {
        Self { world, entity }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn world(&self) -> &SceneWorld {
        self.world
    }

    pub fn world_mut(&mut self) -> &mut SceneWorld {
        self.world
    }

    pub fn get<T: Component>(&self) -> Option<&T> {
        self.world.get::<T>(self.entity)
    }

    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.world.get_mut::<T>(self.entity)
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.get::<Transform>()
    }

    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        self.get_mut::<Transform>()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.world.has_tag(self.entity, tag)
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        self.world.add_tag(self.entity, tag)
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.world.remove_tag(self.entity, tag)
    }

    pub fn input(&mut self) -> &mut Input {
        &mut self.world.input
    }

    pub fn key_pressed(&mut self, key: Key) -> bool {
        self.world.input.key_pressed(key)
    }

    pub fn key_held(&self, key: Key) -> bool {
        self.world.input.key_held(key)
    }

    /// The physics body backing this entity, once attached.
    pub fn body_mut(&mut self) -> Option<&mut rapier2d::dynamics::RigidBody> {
        let handle = self.world.get::<RigidBody>(self.entity)?.handle()?;
        self.world.store.resource_mut::<PhysicsWorld>()?.body_mut(handle)
    }
}

/// Compiled-in behaviour attached through [`crate::ecs::NativeScriptComponent`].
pub trait NativeScript: Send + Sync {
    fn on_init(&mut self, _ctx: &mut ScriptContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_update(&mut self, _ctx: &mut ScriptContext<'_>, _dt: f32) -> Result<()> {
        Ok(())
    }

    fn on_destroy(&mut self, _ctx: &mut ScriptContext<'_>) {}

    fn on_contact_begin(&mut self, _ctx: &mut ScriptContext<'_>, _other: Entity) {}

    fn on_contact_end(&mut self, _ctx: &mut ScriptContext<'_>, _other: Entity) {}

    /// `normal` points from this entity towards `other`.
    fn on_pre_solve(&mut self, _ctx: &mut ScriptContext<'_>, _other: Entity, _normal: Vec2) {}

    fn on_post_solve(&mut self, _ctx: &mut ScriptContext<'_>, _other: Entity, _force: f32) {}
}

/// Object driven by an external script runtime.
pub trait ScriptedObject: Send + Sync {
    fn init(&mut self, ctx: &mut ScriptContext<'_>) -> Result<()>;
    fn update(&mut self, ctx: &mut ScriptContext<'_>, dt: f32) -> Result<()>;
    fn destroy(&mut self, ctx: &mut ScriptContext<'_>) -> Result<()>;
}

/// Builds the shared rhai engine. `input` is the key state scripts query through `key_held` and
/// `key_pressed`; the owner refreshes it before running scripts and copies consumed presses back
/// afterwards.
pub fn build_engine(input: Arc<Mutex<Input>>) -> Engine {
    let mut engine = Engine::new();
    engine.set_fast_operators(true);
    engine.on_print(|text| log::info!("[script] {text}"));
    engine.on_debug(|text, source, pos| log::debug!("[script] {}:{pos} {text}", source.unwrap_or("<script>")));
    engine.register_fn("log", |message: &str| log::info!("[script] {message}"));

    let held = input.clone();
    engine.register_fn("key_held", move |name: &str| -> bool {
        let Ok(key) = name.parse::<Key>() else {
            log::warn!("[script] unknown key '{name}'");
            return false;
        };
        held.lock().map(|input| input.key_held(key)).unwrap_or(false)
    });
    let pressed = input;
    engine.register_fn("key_pressed", move |name: &str| -> bool {
        let Ok(key) = name.parse::<Key>() else {
            log::warn!("[script] unknown key '{name}'");
            return false;
        };
        pressed.lock().map(|mut input| input.key_pressed(key)).unwrap_or(false)
    });
    engine
}

/// A rhai file bound to one entity.
///
/// The script may define `init()`, `update(dt)` and `destroy()`; each is optional. Inside them `this` is
/// a map describing the entity (`x`, `y`, `rotation`, `layer`, `dirty`, `entity`, `tags`) and edits to
/// it are written back to the transform when the call returns.
pub struct RhaiScript {
    engine: Arc<Engine>,
    ast: AST,
    scope: Scope<'static>,
    name: String,
}

impl RhaiScript {
    pub fn load(engine: Arc<Engine>, path: &Path) -> Result<Self> {
        let ast = engine
            .compile_file(path.to_path_buf())
            .map_err(|err| anyhow!("Compiling Rhai script {}: {err}", path.display()))?;
        Self::from_ast(engine, ast, path.display().to_string())
    }

    pub fn from_source(engine: Arc<Engine>, name: impl Into<String>, source: &str) -> Result<Self> {
        let name = name.into();
        let ast = engine.compile(source).map_err(|err| anyhow!("Compiling Rhai script {name}: {err}"))?;
        Self::from_ast(engine, ast, name)
    }

    fn from_ast(engine: Arc<Engine>, ast: AST, name: String) -> Result<Self> {
        let mut scope = Scope::new();
        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|err| anyhow!("Running top level of {name}: {err}"))?;
        Ok(Self { engine, ast, scope, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_function(&self, name: &str, arity: usize) -> bool {
        self.ast.iter_functions().any(|f| f.name == name && f.params.len() == arity)
    }

    fn call(&mut self, ctx: &mut ScriptContext<'_>, function: &str, arity: usize, args: impl FuncArgs) -> Result<()> {
        if !self.has_function(function, arity) {
            return Ok(());
        }
        let before = entity_map(ctx);
        let mut this = Dynamic::from_map(before.clone());
        let options = CallFnOptions::new().eval_ast(false).bind_this_ptr(&mut this);
        self.engine
            .call_fn_with_options::<Dynamic>(options, &mut self.scope, &self.ast, function, args)
            .map_err(|err| anyhow!("{}::{function}: {err}", self.name))?;
        let after = this.try_cast::<Map>().ok_or_else(|| anyhow!("{}::{function} replaced `this`", self.name))?;
        apply_entity_map(ctx, &before, &after).with_context(|| format!("{}::{function}", self.name))
    }
}

impl ScriptedObject for RhaiScript {
    fn init(&mut self, ctx: &mut ScriptContext<'_>) -> Result<()> {
        self.call(ctx, "init", 0, ())
    }

    fn update(&mut self, ctx: &mut ScriptContext<'_>, dt: f32) -> Result<()> {
        self.call(ctx, "update", 1, (dt as FLOAT,))
    }

    fn destroy(&mut self, ctx: &mut ScriptContext<'_>) -> Result<()> {
        self.call(ctx, "destroy", 0, ())
    }
}

fn entity_map(ctx: &ScriptContext<'_>) -> Map {
    let mut map = Map::new();
    let transform = ctx.transform().copied().unwrap_or_default();
    map.insert("x".into(), Dynamic::from_float(transform.position.x as FLOAT));
    map.insert("y".into(), Dynamic::from_float(transform.position.y as FLOAT));
    map.insert("rotation".into(), Dynamic::from_float(transform.rotation as FLOAT));
    map.insert("layer".into(), Dynamic::from_int(transform.layer as INT));
    map.insert("dirty".into(), Dynamic::from_bool(transform.dirty));
    map.insert("entity".into(), Dynamic::from_int(ctx.entity().to_bits() as INT));
    let tags: rhai::Array =
        ctx.world().tags.tags(ctx.entity()).iter().map(|tag| Dynamic::from(tag.clone())).collect();
    map.insert("tags".into(), Dynamic::from_array(tags));
    map
}

fn read_float(map: &Map, key: &str) -> Result<Option<FLOAT>> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_float()
            .or_else(|_| value.as_int().map(|v| v as FLOAT))
            .map(Some)
            .map_err(|ty| anyhow!("`this.{key}` must be a number, got {ty}")),
    }
}

fn apply_entity_map(ctx: &mut ScriptContext<'_>, before: &Map, after: &Map) -> Result<()> {
    let changed = |key: &str| after.get(key).map(|v| v.to_string()) != before.get(key).map(|v| v.to_string());
    let (x, y, rotation) = (read_float(after, "x")?, read_float(after, "y")?, read_float(after, "rotation")?);
    let layer = after.get("layer").and_then(|v| v.as_int().ok());
    let dirty = after.get("dirty").and_then(|v| v.as_bool().ok()).unwrap_or(false);
    let moved = changed("x") || changed("y");
    let rotated = changed("rotation");
    let relayered = changed("layer");
    let Some(transform) = ctx.transform_mut() else {
        return Ok(());
    };
    if moved {
        let position = Vec2::new(
            x.map_or(transform.position.x, |v| v as f32),
            y.map_or(transform.position.y, |v| v as f32),
        );
        transform.set_position(position);
    }
    if rotated {
        if let Some(rotation) = rotation {
            transform.rotation = rotation as f32;
        }
    }
    if relayered {
        if let Some(layer) = layer {
            transform.layer = layer as i32;
        }
    }
    if dirty {
        transform.dirty = true;
    }
    Ok(())
}
