use super::System;
use crate::ecs::types::NativeScriptComponent;
use crate::ecs::world::SceneWorld;
use crate::scripts::{NativeScript, ScriptContext};
use anyhow::{Context, Result};
use bevy_ecs::prelude::*;

/// Drives [`NativeScript`] instances: init once, update every frame, destroy on teardown.
#[derive(Default)]
pub struct NativeScriptSystem;

impl NativeScriptSystem {
    pub fn new() -> Self {
        Self
    }
}

impl System for NativeScriptSystem {
    fn init(&mut self, world: &mut SceneWorld) -> Result<()> {
        for entity in world.view::<(NativeScriptComponent,)>() {
            init_entity(world, entity)?;
        }
        Ok(())
    }

    fn update(&mut self, world: &mut SceneWorld, dt: f32) -> Result<()> {
        for entity in world.view::<(NativeScriptComponent,)>() {
            // An earlier script may have destroyed this entity during the pass.
            if !world.is_valid(entity) {
                continue;
            }
            init_entity(world, entity)?;
            if let Some(result) = with_initialized(world, entity, |script, ctx| script.on_update(ctx, dt)) {
                result.with_context(|| format!("Updating native script on {entity}"))?;
            }
        }
        Ok(())
    }

    fn destroy(&mut self, world: &mut SceneWorld) -> Result<()> {
        for entity in world.view::<(NativeScriptComponent,)>() {
            if world.is_valid(entity) {
                unbind(world, entity);
            }
        }
        Ok(())
    }
}

fn init_entity(world: &mut SceneWorld, entity: Entity) -> Result<()> {
    let pending = world
        .get::<NativeScriptComponent>(entity)
        .is_some_and(|component| component.is_bound() && !component.is_initialized());
    if !pending {
        return Ok(());
    }
    if let Some(result) = with_instance(world, entity, |script, ctx| script.on_init(ctx)) {
        result.with_context(|| format!("Initializing native script on {entity}"))?;
        if let Some(component) = world.get_mut::<NativeScriptComponent>(entity) {
            component.set_initialized(true);
        }
    }
    Ok(())
}

/// Lends the bound script out of its component for one call, then puts it back. Returns `None` when
/// nothing is bound.
fn with_instance<R>(
    world: &mut SceneWorld,
    entity: Entity,
    f: impl FnOnce(&mut dyn NativeScript, &mut ScriptContext<'_>) -> R,
) -> Option<R> {
    let component = world.get_mut::<NativeScriptComponent>(entity)?;
    let initialized = component.is_initialized();
    let mut script = component.take_instance()?;
    let result = f(script.as_mut(), &mut ScriptContext::new(world, entity));
    // The script may have removed its own component or entity while it was lent out, in which case
    // the removal hook found nothing to release.
    let orphan = match world.get_mut::<NativeScriptComponent>(entity) {
        Some(component) => component.restore_instance(script),
        None => Some(script),
    };
    if let Some(mut script) = orphan {
        if initialized {
            script.on_destroy(&mut ScriptContext::new(world, entity));
        }
        log::debug!("[script] released native script on {entity} after it left its component");
    }
    Some(result)
}

/// Like [`with_instance`] but only for scripts whose `on_init` already ran.
pub(crate) fn with_initialized<R>(
    world: &mut SceneWorld,
    entity: Entity,
    f: impl FnOnce(&mut dyn NativeScript, &mut ScriptContext<'_>) -> R,
) -> Option<R> {
    if !world.get::<NativeScriptComponent>(entity)?.is_initialized() {
        return None;
    }
    with_instance(world, entity, f)
}

/// Releases the bound script, calling `on_destroy` first if it was initialized.
pub(crate) fn unbind(world: &mut SceneWorld, entity: Entity) {
    let Some(component) = world.get_mut::<NativeScriptComponent>(entity) else {
        return;
    };
    let initialized = component.is_initialized();
    component.set_initialized(false);
    let Some(mut script) = component.take_instance() else {
        return;
    };
    if initialized {
        script.on_destroy(&mut ScriptContext::new(world, entity));
    }
    log::debug!("[script] released native script on {entity}");
}
