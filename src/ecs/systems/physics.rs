use super::native_script;
use super::System;
use crate::camera::Rect;
use crate::config::PhysicsConfig;
use crate::ecs::physics::{ContactEvent, ContactKind, PhysicsWorld};
use crate::ecs::types::{RigidBody, Shape, Transform};
use crate::ecs::world::SceneWorld;
use crate::renderer::RenderQueue;
use anyhow::Result;
use bevy_ecs::prelude::*;
use glam::{Vec2, Vec4};

/// Layer used for collider outlines so they draw over sprites.
pub const DEBUG_LAYER: i32 = 1 << 20;
const DEBUG_COLOR: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);

/// Owns the physics step and keeps transforms and bodies in agreement.
pub struct PhysicsSystem {
    config: PhysicsConfig,
    pub debug_render: bool,
}

impl Default for PhysicsSystem {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl PhysicsSystem {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config, debug_render: false }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// The step handed to the physics engine for a frame of length `dt`.
    pub fn step_length(&self, dt: f32) -> f32 {
        self.config.fixed_time_step.unwrap_or(dt)
    }

    fn ensure_world(&self, world: &mut SceneWorld) {
        if !world.store.has_resource::<PhysicsWorld>() {
            world.store.insert_resource(PhysicsWorld::new(&self.config));
        }
    }
}

impl System for PhysicsSystem {
    fn init(&mut self, world: &mut SceneWorld) -> Result<()> {
        self.ensure_world(world);
        attach_pending(world);
        Ok(())
    }

    fn update(&mut self, world: &mut SceneWorld, dt: f32) -> Result<()> {
        self.ensure_world(world);
        attach_pending(world);
        let step = self.step_length(dt);
        if step > 0.0 {
            if let Some(physics) = world.physics_mut() {
                physics.step(step);
            }
        }
        sync_transforms(world);
        let contacts = world.physics_mut().map(PhysicsWorld::drain_contacts).unwrap_or_default();
        dispatch_contacts(world, &contacts);
        Ok(())
    }

    fn render(&mut self, world: &mut SceneWorld, queue: &mut RenderQueue) -> Result<()> {
        if self.debug_render {
            draw_colliders(world, queue);
        }
        Ok(())
    }

    fn destroy(&mut self, world: &mut SceneWorld) -> Result<()> {
        for entity in world.view::<(RigidBody,)>() {
            detach_entity(world, entity);
        }
        world.store.remove_resource::<PhysicsWorld>();
        Ok(())
    }
}

/// Materializes every rigid body that has no physics handle yet.
pub fn attach_pending(world: &mut SceneWorld) {
    let pending: Vec<Entity> = world
        .view::<(Transform, RigidBody)>()
        .into_iter()
        .filter(|&entity| world.get::<RigidBody>(entity).is_some_and(|body| !body.is_attached()))
        .collect();
    for entity in pending {
        attach_entity(world, entity);
    }
}

pub fn attach_entity(world: &mut SceneWorld, entity: Entity) -> bool {
    let Some(transform) = world.get::<Transform>(entity).copied() else {
        return false;
    };
    world
        .store
        .resource_scope(|ecs, mut physics: Mut<PhysicsWorld>| {
            let Some(mut body) = ecs.get_mut::<RigidBody>(entity) else {
                return false;
            };
            physics.attach(entity, &transform, body.as_mut()).is_some()
        })
        .unwrap_or(false)
}

/// Tears the body down: contact-end goes out to scripts while both entities are still resolvable,
/// then the body and its collider mappings are removed and the handle cleared.
pub fn detach_entity(world: &mut SceneWorld, entity: Entity) {
    let Some(handle) = world.get::<RigidBody>(entity).and_then(RigidBody::handle) else {
        return;
    };
    let touching = world.physics().map(|physics| physics.touching(handle)).unwrap_or_default();
    let endings: Vec<ContactEvent> =
        touching.into_iter().map(|other| ContactEvent { kind: ContactKind::End, a: entity, b: other }).collect();
    dispatch_contacts(world, &endings);
    if let Some(physics) = world.physics_mut() {
        physics.detach(handle);
    }
    if let Some(body) = world.get_mut::<RigidBody>(entity) {
        body.set_handle(None);
    }
    log::debug!("[physics] detached body for {entity}");
}

/// Dirty transforms push their position into the body; all others take the simulated position.
/// Rotation always follows the body.
fn sync_transforms(world: &mut SceneWorld) {
    world.store.resource_scope(|ecs, mut physics: Mut<PhysicsWorld>| {
        let mut query = ecs.query::<(&mut Transform, &RigidBody)>();
        for (mut transform, body) in query.iter_mut(ecs) {
            let Some(handle) = body.handle() else {
                continue;
            };
            if transform.dirty {
                physics.set_position(handle, transform.position);
                transform.dirty = false;
            } else if let Some((position, _)) = physics.pose(handle) {
                transform.position = position;
            }
            if let Some((_, rotation)) = physics.pose(handle) {
                transform.rotation = rotation;
            }
        }
    });
}

/// Hands each contact to the native scripts on both sides, each seeing the other entity.
pub fn dispatch_contacts(world: &mut SceneWorld, contacts: &[ContactEvent]) {
    for contact in contacts {
        if !world.is_valid(contact.a) || !world.is_valid(contact.b) {
            continue;
        }
        deliver(world, contact.a, contact.b, contact.kind);
        deliver(world, contact.b, contact.a, contact.kind.flipped());
    }
}

fn deliver(world: &mut SceneWorld, target: Entity, other: Entity, kind: ContactKind) {
    native_script::with_initialized(world, target, |script, ctx| match kind {
        ContactKind::Begin => script.on_contact_begin(ctx, other),
        ContactKind::End => script.on_contact_end(ctx, other),
        ContactKind::PreSolve { normal } => script.on_pre_solve(ctx, other, normal),
        ContactKind::PostSolve { force } => script.on_post_solve(ctx, other, force),
    });
}

fn draw_colliders(world: &mut SceneWorld, queue: &mut RenderQueue) {
    let previous_layer = queue.layer();
    queue.set_layer(DEBUG_LAYER);
    for entity in world.view::<(RigidBody,)>() {
        let Some(body) = world.get::<RigidBody>(entity) else {
            continue;
        };
        let Some((position, rotation)) = body.handle().and_then(|handle| world.physics()?.pose(handle)) else {
            continue;
        };
        let (sin, cos) = rotation.to_radians().sin_cos();
        let to_world = |p: Vec2| position + Vec2::new(p.x * cos - p.y * sin, p.x * sin + p.y * cos);
        for (shape, _) in &body.fixtures {
            match shape {
                Shape::Box { half_extents } => {
                    queue.draw_rect(Rect::new(position - *half_extents, *half_extents * 2.0), rotation, DEBUG_COLOR);
                }
                Shape::Circle { radius, offset } => {
                    queue.draw_circle(to_world(*offset), *radius, DEBUG_COLOR, 24);
                }
                Shape::Polygon { points } => {
                    for (i, &p) in points.iter().enumerate() {
                        let next = points[(i + 1) % points.len()];
                        queue.draw_line(to_world(p), to_world(next), DEBUG_COLOR);
                    }
                }
            }
        }
    }
    queue.set_layer(previous_layer);
}
