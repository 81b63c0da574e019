use super::types::{BodyDef, BodyType, RigidBody, Shape, Transform};
use crate::config::PhysicsConfig;
use crate::engine_assert;
use bevy_ecs::prelude::*;
use glam::Vec2;
use rapier2d::geometry::{CollisionEvent, CollisionEventFlags};
use rapier2d::pipeline::{ActiveEvents, ActiveHooks, ContactModificationContext, EventHandler, PhysicsHooks};
use rapier2d::prelude::{
    CCDSolver, ColliderBuilder, ColliderHandle, ColliderSet, ContactPair, DefaultBroadPhase, Group, ImpulseJointSet,
    IntegrationParameters, InteractionGroups, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline, Point,
    QueryPipeline, Real, RigidBodyBuilder, RigidBodyHandle, RigidBodySet, RigidBodyType, Rotation, Vector,
};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactKind {
    Begin,
    End,
    /// Contact normal pointing from the first entity towards the second.
    PreSolve { normal: Vec2 },
    /// Total contact force magnitude applied during the step.
    PostSolve { force: f32 },
}

impl ContactKind {
    /// The same contact seen from the other participant.
    pub fn flipped(self) -> Self {
        match self {
            ContactKind::PreSolve { normal } => ContactKind::PreSolve { normal: -normal },
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    pub kind: ContactKind,
    pub a: Entity,
    pub b: Entity,
}

enum RawContact {
    Collision(CollisionEvent),
    PreSolve(ColliderHandle, ColliderHandle, Vec2),
    PostSolve(ColliderHandle, ColliderHandle, f32),
}

/// Records engine callbacks in emission order; they are resolved to entities after the step.
struct ContactCollector {
    events: Mutex<Vec<RawContact>>,
}

impl ContactCollector {
    fn new() -> Self {
        Self { events: Mutex::new(Vec::new()) }
    }

    fn push(&self, event: RawContact) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn drain(&self) -> Vec<RawContact> {
        if let Ok(mut events) = self.events.lock() {
            std::mem::take(&mut *events)
        } else {
            Vec::new()
        }
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        self.push(RawContact::Collision(event));
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        contact_pair: &ContactPair,
        total_force_magnitude: Real,
    ) {
        self.push(RawContact::PostSolve(contact_pair.collider1, contact_pair.collider2, total_force_magnitude));
    }
}

impl PhysicsHooks for ContactCollector {
    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        let normal = Vec2::new(context.normal.x, context.normal.y);
        self.push(RawContact::PreSolve(context.collider1, context.collider2, normal));
    }
}

/// The external physics world plus the collider-to-entity lookup used to resolve contacts.
#[derive(Resource)]
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    collider_entities: HashMap<ColliderHandle, Entity>,
    collector: ContactCollector,
}

impl PhysicsWorld {
    pub fn new(config: &PhysicsConfig) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.num_solver_iterations =
            NonZeroUsize::new(config.velocity_iterations).unwrap_or(NonZeroUsize::MIN);
        integration_parameters.num_internal_pgs_iterations = config.position_iterations.max(1);
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: Vector::new(config.gravity[0], config.gravity[1]),
            integration_parameters,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            collider_entities: HashMap::new(),
            collector: ContactCollector::new(),
        }
    }

    pub fn gravity(&self) -> Vec2 {
        Vec2::new(self.gravity.x, self.gravity.y)
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = Vector::new(gravity.x, gravity.y);
    }

    /// Creates the body and one collider per fixture, positioned at the entity transform.
    ///
    /// Returns the new handle, or the existing one when the component is already attached.
    pub fn attach(&mut self, entity: Entity, transform: &Transform, body: &mut RigidBody) -> Option<RigidBodyHandle> {
        if let Some(handle) = body.handle() {
            return Some(handle);
        }
        if !engine_assert!(!body.fixtures.is_empty(), "[physics] rigid body on {entity} has no shape") {
            return None;
        }
        body.def.position = transform.position;
        let user_data = entity.to_bits() as u128;
        let rigid_body = body_builder(&body.def).user_data(user_data).build();
        let handle = self.bodies.insert(rigid_body);
        for (shape, fixture) in &body.fixtures {
            let Some(builder) = collider_builder(shape) else {
                engine_assert!(false, "[physics] degenerate polygon on {entity}");
                continue;
            };
            let collider = builder
                .friction(fixture.friction)
                .restitution(fixture.restitution)
                .density(fixture.density)
                .sensor(fixture.is_sensor)
                .collision_groups(InteractionGroups::new(
                    Group::from_bits_truncate(fixture.filter.category_bits),
                    Group::from_bits_truncate(fixture.filter.mask_bits),
                ))
                .active_events(ActiveEvents::COLLISION_EVENTS | ActiveEvents::CONTACT_FORCE_EVENTS)
                .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS)
                .contact_force_event_threshold(0.0)
                .user_data(user_data)
                .build();
            let collider_handle = self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
            self.collider_entities.insert(collider_handle, entity);
        }
        body.set_handle(Some(handle));
        log::debug!("[physics] attached body for {entity}");
        Some(handle)
    }

    /// Entities whose colliders currently touch (or overlap, for sensors) any collider of `handle`.
    pub fn touching(&self, handle: RigidBodyHandle) -> Vec<Entity> {
        let mut out = Vec::new();
        let Some(body) = self.bodies.get(handle) else {
            return out;
        };
        for &collider in body.colliders() {
            let touching_contacts = self
                .narrow_phase
                .contact_pairs_with(collider)
                .filter(|pair| pair.has_any_active_contact)
                .map(|pair| if pair.collider1 == collider { pair.collider2 } else { pair.collider1 });
            let overlapping_sensors = self
                .narrow_phase
                .intersection_pairs_with(collider)
                .filter(|(_, _, intersecting)| *intersecting)
                .map(|(c1, c2, _)| if c1 == collider { c2 } else { c1 });
            for other in touching_contacts.chain(overlapping_sensors) {
                if body.colliders().contains(&other) {
                    continue;
                }
                if let Some(&entity) = self.collider_entities.get(&other) {
                    if !out.contains(&entity) {
                        out.push(entity);
                    }
                }
            }
        }
        out
    }

    /// Destroys the body and forgets its colliders. Callers dispatch contact-end first.
    pub fn detach(&mut self, handle: RigidBodyHandle) {
        let colliders: Vec<ColliderHandle> =
            self.bodies.get(handle).map(|body| body.colliders().to_vec()).unwrap_or_default();
        for collider in colliders {
            self.collider_entities.remove(&collider);
        }
        let _ = self.bodies.remove(
            handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &self.collector,
            &self.collector,
        );
    }

    /// Contacts recorded since the last drain, resolved to entities. Events involving a collider
    /// that has since been detached are dropped.
    pub fn drain_contacts(&mut self) -> Vec<ContactEvent> {
        let mut out = Vec::new();
        for raw in self.collector.drain() {
            let (kind, c1, c2) = match raw {
                RawContact::Collision(CollisionEvent::Started(c1, c2, _)) => (ContactKind::Begin, c1, c2),
                RawContact::Collision(CollisionEvent::Stopped(c1, c2, flags)) => {
                    if flags.contains(CollisionEventFlags::REMOVED) {
                        continue;
                    }
                    (ContactKind::End, c1, c2)
                }
                RawContact::PreSolve(c1, c2, normal) => (ContactKind::PreSolve { normal }, c1, c2),
                RawContact::PostSolve(c1, c2, force) => (ContactKind::PostSolve { force }, c1, c2),
            };
            if let (Some(&a), Some(&b)) = (self.collider_entities.get(&c1), self.collider_entities.get(&c2)) {
                out.push(ContactEvent { kind, a, b });
            }
        }
        out
    }

    /// Position and rotation (degrees) of an attached body.
    pub fn pose(&self, handle: RigidBodyHandle) -> Option<(Vec2, f32)> {
        self.bodies.get(handle).map(|body| {
            let t = body.translation();
            (Vec2::new(t.x, t.y), body.rotation().angle().to_degrees())
        })
    }

    pub fn set_position(&mut self, handle: RigidBodyHandle, position: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_translation(Vector::new(position.x, position.y), true);
        }
    }

    pub fn set_angle(&mut self, handle: RigidBodyHandle, degrees: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_rotation(Rotation::new(degrees.to_radians()), true);
        }
    }

    pub fn entity_of(&self, collider: ColliderHandle) -> Option<Entity> {
        self.collider_entities.get(&collider).copied()
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&rapier2d::dynamics::RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut rapier2d::dynamics::RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }
}

fn body_builder(def: &BodyDef) -> RigidBodyBuilder {
    let body_type = match def.body_type {
        BodyType::Static => RigidBodyType::Fixed,
        BodyType::Kinematic => RigidBodyType::KinematicVelocityBased,
        BodyType::Dynamic => RigidBodyType::Dynamic,
    };
    let mut builder = RigidBodyBuilder::new(body_type)
        .translation(Vector::new(def.position.x, def.position.y))
        .rotation(def.angle)
        .linvel(Vector::new(def.linear_velocity.x, def.linear_velocity.y))
        .angvel(def.angular_velocity)
        .linear_damping(def.linear_damping)
        .angular_damping(def.angular_damping)
        .can_sleep(def.allow_sleep)
        .sleeping(!def.awake)
        .ccd_enabled(def.bullet)
        .enabled(def.enabled)
        .gravity_scale(def.gravity_scale);
    if def.fixed_rotation {
        builder = builder.lock_rotations();
    }
    builder
}

fn collider_builder(shape: &Shape) -> Option<ColliderBuilder> {
    match shape {
        Shape::Box { half_extents } => Some(ColliderBuilder::cuboid(half_extents.x, half_extents.y)),
        Shape::Circle { radius, offset } => {
            Some(ColliderBuilder::ball(*radius).translation(Vector::new(offset.x, offset.y)))
        }
        Shape::Polygon { points } => {
            let points: Vec<Point<Real>> = points.iter().map(|p| Point::new(p.x, p.y)).collect();
            ColliderBuilder::convex_hull(&points)
        }
    }
}
