use crate::assets::{TextureHandle, UNDEFINED_PATH};
use crate::engine_assert;
use crate::scripts::{NativeScript, ScriptedObject};
use bevy_ecs::prelude::*;
use glam::{Vec2, Vec4};
use rapier2d::prelude::RigidBodyHandle;

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub scale: Vec2,
    /// Degrees, counter-clockwise from +x.
    pub rotation: f32,
    pub layer: i32,
    /// Set when game code moved the entity; physics then takes the transform position instead of
    /// overwriting it.
    pub dirty: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self { position: Vec2::ZERO, scale: Vec2::ONE, rotation: 0.0, layer: 0, dirty: false }
    }
}

impl Transform {
    pub fn from_position(position: Vec2) -> Self {
        Self { position, ..Default::default() }
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.dirty = true;
    }
}

/// Textured (or plain coloured) quad drawn centred on the entity.
///
/// Only the path is data; `texture` is filled in by the scene when the sprite is added.
#[derive(Component, Debug, Clone)]
pub struct Sprite {
    pub path: String,
    pub texture: Option<TextureHandle>,
    pub color: Vec4,
    pub pixels_per_unit: Vec2,
}

impl Default for Sprite {
    fn default() -> Self {
        Self { path: UNDEFINED_PATH.to_string(), texture: None, color: Vec4::ONE, pixels_per_unit: Vec2::splat(100.0) }
    }
}

impl Sprite {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    pub fn with_pixels_per_unit(mut self, pixels_per_unit: Vec2) -> Self {
        self.pixels_per_unit = pixels_per_unit;
        self
    }

    pub fn is_undefined(&self) -> bool {
        self.path.is_empty() || self.path == UNDEFINED_PATH
    }

    /// Texture size converted to units. Untextured sprites are one unit square.
    pub fn unit_size(&self) -> Vec2 {
        match &self.texture {
            Some(texture) if self.pixels_per_unit.x > 0.0 && self.pixels_per_unit.y > 0.0 => {
                texture.size().as_vec2() / self.pixels_per_unit
            }
            _ => Vec2::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    #[default]
    Static,
    Kinematic,
    Dynamic,
}

/// Declarative body description, consumed when the body is attached to the physics world.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDef {
    pub body_type: BodyType,
    /// Overwritten from the entity transform on attach.
    pub position: Vec2,
    /// Radians.
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub allow_sleep: bool,
    pub awake: bool,
    pub fixed_rotation: bool,
    pub bullet: bool,
    pub enabled: bool,
    pub gravity_scale: f32,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
            gravity_scale: 1.0,
        }
    }
}

impl BodyDef {
    pub fn of_type(body_type: BodyType) -> Self {
        Self { body_type, ..Default::default() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Box { half_extents: Vec2 },
    Circle { radius: f32, offset: Vec2 },
    /// Convex hull of the points, in body-local units.
    Polygon { points: Vec<Vec2> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    pub category_bits: u32,
    pub mask_bits: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self { category_bits: 0x0001, mask_bits: u32::MAX }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixtureDef {
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
    pub is_sensor: bool,
    pub filter: CollisionFilter,
}

impl Default for FixtureDef {
    fn default() -> Self {
        Self { friction: 0.2, restitution: 0.0, density: 1.0, is_sensor: false, filter: CollisionFilter::default() }
    }
}

/// Physics body for an entity. `handle` stays `None` until the physics system attaches it.
#[derive(Component, Debug, Clone, Default)]
pub struct RigidBody {
    pub def: BodyDef,
    pub fixtures: Vec<(Shape, FixtureDef)>,
    handle: Option<RigidBodyHandle>,
}

impl RigidBody {
    pub fn new(def: BodyDef) -> Self {
        Self { def, fixtures: Vec::new(), handle: None }
    }

    pub fn with_fixture(mut self, shape: Shape, fixture: FixtureDef) -> Self {
        self.fixtures.push((shape, fixture));
        self
    }

    pub fn handle(&self) -> Option<RigidBodyHandle> {
        self.handle
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn set_handle(&mut self, handle: Option<RigidBodyHandle>) {
        self.handle = handle;
    }
}

/// Owns one native script instance for its entity.
#[derive(Component, Default)]
pub struct NativeScriptComponent {
    instance: Option<Box<dyn NativeScript>>,
    initialized: bool,
}

impl NativeScriptComponent {
    pub fn new<T: NativeScript + Default + 'static>() -> Self {
        let mut component = Self::default();
        component.bind::<T>();
        component
    }

    pub fn from_instance(instance: Box<dyn NativeScript>) -> Self {
        Self { instance: Some(instance), initialized: false }
    }

    /// One script per component.
    pub fn bind<T: NativeScript + Default + 'static>(&mut self) -> &mut Self {
        self.bind_instance(Box::new(T::default()))
    }

    pub fn bind_instance(&mut self, instance: Box<dyn NativeScript>) -> &mut Self {
        if engine_assert!(self.instance.is_none(), "[script] native script already bound") {
            self.instance = Some(instance);
            self.initialized = false;
        }
        self
    }

    pub fn is_bound(&self) -> bool {
        self.instance.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn take_instance(&mut self) -> Option<Box<dyn NativeScript>> {
        self.instance.take()
    }

    /// Puts a lent instance back. Hands it back if another one was bound meanwhile.
    pub(crate) fn restore_instance(&mut self, instance: Box<dyn NativeScript>) -> Option<Box<dyn NativeScript>> {
        if self.instance.is_some() {
            return Some(instance);
        }
        self.instance = Some(instance);
        None
    }

    pub(crate) fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }
}

/// Binds an entity to a scripted object. Only `script_path` is persisted; the instance is created
/// by the scripted-object system.
#[derive(Component, Default)]
pub struct ScriptedObjectComponent {
    pub script_path: String,
    instance: Option<Box<dyn ScriptedObject>>,
    initialized: bool,
}

impl ScriptedObjectComponent {
    pub fn new(script_path: impl Into<String>) -> Self {
        Self { script_path: script_path.into(), instance: None, initialized: false }
    }

    pub fn from_instance(instance: Box<dyn ScriptedObject>) -> Self {
        Self { script_path: String::new(), instance: Some(instance), initialized: false }
    }

    pub fn bind_instance(&mut self, instance: Box<dyn ScriptedObject>) -> &mut Self {
        if engine_assert!(self.instance.is_none(), "[script] scripted object already bound") {
            self.instance = Some(instance);
            self.initialized = false;
        }
        self
    }

    pub fn is_bound(&self) -> bool {
        self.instance.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn take_instance(&mut self) -> Option<Box<dyn ScriptedObject>> {
        self.instance.take()
    }

    /// Puts a lent instance back. Hands it back if another one was bound meanwhile.
    pub(crate) fn restore_instance(&mut self, instance: Box<dyn ScriptedObject>) -> Option<Box<dyn ScriptedObject>> {
        if self.instance.is_some() {
            return Some(instance);
        }
        self.instance = Some(instance);
        None
    }

    pub(crate) fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }
}
