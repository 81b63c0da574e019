use crate::ecs::types::{
    BodyDef, BodyType, CollisionFilter, FixtureDef, RigidBody, ScriptedObjectComponent, Shape, Sprite, Transform,
};
use crate::ecs::Scene;
use anyhow::{Context, Result};
use bevy_ecs::prelude::Entity;
use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// On-disk form of a scene: named entities, each with its tags and persisted components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentRecord {
    Transform(TransformData),
    Sprite(SpriteData),
    RigidBody(RigidBodyData),
    ScriptedObject(ScriptedObjectData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformData {
    pub position: Vec2Data,
    #[serde(default = "default_scale")]
    pub scale: Vec2Data,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub layer: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteData {
    pub path: String,
    #[serde(default = "default_color")]
    pub color: ColorData,
    #[serde(default = "default_pixels_per_unit")]
    pub pixels_per_unit: Vec2Data,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidBodyData {
    #[serde(default)]
    pub body: BodyDefData,
    #[serde(default)]
    pub fixtures: Vec<FixtureData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDefData {
    #[serde(default)]
    pub body_type: BodyTypeData,
    #[serde(default)]
    pub angle: f32,
    #[serde(default)]
    pub linear_velocity: Vec2Data,
    #[serde(default)]
    pub angular_velocity: f32,
    #[serde(default)]
    pub linear_damping: f32,
    #[serde(default)]
    pub angular_damping: f32,
    #[serde(default = "default_true")]
    pub allow_sleep: bool,
    #[serde(default = "default_true")]
    pub awake: bool,
    #[serde(default)]
    pub fixed_rotation: bool,
    #[serde(default)]
    pub bullet: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_gravity_scale")]
    pub gravity_scale: f32,
}

impl Default for BodyDefData {
    fn default() -> Self {
        BodyDef::default().into()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyTypeData {
    #[default]
    Static,
    Kinematic,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureData {
    pub shape: ShapeData,
    #[serde(default = "default_friction")]
    pub friction: f32,
    #[serde(default)]
    pub restitution: f32,
    #[serde(default = "default_density")]
    pub density: f32,
    #[serde(default)]
    pub is_sensor: bool,
    #[serde(default = "default_category_bits")]
    pub category_bits: u32,
    #[serde(default = "default_mask_bits")]
    pub mask_bits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeData {
    Box { half_extents: Vec2Data },
    Circle {
        radius: f32,
        #[serde(default)]
        offset: Vec2Data,
    },
    Polygon { points: Vec<Vec2Data> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedObjectData {
    pub script_path: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2Data {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorData {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

fn default_scale() -> Vec2Data {
    Vec2Data { x: 1.0, y: 1.0 }
}

fn default_color() -> ColorData {
    ColorData { r: 1.0, g: 1.0, b: 1.0, a: 1.0 }
}

fn default_pixels_per_unit() -> Vec2Data {
    Vec2Data { x: 100.0, y: 100.0 }
}

const fn default_true() -> bool {
    true
}

const fn default_gravity_scale() -> f32 {
    1.0
}

fn default_friction() -> f32 {
    FixtureDef::default().friction
}

fn default_density() -> f32 {
    FixtureDef::default().density
}

fn default_category_bits() -> u32 {
    CollisionFilter::default().category_bits
}

fn default_mask_bits() -> u32 {
    CollisionFilter::default().mask_bits
}

impl SceneDocument {
    /// Captures every entity's persisted components. Native scripts and physics handles are runtime
    /// state and are left out.
    pub fn from_scene(scene: &Scene) -> Self {
        let world = scene.world();
        let entities = world
            .store
            .entities()
            .into_iter()
            .map(|entity| {
                let mut components = Vec::new();
                if let Some(transform) = world.get::<Transform>(entity) {
                    components.push(ComponentRecord::Transform(transform.into()));
                }
                if let Some(sprite) = world.get::<Sprite>(entity) {
                    components.push(ComponentRecord::Sprite(sprite.into()));
                }
                if let Some(body) = world.get::<RigidBody>(entity) {
                    components.push(ComponentRecord::RigidBody(body.into()));
                }
                if let Some(script) = world.get::<ScriptedObjectComponent>(entity) {
                    components
                        .push(ComponentRecord::ScriptedObject(ScriptedObjectData { script_path: script.script_path.clone() }));
                }
                EntityRecord { tags: scene.tags(entity).to_vec(), components }
            })
            .collect();
        Self { name: scene.name().to_string(), entities }
    }

    /// Recreates the recorded entities inside `scene`, in document order, and returns them.
    pub fn instantiate(&self, scene: &mut Scene) -> Result<Vec<Entity>> {
        if !self.name.is_empty() {
            scene.set_name(self.name.clone());
        }
        let mut spawned = Vec::with_capacity(self.entities.len());
        for (index, record) in self.entities.iter().enumerate() {
            let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
            let entity = scene.create_entity(&tags);
            for component in &record.components {
                component
                    .apply(scene, entity)
                    .with_context(|| format!("Instantiating entity #{index} of scene '{}'", self.name))?;
            }
            spawned.push(entity);
        }
        log::info!("[scene] instantiated {} entities from '{}'", spawned.len(), self.name);
        Ok(spawned)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading scene file {}", path.display()))?;
        serde_json::from_slice::<SceneDocument>(&bytes).with_context(|| format!("Parsing scene file {}", path.display()))
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("Creating scene directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes()).with_context(|| format!("Writing scene file {}", path.display()))?;
        Ok(())
    }
}

impl ComponentRecord {
    fn apply(&self, scene: &mut Scene, entity: Entity) -> Result<()> {
        match self {
            // Every entity already owns a transform; the record overwrites it in place.
            ComponentRecord::Transform(data) => {
                if let Some(transform) = scene.get_mut::<Transform>(entity) {
                    *transform = data.into();
                }
            }
            ComponentRecord::Sprite(data) => {
                scene.add(entity, Sprite::from(data))?;
            }
            ComponentRecord::RigidBody(data) => {
                scene.add(entity, RigidBody::from(data))?;
            }
            ComponentRecord::ScriptedObject(data) => {
                scene.add(entity, ScriptedObjectComponent::new(data.script_path.clone()))?;
            }
        }
        Ok(())
    }
}

impl From<&Transform> for TransformData {
    fn from(t: &Transform) -> Self {
        Self { position: t.position.into(), scale: t.scale.into(), rotation: t.rotation, layer: t.layer }
    }
}

impl From<&TransformData> for Transform {
    fn from(data: &TransformData) -> Self {
        Self {
            position: data.position.into(),
            scale: data.scale.into(),
            rotation: data.rotation,
            layer: data.layer,
            dirty: false,
        }
    }
}

impl From<&Sprite> for SpriteData {
    fn from(sprite: &Sprite) -> Self {
        Self { path: sprite.path.clone(), color: sprite.color.into(), pixels_per_unit: sprite.pixels_per_unit.into() }
    }
}

impl From<&SpriteData> for Sprite {
    fn from(data: &SpriteData) -> Self {
        Sprite::new(data.path.clone()).with_color(data.color.into()).with_pixels_per_unit(data.pixels_per_unit.into())
    }
}

impl From<&RigidBody> for RigidBodyData {
    fn from(body: &RigidBody) -> Self {
        Self {
            body: body.def.clone().into(),
            fixtures: body.fixtures.iter().map(|(shape, fixture)| FixtureData::new(shape, fixture)).collect(),
        }
    }
}

impl From<&RigidBodyData> for RigidBody {
    fn from(data: &RigidBodyData) -> Self {
        data.fixtures.iter().fold(RigidBody::new(data.body.clone().into()), |body, fixture| {
            body.with_fixture(fixture.shape.clone().into(), fixture.into())
        })
    }
}

impl From<BodyDef> for BodyDefData {
    fn from(def: BodyDef) -> Self {
        Self {
            body_type: def.body_type.into(),
            angle: def.angle,
            linear_velocity: def.linear_velocity.into(),
            angular_velocity: def.angular_velocity,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            allow_sleep: def.allow_sleep,
            awake: def.awake,
            fixed_rotation: def.fixed_rotation,
            bullet: def.bullet,
            enabled: def.enabled,
            gravity_scale: def.gravity_scale,
        }
    }
}

impl From<BodyDefData> for BodyDef {
    fn from(data: BodyDefData) -> Self {
        Self {
            body_type: data.body_type.into(),
            position: Vec2::ZERO,
            angle: data.angle,
            linear_velocity: data.linear_velocity.into(),
            angular_velocity: data.angular_velocity,
            linear_damping: data.linear_damping,
            angular_damping: data.angular_damping,
            allow_sleep: data.allow_sleep,
            awake: data.awake,
            fixed_rotation: data.fixed_rotation,
            bullet: data.bullet,
            enabled: data.enabled,
            gravity_scale: data.gravity_scale,
        }
    }
}

impl From<BodyType> for BodyTypeData {
    fn from(value: BodyType) -> Self {
        match value {
            BodyType::Static => BodyTypeData::Static,
            BodyType::Kinematic => BodyTypeData::Kinematic,
            BodyType::Dynamic => BodyTypeData::Dynamic,
        }
    }
}

impl From<BodyTypeData> for BodyType {
    fn from(value: BodyTypeData) -> Self {
        match value {
            BodyTypeData::Static => BodyType::Static,
            BodyTypeData::Kinematic => BodyType::Kinematic,
            BodyTypeData::Dynamic => BodyType::Dynamic,
        }
    }
}

impl FixtureData {
    fn new(shape: &Shape, fixture: &FixtureDef) -> Self {
        Self {
            shape: shape.into(),
            friction: fixture.friction,
            restitution: fixture.restitution,
            density: fixture.density,
            is_sensor: fixture.is_sensor,
            category_bits: fixture.filter.category_bits,
            mask_bits: fixture.filter.mask_bits,
        }
    }
}

impl From<&FixtureData> for FixtureDef {
    fn from(data: &FixtureData) -> Self {
        Self {
            friction: data.friction,
            restitution: data.restitution,
            density: data.density,
            is_sensor: data.is_sensor,
            filter: CollisionFilter { category_bits: data.category_bits, mask_bits: data.mask_bits },
        }
    }
}

impl From<&Shape> for ShapeData {
    fn from(shape: &Shape) -> Self {
        match shape {
            Shape::Box { half_extents } => ShapeData::Box { half_extents: (*half_extents).into() },
            Shape::Circle { radius, offset } => ShapeData::Circle { radius: *radius, offset: (*offset).into() },
            Shape::Polygon { points } => ShapeData::Polygon { points: points.iter().map(|&p| p.into()).collect() },
        }
    }
}

impl From<ShapeData> for Shape {
    fn from(data: ShapeData) -> Self {
        match data {
            ShapeData::Box { half_extents } => Shape::Box { half_extents: half_extents.into() },
            ShapeData::Circle { radius, offset } => Shape::Circle { radius, offset: offset.into() },
            ShapeData::Polygon { points } => Shape::Polygon { points: points.into_iter().map(Vec2::from).collect() },
        }
    }
}

impl From<Vec2> for Vec2Data {
    fn from(value: Vec2) -> Self {
        Self { x: value.x, y: value.y }
    }
}

impl From<Vec2Data> for Vec2 {
    fn from(value: Vec2Data) -> Self {
        Vec2::new(value.x, value.y)
    }
}

impl From<Vec4> for ColorData {
    fn from(value: Vec4) -> Self {
        Self { r: value.x, g: value.y, b: value.z, a: value.w }
    }
}

impl From<ColorData> for Vec4 {
    fn from(value: ColorData) -> Self {
        Vec4::new(value.r, value.g, value.b, value.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_records_are_tagged_by_type() {
        let record = ComponentRecord::ScriptedObject(ScriptedObjectData { script_path: "enemy.rhai".into() });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "scripted_object");
        assert_eq!(json["script_path"], "enemy.rhai");
    }

    #[test]
    fn sparse_rigid_body_uses_defaults() {
        let json = r#"{ "type": "rigid_body", "fixtures": [ { "shape": { "type": "circle", "radius": 0.5 } } ] }"#;
        let ComponentRecord::RigidBody(data) = serde_json::from_str::<ComponentRecord>(json).unwrap() else {
            panic!("expected a rigid body record");
        };
        let body = RigidBody::from(&data);
        assert_eq!(body.def, BodyDef::default());
        assert_eq!(body.fixtures.len(), 1);
        assert_eq!(body.fixtures[0].0, Shape::Circle { radius: 0.5, offset: Vec2::ZERO });
        assert_eq!(body.fixtures[0].1, FixtureDef::default());
        assert!(!body.is_attached());
    }

    #[test]
    fn instantiate_rebuilds_tags_and_components() {
        let doc = SceneDocument {
            name: "level".into(),
            entities: vec![EntityRecord {
                tags: vec!["player".into()],
                components: vec![
                    ComponentRecord::Transform(TransformData {
                        position: Vec2Data { x: 3.0, y: 4.0 },
                        scale: default_scale(),
                        rotation: 45.0,
                        layer: 2,
                    }),
                    ComponentRecord::Sprite(SpriteData {
                        path: crate::assets::UNDEFINED_PATH.into(),
                        color: ColorData { r: 1.0, g: 0.0, b: 0.0, a: 1.0 },
                        pixels_per_unit: default_pixels_per_unit(),
                    }),
                ],
            }],
        };
        let mut scene = Scene::new("empty");
        let entities = doc.instantiate(&mut scene).unwrap();
        assert_eq!(scene.name(), "level");
        assert_eq!(entities.len(), 1);
        let entity = scene.entity_by_tag("player").unwrap();
        let transform = scene.get::<Transform>(entity).unwrap();
        assert_eq!(transform.position, Vec2::new(3.0, 4.0));
        assert_eq!(transform.layer, 2);
        assert!(!transform.dirty);
        assert_eq!(scene.get::<Sprite>(entity).unwrap().color, Vec4::new(1.0, 0.0, 0.0, 1.0));
    }
}
