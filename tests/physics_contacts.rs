use anyhow::Result;
use bevy_ecs::prelude::Entity;
use glam::Vec2;
use ren_engine::config::{EngineConfig, PhysicsConfig};
use ren_engine::ecs::{
    BodyDef, BodyType, FixtureDef, NativeScriptComponent, PhysicsSystem, PhysicsWorld, RigidBody, Scene, Shape, System,
    Transform,
};
use ren_engine::scripts::{NativeScript, ScriptContext};
use std::sync::{Arc, Mutex};

const DT: f32 = 1.0 / 60.0;

#[derive(Default)]
struct ContactLog {
    begins: Vec<Entity>,
    ends: Vec<Entity>,
    pre_solves: usize,
}

struct ContactRecorder(Arc<Mutex<ContactLog>>);

impl NativeScript for ContactRecorder {
    fn on_contact_begin(&mut self, _ctx: &mut ScriptContext<'_>, other: Entity) {
        self.0.lock().unwrap().begins.push(other);
    }

    fn on_contact_end(&mut self, _ctx: &mut ScriptContext<'_>, other: Entity) {
        self.0.lock().unwrap().ends.push(other);
    }

    fn on_pre_solve(&mut self, _ctx: &mut ScriptContext<'_>, _other: Entity, _normal: Vec2) {
        self.0.lock().unwrap().pre_solves += 1;
    }
}

fn physics_scene() -> Scene {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut scene = Scene::new("physics");
    scene.add_default_systems(&EngineConfig::default());
    scene
}

fn ground(scene: &mut Scene) -> Entity {
    let entity = scene.create_entity(&["ground"]);
    let body = RigidBody::new(BodyDef::of_type(BodyType::Static))
        .with_fixture(Shape::Box { half_extents: Vec2::new(5.0, 0.5) }, FixtureDef::default());
    scene.add(entity, body).expect("ground body");
    entity
}

/// A unit box whose bottom face sits on the ground's top face.
fn resting_box(scene: &mut Scene) -> Entity {
    let entity = scene.create_entity(&["crate"]);
    if let Some(transform) = scene.get_mut::<Transform>(entity) {
        transform.position = Vec2::new(0.0, 1.0);
    }
    let body = RigidBody::new(BodyDef::of_type(BodyType::Dynamic))
        .with_fixture(Shape::Box { half_extents: Vec2::splat(0.5) }, FixtureDef::default());
    scene.add(entity, body).expect("crate body");
    entity
}

#[test]
fn bodies_attach_on_init_and_detach_on_removal() {
    let mut scene = physics_scene();
    let floor = ground(&mut scene);
    assert!(!scene.get::<RigidBody>(floor).expect("body").is_attached());

    scene.init().expect("init");
    assert!(scene.get::<RigidBody>(floor).expect("body").is_attached());
    assert_eq!(scene.world().physics().map(PhysicsWorld::body_count), Some(1));

    assert!(scene.remove::<RigidBody>(floor));
    assert_eq!(scene.world().physics().map(PhysicsWorld::body_count), Some(0));
    assert_eq!(scene.world().physics().map(PhysicsWorld::collider_count), Some(0));
    scene.update(DT).expect("update after detach");
}

#[test]
fn dynamic_body_falls_and_transform_follows() {
    let mut scene = physics_scene();
    let entity = scene.create_entity(&[]);
    let body = RigidBody::new(BodyDef::of_type(BodyType::Dynamic))
        .with_fixture(Shape::Circle { radius: 0.25, offset: Vec2::ZERO }, FixtureDef::default());
    scene.add(entity, body).expect("body");
    scene.init().expect("init");
    for _ in 0..30 {
        scene.update(DT).expect("update");
    }
    let transform = scene.get::<Transform>(entity).expect("transform");
    assert!(transform.position.y < -0.5, "body should fall, y = {}", transform.position.y);
    assert!(transform.position.x.abs() < 1e-4);
}

#[test]
fn dirty_transform_teleports_the_body() {
    let mut scene = physics_scene();
    let floor = ground(&mut scene);
    scene.init().expect("init");
    scene.get_mut::<Transform>(floor).expect("transform").set_position(Vec2::new(3.0, -2.0));
    scene.update(DT).expect("update");
    let transform = scene.get::<Transform>(floor).expect("transform");
    assert!(!transform.dirty);
    let handle = scene.get::<RigidBody>(floor).and_then(RigidBody::handle).expect("attached");
    let (position, _) = scene.world().physics().and_then(|p| p.pose(handle)).expect("pose");
    assert_eq!(position, Vec2::new(3.0, -2.0));
}

#[test]
fn contact_begin_reaches_scripted_side_only() {
    let mut scene = physics_scene();
    let floor = ground(&mut scene);
    let falling = resting_box(&mut scene);
    let log = Arc::new(Mutex::new(ContactLog::default()));
    let recorder = NativeScriptComponent::from_instance(Box::new(ContactRecorder(log.clone())));
    scene.add(falling, recorder).expect("recorder");

    scene.init().expect("init");
    for _ in 0..60 {
        scene.update(DT).expect("update");
    }

    let log = log.lock().unwrap();
    assert_eq!(log.begins, vec![floor]);
    assert!(log.ends.is_empty());
    assert!(log.pre_solves > 0);
}

#[test]
fn detaching_a_touching_body_sends_contact_end() {
    let mut scene = physics_scene();
    let floor = ground(&mut scene);
    let falling = resting_box(&mut scene);
    let log = Arc::new(Mutex::new(ContactLog::default()));
    scene
        .add(falling, NativeScriptComponent::from_instance(Box::new(ContactRecorder(log.clone()))))
        .expect("recorder");
    scene.init().expect("init");
    for _ in 0..10 {
        scene.update(DT).expect("update");
    }

    assert!(scene.remove::<RigidBody>(floor));
    assert_eq!(log.lock().unwrap().ends, vec![floor]);

    let before = log.lock().unwrap().begins.len();
    for _ in 0..10 {
        scene.update(DT).expect("update");
    }
    let log = log.lock().unwrap();
    assert_eq!(log.begins.len(), before);
    assert_eq!(log.ends, vec![floor]);
}

#[test]
fn system_destroy_detaches_bodies_but_keeps_components() {
    let mut scene = physics_scene();
    let floor = ground(&mut scene);
    let falling = resting_box(&mut scene);
    let log = Arc::new(Mutex::new(ContactLog::default()));
    scene
        .add(falling, NativeScriptComponent::from_instance(Box::new(ContactRecorder(log.clone()))))
        .expect("recorder");
    scene.init().expect("init");
    for _ in 0..10 {
        scene.update(DT).expect("update");
    }
    assert_eq!(log.lock().unwrap().begins, vec![floor]);

    let mut physics = scene.remove_system::<PhysicsSystem>().expect("physics system");
    physics.destroy(scene.world_mut()).expect("destroy");

    for entity in [floor, falling] {
        let body = scene.get::<RigidBody>(entity).expect("component survives");
        assert!(!body.is_attached());
        assert!(body.handle().is_none());
    }
    assert!(scene.world().physics().is_none());
    assert_eq!(log.lock().unwrap().ends, vec![floor]);

    for _ in 0..10 {
        scene.update(DT).expect("update without physics");
    }
    let log = log.lock().unwrap();
    assert_eq!(log.begins, vec![floor]);
    assert_eq!(log.ends, vec![floor]);
}

#[test]
fn step_length_prefers_fixed_step() {
    let fixed = PhysicsSystem::new(PhysicsConfig::default());
    assert_eq!(fixed.step_length(0.5), 1.0 / 60.0);
    let variable = PhysicsSystem::new(PhysicsConfig { fixed_time_step: None, ..PhysicsConfig::default() });
    assert_eq!(variable.step_length(0.5), 0.5);
}

#[test]
fn scripts_can_drive_their_body() {
    struct Launcher;
    impl NativeScript for Launcher {
        fn on_init(&mut self, ctx: &mut ScriptContext<'_>) -> Result<()> {
            if let Some(body) = ctx.body_mut() {
                body.set_linvel(rapier2d::prelude::vector![2.0, 0.0], true);
            }
            Ok(())
        }
    }

    let mut scene = Scene::new("launch");
    scene.add_default_systems(&EngineConfig::default());
    let entity = scene.create_entity(&[]);
    let mut def = BodyDef::of_type(BodyType::Dynamic);
    def.gravity_scale = 0.0;
    scene
        .add(entity, RigidBody::new(def).with_fixture(Shape::Circle { radius: 0.1, offset: Vec2::ZERO }, FixtureDef::default()))
        .expect("body");
    scene.add(entity, NativeScriptComponent::from_instance(Box::new(Launcher))).expect("script");
    scene.init().expect("init");
    for _ in 0..60 {
        scene.update(DT).expect("update");
    }
    let x = scene.get::<Transform>(entity).expect("transform").position.x;
    assert!((x - 2.0).abs() < 0.05, "x = {x}");
}
