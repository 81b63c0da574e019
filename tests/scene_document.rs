use glam::{Vec2, Vec4};
use ren_engine::ecs::{BodyDef, BodyType, CollisionFilter, FixtureDef, RigidBody, Scene, ScriptedObjectComponent, Shape, Sprite, Transform};
use ren_engine::scene::{ComponentRecord, SceneDocument};

fn populated_scene() -> Scene {
    let mut scene = Scene::new("arena");
    let player = scene.create_entity(&["player"]);
    if let Some(transform) = scene.get_mut::<Transform>(player) {
        transform.position = Vec2::new(1.5, -2.0);
        transform.scale = Vec2::new(2.0, 0.5);
        transform.rotation = 30.0;
        transform.layer = 3;
    }
    scene.add(player, Sprite::default().with_color(Vec4::new(0.2, 0.4, 0.6, 1.0))).expect("sprite");
    let mut def = BodyDef::of_type(BodyType::Dynamic);
    def.angle = 0.25;
    def.linear_velocity = Vec2::new(3.0, -1.0);
    def.angular_velocity = 0.5;
    def.linear_damping = 0.1;
    def.angular_damping = 0.2;
    def.fixed_rotation = true;
    def.bullet = true;
    def.gravity_scale = 0.75;
    let body = RigidBody::new(def)
        .with_fixture(Shape::Circle { radius: 0.5, offset: Vec2::ZERO }, FixtureDef { density: 2.0, ..Default::default() })
        .with_fixture(
            Shape::Polygon { points: vec![Vec2::ZERO, Vec2::X, Vec2::Y] },
            FixtureDef {
                is_sensor: true,
                friction: 0.9,
                restitution: 0.3,
                filter: CollisionFilter { category_bits: 0x4, mask_bits: 0x3 },
                ..Default::default()
            },
        );
    scene.add(player, body).expect("body");
    scene.add(player, ScriptedObjectComponent::new("player.rhai")).expect("script");

    scene.create_entity(&["marker", "spawn"]);
    scene
}

#[test]
fn documents_round_trip_through_disk() {
    let scene = populated_scene();
    let doc = SceneDocument::from_scene(&scene);
    assert_eq!(doc.name, "arena");
    assert_eq!(doc.entities.len(), 2);
    assert_eq!(doc.entities[0].tags, vec!["player".to_string()]);
    assert_eq!(doc.entities[0].components.len(), 4);
    assert!(matches!(doc.entities[1].components.as_slice(), [ComponentRecord::Transform(_)]));

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("scenes/arena.json");
    doc.save_to_path(&path).expect("save");
    let loaded = SceneDocument::load_from_path(&path).expect("load");
    assert_eq!(loaded, doc);

    let mut restored = Scene::new("blank");
    let entities = loaded.instantiate(&mut restored).expect("instantiate");
    assert_eq!(entities.len(), 2);
    assert_eq!(restored.name(), "arena");

    let player = restored.entity_by_tag("player").expect("player");
    let transform = restored.get::<Transform>(player).expect("transform");
    assert_eq!(transform.position, Vec2::new(1.5, -2.0));
    assert_eq!(transform.scale, Vec2::new(2.0, 0.5));
    assert_eq!(transform.rotation, 30.0);
    assert_eq!(transform.layer, 3);

    let body = restored.get::<RigidBody>(player).expect("body");
    assert_eq!(body.def.body_type, BodyType::Dynamic);
    assert_eq!(body.def.linear_velocity, Vec2::new(3.0, -1.0));
    assert_eq!(body.def.linear_damping, 0.1);
    assert_eq!(body.def.gravity_scale, 0.75);
    assert!(body.def.fixed_rotation && body.def.bullet);
    assert!(!body.is_attached());
    assert_eq!(body.fixtures.len(), 2);
    assert_eq!(body.fixtures[0].1.density, 2.0);
    assert!(body.fixtures[1].1.is_sensor);
    assert_eq!(body.fixtures[1].1.filter.mask_bits, 0x3);

    let script = restored.get::<ScriptedObjectComponent>(player).expect("script");
    assert_eq!(script.script_path, "player.rhai");
    assert!(!script.is_bound());

    let marker = restored.entity_by_tag("spawn").expect("marker");
    assert!(restored.has_tag(marker, "marker"));
    assert_eq!(SceneDocument::from_scene(&restored), doc);
}

#[test]
fn malformed_document_reports_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ \"entities\": [ { \"components\": [ { \"type\": \"teapot\" } ] } ] }").expect("write");
    let err = SceneDocument::load_from_path(&path).expect_err("unknown component type");
    assert!(format!("{err:#}").contains("broken.json"));
}
