use glam::{UVec2, Vec2, Vec4};
use ren_engine::camera::{Camera, CartesianCamera, PixelCamera, PixelRect, Rect};
use ren_engine::ecs::{Scene, Sprite, Transform};
use ren_engine::renderer::{DrawCall, RecordingSurface, RenderQueue, RenderTarget};

fn color(id: f32) -> Vec4 {
    Vec4::new(id, 0.0, 0.0, 1.0)
}

#[test]
fn commands_run_by_layer_keeping_submission_order() {
    let camera = PixelCamera::new(UVec2::new(640, 480), UVec2::splat(1));
    let mut queue = RenderQueue::new();
    queue.begin_render(&camera, None);
    for (id, layer) in [(0.0, 3), (1.0, 1), (2.0, 1), (3.0, 2)] {
        queue.set_layer(layer);
        queue.draw_quad(Rect::new(Vec2::ZERO, Vec2::ONE), color(id));
    }
    let mut surface = RecordingSurface::new();
    queue.render(&mut surface);
    let order: Vec<f32> = surface
        .take_calls()
        .into_iter()
        .filter_map(|call| match call {
            DrawCall::FillRect { color, .. } => Some(color.x),
            _ => None,
        })
        .collect();
    assert_eq!(order, vec![1.0, 2.0, 3.0, 0.0]);
    queue.end_render(&mut surface);
    assert!(queue.is_empty());
}

#[test]
fn render_target_is_bound_and_released() {
    let camera = PixelCamera::new(UVec2::new(64, 64), UVec2::splat(16));
    let mut queue = RenderQueue::new();
    let mut surface = RecordingSurface::new();
    queue.begin_render(&camera, Some(RenderTarget(7)));
    queue.draw_line(Vec2::ZERO, Vec2::ONE, Vec4::ONE);
    queue.render(&mut surface);
    queue.end_render(&mut surface);
    assert_eq!(surface.target_switches, vec![Some(RenderTarget(7)), None]);
    assert_eq!(surface.target, None);
}

#[test]
fn cartesian_camera_centres_the_origin() {
    let camera = CartesianCamera::new(UVec2::new(800, 600), UVec2::splat(100));
    assert_eq!(camera.to_pixels(Vec2::ZERO), Vec2::new(400.0, 300.0));
    assert_eq!(camera.to_pixels(Vec2::new(1.0, 1.0)), Vec2::new(500.0, 200.0));
    assert_eq!(camera.up_direction(), Vec2::new(0.0, 1.0));
    // The unit rect is anchored bottom-left, so its top edge is one unit above the origin.
    let rect = camera.convert_rect_now(Rect::new(Vec2::ZERO, Vec2::ONE));
    assert_eq!(rect, PixelRect::new(400, 200, 100, 100));
}

#[test]
fn scene_render_submits_sprites() {
    let mut scene = Scene::new("render");
    scene.add_default_systems(&Default::default());
    let front = scene.create_entity(&[]);
    let back = scene.create_entity(&[]);
    scene.add(front, Sprite::default().with_color(color(1.0))).expect("front sprite");
    scene.add(back, Sprite::default().with_color(color(2.0))).expect("back sprite");
    scene.get_mut::<Transform>(front).expect("front transform").layer = 5;
    scene.get_mut::<Transform>(back).expect("back transform").layer = -1;

    let mut queue = RenderQueue::new();
    queue.begin_render(&PixelCamera::new(UVec2::new(320, 240), UVec2::splat(32)), None);
    scene.render(&mut queue).expect("render");
    let mut surface = RecordingSurface::new();
    queue.render(&mut surface);
    let colors: Vec<f32> = surface
        .take_calls()
        .into_iter()
        .filter_map(|call| match call {
            DrawCall::FillRect { color, rect } => {
                assert_eq!((rect.w, rect.h), (32, 32));
                Some(color.x)
            }
            _ => None,
        })
        .collect();
    assert_eq!(colors, vec![2.0, 1.0]);
}
