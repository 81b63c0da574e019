use crate::assets::TextureHandle;
use crate::camera::{Camera, PixelRect, Rect};
use crate::engine_assert;
use glam::{Mat4, Vec2, Vec4};
use std::f32::consts::TAU;

pub const WHITE: Vec4 = Vec4::ONE;

/// Off-screen destination for a render pass. `None` everywhere means the default surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTarget(pub u32);

/// Primitive handed to the drawing backend, already in pixel-space.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Clear { color: Vec4 },
    FillRect { rect: PixelRect, color: Vec4 },
    /// `rotation` is clockwise in degrees, as pixel-space backends expect.
    TexturedRect { rect: PixelRect, rotation: f32, tint: Vec4, texture: TextureHandle },
    OutlineRect { rect: PixelRect, color: Vec4 },
    Polyline { points: Vec<Vec2>, color: Vec4 },
    Line { from: Vec2, to: Vec2, color: Vec4 },
}

/// Drawing backend. Windowing and GPU contexts live behind this trait.
pub trait RenderSurface {
    fn set_target(&mut self, target: Option<RenderTarget>);
    fn draw(&mut self, call: DrawCall);
}

/// Backend that only records what it was asked to draw.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub calls: Vec<DrawCall>,
    pub target: Option<RenderTarget>,
    pub target_switches: Vec<Option<RenderTarget>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }
}

impl RenderSurface for RecordingSurface {
    fn set_target(&mut self, target: Option<RenderTarget>) {
        self.target = target;
        self.target_switches.push(target);
    }

    fn draw(&mut self, call: DrawCall) {
        self.calls.push(call);
    }
}

/// What a command sees while it executes.
pub struct FrameContext<'a> {
    pub camera: &'a dyn Camera,
    pub pv: Mat4,
    pub surface: &'a mut dyn RenderSurface,
}

impl FrameContext<'_> {
    pub fn convert_rect(&self, rect: Rect) -> PixelRect {
        self.camera.convert_rect(rect, &self.pv)
    }

    pub fn to_pixels(&self, pos: Vec2) -> Vec2 {
        crate::camera::transform_point(&self.pv, pos)
    }

    pub fn draw(&mut self, call: DrawCall) {
        self.surface.draw(call);
    }
}

pub type CommandFn = Box<dyn FnOnce(&mut FrameContext<'_>)>;

pub struct RenderCommand {
    pub layer: i32,
    draw: CommandFn,
}

/// One frame of layered draw commands.
///
/// Commands capture resolved values only; nothing submitted survives past [`RenderQueue::render`].
pub struct RenderQueue {
    commands: Vec<RenderCommand>,
    camera: Option<Box<dyn Camera>>,
    pv: Mat4,
    active_layer: i32,
    target: Option<RenderTarget>,
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderQueue {
    pub fn new() -> Self {
        Self { commands: Vec::new(), camera: None, pv: Mat4::IDENTITY, active_layer: 0, target: None }
    }

    /// Starts a pass: drops leftover commands and evaluates the camera matrix once.
    pub fn begin_render<C: Camera + Clone + 'static>(&mut self, camera: &C, target: Option<RenderTarget>) {
        self.commands.clear();
        self.pv = camera.projection_view();
        self.camera = Some(Box::new(camera.clone()));
        self.active_layer = 0;
        self.target = target;
    }

    pub fn projection_view(&self) -> Mat4 {
        self.pv
    }

    pub fn camera(&self) -> Option<&dyn Camera> {
        self.camera.as_deref()
    }

    pub fn set_layer(&mut self, layer: i32) {
        self.active_layer = layer;
    }

    pub fn layer(&self) -> i32 {
        self.active_layer
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Appends a command on the active layer.
    pub fn submit(&mut self, draw: impl FnOnce(&mut FrameContext<'_>) + 'static) {
        let layer = self.active_layer;
        self.submit_on(layer, draw);
    }

    pub fn submit_on(&mut self, layer: i32, draw: impl FnOnce(&mut FrameContext<'_>) + 'static) {
        self.commands.push(RenderCommand { layer, draw: Box::new(draw) });
    }

    pub fn draw_quad(&mut self, rect: Rect, color: Vec4) {
        self.submit(move |ctx| {
            let rect = ctx.convert_rect(rect);
            ctx.draw(DrawCall::FillRect { rect, color });
        });
    }

    /// `rotation` is counter-clockwise degrees in unit-space.
    pub fn draw_textured_quad(&mut self, rect: Rect, rotation: f32, tint: Vec4, texture: TextureHandle) {
        self.submit(move |ctx| {
            let pixel_rect = ctx.convert_rect(rect);
            ctx.draw(DrawCall::TexturedRect { rect: pixel_rect, rotation: -rotation, tint, texture });
        });
    }

    /// Outline rotated around the rect centre.
    pub fn draw_rect(&mut self, rect: Rect, rotation: f32, color: Vec4) {
        self.submit(move |ctx| {
            if rotation == 0.0 {
                let rect = ctx.convert_rect(rect);
                ctx.draw(DrawCall::OutlineRect { rect, color });
                return;
            }
            let center = rect.center();
            let (sin, cos) = rotation.to_radians().sin_cos();
            let corners = [
                rect.pos,
                rect.pos + Vec2::new(rect.size.x, 0.0),
                rect.pos + rect.size,
                rect.pos + Vec2::new(0.0, rect.size.y),
                rect.pos,
            ];
            let points = corners
                .iter()
                .map(|&p| {
                    let d = p - center;
                    ctx.to_pixels(center + Vec2::new(d.x * cos - d.y * sin, d.x * sin + d.y * cos))
                })
                .collect();
            ctx.draw(DrawCall::Polyline { points, color });
        });
    }

    pub fn draw_circle(&mut self, center: Vec2, radius: f32, color: Vec4, precision: u32) {
        let bounds = Rect::new(center - Vec2::splat(radius), Vec2::splat(radius * 2.0));
        let segments = precision.max(3);
        self.submit(move |ctx| {
            let rect = ctx.convert_rect(bounds);
            let mid = Vec2::new(rect.x as f32 + rect.w as f32 * 0.5, rect.y as f32 + rect.h as f32 * 0.5);
            let half = Vec2::new(rect.w as f32 * 0.5, rect.h as f32 * 0.5);
            let step = TAU / segments as f32;
            let points = (0..=segments)
                .map(|i| {
                    let angle = step * i as f32;
                    mid + Vec2::new(angle.cos(), angle.sin()) * half
                })
                .collect();
            ctx.draw(DrawCall::Polyline { points, color });
        });
    }

    pub fn draw_line(&mut self, from: Vec2, to: Vec2, color: Vec4) {
        self.submit(move |ctx| {
            let (from, to) = (ctx.to_pixels(from), ctx.to_pixels(to));
            ctx.draw(DrawCall::Line { from, to, color });
        });
    }

    /// Clears the surface immediately, outside of layer ordering.
    pub fn clear(&self, surface: &mut dyn RenderSurface, color: Vec4) {
        surface.draw(DrawCall::Clear { color });
    }

    /// Executes every queued command, lowest layer first. Equal layers keep submission order.
    pub fn render(&mut self, surface: &mut dyn RenderSurface) {
        let Some(camera) = self.camera.as_deref() else {
            engine_assert!(false, "[render] render() called outside begin_render/end_render");
            self.commands.clear();
            return;
        };
        surface.set_target(self.target);
        let mut commands = std::mem::take(&mut self.commands);
        commands.sort_by_key(|command| command.layer);
        let mut ctx = FrameContext { camera, pv: self.pv, surface };
        for command in commands {
            (command.draw)(&mut ctx);
        }
    }

    /// Ends the pass and restores the default target.
    pub fn end_render(&mut self, surface: &mut dyn RenderSurface) {
        self.commands.clear();
        self.camera = None;
        if self.target.take().is_some() {
            surface.set_target(None);
        }
    }
}
