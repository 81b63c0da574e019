use super::System;
use crate::camera::Rect;
use crate::ecs::types::{Sprite, Transform};
use crate::ecs::world::SceneWorld;
use crate::renderer::RenderQueue;
use anyhow::Result;

/// Submits one quad per entity carrying both a transform and a sprite.
#[derive(Default)]
pub struct RenderSystem;

impl RenderSystem {
    pub fn new() -> Self {
        Self
    }
}

impl System for RenderSystem {
    fn render(&mut self, world: &mut SceneWorld, queue: &mut RenderQueue) -> Result<()> {
        for entity in world.view::<(Transform, Sprite)>() {
            let (Some(transform), Some(sprite)) = (world.get::<Transform>(entity), world.get::<Sprite>(entity)) else {
                continue;
            };
            let size = sprite.unit_size() * transform.scale;
            let rect = Rect::new(transform.position - size * 0.5, size);
            queue.set_layer(transform.layer);
            match &sprite.texture {
                Some(texture) => queue.draw_textured_quad(rect, transform.rotation, sprite.color, texture.clone()),
                None => queue.draw_quad(rect, sprite.color),
            }
        }
        Ok(())
    }
}
