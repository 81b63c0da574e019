use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};

/// Axis-aligned rectangle in unit-space. `pos` is the corner with the smallest coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub pos: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(pos: Vec2, size: Vec2) -> Self {
        Self { pos, size }
    }

    pub fn center(&self) -> Vec2 {
        self.pos + self.size * 0.5
    }
}

/// Rectangle on the drawing surface, top-left corner plus size, in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }
}

/// State shared by every camera strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBase {
    pub position: Vec2,
    viewport: UVec2,
    pixels_per_unit: UVec2,
}

impl Default for CameraBase {
    fn default() -> Self {
        Self { position: Vec2::ZERO, viewport: UVec2::ONE, pixels_per_unit: UVec2::ONE }
    }
}

/// Maps unit-space geometry onto the pixel grid of the drawing surface.
///
/// Implementations only decide the matrix, the rect conversion and the axis directions; the rest is
/// shared through [`CameraBase`].
pub trait Camera {
    fn base(&self) -> &CameraBase;
    fn base_mut(&mut self) -> &mut CameraBase;

    /// Unit-space to camera-space to pixel-space, evaluated fresh on every call.
    fn projection_view(&self) -> Mat4;
    fn convert_rect(&self, rect: Rect, pv: &Mat4) -> PixelRect;
    fn up_direction(&self) -> Vec2;
    fn right_direction(&self) -> Vec2;

    fn position(&self) -> Vec2 {
        self.base().position
    }

    fn set_position(&mut self, position: Vec2) {
        self.base_mut().position = position;
    }

    fn viewport_size(&self) -> UVec2 {
        self.base().viewport
    }

    fn set_viewport_size(&mut self, size: UVec2) {
        self.base_mut().viewport = size;
    }

    fn unit_scale(&self) -> UVec2 {
        self.base().pixels_per_unit
    }

    /// Zero components are rejected and leave the scale unchanged.
    fn set_unit_scale(&mut self, pixels_per_unit: UVec2) {
        if pixels_per_unit.x > 0 && pixels_per_unit.y > 0 {
            self.base_mut().pixels_per_unit = pixels_per_unit;
        }
    }

    /// Visible area in units.
    fn size_in_units(&self) -> Vec2 {
        self.viewport_size().as_vec2() / self.unit_scale().as_vec2()
    }

    fn convert_rect_now(&self, rect: Rect) -> PixelRect {
        self.convert_rect(rect, &self.projection_view())
    }

    fn to_pixels(&self, pos: Vec2) -> Vec2 {
        transform_point(&self.projection_view(), pos)
    }

    fn to_units(&self, pixel: Vec2) -> Vec2 {
        transform_point(&self.projection_view().inverse(), pixel)
    }
}

pub fn transform_point(m: &Mat4, p: Vec2) -> Vec2 {
    let v = *m * Vec4::new(p.x, p.y, 0.0, 1.0);
    Vec2::new(v.x, v.y)
}

/// Pixel-space camera: origin top-left, Y grows downwards, the position is a pixel offset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelCamera {
    base: CameraBase,
}

impl PixelCamera {
    pub fn new(viewport: UVec2, pixels_per_unit: UVec2) -> Self {
        let mut camera = Self::default();
        camera.set_viewport_size(viewport);
        camera.set_unit_scale(pixels_per_unit);
        camera
    }
}

impl Camera for PixelCamera {
    fn base(&self) -> &CameraBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CameraBase {
        &mut self.base
    }

    fn projection_view(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(-self.base.position.x, -self.base.position.y, 0.0))
            * Mat4::from_scale(Vec3::new(self.base.pixels_per_unit.x as f32, self.base.pixels_per_unit.y as f32, 1.0))
    }

    fn convert_rect(&self, rect: Rect, pv: &Mat4) -> PixelRect {
        let pos = transform_point(pv, rect.pos);
        let size = rect.size * self.base.pixels_per_unit.as_vec2();
        PixelRect::new(pos.x as i32, pos.y as i32, size.x as i32, size.y as i32)
    }

    fn up_direction(&self) -> Vec2 {
        Vec2::new(0.0, -1.0)
    }

    fn right_direction(&self) -> Vec2 {
        Vec2::new(1.0, 0.0)
    }
}

/// Cartesian camera: the position is the unit-space point drawn at the viewport centre, Y grows upwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CartesianCamera {
    base: CameraBase,
}

impl CartesianCamera {
    pub fn new(viewport: UVec2, pixels_per_unit: UVec2) -> Self {
        let mut camera = Self::default();
        camera.set_viewport_size(viewport);
        camera.set_unit_scale(pixels_per_unit);
        camera
    }
}

impl Camera for CartesianCamera {
    fn base(&self) -> &CameraBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CameraBase {
        &mut self.base
    }

    fn projection_view(&self) -> Mat4 {
        let size = self.size_in_units();
        let (l, r, b, t) = (-size.x * 0.5, size.x * 0.5, -size.y * 0.5, size.y * 0.5);
        let (w, h) = (self.base.viewport.x as f32, self.base.viewport.y as f32);
        // Orthographic projection onto the viewport with the Y axis flipped.
        let proj = Mat4::from_translation(Vec3::new(l * w / (l - r), t * h / (t - b), 0.0))
            * Mat4::from_scale(Vec3::new(w / (r - l), h / (b - t), 1.0));
        let view = Mat4::from_translation(Vec3::new(-self.base.position.x, -self.base.position.y, 0.0));
        proj * view
    }

    fn convert_rect(&self, rect: Rect, pv: &Mat4) -> PixelRect {
        let pos = transform_point(pv, rect.pos);
        let size = rect.size * self.base.pixels_per_unit.as_vec2();
        // `rect.pos` is the bottom-left corner here, pixel rects start top-left.
        PixelRect::new(pos.x as i32, (pos.y - size.y) as i32, size.x as i32, size.y as i32)
    }

    fn up_direction(&self) -> Vec2 {
        Vec2::new(0.0, 1.0)
    }

    fn right_direction(&self) -> Vec2 {
        Vec2::new(1.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).abs().max_element() < 1e-3
    }

    #[test]
    fn pixel_camera_scales_then_offsets() {
        let mut camera = PixelCamera::new(UVec2::new(800, 600), UVec2::splat(10));
        assert!(approx(camera.to_pixels(Vec2::new(2.0, 3.0)), Vec2::new(20.0, 30.0)));
        camera.set_position(Vec2::new(5.0, 5.0));
        assert!(approx(camera.to_pixels(Vec2::new(2.0, 3.0)), Vec2::new(15.0, 25.0)));
        let rect = camera.convert_rect_now(Rect::new(Vec2::new(1.0, 1.0), Vec2::new(2.0, 0.5)));
        assert_eq!(rect, PixelRect::new(5, 5, 20, 5));
        assert_eq!(camera.up_direction(), Vec2::new(0.0, -1.0));
    }

    #[test]
    fn cartesian_camera_centres_its_position() {
        let mut camera = CartesianCamera::new(UVec2::new(800, 600), UVec2::splat(100));
        assert!(approx(camera.to_pixels(Vec2::ZERO), Vec2::new(400.0, 300.0)));
        assert!(approx(camera.to_pixels(Vec2::new(1.0, 1.0)), Vec2::new(500.0, 200.0)));
        camera.set_position(Vec2::new(1.0, 1.0));
        assert!(approx(camera.to_pixels(Vec2::new(1.0, 1.0)), Vec2::new(400.0, 300.0)));
        assert_eq!(camera.size_in_units(), Vec2::new(8.0, 6.0));
        assert_eq!(camera.up_direction(), Vec2::new(0.0, 1.0));
        assert_eq!(camera.right_direction(), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn cartesian_rect_starts_at_top_left() {
        let camera = CartesianCamera::new(UVec2::new(800, 600), UVec2::splat(100));
        let rect = camera.convert_rect_now(Rect::new(Vec2::new(-0.5, -0.5), Vec2::new(1.0, 1.0)));
        assert_eq!(rect, PixelRect::new(350, 250, 100, 100));
    }

    #[test]
    fn to_units_inverts_to_pixels() {
        let mut camera = CartesianCamera::new(UVec2::new(640, 480), UVec2::new(32, 16));
        camera.set_position(Vec2::new(-3.0, 2.5));
        let p = Vec2::new(1.25, -4.0);
        assert!(approx(camera.to_units(camera.to_pixels(p)), p));
    }

    #[test]
    fn non_positive_unit_scale_is_ignored() {
        let mut camera = PixelCamera::new(UVec2::new(100, 100), UVec2::splat(4));
        camera.set_unit_scale(UVec2::new(0, 8));
        assert_eq!(camera.unit_scale(), UVec2::splat(4));
    }
}
