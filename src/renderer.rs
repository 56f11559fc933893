//! Scene container: image props, background and the active camera.

use glam::DVec3;
use image::{Rgba, RgbaImage};
use log::{debug, warn};

use crate::camera::Camera;
use crate::image_slice::ImageSlice;

/// Fraction of the far plane the near plane is kept beyond.
const NEAR_CLIPPING_PLANE_TOLERANCE: f64 = 0.001;
/// Extra depth added on both sides of the bounds when fitting the
/// clipping range, as a fraction of the bounds depth.
const CLIPPING_RANGE_EXPANSION: f64 = 0.5;

#[derive(Debug)]
pub struct Renderer {
    props: Vec<ImageSlice>,
    background: [f64; 3],
    camera: Camera,
    camera_positioned: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            props: Vec::new(),
            background: [0.0; 3],
            camera: Camera::default(),
            camera_positioned: false,
        }
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a prop and returns its index.
    pub fn add_view_prop(&mut self, prop: ImageSlice) -> usize {
        self.props.push(prop);
        self.props.len() - 1
    }

    pub fn props(&self) -> &[ImageSlice] {
        &self.props
    }

    pub fn prop_mut(&mut self, index: usize) -> Option<&mut ImageSlice> {
        self.props.get_mut(index)
    }

    pub fn background(&self) -> [f64; 3] {
        self.background
    }

    /// RGB in `[0, 1]`.
    pub fn set_background(&mut self, r: f64, g: f64, b: f64) {
        self.background = [r, g, b];
    }

    pub fn active_camera(&self) -> &Camera {
        &self.camera
    }

    pub fn active_camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Replaces the camera; it is then considered positioned and the first
    /// render will not reset it.
    pub fn set_active_camera(&mut self, camera: Camera) {
        self.camera = camera;
        self.camera_positioned = true;
    }

    pub fn is_camera_positioned(&self) -> bool {
        self.camera_positioned
    }

    /// Union of the bounds of all visible props.
    pub fn visible_bounds(&self) -> Option<[f64; 6]> {
        self.props
            .iter()
            .filter(|prop| prop.visibility())
            .filter_map(ImageSlice::bounds)
            .reduce(|a, b| {
                [
                    a[0].min(b[0]),
                    a[1].max(b[1]),
                    a[2].min(b[2]),
                    a[3].max(b[3]),
                    a[4].min(b[4]),
                    a[5].max(b[5]),
                ]
            })
    }

    /// Frames the visible props: the focal point moves to the centre of the
    /// bounds and the camera backs off along its view plane normal until
    /// the bounding sphere fits the view angle.
    pub fn reset_camera(&mut self) {
        let Some(bounds) = self.visible_bounds() else {
            warn!("cannot reset camera: no visible props");
            return;
        };
        let center = DVec3::new(
            0.5 * (bounds[0] + bounds[1]),
            0.5 * (bounds[2] + bounds[3]),
            0.5 * (bounds[4] + bounds[5]),
        );
        let size = DVec3::new(
            bounds[1] - bounds[0],
            bounds[3] - bounds[2],
            bounds[5] - bounds[4],
        );
        let mut radius = 0.5 * size.length();
        if radius == 0.0 {
            radius = 1.0;
        }

        let camera = &mut self.camera;
        let view_plane_normal = camera.view_plane_normal();
        let view_up = camera.view_up();
        if view_up.dot(view_plane_normal).abs() > 0.999 {
            warn!("view up parallel to view plane normal, resetting view up");
            camera.set_view_up(DVec3::new(-view_up.z, view_up.x, view_up.y));
        }

        let distance = radius / (0.5 * camera.view_angle().to_radians()).sin();
        camera.set_focal_point(center);
        camera.set_position(center + view_plane_normal * distance);
        camera.set_parallel_scale(radius);
        self.camera_positioned = true;
        debug!("camera reset: focal point {center:?}, distance {distance}");

        self.reset_camera_clipping_range();
    }

    /// Fits the near and far planes around the visible bounds.
    pub fn reset_camera_clipping_range(&mut self) {
        let Some(bounds) = self.visible_bounds() else {
            return;
        };
        let direction = self.camera.direction_of_projection();
        let offset = -direction.dot(self.camera.position());

        let (mut near, mut far) = (f64::MAX, f64::MIN);
        for x in [bounds[0], bounds[1]] {
            for y in [bounds[2], bounds[3]] {
                for z in [bounds[4], bounds[5]] {
                    let depth = direction.dot(DVec3::new(x, y, z)) + offset;
                    near = near.min(depth);
                    far = far.max(depth);
                }
            }
        }

        near = near.max(0.0);
        near = 0.99 * near - (far - near) * CLIPPING_RANGE_EXPANSION;
        far = 1.01 * far + (far - near) * CLIPPING_RANGE_EXPANSION;
        if near >= far {
            near = 0.01 * far;
        }
        if near < NEAR_CLIPPING_PLANE_TOLERANCE * far {
            near = NEAR_CLIPPING_PLANE_TOLERANCE * far;
        }
        self.camera.set_clipping_range(near, far);
    }

    /// Clears to the background and composites every visible prop over it.
    pub fn render(&mut self, width: u32, height: u32) -> RgbaImage {
        if !self.camera_positioned {
            self.reset_camera();
        }
        let mut frame = RgbaImage::from_pixel(width, height, self.background_pixel());
        self.composite(&mut frame);
        frame
    }

    /// Composites the props over an existing frame without clearing it.
    pub(crate) fn composite(&self, frame: &mut RgbaImage) {
        let (width, height) = frame.dimensions();
        for layer in self
            .props
            .iter()
            .filter_map(|prop| prop.render(&self.camera, width, height))
        {
            blend_over(frame, &layer);
        }
    }

    pub(crate) fn background_pixel(&self) -> Rgba<u8> {
        let [r, g, b] = self.background.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        Rgba([r, g, b, 255])
    }
}

/// `dst = src * a + dst * (1 - a)` per channel, with 8-bit rounding.
fn blend_over(frame: &mut RgbaImage, layer: &RgbaImage) {
    for (dst, src) in frame.pixels_mut().zip(layer.pixels()) {
        let alpha = src[3] as u32;
        match alpha {
            0 => {}
            255 => *dst = Rgba([src[0], src[1], src[2], 255]),
            _ => {
                for c in 0..3 {
                    dst[c] = ((src[c] as u32 * alpha + dst[c] as u32 * (255 - alpha) + 127) / 255)
                        as u8;
                }
                dst[3] = 255;
            }
        }
    }
}
