//! Image mappers turn a volume, a camera and display settings into a
//! viewport-sized RGBA layer.
//!
//! Both mappers cut the volume with a slice plane that by default passes
//! through the camera focal point and faces the camera. [`ImageMapper3D`]
//! snaps that plane to the nearest voxel plane of the most aligned data
//! axis and draws the colour-mapped slice as a texture;
//! [`ImageResliceMapper`] resamples the scalars along the exact plane.

use std::fmt::Debug;
use std::sync::Arc;

use glam::DVec3;
use image::RgbaImage;
use log::debug;
use rayon::prelude::*;

use crate::camera::Camera;
use crate::color_mapper::ColorMapper;
use crate::enums::{InterpolationType, MapperKind, Orientation};
use crate::image_property::ImageProperty;
use crate::interpolator::Interpolator;
use crate::volume::Volume;

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Slack allowed when a sample point sits exactly on the slice border.
const EDGE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlicePlane {
    pub point: DVec3,
    pub normal: DVec3,
}

impl SlicePlane {
    /// Ray parameter where `origin + t * direction` meets the plane.
    fn intersect(&self, origin: DVec3, direction: DVec3) -> Option<f64> {
        let denominator = self.normal.dot(direction);
        if denominator.abs() < 1e-12 {
            return None;
        }
        Some(self.normal.dot(self.point - origin) / denominator)
    }
}

/// Where the slice plane comes from: the camera, or fixed values.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceSettings {
    pub use_focal_point_as_slice_point: bool,
    pub use_view_plane_normal_as_slice_normal: bool,
    pub slice_point: DVec3,
    pub slice_normal: DVec3,
}

impl Default for SliceSettings {
    fn default() -> Self {
        Self {
            use_focal_point_as_slice_point: true,
            use_view_plane_normal_as_slice_normal: true,
            slice_point: DVec3::ZERO,
            slice_normal: DVec3::Z,
        }
    }
}

impl SliceSettings {
    pub fn resolve(&self, camera: &Camera) -> SlicePlane {
        let point = if self.use_focal_point_as_slice_point {
            camera.focal_point()
        } else {
            self.slice_point
        };
        let normal = if self.use_view_plane_normal_as_slice_normal {
            camera.view_plane_normal()
        } else {
            self.slice_normal.normalize_or(DVec3::Z)
        };
        SlicePlane { point, normal }
    }
}

/// Per-pixel view rays for a camera and viewport size.
#[derive(Debug, Clone)]
pub(crate) struct ViewRays {
    position: DVec3,
    focal_point: DVec3,
    direction: DVec3,
    right: DVec3,
    up: DVec3,
    world_width: f64,
    world_height: f64,
    width: f64,
    height: f64,
    parallel: bool,
}

impl ViewRays {
    pub(crate) fn new(camera: &Camera, width: u32, height: u32) -> Self {
        let world_height = camera.focal_plane_height();
        Self {
            position: camera.position(),
            focal_point: camera.focal_point(),
            direction: camera.direction_of_projection(),
            right: camera.view_right(),
            up: camera.orthogonal_view_up(),
            world_width: world_height * width as f64 / height.max(1) as f64,
            world_height,
            width: width.max(1) as f64,
            height: height.max(1) as f64,
            parallel: camera.parallel_projection(),
        }
    }

    /// World point where the ray through pixel `(col, row)` meets `plane`.
    /// Row 0 is the top of the viewport.
    pub(crate) fn hit(&self, plane: &SlicePlane, col: f64, row: f64) -> Option<DVec3> {
        let u = ((col + 0.5) / self.width - 0.5) * self.world_width;
        let v = (0.5 - (row + 0.5) / self.height) * self.world_height;
        let on_focal_plane = self.focal_point + self.right * u + self.up * v;

        if self.parallel {
            let t = plane.intersect(on_focal_plane, self.direction)?;
            Some(on_focal_plane + self.direction * t)
        } else {
            let direction = (on_focal_plane - self.position).normalize_or(self.direction);
            let t = plane.intersect(self.position, direction)?;
            (t > 0.0).then(|| self.position + direction * t)
        }
    }
}

/// Shades every pixel of a `width` x `height` layer in parallel rows.
fn render_pixels<F>(width: u32, height: u32, shade: F) -> Option<RgbaImage>
where
    F: Fn(u32, u32) -> [u8; 4] + Sync,
{
    let pixel_data: Vec<u8> = (0..height)
        .into_par_iter()
        .flat_map(|row| {
            (0..width)
                .flat_map(|col| shade(col, row))
                .collect::<Vec<u8>>()
        })
        .collect();
    RgbaImage::from_raw(width, height, pixel_data)
}

pub trait ImageMapper: Debug + Send + Sync {
    fn kind(&self) -> MapperKind;

    fn input(&self) -> Option<&Arc<Volume>>;

    fn set_input(&mut self, volume: Option<Arc<Volume>>);

    fn slice_settings(&self) -> &SliceSettings;

    fn slice_settings_mut(&mut self) -> &mut SliceSettings;

    /// Bounds of the input, `None` without input.
    fn bounds(&self) -> Option<[f64; 6]> {
        self.input().map(|volume| volume.bounds())
    }

    fn slice_plane(&self, camera: &Camera) -> SlicePlane {
        self.slice_settings().resolve(camera)
    }

    /// Draws the slice into a transparent `width` x `height` layer.
    /// `None` when there is nothing to draw.
    fn render(
        &self,
        camera: &Camera,
        property: &ImageProperty,
        width: u32,
        height: u32,
    ) -> Option<RgbaImage>;
}

/// Builds the mapper for `kind` with `volume` as input.
pub fn create_mapper(kind: MapperKind, volume: Arc<Volume>) -> Box<dyn ImageMapper> {
    match kind {
        MapperKind::Direct => Box::new(ImageMapper3D::new(volume)),
        MapperKind::Reslice => Box::new(ImageResliceMapper::new(volume)),
    }
}

#[derive(Debug, Default)]
pub struct ImageMapper3D {
    input: Option<Arc<Volume>>,
    slice: SliceSettings,
}

impl ImageMapper3D {
    pub fn new(volume: Arc<Volume>) -> Self {
        Self {
            input: Some(volume),
            slice: SliceSettings::default(),
        }
    }

    /// Data axis most aligned with `normal`.
    fn dominant_axis(normal: DVec3) -> usize {
        let abs = normal.abs();
        if abs.x >= abs.y && abs.x >= abs.z {
            0
        } else if abs.y >= abs.z {
            1
        } else {
            2
        }
    }

    /// Axis, voxel index and world coordinate of the voxel plane nearest
    /// to `plane`, if it lies inside the volume.
    fn snapped_slice(volume: &Volume, plane: &SlicePlane) -> Option<(Orientation, usize, f64)> {
        let axis = Self::dominant_axis(plane.normal);
        let orientation = Orientation::from_axis(axis)?;
        let continuous = volume.world_to_continuous_index(plane.point)[axis];
        let index = (continuous + 0.5).floor();
        let size = [volume.dim().2, volume.dim().1, volume.dim().0][axis];
        if index < 0.0 || index >= size as f64 {
            return None;
        }
        let index = index as usize;
        let coordinate = volume.index_to_world(index as f64, index as f64, index as f64)[axis];
        Some((orientation, index, coordinate))
    }

    /// In-slice (column, row) coordinates of a continuous volume index.
    fn slice_coordinates(orientation: Orientation, index: DVec3) -> (f64, f64) {
        match orientation {
            Orientation::Axial => (index.x, index.y),
            Orientation::Coronal => (index.x, index.z),
            Orientation::Sagittal => (index.y, index.z),
        }
    }
}

impl ImageMapper for ImageMapper3D {
    fn kind(&self) -> MapperKind {
        MapperKind::Direct
    }

    fn input(&self) -> Option<&Arc<Volume>> {
        self.input.as_ref()
    }

    fn set_input(&mut self, volume: Option<Arc<Volume>>) {
        self.input = volume;
    }

    fn slice_settings(&self) -> &SliceSettings {
        &self.slice
    }

    fn slice_settings_mut(&mut self) -> &mut SliceSettings {
        &mut self.slice
    }

    fn render(
        &self,
        camera: &Camera,
        property: &ImageProperty,
        width: u32,
        height: u32,
    ) -> Option<RgbaImage> {
        let volume = self.input.as_deref()?;
        let plane = self.slice_plane(camera);
        let (orientation, index, coordinate) = Self::snapped_slice(volume, &plane)?;
        let slice = volume.get_slice_from_axis(index, &orientation)?;
        let (rows, cols) = slice.dim();
        if rows == 0 || cols == 0 {
            return None;
        }
        debug!("direct mapper: {orientation:?} slice {index} ({cols}x{rows})");

        let texture = ColorMapper::from_property(property).map_slice(&slice);
        let axis = orientation.axis();
        let mut normal = DVec3::ZERO;
        normal[axis] = 1.0;
        let mut point = DVec3::ZERO;
        point[axis] = coordinate;
        let texture_plane = SlicePlane { point, normal };

        let rays = ViewRays::new(camera, width, height);
        let max_col = (cols - 1) as f64;
        let max_row = (rows - 1) as f64;
        let interpolation = property.interpolation_type();

        render_pixels(width, height, |col, row| {
            let Some(world) = rays.hit(&texture_plane, col as f64, row as f64) else {
                return TRANSPARENT;
            };
            let (c, r) =
                Self::slice_coordinates(orientation, volume.world_to_continuous_index(world));
            let inside = (-EDGE_TOLERANCE..=max_col + EDGE_TOLERANCE).contains(&c)
                && (-EDGE_TOLERANCE..=max_row + EDGE_TOLERANCE).contains(&r);
            if !inside {
                return TRANSPARENT;
            }
            let tx = c.clamp(0.0, max_col);
            let ty = max_row - r.clamp(0.0, max_row);
            match interpolation {
                InterpolationType::Nearest => {
                    let x = ((tx + 0.5).floor() as u32).min(cols as u32 - 1);
                    let y = ((ty + 0.5).floor() as u32).min(rows as u32 - 1);
                    texture.get_pixel(x, y).0
                }
                InterpolationType::Linear | InterpolationType::Cubic => {
                    Interpolator::bilinear_rgba(&texture, tx, ty)
                }
            }
        })
    }
}

#[derive(Debug, Default)]
pub struct ImageResliceMapper {
    input: Option<Arc<Volume>>,
    slice: SliceSettings,
}

impl ImageResliceMapper {
    pub fn new(volume: Arc<Volume>) -> Self {
        Self {
            input: Some(volume),
            slice: SliceSettings::default(),
        }
    }
}

impl ImageMapper for ImageResliceMapper {
    fn kind(&self) -> MapperKind {
        MapperKind::Reslice
    }

    fn input(&self) -> Option<&Arc<Volume>> {
        self.input.as_ref()
    }

    fn set_input(&mut self, volume: Option<Arc<Volume>>) {
        self.input = volume;
    }

    fn slice_settings(&self) -> &SliceSettings {
        &self.slice
    }

    fn slice_settings_mut(&mut self) -> &mut SliceSettings {
        &mut self.slice
    }

    fn render(
        &self,
        camera: &Camera,
        property: &ImageProperty,
        width: u32,
        height: u32,
    ) -> Option<RgbaImage> {
        let volume = self.input.as_deref()?;
        let plane = self.slice_plane(camera);
        debug!(
            "reslice mapper: point {:?} normal {:?}",
            plane.point, plane.normal
        );

        let color_mapper = ColorMapper::from_property(property);
        let interpolation = property.interpolation_type();
        let rays = ViewRays::new(camera, width, height);

        render_pixels(width, height, |col, row| {
            rays.hit(&plane, col as f64, row as f64)
                .and_then(|world| {
                    Interpolator::sample_volume(
                        volume.data(),
                        volume.world_to_continuous_index(world),
                        interpolation,
                    )
                })
                .map_or(TRANSPARENT, |value| color_mapper.map_value(value))
        })
    }
}
