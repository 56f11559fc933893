use crate::enums::InterpolationType;
use crate::enums::Orientation;
use crate::interpolator::Interpolator;

use glam::DVec3;
use image::GrayImage;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("extent {extent:?} does not match data shape (depth, height, width) {shape:?}")]
    ExtentMismatch {
        extent: [i32; 6],
        shape: (usize, usize, usize),
    },
}

/// A 16-bit scalar volume laid out as `[k, j, i]` (z, y, x).
///
/// `extent` gives the structured index range of the data, so voxel
/// `data[[k, j, i]]` sits at world position
/// `origin + (extent_min + (i, j, k)) * spacing`.
#[derive(Debug, Default, Clone)]
pub struct Volume {
    pub data: Array3<u16>,
    pub extent: [i32; 6],
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    pub interpolated_dim: (u32, u32, u32),
}

impl Volume {
    pub fn new(data: Array3<u16>, spacing: [f64; 3]) -> Self {
        let (depth, height, width) = data.dim();
        let extent = [
            0,
            width as i32 - 1,
            0,
            height as i32 - 1,
            0,
            depth as i32 - 1,
        ];
        Self {
            interpolated_dim: Interpolator::get_isotropic_dimensions(spacing, data.dim()),
            data,
            extent,
            spacing,
            origin: [0.0; 3],
        }
    }

    pub fn with_geometry(
        data: Array3<u16>,
        extent: [i32; 6],
        spacing: [f64; 3],
        origin: [f64; 3],
    ) -> Result<Self, VolumeError> {
        let (depth, height, width) = data.dim();
        let e = extent.map(i64::from);
        let spans = [e[1] - e[0] + 1, e[3] - e[2] + 1, e[5] - e[4] + 1];
        if spans != [width as i64, height as i64, depth as i64] {
            return Err(VolumeError::ExtentMismatch {
                extent,
                shape: data.dim(),
            });
        }
        Ok(Self {
            interpolated_dim: Interpolator::get_isotropic_dimensions(spacing, data.dim()),
            data,
            extent,
            spacing,
            origin,
        })
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<u16> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<u16> {
        &mut self.data
    }

    pub fn extent(&self) -> [i32; 6] {
        self.extent
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// World-space bounds `[xmin, xmax, ymin, ymax, zmin, zmax]` of the
    /// voxel centres. Negative spacing swaps the ends of an axis.
    pub fn bounds(&self) -> [f64; 6] {
        let mut bounds = [0.0; 6];
        for axis in 0..3 {
            let swap = usize::from(self.spacing[axis] < 0.0);
            bounds[2 * axis] =
                self.origin[axis] + self.extent[2 * axis + swap] as f64 * self.spacing[axis];
            bounds[2 * axis + 1] =
                self.origin[axis] + self.extent[2 * axis + 1 - swap] as f64 * self.spacing[axis];
        }
        bounds
    }

    pub fn center(&self) -> DVec3 {
        let b = self.bounds();
        DVec3::new(
            0.5 * (b[0] + b[1]),
            0.5 * (b[2] + b[3]),
            0.5 * (b[4] + b[5]),
        )
    }

    /// Converts a world position to a continuous array index `(i, j, k)`.
    pub fn world_to_continuous_index(&self, point: DVec3) -> DVec3 {
        let origin = DVec3::from_array(self.origin);
        let spacing = DVec3::from_array(self.spacing);
        let extent_min = DVec3::new(
            self.extent[0] as f64,
            self.extent[2] as f64,
            self.extent[4] as f64,
        );
        (point - origin) / spacing - extent_min
    }

    /// World position of the voxel at array index `(i, j, k)`.
    pub fn index_to_world(&self, i: f64, j: f64, k: f64) -> DVec3 {
        DVec3::new(
            self.origin[0] + (self.extent[0] as f64 + i) * self.spacing[0],
            self.origin[1] + (self.extent[2] as f64 + j) * self.spacing[1],
            self.origin[2] + (self.extent[4] as f64 + k) * self.spacing[2],
        )
    }

    pub fn value_at(&self, i: usize, j: usize, k: usize) -> Option<u16> {
        self.data.get([k, j, i]).copied()
    }

    /// Smallest and largest stored value; `(0, 0)` for an empty volume.
    pub fn scalar_range(&self) -> (u16, u16) {
        if self.data.is_empty() {
            return (0, 0);
        }
        self.data
            .par_iter()
            .fold(
                || (u16::MAX, u16::MIN),
                |(lo, hi), &v| (lo.min(v), hi.max(v)),
            )
            .reduce(
                || (u16::MAX, u16::MIN),
                |a, b| (a.0.min(b.0), a.1.max(b.1)),
            )
    }

    /// Number of slices along the axis normal to `orientation`.
    fn slice_count(&self, orientation: &Orientation) -> usize {
        let (depth, height, width) = self.data.dim();
        match orientation {
            Orientation::Axial => depth,
            Orientation::Coronal => height,
            Orientation::Sagittal => width,
        }
    }

    /// View of one voxel plane, rows indexed by the slower in-plane axis.
    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: &Orientation,
    ) -> Option<ArrayView2<'_, u16>> {
        if index >= self.slice_count(orientation) {
            return None;
        }
        Some(match orientation {
            Orientation::Axial => self.data.slice(s![index, .., ..]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., index]),
        })
    }

    /// Greyscale export of an axis slice, stretched over the scalar range
    /// of the whole volume and drawn with the higher row index on top.
    ///
    /// With `Linear` or `Cubic` interpolation coronal and sagittal slices
    /// are resampled to isotropic pixels; axial slices keep their size.
    pub fn get_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
        interpolation: InterpolationType,
    ) -> Option<GrayImage> {
        let slice = self.get_slice_from_axis(index, &orientation)?;
        let (rows, cols) = slice.dim();
        if rows == 0 || cols == 0 {
            return None;
        }

        let (lo, hi) = self.scalar_range();
        let scale = if hi > lo { 255.0 / f32::from(hi - lo) } else { 0.0 };
        let to_grey = move |value: f32| ((value - f32::from(lo)) * scale).round().clamp(0.0, 255.0) as u8;

        let resample = !matches!(interpolation, InterpolationType::Nearest)
            && !matches!(orientation, Orientation::Axial);
        let (width, height) = if resample {
            let (d, h, w) = self.interpolated_dim;
            match orientation {
                Orientation::Coronal => (w, d),
                _ => (h, d),
            }
        } else {
            (cols as u32, rows as u32)
        };

        let pixels: Vec<u8> = (0..height)
            .into_par_iter()
            .flat_map_iter(move |y| {
                let row = height - 1 - y;
                (0..width).map(move |x| {
                    if !resample {
                        return to_grey(f32::from(slice[[row as usize, x as usize]]));
                    }
                    // pixel centres mapped back onto the voxel grid
                    let sx = ((x as f32 + 0.5) * cols as f32 / width as f32 - 0.5)
                        .clamp(0.0, (cols - 1) as f32);
                    let sy = ((row as f32 + 0.5) * rows as f32 / height as f32 - 0.5)
                        .clamp(0.0, (rows - 1) as f32);
                    to_grey(Interpolator::bilinear_interpolate(&slice, sy, sx))
                })
            })
            .collect();

        GrayImage::from_raw(width, height, pixels)
    }
}
