use glam::DVec3;
use image::RgbaImage;
use ndarray::{Array3, ArrayView2};

use crate::enums::InterpolationType;

/// Slack allowed when a sample point sits exactly on the volume border.
const EDGE_TOLERANCE: f64 = 1e-6;

pub(crate) struct Interpolator;

impl Interpolator {
    pub(crate) fn get_isotropic_dimensions(
        spacing: [f64; 3],
        original_dim: (usize, usize, usize),
    ) -> (u32, u32, u32) {
        let [x_spacing, y_spacing, z_spacing] = spacing.map(f64::abs);
        let min_spacing = x_spacing.min(y_spacing).min(z_spacing);
        if min_spacing <= 0.0 {
            return (
                original_dim.0 as u32,
                original_dim.1 as u32,
                original_dim.2 as u32,
            );
        }
        let inv_min_spacing = 1.0 / min_spacing;

        // original_dim is (depth, height, width) corresponding to (z, y, x)
        let new_x = (original_dim.2 as f64 * x_spacing * inv_min_spacing) as u32;
        let new_y = (original_dim.1 as f64 * y_spacing * inv_min_spacing) as u32;
        let new_z = (original_dim.0 as f64 * z_spacing * inv_min_spacing) as u32;

        (new_z, new_y, new_x)
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<u16>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]] as f32;
        let v01 = slice[[y0, x1]] as f32;
        let v10 = slice[[y1, x0]] as f32;
        let v11 = slice[[y1, x1]] as f32;

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Samples an RGBA texture at continuous pixel coordinates.
    pub(crate) fn bilinear_rgba(texture: &RgbaImage, x: f64, y: f64) -> [u8; 4] {
        let (width, height) = texture.dimensions();
        let x = x.clamp(0.0, (width - 1) as f64);
        let y = y.clamp(0.0, (height - 1) as f64);

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let dx = x - x0 as f64;
        let dy = y - y0 as f64;

        let p00 = texture.get_pixel(x0, y0).0;
        let p01 = texture.get_pixel(x1, y0).0;
        let p10 = texture.get_pixel(x0, y1).0;
        let p11 = texture.get_pixel(x1, y1).0;

        std::array::from_fn(|c| {
            let top = p00[c] as f64 * (1.0 - dx) + p01[c] as f64 * dx;
            let bottom = p10[c] as f64 * (1.0 - dx) + p11[c] as f64 * dx;
            (top * (1.0 - dy) + bottom * dy + 0.5).clamp(0.0, 255.0) as u8
        })
    }

    /// Samples `data` (indexed `[k, j, i]`) at the continuous index
    /// `(i, j, k)`. Returns `None` outside the sampled grid.
    pub(crate) fn sample_volume(
        data: &Array3<u16>,
        index: DVec3,
        interpolation: InterpolationType,
    ) -> Option<f64> {
        let (depth, height, width) = data.dim();
        if depth == 0 || height == 0 || width == 0 {
            return None;
        }
        let i = Self::clamp_to_grid(index.x, width)?;
        let j = Self::clamp_to_grid(index.y, height)?;
        let k = Self::clamp_to_grid(index.z, depth)?;

        let value = match interpolation {
            InterpolationType::Nearest => {
                let i = ((i + 0.5).floor() as usize).min(width - 1);
                let j = ((j + 0.5).floor() as usize).min(height - 1);
                let k = ((k + 0.5).floor() as usize).min(depth - 1);
                data[[k, j, i]] as f64
            }
            InterpolationType::Linear => Self::trilinear(data, i, j, k),
            InterpolationType::Cubic => Self::tricubic(data, i, j, k),
        };
        Some(value)
    }

    fn clamp_to_grid(coordinate: f64, size: usize) -> Option<f64> {
        let max = (size - 1) as f64;
        if !(-EDGE_TOLERANCE..=max + EDGE_TOLERANCE).contains(&coordinate) {
            return None;
        }
        Some(coordinate.clamp(0.0, max))
    }

    fn trilinear(data: &Array3<u16>, i: f64, j: f64, k: f64) -> f64 {
        let (depth, height, width) = data.dim();
        let (i0, j0, k0) = (i.floor() as usize, j.floor() as usize, k.floor() as usize);
        let i1 = (i0 + 1).min(width - 1);
        let j1 = (j0 + 1).min(height - 1);
        let k1 = (k0 + 1).min(depth - 1);
        let (fx, fy, fz) = (i - i0 as f64, j - j0 as f64, k - k0 as f64);

        let lerp = |a: u16, b: u16, t: f64| (a as f64).mul_add(1.0 - t, b as f64 * t);

        let c00 = lerp(data[[k0, j0, i0]], data[[k0, j0, i1]], fx);
        let c01 = lerp(data[[k0, j1, i0]], data[[k0, j1, i1]], fx);
        let c10 = lerp(data[[k1, j0, i0]], data[[k1, j0, i1]], fx);
        let c11 = lerp(data[[k1, j1, i0]], data[[k1, j1, i1]], fx);

        let c0 = c00.mul_add(1.0 - fy, c01 * fy);
        let c1 = c10.mul_add(1.0 - fy, c11 * fy);
        c0.mul_add(1.0 - fz, c1 * fz)
    }

    /// Catmull-Rom weights for the four taps around a fractional offset.
    fn cubic_weights(t: f64) -> [f64; 4] {
        let t2 = t * t;
        let t3 = t2 * t;
        [
            0.5 * (-t3 + 2.0 * t2 - t),
            0.5 * (3.0 * t3 - 5.0 * t2 + 2.0),
            0.5 * (-3.0 * t3 + 4.0 * t2 + t),
            0.5 * (t3 - t2),
        ]
    }

    fn tricubic(data: &Array3<u16>, i: f64, j: f64, k: f64) -> f64 {
        let (depth, height, width) = data.dim();
        let taps = |coordinate: f64, size: usize| -> ([usize; 4], [f64; 4]) {
            let base = coordinate.floor() as isize;
            let weights = Self::cubic_weights(coordinate - base as f64);
            let indices =
                std::array::from_fn(|n| (base - 1 + n as isize).clamp(0, size as isize - 1) as usize);
            (indices, weights)
        };
        let (ii, wi) = taps(i, width);
        let (jj, wj) = taps(j, height);
        let (kk, wk) = taps(k, depth);

        let mut value = 0.0;
        for (&kz, &wz) in kk.iter().zip(&wk) {
            for (&jy, &wy) in jj.iter().zip(&wj) {
                for (&ix, &wx) in ii.iter().zip(&wi) {
                    value += data[[kz, jy, ix]] as f64 * wx * wy * wz;
                }
            }
        }
        value.clamp(0.0, u16::MAX as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn ramp() -> Array3<u16> {
        Array3::from_shape_fn((3, 3, 4), |(k, j, i)| (i + 10 * j + 100 * k) as u16)
    }

    #[test]
    fn isotropic_dimensions_scale_by_smallest_spacing() {
        let dims = Interpolator::get_isotropic_dimensions([3.2, 3.2, 1.5], (93, 64, 64));
        assert_eq!(dims, (93, 136, 136));
    }

    #[test]
    fn nearest_rounds_half_up() {
        let data = ramp();
        let value =
            Interpolator::sample_volume(&data, DVec3::new(1.5, 0.0, 0.0), InterpolationType::Nearest);
        assert_eq!(value, Some(2.0));
    }

    #[test]
    fn trilinear_is_exact_on_linear_data() {
        let data = ramp();
        let value =
            Interpolator::sample_volume(&data, DVec3::new(1.5, 0.5, 1.25), InterpolationType::Linear)
                .unwrap();
        assert!((value - (1.5 + 5.0 + 125.0)).abs() < 1e-9);
    }

    #[test]
    fn cubic_reproduces_grid_values() {
        let data = ramp();
        let value =
            Interpolator::sample_volume(&data, DVec3::new(2.0, 1.0, 1.0), InterpolationType::Cubic)
                .unwrap();
        assert!((value - 112.0).abs() < 1e-9);
    }

    #[test]
    fn samples_outside_the_grid_are_rejected() {
        let data = ramp();
        for point in [DVec3::new(-0.5, 0.0, 0.0), DVec3::new(0.0, 2.01, 0.0)] {
            assert_eq!(
                Interpolator::sample_volume(&data, point, InterpolationType::Linear),
                None
            );
        }
    }

    #[test]
    fn bilinear_rgba_blends_neighbours() {
        let mut texture = RgbaImage::new(2, 1);
        texture.put_pixel(0, 0, image::Rgba([0, 0, 0, 255]));
        texture.put_pixel(1, 0, image::Rgba([200, 100, 50, 255]));
        assert_eq!(Interpolator::bilinear_rgba(&texture, 0.5, 0.0), [100, 50, 25, 255]);
    }
}
