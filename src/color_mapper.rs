//! Conversion of scalar samples to display colours.
//!
//! Without a lookup table the window/level pair becomes a linear
//! shift/scale onto grey levels; with one, window/level picks the range
//! the table is spread over.

use std::sync::Arc;

use image::RgbaImage;
use ndarray::{Array4, ArrayView2};
use rayon::prelude::*;

use crate::image_property::ImageProperty;
use crate::lookup_table::LookupTable;
use crate::volume::Volume;

/// Scale used when the window collapses to zero width.
const INFINITE_SCALE: f64 = 1e32;

#[derive(Debug, Clone)]
pub enum ColorMapper {
    WindowLevel {
        shift: f64,
        scale: f64,
        alpha: u8,
    },
    Lookup {
        table: Arc<LookupTable>,
        range: (f64, f64),
        alpha: f64,
    },
}

/// Largest scaled shift kept on the fixed-point path (2^52).
const MAX_FIXED_SHIFT: f64 = 4_503_599_627_370_496.0;

/// Fixed-point form of a shift/scale pair for 16-bit input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IntegerShiftScale {
    scale: i64,
    shift: i64,
    bits: u32,
}

impl IntegerShiftScale {
    /// Picks the largest fraction width for which `u16::MAX * scale`
    /// stays clear of `i32` overflow. `None` when even zero bits overflow
    /// or the scaled shift leaves the exactly representable range.
    fn new(shift: f64, scale: f64) -> Option<Self> {
        let abs_scale = scale.abs();
        let mut bits: i32 = 0;
        while bits < 62
            && (1i64 << bits) as f64 * abs_scale * 2.0 * (u16::MAX as f64) < (i32::MAX as f64)
        {
            bits += 1;
        }
        bits -= 1;
        if bits < 0 {
            return None;
        }
        let int_scale = (scale * (1i64 << bits) as f64) as i64;
        let scaled_shift = int_scale as f64 * shift;
        if !scaled_shift.is_finite() || scaled_shift.abs() > MAX_FIXED_SHIFT {
            return None;
        }
        let int_shift = scaled_shift as i64;
        Some(Self {
            scale: int_scale,
            shift: int_shift,
            bits: bits as u32,
        })
    }

    #[inline]
    fn apply(&self, value: u16) -> u8 {
        let scaled = (value as i64 * self.scale).saturating_add(self.shift);
        if scaled < 0 {
            0
        } else {
            (scaled >> self.bits).min(255) as u8
        }
    }
}

impl ColorMapper {
    pub fn from_property(property: &ImageProperty) -> Self {
        let window = property.color_window();
        let level = property.color_level();

        match property.lookup_table() {
            Some(table) => {
                let range = if property.use_lookup_table_scalar_range() {
                    table.table_range()
                } else {
                    property.window_range()
                };
                ColorMapper::Lookup {
                    table: Arc::clone(table),
                    range,
                    alpha: property.opacity(),
                }
            }
            None => ColorMapper::WindowLevel {
                shift: 0.5 * window - level,
                scale: if window != 0.0 {
                    255.0 / window
                } else {
                    INFINITE_SCALE
                },
                alpha: (property.opacity() * 255.0 + 0.5) as u8,
            },
        }
    }

    #[inline]
    pub fn map_value(&self, value: f64) -> [u8; 4] {
        match self {
            ColorMapper::WindowLevel {
                shift,
                scale,
                alpha,
            } => {
                let grey = ((value + shift) * scale).clamp(0.0, 255.0) as u8;
                [grey, grey, grey, *alpha]
            }
            ColorMapper::Lookup {
                table,
                range,
                alpha,
            } => table.map_value_in_range(value, *range, *alpha),
        }
    }

    /// Colour-maps a 2D slice whose rows run along increasing `j`. Image
    /// row 0 holds the last slice row so the picture is upright.
    pub fn map_slice(&self, slice: &ArrayView2<'_, u16>) -> RgbaImage {
        let (rows, cols) = slice.dim();
        let integer = match self {
            ColorMapper::WindowLevel { shift, scale, .. } => {
                IntegerShiftScale::new(*shift, *scale)
            }
            ColorMapper::Lookup { .. } => None,
        };

        let pixel_data: Vec<u8> = (0..rows)
            .into_par_iter()
            .flat_map(|y| {
                let row = slice.row(rows - 1 - y);
                row.iter()
                    .flat_map(|&v| match (self, integer) {
                        (ColorMapper::WindowLevel { alpha, .. }, Some(fixed)) => {
                            let grey = fixed.apply(v);
                            [grey, grey, grey, *alpha]
                        }
                        _ => self.map_value(v as f64),
                    })
                    .collect::<Vec<u8>>()
            })
            .collect();

        // The buffer is exactly rows * cols * 4 bytes.
        RgbaImage::from_raw(cols as u32, rows as u32, pixel_data).unwrap_or_default()
    }

    /// Maps every voxel to RGBA, shaped `[k, j, i, channel]`.
    pub fn map_volume(&self, volume: &Volume) -> Array4<u8> {
        let (depth, height, width) = volume.dim();
        let colors: Vec<u8> = volume
            .data()
            .as_standard_layout()
            .as_slice()
            .unwrap_or_default()
            .par_iter()
            .flat_map_iter(|&v| self.map_value(v as f64))
            .collect();
        Array4::from_shape_vec((depth, height, width, 4), colors)
            .unwrap_or_else(|_| Array4::zeros((depth, height, width, 4)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::RampType;
    use ndarray::{Array3, array};

    fn head_property() -> ImageProperty {
        let mut property = ImageProperty::new();
        property.set_color_window(2000.0);
        property.set_color_level(1000.0);
        property
    }

    #[test]
    fn window_level_maps_linearly_onto_grey() {
        let mapper = ColorMapper::from_property(&head_property());
        assert_eq!(mapper.map_value(0.0), [0, 0, 0, 255]);
        assert_eq!(mapper.map_value(1000.0), [127, 127, 127, 255]);
        assert_eq!(mapper.map_value(2000.0), [255, 255, 255, 255]);
        assert_eq!(mapper.map_value(-50.0)[0], 0);
        assert_eq!(mapper.map_value(4000.0)[0], 255);
    }

    #[test]
    fn zero_window_thresholds_at_level() {
        let mut property = head_property();
        property.set_color_window(0.0);
        let mapper = ColorMapper::from_property(&property);
        assert_eq!(mapper.map_value(999.0)[0], 0);
        assert_eq!(mapper.map_value(1001.0)[0], 255);
    }

    #[test]
    fn integer_path_agrees_with_float_path() {
        let mapper = ColorMapper::from_property(&head_property());
        let fixed = IntegerShiftScale::new(0.0, 255.0 / 2000.0).unwrap();
        for v in (0..=4000u16).step_by(37) {
            let exact = mapper.map_value(v as f64)[0] as i32;
            assert!((fixed.apply(v) as i32 - exact).abs() <= 1, "value {v}");
        }
    }

    #[test]
    fn huge_scale_has_no_integer_form() {
        assert_eq!(IntegerShiftScale::new(0.0, INFINITE_SCALE), None);
    }

    #[test]
    fn extreme_levels_fall_back_to_float_path() {
        let mut property = head_property();
        for level in [-2e15, 2e15, -1e300] {
            property.set_color_level(level);
            let mapper = ColorMapper::from_property(&property);
            let ColorMapper::WindowLevel { shift, scale, .. } = mapper else {
                panic!("expected window/level mapping");
            };
            assert_eq!(IntegerShiftScale::new(shift, scale), None, "level {level}");
            let slice = array![[0u16, 1, u16::MAX]];
            let image = mapper.map_slice(&slice.view());
            for (x, &v) in slice.iter().enumerate() {
                assert_eq!(image.get_pixel(x as u32, 0).0, mapper.map_value(v as f64));
            }
        }
        property.set_color_level(-2e15);
        assert_eq!(ColorMapper::from_property(&property).map_value(1.0)[0], 255);
    }

    #[test]
    fn saturating_fixed_point_clamps_to_white() {
        let fixed = IntegerShiftScale {
            scale: 8355,
            shift: i64::MAX,
            bits: 16,
        };
        assert_eq!(fixed.apply(1), 255);
    }

    #[test]
    fn slice_rows_are_flipped_upright() {
        let mapper = ColorMapper::from_property(&head_property());
        let slice = array![[0u16, 0], [4000, 4000]];
        let image = mapper.map_slice(&slice.view());
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(1, 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn lookup_range_follows_window_level() {
        let mut table = LookupTable::new();
        table.set_ramp(RampType::Linear);
        table.set_hue_range(0.0, 0.0);
        table.set_value_range(0.0, 1.0);
        table.set_alpha_range(0.0, 1.0);
        table.set_table_range(0.0, 1.0);
        let mut property = head_property();
        property.set_lookup_table(Some(Arc::new(table)));
        property.set_opacity(0.5);

        let mapper = ColorMapper::from_property(&property);
        let top = mapper.map_value(2000.0);
        assert_eq!(top, [255, 0, 0, 128]);

        property.set_use_lookup_table_scalar_range(true);
        let mapper = ColorMapper::from_property(&property);
        assert_eq!(mapper.map_value(1.0)[0], 255);
    }

    #[test]
    fn volume_mapping_keeps_voxel_order() {
        let data = Array3::from_shape_vec((1, 1, 2), vec![0u16, 2000]).unwrap();
        let volume = Volume::new(data, [1.0; 3]);
        let colors = ColorMapper::from_property(&head_property()).map_volume(&volume);
        assert_eq!(colors.dim(), (1, 1, 2, 4));
        assert_eq!(colors[[0, 0, 1, 0]], 255);
        assert_eq!(colors[[0, 0, 0, 0]], 0);
    }
}
