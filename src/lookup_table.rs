//! Scalar-to-colour transfer function built from HSV and alpha ramps.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::enums::RampType;

/// Serialized form of a [`LookupTable`]; the colour table itself is rebuilt
/// on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupTableConfig {
    pub number_of_colors: usize,
    pub table_range: (f64, f64),
    pub hue_range: (f64, f64),
    pub saturation_range: (f64, f64),
    pub value_range: (f64, f64),
    pub alpha_range: (f64, f64),
    pub ramp: RampType,
}

impl Default for LookupTableConfig {
    fn default() -> Self {
        Self {
            number_of_colors: 256,
            table_range: (0.0, 1.0),
            hue_range: (0.0, 0.66667),
            saturation_range: (1.0, 1.0),
            value_range: (1.0, 1.0),
            alpha_range: (1.0, 1.0),
            ramp: RampType::SCurve,
        }
    }
}

/// A table of RGBA8 colours indexed by scalar value over `table_range`.
///
/// The table is rebuilt by every ramp setter, so a table handed out behind
/// an `Arc` is always consistent with its ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LookupTableConfig", into = "LookupTableConfig")]
pub struct LookupTable {
    config: LookupTableConfig,
    table: Vec<[u8; 4]>,
}

impl Default for LookupTable {
    fn default() -> Self {
        Self::from(LookupTableConfig::default())
    }
}

impl From<LookupTableConfig> for LookupTable {
    fn from(mut config: LookupTableConfig) -> Self {
        config.number_of_colors = config.number_of_colors.max(2);
        let mut table = Self {
            config,
            table: Vec::new(),
        };
        table.build();
        table
    }
}

impl From<LookupTable> for LookupTableConfig {
    fn from(table: LookupTable) -> Self {
        table.config
    }
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &LookupTableConfig {
        &self.config
    }

    pub fn number_of_colors(&self) -> usize {
        self.config.number_of_colors
    }

    pub fn set_number_of_colors(&mut self, n: usize) {
        self.config.number_of_colors = n.max(2);
        self.build();
    }

    pub fn table_range(&self) -> (f64, f64) {
        self.config.table_range
    }

    /// Sets the scalar range mapped onto the table. Does not rebuild the
    /// colours.
    pub fn set_table_range(&mut self, min: f64, max: f64) {
        self.config.table_range = (min, max);
    }

    pub fn hue_range(&self) -> (f64, f64) {
        self.config.hue_range
    }

    pub fn set_hue_range(&mut self, start: f64, end: f64) {
        self.config.hue_range = (start, end);
        self.build();
    }

    pub fn saturation_range(&self) -> (f64, f64) {
        self.config.saturation_range
    }

    pub fn set_saturation_range(&mut self, start: f64, end: f64) {
        self.config.saturation_range = (start, end);
        self.build();
    }

    pub fn value_range(&self) -> (f64, f64) {
        self.config.value_range
    }

    pub fn set_value_range(&mut self, start: f64, end: f64) {
        self.config.value_range = (start, end);
        self.build();
    }

    pub fn alpha_range(&self) -> (f64, f64) {
        self.config.alpha_range
    }

    pub fn set_alpha_range(&mut self, start: f64, end: f64) {
        self.config.alpha_range = (start, end);
        self.build();
    }

    pub fn ramp(&self) -> RampType {
        self.config.ramp
    }

    pub fn set_ramp(&mut self, ramp: RampType) {
        self.config.ramp = ramp;
        self.build();
    }

    /// Overrides a single entry. The next ramp setter rebuilds the table
    /// and discards the override.
    pub fn set_table_value(&mut self, index: usize, rgba: [u8; 4]) {
        if let Some(entry) = self.table.get_mut(index) {
            *entry = rgba;
        }
    }

    pub fn table_value(&self, index: usize) -> Option<[u8; 4]> {
        self.table.get(index).copied()
    }

    /// Regenerates the colour table from the ramps.
    pub fn build(&mut self) {
        let config = &self.config;
        let n = config.number_of_colors;
        let max_index = (n - 1) as f64;
        let lerp = |(start, end): (f64, f64), t: f64| start + (end - start) * t;

        self.table = (0..n)
            .map(|i| {
                let t = i as f64 / max_index;
                let hue = lerp(config.hue_range, t);
                let saturation = lerp(config.saturation_range, t);
                let value = lerp(config.value_range, t);
                let alpha = lerp(config.alpha_range, t);
                let rgb = hsv_to_rgb(hue, saturation, value);
                Self::apply_ramp(config.ramp, rgb, alpha)
            })
            .collect();
    }

    fn apply_ramp(ramp: RampType, rgb: [f64; 3], alpha: f64) -> [u8; 4] {
        let to_byte = |v: f64| v.clamp(0.0, 255.0) as u8;
        match ramp {
            RampType::SCurve => [
                to_byte(127.5 * (1.0 + ((1.0 - rgb[0]) * PI).cos())),
                to_byte(127.5 * (1.0 + ((1.0 - rgb[1]) * PI).cos())),
                to_byte(127.5 * (1.0 + ((1.0 - rgb[2]) * PI).cos())),
                to_byte(alpha * 255.0),
            ],
            RampType::Linear => [
                to_byte(rgb[0] * 255.0 + 0.5),
                to_byte(rgb[1] * 255.0 + 0.5),
                to_byte(rgb[2] * 255.0 + 0.5),
                to_byte(alpha * 255.0 + 0.5),
            ],
            RampType::Sqrt => [
                to_byte(rgb[0].max(0.0).sqrt() * 255.0 + 0.5),
                to_byte(rgb[1].max(0.0).sqrt() * 255.0 + 0.5),
                to_byte(rgb[2].max(0.0).sqrt() * 255.0 + 0.5),
                to_byte(alpha * 255.0 + 0.5),
            ],
        }
    }

    /// Table index for `value` when `range` is spread over the table.
    /// Values outside the range clamp to the first or last entry.
    pub fn index_for(&self, value: f64, range: (f64, f64)) -> usize {
        let n = self.table.len();
        let max_index = (n - 1) as f64;
        let scale = if range.1 > range.0 {
            n as f64 / (range.1 - range.0)
        } else {
            f64::MAX
        };
        let position = (value - range.0) * scale;
        if position.is_nan() || position <= 0.0 {
            0
        } else if position >= max_index {
            n - 1
        } else {
            position as usize
        }
    }

    pub fn map_value(&self, value: f64) -> [u8; 4] {
        self.map_value_in_range(value, self.config.table_range, 1.0)
    }

    /// Maps `value` over an explicit range, scaling the entry's alpha by
    /// `alpha` (clamped to `[0, 1]`). The table itself is left untouched.
    pub fn map_value_in_range(&self, value: f64, range: (f64, f64), alpha: f64) -> [u8; 4] {
        let mut rgba = self.table[self.index_for(value, range)];
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha < 1.0 {
            rgba[3] = (rgba[3] as f64 * alpha + 0.5) as u8;
        }
        rgba
    }

    /// True when every entry is fully opaque.
    pub fn is_opaque(&self) -> bool {
        self.table.iter().all(|rgba| rgba[3] == u8::MAX)
    }
}

/// HSV (all components in `[0, 1]`) to RGB.
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> [f64; 3] {
    const ONE_THIRD: f64 = 1.0 / 3.0;
    const ONE_SIXTH: f64 = 1.0 / 6.0;
    const TWO_THIRD: f64 = 2.0 / 3.0;
    const FIVE_SIXTH: f64 = 5.0 / 6.0;

    let (r, g, b) = if hue > ONE_SIXTH && hue <= ONE_THIRD {
        ((ONE_THIRD - hue) / ONE_SIXTH, 1.0, 0.0)
    } else if hue > ONE_THIRD && hue <= 0.5 {
        (0.0, 1.0, (hue - ONE_THIRD) / ONE_SIXTH)
    } else if hue > 0.5 && hue <= TWO_THIRD {
        (0.0, (TWO_THIRD - hue) / ONE_SIXTH, 1.0)
    } else if hue > TWO_THIRD && hue <= FIVE_SIXTH {
        ((hue - TWO_THIRD) / ONE_SIXTH, 0.0, 1.0)
    } else if hue > FIVE_SIXTH && hue <= 1.0 {
        (1.0, 0.0, (1.0 - hue) / ONE_SIXTH)
    } else {
        (1.0, hue / ONE_SIXTH, 0.0)
    };

    [r, g, b].map(|c| (saturation * c + (1.0 - saturation)) * value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_runs_red_to_blue() {
        let table = LookupTable::new();
        assert_eq!(table.number_of_colors(), 256);
        assert_eq!(table.table_value(0), Some([255, 0, 0, 255]));
        let last = table.table_value(255).unwrap();
        assert_eq!(last[2], 255);
        assert!(last[0] < 5 && last[1] < 5);
    }

    #[test]
    fn linear_ramp_hits_exact_endpoints() {
        let mut table = LookupTable::new();
        table.set_ramp(RampType::Linear);
        table.set_hue_range(0.0, 0.0);
        table.set_value_range(0.0, 1.0);
        table.set_alpha_range(0.0, 1.0);
        assert_eq!(table.table_value(0), Some([0, 0, 0, 0]));
        assert_eq!(table.table_value(255), Some([255, 0, 0, 255]));
        assert!(!table.is_opaque());
    }

    #[test]
    fn sqrt_and_s_curve_ramps() {
        let mut table = LookupTable::new();
        table.set_hue_range(0.0, 0.0);
        table.set_value_range(0.25, 0.25);
        table.set_ramp(RampType::Sqrt);
        assert_eq!(table.table_value(0), Some([128, 0, 0, 255]));

        table.set_value_range(0.5, 0.5);
        table.set_alpha_range(0.5, 0.5);
        table.set_ramp(RampType::SCurve);
        // S-curve alpha is truncated, not rounded
        assert_eq!(table.table_value(0), Some([127, 0, 0, 127]));
        table.set_value_range(1.0, 1.0);
        assert_eq!(table.table_value(17), Some([255, 0, 0, 127]));
    }

    #[test]
    fn index_clamps_outside_range() {
        let table = LookupTable::new();
        assert_eq!(table.index_for(-10.0, (0.0, 2000.0)), 0);
        assert_eq!(table.index_for(5000.0, (0.0, 2000.0)), 255);
        assert_eq!(table.index_for(1000.0, (0.0, 2000.0)), 128);
        assert_eq!(table.index_for(f64::NAN, (0.0, 2000.0)), 0);
    }

    #[test]
    fn degenerate_range_splits_at_minimum() {
        let table = LookupTable::new();
        assert_eq!(table.index_for(4.0, (5.0, 5.0)), 0);
        assert_eq!(table.index_for(5.0, (5.0, 5.0)), 0);
        assert_eq!(table.index_for(6.0, (5.0, 5.0)), 255);
    }

    #[test]
    fn alpha_multiplier_scales_entry_alpha() {
        let table = LookupTable::new();
        assert_eq!(table.map_value_in_range(0.0, (0.0, 1.0), 0.5)[3], 128);
        assert_eq!(table.map_value_in_range(0.0, (0.0, 1.0), 3.0)[3], 255);
    }

    #[test]
    fn setting_range_keeps_overrides() {
        let mut table = LookupTable::new();
        table.set_table_value(0, [1, 2, 3, 4]);
        table.set_table_range(0.0, 2000.0);
        assert_eq!(table.map_value(-1.0), [1, 2, 3, 4]);
        table.set_ramp(RampType::Sqrt);
        assert_ne!(table.map_value(-1.0), [1, 2, 3, 4]);
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut table = LookupTable::new();
        table.set_table_range(0.0, 2000.0);
        let json = serde_json::to_string(&table).unwrap();
        let restored: LookupTable = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.table_range(), (0.0, 2000.0));
        assert_eq!(restored.number_of_colors(), 256);
        assert_eq!(restored.table_value(0), table.table_value(0));
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [1.0, 0.0, 0.0]);
        assert_eq!(hsv_to_rgb(0.5, 0.0, 0.5), [0.5, 0.5, 0.5]);
        let blue = hsv_to_rgb(2.0 / 3.0, 1.0, 1.0);
        assert!((blue[0]).abs() < 1e-12 && (blue[2] - 1.0).abs() < 1e-12);
    }
}
