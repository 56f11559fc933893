use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::enums::InterpolationType;
use crate::lookup_table::LookupTable;

/// Display settings of one image prop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageProperty {
    color_window: f64,
    color_level: f64,
    opacity: f64,
    interpolation_type: InterpolationType,
    use_lookup_table_scalar_range: bool,
    #[serde(skip)]
    lookup_table: Option<Arc<LookupTable>>,
}

impl Default for ImageProperty {
    fn default() -> Self {
        Self {
            color_window: 255.0,
            color_level: 127.5,
            opacity: 1.0,
            interpolation_type: InterpolationType::Nearest,
            use_lookup_table_scalar_range: false,
            lookup_table: None,
        }
    }
}

impl ImageProperty {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_window(&self) -> f64 {
        self.color_window
    }

    pub fn set_color_window(&mut self, window: f64) {
        self.color_window = window;
    }

    pub fn color_level(&self) -> f64 {
        self.color_level
    }

    pub fn set_color_level(&mut self, level: f64) {
        self.color_level = level;
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn interpolation_type(&self) -> InterpolationType {
        self.interpolation_type
    }

    pub fn set_interpolation_type(&mut self, interpolation: InterpolationType) {
        self.interpolation_type = interpolation;
    }

    pub fn interpolation_type_as_str(&self) -> &'static str {
        self.interpolation_type.as_str()
    }

    pub fn use_lookup_table_scalar_range(&self) -> bool {
        self.use_lookup_table_scalar_range
    }

    /// When set, the lookup table's own range is used instead of the one
    /// derived from window/level.
    pub fn set_use_lookup_table_scalar_range(&mut self, enabled: bool) {
        self.use_lookup_table_scalar_range = enabled;
    }

    pub fn lookup_table(&self) -> Option<&Arc<LookupTable>> {
        self.lookup_table.as_ref()
    }

    pub fn set_lookup_table(&mut self, table: Option<Arc<LookupTable>>) {
        self.lookup_table = table;
    }

    /// Scalar range covered by the window: `level -/+ window / 2`.
    pub fn window_range(&self) -> (f64, f64) {
        (
            self.color_level - 0.5 * self.color_window,
            self.color_level + 0.5 * self.color_window,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_eight_bit_range() {
        let property = ImageProperty::new();
        assert_eq!(property.window_range(), (0.0, 255.0));
        assert_eq!(property.interpolation_type_as_str(), "Nearest");
        assert!(property.lookup_table().is_none());
    }

    #[test]
    fn opacity_is_clamped() {
        let mut property = ImageProperty::new();
        property.set_opacity(1.5);
        assert_eq!(property.opacity(), 1.0);
        property.set_opacity(-0.2);
        assert_eq!(property.opacity(), 0.0);
    }

    #[test]
    fn lookup_table_is_shared_not_copied() {
        let table = Arc::new(LookupTable::new());
        let mut property = ImageProperty::new();
        property.set_lookup_table(Some(Arc::clone(&table)));
        assert!(Arc::ptr_eq(property.lookup_table().unwrap(), &table));
    }
}
