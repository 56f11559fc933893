use proptest::prelude::*;

use volume_view::color_mapper::ColorMapper;
use volume_view::enums::RampType;
use volume_view::image_property::ImageProperty;
use volume_view::lookup_table::LookupTable;

proptest! {
    #[test]
    fn lookup_index_stays_in_table(
        value in -1.0e6f64..1.0e6,
        min in -1000.0f64..1000.0,
        width in 0.0f64..5000.0,
        colors in 2usize..512,
    ) {
        let mut table = LookupTable::new();
        table.set_number_of_colors(colors);
        let index = table.index_for(value, (min, min + width));
        prop_assert!(index < colors);
        if value <= min {
            prop_assert_eq!(index, 0);
        }
    }

    #[test]
    fn window_level_is_monotonic(
        window in 1.0f64..4000.0,
        level in -1000.0f64..3000.0,
        a in 0u16..4096,
        b in 0u16..4096,
    ) {
        let mut property = ImageProperty::new();
        property.set_color_window(window);
        property.set_color_level(level);
        let mapper = ColorMapper::from_property(&property);
        let (lo, hi) = (a.min(b), a.max(b));
        prop_assert!(mapper.map_value(lo as f64)[0] <= mapper.map_value(hi as f64)[0]);
    }

    #[test]
    fn linear_ramp_alpha_grows_with_value(
        a in 0.0f64..2000.0,
        b in 0.0f64..2000.0,
    ) {
        let mut table = LookupTable::new();
        table.set_table_range(0.0, 2000.0);
        table.set_alpha_range(0.0, 1.0);
        table.set_ramp(RampType::Linear);
        let (lo, hi) = (a.min(b), a.max(b));
        prop_assert!(table.map_value(lo)[3] <= table.map_value(hi)[3]);
    }
}
