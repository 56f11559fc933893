use image::RgbaImage;

use crate::camera::Camera;
use crate::image_property::ImageProperty;
use crate::mapper::ImageMapper;

/// An image prop: a mapper plus the display property it is drawn with.
#[derive(Debug)]
pub struct ImageSlice {
    mapper: Box<dyn ImageMapper>,
    property: Option<ImageProperty>,
    visible: bool,
}

impl ImageSlice {
    pub fn new(mapper: Box<dyn ImageMapper>) -> Self {
        Self {
            mapper,
            property: None,
            visible: true,
        }
    }

    pub fn mapper(&self) -> &dyn ImageMapper {
        self.mapper.as_ref()
    }

    pub fn mapper_mut(&mut self) -> &mut dyn ImageMapper {
        self.mapper.as_mut()
    }

    pub fn set_mapper(&mut self, mapper: Box<dyn ImageMapper>) {
        self.mapper = mapper;
    }

    /// The property, `None` until one is set or first requested mutably.
    pub fn property(&self) -> Option<&ImageProperty> {
        self.property.as_ref()
    }

    /// Creates a default property on first use.
    pub fn property_mut(&mut self) -> &mut ImageProperty {
        self.property.get_or_insert_with(ImageProperty::default)
    }

    pub fn set_property(&mut self, property: ImageProperty) {
        self.property = Some(property);
    }

    pub fn visibility(&self) -> bool {
        self.visible
    }

    pub fn set_visibility(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn bounds(&self) -> Option<[f64; 6]> {
        self.mapper.bounds()
    }

    /// Opaque when fully opaque and any lookup table has no translucent
    /// entries.
    pub fn is_opaque(&self) -> bool {
        let Some(property) = &self.property else {
            return true;
        };
        property.opacity() >= 1.0
            && property
                .lookup_table()
                .is_none_or(|table| table.is_opaque())
    }

    pub fn render(&self, camera: &Camera, width: u32, height: u32) -> Option<RgbaImage> {
        if !self.visible {
            return None;
        }
        match &self.property {
            Some(property) => self.mapper.render(camera, property, width, height),
            None => self
                .mapper
                .render(camera, &ImageProperty::default(), width, height),
        }
    }
}
