//! Scene assembly: reader, mapper, display property, renderer, window and
//! interactor wired together from a serializable configuration.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enums::{InteractionMode, InterpolationType, MapperKind, RampType};
use crate::image_property::ImageProperty;
use crate::image_slice::ImageSlice;
use crate::interactor::RenderWindowInteractor;
use crate::interactor_style::InteractorStyleImage;
use crate::lookup_table::LookupTable;
use crate::mapper::create_mapper;
use crate::render_window::{RenderError, RenderWindow};
use crate::renderer::Renderer;
use crate::volume::Volume;
use crate::volume_reader::{VolumeDescriptor, VolumeReader, VolumeReaderError};

/// Used when `VTK_DATA_ROOT` is not set.
pub const DEFAULT_DATA_ROOT: &str = "../../../../VTKData";

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("unknown scene preset {0:?}, expected \"direct\" or \"reslice\"")]
    UnknownPreset(String),

    #[error("could not read scene file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scene file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("renderer has no active camera to configure")]
    NoRenderer,

    #[error(transparent)]
    Reader(#[from] VolumeReaderError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Root directory of the VTK data set.
pub fn data_root() -> PathBuf {
    env::var_os("VTK_DATA_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenePreset {
    /// Texture-mapped axis slice with a grey window/level.
    #[default]
    Direct,
    /// Oblique reslice through a red transfer function.
    Reslice,
}

impl FromStr for ScenePreset {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(ScenePreset::Direct),
            "reslice" => Ok(ScenePreset::Reslice),
            _ => Err(SceneError::UnknownPreset(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub volume: VolumeDescriptor,
    pub mapper: MapperKind,
    pub property: ImageProperty,
    /// Shared with the property when present.
    pub lookup_table: Option<LookupTable>,
    pub background: [f64; 3],
    pub size: (u32, u32),
    pub interaction_mode: InteractionMode,
    /// Switched on after the first frame, as when toggled interactively.
    pub parallel_projection: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::preset(ScenePreset::Direct, data_root())
    }
}

impl SceneConfig {
    pub fn preset(preset: ScenePreset, data_root: impl AsRef<Path>) -> Self {
        let mut property = ImageProperty::new();
        property.set_color_window(2000.0);
        property.set_color_level(1000.0);
        property.set_interpolation_type(InterpolationType::Linear);

        let (mapper, lookup_table) = match preset {
            ScenePreset::Direct => (MapperKind::Direct, None),
            ScenePreset::Reslice => (MapperKind::Reslice, Some(Self::red_ramp())),
        };

        Self {
            volume: VolumeDescriptor::headsq_quarter(data_root),
            mapper,
            property,
            lookup_table,
            background: [0.1, 0.2, 0.4],
            size: (400, 400),
            interaction_mode: InteractionMode::Image3D,
            parallel_projection: true,
        }
    }

    /// Black-to-red ramp over `[0, 2000]` that fades in from transparent.
    fn red_ramp() -> LookupTable {
        let mut table = LookupTable::new();
        table.set_table_range(0.0, 2000.0);
        table.set_hue_range(0.0, 0.0);
        table.set_saturation_range(1.0, 1.0);
        table.set_value_range(0.0, 1.0);
        table.set_alpha_range(0.0, 1.0);
        table.set_ramp(RampType::Linear);
        table
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SceneError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads the volume and assembles the scene around it.
    pub fn build(&self) -> Result<RenderWindowInteractor, SceneError> {
        let volume = VolumeReader::read(&self.volume)?;
        self.assemble(Arc::new(volume))
    }

    /// Assembles the scene around an already loaded volume and renders the
    /// first frames: one to frame the camera, then another after the
    /// projection is configured.
    pub fn assemble(&self, volume: Arc<Volume>) -> Result<RenderWindowInteractor, SceneError> {
        let mut property = self.property.clone();
        if let Some(table) = &self.lookup_table {
            property.set_lookup_table(Some(Arc::new(table.clone())));
        }
        let mut image = ImageSlice::new(create_mapper(self.mapper, volume));
        image.set_property(property);

        let mut renderer = Renderer::new();
        renderer.add_view_prop(image);
        let [r, g, b] = self.background;
        renderer.set_background(r, g, b);

        let mut render_window = RenderWindow::new();
        render_window.add_renderer(renderer);
        render_window.set_size(self.size.0, self.size.1);

        let mut interactor = RenderWindowInteractor::new(render_window);
        interactor.set_interactor_style(InteractorStyleImage::new(self.interaction_mode));
        info!(
            "scene: {:?} mapper, {}x{} window, {:?} interaction",
            self.mapper, self.size.0, self.size.1, self.interaction_mode
        );

        interactor.render()?;
        let renderer = interactor
            .render_window_mut()
            .renderer_mut()
            .ok_or(SceneError::NoRenderer)?;
        renderer
            .active_camera_mut()
            .set_parallel_projection(self.parallel_projection);
        renderer.reset_camera_clipping_range();
        interactor.render()?;

        Ok(interactor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::ByteOrder;
    use ndarray::Array3;

    #[test]
    fn direct_preset_matches_head_scene() {
        let config = SceneConfig::preset(ScenePreset::Direct, "/data");
        assert_eq!(config.volume.byte_order, ByteOrder::LittleEndian);
        assert_eq!(config.volume.data_mask, Some(0x7fff));
        assert_eq!(config.volume.data_extent, [0, 63, 0, 63, 1, 93]);
        assert_eq!(config.volume.data_spacing, [3.2, 3.2, 1.5]);
        assert_eq!(
            config.volume.file_prefix,
            PathBuf::from("/data/Data/headsq/quarter")
        );
        assert_eq!(config.property.color_window(), 2000.0);
        assert_eq!(config.property.color_level(), 1000.0);
        assert_eq!(config.property.interpolation_type_as_str(), "Linear");
        assert_eq!(config.background, [0.1, 0.2, 0.4]);
        assert_eq!(config.size, (400, 400));
        assert_eq!(config.interaction_mode, InteractionMode::Image3D);
        assert!(config.lookup_table.is_none());
    }

    #[test]
    fn reslice_preset_uses_red_ramp() {
        let config = SceneConfig::preset(ScenePreset::Reslice, "/data");
        assert_eq!(config.mapper, MapperKind::Reslice);
        let table = config.lookup_table.unwrap();
        assert_eq!(table.table_range(), (0.0, 2000.0));
        assert_eq!(table.hue_range(), (0.0, 0.0));
        assert_eq!(table.saturation_range(), (1.0, 1.0));
        assert_eq!(table.alpha_range(), (0.0, 1.0));
        assert_eq!(table.table_value(0), Some([0, 0, 0, 0]));
        assert_eq!(table.table_value(255), Some([255, 0, 0, 255]));
    }

    #[test]
    fn preset_names_parse() {
        assert_eq!("Reslice".parse::<ScenePreset>().unwrap(), ScenePreset::Reslice);
        assert_eq!(" direct ".parse::<ScenePreset>().unwrap(), ScenePreset::Direct);
        assert!(matches!(
            "volume".parse::<ScenePreset>(),
            Err(SceneError::UnknownPreset(_))
        ));
    }

    #[test]
    fn assemble_renders_parallel_view() {
        let data = Array3::from_elem((4, 8, 8), 1000u16);
        let volume = Arc::new(Volume::new(data, [1.0, 1.0, 2.0]));
        let mut config = SceneConfig::preset(ScenePreset::Direct, "/data");
        config.size = (40, 40);
        let interactor = config.assemble(volume).unwrap();

        let window = interactor.render_window();
        let renderer = window.renderer().unwrap();
        assert!(renderer.active_camera().parallel_projection());
        let frame = window.last_frame().unwrap();
        assert_eq!(frame.dimensions(), (40, 40));
        // level 1000 maps to mid grey
        assert_eq!(frame.get_pixel(20, 20).0, [127, 127, 127, 255]);
        assert_eq!(frame.get_pixel(0, 0).0, [26, 51, 102, 255]);
        let property = renderer.props()[0].property().unwrap();
        assert_eq!(property.color_window(), 2000.0);
    }

    #[test]
    fn json_round_trip_keeps_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let config = SceneConfig::preset(ScenePreset::Reslice, "/data");
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = SceneConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.mapper, MapperKind::Reslice);
        assert_eq!(loaded.volume.data_extent, config.volume.data_extent);
        assert_eq!(loaded.volume.file_prefix, config.volume.file_prefix);
        assert_eq!(loaded.property.color_level(), 1000.0);
        assert!(loaded.lookup_table.is_some());
    }

    #[test]
    fn missing_scene_file_names_path() {
        let err = SceneConfig::from_json_file("/no/such/scene.json").unwrap_err();
        assert!(err.to_string().contains("/no/such/scene.json"));
    }

    #[test]
    fn build_reports_missing_slices() {
        let config = SceneConfig::preset(ScenePreset::Direct, "/no/such/root");
        assert!(matches!(config.build(), Err(SceneError::Reader(_))));
    }
}
