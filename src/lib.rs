//! # volume-view
//!
//! This crate slices raw volumetric medical images and renders the slices
//! with window/level contrast, colour lookup tables and an image-style
//! camera interaction.
//!
//! Volumes are read from raw slice series (one file per slice, e.g. the
//! `headsq` CT from the VTK data set) or from a folder of DICOM files. If
//! the environment supports it, slice files are read in parallel using
//! rayon. A volume is drawn by one of two mappers:
//!  - [`ImageMapper3D`] snaps the slice plane to the nearest axial, coronal
//!    or sagittal voxel plane and draws it as a colour-mapped texture
//!  - [`ImageResliceMapper`] resamples the volume along an arbitrary
//!    (oblique) plane with nearest, trilinear or tricubic interpolation
//!
//! The slice plane follows the camera: it passes through the focal point
//! and faces the viewer, so rotating or pushing the camera through the
//! volume moves the slice with it. Frames are plain RGBA images that can be
//! written as PNG, or shown in a window with the `window` feature.
//!
//! The following attributes are assumed:
//!   - 8 or 16-bit unsigned scalars with a single component
//!   - Axis-aligned volumes (no direction cosines)
//!
//! # Examples
//!
//! ## Rendering the head CT at mid-grey window/level
//!
//! Reads the quarter-resolution head from `$VTK_DATA_ROOT`, renders it in
//! parallel projection the way the `image-mapper-3d` binary does and saves
//! the frame.
//!
//! ```no_run
//! # use volume_view::scene::{data_root, SceneConfig, ScenePreset};
//! let config = SceneConfig::preset(ScenePreset::Direct, data_root());
//! let mut interactor = config.build().expect("should have read the head volume");
//! interactor
//!     .render_window_mut()
//!     .save_png("head.png")
//!     .expect("should have written the frame");
//! ```
//!
//! ## Exporting an axis slice
//!
//! ```no_run
//! # use volume_view::enums::{InterpolationType, Orientation};
//! # use volume_view::volume_reader::{VolumeDescriptor, VolumeReader};
//! let descriptor = VolumeDescriptor::headsq_quarter("/data/VTKData");
//! let volume = VolumeReader::read(&descriptor).expect("should have read slices");
//! let image = volume
//!     .get_image_from_axis(volume.dim().2 / 2, Orientation::Sagittal, InterpolationType::Linear)
//!     .expect("should have returned image at center of volume");
//! image.save("sagittal.png").expect("should have written image");
//! ```
//!
//! [`ImageMapper3D`]: mapper::ImageMapper3D
//! [`ImageResliceMapper`]: mapper::ImageResliceMapper

pub mod camera;
pub mod color_mapper;
pub mod dicom_reader;
pub mod enums;
pub mod flood_fill;
pub mod image_property;
pub mod image_slice;
pub mod interactor;
pub mod interactor_style;
mod interpolator;
pub mod lookup_table;
pub mod mapper;
pub mod projection;
pub mod render_window;
pub mod renderer;
pub mod scene;
pub mod volume;
pub mod volume_reader;
