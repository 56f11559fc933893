use crate::{
    enums::SortBy,
    volume::{Volume, VolumeError},
};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use log::{info, warn};
use ndarray::{Array2, Array3, s};
use std::{cmp::Ordering, fs, path::Path};
use thiserror::Error;

type DicomFile = FileDicomObject<InMemDicomObject>;

#[derive(Debug, Error)]
pub enum DicomReaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Slice {index} is {found:?} pixels, expected {expected:?}")]
    InconsistentDimensions {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Missing pixel spacing")]
    MissingSpacing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// One decoded image of a series with the attributes used to place it.
#[derive(Debug, Clone)]
struct DicomSlice {
    order: Option<f64>,
    position: Option<[f64; 3]>,
    pixel_spacing: Option<[f64; 2]>,
    thickness: Option<f64>,
    pixels: Array2<u16>,
}

/// Loads a DICOM series into the same [`Volume`] the raw reader produces,
/// so either source can feed a mapper.
pub struct DicomReader;

impl DicomReader {
    /// Load a volume from DICOM objects
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found, dimensions are inconsistent
    /// or no object carries a pixel spacing
    pub fn load_from_dicom_objects(
        dicom_objects: &[DicomFile],
        sort_by: SortBy,
    ) -> Result<Volume, DicomReaderError> {
        let mut slices: Vec<DicomSlice> = dicom_objects
            .iter()
            .filter_map(|object| Self::read_slice(object, &sort_by))
            .collect();

        if slices.is_empty() {
            return Err(DicomReaderError::NoValidImages);
        }
        if slices.len() < dicom_objects.len() {
            warn!(
                "skipped {} DICOM objects without decodable pixel data",
                dicom_objects.len() - slices.len()
            );
        }
        if !matches!(sort_by, SortBy::None) {
            slices.sort_by(|a, b| a.order.partial_cmp(&b.order).unwrap_or(Ordering::Equal));
        }
        Self::validate_dimensions(&slices)?;

        let spacing = Self::spacing(&slices).ok_or(DicomReaderError::MissingSpacing)?;
        let origin = Self::origin(&slices);
        let data = Self::stack(&slices);
        let (depth, height, width) = data.dim();
        let extent = [
            0,
            width as i32 - 1,
            0,
            height as i32 - 1,
            0,
            depth as i32 - 1,
        ];
        info!("loaded {width}x{height}x{depth} DICOM volume, spacing {spacing:?}");

        Ok(Volume::with_geometry(data, extent, spacing, origin)?)
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<Volume, DicomReaderError> {
        let objects = paths
            .iter()
            .map(|path| open_file(path.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::load_from_dicom_objects(&objects, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<Volume, DicomReaderError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(path.as_ref())? {
            let path = entry?.path();
            if Self::has_dicom_extension(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(DicomReaderError::NoValidImages);
        }
        Self::load_from_file_paths(&paths, sort_by)
    }

    fn has_dicom_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
    }

    fn read_slice(object: &DicomFile, sort_by: &SortBy) -> Option<DicomSlice> {
        let multi_f64 = |tag| object.element(tag).ok()?.to_multi_float64().ok();
        let single_f64 = |tag| object.element(tag).ok()?.to_float64().ok();

        let position = multi_f64(tags::IMAGE_POSITION_PATIENT)
            .and_then(|p| Some([*p.first()?, *p.get(1)?, *p.get(2)?]));
        // Pixel Spacing is (row spacing, column spacing)
        let pixel_spacing = multi_f64(tags::PIXEL_SPACING).and_then(|p| Some([*p.get(1)?, *p.first()?]));

        let order = match sort_by {
            SortBy::ImagePositionPatient => position.map(|p| p[2]),
            SortBy::TablePosition => single_f64(tags::TABLE_POSITION),
            SortBy::InstanceNumber => object
                .element(tags::INSTANCE_NUMBER)
                .ok()?
                .to_int::<i32>()
                .ok()
                .map(f64::from),
            SortBy::None => None,
        };

        let pixels = object
            .decode_pixel_data()
            .ok()?
            .to_ndarray_with_options::<u16>(&ConvertOptions::new().with_voi_lut(VoiLutOption::First))
            .ok()?
            .slice_move(s![0, .., .., 0]);

        Some(DicomSlice {
            order,
            position,
            pixel_spacing,
            thickness: single_f64(tags::SLICE_THICKNESS),
            pixels,
        })
    }

    fn validate_dimensions(slices: &[DicomSlice]) -> Result<(), DicomReaderError> {
        let expected = slices[0].pixels.dim();
        match slices.iter().position(|slice| slice.pixels.dim() != expected) {
            Some(index) => Err(DicomReaderError::InconsistentDimensions {
                index,
                expected,
                found: slices[index].pixels.dim(),
            }),
            None => Ok(()),
        }
    }

    /// Stacks the images as slices; DICOM rows run top to bottom, so they
    /// are flipped to put row 0 at the highest `j`.
    fn stack(slices: &[DicomSlice]) -> Array3<u16> {
        let (height, width) = slices[0].pixels.dim();
        let mut volume = Array3::<u16>::zeros((slices.len(), height, width));
        for (k, slice) in slices.iter().enumerate() {
            volume
                .slice_mut(s![k, .., ..])
                .assign(&slice.pixels.slice(s![..;-1, ..]));
        }
        volume
    }

    /// In-plane spacing from the first slice that has one. Between slices
    /// the distance of the first two positions is preferred over the
    /// nominal slice thickness, which may overlap or leave gaps.
    fn spacing(slices: &[DicomSlice]) -> Option<[f64; 3]> {
        let [x, y] = slices.iter().find_map(|slice| slice.pixel_spacing)?;
        let between = match (slices.first(), slices.get(1)) {
            (Some(a), Some(b)) => a
                .position
                .zip(b.position)
                .map(|(p, q)| (q[2] - p[2]).abs())
                .filter(|d| *d > 0.0),
            _ => None,
        };
        let z = between
            .or_else(|| slices.iter().find_map(|slice| slice.thickness))
            .unwrap_or(1.0);
        Some([x, y, z])
    }

    /// Position of the lowest slice, or the origin when none is stored.
    fn origin(slices: &[DicomSlice]) -> [f64; 3] {
        slices
            .iter()
            .filter_map(|slice| slice.position)
            .min_by(|a, b| a[2].total_cmp(&b[2]))
            .unwrap_or([0.0; 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::path::PathBuf;

    fn slice(order: Option<f64>, z: f64, pixels: Array2<u16>) -> DicomSlice {
        DicomSlice {
            order,
            position: Some([-10.0, -20.0, z]),
            pixel_spacing: Some([0.5, 0.7]),
            thickness: Some(3.0),
            pixels,
        }
    }

    #[test]
    fn only_dcm_extensions_are_picked_up() {
        assert!(DicomReader::has_dicom_extension(&PathBuf::from("a/IM0001.DCM")));
        assert!(!DicomReader::has_dicom_extension(&PathBuf::from("a/quarter.1")));
    }

    #[test]
    fn rows_are_flipped_when_stacked() {
        let volume = DicomReader::stack(&[slice(None, 0.0, array![[1u16, 2], [3, 4]])]);
        assert_eq!(volume[[0, 0, 0]], 3);
        assert_eq!(volume[[0, 1, 1]], 2);
    }

    #[test]
    fn mixed_sizes_are_rejected() {
        let slices = [
            slice(None, 0.0, Array2::zeros((2, 2))),
            slice(None, 1.0, Array2::zeros((3, 2))),
        ];
        assert!(matches!(
            DicomReader::validate_dimensions(&slices),
            Err(DicomReaderError::InconsistentDimensions { index: 1, .. })
        ));
    }

    #[test]
    fn slice_distance_beats_thickness() {
        let slices = [
            slice(Some(1.0), 4.0, Array2::zeros((1, 1))),
            slice(Some(2.0), 6.5, Array2::zeros((1, 1))),
        ];
        assert_eq!(DicomReader::spacing(&slices), Some([0.5, 0.7, 2.5]));
        assert_eq!(DicomReader::origin(&slices), [-10.0, -20.0, 4.0]);

        let single = [slice(None, 4.0, Array2::zeros((1, 1)))];
        assert_eq!(DicomReader::spacing(&single), Some([0.5, 0.7, 3.0]));
    }

    #[test]
    fn empty_directory_has_no_images() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "not dicom").unwrap();
        assert!(matches!(
            DicomReader::load_from_directory(dir.path(), SortBy::InstanceNumber),
            Err(DicomReaderError::NoValidImages)
        ));
    }
}
