use crate::enums::{ByteOrder, FileDimensionality, ScalarType};
use crate::volume::{Volume, VolumeError};

use log::{debug, info};
use ndarray::{Array3, s};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeReaderError {
    #[error("Invalid data extent {0:?}")]
    InvalidExtent([i32; 6]),

    #[error("Invalid data spacing {0:?}")]
    InvalidSpacing([f64; 3]),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} holds {actual} bytes, expected at least {expected}")]
    Truncated {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// Everything needed to locate and decode a raw volume on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeDescriptor {
    /// Path prefix of the slice files, or the file itself in 3D mode.
    pub file_prefix: PathBuf,
    /// Slice file name template; `{prefix}` and `{slice}` are substituted.
    pub file_pattern: String,
    pub byte_order: ByteOrder,
    pub scalar_type: ScalarType,
    pub data_extent: [i32; 6],
    pub data_spacing: [f64; 3],
    pub data_origin: [f64; 3],
    /// Bits kept from every sample.
    pub data_mask: Option<u16>,
    /// Bytes skipped at the start of each file. When unset the header is
    /// whatever precedes the pixel payload at the end of the file.
    pub header_size: Option<u64>,
    pub file_dimensionality: FileDimensionality,
    /// When false the first stored row is the top row of the image.
    pub file_lower_left: bool,
}

impl Default for VolumeDescriptor {
    fn default() -> Self {
        Self {
            file_prefix: PathBuf::new(),
            file_pattern: "{prefix}.{slice}".to_owned(),
            byte_order: ByteOrder::default(),
            scalar_type: ScalarType::default(),
            data_extent: [0; 6],
            data_spacing: [1.0; 3],
            data_origin: [0.0; 3],
            data_mask: None,
            header_size: None,
            file_dimensionality: FileDimensionality::default(),
            file_lower_left: false,
        }
    }
}

impl VolumeDescriptor {
    /// The 64x64x93 quarter-resolution head CT from the VTK data set.
    pub fn headsq_quarter(data_root: impl AsRef<Path>) -> Self {
        Self {
            file_prefix: data_root.as_ref().join("Data/headsq/quarter"),
            byte_order: ByteOrder::LittleEndian,
            data_extent: [0, 63, 0, 63, 1, 93],
            data_spacing: [3.2, 3.2, 1.5],
            data_mask: Some(0x7fff),
            ..Self::default()
        }
    }

    /// The full 256x256x93 head CT.
    pub fn full_head(data_root: impl AsRef<Path>) -> Self {
        Self {
            file_prefix: data_root.as_ref().join("Data/fullHead/headsq"),
            data_extent: [0, 255, 0, 255, 1, 93],
            data_spacing: [0.8, 0.8, 1.5],
            ..Self::headsq_quarter(data_root)
        }
    }

    /// Number of samples along x, y and z.
    pub fn dimensions(&self) -> [usize; 3] {
        let e = self.data_extent.map(i64::from);
        [0, 1, 2].map(|axis| {
            let span = (e[2 * axis + 1] - e[2 * axis] + 1).max(0);
            usize::try_from(span).unwrap_or(usize::MAX)
        })
    }

    pub fn file_name(&self, slice: i32) -> PathBuf {
        let name = self
            .file_pattern
            .replace("{prefix}", &self.file_prefix.to_string_lossy())
            .replace("{slice}", &slice.to_string());
        PathBuf::from(name)
    }

    pub fn validate(&self) -> Result<(), VolumeReaderError> {
        let e = self.data_extent;
        if e[1] < e[0] || e[3] < e[2] || e[5] < e[4] {
            return Err(VolumeReaderError::InvalidExtent(e));
        }
        // every span must fit the i32 extent and the payload must be
        // addressable in bytes
        let dimensions = self.dimensions();
        let bytes = dimensions
            .into_iter()
            .try_fold(self.scalar_type.size(), usize::checked_mul)
            .filter(|&bytes| bytes <= isize::MAX as usize);
        if bytes.is_none() || dimensions.iter().any(|&n| i32::try_from(n).is_err()) {
            return Err(VolumeReaderError::InvalidExtent(e));
        }
        if self.data_spacing.iter().any(|&s| s == 0.0 || !s.is_finite()) {
            return Err(VolumeReaderError::InvalidSpacing(self.data_spacing));
        }
        Ok(())
    }
}

pub struct VolumeReader;

impl VolumeReader {
    /// Read the volume described by `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns error if the descriptor is inconsistent, a file is missing
    /// or a file holds fewer bytes than its pixel payload.
    pub fn read(descriptor: &VolumeDescriptor) -> Result<Volume, VolumeReaderError> {
        descriptor.validate()?;
        let [nx, ny, nz] = descriptor.dimensions();
        let frame_samples = nx * ny;
        let frame_bytes = frame_samples * descriptor.scalar_type.size();

        let frames: Vec<Vec<u16>> = match descriptor.file_dimensionality {
            FileDimensionality::Two => (descriptor.data_extent[4]..=descriptor.data_extent[5])
                .into_par_iter()
                .map(|slice| {
                    let path = descriptor.file_name(slice);
                    let bytes = Self::read_file(&path)?;
                    let header = Self::header_len(descriptor, bytes.len(), frame_bytes, &path)?;
                    Ok(Self::decode_samples(
                        &bytes[header..header + frame_bytes],
                        descriptor,
                    ))
                })
                .collect::<Result<_, VolumeReaderError>>()?,
            FileDimensionality::Three => {
                let path = descriptor.file_prefix.clone();
                let bytes = Self::read_file(&path)?;
                let header = Self::header_len(descriptor, bytes.len(), frame_bytes * nz, &path)?;
                bytes[header..header + frame_bytes * nz]
                    .par_chunks(frame_bytes.max(1))
                    .map(|chunk| Self::decode_samples(chunk, descriptor))
                    .collect()
            }
        };

        let volume_array = Self::build_volume_array(&frames, descriptor);
        info!(
            "read {}x{}x{} volume from {}",
            nx,
            ny,
            nz,
            descriptor.file_prefix.display()
        );

        Ok(Volume::with_geometry(
            volume_array,
            descriptor.data_extent,
            descriptor.data_spacing,
            descriptor.data_origin,
        )?)
    }

    fn read_file(path: &Path) -> Result<Vec<u8>, VolumeReaderError> {
        debug!("reading {}", path.display());
        fs::read(path).map_err(|source| VolumeReaderError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn header_len(
        descriptor: &VolumeDescriptor,
        file_len: usize,
        payload: usize,
        path: &Path,
    ) -> Result<usize, VolumeReaderError> {
        let header = match descriptor.header_size {
            Some(size) => usize::try_from(size).unwrap_or(usize::MAX),
            None => file_len.saturating_sub(payload),
        };
        match header.checked_add(payload) {
            Some(expected) if expected <= file_len => Ok(header),
            expected => Err(VolumeReaderError::Truncated {
                path: path.to_path_buf(),
                expected: expected.unwrap_or(usize::MAX),
                actual: file_len,
            }),
        }
    }

    fn decode_samples(bytes: &[u8], descriptor: &VolumeDescriptor) -> Vec<u16> {
        let mask = descriptor.data_mask.unwrap_or(u16::MAX);
        match descriptor.scalar_type {
            ScalarType::UnsignedChar => bytes.iter().map(|&b| u16::from(b) & mask).collect(),
            ScalarType::UnsignedShort => bytes
                .chunks_exact(2)
                .map(|pair| {
                    let pair = [pair[0], pair[1]];
                    let value = match descriptor.byte_order {
                        ByteOrder::LittleEndian => u16::from_le_bytes(pair),
                        ByteOrder::BigEndian => u16::from_be_bytes(pair),
                    };
                    value & mask
                })
                .collect(),
        }
    }

    fn build_volume_array(frames: &[Vec<u16>], descriptor: &VolumeDescriptor) -> Array3<u16> {
        let [nx, ny, nz] = descriptor.dimensions();
        let mut volume = Array3::<u16>::zeros((nz, ny, nx));

        for (k, frame) in frames.iter().enumerate() {
            let mut slice = volume.slice_mut(s![k, .., ..]);
            for (row, samples) in frame.chunks_exact(nx.max(1)).enumerate().take(ny) {
                let j = if descriptor.file_lower_left {
                    row
                } else {
                    ny - 1 - row
                };
                for (i, &value) in samples.iter().enumerate() {
                    slice[[j, i]] = value;
                }
            }
        }

        volume
    }
}
