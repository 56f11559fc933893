//! Slab projection: collapses a range of slices along one axis into a
//! single slice (or a sliding stack of slabs) by averaging, summing or
//! taking the extreme value.

use log::debug;
use ndarray::{Array2, Array3, ArrayView3, Axis, Slice};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enums::ProjectionOperation;
use crate::volume::{Volume, VolumeError};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("slice direction {0} is not one of 0, 1, 2")]
    InvalidDirection(usize),
    #[error("slice range {range:?} does not overlap extent {extent:?} along axis {axis}")]
    EmptyRange {
        range: (i32, i32),
        extent: (i32, i32),
        axis: usize,
    },
    #[error(transparent)]
    Volume(#[from] VolumeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageProjection {
    pub operation: ProjectionOperation,
    /// Data axis collapsed by the projection: 0 = x, 1 = y, 2 = z.
    pub slice_direction: usize,
    /// Slices combined, in extent coordinates; clamped to the input.
    pub slice_range: (i32, i32),
    /// When set, every output slice is the projection of a slab of the
    /// range's thickness starting at that slice.
    pub multi_slice_output: bool,
}

impl Default for ImageProjection {
    fn default() -> Self {
        Self {
            operation: ProjectionOperation::Average,
            slice_direction: 2,
            slice_range: (i32::MIN, i32::MAX),
            multi_slice_output: false,
        }
    }
}

impl ImageProjection {
    pub fn new(operation: ProjectionOperation) -> Self {
        Self {
            operation,
            ..Self::default()
        }
    }

    /// The slice range clamped to the input's extent along the slice
    /// direction.
    pub fn clamped_range(&self, volume: &Volume) -> Result<(i32, i32), ProjectionError> {
        let axis = self.slice_direction;
        if axis > 2 {
            return Err(ProjectionError::InvalidDirection(axis));
        }
        let extent = volume.extent();
        let (lo, hi) = (extent[2 * axis], extent[2 * axis + 1]);
        let range = (self.slice_range.0.max(lo), self.slice_range.1.min(hi));
        if range.0 > range.1 {
            return Err(ProjectionError::EmptyRange {
                range: self.slice_range,
                extent: (lo, hi),
                axis,
            });
        }
        Ok(range)
    }

    pub fn execute(&self, volume: &Volume) -> Result<Volume, ProjectionError> {
        let axis = self.slice_direction;
        let (r0, r1) = self.clamped_range(volume)?;
        let in_extent = volume.extent();
        let in_lo = in_extent[2 * axis];
        let thickness = (r1 - r0 + 1) as usize;

        let mut extent = in_extent;
        if self.multi_slice_output {
            extent[2 * axis] -= r0;
            extent[2 * axis + 1] -= r1;
        } else {
            extent[2 * axis] = 0;
            extent[2 * axis + 1] = 0;
        }

        let mut origin = volume.origin();
        origin[axis] += 0.5 * volume.spacing()[axis] * (r0 + r1) as f64;

        // array axes run (k, j, i)
        let array_axis = Axis(2 - axis);
        let mut shape = [volume.dim().0, volume.dim().1, volume.dim().2];
        shape[array_axis.0] = (extent[2 * axis + 1] - extent[2 * axis] + 1) as usize;
        let first_slab = if self.multi_slice_output {
            0
        } else {
            (r0 - in_lo) as usize
        };

        debug!(
            "projecting slices {r0}..={r1} along axis {axis} ({}) into {} slice(s)",
            self.operation.as_str(),
            shape[array_axis.0]
        );

        let mut output = Array3::<u16>::zeros(shape);
        let input = volume.data().view();
        output
            .axis_iter_mut(array_axis)
            .into_par_iter()
            .enumerate()
            .for_each(|(slice, mut out)| {
                let start = first_slab + slice;
                let slab = input.slice_axis(array_axis, Slice::from(start..start + thickness));
                out.assign(&self.reduce(slab, array_axis));
            });

        Ok(Volume::with_geometry(
            output,
            extent,
            volume.spacing(),
            origin,
        )?)
    }

    fn reduce(&self, slab: ArrayView3<'_, u16>, axis: Axis) -> Array2<u16> {
        match self.operation {
            ProjectionOperation::Average => {
                let factor = 1.0 / slab.len_of(axis) as f64;
                slab.mapv(f64::from)
                    .sum_axis(axis)
                    .mapv(|sum| (sum * factor + 0.5).floor() as u16)
            }
            ProjectionOperation::Sum => slab
                .mapv(f64::from)
                .sum_axis(axis)
                .mapv(|sum| (sum + 0.5).floor().clamp(0.0, u16::MAX as f64) as u16),
            ProjectionOperation::Minimum => slab.fold_axis(axis, u16::MAX, |&a, &b| a.min(b)),
            ProjectionOperation::Maximum => slab.fold_axis(axis, u16::MIN, |&a, &b| a.max(b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4 slices along z with values `k + 1` at every voxel; extent starts
    /// at slice 1 as in a raw slice series.
    fn stack() -> Volume {
        let data = Array3::from_shape_fn((4, 2, 3), |(k, _, _)| (k + 1) as u16);
        Volume::with_geometry(data, [0, 2, 0, 1, 1, 4], [1.0, 1.0, 2.0], [0.0; 3]).unwrap()
    }

    #[test]
    fn default_averages_whole_stack() {
        let output = ImageProjection::default().execute(&stack()).unwrap();
        assert_eq!(output.extent(), [0, 2, 0, 1, 0, 0]);
        // (1 + 2 + 3 + 4) / 4 = 2.5 rounds up
        assert!(output.data().iter().all(|&v| v == 3));
        // centre of slices 1..=4 at spacing 2
        assert_eq!(output.origin()[2], 5.0);
    }

    #[test]
    fn operations_over_clamped_range() {
        let mut projection = ImageProjection::new(ProjectionOperation::Maximum);
        projection.slice_range = (-10, 2);
        assert_eq!(projection.clamped_range(&stack()).unwrap(), (1, 2));
        assert_eq!(projection.execute(&stack()).unwrap().data()[[0, 0, 0]], 2);

        projection.operation = ProjectionOperation::Minimum;
        assert_eq!(projection.execute(&stack()).unwrap().data()[[0, 0, 0]], 1);

        projection.operation = ProjectionOperation::Sum;
        projection.slice_range = (i32::MIN, i32::MAX);
        assert_eq!(projection.execute(&stack()).unwrap().data()[[0, 1, 2]], 10);
    }

    #[test]
    fn sum_saturates() {
        let data = Array3::from_elem((3, 1, 1), 40_000u16);
        let volume = Volume::new(data, [1.0; 3]);
        let projection = ImageProjection::new(ProjectionOperation::Sum);
        assert_eq!(projection.execute(&volume).unwrap().data()[[0, 0, 0]], u16::MAX);
    }

    #[test]
    fn multi_slice_output_slides_a_slab() {
        let projection = ImageProjection {
            operation: ProjectionOperation::Sum,
            slice_range: (0, 1),
            multi_slice_output: true,
            ..ImageProjection::default()
        };
        let volume = Volume::new(
            Array3::from_shape_fn((4, 1, 1), |(k, _, _)| (k + 1) as u16),
            [1.0; 3],
        );
        let output = projection.execute(&volume).unwrap();
        assert_eq!(output.extent(), [0, 0, 0, 0, 0, 2]);
        let sums: Vec<u16> = output.data().iter().copied().collect();
        assert_eq!(sums, vec![3, 5, 7]);
        assert_eq!(output.origin()[2], 0.5);
    }

    #[test]
    fn projects_along_x() {
        let data = Array3::from_shape_fn((1, 2, 3), |(_, j, i)| (10 * j + i) as u16);
        let projection = ImageProjection {
            operation: ProjectionOperation::Maximum,
            slice_direction: 0,
            ..ImageProjection::default()
        };
        let output = projection.execute(&Volume::new(data, [1.0; 3])).unwrap();
        assert_eq!(output.dim(), (1, 2, 1));
        assert_eq!(output.data()[[0, 1, 0]], 12);
    }

    #[test]
    fn range_outside_extent_is_an_error() {
        let projection = ImageProjection {
            slice_range: (10, 12),
            ..ImageProjection::default()
        };
        assert!(matches!(
            projection.execute(&stack()),
            Err(ProjectionError::EmptyRange { .. })
        ));
        let projection = ImageProjection {
            slice_direction: 3,
            ..ImageProjection::default()
        };
        assert!(matches!(
            projection.execute(&stack()),
            Err(ProjectionError::InvalidDirection(3))
        ));
    }
}
