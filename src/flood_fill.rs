use std::collections::VecDeque;

use glam::DVec3;
use log::{debug, warn};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::volume::{Volume, VolumeError};

/// Threshold-limited, 6-connected region growing from world-space seeds.
///
/// Filled voxels keep their value (or become `in_value` with
/// `replace_in`); all other voxels become `out_value` unless
/// `replace_out` is cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodFill {
    pub seeds: Vec<DVec3>,
    pub lower: f64,
    pub upper: f64,
    pub replace_in: bool,
    pub in_value: u16,
    pub replace_out: bool,
    pub out_value: u16,
    /// Limits the fill to this extent; the whole input when `None`.
    pub region: Option<[i32; 6]>,
}

impl Default for FloodFill {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            lower: f64::MIN,
            upper: f64::MAX,
            replace_in: false,
            in_value: 0,
            replace_out: true,
            out_value: 0,
            region: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FloodFillOutput {
    pub volume: Volume,
    pub filled_voxels: usize,
    /// Extent of the filled voxels, `None` when nothing was filled.
    pub filled_extent: Option<[i32; 6]>,
}

impl FloodFill {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_seed(&mut self, point: DVec3) {
        self.seeds.push(point);
    }

    /// Fill values greater than or equal to `threshold`.
    pub fn threshold_by_upper(&mut self, threshold: f64) {
        self.lower = threshold;
        self.upper = f64::MAX;
    }

    /// Fill values less than or equal to `threshold`.
    pub fn threshold_by_lower(&mut self, threshold: f64) {
        self.lower = f64::MIN;
        self.upper = threshold;
    }

    /// Fill values in `[lower, upper]`.
    pub fn threshold_between(&mut self, lower: f64, upper: f64) {
        self.lower = lower;
        self.upper = upper;
    }

    fn in_range(&self, value: u16) -> bool {
        let value = value as f64;
        value >= self.lower && value <= self.upper
    }

    /// Array-index bounds `[lo, hi]` per axis `(i, j, k)` the fill may
    /// visit.
    fn index_bounds(&self, volume: &Volume) -> Option<[(usize, usize); 3]> {
        let extent = volume.extent();
        let region = self.region.unwrap_or(extent);
        let mut bounds = [(0, 0); 3];
        for axis in 0..3 {
            let lo = region[2 * axis].max(extent[2 * axis]) - extent[2 * axis];
            let hi = region[2 * axis + 1].min(extent[2 * axis + 1]) - extent[2 * axis];
            if lo > hi {
                return None;
            }
            bounds[axis] = (lo as usize, hi as usize);
        }
        Some(bounds)
    }

    pub fn execute(&self, volume: &Volume) -> Result<FloodFillOutput, VolumeError> {
        let data = volume.data();
        let mut mask = Array3::from_elem(data.dim(), false);
        let mut queue = VecDeque::new();
        let mut filled_voxels = 0;
        let mut filled: Option<[usize; 6]> = None;

        let bounds = self.index_bounds(volume);
        if bounds.is_none() {
            warn!("flood region {:?} does not overlap the volume", self.region);
        }
        let inside = |i: i64, j: i64, k: i64| {
            bounds.is_some_and(|bounds| {
                bounds
                    .iter()
                    .zip([i, j, k])
                    .all(|(&(lo, hi), v)| v >= lo as i64 && v <= hi as i64)
            })
        };

        for seed in &self.seeds {
            let index = volume.world_to_continuous_index(*seed).round();
            let (i, j, k) = (index.x as i64, index.y as i64, index.z as i64);
            if !inside(i, j, k) {
                warn!("seed {seed:?} lies outside the flood region");
                continue;
            }
            queue.push_back((i as usize, j as usize, k as usize));
        }

        while let Some((i, j, k)) = queue.pop_front() {
            if mask[[k, j, i]] || !self.in_range(data[[k, j, i]]) {
                continue;
            }
            mask[[k, j, i]] = true;
            filled_voxels += 1;
            let extent = filled.get_or_insert([i, i, j, j, k, k]);
            for (axis, v) in [i, j, k].into_iter().enumerate() {
                extent[2 * axis] = extent[2 * axis].min(v);
                extent[2 * axis + 1] = extent[2 * axis + 1].max(v);
            }

            let (i, j, k) = (i as i64, j as i64, k as i64);
            for (di, dj, dk) in [
                (-1, 0, 0),
                (1, 0, 0),
                (0, -1, 0),
                (0, 1, 0),
                (0, 0, -1),
                (0, 0, 1),
            ] {
                let (ni, nj, nk) = (i + di, j + dj, k + dk);
                if inside(ni, nj, nk) && !mask[[nk as usize, nj as usize, ni as usize]] {
                    queue.push_back((ni as usize, nj as usize, nk as usize));
                }
            }
        }
        debug!("flood fill reached {filled_voxels} voxels");

        let output = ndarray::Zip::from(data)
            .and(&mask)
            .map_collect(|&value, &is_filled| match (is_filled, self.replace_in, self.replace_out) {
                (true, true, _) => self.in_value,
                (true, false, _) => value,
                (false, _, true) => self.out_value,
                (false, _, false) => value,
            });

        let offset = volume.extent();
        let filled_extent = filled.map(|e| {
            let mut extent = [0; 6];
            for (n, v) in e.into_iter().enumerate() {
                extent[n] = v as i32 + offset[n / 2 * 2];
            }
            extent
        });

        Ok(FloodFillOutput {
            volume: Volume::with_geometry(
                output,
                volume.extent(),
                volume.spacing(),
                volume.origin(),
            )?,
            filled_voxels,
            filled_extent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 5x5x1 slice with a bright plus-shaped blob in the centre and a
    /// separate bright voxel in a corner.
    fn blobs() -> Volume {
        let mut data = Array3::from_elem((1, 5, 5), 10u16);
        for (j, i) in [(2, 2), (1, 2), (3, 2), (2, 1), (2, 3), (0, 0)] {
            data[[0, j, i]] = 500;
        }
        Volume::new(data, [1.0; 3])
    }

    #[test]
    fn fills_only_the_connected_region() {
        let mut fill = FloodFill::new();
        fill.threshold_by_upper(100.0);
        fill.add_seed(DVec3::new(2.0, 2.0, 0.0));
        let output = fill.execute(&blobs()).unwrap();
        assert_eq!(output.filled_voxels, 5);
        assert_eq!(output.filled_extent, Some([1, 3, 1, 3, 0, 0]));
        assert_eq!(output.volume.value_at(2, 2, 0), Some(500));
        assert_eq!(output.volume.value_at(0, 0, 0), Some(0));
        assert_eq!(output.volume.value_at(4, 4, 0), Some(0));
    }

    #[test]
    fn replace_values_inside_and_keep_outside() {
        let mut fill = FloodFill::new();
        fill.threshold_between(0.0, 20.0);
        fill.replace_in = true;
        fill.in_value = 1;
        fill.replace_out = false;
        fill.add_seed(DVec3::new(4.0, 4.0, 0.0));
        let output = fill.execute(&blobs()).unwrap();
        assert_eq!(output.filled_voxels, 19);
        assert_eq!(output.volume.value_at(4, 4, 0), Some(1));
        assert_eq!(output.volume.value_at(2, 2, 0), Some(500));
    }

    #[test]
    fn seed_below_threshold_fills_nothing() {
        let mut fill = FloodFill::new();
        fill.threshold_by_upper(100.0);
        fill.add_seed(DVec3::new(4.0, 4.0, 0.0));
        let output = fill.execute(&blobs()).unwrap();
        assert_eq!(output.filled_voxels, 0);
        assert_eq!(output.filled_extent, None);
        assert!(output.volume.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn region_limits_the_fill() {
        let mut fill = FloodFill::new();
        fill.threshold_by_upper(100.0);
        fill.region = Some([2, 4, 0, 4, 0, 0]);
        fill.add_seed(DVec3::new(2.0, 2.0, 0.0));
        fill.add_seed(DVec3::new(0.0, 0.0, 0.0));
        let output = fill.execute(&blobs()).unwrap();
        // (2,1), (2,2), (2,3) and (3,2); the corner seed is outside
        assert_eq!(output.filled_voxels, 4);
    }
}
