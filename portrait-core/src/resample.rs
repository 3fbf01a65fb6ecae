//! Grid resampling between model and image resolutions.

use rayon::prelude::*;

use crate::error::{PortraitError, PortraitResult};
use crate::grid::Grid;

/// Resizes a grid to a new resolution.
///
/// Implementations must keep cell values intact (no blending): the inputs are class labels and
/// bucket indices as well as scores.
pub trait Resampler: Send + Sync + std::fmt::Debug {
    fn resample<T: Copy + Send + Sync>(
        &self,
        grid: &Grid<T>,
        target_width: u32,
        target_height: u32,
    ) -> PortraitResult<Grid<T>>;
}

/// Nearest-cell lookup sampling each target cell at its center.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestResampler;

/// Index of the source cell covering the center of target cell `dst`.
#[inline]
fn nearest_source(dst: u32, src_len: u32, dst_len: u32) -> usize {
    let scaled = (2 * dst as u64 + 1) * src_len as u64 / (2 * dst_len as u64);
    scaled.min(src_len as u64 - 1) as usize
}

impl Resampler for NearestResampler {
    fn resample<T: Copy + Send + Sync>(
        &self,
        grid: &Grid<T>,
        target_width: u32,
        target_height: u32,
    ) -> PortraitResult<Grid<T>> {
        if target_width == 0 || target_height == 0 {
            return Err(PortraitError::invalid(format!(
                "resample target must be non-zero, got {target_width}x{target_height}"
            )));
        }
        let (src_w, src_h) = grid.dimensions();
        if (src_w, src_h) == (target_width, target_height) {
            return Ok(grid.clone());
        }

        let columns: Vec<usize> = (0..target_width)
            .map(|x| nearest_source(x, src_w, target_width))
            .collect();
        let columns = &columns;
        let data: Vec<T> = (0..target_height)
            .into_par_iter()
            .flat_map_iter(|y| {
                let row = grid.row_unchecked(nearest_source(y, src_h, target_height) as u32);
                columns.iter().map(move |&sx| row[sx])
            })
            .collect();

        Grid::from_vec(target_width, target_height, data)
    }
}
