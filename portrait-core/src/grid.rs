//! Row-major grids backing masks, depth scores and bucket maps.
//!
//! Storage is a flat `Vec<T>` with `stride == width`; rows are contiguous, which is what the
//! parallel stages split on.

use crate::error::{PortraitError, PortraitResult};

/// Owned 2-D grid in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

/// Per-cell segmentation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskClass {
    /// Subject; always kept sharp.
    Foreground,
    /// Scene behind the subject; eligible for blur.
    Background,
}

/// Segmentation at image resolution.
pub type BinaryMask = Grid<MaskClass>;
/// Segmentation at model resolution, used to seed depth normalization.
pub type CoarseMask = Grid<MaskClass>;
/// Raw, uncalibrated depth scores at model resolution.
pub type DepthScoreGrid = Grid<f32>;
/// Baseline-relative, scaled, non-negative depth magnitudes.
pub type MagnitudeGrid = Grid<f32>;

impl<T> Grid<T> {
    /// Wrap `data` (row-major) as a `width`x`height` grid.
    pub fn from_vec(width: u32, height: u32, data: Vec<T>) -> PortraitResult<Self> {
        if width == 0 || height == 0 {
            return Err(PortraitError::invalid(format!(
                "grid dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(PortraitError::invalid(format!(
                "grid data holds {} cells, {width}x{height} needs {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a grid by evaluating `f(x, y)` for every cell.
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> T,
    ) -> PortraitResult<Self> {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::from_vec(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`; construction rejects empty grids.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<&T> {
        if x < self.width && y < self.height {
            self.data.get(self.index(x, y))
        } else {
            None
        }
    }

    /// Contiguous cells of row `y`, or `None` past the last row.
    #[inline]
    pub fn row(&self, y: u32) -> Option<&[T]> {
        (y < self.height).then(|| self.row_unchecked(y))
    }

    /// Row `y`; callers guarantee `y < height`.
    #[inline]
    pub(crate) fn row_unchecked(&self, y: u32) -> &[T] {
        let start = self.index(0, y);
        &self.data[start..start + self.width as usize]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Apply `f` to every cell, keeping the shape.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl<T: Copy> Grid<T> {
    /// Copy out the `width`x`height` window whose top-left corner is `(x, y)`.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> PortraitResult<Self> {
        let fits = x.checked_add(width).is_some_and(|right| right <= self.width)
            && y.checked_add(height).is_some_and(|bottom| bottom <= self.height);
        if !fits {
            return Err(PortraitError::invalid(format!(
                "crop {width}x{height}+{x}+{y} exceeds {}x{} grid",
                self.width, self.height
            )));
        }
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for row in y..y + height {
            let start = x as usize;
            data.extend_from_slice(&self.row_unchecked(row)[start..start + width as usize]);
        }
        Self::from_vec(width, height, data)
    }
}

impl<T: Clone> Grid<T> {
    /// A grid with every cell set to `value`.
    pub fn filled(width: u32, height: u32, value: T) -> PortraitResult<Self> {
        Self::from_vec(width, height, vec![value; width as usize * height as usize])
    }
}
