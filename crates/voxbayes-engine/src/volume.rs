//! Voxel grids stored as contiguous buffers.
//!
//! All volumes use x-fastest (NIfTI on-disk) ordering:
//!
//! ```text
//! offset(i, j, k) = i + nx * (j + ny * k)
//! ```
//!
//! [`Shape::offset_of`] and [`Shape::coord_of`] are exact inverses, so a volume
//! can be flattened, processed as a plain slice and reshaped without copying.

use serde::{Deserialize, Serialize};

/// Dimensions of a 3-D voxel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{nx}x{ny}x{nz}")]
pub struct Shape {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Shape {
    #[must_use]
    pub const fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Number of voxels in the grid.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn contains(&self, [i, j, k]: [usize; 3]) -> bool {
        i < self.nx && j < self.ny && k < self.nz
    }

    /// Flat buffer offset of the voxel at `(i, j, k)`.
    ///
    /// ```
    /// # use voxbayes_engine::volume::Shape;
    /// let shape = Shape::new(4, 3, 2);
    /// assert_eq!(shape.offset_of([1, 2, 1]), 1 + 4 * (2 + 3 * 1));
    /// assert_eq!(shape.coord_of(21), [1, 2, 1]);
    /// ```
    #[must_use]
    pub const fn offset_of(&self, [i, j, k]: [usize; 3]) -> usize {
        debug_assert!(i < self.nx && j < self.ny && k < self.nz);
        i + self.nx * (j + self.ny * k)
    }

    /// Grid coordinate of the voxel at flat `offset`.
    #[must_use]
    pub const fn coord_of(&self, offset: usize) -> [usize; 3] {
        debug_assert!(offset < self.len());
        let i = offset % self.nx;
        let rest = offset / self.nx;
        [i, rest % self.ny, rest / self.ny]
    }
}

/// Voxel-to-world mapping carried unchanged from input to output volumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialTransform {
    /// 4x4 affine matrix, row-major.
    pub affine: [f64; 16],
    /// Voxel edge lengths along x, y and z.
    pub voxel_size: [f64; 3],
}

impl Default for SpatialTransform {
    fn default() -> Self {
        Self::from_voxel_size([1.0, 1.0, 1.0])
    }
}

impl SpatialTransform {
    /// Axis-aligned transform scaling grid coordinates by the voxel size.
    #[must_use]
    pub fn from_voxel_size(voxel_size: [f64; 3]) -> Self {
        let [x, y, z] = voxel_size;
        #[rustfmt::skip]
        let affine = [
            x,   0.0, 0.0, 0.0,
            0.0, y,   0.0, 0.0,
            0.0, 0.0, z,   0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        Self { affine, voxel_size }
    }

    /// Maps a grid coordinate to world space.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn apply(&self, [i, j, k]: [usize; 3]) -> [f64; 3] {
        let v = [i as f64, j as f64, k as f64, 1.0];
        std::array::from_fn(|row| {
            (0..4)
                .map(|col| self.affine[row * 4 + col] * v[col])
                .sum()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum VolumeError {
    #[display("buffer holds {actual} values but shape {shape} needs {expected}")]
    LengthMismatch {
        shape: Shape,
        expected: usize,
        actual: usize,
    },
    #[display("{what} has shape {actual}, expected {expected}")]
    ShapeMismatch {
        what: String,
        expected: Shape,
        actual: Shape,
    },
    #[display("at least one control volume is required")]
    NoControls,
}

/// A 3-D scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    shape: Shape,
    data: Vec<f64>,
}

impl Volume {
    /// Wraps `data` laid out in x-fastest order.
    pub fn new(shape: Shape, data: Vec<f64>) -> Result<Self, VolumeError> {
        if data.len() != shape.len() {
            return Err(VolumeError::LengthMismatch {
                shape,
                expected: shape.len(),
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// A volume with every voxel set to `value`.
    #[must_use]
    pub fn filled(shape: Shape, value: f64) -> Self {
        Self {
            shape,
            data: vec![value; shape.len()],
        }
    }

    /// Builds a volume by evaluating `f` at every coordinate.
    #[must_use]
    pub fn from_fn<F>(shape: Shape, mut f: F) -> Self
    where
        F: FnMut([usize; 3]) -> f64,
    {
        let data = (0..shape.len()).map(|o| f(shape.coord_of(o))).collect();
        Self { shape, data }
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// The flattened buffer.
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    #[must_use]
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Value at `coord`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, coord: [usize; 3]) -> Option<f64> {
        self.shape
            .contains(coord)
            .then(|| self.data[self.shape.offset_of(coord)])
    }

    /// Fails with [`VolumeError::ShapeMismatch`] unless `self` has `expected` shape.
    pub fn ensure_shape(&self, what: &str, expected: Shape) -> Result<(), VolumeError> {
        if self.shape == expected {
            Ok(())
        } else {
            Err(VolumeError::ShapeMismatch {
                what: what.to_owned(),
                expected,
                actual: self.shape,
            })
        }
    }
}
