//! NIfTI-1 volume files.
//!
//! Input files of any NIfTI data type are read through the `nifti` crate and
//! converted to `f64`, with `scl_slope`/`scl_inter` applied. Output files are
//! always single-file NIfTI-1 (`n+1`) with `float32` voxels and the input's
//! affine stored in the sform. A path ending in `.gz` is gzip-compressed.
//!
//! Trailing singleton axes are dropped on read, so a `(X, Y, Z, 1)` image is
//! accepted as a 3-D volume.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use ::nifti::{InMemNiftiObject, NiftiHeader, NiftiObject as _, volume::ndarray::IntoNdArray as _};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use ndarray::{ArrayD, Axis, Ix3};
use voxbayes_engine::volume::{Shape, SpatialTransform, Volume};

use crate::IoError;

/// Size of the NIfTI-1 header in bytes.
const HEADER_SIZE: usize = 348;
/// Header plus the empty 4-byte extension block.
const VOX_OFFSET: usize = HEADER_SIZE + 4;
const DT_FLOAT32: i16 = 16;
const NIFTI_XFORM_SCANNER_ANAT: i16 = 1;
/// `xyzt_units`: millimetres and seconds.
const UNITS_MM_SEC: u8 = 2 | 8;

/// A volume together with its placement in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiImage {
    pub volume: Volume,
    pub transform: SpatialTransform,
}

/// Reads a `.nii` or `.nii.gz` file. Compression is detected from the content.
pub fn read_volume(path: &Path) -> Result<NiftiImage, IoError> {
    let bytes = std::fs::read(path).map_err(|source| IoError::Read {
        path: path.to_owned(),
        source,
    })?;
    let parse_error = |source: ::nifti::NiftiError| IoError::Parse {
        path: path.to_owned(),
        source,
    };

    let object = if is_gzip(&bytes) {
        InMemNiftiObject::from_reader(GzDecoder::new(bytes.as_slice()))
    } else {
        InMemNiftiObject::from_reader(bytes.as_slice())
    }
    .map_err(parse_error)?;

    let transform = transform_of(object.header());
    let array: ArrayD<f64> = object.into_volume().into_ndarray().map_err(parse_error)?;
    let array = into_three_dimensional(path, array)?;

    let (nx, ny, nz) = array.dim();
    let shape = Shape::new(nx, ny, nz);
    // Reversing the axes makes logical iteration order x-fastest.
    let data = array.t().iter().copied().collect();
    let volume = Volume::new(shape, data).map_err(|_| IoError::NotThreeDimensional {
        path: path.to_owned(),
        shape: vec![nx, ny, nz],
    })?;

    tracing::debug!(path = %path.display(), %shape, "read volume");
    Ok(NiftiImage { volume, transform })
}

/// Writes `volume` as `float32` NIfTI-1, gzip-compressed if `path` ends in `.gz`.
pub fn write_volume(
    path: &Path,
    volume: &Volume,
    transform: &SpatialTransform,
) -> Result<(), IoError> {
    let header = encode_header(volume.shape(), transform).map_err(|len| {
        IoError::DimensionTooLarge {
            path: path.to_owned(),
            len,
        }
    })?;
    let write_error = |source| IoError::Write {
        path: path.to_owned(),
        source,
    };

    let file = BufWriter::new(File::create(path).map_err(write_error)?);
    if is_gzip_path(path) {
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_image(&mut encoder, &header, volume).map_err(write_error)?;
        encoder
            .finish()
            .and_then(|mut file| file.flush())
            .map_err(write_error)?;
    } else {
        let mut file = file;
        write_image(&mut file, &header, volume).map_err(write_error)?;
        file.flush().map_err(write_error)?;
    }

    tracing::debug!(path = %path.display(), shape = %volume.shape(), "wrote volume");
    Ok(())
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0x1f, 0x8b])
}

fn is_gzip_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

fn into_three_dimensional(
    path: &Path,
    mut array: ArrayD<f64>,
) -> Result<ndarray::Array3<f64>, IoError> {
    while array.ndim() > 3 && array.shape()[array.ndim() - 1] == 1 {
        let last = Axis(array.ndim() - 1);
        array = array.index_axis_move(last, 0);
    }
    while array.ndim() < 3 {
        let next = Axis(array.ndim());
        array.insert_axis_inplace(next);
    }
    let shape = array.shape().to_vec();
    array
        .into_dimensionality::<Ix3>()
        .map_err(|_| IoError::NotThreeDimensional {
            path: path.to_owned(),
            shape,
        })
}

fn transform_of(header: &NiftiHeader) -> SpatialTransform {
    let voxel_size: [f64; 3] = std::array::from_fn(|axis| {
        let size = f64::from(header.pixdim[axis + 1]).abs();
        if size > 0.0 { size } else { 1.0 }
    });
    if header.sform_code <= 0 {
        return SpatialTransform::from_voxel_size(voxel_size);
    }

    let rows = [header.srow_x, header.srow_y, header.srow_z];
    let affine = std::array::from_fn(|i| {
        let (row, col) = (i / 4, i % 4);
        match row {
            0..3 => f64::from(rows[row][col]),
            _ if col == 3 => 1.0,
            _ => 0.0,
        }
    });
    SpatialTransform { affine, voxel_size }
}

/// Builds the 348-byte header, or returns the first dimension too large for it.
#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn encode_header(shape: Shape, transform: &SpatialTransform) -> Result<[u8; HEADER_SIZE], usize> {
    let dim = |len: usize| i16::try_from(len).map_err(|_| len);
    let dims: [i16; 8] = [3, dim(shape.nx)?, dim(shape.ny)?, dim(shape.nz)?, 1, 1, 1, 1];

    let mut header = [0u8; HEADER_SIZE];
    let mut put = |offset: usize, bytes: &[u8]| {
        header[offset..offset + bytes.len()].copy_from_slice(bytes);
    };

    put(0, &(HEADER_SIZE as i32).to_le_bytes());
    for (i, d) in dims.iter().enumerate() {
        put(40 + i * 2, &d.to_le_bytes());
    }
    put(70, &DT_FLOAT32.to_le_bytes());
    put(72, &32i16.to_le_bytes());

    let [vx, vy, vz] = transform.voxel_size;
    let pixdim = [1.0, vx, vy, vz, 1.0, 1.0, 1.0, 1.0];
    for (i, p) in pixdim.iter().enumerate() {
        put(76 + i * 4, &(*p as f32).to_le_bytes());
    }
    put(108, &(VOX_OFFSET as f32).to_le_bytes());
    put(112, &1.0f32.to_le_bytes());
    put(123, &[UNITS_MM_SEC]);
    put(254, &NIFTI_XFORM_SCANNER_ANAT.to_le_bytes());
    for row in 0..3 {
        for col in 0..4 {
            let value = transform.affine[row * 4 + col] as f32;
            put(280 + row * 16 + col * 4, &value.to_le_bytes());
        }
    }
    put(344, b"n+1\0");
    Ok(header)
}

#[expect(clippy::cast_possible_truncation)]
fn write_image<W>(out: &mut W, header: &[u8; HEADER_SIZE], volume: &Volume) -> io::Result<()>
where
    W: Write,
{
    out.write_all(header)?;
    out.write_all(&[0u8; VOX_OFFSET - HEADER_SIZE])?;
    for &value in volume.data() {
        out.write_all(&(value as f32).to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[expect(clippy::cast_precision_loss)]
    fn sample() -> (Volume, SpatialTransform) {
        let shape = Shape::new(4, 3, 2);
        let volume = Volume::from_fn(shape, |[i, j, k]| (i + 10 * j + 100 * k) as f64 * 0.5);
        let mut transform = SpatialTransform::from_voxel_size([2.0, 2.5, 3.0]);
        transform.affine[3] = -90.0;
        transform.affine[7] = 126.0;
        transform.affine[11] = -72.0;
        (volume, transform)
    }

    fn round_trip(name: &str) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        let (volume, transform) = sample();

        write_volume(&path, &volume, &transform).unwrap();
        let image = read_volume(&path).unwrap();

        assert_eq!(image.volume.shape(), volume.shape());
        assert_eq!(image.volume.data(), volume.data());
        assert_eq!(image.transform, transform);
    }

    #[test]
    fn test_round_trip_uncompressed() {
        round_trip("volume.nii");
    }

    #[test]
    fn test_round_trip_gzip() {
        round_trip("volume.nii.gz");
    }

    #[test]
    fn test_gzip_is_chosen_by_extension() {
        let dir = TempDir::new().unwrap();
        let (volume, transform) = sample();
        let plain = dir.path().join("a.nii");
        let packed = dir.path().join("a.nii.gz");
        write_volume(&plain, &volume, &transform).unwrap();
        write_volume(&packed, &volume, &transform).unwrap();

        let plain = std::fs::read(plain).unwrap();
        assert!(!is_gzip(&plain));
        assert_eq!(plain.len(), VOX_OFFSET + 4 * volume.shape().len());
        assert_eq!(&plain[344..348], b"n+1\0");
        assert!(is_gzip(&std::fs::read(packed).unwrap()));
    }

    #[test]
    fn test_undefined_voxels_survive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nan.nii");
        let shape = Shape::new(2, 1, 1);
        let volume = Volume::new(shape, vec![f64::NAN, 0.25]).unwrap();
        write_volume(&path, &volume, &SpatialTransform::default()).unwrap();

        let image = read_volume(&path).unwrap();
        assert!(image.volume.data()[0].is_nan());
        assert_eq!(image.volume.data()[1], 0.25);
    }

    #[test]
    fn test_header_layout() {
        let (volume, transform) = sample();
        let header = encode_header(volume.shape(), &transform).unwrap();
        let i16_at = |o: usize| i16::from_le_bytes([header[o], header[o + 1]]);
        let f32_at =
            |o: usize| f32::from_le_bytes([header[o], header[o + 1], header[o + 2], header[o + 3]]);

        assert_eq!(i16_at(40), 3);
        assert_eq!([i16_at(42), i16_at(44), i16_at(46)], [4, 3, 2]);
        assert_eq!(i16_at(70), DT_FLOAT32);
        assert_eq!(f32_at(80), 2.0);
        assert_eq!(f32_at(108), 352.0);
        assert_eq!(f32_at(280 + 12), -90.0);
        assert_eq!(f32_at(296 + 12), 126.0);
    }

    #[test]
    fn test_oversized_dimension_rejected() {
        let shape = Shape::new(40_000, 1, 1);
        assert_eq!(
            encode_header(shape, &SpatialTransform::default()),
            Err(40_000)
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_volume(&dir.path().join("absent.nii")).unwrap_err();
        assert!(matches!(err, IoError::Read { .. }));
    }

    #[test]
    fn test_garbage_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.nii");
        std::fs::write(&path, [0u8; 16]).unwrap();
        assert!(read_volume(&path).is_err());
    }
}
