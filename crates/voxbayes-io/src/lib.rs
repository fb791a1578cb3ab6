//! Reading and writing voxel volumes on disk.
//!
//! - [`nifti`]: NIfTI-1 volumes (`.nii` and gzip-compressed `.nii.gz`)
//! - [`discovery`]: locating control volumes in a directory

use std::path::PathBuf;

pub mod discovery;
pub mod nifti;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum IoError {
    #[display("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[display("failed to parse NIfTI file {}", path.display())]
    Parse {
        path: PathBuf,
        source: ::nifti::NiftiError,
    },
    #[display("{} is not a 3-D volume (shape {shape:?})", path.display())]
    NotThreeDimensional { path: PathBuf, shape: Vec<usize> },
    #[display("dimension {len} of {} exceeds the NIfTI-1 limit", path.display())]
    DimensionTooLarge { path: PathBuf, len: usize },
    #[display("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[display("failed to list {}", dir.display())]
    ListDirectory {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[display("invalid control file pattern")]
    Pattern(regex::Error),
}
