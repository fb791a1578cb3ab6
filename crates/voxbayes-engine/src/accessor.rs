use crate::volume::{Shape, Volume, VolumeError};

/// Supplies the case and control values at each voxel.
///
/// Implementations must be shareable across worker threads; the iterator only
/// reads from them.
pub trait SampleSource: Sync {
    /// Shape shared by the case and every control volume.
    fn shape(&self) -> Shape;

    /// Number of control volumes.
    fn control_count(&self) -> usize;

    /// Case value at flat `offset`.
    fn case_value(&self, offset: usize) -> f64;

    /// Replaces the contents of `out` with the control values at flat `offset`,
    /// one per control volume, in control order.
    fn control_values_into(&self, offset: usize, out: &mut Vec<f64>);

    /// Whether the voxel at `offset` lies outside the analysis mask.
    fn is_masked_out(&self, offset: usize) -> bool {
        let _ = offset;
        false
    }
}

/// In-memory case volume, control volumes and optional mask sharing one grid.
///
/// # Example
///
/// ```
/// use voxbayes_engine::{
///     accessor::{SampleSource as _, VolumeStack},
///     volume::{Shape, Volume},
/// };
///
/// let shape = Shape::new(2, 1, 1);
/// let case = Volume::new(shape, vec![5.0, 6.0]).unwrap();
/// let controls = vec![
///     Volume::new(shape, vec![1.0, 2.0]).unwrap(),
///     Volume::new(shape, vec![3.0, 4.0]).unwrap(),
/// ];
/// let stack = VolumeStack::new(case, controls).unwrap();
///
/// let mut values = Vec::new();
/// stack.control_values_into(1, &mut values);
/// assert_eq!(stack.case_value(1), 6.0);
/// assert_eq!(values, [2.0, 4.0]);
/// ```
#[derive(Debug, Clone)]
pub struct VolumeStack {
    case: Volume,
    controls: Vec<Volume>,
    mask: Option<Volume>,
}

impl VolumeStack {
    /// Stacks the volumes, checking that every control matches the case shape.
    pub fn new(case: Volume, controls: Vec<Volume>) -> Result<Self, VolumeError> {
        if controls.is_empty() {
            return Err(VolumeError::NoControls);
        }
        let shape = case.shape();
        for (i, control) in controls.iter().enumerate() {
            control.ensure_shape(&format!("control volume #{i}"), shape)?;
        }
        Ok(Self {
            case,
            controls,
            mask: None,
        })
    }

    /// Restricts the analysis to voxels where `mask` is non-zero and defined.
    pub fn with_mask(mut self, mask: Volume) -> Result<Self, VolumeError> {
        mask.ensure_shape("mask", self.case.shape())?;
        self.mask = Some(mask);
        Ok(self)
    }

    #[must_use]
    pub fn case(&self) -> &Volume {
        &self.case
    }

    #[must_use]
    pub fn controls(&self) -> &[Volume] {
        &self.controls
    }
}

impl SampleSource for VolumeStack {
    fn shape(&self) -> Shape {
        self.case.shape()
    }

    fn control_count(&self) -> usize {
        self.controls.len()
    }

    fn case_value(&self, offset: usize) -> f64 {
        self.case.data()[offset]
    }

    fn control_values_into(&self, offset: usize, out: &mut Vec<f64>) {
        out.clear();
        out.extend(self.controls.iter().map(|c| c.data()[offset]));
    }

    fn is_masked_out(&self, offset: usize) -> bool {
        self.mask.as_ref().is_some_and(|mask| {
            let value = mask.data()[offset];
            value == 0.0 || value.is_nan()
        })
    }
}
