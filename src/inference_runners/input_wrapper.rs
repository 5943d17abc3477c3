use ndarray::{Array, IxDyn};

use crate::common::{BinError, Result};

/// Model input, wrapper over [`Array<f32, IxDyn>`] in `(batch, channel, height, width)` layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct X(pub Array<f32, IxDyn>);

impl From<Array<f32, IxDyn>> for X {
    fn from(x: Array<f32, IxDyn>) -> Self {
        Self(x)
    }
}

impl std::ops::Deref for X {
    type Target = Array<f32, IxDyn>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl X {
    pub fn from_shape_vec(shape: &[usize], xs: Vec<f32>) -> Result<Self> {
        Ok(Self::from(Array::from_shape_vec(shape, xs)?))
    }

    /// Fails unless this is a `(1, 3, size, size)` batch.
    pub fn ensure_nchw(&self, size: usize) -> Result<()> {
        let expected = [1, 3, size, size];
        if self.0.shape() != expected {
            return Err(BinError::Inference(format!(
                "expected input shape {:?}, got {:?}",
                expected,
                self.0.shape()
            )));
        }
        Ok(())
    }

    /// Row-major copy of the data, whatever the in-memory layout.
    pub fn to_contiguous_vec(&self) -> Vec<f32> {
        match self.0.as_slice() {
            Some(slice) => slice.to_vec(),
            None => self.0.iter().copied().collect(),
        }
    }
}
