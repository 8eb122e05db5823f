use anyhow::Result;
use ndarray::{Array, IxDyn};

/// Model input/output tensor, wrapper over [`Array<f32, IxDyn>`]
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
    pub fn zeros(shape: &[usize]) -> Self {
        Self::from(Array::zeros(IxDyn(shape)))
    }

    pub fn from_shape_vec(shape: &[usize], xs: Vec<f32>) -> Result<Self> {
        Ok(Self::from(Array::from_shape_vec(IxDyn(shape), xs)?))
    }

    pub fn into_inner(self) -> Array<f32, IxDyn> {
        self.0
    }
}
