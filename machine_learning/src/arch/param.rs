use ndarray::{Array, ArrayViewD, ArrayViewMutD, Dimension};

/// A learnable tensor together with the gradient accumulated for it.
#[derive(Debug, Clone)]
pub struct Param<D: Dimension> {
    value: Array<f32, D>,
    grad: Array<f32, D>,
}

impl<D: Dimension> Param<D> {
    /// Creates a new `Param` with a zeroed gradient of the same shape as `value`.
    pub fn new(value: Array<f32, D>) -> Self {
        let grad = Array::zeros(value.raw_dim());
        Self { value, grad }
    }

    pub fn value(&self) -> &Array<f32, D> {
        &self.value
    }

    pub fn grad(&self) -> &Array<f32, D> {
        &self.grad
    }

    pub(crate) fn grad_mut(&mut self) -> &mut Array<f32, D> {
        &mut self.grad
    }

    /// A read-only named view, used for parameter enumeration.
    pub fn named(&self, name: &str) -> ParamRef<'_> {
        ParamRef {
            name: name.to_string(),
            value: self.value.view().into_dyn(),
            grad: self.grad.view().into_dyn(),
        }
    }

    /// A mutable named view, used by optimizers.
    pub fn named_mut(&mut self, name: &str) -> ParamMut<'_> {
        ParamMut {
            name: name.to_string(),
            value: self.value.view_mut().into_dyn(),
            grad: self.grad.view_mut().into_dyn(),
        }
    }
}

/// Read-only view over a named parameter.
#[derive(Debug)]
pub struct ParamRef<'a> {
    pub name: String,
    pub value: ArrayViewD<'a, f32>,
    pub grad: ArrayViewD<'a, f32>,
}

/// Mutable view over a named parameter.
#[derive(Debug)]
pub struct ParamMut<'a> {
    pub name: String,
    pub value: ArrayViewMutD<'a, f32>,
    pub grad: ArrayViewMutD<'a, f32>,
}

/// Anything that owns learnable parameters and can yield them.
///
/// Names are stable for the lifetime of the owner, optimizers key their state by them.
pub trait Parameters {
    fn parameters(&self) -> Vec<ParamRef<'_>>;

    fn parameters_mut(&mut self) -> Vec<ParamMut<'_>>;

    /// Returns the amount of scalar parameters.
    fn size(&self) -> usize {
        self.parameters().iter().map(|p| p.value.len()).sum()
    }
}

/// Prepends `scope` to the name of every parameter in `params`.
pub(crate) fn scoped<P: Named>(scope: &str, params: Vec<P>) -> Vec<P> {
    params
        .into_iter()
        .map(|mut p| {
            let name = format!("{scope}.{}", p.name());
            p.set_name(name);
            p
        })
        .collect()
}

pub(crate) trait Named {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
}

impl Named for ParamRef<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl Named for ParamMut<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}
