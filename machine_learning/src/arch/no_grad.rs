use std::ops::{Deref, DerefMut};

use super::Model;

/// Suspends gradient tracking on a model for as long as it lives.
///
/// The previous setting is restored on drop, so every exit path (early returns, `?`, panics)
/// leaves the model as it was found.
pub struct NoGrad<'m, M: Model + ?Sized> {
    model: &'m mut M,
    prev: bool,
}

impl<'m, M: Model + ?Sized> NoGrad<'m, M> {
    pub fn new(model: &'m mut M) -> Self {
        let prev = model.set_grad_enabled(false);
        Self { model, prev }
    }
}

impl<M: Model + ?Sized> Deref for NoGrad<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.model
    }
}

impl<M: Model + ?Sized> DerefMut for NoGrad<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.model
    }
}

impl<M: Model + ?Sized> Drop for NoGrad<'_, M> {
    fn drop(&mut self) {
        self.model.set_grad_enabled(self.prev);
    }
}
