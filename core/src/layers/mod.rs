//! Layer wrappers over the kernels, for caller-arranged pipelines.

pub mod activations;
pub mod conv;
pub mod dense;
pub mod flatten;

use crate::arena::Arena;
use crate::error::{NanoResult, ShapeViolation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub dims: [usize; 4],
    pub ndim: usize,
}

impl Shape {
    pub const fn d1(size: usize) -> Self {
        Self { dims: [size, 0, 0, 0], ndim: 1 }
    }
    pub const fn d2(d0: usize, d1: usize) -> Self {
        Self { dims: [d0, d1, 0, 0], ndim: 2 }
    }
    pub const fn d3(c: usize, h: usize, w: usize) -> Self {
        Self { dims: [c, h, w, 0], ndim: 3 }
    }
    pub fn total(&self) -> usize {
        self.dims[..self.ndim].iter().product()
    }
    pub fn channels(&self) -> usize {
        if self.ndim >= 3 { self.dims[0] } else { 1 }
    }
    pub fn height(&self) -> usize {
        if self.ndim >= 3 { self.dims[1] } else { 0 }
    }
    pub fn width(&self) -> usize {
        if self.ndim >= 3 { self.dims[2] } else { 0 }
    }

    /// Fails unless this is a `[C, H, W]` shape.
    pub(crate) fn expect_d3(&self) -> NanoResult<()> {
        if self.ndim != 3 {
            return Err(ShapeViolation::DimensionMismatch { expected: 3, actual: self.ndim }.into());
        }
        Ok(())
    }
}

pub trait Layer: Send {
    fn name(&self) -> &'static str;
    fn output_shape(&self, input_shape: &Shape) -> NanoResult<Shape>;

    /// Extra arena scalars `forward` borrows as scratch beyond its output.
    fn scratch_len(&self, _input_shape: &Shape) -> usize {
        0
    }

    fn forward<'a>(
        &self,
        input: &[f64],
        input_shape: &Shape,
        arena: &mut Arena<'a>,
    ) -> NanoResult<(&'a mut [f64], Shape)>;
}

pub use activations::LeakyReLULayer;
pub use conv::Conv2dBnLayer;
pub use dense::LinearLayer;
pub use flatten::FlattenLayer;
