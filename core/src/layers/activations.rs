//! Activation layers.

use crate::arena::Arena;
use crate::error::NanoResult;
use crate::math;
use crate::tensor::ensure_len;
use super::{Layer, Shape};

/// Slope PyTorch's `nn.LeakyReLU` uses when none is given.
pub const DEFAULT_NEG_SLOPE: f64 = 0.01;

/// Leaky rectifier. Zero parameters besides the negative slope.
pub struct LeakyReLULayer {
    pub neg_slope: f64,
}

impl LeakyReLULayer {
    pub const fn new(neg_slope: f64) -> Self {
        Self { neg_slope }
    }
}

impl Default for LeakyReLULayer {
    fn default() -> Self {
        Self::new(DEFAULT_NEG_SLOPE)
    }
}

impl Layer for LeakyReLULayer {
    fn name(&self) -> &'static str { "LeakyReLU" }

    fn output_shape(&self, input_shape: &Shape) -> NanoResult<Shape> {
        Ok(*input_shape) // Shape unchanged
    }

    fn forward<'a>(
        &self,
        input: &[f64],
        input_shape: &Shape,
        arena: &mut Arena<'a>,
    ) -> NanoResult<(&'a mut [f64], Shape)> {
        let total = input_shape.total();
        ensure_len(total, input.len())?;
        let output = arena.alloc(total)?;
        output.copy_from_slice(&input[..total]);
        math::leaky_relu_in_place(self.neg_slope, output);
        Ok((output, *input_shape))
    }
}
