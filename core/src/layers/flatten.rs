//! Flatten layer: reshapes a `[C, H, W]` feature map to 1D.
//!
//! Channel-major storage is already the order a dense layer reads, so only
//! the shape changes. The copy keeps the uniform arena-output interface.

use crate::arena::Arena;
use crate::error::NanoResult;
use crate::tensor::ensure_len;
use super::{Layer, Shape};

/// Flatten layer: [C, H, W] → [C*H*W].
pub struct FlattenLayer;

impl Layer for FlattenLayer {
    fn name(&self) -> &'static str { "Flatten" }

    fn output_shape(&self, input_shape: &Shape) -> NanoResult<Shape> {
        Ok(Shape::d1(input_shape.total()))
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
        Ok((output, Shape::d1(total)))
    }
}
