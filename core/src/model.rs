//! SequentialModel: chain caller-ordered layers into a pipeline.
//!
//! ```text
//! Input → Layer[0] → Layer[1] → ... → Layer[N-1] → Output
//! ```
//!
//! Each layer declares its output shape, so the chain is validated at
//! construction time, before any data flows through.

use crate::arena::Arena;
use crate::error::{NanoResult, ShapeViolation};
use crate::layers::{Layer, Shape};
use crate::math;

/// A sequential model: layers executed in order, output feeds into next.
///
/// # Lifetime `'m`
/// The model borrows layer references; layers must outlive it. On the board
/// they are typically `static` or stack-allocated.
pub struct SequentialModel<'m> {
    layers: &'m [&'m dyn Layer],
    input_shape: Shape,
}

impl<'m> SequentialModel<'m> {
    /// Validates that every layer accepts the previous layer's output.
    pub fn new(layers: &'m [&'m dyn Layer], input_shape: Shape) -> NanoResult<Self> {
        let mut shape = input_shape;
        for layer in layers.iter() {
            shape = layer.output_shape(&shape)?;
        }

        Ok(Self { layers, input_shape })
    }

    /// Run the forward pass. Every intermediate output is arena-allocated
    /// and stays valid for `'a`.
    pub fn forward<'a>(
        &self,
        input: &[f64],
        arena: &mut Arena<'a>,
    ) -> NanoResult<(&'a mut [f64], Shape)> {
        if input.len() != self.input_shape.total() {
            return Err(ShapeViolation::DimensionMismatch {
                expected: self.input_shape.total(),
                actual: input.len(),
            }
            .into());
        }

        let Some((first, rest)) = self.layers.split_first() else {
            let out = arena.alloc(input.len())?;
            out.copy_from_slice(input);
            return Ok((out, self.input_shape));
        };

        let (mut current, mut shape) = first.forward(input, &self.input_shape, arena)?;
        log::debug!("layer 0 ({}) -> {:?}", first.name(), &shape.dims[..shape.ndim]);

        for (idx, layer) in rest.iter().enumerate() {
            let prev: &'a [f64] = current;
            let (out, out_shape) = layer.forward(prev, &shape, arena)?;
            log::debug!("layer {} ({}) -> {:?}", idx + 1, layer.name(), &out_shape.dims[..out_shape.ndim]);
            current = out;
            shape = out_shape;
        }

        Ok((current, shape))
    }

    /// Forward + argmax on the final output.
    pub fn predict(&self, input: &[f64], arena: &mut Arena<'_>) -> NanoResult<usize> {
        let (logits, _shape) = self.forward(input, arena)?;
        math::argmax(logits)
    }

    pub fn output_shape(&self) -> NanoResult<Shape> {
        let mut shape = self.input_shape;
        for layer in self.layers.iter() {
            shape = layer.output_shape(&shape)?;
        }
        Ok(shape)
    }

    pub fn input_shape(&self) -> Shape {
        self.input_shape
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, idx: usize) -> Option<&dyn Layer> {
        self.layers.get(idx).copied()
    }

    /// Arena scalars a forward pass needs: every layer output (the bump
    /// arena never frees) plus the largest scratch any layer borrows.
    pub fn estimate_arena_size(&self) -> NanoResult<usize> {
        let mut outputs: usize = 0;
        let mut scratch: usize = 0;
        let mut shape = self.input_shape;
        for layer in self.layers.iter() {
            let next = layer.output_shape(&shape)?;
            outputs += next.total();
            scratch = scratch.max(layer.scratch_len(&shape));
            shape = next;
        }
        if self.layers.is_empty() {
            outputs = self.input_shape.total();
        }
        Ok(outputs + scratch)
    }
}
