//! Dense (affine) layer with parameters borrowed from Flash or the caller.

use crate::arena::Arena;
use crate::error::{NanoResult, ShapeViolation};
use crate::math;
use crate::tensor::{checked_volume, LinearParam};
use super::{Layer, Shape};

pub struct LinearLayer<'p> {
    pub param: LinearParam<'p>,
}

impl<'p> LinearLayer<'p> {
    /// Fails unless `weight` and `bias` cover `fea_size × inp_size` and
    /// `fea_size` scalars.
    pub fn new(param: LinearParam<'p>) -> NanoResult<Self> {
        let in_features = param.inp_size as usize;
        let out_features = param.fea_size as usize;
        let weight_len = checked_volume(&[out_features, in_features])?;
        if param.weight.len() != weight_len {
            return Err(ShapeViolation::DimensionMismatch {
                expected: weight_len,
                actual: param.weight.len(),
            }
            .into());
        }
        if param.bias.len() != out_features {
            return Err(ShapeViolation::DimensionMismatch {
                expected: out_features,
                actual: param.bias.len(),
            }
            .into());
        }
        Ok(Self { param })
    }
}

impl Layer for LinearLayer<'_> {
    fn name(&self) -> &'static str { "Linear" }

    fn output_shape(&self, input_shape: &Shape) -> NanoResult<Shape> {
        let in_total = input_shape.total();
        if in_total != self.param.inp_size as usize {
            return Err(ShapeViolation::DimensionMismatch {
                expected: self.param.inp_size as usize,
                actual: in_total,
            }
            .into());
        }
        Ok(Shape::d1(self.param.fea_size as usize))
    }

    fn forward<'a>(
        &self,
        input: &[f64],
        input_shape: &Shape,
        arena: &mut Arena<'a>,
    ) -> NanoResult<(&'a mut [f64], Shape)> {
        let out_shape = self.output_shape(input_shape)?;
        let output = arena.alloc(out_shape.total())?;
        math::linear_layer(input, &self.param, output)?;
        Ok((output, out_shape))
    }
}
