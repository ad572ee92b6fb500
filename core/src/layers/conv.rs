//! Fused Conv2D + BatchNorm layer.

use crate::arena::Arena;
use crate::error::NanoResult;
use crate::math;
use crate::tensor::{to_u16, Conv2dConfig, Conv2dData};
use super::{Layer, Shape};

/// Conv2D + BN with parameters borrowed for `'p` (Flash on the board).
pub struct Conv2dBnLayer<'p> {
    pub config: Conv2dConfig<'p>,
}

impl<'p> Conv2dBnLayer<'p> {
    pub const fn new(config: Conv2dConfig<'p>) -> Self {
        Self { config }
    }
}

fn input_extents(input_shape: &Shape) -> NanoResult<(u16, u16, u16)> {
    input_shape.expect_d3()?;
    Ok((
        to_u16(input_shape.height())?,
        to_u16(input_shape.width())?,
        to_u16(input_shape.channels())?,
    ))
}

impl Layer for Conv2dBnLayer<'_> {
    fn name(&self) -> &'static str { "Conv2dBn" }

    fn output_shape(&self, input_shape: &Shape) -> NanoResult<Shape> {
        let (row, col, channel) = input_extents(input_shape)?;
        let (out_row, out_col, out_chan) = math::conv_output_extents(row, col, channel, &self.config)?;
        Ok(Shape::d3(out_chan as usize, out_row as usize, out_col as usize))
    }

    fn scratch_len(&self, input_shape: &Shape) -> usize {
        if self.config.pad == 0 || input_shape.ndim != 3 {
            return 0;
        }
        let pad = 2 * self.config.pad as usize;
        input_shape.channels() * (input_shape.height() + pad) * (input_shape.width() + pad)
    }

    fn forward<'a>(
        &self,
        input: &[f64],
        input_shape: &Shape,
        arena: &mut Arena<'a>,
    ) -> NanoResult<(&'a mut [f64], Shape)> {
        let out_shape = self.output_shape(input_shape)?;
        let (row, col, channel) = input_extents(input_shape)?;
        let view = Conv2dData::new(row, col, channel, input);

        let output = arena.alloc(out_shape.total())?;
        let mut out_view = Conv2dData::new(0, 0, 0, &mut *output);
        math::conv2d_bn_no_bias_in(&view, &self.config, &mut out_view, arena)?;
        Ok((output, out_shape))
    }
}
