//! C ABI for the kernels.
//!
//! The structs mirror the board's C header field for field; every entry
//! point returns a [`Status`] code. Null handles, at any depth of the
//! parameter graph, are reported as `POINTER_NULL` before anything is read.

use core::slice;

use crate::error::{NanoError, NanoResult, Status};
use crate::math;
use crate::tensor::{self, checked_volume};

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Conv2dData {
    pub row: u16,
    pub col: u16,
    pub channel: u16,
    pub data: *mut f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Conv2dFilter {
    pub row: u16,
    pub col: u16,
    pub channel: u16,
    pub filter_num: u16,
    pub data: *mut f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BatchNorm2d {
    pub size: u16,
    pub mean: *mut f64,
    pub var: *mut f64,
    pub gamma: *mut f64,
    pub beta: *mut f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Conv2dConfig {
    pub stride: u16,
    pub pad: u16,
    pub filter: *mut Conv2dFilter,
    pub bn: *mut BatchNorm2d,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LinearParam {
    pub inp_size: u16,
    pub fea_size: u16,
    pub weight: *mut f64,
    pub bias: *mut f64,
}

fn non_null<T>(ptr: *const T) -> NanoResult<*const T> {
    if ptr.is_null() {
        return Err(NanoError::PointerNull);
    }
    Ok(ptr)
}

/// SAFETY: `ptr` is non-null and valid for `len` reads for `'p`.
unsafe fn view<'p>(ptr: *const f64, len: usize) -> &'p [f64] {
    if len == 0 {
        return &[];
    }
    slice::from_raw_parts(ptr, len)
}

unsafe fn conv_inner(
    input_feat: *const Conv2dData,
    param: *const Conv2dConfig,
    output_feat: *mut Conv2dData,
) -> NanoResult<()> {
    let input = &*non_null(input_feat)?;
    let param = &*non_null(param)?;
    let output = &mut *(non_null(output_feat)? as *mut Conv2dData);
    let bn = &*non_null(param.bn)?;
    let filter = &*non_null(param.filter)?;
    for ptr in [input.data, output.data, filter.data, bn.mean, bn.var, bn.gamma, bn.beta] {
        non_null(ptr)?;
    }

    let size = bn.size as usize;
    let filter_len = checked_volume(&[
        filter.filter_num as usize,
        filter.channel as usize,
        filter.row as usize,
        filter.col as usize,
    ])?;
    let config = tensor::Conv2dConfig::new(
        param.stride,
        param.pad,
        tensor::Conv2dFilter::new(
            filter.row,
            filter.col,
            filter.channel,
            filter.filter_num,
            view(filter.data, filter_len),
        ),
        tensor::BatchNorm2d::new(
            bn.size,
            view(bn.mean, size),
            view(bn.var, size),
            view(bn.gamma, size),
            view(bn.beta, size),
        ),
    );
    let in_len = checked_volume(&[input.row as usize, input.col as usize, input.channel as usize])?;
    let in_view = tensor::Conv2dData::new(input.row, input.col, input.channel, view(input.data, in_len));

    let (out_row, out_col, out_chan) = math::conv_output_dims(&in_view, &config)?;
    let out_len = checked_volume(&[out_row as usize, out_col as usize, out_chan as usize])?;
    let out_data: &mut [f64] = if out_len == 0 {
        &mut []
    } else {
        slice::from_raw_parts_mut(output.data, out_len)
    };
    let mut out_view = tensor::Conv2dData::new(output.row, output.col, output.channel, out_data);

    math::conv2d_bn_no_bias(&in_view, &config, &mut out_view)?;
    output.row = out_view.row;
    output.col = out_view.col;
    output.channel = out_view.channel;
    Ok(())
}

/// Fused conv + batch norm.
///
/// # Safety
/// Every non-null pointer must reference a live object or an array at least
/// as long as its shape fields describe; the output array must hold
/// `out_row·out_col·out_chan` scalars and must not overlap any input.
#[no_mangle]
pub unsafe extern "C" fn conv2d_bn_no_bias(
    input_feat: *const Conv2dData,
    param: *const Conv2dConfig,
    output_feat: *mut Conv2dData,
) -> i32 {
    Status::from(conv_inner(input_feat, param, output_feat)).code()
}

/// Leaky rectifier over `inp_size` scalars. `inp` may equal `out`.
///
/// # Safety
/// `inp` and `out` must be valid for `inp_size` scalars and either be the
/// same pointer or not overlap.
#[no_mangle]
pub unsafe extern "C" fn leaky_relu(neg_slope: f64, inp: *const f64, inp_size: u16, out: *mut f64) -> i32 {
    if inp.is_null() || out.is_null() {
        return Status::PointerNull.code();
    }
    let n = inp_size as usize;
    if n == 0 {
        return Status::Normal.code();
    }
    if core::ptr::eq(inp, out) {
        math::leaky_relu_in_place(neg_slope, slice::from_raw_parts_mut(out, n));
        return Status::Normal.code();
    }
    let result = math::leaky_relu(neg_slope, view(inp, n), inp_size, slice::from_raw_parts_mut(out, n));
    Status::from(result).code()
}

/// Dense layer.
///
/// # Safety
/// `inp` must hold `inp_size` scalars, `out` `fea_size`, and the parameter
/// arrays their described sizes; `out` must not overlap any input.
#[no_mangle]
pub unsafe extern "C" fn linear_layer(inp: *const f64, linear_config: *const LinearParam, out: *mut f64) -> i32 {
    let result = (|| -> NanoResult<()> {
        let param = &*non_null(linear_config)?;
        for ptr in [inp, param.weight as *const f64, param.bias as *const f64, out as *const f64] {
            non_null(ptr)?;
        }
        let inp_size = param.inp_size as usize;
        let fea_size = param.fea_size as usize;
        let rust_param = tensor::LinearParam::new(
            param.inp_size,
            param.fea_size,
            view(param.weight, checked_volume(&[fea_size, inp_size])?),
            view(param.bias, fea_size),
        );
        let out: &mut [f64] = if fea_size == 0 { &mut [] } else { slice::from_raw_parts_mut(out, fea_size) };
        math::linear_layer(view(inp, inp_size), &rust_param, out)
    })();
    Status::from(result).code()
}

/// Output extent of one conv axis; 0 when undefined or above `u16::MAX`.
#[no_mangle]
pub extern "C" fn cal_conv_out_len(raw_len: u16, pad_len: u16, filter_len: u16, stride: u16) -> u16 {
    math::out_len(raw_len, pad_len, filter_len, stride)
}
