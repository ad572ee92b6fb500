//! Double-precision kernels for the VAD front end.
//!
//! Every kernel reads caller-owned buffers and writes a caller-owned output.
//! Validation happens before the first write, so a failed call leaves the
//! output untouched. Loop nests keep the board firmware's summation order;
//! do not reorder them, results are compared bit for bit.

use crate::arena::Scratch;
use crate::error::{NanoError, NanoResult, ShapeViolation};
use crate::tensor::{checked_volume, ensure_len, to_u16, ChwLayout, Conv2dConfig, Conv2dData, LinearParam};

#[cfg(feature = "alloc")]
use crate::arena::Heap;

/// Batch-norm variance epsilon.
pub const BN_EPS: f64 = 1e-5;

// =============================================================================
// Shape Calculus
// =============================================================================

/// Output extent of one spatial axis: `(raw + 2·pad − kernel) / stride + 1`.
///
/// `None` when `stride == 0`, the kernel does not fit the padded axis, or
/// the extent exceeds `u16::MAX`.
#[inline]
pub const fn checked_out_len(raw: u16, pad: u16, kernel: u16, stride: u16) -> Option<u16> {
    let span = raw as u32 + 2 * pad as u32;
    if stride == 0 || kernel as u32 > span {
        return None;
    }
    let len = (span - kernel as u32) / stride as u32 + 1;
    if len > u16::MAX as u32 {
        return None;
    }
    Some(len as u16)
}

/// Output extent of one spatial axis. Callers validate first; undefined or
/// unrepresentable extents yield 0.
#[inline]
pub const fn out_len(raw: u16, pad: u16, kernel: u16, stride: u16) -> u16 {
    match checked_out_len(raw, pad, kernel, stride) {
        Some(len) => len,
        None => 0,
    }
}

/// Check the shape invariants of a conv call against an input of
/// `row × col × channel` and return `(out_row, out_col, out_chan)`.
///
/// A single-row input always yields one output row (1×N temporal
/// convolution), whatever the kernel height, pad and stride.
pub fn conv_output_extents(
    row: u16,
    col: u16,
    channel: u16,
    config: &Conv2dConfig<'_>,
) -> NanoResult<(u16, u16, u16)> {
    let filter = &config.filter;
    let bn = &config.bn;
    let pad = config.pad as usize;

    if config.stride < 1 {
        return Err(ShapeViolation::ZeroStride.into());
    }
    if channel != filter.channel {
        return Err(ShapeViolation::ChannelMismatch {
            filter: filter.channel,
            input: channel,
        }
        .into());
    }
    if filter.filter_num != bn.size {
        return Err(ShapeViolation::NormSizeMismatch {
            norm: bn.size,
            filters: filter.filter_num,
        }
        .into());
    }

    let padded_row = row as usize + 2 * pad;
    let padded_col = col as usize + 2 * pad;
    if filter.row as usize > padded_row {
        return Err(ShapeViolation::KernelTooTall {
            kernel: filter.row as usize,
            padded: padded_row,
        }
        .into());
    }
    if filter.col as usize > padded_col {
        return Err(ShapeViolation::KernelTooWide {
            kernel: filter.col as usize,
            padded: padded_col,
        }
        .into());
    }
    to_u16(padded_row)?;
    to_u16(padded_col)?;

    let out_row = if row == 1 {
        1
    } else {
        out_len(row, config.pad, filter.row, config.stride)
    };
    let out_col = out_len(col, config.pad, filter.col, config.stride);
    Ok((out_row, out_col, filter.filter_num))
}

/// Validate a conv call, buffers included, and return
/// `(out_row, out_col, out_chan)` without touching any buffer.
pub fn conv_output_dims<D: AsRef<[f64]>>(
    input: &Conv2dData<D>,
    config: &Conv2dConfig<'_>,
) -> NanoResult<(u16, u16, u16)> {
    let dims = conv_output_extents(input.row, input.col, input.channel, config)?;
    input.check_len()?;
    ensure_len(config.filter.checked_len()?, config.filter.data.len())?;
    ensure_len(config.bn.size as usize, config.bn.shortest())?;
    Ok(dims)
}

// =============================================================================
// Padding
// =============================================================================

/// Scalars needed for `input` padded by `pad` on every spatial side.
#[inline]
pub fn padded_len<D>(input: &Conv2dData<D>, pad: u16) -> usize {
    padded_layout(input, pad).len()
}

#[inline]
fn padded_layout<D>(input: &Conv2dData<D>, pad: u16) -> ChwLayout {
    let pad = pad as usize;
    ChwLayout::new(
        input.channel as usize,
        input.row as usize + 2 * pad,
        input.col as usize + 2 * pad,
    )
}

/// Fill `padded` with `fill` and copy `input` into its interior.
///
/// `padded` is laid out as `channel × (row + 2·pad) × (col + 2·pad)`.
pub fn pad_feature_map<D: AsRef<[f64]>>(
    input: &Conv2dData<D>,
    pad: u16,
    fill: f64,
    padded: &mut [f64],
) -> NanoResult<()> {
    input.check_len()?;
    let src = input.layout();
    let dst = padded_layout(input, pad);
    let dst_len = dst.checked_len()?;
    ensure_len(dst_len, padded.len())?;

    let pad = pad as usize;
    let raw = input.as_slice();
    padded[..dst_len].fill(fill);

    for c in 0..src.channel {
        for r in 0..src.row {
            let from = src.offset(c, r, 0);
            let to = dst.offset(c, r + pad, pad);
            padded[to..to + src.col].copy_from_slice(&raw[from..from + src.col]);
        }
    }
    Ok(())
}

// =============================================================================
// Fused Conv2D + BatchNorm
// =============================================================================

/// Fused 2-D correlation + per-filter batch normalization, no bias.
///
/// When `pad > 0` the padded copy of the input lives in a buffer taken from
/// `scratch` for the duration of the call. With `pad == 0` the input is read
/// in place and `scratch` is not touched. On success the output shape fields
/// are overwritten with the computed extents.
pub fn conv2d_bn_no_bias_in<I, O, S>(
    input: &Conv2dData<I>,
    config: &Conv2dConfig<'_>,
    output: &mut Conv2dData<O>,
    scratch: &mut S,
) -> NanoResult<()>
where
    I: AsRef<[f64]>,
    O: AsMut<[f64]>,
    S: Scratch,
{
    let (out_row, out_col, out_chan) = conv_output_dims(input, config)?;
    let out_layout = ChwLayout::new(out_chan as usize, out_row as usize, out_col as usize);
    let out_total = out_layout.checked_len()?;
    let available = output.as_mut_slice().len();
    ensure_len(out_total, available)?;

    log::trace!(
        "conv2d_bn: in={}x{}x{} filter={}x{}x{}x{} stride={} pad={} -> out={}x{}x{}",
        input.channel, input.row, input.col,
        config.filter.filter_num, config.filter.channel, config.filter.row, config.filter.col,
        config.stride, config.pad,
        out_chan, out_row, out_col,
    );

    let out = &mut output.as_mut_slice()[..out_total];
    if config.pad == 0 {
        correlate_bn(input.as_slice(), input.layout(), config, out_layout, out);
    } else {
        let feat_layout = padded_layout(input, config.pad);
        scratch.with_zeroed(feat_layout.checked_len()?, |padded| {
            pad_feature_map(input, config.pad, 0.0, padded)?;
            correlate_bn(padded, feat_layout, config, out_layout, out);
            Ok::<(), NanoError>(())
        })??;
    }

    output.row = out_row;
    output.col = out_col;
    output.channel = out_chan;
    Ok(())
}

/// [`conv2d_bn_no_bias_in`] with heap scratch.
#[cfg(feature = "alloc")]
pub fn conv2d_bn_no_bias<I, O>(
    input: &Conv2dData<I>,
    config: &Conv2dConfig<'_>,
    output: &mut Conv2dData<O>,
) -> NanoResult<()>
where
    I: AsRef<[f64]>,
    O: AsMut<[f64]>,
{
    conv2d_bn_no_bias_in(input, config, output, &mut Heap)
}

/// Loop nest `f → j → k → c → jj → kk`. `feat` is the (possibly padded)
/// input laid out as `feat_layout`.
fn correlate_bn(
    feat: &[f64],
    feat_layout: ChwLayout,
    config: &Conv2dConfig<'_>,
    out_layout: ChwLayout,
    out: &mut [f64],
) {
    let filter = &config.filter;
    let stride = config.stride as usize;
    let (f_chan, f_row, f_col) = (filter.channel as usize, filter.row as usize, filter.col as usize);

    for f in 0..out_layout.channel {
        for j in 0..out_layout.row {
            for k in 0..out_layout.col {
                let row_start = j * stride;
                let col_start = k * stride;
                let mut acc = 0.0f64;
                for c in 0..f_chan {
                    for jj in 0..f_row {
                        for kk in 0..f_col {
                            let w = filter.data[filter.offset(f, c, jj, kk)];
                            let x = feat[feat_layout.offset(c, row_start + jj, col_start + kk)];
                            acc += w * x;
                        }
                    }
                }
                out[out_layout.offset(f, j, k)] = config.bn.normalize(f, acc, BN_EPS);
            }
        }
    }
}

// =============================================================================
// Activation Functions
// =============================================================================

/// Leaky rectifier over the first `inp_size` elements.
///
/// `out[i] = inp[i]` for `inp[i] >= 0`, else `neg_slope · inp[i]`.
pub fn leaky_relu(neg_slope: f64, inp: &[f64], inp_size: u16, out: &mut [f64]) -> NanoResult<()> {
    let n = inp_size as usize;
    ensure_len(n, inp.len())?;
    ensure_len(n, out.len())?;

    for (o, &x) in out[..n].iter_mut().zip(&inp[..n]) {
        *o = leaky(neg_slope, x);
    }
    Ok(())
}

/// Leaky rectifier applied in place.
pub fn leaky_relu_in_place(neg_slope: f64, data: &mut [f64]) {
    for val in data.iter_mut() {
        *val = leaky(neg_slope, *val);
    }
}

#[inline(always)]
fn leaky(neg_slope: f64, x: f64) -> f64 {
    if x < 0.0 {
        neg_slope * x
    } else {
        x
    }
}

// =============================================================================
// Dense Layer
// =============================================================================

/// `out[f] = bias[f] + Σ_m weight[f·inp_size + m] · inp[m]`, accumulated
/// in `m` order starting from the bias.
pub fn linear_layer(inp: &[f64], param: &LinearParam<'_>, out: &mut [f64]) -> NanoResult<()> {
    let inp_size = param.inp_size as usize;
    let fea_size = param.fea_size as usize;
    ensure_len(inp_size, inp.len())?;
    ensure_len(checked_volume(&[fea_size, inp_size])?, param.weight.len())?;
    ensure_len(fea_size, param.bias.len())?;
    ensure_len(fea_size, out.len())?;

    log::trace!("linear: {} -> {}", inp_size, fea_size);

    for f in 0..fea_size {
        let row = &param.weight[f * inp_size..(f + 1) * inp_size];
        let mut acc = param.bias[f];
        for (x, w) in inp[..inp_size].iter().zip(row) {
            acc += x * w;
        }
        out[f] = acc;
    }
    Ok(())
}

// =============================================================================
// Decision
// =============================================================================

/// Index of the first maximum.
pub fn argmax(data: &[f64]) -> NanoResult<usize> {
    if data.is_empty() {
        return Err(ShapeViolation::EmptyInput.into());
    }

    let mut max_idx = 0;
    let mut max_val = data[0];
    for (i, &val) in data.iter().enumerate().skip(1) {
        if val > max_val {
            max_val = val;
            max_idx = i;
        }
    }
    Ok(max_idx)
}
