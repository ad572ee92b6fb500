//! Caller-owned tensor views and parameter blocks.
//!
//! Nothing here allocates. A feature map is three 16-bit extents plus a
//! contiguous buffer of `f64` in channel-major order; the filter bank adds a
//! leading filter axis. Storage is generic so the same type describes a
//! read-only input (`&[f64]`), a writable output (`&mut [f64]`) or an owned
//! buffer (`Vec<f64>`).

use crate::error::{NanoResult, ShapeViolation};

/// Channel-major `(c, r, k)` addressing for a `channel × row × col` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChwLayout {
    pub channel: usize,
    pub row: usize,
    pub col: usize,
}

impl ChwLayout {
    pub const fn new(channel: usize, row: usize, col: usize) -> Self {
        Self { channel, row, col }
    }

    /// Scalars in one channel plane.
    #[inline(always)]
    pub const fn plane(&self) -> usize {
        self.row * self.col
    }

    /// Scalar count, saturating at `usize::MAX`. Validation paths use
    /// [`checked_len`](Self::checked_len).
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.channel.saturating_mul(self.row).saturating_mul(self.col)
    }

    /// Scalar count; `ExtentOverflow` when it does not fit in `usize`.
    #[inline]
    pub fn checked_len(&self) -> NanoResult<usize> {
        checked_volume(&[self.channel, self.row, self.col])
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear offset of `(c, r, k)`: `c·row·col + r·col + k`.
    #[inline(always)]
    pub const fn offset(&self, c: usize, r: usize, k: usize) -> usize {
        c * self.row * self.col + r * self.col + k
    }
}

/// Three-dimensional feature map (`Conv2dData`).
#[derive(Debug, Clone, PartialEq)]
pub struct Conv2dData<D> {
    pub row: u16,
    pub col: u16,
    pub channel: u16,
    pub data: D,
}

impl<D> Conv2dData<D> {
    pub const fn new(row: u16, col: u16, channel: u16, data: D) -> Self {
        Self { row, col, channel, data }
    }

    pub const fn layout(&self) -> ChwLayout {
        ChwLayout::new(self.channel as usize, self.row as usize, self.col as usize)
    }

    /// `row·col·channel`, the number of scalars the shape fields describe.
    pub const fn len(&self) -> usize {
        self.layout().len()
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<D: AsRef<[f64]>> Conv2dData<D> {
    #[inline(always)]
    pub fn as_slice(&self) -> &[f64] {
        self.data.as_ref()
    }

    /// Value at `(c, r, k)`, `None` outside the described shape.
    pub fn get(&self, c: usize, r: usize, k: usize) -> Option<f64> {
        let layout = self.layout();
        if c >= layout.channel || r >= layout.row || k >= layout.col {
            return None;
        }
        self.as_slice().get(layout.offset(c, r, k)).copied()
    }

    /// Fails unless the buffer covers the described shape.
    pub fn check_len(&self) -> NanoResult<()> {
        ensure_len(self.layout().checked_len()?, self.as_slice().len())
    }
}

impl<D: AsMut<[f64]>> Conv2dData<D> {
    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.data.as_mut()
    }
}

/// Four-dimensional filter bank (`Conv2dFilter`), filter-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conv2dFilter<'p> {
    pub row: u16,
    pub col: u16,
    pub channel: u16,
    pub filter_num: u16,
    pub data: &'p [f64],
}

impl<'p> Conv2dFilter<'p> {
    pub const fn new(row: u16, col: u16, channel: u16, filter_num: u16, data: &'p [f64]) -> Self {
        Self { row, col, channel, filter_num, data }
    }

    /// Layout of a single filter.
    pub const fn filter_layout(&self) -> ChwLayout {
        ChwLayout::new(self.channel as usize, self.row as usize, self.col as usize)
    }

    /// Scalar count of the whole bank, saturating at `usize::MAX`.
    pub const fn len(&self) -> usize {
        (self.filter_num as usize).saturating_mul(self.filter_layout().len())
    }

    /// Scalar count of the whole bank; `ExtentOverflow` on overflow.
    pub fn checked_len(&self) -> NanoResult<usize> {
        checked_volume(&[
            self.filter_num as usize,
            self.channel as usize,
            self.row as usize,
            self.col as usize,
        ])
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear offset of `(f, c, r, k)`.
    #[inline(always)]
    pub const fn offset(&self, f: usize, c: usize, r: usize, k: usize) -> usize {
        let layout = self.filter_layout();
        f * layout.len() + layout.offset(c, r, k)
    }
}

/// Inference-time batch-norm statistics (`BatchNorm2d`), indexed by filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchNorm2d<'p> {
    pub size: u16,
    pub mean: &'p [f64],
    pub var: &'p [f64],
    pub gamma: &'p [f64],
    pub beta: &'p [f64],
}

impl<'p> BatchNorm2d<'p> {
    pub const fn new(
        size: u16,
        mean: &'p [f64],
        var: &'p [f64],
        gamma: &'p [f64],
        beta: &'p [f64],
    ) -> Self {
        Self { size, mean, var, gamma, beta }
    }

    /// Smallest of the four vector lengths.
    pub fn shortest(&self) -> usize {
        self.mean
            .len()
            .min(self.var.len())
            .min(self.gamma.len())
            .min(self.beta.len())
    }

    /// `γ·(x − μ)/√(σ² + ε) + β` for filter `f`, evaluated left to right.
    #[inline(always)]
    pub fn normalize(&self, f: usize, x: f64, eps: f64) -> f64 {
        self.gamma[f] * (x - self.mean[f]) / libm::sqrt(self.var[f] + eps) + self.beta[f]
    }
}

/// Stride, padding and parameter blocks of one fused conv + BN layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conv2dConfig<'p> {
    pub stride: u16,
    pub pad: u16,
    pub filter: Conv2dFilter<'p>,
    pub bn: BatchNorm2d<'p>,
}

impl<'p> Conv2dConfig<'p> {
    pub const fn new(stride: u16, pad: u16, filter: Conv2dFilter<'p>, bn: BatchNorm2d<'p>) -> Self {
        Self { stride, pad, filter, bn }
    }
}

/// Dense layer parameters (`LinearParam`); `weight` is `fea_size × inp_size`
/// row-major with output features as rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearParam<'p> {
    pub inp_size: u16,
    pub fea_size: u16,
    pub weight: &'p [f64],
    pub bias: &'p [f64],
}

impl<'p> LinearParam<'p> {
    pub const fn new(inp_size: u16, fea_size: u16, weight: &'p [f64], bias: &'p [f64]) -> Self {
        Self { inp_size, fea_size, weight, bias }
    }
}

#[inline]
pub(crate) fn ensure_len(required: usize, available: usize) -> NanoResult<()> {
    if available < required {
        return Err(ShapeViolation::BufferTooSmall { required, available }.into());
    }
    Ok(())
}

/// Product of `dims`; `ExtentOverflow` (carrying the saturated product)
/// when it does not fit in `usize`. 16-bit extents overflow a 32-bit
/// `usize` after two factors.
pub(crate) fn checked_volume(dims: &[usize]) -> NanoResult<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| {
            let extent = dims.iter().fold(1usize, |acc, &d| acc.saturating_mul(d));
            ShapeViolation::ExtentOverflow { extent }.into()
        })
}

/// Narrow a `usize` extent to the 16-bit shape fields.
#[inline]
pub(crate) fn to_u16(extent: usize) -> NanoResult<u16> {
    u16::try_from(extent).map_err(|_| ShapeViolation::ExtentOverflow { extent }.into())
}
