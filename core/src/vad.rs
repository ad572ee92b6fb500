//! Voice-activity detection front end.
//!
//! The detector slides a 30 ms window over an 8 kHz signal in 15 ms steps
//! and classifies each window with a one-layer CNN:
//!
//! ```text
//! frame[1×1×240] → Conv(1×k, stride s) + BN → LeakyReLU → Flatten → Linear(→2) → argmax
//! ```
//!
//! Class 1 is voice, class 0 is silence. Consecutive voiced frames are then
//! merged into `[start, end]` sample ranges.

use crate::arena::Arena;
use crate::error::{NanoResult, ShapeViolation};
use crate::layers::{Conv2dBnLayer, FlattenLayer, Layer, LeakyReLULayer, LinearLayer, Shape};
use crate::model::SequentialModel;
use crate::tensor::{Conv2dConfig, LinearParam};

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

pub const SAMPLE_RATE_HZ: u32 = 8000;
/// 30 ms at 8 kHz.
pub const FRAME_LEN: usize = 240;
/// 15 ms at 8 kHz.
pub const FRAME_STEP: usize = 120;

pub const SILENCE: usize = 0;
pub const VOICE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadConfig {
    pub sample_rate: u32,
    pub frame_len: usize,
    pub frame_step: usize,
    pub neg_slope: f64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE_HZ,
            frame_len: FRAME_LEN,
            frame_step: FRAME_STEP,
            neg_slope: crate::layers::activations::DEFAULT_NEG_SLOPE,
        }
    }
}

impl VadConfig {
    /// The model is trained on 8 kHz audio only.
    pub fn validate(&self) -> NanoResult<()> {
        if self.sample_rate != SAMPLE_RATE_HZ {
            return Err(ShapeViolation::SampleRate {
                expected: SAMPLE_RATE_HZ,
                actual: self.sample_rate,
            }
            .into());
        }
        if self.frame_len == 0 || self.frame_step == 0 {
            return Err(ShapeViolation::EmptyInput.into());
        }
        Ok(())
    }
}

/// Frame classifier: fused conv + BN, leaky rectifier, dense head.
pub struct VadModel<'p> {
    conv: Conv2dBnLayer<'p>,
    act: LeakyReLULayer,
    flatten: FlattenLayer,
    head: LinearLayer<'p>,
    frame_len: usize,
}

impl<'p> VadModel<'p> {
    /// Validates the whole chain against a `1×1×frame_len` input.
    pub fn new(
        conv: Conv2dConfig<'p>,
        head: LinearParam<'p>,
        config: &VadConfig,
    ) -> NanoResult<Self> {
        config.validate()?;
        let model = Self {
            conv: Conv2dBnLayer::new(conv),
            act: LeakyReLULayer::new(config.neg_slope),
            flatten: FlattenLayer,
            head: LinearLayer::new(head)?,
            frame_len: config.frame_len,
        };
        let layers = model.layers();
        SequentialModel::new(&layers, model.input_shape())?;
        Ok(model)
    }

    pub fn input_shape(&self) -> Shape {
        Shape::d3(1, 1, self.frame_len)
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn layers(&self) -> [&dyn Layer; 4] {
        [&self.conv, &self.act, &self.flatten, &self.head]
    }

    /// Arena scalars one `classify` call needs.
    pub fn arena_size(&self) -> NanoResult<usize> {
        let layers = self.layers();
        SequentialModel::new(&layers, self.input_shape())?.estimate_arena_size()
    }

    /// Logits of one frame, arena-allocated.
    pub fn logits<'a>(&self, frame: &[f64], arena: &mut Arena<'a>) -> NanoResult<&'a mut [f64]> {
        if frame.len() != self.frame_len {
            return Err(ShapeViolation::DimensionMismatch {
                expected: self.frame_len,
                actual: frame.len(),
            }
            .into());
        }
        let layers = self.layers();
        let model = SequentialModel::new(&layers, self.input_shape())?;
        let (logits, _shape) = model.forward(frame, arena)?;
        Ok(logits)
    }

    /// Class of one frame: [`VOICE`] or [`SILENCE`].
    pub fn classify(&self, frame: &[f64], arena: &mut Arena<'_>) -> NanoResult<usize> {
        let logits = self.logits(frame, arena)?;
        let class = crate::math::argmax(logits)?;
        log::debug!("frame classified as {} (logits {:?})", class, logits);
        Ok(class)
    }
}

/// Full windows of `config.frame_len` samples every `config.frame_step`
/// samples, as `(start, frame)`. A trailing partial window is dropped.
pub fn frames<'s>(signal: &'s [f64], config: &VadConfig) -> impl Iterator<Item = (usize, &'s [f64])> + 's {
    let len = config.frame_len;
    let step = config.frame_step.max(1);
    (0..signal.len())
        .step_by(step)
        .take_while(move |&start| len > 0 && start + len <= signal.len())
        .map(move |start| (start, &signal[start..start + len]))
}

/// Inclusive sample range of one voiced stretch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceSegment {
    pub start: usize,
    pub end: usize,
}

/// Merge per-frame classes into voiced sample ranges.
///
/// A rising edge (class steps up by one) opens a segment at the next
/// frame's start; a falling edge closes it there, opening at sample 0 when
/// the stream began voiced. A second rising edge closes an open segment. A
/// segment still open after the last frame ends at `raw_len − 1`.
#[cfg(feature = "alloc")]
pub fn voice_segments(classes: &[usize], starts: &[usize], raw_len: usize) -> NanoResult<Vec<VoiceSegment>> {
    if classes.len() != starts.len() {
        return Err(ShapeViolation::DimensionMismatch {
            expected: classes.len(),
            actual: starts.len(),
        }
        .into());
    }

    let mut segments = Vec::new();
    let mut open: Option<usize> = None;
    for (i, pair) in classes.windows(2).enumerate() {
        let edge = starts[i + 1];
        let step = pair[1] as i64 - pair[0] as i64;
        if step == 1 {
            match open.take() {
                Some(start) => segments.push(VoiceSegment { start, end: edge }),
                None => open = Some(edge),
            }
        } else if step == -1 {
            let start = open.take().unwrap_or(0);
            segments.push(VoiceSegment { start, end: edge });
        }
    }
    if let Some(start) = open {
        segments.push(VoiceSegment { start, end: raw_len.saturating_sub(1) });
    }
    Ok(segments)
}

/// Frame, classify and segment a whole signal.
///
/// `config.frame_len` must be the frame length `model` was built for;
/// anything else is rejected before the signal is read.
#[cfg(feature = "alloc")]
pub fn detect(
    signal: &[f64],
    model: &VadModel<'_>,
    config: &VadConfig,
    arena: &mut Arena<'_>,
) -> NanoResult<Vec<VoiceSegment>> {
    config.validate()?;
    if config.frame_len != model.frame_len() {
        return Err(ShapeViolation::DimensionMismatch {
            expected: model.frame_len(),
            actual: config.frame_len,
        }
        .into());
    }
    let mut classes = Vec::new();
    let mut starts = Vec::new();
    for (start, frame) in frames(signal, config) {
        // Each frame reuses the whole arena.
        let mut sub = arena.scoped();
        classes.push(model.classify(frame, &mut sub)?);
        starts.push(start);
    }
    log::debug!("classified {} frames", classes.len());
    voice_segments(&classes, &starts, signal.len())
}
