//! # nano-vad-core: Voice-Activity-Detection Kernels
//!
//! A `no_std` Rust library of double-precision inference kernels for a tiny
//! voice-activity-detection CNN running on RISC-V microcontrollers.
//!
//! ## Architecture
//!
//! - **Kernels**: fused Conv2D + BatchNorm, leaky rectifier, dense layer
//! - **Caller-owned memory**: tensors and parameters are borrowed views
//! - **Scoped scratch**: padding buffers come from an [`Arena`] or the heap
//!   and are released on every exit path
//! - **Layer pipeline**: caller-ordered [`SequentialModel`] and the
//!   [`VadModel`](vad::VadModel) front end
//!
//! ## Usage
//!
//! ```ignore
//! use nano_vad_core::*;
//!
//! let conv = Conv2dConfig::new(2, 0, filter, bn);
//! let head = LinearParam::new(240, 2, HEAD_W, HEAD_B);
//! let model = VadModel::new(conv, head, &VadConfig::default())?;
//!
//! let mut scratch = [0.0f64; 1024];
//! let mut arena = Arena::new(&mut scratch);
//! let class = model.classify(&frame, &mut arena)?;
//! ```

#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod arena;
pub mod error;
#[cfg(feature = "alloc")]
pub mod ffi;
pub mod layers;
pub mod math;
pub mod model;
pub mod serial;
pub mod tensor;
pub mod vad;

// Re-export primary types
pub use arena::{Arena, Scratch};
#[cfg(feature = "alloc")]
pub use arena::Heap;
pub use error::{NanoError, NanoResult, ShapeViolation, Status};
pub use layers::{Conv2dBnLayer, FlattenLayer, Layer, LeakyReLULayer, LinearLayer, Shape};
#[cfg(feature = "alloc")]
pub use math::conv2d_bn_no_bias;
pub use math::{
    argmax, checked_out_len, conv2d_bn_no_bias_in, conv_output_dims, conv_output_extents,
    leaky_relu, leaky_relu_in_place, linear_layer, out_len, pad_feature_map, padded_len,
    BN_EPS,
};
pub use model::SequentialModel;
pub use serial::{CrlfWriter, SerialPort};
pub use tensor::{BatchNorm2d, ChwLayout, Conv2dConfig, Conv2dData, Conv2dFilter, LinearParam};
pub use vad::{frames, VadConfig, VadModel, VoiceSegment};
#[cfg(feature = "alloc")]
pub use vad::{detect, voice_segments};
