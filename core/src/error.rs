//! Error types for the nano-vad-core library.
//!
//! Every kernel returns `NanoResult<T>`. `Ok` is the `NORMAL` outcome; the
//! three failure kinds below are the whole taxonomy. `Status` flattens them
//! to the integer codes handed across the C ABI.

use thiserror::Error;

/// Detail attached to a [`NanoError::DataException`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShapeViolation {
    #[error("stride must be at least 1")]
    ZeroStride,

    #[error("filter has {filter} channels but the input has {input}")]
    ChannelMismatch { filter: u16, input: u16 },

    #[error("batch-norm size {norm} does not match filter count {filters}")]
    NormSizeMismatch { norm: u16, filters: u16 },

    #[error("kernel height {kernel} exceeds padded input height {padded}")]
    KernelTooTall { kernel: usize, padded: usize },

    #[error("kernel width {kernel} exceeds padded input width {padded}")]
    KernelTooWide { kernel: usize, padded: usize },

    #[error("extent {extent} exceeds the addressable range")]
    ExtentOverflow { extent: usize },

    #[error("buffer holds {available} scalars, {required} required")]
    BufferTooSmall { required: usize, available: usize },

    #[error("expected dimension {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("input is empty")]
    EmptyInput,

    #[error("sample rate must be {expected} Hz, got {actual} Hz")]
    SampleRate { expected: u32, actual: u32 },
}

/// All possible failures of the nano-vad-core library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NanoError {
    /// A required buffer, parameter block or sub-field is missing.
    #[error("required pointer is null")]
    PointerNull,

    /// A shape invariant does not hold.
    #[error("data exception: {0}")]
    DataException(ShapeViolation),

    /// Scratch memory could not be acquired.
    #[error("allocation of {requested} scalars failed ({remaining} available)")]
    MallocFail { requested: usize, remaining: usize },
}

impl From<ShapeViolation> for NanoError {
    fn from(violation: ShapeViolation) -> Self {
        Self::DataException(violation)
    }
}

pub type NanoResult<T> = Result<T, NanoError>;

/// Integer result codes of the C-compatible surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Normal = 0,
    PointerNull = -1,
    DataException = -2,
    MallocFail = -3,
}

impl Status {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_raw(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            -1 => Some(Self::PointerNull),
            -2 => Some(Self::DataException),
            -3 => Some(Self::MallocFail),
            _ => None,
        }
    }
}

impl From<NanoError> for Status {
    fn from(err: NanoError) -> Self {
        match err {
            NanoError::PointerNull => Self::PointerNull,
            NanoError::DataException(_) => Self::DataException,
            NanoError::MallocFail { .. } => Self::MallocFail,
        }
    }
}

impl<T> From<NanoResult<T>> for Status {
    fn from(result: NanoResult<T>) -> Self {
        match result {
            Ok(_) => Self::Normal,
            Err(err) => err.into(),
        }
    }
}
