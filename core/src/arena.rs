//! Bump arena and scoped scratch memory for the kernels.
//!
//! The caller owns a `[f64; N]` buffer and passes `&mut [f64]` into the
//! model. `Arena::alloc` splits persistent blocks (layer outputs) off the
//! front; `Scratch::with_zeroed` lends the unused tail for the duration of
//! one closure. The lent region is reclaimed when the borrow ends, so a
//! scratch buffer is released on every exit path, errors included.

use crate::error::{NanoError, NanoResult};

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

/// Scoped acquisition of a zero-filled `f64` buffer.
pub trait Scratch {
    /// Run `f` on a zeroed buffer of exactly `len` scalars, then release it.
    ///
    /// Fails with [`NanoError::MallocFail`] when the memory is not available;
    /// `f` is not called in that case.
    fn with_zeroed<R>(&mut self, len: usize, f: impl FnOnce(&mut [f64]) -> R) -> NanoResult<R>;
}

/// Bump allocator over a borrowed `f64` buffer.
///
/// Lifetime `'a` ties every block handed out by [`Arena::alloc`] to the
/// buffer, not to the arena, so earlier outputs stay readable while later
/// layers keep allocating.
pub struct Arena<'a> {
    buf: &'a mut [f64],
    used: usize,
}

impl<'a> Arena<'a> {
    pub fn new(buf: &'a mut [f64]) -> Self {
        Self { buf, used: 0 }
    }

    /// Split a zeroed block of `len` scalars off the arena.
    pub fn alloc(&mut self, len: usize) -> NanoResult<&'a mut [f64]> {
        if len > self.buf.len() {
            return Err(NanoError::MallocFail {
                requested: len,
                remaining: self.buf.len(),
            });
        }

        let buf = core::mem::take(&mut self.buf);
        let (head, tail) = buf.split_at_mut(len);
        self.buf = tail;
        self.used += len;

        head.fill(0.0);
        Ok(head)
    }

    /// Sub-arena over the unused tail. Blocks it hands out are reclaimed
    /// when it is dropped.
    pub fn scoped(&mut self) -> Arena<'_> {
        Arena::new(&mut *self.buf)
    }

    /// Scalars still available.
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Scalars handed out by `alloc`.
    #[inline(always)]
    pub fn used(&self) -> usize {
        self.used
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.used + self.buf.len()
    }
}

impl Scratch for Arena<'_> {
    fn with_zeroed<R>(&mut self, len: usize, f: impl FnOnce(&mut [f64]) -> R) -> NanoResult<R> {
        let remaining = self.buf.len();
        let region = self.buf.get_mut(..len).ok_or(NanoError::MallocFail {
            requested: len,
            remaining,
        })?;
        region.fill(0.0);
        Ok(f(region))
    }
}

/// Heap-backed scratch. Allocation failure is reported, not aborted on.
#[cfg(feature = "alloc")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Heap;

#[cfg(feature = "alloc")]
impl Scratch for Heap {
    fn with_zeroed<R>(&mut self, len: usize, f: impl FnOnce(&mut [f64]) -> R) -> NanoResult<R> {
        let mut buf: Vec<f64> = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| NanoError::MallocFail { requested: len, remaining: 0 })?;
        buf.resize(len, 0.0);
        Ok(f(&mut buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_does_not_consume_the_arena() {
        let mut buf = [1.0f64; 16];
        let mut arena = Arena::new(&mut buf);
        let _out = arena.alloc(4).unwrap();

        let sum = arena
            .with_zeroed(12, |scratch| {
                scratch[0] = 5.0;
                scratch.iter().sum::<f64>()
            })
            .unwrap();

        assert_eq!(sum, 5.0);
        assert_eq!(arena.used(), 4);
        assert_eq!(arena.remaining(), 12);
    }

    #[test]
    fn scratch_larger_than_tail_fails() {
        let mut buf = [0.0f64; 8];
        let mut arena = Arena::new(&mut buf);
        let _out = arena.alloc(6).unwrap();
        let result = arena.with_zeroed(3, |_| ());
        assert_eq!(result, Err(NanoError::MallocFail { requested: 3, remaining: 2 }));
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn heap_scratch_is_zeroed() {
        let all_zero = Heap.with_zeroed(32, |buf| buf.iter().all(|&v| v == 0.0)).unwrap();
        assert!(all_zero);
    }
}
