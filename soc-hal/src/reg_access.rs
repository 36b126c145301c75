//! Register access
//!
//! # Overview
//!
//! [RegisterBlock] abstracts 32-bit register I/O at byte offsets from a
//! block's base. [Mmio] implements it with volatile accesses to a mapped
//! register window; tests substitute a recording implementation.

use core::ptr::NonNull;

/// A block of 32-bit registers.
pub trait RegisterBlock {
    /// Reads the register at byte `offset`.
    fn read32(&self, offset: usize) -> u32;

    /// Writes `value` to the register at byte `offset`.
    fn write32(&self, offset: usize, value: u32);

    /// Read-modify-write of the register at byte `offset`.
    fn modify32(&self, offset: usize, f: impl FnOnce(u32) -> u32)
    where
        Self: Sized,
    {
        let value = self.read32(offset);
        self.write32(offset, f(value));
    }
}

impl<B: RegisterBlock + ?Sized> RegisterBlock for &B {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value)
    }
}

/// A memory-mapped register window.
#[derive(Debug)]
pub struct Mmio {
    base: NonNull<u32>,
    len: usize,
}

// Safety: register accesses are single volatile word accesses.
unsafe impl Send for Mmio {}
unsafe impl Sync for Mmio {}

impl Mmio {
    /// Wraps a mapped register window of `len` bytes.
    ///
    /// # Safety
    ///
    /// `base` must be 4-byte aligned, mapped for `len` bytes and point to
    /// device memory that stays mapped for the lifetime of the returned value.
    pub const unsafe fn new(base: NonNull<u32>, len: usize) -> Self {
        Self { base, len }
    }

    /// Size of the window in bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the window is empty.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn register(&self, offset: usize) -> *mut u32 {
        assert!(
            offset % 4 == 0 && offset + 4 <= self.len,
            "register offset {:#x} out of bounds",
            offset
        );
        // Safety: in bounds of the mapped window, checked above.
        unsafe { self.base.as_ptr().add(offset / 4) }
    }
}

impl RegisterBlock for Mmio {
    fn read32(&self, offset: usize) -> u32 {
        unsafe { self.register(offset).read_volatile() }
    }

    fn write32(&self, offset: usize, value: u32) {
        unsafe { self.register(offset).write_volatile(value) }
    }
}
