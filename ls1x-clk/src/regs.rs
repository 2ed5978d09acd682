//! # Clock configuration register block
//!
//! Both chip variants expose their entire clock configuration through two
//! 32-bit words: the PLL frequency word at byte offset 0x0 and the
//! divisor/bypass word at byte offset 0x4. Several clock nodes own disjoint
//! bit-fields within the same word, so every mutating access performs its
//! read-modify-write cycle inside a critical section. Plain reads are single
//! volatile word loads and do not take the lock; a 32-bit load cannot tear
//! on this class of hardware.

/// Physical base address of the clock configuration block on both variants.
///
/// On MIPS this is typically accessed through a KSEG1 (uncached) mapping.
pub const CLK_BASE_ADDR: usize = 0x1fe7_8030;

/// Byte offset of the PLL frequency configuration word.
pub const FREQ_OFFSET: u32 = 0x0;
/// Byte offset of the divisor/bypass configuration word.
pub const DIV_OFFSET: u32 = 0x4;

/// Number of 32-bit words in the block.
pub const CLK_BLOCK_WORDS: usize = 2;

#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum FieldError {
    #[error("bit-field has zero width")]
    ZeroWidth,
    #[error("bit-field exceeds the 32-bit register word")]
    OutOfRange,
    #[error("bit-field overlaps a previously registered field")]
    Overlap,
}

/// Descriptor for one bit-field inside a 32-bit configuration word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterField {
    /// Byte offset of the register word inside the block. Must be word
    /// aligned.
    pub offset: u32,
    /// Position of the least significant bit of the field.
    pub shift: u32,
    /// Width of the field in bits.
    pub width: u32,
}

impl RegisterField {
    pub const fn new(offset: u32, shift: u32, width: u32) -> Self {
        Self {
            offset,
            shift,
            width,
        }
    }

    /// Single-bit field, used for enable and select bits.
    pub const fn bit(offset: u32, shift: u32) -> Self {
        Self::new(offset, shift, 1)
    }

    /// Mask of the field bits within the register word.
    pub const fn mask(&self) -> u32 {
        if self.width == 0 || self.width > 32 || self.shift >= 32 {
            return 0;
        }
        (u32::MAX >> (32 - self.width)) << self.shift
    }

    pub const fn validate(&self) -> Result<(), FieldError> {
        if self.width == 0 {
            return Err(FieldError::ZeroWidth);
        }
        if self.shift + self.width > 32 {
            return Err(FieldError::OutOfRange);
        }
        Ok(())
    }
}

/// Guarded access to the memory-mapped clock configuration words.
#[derive(Debug)]
pub struct RegisterBlock {
    base: *mut u32,
}

// Safety: all accesses are volatile 32-bit word accesses and all mutating
// accesses are serialized through critical sections.
unsafe impl Send for RegisterBlock {}
unsafe impl Sync for RegisterBlock {}

impl RegisterBlock {
    /// Create an accessor for the register block at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point to a mapped, word-aligned memory region of at least
    /// [CLK_BLOCK_WORDS] 32-bit words which stays valid for the lifetime of
    /// the accessor and everything built on top of it.
    pub const unsafe fn new(base: *mut u32) -> Self {
        Self { base }
    }

    fn word_ptr(&self, offset: u32) -> *mut u32 {
        debug_assert!(offset % 4 == 0);
        debug_assert!(((offset >> 2) as usize) < CLK_BLOCK_WORDS);
        unsafe { self.base.add((offset >> 2) as usize) }
    }

    /// Read the full register word at the given byte offset.
    #[inline]
    pub fn read(&self, offset: u32) -> u32 {
        unsafe { self.word_ptr(offset).read_volatile() }
    }

    /// Read the value of one bit-field, shifted down to bit 0.
    #[inline]
    pub fn read_field(&self, field: &RegisterField) -> u32 {
        (self.read(field.offset) & field.mask()) >> field.shift
    }

    /// Read a single bit of the word at `offset`.
    #[inline]
    pub fn read_bit(&self, offset: u32, bit: u32) -> bool {
        self.read(offset) >> bit & 0b1 == 0b1
    }

    /// Write the full register word at the given byte offset.
    pub fn write(&self, offset: u32, value: u32) {
        critical_section::with(|_| unsafe {
            self.word_ptr(offset).write_volatile(value);
        });
    }

    /// Replace the bits of `field` with `value`, leaving all other bits of
    /// the word untouched.
    ///
    /// The read-modify-write cycle runs inside a critical section so that
    /// concurrent writers targeting different bit-fields of the same word
    /// cannot lose each other's update.
    pub fn write_field(&self, field: &RegisterField, value: u32) {
        let mask = field.mask();
        critical_section::with(|_| {
            let ptr = self.word_ptr(field.offset);
            let word = unsafe { ptr.read_volatile() };
            let word = (word & !mask) | ((value << field.shift) & mask);
            unsafe { ptr.write_volatile(word) };
        });
    }

    /// Set or clear a single bit of the word at `offset`.
    pub fn set_bit(&self, offset: u32, bit: u32, set: bool) {
        self.write_field(&RegisterField::bit(offset, bit), set as u32);
    }
}
