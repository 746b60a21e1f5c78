//! MSB-first bit addressing over a byte buffer
//!
//! PEWS payloads are not byte-aligned. Fields are packed
//! back-to-back with bit 0 being the most-significant bit
//! of byte 0, and bit numbering continues across byte
//! boundaries:
//!
//! ```txt
//! byte:    |       0       |       1       |
//! bit:     |0 1 2 3 4 5 6 7|8 9 ...        |
//! ```

use thiserror::Error;

/// Widest field which may be read in one call
const MAX_READ_BITS: usize = u64::BITS as usize;

/// A read outside of a [`BitSlice`]
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BitRangeErr {
    /// The requested bits run past the end of the slice
    #[error("{len} bits at offset {offset} requested but only {available} bits are available")]
    OutOfBounds {
        /// First bit requested, relative to the slice
        offset: usize,

        /// Number of bits requested
        len: usize,

        /// Number of bits in the slice
        available: usize,
    },

    /// The requested field is wider than the integer it is read into
    #[error("cannot read {0} bits into a 64-bit integer")]
    TooWide(usize),
}

/// A window of bits within a byte buffer
///
/// Offsets given to a `BitSlice` are always relative to the
/// start of the window, so [`subrange()`](#method.subrange)
/// can hand a block of the payload to code which only knows
/// the block's own layout.
///
/// ```
/// use pews::BitSlice;
///
/// let bits = BitSlice::new(&[0b1010_0000, 0xff]);
/// assert_eq!(16, bits.len());
/// assert_eq!(Ok(0b101), bits.read_uint(0, 3));
/// assert_eq!(Ok(0b0_0000_1111), bits.read_uint(3, 9));
///
/// let tail = bits.tail(4).unwrap();
/// assert_eq!(Ok(0xf), tail.read_uint(0, 4));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitSlice<'b> {
    bytes: &'b [u8],

    // absolute bit position of the window in `bytes`
    start: usize,

    // window length, in bits
    len: usize,
}

impl<'b> BitSlice<'b> {
    /// View all of `bytes` as bits
    pub fn new(bytes: &'b [u8]) -> Self {
        Self {
            bytes,
            start: 0,
            len: bytes.len() * 8,
        }
    }

    /// Number of bits in the window
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the window contains no bits
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read a single bit
    pub fn bit(&self, offset: usize) -> Result<bool, BitRangeErr> {
        Ok(self.read_uint(offset, 1)? == 1)
    }

    /// Read an unsigned big-endian integer
    ///
    /// Reads `len` bits starting at bit `offset` and interprets
    /// them as an unsigned integer, most-significant bit first.
    /// A zero-length read returns zero.
    pub fn read_uint(&self, offset: usize, len: usize) -> Result<u64, BitRangeErr> {
        if len > MAX_READ_BITS {
            return Err(BitRangeErr::TooWide(len));
        }
        self.check(offset, len)?;

        let mut pos = self.start + offset;
        let end = pos + len;
        let mut out = 0u64;
        while pos < end {
            let byte = self.bytes[pos / 8];
            let bit_in_byte = pos % 8;
            let take = usize::min(8 - bit_in_byte, end - pos);
            let shift = 8 - bit_in_byte - take;
            let mask = ((1u16 << take) - 1) as u8;

            out = (out << take) | ((byte >> shift) & mask) as u64;
            pos += take;
        }

        Ok(out)
    }

    /// Window of `len` bits starting at `offset`
    pub fn subrange(&self, offset: usize, len: usize) -> Result<BitSlice<'b>, BitRangeErr> {
        self.check(offset, len)?;
        Ok(Self {
            bytes: self.bytes,
            start: self.start + offset,
            len,
        })
    }

    /// Window from `offset` to the end of this slice
    pub fn skip(&self, offset: usize) -> Result<BitSlice<'b>, BitRangeErr> {
        let len = self.len.checked_sub(offset).ok_or(BitRangeErr::OutOfBounds {
            offset,
            len: 0,
            available: self.len,
        })?;
        self.subrange(offset, len)
    }

    /// Window of the last `len` bits of this slice
    pub fn tail(&self, len: usize) -> Result<BitSlice<'b>, BitRangeErr> {
        let offset = self.len.checked_sub(len).ok_or(BitRangeErr::OutOfBounds {
            offset: 0,
            len,
            available: self.len,
        })?;
        self.subrange(offset, len)
    }

    /// Iterate over consecutive `width`-bit groups
    ///
    /// Trailing bits which do not fill a complete group are
    /// not returned. A `width` of zero yields nothing.
    pub fn chunks(&self, width: usize) -> impl Iterator<Item = BitSlice<'b>> {
        let this = *self;
        let count = if width == 0 { 0 } else { self.len / width };
        (0..count).map(move |i| Self {
            bytes: this.bytes,
            start: this.start + i * width,
            len: width,
        })
    }

    fn check(&self, offset: usize, len: usize) -> Result<(), BitRangeErr> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(BitRangeErr::OutOfBounds {
                offset,
                len,
                available: self.len,
            }),
        }
    }
}

/// Packs fields MSB-first; used to build test payloads
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub(crate) struct BitWriter {
    bytes: Vec<u8>,
    len: usize,
}

#[cfg(test)]
impl BitWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, value: u64, width: usize) -> &mut Self {
        for i in (0..width).rev() {
            if self.len % 8 == 0 {
                self.bytes.push(0);
            }
            if i < 64 && (value >> i) & 1 == 1 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> (self.len % 8);
            }
            self.len += 1;
        }
        self
    }

    pub(crate) fn pad_to_byte(&mut self) -> &mut Self {
        let rem = self.len % 8;
        if rem != 0 {
            self.push(0, 8 - rem);
        }
        self
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
