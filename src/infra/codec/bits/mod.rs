//! Low-level components dedicated to bit manipulation for CAN buffers.
//! Fields of RV-C and NMEA 2000 payloads seldom align with byte boundaries, so the
//! reader and writer below walk one byte-sized window at a time and mask out only
//! the bits owned by the current field.
use crate::error::{BitReaderError, BitWriterError};

/// One step of a bit walk: the byte touched, the shift inside it, and the number of
/// field bits that land in that byte.
#[derive(Debug, Clone, Copy)]
struct Window {
    byte: usize,
    shift: usize,
    width: usize,
}

impl Window {
    #[inline]
    fn at(cursor: usize, remaining: usize) -> Self {
        let shift = cursor % 8;
        Self {
            byte: cursor / 8,
            shift,
            width: (8 - shift).min(remaining),
        }
    }

    #[inline]
    fn mask(&self) -> u8 {
        (((1u16 << self.width) - 1) as u8) << self.shift
    }
}

/// Generic reader that extracts bit segments from a `&[u8]`
/// without extra allocation or copies.
pub struct BitReader<'a> {
    /// Shared source buffer (typically a reassembled payload).
    buffer: &'a [u8],
    /// Current index expressed as number of bits read from the beginning.
    bit_cursor: usize,
}

impl<'a> BitReader<'a> {
    /// Create a reader positioned at the start of the provided buffer.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            bit_cursor: 0,
        }
    }

    /// Bits left between the cursor and the end of the buffer.
    #[inline]
    pub fn remaining_bits(&self) -> usize {
        self.buffer.len() * 8 - self.bit_cursor
    }

    fn check(&self, num_bits: u8) -> Result<(), BitReaderError> {
        if !(1..=64).contains(&num_bits) {
            return Err(BitReaderError::TooLongForType {
                max: 64,
                asked: num_bits,
            });
        }
        if num_bits as usize > self.remaining_bits() {
            return Err(BitReaderError::OutOfBounds {
                asked: num_bits as usize,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    /// Read `num_bits` bits (1 to 64) starting at the cursor, least significant first.
    pub fn read_u64(&mut self, num_bits: u8) -> Result<u64, BitReaderError> {
        self.check(num_bits)?;

        let mut result: u64 = 0;
        let mut done = 0usize;
        while done < num_bits as usize {
            let w = Window::at(self.bit_cursor + done, num_bits as usize - done);
            let bits = (self.buffer[w.byte] & w.mask()) >> w.shift;
            result |= (bits as u64) << done;
            done += w.width;
        }

        self.bit_cursor += num_bits as usize;
        Ok(result)
    }

    /// Read up to 8 bits and return a `u8`.
    pub fn read_u8(&mut self, num_bits: u8) -> Result<u8, BitReaderError> {
        if num_bits > 8 {
            return Err(BitReaderError::TooLongForType {
                max: 8,
                asked: num_bits,
            });
        }
        self.read_u64(num_bits).map(|val| val as u8)
    }

    /// Read up to 16 bits and return a `u16`.
    pub fn read_u16(&mut self, num_bits: u8) -> Result<u16, BitReaderError> {
        if num_bits > 16 {
            return Err(BitReaderError::TooLongForType {
                max: 16,
                asked: num_bits,
            });
        }
        self.read_u64(num_bits).map(|val| val as u16)
    }

    /// Read up to 32 bits and return a `u32`.
    pub fn read_u32(&mut self, num_bits: u8) -> Result<u32, BitReaderError> {
        if num_bits > 32 {
            return Err(BitReaderError::TooLongForType {
                max: 32,
                asked: num_bits,
            });
        }
        self.read_u64(num_bits).map(|val| val as u32)
    }

    /// Advance the cursor by `length` bits without reading data.
    pub fn advance(&mut self, length: u8) -> Result<(), BitReaderError> {
        self.check(length)?;
        self.bit_cursor += length as usize;
        Ok(())
    }

    /// Return a slice of `len` bytes from the current position.
    /// Cursor must be aligned on an octet boundary.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], BitReaderError> {
        if self.bit_cursor % 8 != 0 {
            return Err(BitReaderError::NonAlignedBit {
                cursor: self.bit_cursor,
            });
        }

        let start = self.bit_cursor / 8;
        let end = start + len;
        if end > self.buffer.len() {
            return Err(BitReaderError::OutOfBounds {
                asked: len,
                available: self.buffer.len() - start,
            });
        }
        self.bit_cursor += len * 8;
        Ok(&self.buffer[start..end])
    }
}
//==================================================================================BITWRITER

/// Writer laying bit segments into a `&mut [u8]` without assuming byte alignment.
/// Bits outside the field are preserved, so fields already written (and the `0xFF`
/// sentinel of reserved bits) survive.
pub struct BitWriter<'a> {
    /// Target buffer.
    buffer: &'a mut [u8],
    /// Current position expressed in bits written.
    bit_cursor: usize,
}

impl<'a> BitWriter<'a> {
    /// Create a writer positioned at the start of the buffer.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            bit_cursor: 0,
        }
    }

    /// Expose the cursor position in bits (useful to derive final length).
    pub fn bit_cursor(&self) -> usize {
        self.bit_cursor
    }

    fn check(&self, num_bits: u8) -> Result<(), BitWriterError> {
        if !(1..=64).contains(&num_bits) {
            return Err(BitWriterError::TooLongForType {
                max: 64,
                asked: num_bits,
            });
        }
        let available = self.buffer.len() * 8 - self.bit_cursor;
        if num_bits as usize > available {
            return Err(BitWriterError::OutOfBounds {
                asked: num_bits as usize,
                available,
            });
        }
        Ok(())
    }

    /// Write the low `num_bits` bits of `value`, least significant first.
    pub fn write_u64(&mut self, value: u64, num_bits: u8) -> Result<(), BitWriterError> {
        self.check(num_bits)?;

        let mut rest = value;
        let mut done = 0usize;
        while done < num_bits as usize {
            let w = Window::at(self.bit_cursor + done, num_bits as usize - done);
            let mask = w.mask();
            let byte = &mut self.buffer[w.byte];
            *byte = (*byte & !mask) | (((rest as u8) << w.shift) & mask);
            rest >>= w.width;
            done += w.width;
        }

        self.bit_cursor += num_bits as usize;
        Ok(())
    }

    /// Convenience helper to write up to 8 bits.
    pub fn write_u8(&mut self, value: u8, num_bits: u8) -> Result<(), BitWriterError> {
        if num_bits > 8 {
            return Err(BitWriterError::TooLongForType {
                max: 8,
                asked: num_bits,
            });
        }
        self.write_u64(value as u64, num_bits)
    }

    /// Convenience helper to write up to 16 bits.
    pub fn write_u16(&mut self, value: u16, num_bits: u8) -> Result<(), BitWriterError> {
        if num_bits > 16 {
            return Err(BitWriterError::TooLongForType {
                max: 16,
                asked: num_bits,
            });
        }
        self.write_u64(value as u64, num_bits)
    }

    /// Convenience helper to write up to 32 bits.
    pub fn write_u32(&mut self, value: u32, num_bits: u8) -> Result<(), BitWriterError> {
        if num_bits > 32 {
            return Err(BitWriterError::TooLongForType {
                max: 32,
                asked: num_bits,
            });
        }
        self.write_u64(value as u64, num_bits)
    }

    /// Advance the cursor without writing (reserved fields keep their sentinel).
    pub fn advance(&mut self, length: u8) -> Result<(), BitWriterError> {
        self.check(length)?;
        self.bit_cursor += length as usize;
        Ok(())
    }

    /// Copy an already-aligned byte slice into the buffer.
    pub fn write_slice(&mut self, slice: &[u8]) -> Result<(), BitWriterError> {
        if self.bit_cursor % 8 != 0 {
            return Err(BitWriterError::NonAlignedBit {
                cursor: self.bit_cursor,
            });
        }
        let start = self.bit_cursor / 8;
        let end = start + slice.len();
        if end > self.buffer.len() {
            return Err(BitWriterError::OutOfBounds {
                asked: slice.len(),
                available: self.buffer.len() - start,
            });
        }
        self.buffer[start..end].copy_from_slice(slice);
        self.bit_cursor += slice.len() * 8;
        Ok(())
    }
}
