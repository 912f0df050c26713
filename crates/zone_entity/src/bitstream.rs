//! Bit-level streams for replication payloads.
//!
//! Bits are packed most-significant first within each byte. Multi-byte
//! integers are written as their little-endian bytes, each byte going
//! through the same bit packing, so a stream that happens to be byte-aligned
//! reads like a plain little-endian buffer.

/// Errors raised while reading a bit stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitError {
    /// The reader ran past the end of its buffer.
    #[error("bit stream exhausted: needed {needed} bits, {remaining} remaining")]
    Exhausted {
        /// Bits requested by the read.
        needed: usize,
        /// Bits left in the buffer.
        remaining: usize,
    },
}

/// An append-only bit stream.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits written so far.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Append a single bit.
    pub fn write_bit(&mut self, bit: bool) {
        let offset = self.bit_len % 8;
        if offset == 0 {
            self.bytes.push(0);
        }
        if bit {
            if let Some(last) = self.bytes.last_mut() {
                *last |= 0x80 >> offset;
            }
        }
        self.bit_len += 1;
    }

    /// Append the low `count` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u64, count: u32) {
        debug_assert!(count <= 64, "cannot write more than 64 bits at once");
        for shift in (0..count.min(64)).rev() {
            self.write_bit((value >> shift) & 1 == 1);
        }
    }

    /// Append one byte.
    pub fn write_u8(&mut self, value: u8) {
        self.write_bits(u64::from(value), 8);
    }

    /// Append a little-endian `u16`.
    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Append a little-endian `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Append a little-endian `u64`.
    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Append an IEEE-754 `f32`.
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_u8(byte);
        }
    }

    /// The written bytes. A trailing partial byte is zero-padded.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the writer, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A cursor reading a bit stream produced by [`BitWriter`].
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    /// Start reading at the first bit of `bytes`.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Bits left to read, including any zero padding in the last byte.
    #[must_use]
    pub fn remaining(&self) -> usize {
        (self.bytes.len() * 8).saturating_sub(self.position)
    }

    /// Read one bit.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::Exhausted`] at the end of the buffer.
    pub fn read_bit(&mut self) -> Result<bool, BitError> {
        let byte = self
            .bytes
            .get(self.position / 8)
            .copied()
            .ok_or(BitError::Exhausted {
                needed: 1,
                remaining: 0,
            })?;
        let bit = byte & (0x80 >> (self.position % 8)) != 0;
        self.position += 1;
        Ok(bit)
    }

    /// Read `count` bits into the low end of a `u64`, most significant first.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::Exhausted`] if fewer than `count` bits remain; the
    /// cursor is left untouched in that case.
    pub fn read_bits(&mut self, count: u32) -> Result<u64, BitError> {
        let needed = count.min(64) as usize;
        if needed > self.remaining() {
            return Err(BitError::Exhausted {
                needed,
                remaining: self.remaining(),
            });
        }
        let mut value = 0u64;
        for _ in 0..needed {
            value = (value << 1) | u64::from(self.read_bit()?);
        }
        Ok(value)
    }

    /// Read one byte.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::Exhausted`] if fewer than 8 bits remain.
    pub fn read_u8(&mut self) -> Result<u8, BitError> {
        Ok(self.read_bits(8)? as u8)
    }

    /// Read a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::Exhausted`] if fewer than 16 bits remain.
    pub fn read_u16(&mut self) -> Result<u16, BitError> {
        let mut buf = [0u8; 2];
        self.read_into(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Read a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::Exhausted`] if fewer than 32 bits remain.
    pub fn read_u32(&mut self) -> Result<u32, BitError> {
        let mut buf = [0u8; 4];
        self.read_into(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::Exhausted`] if fewer than 64 bits remain.
    pub fn read_u64(&mut self) -> Result<u64, BitError> {
        let mut buf = [0u8; 8];
        self.read_into(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read an IEEE-754 `f32`.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::Exhausted`] if fewer than 32 bits remain.
    pub fn read_f32(&mut self) -> Result<f32, BitError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), BitError> {
        let needed = buf.len() * 8;
        if needed > self.remaining() {
            return Err(BitError::Exhausted {
                needed,
                remaining: self.remaining(),
            });
        }
        for byte in buf.iter_mut() {
            *byte = self.read_u8()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_pack_msb_first() {
        let mut w = BitWriter::new();
        w.write_bit(true);
        w.write_bit(false);
        w.write_bit(true);
        assert_eq!(w.bit_len(), 3);
        assert_eq!(w.as_bytes(), &[0b1010_0000]);
    }

    #[test]
    fn test_aligned_integers_are_little_endian() {
        let mut w = BitWriter::new();
        w.write_u8(0x24);
        w.write_u16(0x0102);
        assert_eq!(w.into_bytes(), vec![0x24, 0x02, 0x01]);
    }

    #[test]
    fn test_unaligned_byte_straddles_boundary() {
        let mut w = BitWriter::new();
        w.write_bit(true);
        w.write_u8(0xFF);
        assert_eq!(w.bit_len(), 9);
        assert_eq!(w.as_bytes(), &[0xFF, 0x80]);
    }

    #[test]
    fn test_reader_follows_writer_across_misalignment() {
        let mut w = BitWriter::new();
        w.write_u8(0x27);
        w.write_bit(true);
        w.write_u16(513);
        w.write_f32(1.5);
        w.write_u64(u64::MAX - 7);

        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 0x27);
        assert!(r.read_bit().unwrap());
        assert_eq!(r.read_u16().unwrap(), 513);
        assert!((r.read_f32().unwrap() - 1.5).abs() < f32::EPSILON);
        assert_eq!(r.read_u64().unwrap(), u64::MAX - 7);
    }

    #[test]
    fn test_reader_reports_exhaustion() {
        let bytes = [0xAB];
        let mut r = BitReader::new(&bytes);
        let err = r.read_u16().unwrap_err();
        assert_eq!(
            err,
            BitError::Exhausted {
                needed: 16,
                remaining: 8
            }
        );
        // A failed read does not move the cursor.
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert!(r.read_bit().is_err());
    }

    #[test]
    fn test_write_bits_masks_to_count() {
        let mut w = BitWriter::new();
        w.write_bits(0b1111_0101, 4);
        assert_eq!(w.as_bytes(), &[0b0101_0000]);
    }
}
