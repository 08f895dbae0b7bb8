//! Fixed header for Cybird frame files
//!
//! Fixed header is 24 bytes, little-endian:
//! - Bytes 0-3: Header word (low byte color format, high byte magic)
//! - Bytes 4-7: Flags (passed through)
//! - Bytes 8-9: Width in pixels
//! - Bytes 10-11: Height in pixels
//! - Bytes 12-15: Stride in bytes per row
//! - Bytes 16-19: Reserved
//! - Bytes 20-23: Payload size in bytes
//!
//! The payload follows immediately at offset 24. Files shorter than
//! [`MIN_FILE_SIZE`] are rejected before the header is read.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use cybird_core::DecodeError;

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 24;

/// Smallest file accepted by the decoder
pub const MIN_FILE_SIZE: u64 = 32;

/// Magic byte stored in the top byte of the header word
pub const FRAME_MAGIC: u8 = 0x37;

/// RGB565 color format code stored in the low byte of the header word
pub const COLOR_FORMAT_RGB565: u8 = 0x12;

/// RGB565 is the only supported format
pub const BYTES_PER_PIXEL: u32 = 2;

/// Frame file header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Color format (bits 0-7), magic (bits 24-31), bits 8-23 passed through
    pub header_word: u32,
    /// Opaque flags
    pub flags: u32,
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// Bytes per row
    pub stride: u32,
    /// Ignored
    pub reserved: u32,
    /// Payload length in bytes
    pub data_size: u32,
}

impl FrameHeader {
    /// Header for a tightly packed RGB565 image
    pub fn rgb565(width: u16, height: u16) -> Self {
        let data_size = expected_data_size(width, height);
        FrameHeader {
            header_word: ((FRAME_MAGIC as u32) << 24) | COLOR_FORMAT_RGB565 as u32,
            flags: 0,
            width,
            height,
            stride: width as u32 * BYTES_PER_PIXEL,
            reserved: 0,
            data_size: u32::try_from(data_size).unwrap_or(u32::MAX),
        }
    }

    /// Color format code (low byte of the header word)
    #[inline]
    pub fn color_format(&self) -> u8 {
        (self.header_word & 0xFF) as u8
    }

    /// Magic byte (high byte of the header word)
    #[inline]
    pub fn magic(&self) -> u8 {
        (self.header_word >> 24) as u8
    }

    #[inline]
    pub fn set_color_format(&mut self, cf: u8) {
        self.header_word = (self.header_word & 0xFFFF_FF00) | cf as u32;
    }

    #[inline]
    pub fn set_magic(&mut self, magic: u8) {
        self.header_word = (self.header_word & 0x00FF_FFFF) | ((magic as u32) << 24);
    }

    /// Payload size implied by the dimensions
    #[inline]
    pub fn expected_data_size(&self) -> u64 {
        expected_data_size(self.width, self.height)
    }

    /// Parse header from bytes
    pub fn parse(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                len: buf.len() as u64,
            });
        }

        let mut cur = &buf[..HEADER_SIZE];
        Ok(FrameHeader {
            header_word: cur.get_u32_le(),
            flags: cur.get_u32_le(),
            width: cur.get_u16_le(),
            height: cur.get_u16_le(),
            stride: cur.get_u32_le(),
            reserved: cur.get_u32_le(),
            data_size: cur.get_u32_le(),
        })
    }

    /// Check magic, color format and payload size, in that order.
    ///
    /// Runs before any payload byte is read or allocated.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.magic() != FRAME_MAGIC {
            return Err(DecodeError::BadMagic(self.magic()));
        }

        if self.color_format() != COLOR_FORMAT_RGB565 {
            return Err(DecodeError::BadFormat(self.color_format()));
        }

        let expected = self.expected_data_size();
        if self.data_size as u64 != expected {
            return Err(DecodeError::SizeMismatch {
                declared: self.data_size,
                expected,
            });
        }

        Ok(())
    }

    /// Serialize header into any byte sink
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.header_word);
        buf.put_u32_le(self.flags);
        buf.put_u16_le(self.width);
        buf.put_u16_le(self.height);
        buf.put_u32_le(self.stride);
        buf.put_u32_le(self.reserved);
        buf.put_u32_le(self.data_size);
    }

    /// Serialize header to a fixed array
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut cursor = &mut out[..];
        self.write_to(&mut cursor);
        out
    }
}

/// `width * height * 2`, computed without overflow
#[inline]
pub fn expected_data_size(width: u16, height: u16) -> u64 {
    width as u64 * height as u64 * BYTES_PER_PIXEL as u64
}

/// Build a complete frame file (header followed by payload)
pub fn encode_frame(header: &FrameHeader, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    header.write_to(&mut buf);
    buf.put_slice(payload);
    buf.freeze()
}
