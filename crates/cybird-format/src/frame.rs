//! Decoded frames
//!
//! A [`FrameDescriptor`] owns its pixel buffer outright. Neither type is
//! `Clone`, so handing a frame from one buffer slot to another is a move and
//! a buffer can only be released once.

use std::fmt;

use cybird_core::{DecodeError, HeapLease};

use crate::{FrameHeader, Rgb565, BYTES_PER_PIXEL};

/// Raw RGB565 payload plus its heap accounting
pub struct PixelBuffer {
    bytes: Vec<u8>,
    _lease: HeapLease,
}

impl PixelBuffer {
    pub fn new(bytes: Vec<u8>, lease: HeapLease) -> Self {
        PixelBuffer {
            bytes,
            _lease: lease,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for PixelBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PixelBuffer({} bytes)", self.bytes.len())
    }
}

/// One decoded frame: header metadata plus exclusively owned pixels
#[derive(Debug)]
pub struct FrameDescriptor {
    header: FrameHeader,
    pixels: PixelBuffer,
}

impl FrameDescriptor {
    /// Pair a validated header with its payload.
    ///
    /// Fails with `ShortRead` if the payload length disagrees with the header.
    pub fn from_parts(header: FrameHeader, pixels: PixelBuffer) -> Result<Self, DecodeError> {
        if pixels.len() != header.data_size as usize {
            return Err(DecodeError::ShortRead {
                read: pixels.len(),
                expected: header.data_size as usize,
            });
        }
        Ok(FrameDescriptor { header, pixels })
    }

    /// Header as read from the file
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.header.width
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.header.height
    }

    #[inline]
    pub fn stride(&self) -> u32 {
        self.header.stride
    }

    #[inline]
    pub fn color_format(&self) -> u8 {
        self.header.color_format()
    }

    #[inline]
    pub fn data_size(&self) -> u32 {
        self.header.data_size
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Pixel at `(x, y)`, using the packed row layout (`width * 2` bytes per row)
    pub fn pixel_at(&self, x: u16, y: u16) -> Option<Rgb565> {
        if x >= self.header.width || y >= self.header.height {
            return None;
        }
        let row = self.header.width as usize * BYTES_PER_PIXEL as usize;
        let offset = y as usize * row + x as usize * BYTES_PER_PIXEL as usize;
        let bytes = self.pixels.as_slice().get(offset..offset + 2)?;
        Some(Rgb565(u16::from_le_bytes([bytes[0], bytes[1]])))
    }
}
