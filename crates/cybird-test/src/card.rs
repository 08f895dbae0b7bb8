//! In-memory card fixtures
//!
//! Builds a [`MemStorage`] (or a directory tree) populated with frame files,
//! including deliberately broken ones.

use std::io;
use std::path::Path;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use cybird_core::SubjectId;
use cybird_format::{encode_frame, FrameHeader, Rgb565, HEADER_SIZE};
use cybird_store::{frame_path, MemStorage};

/// Ways to break a frame file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corruption {
    /// Magic byte replaced
    BadMagic(u8),
    /// Color format replaced
    BadFormat(u8),
    /// Declared payload size off by `delta` bytes
    SizeOff(i32),
    /// File cut to this many bytes
    Truncate(usize),
}

/// Frame file with every pixel set to `color`
pub fn solid_frame(width: u16, height: u16, color: Rgb565) -> Bytes {
    let header = FrameHeader::rgb565(width, height);
    let mut payload = BytesMut::with_capacity(header.data_size as usize);
    for _ in 0..(width as usize * height as usize) {
        payload.put_u16_le(color.0);
    }
    encode_frame(&header, &payload)
}

/// Frame file whose first pixel encodes the frame number
pub fn numbered_frame(width: u16, height: u16, frame_number: u16) -> Bytes {
    solid_frame(width, height, Rgb565(frame_number))
}

/// Apply a corruption to a well-formed frame file
pub fn corrupt(file: &[u8], corruption: Corruption) -> Bytes {
    let mut out = file.to_vec();
    match corruption {
        Corruption::BadMagic(magic) => out[3] = magic,
        Corruption::BadFormat(format) => out[0] = format,
        Corruption::SizeOff(delta) => {
            if let Ok(mut header) = FrameHeader::parse(&out) {
                header.data_size = (header.data_size as i64 + delta as i64).max(0) as u32;
                out[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
            }
        }
        Corruption::Truncate(len) => out.truncate(len),
    }
    Bytes::from(out)
}

/// Builder for a populated card
#[derive(Debug)]
pub struct CardBuilder {
    width: u16,
    height: u16,
    files: Vec<(SubjectId, u16, Bytes)>,
}

impl Default for CardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CardBuilder {
    /// Card with 8x8 frames
    pub fn new() -> Self {
        CardBuilder {
            width: 8,
            height: 8,
            files: Vec::new(),
        }
    }

    /// Frame dimensions used by subsequent `subject` calls
    pub fn dimensions(mut self, width: u16, height: u16) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// `frames` numbered frames for `id`
    pub fn subject(mut self, id: u16, frames: u16) -> Self {
        for n in 1..=frames {
            self.files.push((
                SubjectId::new(id),
                n,
                numbered_frame(self.width, self.height, n),
            ));
        }
        self
    }

    /// Replace one frame with a corrupted copy
    pub fn corrupt(mut self, id: u16, frame_number: u16, corruption: Corruption) -> Self {
        let good = numbered_frame(self.width, self.height, frame_number);
        self.files
            .retain(|(s, n, _)| !(*s == SubjectId::new(id) && *n == frame_number));
        self.files
            .push((SubjectId::new(id), frame_number, corrupt(&good, corruption)));
        self
    }

    /// Drop one frame file
    pub fn without(mut self, id: u16, frame_number: u16) -> Self {
        self.files
            .retain(|(s, n, _)| !(*s == SubjectId::new(id) && *n == frame_number));
        self
    }

    /// Payload bytes of one frame at the current dimensions
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 2
    }

    pub fn build(self) -> Arc<MemStorage> {
        let storage = MemStorage::new();
        for (subject, n, contents) in self.files {
            storage.insert(subject, n, contents);
        }
        Arc::new(storage)
    }

    /// Write the card out as `<root>/<id>/<n>.bin`
    pub fn write_to(self, root: &Path) -> io::Result<()> {
        for (subject, n, contents) in self.files {
            let path = frame_path(root, subject, n);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &contents)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cybird_core::DecodeError;
    use cybird_format::FRAME_MAGIC;

    #[test]
    fn test_corruptions_parse_as_expected() {
        let good = solid_frame(4, 4, Rgb565::BLACK);

        let header = FrameHeader::parse(&corrupt(&good, Corruption::BadMagic(0x11))).unwrap();
        assert_eq!(header.validate(), Err(DecodeError::BadMagic(0x11)));

        let header = FrameHeader::parse(&corrupt(&good, Corruption::BadFormat(0x04))).unwrap();
        assert_eq!(header.magic(), FRAME_MAGIC);
        assert_eq!(header.validate(), Err(DecodeError::BadFormat(0x04)));

        let header = FrameHeader::parse(&corrupt(&good, Corruption::SizeOff(1))).unwrap();
        assert!(matches!(header.validate(), Err(DecodeError::SizeMismatch { declared: 33, .. })));

        assert_eq!(corrupt(&good, Corruption::Truncate(10)).len(), 10);
    }

    #[test]
    fn test_builder_layout() {
        let storage = CardBuilder::new().subject(1001, 3).without(1001, 2).build();
        assert_eq!(storage.file_count(), 2);
    }
}
