//! Frame decoding
//!
//! `FrameStore::decode` is stateless per call: open, validate, account,
//! read. Validation order is fixed and the first failure wins:
//! 1. file length
//! 2. magic byte
//! 3. color format
//! 4. declared payload size
//! 5. free heap (payload + safety margin)
//! 6. full payload read

use std::io::{self, Read};
use std::sync::Arc;
use std::time::Instant;

use cybird_core::{DecodeError, HeapGauge, SubjectId};
use cybird_format::{FrameDescriptor, FrameHeader, PixelBuffer, HEADER_SIZE, MIN_FILE_SIZE};
use tracing::{debug, trace};

use crate::{FrameFile, FrameStorage, Pacer, ReadPacing, ThreadYielder, Yielder};

/// Heap that must stay free on top of a frame's payload
pub const MEMORY_SAFETY_MARGIN: usize = 4096;

/// Decodes frame files from a storage backend
#[derive(Clone)]
pub struct FrameStore {
    storage: Arc<dyn FrameStorage>,
    heap: HeapGauge,
    pacing: ReadPacing,
    yielder: Arc<dyn Yielder>,
}

impl FrameStore {
    /// Store with default pacing, yielding the OS thread
    pub fn new(storage: Arc<dyn FrameStorage>, heap: HeapGauge) -> Self {
        FrameStore {
            storage,
            heap,
            pacing: ReadPacing::default(),
            yielder: Arc::new(ThreadYielder),
        }
    }

    pub fn with_pacing(mut self, pacing: ReadPacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_yielder(mut self, yielder: Arc<dyn Yielder>) -> Self {
        self.yielder = yielder;
        self
    }

    pub fn storage(&self) -> &dyn FrameStorage {
        &*self.storage
    }

    pub fn heap(&self) -> &HeapGauge {
        &self.heap
    }

    pub fn pacing(&self) -> ReadPacing {
        self.pacing
    }

    pub(crate) fn yielder(&self) -> &dyn Yielder {
        &*self.yielder
    }

    /// Whether frame `frame_index` (0-based) exists for `subject`
    pub fn exists(&self, subject: SubjectId, frame_index: u8) -> bool {
        self.storage.exists(subject, frame_index as u16 + 1)
    }

    /// Decode frame `frame_index` (0-based) of `subject`
    pub fn decode(&self, subject: SubjectId, frame_index: u8) -> Result<FrameDescriptor, DecodeError> {
        let frame_number = frame_index as u16 + 1;

        let mut file = self.storage.open(subject, frame_number).map_err(|e| {
            if e.kind() != io::ErrorKind::NotFound {
                debug!(%subject, frame = frame_number, error = %e, "frame open failed");
            }
            DecodeError::NotFound {
                subject,
                frame: frame_number,
            }
        })?;

        let len = file.len();
        if len < MIN_FILE_SIZE {
            return Err(DecodeError::Truncated { len });
        }

        let mut raw = [0u8; HEADER_SIZE];
        file.read_exact(&mut raw)
            .map_err(|_| DecodeError::Truncated { len })?;
        let header = FrameHeader::parse(&raw)?;
        header.validate()?;

        let needed = header.data_size as usize;
        let free = self.heap.free_bytes();
        if free < needed.saturating_add(MEMORY_SAFETY_MARGIN) {
            return Err(DecodeError::OutOfMemory { needed, free });
        }

        let lease = self.heap.lease(needed);
        let mut bytes = vec![0u8; needed];
        let started = Instant::now();
        let read = self.read_payload(&mut *file, &mut bytes);
        if read != needed {
            return Err(DecodeError::ShortRead {
                read,
                expected: needed,
            });
        }

        trace!(
            %subject,
            frame = frame_number,
            bytes = needed,
            elapsed_us = started.elapsed().as_micros() as u64,
            "frame decoded"
        );
        FrameDescriptor::from_parts(header, PixelBuffer::new(bytes, lease))
    }

    /// Fill `buf` in bounded chunks, returning the bytes actually read
    fn read_payload(&self, file: &mut dyn FrameFile, buf: &mut [u8]) -> usize {
        let chunk = self.pacing.effective_chunk();
        let mut pacer = Pacer::new(self.pacing, &*self.yielder);
        let mut filled = 0;

        while filled < buf.len() {
            let end = (filled + chunk).min(buf.len());
            match file.read(&mut buf[filled..end]) {
                Ok(0) => break,
                Ok(n) => {
                    filled += n;
                    pacer.record(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(error = %e, filled, "payload read failed");
                    break;
                }
            }
        }

        filled
    }
}
