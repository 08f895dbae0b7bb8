//! Storage backends
//!
//! Frame files live at `<root>/<subject id>/<frame number>.bin`, with frame
//! numbers starting at 1. The card driver is an external collaborator; the
//! engine only needs to open a file and know its length.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::buf::Reader;
use bytes::{Buf, Bytes};
use cybird_core::SubjectId;
use parking_lot::{Mutex, RwLock};

/// An open frame file
pub trait FrameFile: Read + Send {
    /// Total file length in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read-only access to frame files
pub trait FrameStorage: Send + Sync {
    /// Open `<subject>/<frame_number>.bin`
    fn open(&self, subject: SubjectId, frame_number: u16) -> io::Result<Box<dyn FrameFile>>;

    /// Existence check used by frame-count discovery
    fn exists(&self, subject: SubjectId, frame_number: u16) -> bool {
        self.open(subject, frame_number).is_ok()
    }
}

/// Path of a frame file below `root`
pub fn frame_path(root: &Path, subject: SubjectId, frame_number: u16) -> PathBuf {
    root.join(subject.to_string())
        .join(format!("{}.bin", frame_number))
}

/// Frames stored in a directory tree (a mounted card)
#[derive(Clone, Debug)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

struct DiskFile {
    file: File,
    len: u64,
}

impl Read for DiskFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl FrameFile for DiskFile {
    fn len(&self) -> u64 {
        self.len
    }
}

impl FrameStorage for DirStorage {
    fn open(&self, subject: SubjectId, frame_number: u16) -> io::Result<Box<dyn FrameFile>> {
        let file = File::open(frame_path(&self.root, subject, frame_number))?;
        let len = file.metadata()?.len();
        Ok(Box::new(DiskFile { file, len }))
    }

    fn exists(&self, subject: SubjectId, frame_number: u16) -> bool {
        frame_path(&self.root, subject, frame_number).is_file()
    }
}

/// In-memory card, used by tests, benches and simulators.
///
/// Records every existence check so callers can see how much of the card a
/// scan touched.
#[derive(Default)]
pub struct MemStorage {
    files: RwLock<HashMap<(SubjectId, u16), Bytes>>,
    lookups: Mutex<Vec<(SubjectId, u16)>>,
    opens: AtomicU64,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&self, subject: SubjectId, frame_number: u16, contents: impl Into<Bytes>) {
        self.files
            .write()
            .insert((subject, frame_number), contents.into());
    }

    /// Remove a file, returning its contents
    pub fn remove(&self, subject: SubjectId, frame_number: u16) -> Option<Bytes> {
        self.files.write().remove(&(subject, frame_number))
    }

    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    /// Existence checks issued so far, in order
    pub fn lookup_log(&self) -> Vec<(SubjectId, u16)> {
        self.lookups.lock().clone()
    }

    pub fn clear_lookup_log(&self) {
        self.lookups.lock().clear();
    }

    /// Number of successful and failed `open` calls
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::Relaxed)
    }
}

struct MemFile {
    reader: Reader<Bytes>,
    len: u64,
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl FrameFile for MemFile {
    fn len(&self) -> u64 {
        self.len
    }
}

impl FrameStorage for MemStorage {
    fn open(&self, subject: SubjectId, frame_number: u16) -> io::Result<Box<dyn FrameFile>> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        let contents = self
            .files
            .read()
            .get(&(subject, frame_number))
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        let len = contents.len() as u64;
        Ok(Box::new(MemFile {
            reader: contents.reader(),
            len,
        }))
    }

    fn exists(&self, subject: SubjectId, frame_number: u16) -> bool {
        self.lookups.lock().push((subject, frame_number));
        self.files.read().contains_key(&(subject, frame_number))
    }
}
