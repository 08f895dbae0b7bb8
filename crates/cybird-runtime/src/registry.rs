//! Subject registry
//!
//! Loaded from a small CSV on the card:
//!
//! ```text
//! id,name,weight[,frames]
//! 1001,"Common Kingfisher",50
//! 1002,Fork-tailed Sunbird,30,24
//! ```
//!
//! The first non-blank line is a header. Rows with id 0, an empty name or a
//! zero weight are skipped. When the file is missing, oversized or yields no
//! usable rows, the built-in defaults are used.

use std::io::ErrorKind;
use std::path::Path;

use cybird_core::{CybirdError, CybirdResult, SubjectId, SubjectInfo};
use cybird_store::FrameStore;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use tracing::{debug, info, warn};

/// Registry files larger than this are rejected
pub const MAX_REGISTRY_BYTES: u64 = 8 * 1024;

/// Selectable subjects
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubjectRegistry {
    subjects: Vec<SubjectInfo>,
}

impl SubjectRegistry {
    pub fn new(subjects: Vec<SubjectInfo>) -> Self {
        SubjectRegistry { subjects }
    }

    /// Built-in fallback list
    pub fn defaults() -> Self {
        SubjectRegistry::new(vec![
            SubjectInfo::new(SubjectId::new(1001), "Common Kingfisher", 50),
            SubjectInfo::new(SubjectId::new(1002), "Fork-tailed Sunbird", 30),
        ])
    }

    /// Parse CSV text. Malformed rows are skipped.
    pub fn parse_csv(text: &str) -> Self {
        let mut subjects = Vec::new();
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        // header
        lines.next();

        for line in lines {
            match parse_row(line) {
                Some(info) => subjects.push(info),
                None => warn!(row = line, "skipping invalid registry row"),
            }
        }
        SubjectRegistry { subjects }
    }

    /// Read the registry file, falling back to [`defaults`](Self::defaults)
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(registry) if !registry.is_empty() => {
                info!(path = %path.display(), subjects = registry.len(), "registry loaded");
                registry
            }
            Ok(_) => {
                warn!(path = %path.display(), "registry has no usable rows, using defaults");
                Self::defaults()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "registry unavailable, using defaults");
                Self::defaults()
            }
        }
    }

    /// Read and parse the registry file
    pub fn load(path: impl AsRef<Path>) -> CybirdResult<Self> {
        let path = path.as_ref();
        let len = std::fs::metadata(path)?.len();
        if len == 0 || len > MAX_REGISTRY_BYTES {
            return Err(CybirdError::InvalidConfig(format!(
                "registry size {} outside 1..={} bytes",
                len, MAX_REGISTRY_BYTES
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => CybirdError::Serialization(e.to_string()),
            _ => CybirdError::Storage(e),
        })?;
        Ok(Self::parse_csv(&text))
    }

    pub fn subjects(&self) -> &[SubjectInfo] {
        &self.subjects
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn get(&self, id: SubjectId) -> Option<&SubjectInfo> {
        self.subjects.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: SubjectId) -> bool {
        self.get(id).is_some()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SubjectInfo> {
        self.subjects.iter().find(|s| s.name == name)
    }

    /// Cache a discovered frame count
    pub fn set_frame_count(&mut self, id: SubjectId, frame_count: u8) -> bool {
        match self.subjects.iter_mut().find(|s| s.id == id) {
            Some(info) => {
                info.frame_count = frame_count;
                true
            }
            None => false,
        }
    }

    /// Discover and cache frame counts for every subject without one
    pub fn scan_frame_counts(&mut self, store: &FrameStore) {
        for info in self.subjects.iter_mut().filter(|s| s.needs_discovery()) {
            info.frame_count = store.discover_frame_count(info.id);
            info!(subject = %info.id, name = %info.name, frames = info.frame_count, "subject scanned");
        }
    }

    /// Pick a subject with probability proportional to its weight
    pub fn pick_weighted<R: Rng + ?Sized>(&self, rng: &mut R) -> CybirdResult<&SubjectInfo> {
        let first = self.subjects.first().ok_or(CybirdError::EmptyRegistry)?;
        match WeightedIndex::new(self.subjects.iter().map(|s| s.weight)) {
            Ok(dist) => Ok(&self.subjects[dist.sample(rng)]),
            Err(e) => {
                debug!(error = %e, "weighted selection unavailable, using first subject");
                Ok(first)
            }
        }
    }

    /// Resolve a trigger target: the given id if registered, or a weighted pick
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        target: Option<SubjectId>,
        rng: &mut R,
    ) -> CybirdResult<&SubjectInfo> {
        match target {
            Some(id) => self.get(id).ok_or(CybirdError::UnknownSubject(id)),
            None => self.pick_weighted(rng),
        }
    }
}

fn parse_row(line: &str) -> Option<SubjectInfo> {
    let (id, rest) = line.split_once(',')?;
    let id: u16 = id.trim().parse().ok()?;

    let rest = rest.trim_start();
    let (name, rest) = match rest.strip_prefix('"') {
        Some(quoted) => {
            let end = quoted.find('"')?;
            let after = quoted[end + 1..].trim_start();
            (&quoted[..end], after.strip_prefix(',').unwrap_or(after))
        }
        None => match rest.split_once(',') {
            Some((name, rest)) => (name, rest),
            None => (rest, ""),
        },
    };
    let name = name.trim();

    let mut fields = rest.split(',').map(str::trim);
    let weight: u16 = fields.next()?.parse().ok()?;
    let frame_count: u8 = match fields.next() {
        Some(f) if !f.is_empty() => f.parse().ok()?,
        _ => 0,
    };

    if id == 0 || name.is_empty() || weight == 0 {
        return None;
    }
    Some(SubjectInfo::new(SubjectId::new(id), name, weight).with_frame_count(frame_count))
}
