//! Sighting statistics
//!
//! Counts how often each subject has been shown, persisted as JSON. The file
//! is rewritten every [`SAVE_EVERY`] encounters and on demand.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use cybird_core::{CybirdError, CybirdResult, SubjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Encounters between automatic saves
pub const SAVE_EVERY: u64 = 10;

/// Per-subject record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SightingRecord {
    pub id: SubjectId,
    pub name: String,
    pub encounter_count: u32,
    /// Unix seconds
    pub first_seen: u64,
    /// Unix seconds
    pub last_seen: u64,
}

#[derive(Serialize, Deserialize)]
struct StatsFile {
    total_encounters: u64,
    subjects: Vec<SightingRecord>,
}

/// Encounter counts for every subject seen so far
#[derive(Clone, Debug, Default)]
pub struct SightingStats {
    records: BTreeMap<SubjectId, SightingRecord>,
    total_encounters: u64,
    path: Option<PathBuf>,
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl SightingStats {
    /// In-memory statistics, never persisted
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics backed by `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut stats = match Self::read(&path) {
            Ok(stats) => {
                info!(path = %path.display(), total = stats.total_encounters, "sighting stats loaded");
                stats
            }
            Err(CybirdError::Storage(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no sighting stats yet, starting empty");
                Self::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "sighting stats unreadable, starting empty");
                Self::new()
            }
        };
        stats.path = Some(path);
        stats
    }

    fn read(path: &Path) -> CybirdResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> CybirdResult<Self> {
        let file: StatsFile =
            serde_json::from_str(text).map_err(|e| CybirdError::Serialization(e.to_string()))?;
        Ok(SightingStats {
            records: file.subjects.into_iter().map(|r| (r.id, r)).collect(),
            total_encounters: file.total_encounters,
            path: None,
        })
    }

    pub fn to_json(&self) -> CybirdResult<String> {
        let file = StatsFile {
            total_encounters: self.total_encounters,
            subjects: self.records.values().cloned().collect(),
        };
        serde_json::to_string_pretty(&file).map_err(|e| CybirdError::Serialization(e.to_string()))
    }

    /// Count one encounter at `now` (unix seconds).
    ///
    /// Saves automatically every [`SAVE_EVERY`] encounters; a failed save is
    /// logged and retried at the next interval.
    pub fn record(&mut self, id: SubjectId, name: &str, now: u64) {
        let record = self.records.entry(id).or_insert_with(|| SightingRecord {
            id,
            name: name.to_string(),
            encounter_count: 0,
            first_seen: now,
            last_seen: now,
        });
        record.encounter_count = record.encounter_count.saturating_add(1);
        record.last_seen = now;
        self.total_encounters += 1;
        debug!(subject = %id, count = record.encounter_count, "sighting recorded");

        if self.total_encounters % SAVE_EVERY == 0 && self.path.is_some() {
            if let Err(e) = self.save() {
                warn!(error = %e, "failed to save sighting stats");
            }
        }
    }

    /// Write to the backing file
    pub fn save(&self) -> CybirdResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        debug!(path = %path.display(), "sighting stats saved");
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, id: SubjectId) -> Option<&SightingRecord> {
        self.records.get(&id)
    }

    pub fn records(&self) -> impl Iterator<Item = &SightingRecord> {
        self.records.values()
    }

    pub fn total_encounters(&self) -> u64 {
        self.total_encounters
    }

    /// Distinct subjects seen
    pub fn species_seen(&self) -> usize {
        self.records.len()
    }

    /// Highest encounter count; ties go to the lowest id
    pub fn most_seen(&self) -> Option<&SightingRecord> {
        self.records
            .values()
            .fold(None, |best: Option<&SightingRecord>, r| match best {
                Some(b) if b.encounter_count >= r.encounter_count => Some(b),
                _ => Some(r),
            })
    }

    /// Lowest non-zero encounter count; ties go to the lowest id
    pub fn rarest(&self) -> Option<&SightingRecord> {
        self.records
            .values()
            .filter(|r| r.encounter_count > 0)
            .fold(None, |best: Option<&SightingRecord>, r| match best {
                Some(b) if b.encounter_count <= r.encounter_count => Some(b),
                _ => Some(r),
            })
    }

    /// Share of `total_species` seen at least once, in percent
    pub fn progress(&self, total_species: usize) -> f32 {
        if total_species == 0 {
            return 0.0;
        }
        self.records.len() as f32 / total_species as f32 * 100.0
    }

    /// Drop all records
    pub fn reset(&mut self) {
        self.records.clear();
        self.total_encounters = 0;
    }

    /// Emit a summary at info level
    pub fn log_summary(&self, total_species: usize) {
        info!(
            total = self.total_encounters,
            seen = self.species_seen(),
            progress_pct = self.progress(total_species) as f64,
            most_seen = self.most_seen().map(|r| r.name.as_str()).unwrap_or("-"),
            rarest = self.rarest().map(|r| r.name.as_str()).unwrap_or("-"),
            "sighting stats"
        );
        for record in self.records.values() {
            info!(subject = %record.id, name = %record.name, count = record.encounter_count, "  sighting");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tracks_first_and_last_seen() {
        let mut stats = SightingStats::new();
        stats.record(SubjectId::new(1001), "Common Kingfisher", 100);
        stats.record(SubjectId::new(1001), "Common Kingfisher", 250);

        let record = stats.get(SubjectId::new(1001)).unwrap();
        assert_eq!(record.encounter_count, 2);
        assert_eq!(record.first_seen, 100);
        assert_eq!(record.last_seen, 250);
        assert_eq!(stats.total_encounters(), 2);
    }

    #[test]
    fn test_queries() {
        let mut stats = SightingStats::new();
        for _ in 0..3 {
            stats.record(SubjectId::new(1), "a", 1);
        }
        stats.record(SubjectId::new(2), "b", 1);
        for _ in 0..2 {
            stats.record(SubjectId::new(3), "c", 1);
        }

        assert_eq!(stats.most_seen().map(|r| r.id), Some(SubjectId::new(1)));
        assert_eq!(stats.rarest().map(|r| r.id), Some(SubjectId::new(2)));
        assert_eq!(stats.progress(4), 75.0);
        assert_eq!(stats.progress(0), 0.0);
    }

    #[test]
    fn test_autosave_every_ten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("bird_stats.json");
        let mut stats = SightingStats::open(&path);

        for i in 0..9 {
            stats.record(SubjectId::new(1001), "Common Kingfisher", i);
        }
        assert!(!path.exists());

        stats.record(SubjectId::new(1002), "Fork-tailed Sunbird", 9);
        assert!(path.exists());

        let reloaded = SightingStats::open(&path);
        assert_eq!(reloaded.total_encounters(), 10);
        assert_eq!(reloaded.get(SubjectId::new(1001)).unwrap().encounter_count, 9);
        assert_eq!(reloaded.get(SubjectId::new(1002)).unwrap().name, "Fork-tailed Sunbird");
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bird_stats.json");
        std::fs::write(&path, "{ not json").unwrap();

        let stats = SightingStats::open(&path);
        assert_eq!(stats.total_encounters(), 0);
        assert_eq!(stats.path(), Some(path.as_path()));
    }

    #[test]
    fn test_json_shape() {
        let mut stats = SightingStats::new();
        stats.record(SubjectId::new(1001), "Common Kingfisher", 42);
        let json: serde_json::Value = serde_json::from_str(&stats.to_json().unwrap()).unwrap();
        assert_eq!(json["total_encounters"], 1);
        assert_eq!(json["subjects"][0]["id"], 1001);
        assert_eq!(json["subjects"][0]["first_seen"], 42);
    }
}
