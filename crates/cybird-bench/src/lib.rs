//! Cybird Bench - Shared fixtures for the criterion suites

use std::sync::Arc;

use cybird_core::{HeapGauge, SubjectId};
use cybird_format::{encode_frame, FrameHeader};
use cybird_store::{FrameStore, MemStorage};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Full-panel frame size
pub const PANEL: (u16, u16) = (240, 240);

/// Frame file with random pixel data
pub fn random_frame(width: u16, height: u16, rng: &mut impl RngCore) -> Vec<u8> {
    let header = FrameHeader::rgb565(width, height);
    let mut payload = vec![0u8; header.data_size as usize];
    rng.fill_bytes(&mut payload);
    encode_frame(&header, &payload).to_vec()
}

/// In-memory card with `frames` random frames for each subject
pub fn synthetic_card(subjects: &[u16], frames: u16, width: u16, height: u16) -> Arc<MemStorage> {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let storage = MemStorage::new();
    for &id in subjects {
        for n in 1..=frames {
            storage.insert(SubjectId::new(id), n, random_frame(width, height, &mut rng));
        }
    }
    Arc::new(storage)
}

/// Store over a synthetic card with an unbounded heap
pub fn synthetic_store(subjects: &[u16], frames: u16, width: u16, height: u16) -> FrameStore {
    FrameStore::new(
        synthetic_card(subjects, frames, width, height),
        HeapGauge::unbounded(),
    )
}
