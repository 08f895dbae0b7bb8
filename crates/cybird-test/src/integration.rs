//! End-to-end scenarios
//!
//! Every scenario runs against an in-memory card (or a temp directory) with
//! the real store, controller and coordinator. Nothing is mocked except the
//! storage medium, the clock and the display.

use std::sync::Arc;
use std::time::Duration;

use cybird_core::{HeapGauge, SubjectId, SubjectInfo};
use cybird_runtime::{
    AnimationController, Coordinator, CoordinatorConfig, NoGestures, PlaybackConfig, Player,
    RecordingSink, SightingStats, SubjectRegistry,
};
use cybird_store::{FrameStore, MemStorage, MEMORY_SAFETY_MARGIN};

use crate::card::CardBuilder;

/// Info for a subject with a known frame count
pub fn subject(id: u16, frames: u8) -> SubjectInfo {
    SubjectInfo::new(SubjectId::new(id), format!("Subject {}", id), 10).with_frame_count(frames)
}

/// Heap that fits exactly one 8x8 frame plus the safety margin and a little slack
pub fn one_frame_heap() -> HeapGauge {
    HeapGauge::with_capacity(8 * 8 * 2 + MEMORY_SAFETY_MARGIN + 64)
}

/// Coordinator over `storage` with a recording sink and a fixed seed
pub fn coordinator(
    storage: Arc<MemStorage>,
    registry: SubjectRegistry,
    sightings: SightingStats,
    config: CoordinatorConfig,
) -> (RecordingSink, Coordinator) {
    let store = FrameStore::new(storage, HeapGauge::unbounded());
    let sink = RecordingSink::new();
    let player = Player::new(
        AnimationController::new(store, PlaybackConfig::default()),
        registry,
        sightings,
        Box::new(sink.clone()),
    )
    .with_seed(42);
    (sink, Coordinator::new(player, Box::new(NoGestures), config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Corruption;
    use crate::faults::FaultyStorage;
    use crate::rig::PlaybackRig;
    use cybird_core::{CybirdError, DecodeError};
    use cybird_format::{palette_color, Rgb565, PLACEHOLDER_BORDER};
    use cybird_runtime::{PacingConfig, PathsConfig, PlaybackState, RuntimeConfig, SinkCall};
    use cybird_store::{DirStorage, FrameStorage, ReadPacing};
    use proptest::prelude::*;
    use std::time::Instant;

    const MS: Duration = Duration::from_millis(1);

    fn shown_pixels(sink: &RecordingSink) -> Vec<u16> {
        sink.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::Show { first_pixel, .. } => first_pixel.map(|p| p.0),
                _ => None,
            })
            .collect()
    }

    // ========================================================================
    // Playback timing
    // ========================================================================

    #[test]
    fn test_eight_frames_wrap_after_400ms() {
        let card = CardBuilder::new().subject(1001, 8).build();
        let mut rig = PlaybackRig::new(card, HeapGauge::unbounded(), PlaybackConfig::default());

        assert_eq!(rig.start(&subject(1001, 8)).unwrap(), 8);
        assert_eq!(rig.frame_index(), Some(0));

        let drawn = rig.run_until(Duration::from_millis(400), 10 * MS);
        assert_eq!(drawn, 8);
        assert_eq!(rig.frame_index(), Some(0));

        // frame n carries pixel value n; index i is file i + 1
        assert_eq!(shown_pixels(rig.sink()), vec![1, 2, 3, 4, 5, 6, 7, 8, 1]);

        let stats = rig.controller().stats();
        assert_eq!(stats.swaps, 8);
        assert_eq!(stats.placeholders, 0);
        assert!(rig.heap().live_leases() <= 2);
    }

    #[test]
    fn test_no_frame_between_boundaries() {
        let card = CardBuilder::new().subject(1001, 4).build();
        let mut rig = PlaybackRig::new(card, HeapGauge::unbounded(), PlaybackConfig::default());
        rig.start(&subject(1001, 4)).unwrap();

        for _ in 0..4 {
            assert!(!rig.step(10 * MS));
        }
        assert!(rig.step(10 * MS));
        assert_eq!(rig.frame_index(), Some(1));
    }

    #[test]
    fn test_late_poll_collapses_missed_boundaries() {
        let card = CardBuilder::new().subject(1001, 8).build();
        let mut rig = PlaybackRig::new(card, HeapGauge::unbounded(), PlaybackConfig::default());
        rig.start(&subject(1001, 8)).unwrap();

        // 170 ms stall advances one frame, not three
        assert!(rig.step(170 * MS));
        assert_eq!(rig.frame_index(), Some(1));
    }

    // ========================================================================
    // Malformed frames
    // ========================================================================

    #[test]
    fn test_size_mismatch_rejected_without_allocation() {
        let card = CardBuilder::new()
            .subject(1001, 4)
            .corrupt(1001, 2, Corruption::SizeOff(1))
            .build();
        let heap = HeapGauge::unbounded();
        let store = FrameStore::new(card, heap.clone());

        let err = store.decode(SubjectId::new(1001), 1).unwrap_err();
        assert_eq!(
            err,
            DecodeError::SizeMismatch {
                declared: 129,
                expected: 128
            }
        );
        assert_eq!(heap.leases_granted(), 0);
        assert_eq!(heap.in_use(), 0);
    }

    #[test]
    fn test_corrupt_mid_frame_shows_placeholder_and_continues() {
        let card = CardBuilder::new()
            .subject(1001, 4)
            .corrupt(1001, 3, Corruption::BadMagic(0x00))
            .build();
        let mut rig = PlaybackRig::new(card, HeapGauge::unbounded(), PlaybackConfig::default());
        rig.start(&subject(1001, 4)).unwrap();

        rig.run_until(Duration::from_millis(150), 10 * MS);
        assert_eq!(rig.frame_index(), Some(3));
        assert_eq!(rig.controller().state(), PlaybackState::Playing);

        assert_eq!(rig.sink().fill_count(), 1);
        let fill = rig
            .sink()
            .calls()
            .into_iter()
            .find(|c| matches!(c, SinkCall::Fill { .. }));
        match fill {
            Some(SinkCall::Fill { color, border, .. }) => {
                assert_eq!(color, palette_color(SubjectId::new(1001).palette_index()));
                assert_eq!(border, Rgb565::from_hex(PLACEHOLDER_BORDER));
            }
            other => panic!("expected a fill, got {:?}", other),
        }
        assert_eq!(shown_pixels(rig.sink()), vec![1, 2, 4]);
        // windows of 40, 30 and 20 ms before the bad boundary all failed
        assert!(!rig.controller().policy().is_enabled());
        assert_eq!(rig.controller().stats().prefetch_failures, 3);
    }

    #[test]
    fn test_bad_first_frame_refuses_to_start() {
        let card = CardBuilder::new()
            .subject(1001, 4)
            .corrupt(1001, 1, Corruption::BadFormat(0x04))
            .build();
        let mut rig = PlaybackRig::new(card, HeapGauge::unbounded(), PlaybackConfig::default());

        let err = rig.start(&subject(1001, 4)).unwrap_err();
        assert!(matches!(err, CybirdError::FirstFrame(DecodeError::BadFormat(0x04))));
        assert_eq!(rig.controller().state(), PlaybackState::Idle);
        assert!(!rig.controller().timer().is_armed());
        assert_eq!(rig.heap().live_leases(), 0);
        assert!(rig.sink().calls().is_empty());
    }

    #[test]
    fn test_truncated_file_rejected_before_header() {
        let card = CardBuilder::new()
            .subject(1001, 2)
            .corrupt(1001, 2, Corruption::Truncate(20))
            .build();
        let store = FrameStore::new(card, HeapGauge::unbounded());
        assert_eq!(
            store.decode(SubjectId::new(1001), 1).unwrap_err(),
            DecodeError::Truncated { len: 20 }
        );
    }

    // ========================================================================
    // Frame-count discovery
    // ========================================================================

    #[test]
    fn test_discovers_24_frames() {
        let card = CardBuilder::new().subject(1003, 24).build();
        let store = FrameStore::new(card.clone(), HeapGauge::unbounded());

        assert_eq!(store.discover_frame_count(SubjectId::new(1003)), 24);
        let lookups = card.lookup_log();
        assert!(lookups.iter().all(|&(_, n)| n <= 25));
        assert!(lookups.contains(&(SubjectId::new(1003), 25)));
    }

    #[test]
    fn test_load_discovers_when_count_unknown() {
        let card = CardBuilder::new().subject(1003, 24).build();
        let mut rig = PlaybackRig::new(card, HeapGauge::unbounded(), PlaybackConfig::default());

        assert_eq!(rig.start(&subject(1003, 0)).unwrap(), 24);
        rig.run_until(Duration::from_millis(24 * 50), 10 * MS);
        assert_eq!(rig.frame_index(), Some(0));
    }

    #[test]
    fn test_subject_without_files_is_empty() {
        let card = CardBuilder::new().subject(1001, 4).build();
        let mut rig = PlaybackRig::new(card, HeapGauge::unbounded(), PlaybackConfig::default());

        assert!(matches!(
            rig.start(&subject(1009, 0)),
            Err(CybirdError::EmptySubject(_))
        ));
        assert_eq!(rig.controller().state(), PlaybackState::Idle);
    }

    // ========================================================================
    // Memory pressure and the prefetch policy
    // ========================================================================

    #[test]
    fn test_prefetch_disabled_after_three_oom_then_inline_succeeds() {
        let card = CardBuilder::new().subject(1001, 4).build();
        let config = PlaybackConfig {
            timer_period: 5 * MS,
            ..PlaybackConfig::default()
        };
        let mut rig = PlaybackRig::new(card, one_frame_heap(), config);
        rig.start(&subject(1001, 4)).unwrap();

        // windows of 45, 40 and 35 ms all fail while frame 0 is held
        for _ in 0..3 {
            assert!(!rig.step(5 * MS));
        }
        assert!(!rig.controller().policy().is_enabled());
        assert_eq!(rig.controller().stats().prefetch_failures, 3);

        rig.run_until(Duration::from_millis(50), 5 * MS);
        assert_eq!(rig.frame_index(), Some(1));
        assert!(!rig.controller().policy().is_enabled());
        assert_eq!(rig.sink().fill_count(), 0);
        assert_eq!(shown_pixels(rig.sink()), vec![1, 2]);
        assert_eq!(rig.controller().stats().prefetch_attempts, 3);

        rig.run_until(Duration::from_millis(200), 5 * MS);
        assert_eq!(rig.frame_index(), Some(0));
        assert_eq!(rig.heap().live_leases(), 1);
    }

    #[test]
    fn test_reload_reenables_prefetch() {
        let card = CardBuilder::new().subject(1001, 4).build();
        let config = PlaybackConfig {
            timer_period: 5 * MS,
            ..PlaybackConfig::default()
        };
        let mut rig = PlaybackRig::new(card, one_frame_heap(), config);
        rig.start(&subject(1001, 4)).unwrap();
        rig.run_until(Duration::from_millis(20), 5 * MS);
        assert!(!rig.controller().policy().is_enabled());

        rig.start(&subject(1001, 4)).unwrap();
        assert!(rig.controller().policy().is_enabled());
        assert_eq!(rig.controller().policy().consecutive_failures(), 0);
    }

    #[test]
    fn test_switching_subject_releases_buffers() {
        let card = CardBuilder::new().subject(1001, 4).subject(1002, 4).build();
        let mut rig = PlaybackRig::new(card, HeapGauge::unbounded(), PlaybackConfig::default());
        rig.start(&subject(1001, 4)).unwrap();
        rig.run_until(Duration::from_millis(20), 10 * MS);
        assert_eq!(rig.heap().live_leases(), 2);

        rig.start(&subject(1002, 4)).unwrap();
        assert_eq!(rig.heap().live_leases(), 1);
        assert_eq!(rig.controller().current_subject(), Some(SubjectId::new(1002)));

        assert!(rig.stop());
        assert_eq!(rig.heap().live_leases(), 0);
        assert_eq!(rig.heap().leases_granted(), rig.heap().leases_released());
    }

    // ========================================================================
    // Directory-backed storage
    // ========================================================================

    #[test]
    fn test_directory_card_plays_with_paced_reads() {
        let dir = tempfile::tempdir().unwrap();
        CardBuilder::new()
            .dimensions(64, 64)
            .subject(1001, 16)
            .write_to(dir.path())
            .unwrap();

        let pacing = ReadPacing {
            chunk_size: 1024,
            yield_every_bytes: 2048,
            max_busy: Duration::from_secs(1),
        };
        let storage: Arc<dyn FrameStorage> = Arc::new(DirStorage::new(dir.path()));
        let mut rig = PlaybackRig::with_pacing(
            storage,
            HeapGauge::unbounded(),
            PlaybackConfig::default(),
            pacing,
        );

        assert_eq!(rig.start(&subject(1001, 0)).unwrap(), 16);
        // 8192-byte payload in 1 KiB chunks yields every 2 KiB
        assert!(rig.yields() >= 3);

        rig.run_until(Duration::from_millis(100), 10 * MS);
        assert_eq!(rig.frame_index(), Some(2));
        assert_eq!(shown_pixels(rig.sink()), vec![1, 2, 3]);
    }

    // ========================================================================
    // Fault injection
    // ========================================================================

    #[test]
    fn test_open_failures_degrade_to_placeholders() {
        let card = CardBuilder::new().subject(1001, 4).build();
        let faulty = Arc::new(FaultyStorage::new(card));
        let mut rig = PlaybackRig::new(
            faulty.clone(),
            HeapGauge::unbounded(),
            PlaybackConfig::default(),
        );
        rig.start(&subject(1001, 4)).unwrap();

        faulty.break_frame(SubjectId::new(1001), 2);
        rig.run_until(Duration::from_millis(50), 10 * MS);
        assert_eq!(rig.sink().fill_count(), 1);
        // prefetch at 40, 30 and 20 ms left failed; the inline failure does not count
        assert_eq!(rig.controller().policy().consecutive_failures(), 3);
        assert!(!rig.controller().policy().is_enabled());

        faulty.heal();
        rig.run_until(Duration::from_millis(100), 10 * MS);
        // inline success leaves prefetching off until the next load
        assert_eq!(rig.controller().policy().consecutive_failures(), 3);
        assert_eq!(rig.controller().stats().prefetch_attempts, 3);
        assert_eq!(rig.frame_index(), Some(2));
        assert_eq!(shown_pixels(rig.sink()), vec![1, 3]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_flaky_card_never_leaks(seed in any::<u64>(), rate in 0.0f64..0.6) {
            let card = CardBuilder::new().subject(1001, 6).build();
            let faulty = Arc::new(FaultyStorage::new(card).with_failure_rate(rate, seed));
            let heap = HeapGauge::unbounded();
            let mut rig = PlaybackRig::new(faulty, heap.clone(), PlaybackConfig::default());

            if rig.start(&subject(1001, 6)).is_ok() {
                for _ in 0..120 {
                    rig.step(10 * MS);
                    prop_assert!(heap.live_leases() <= 2);
                    prop_assert!(rig.frame_index().unwrap_or(0) < 6);
                    let policy = rig.controller().policy();
                    prop_assert!(policy.is_enabled() || policy.consecutive_failures() >= 3);
                }
                prop_assert_eq!(rig.controller().stats().frames_shown
                    + rig.controller().stats().placeholders, 1 + 24);
            }

            rig.stop();
            prop_assert_eq!(heap.live_leases(), 0);
            prop_assert_eq!(heap.leases_granted(), heap.leases_released());
        }
    }

    // ========================================================================
    // Coordinator
    // ========================================================================

    const CSV: &str = "id,name,weight,frames\n\
                       1001,Common Kingfisher,50,8\n\
                       1002,\"Fork-tailed Sunbird\",30\n";

    fn registry_card() -> Arc<MemStorage> {
        CardBuilder::new().subject(1001, 8).subject(1002, 12).build()
    }

    #[test]
    fn test_coordinator_stepped_playback() {
        let registry = SubjectRegistry::parse_csv(CSV);
        let (sink, mut coord) = coordinator(
            registry_card(),
            registry,
            SightingStats::new(),
            CoordinatorConfig::default(),
        );
        let handle = coord.handle();
        handle.trigger_subject(SubjectId::new(1002)).unwrap();

        let t0 = Instant::now();
        coord.worker_step(t0);
        for i in 0..=100u64 {
            coord.render_step(t0 + Duration::from_millis(i * 5));
        }

        let stats = handle.stats();
        assert_eq!(stats.triggers_applied, 1);
        assert_eq!(stats.frames_drawn, 10);
        assert_eq!(sink.show_count(), 11);

        // discovered count cached in the registry
        let frames = handle
            .inspect(|p| p.registry().get(SubjectId::new(1002)).map(|s| s.frame_count))
            .unwrap();
        assert_eq!(frames, Some(12));
        let seen = handle
            .inspect(|p| p.sightings().get(SubjectId::new(1002)).map(|r| r.encounter_count))
            .unwrap();
        assert_eq!(seen, Some(1));
    }

    #[test]
    fn test_stop_command_clears_display() {
        let (sink, mut coord) = coordinator(
            registry_card(),
            SubjectRegistry::parse_csv(CSV),
            SightingStats::new(),
            CoordinatorConfig::default(),
        );
        let handle = coord.handle();
        let t0 = Instant::now();

        handle.trigger_subject(SubjectId::new(1001)).unwrap();
        coord.render_step(t0);
        handle.stop_playback().unwrap();
        coord.worker_step(t0);
        coord.render_step(t0 + 5 * MS);

        assert_eq!(sink.last(), Some(SinkCall::Clear));
        let state = handle.inspect(|p| p.controller().state()).unwrap();
        assert_eq!(state, PlaybackState::Idle);
    }

    #[test]
    fn test_threaded_run_persists_sightings() {
        let dir = tempfile::tempdir().unwrap();
        let stats_path = dir.path().join("data").join("bird_stats.json");
        let (sink, coord) = coordinator(
            registry_card(),
            SubjectRegistry::parse_csv(CSV),
            SightingStats::open(&stats_path),
            CoordinatorConfig::default(),
        );

        let threads = coord.spawn().unwrap();
        let handle = threads.handle();
        std::thread::sleep(Duration::from_millis(50));
        handle.trigger_subject(SubjectId::new(1001)).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        let stats = threads.shutdown().unwrap();
        assert!(stats.triggers_applied >= 1);
        assert!(stats.render_ticks > 0 && stats.worker_ticks > 0);
        assert!(sink.show_count() >= 2);

        let saved = SightingStats::open(&stats_path);
        assert!(saved.total_encounters() >= 1);
    }

    #[test]
    fn test_coordinator_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        CardBuilder::new()
            .subject(1001, 8)
            .subject(1002, 12)
            .write_to(&root.join("birds"))
            .unwrap();
        std::fs::create_dir_all(root.join("configs")).unwrap();
        std::fs::write(root.join("configs").join("bird_config.csv"), CSV).unwrap();

        let config = RuntimeConfig {
            read_pacing: PacingConfig {
                chunk_size: 64,
                ..PacingConfig::default()
            },
            paths: PathsConfig {
                subjects_root: root.join("birds"),
                registry: root.join("configs").join("bird_config.csv"),
                stats: root.join("data").join("bird_stats.json"),
            },
            ..RuntimeConfig::default()
        };
        let config_path = root.join("cybird.json");
        std::fs::write(&config_path, config.to_json().unwrap()).unwrap();
        let config = RuntimeConfig::load(&config_path).unwrap();

        let sink = RecordingSink::new();
        let mut coord =
            Coordinator::from_config(&config, Box::new(sink.clone()), Box::new(NoGestures))
                .unwrap();
        let handle = coord.handle();

        // 1002 has no count in the CSV, so it is scanned from the card up front
        let frames = handle
            .inspect(|p| p.registry().get(SubjectId::new(1002)).map(|s| s.frame_count))
            .unwrap();
        assert_eq!(frames, Some(12));
        let chunk = handle.inspect(|p| p.controller().store().pacing().chunk_size).unwrap();
        assert_eq!(chunk, 64);

        handle.trigger_subject(SubjectId::new(1002)).unwrap();
        let t0 = Instant::now();
        coord.worker_step(t0);
        for i in 0..=100u64 {
            coord.render_step(t0 + Duration::from_millis(i * 5));
        }
        assert_eq!(handle.stats().frames_drawn, 10);
        assert_eq!(sink.show_count(), 11);

        handle.inspect(|p| p.save_stats()).unwrap().unwrap();
        let saved = SightingStats::open(&config.paths.stats);
        assert_eq!(saved.get(SubjectId::new(1002)).map(|r| r.encounter_count), Some(1));
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let mut config = RuntimeConfig::default();
        config.playback.frame_interval = Duration::ZERO;

        let result = Coordinator::from_config(
            &config,
            Box::new(RecordingSink::new()),
            Box::new(NoGestures),
        );
        assert!(matches!(result, Err(CybirdError::InvalidConfig(_))));
    }
}
