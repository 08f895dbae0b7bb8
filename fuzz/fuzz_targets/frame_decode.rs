#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use cybird_core::{HeapGauge, SubjectId};
use cybird_store::{FrameStore, MemStorage};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    heap_capacity: u16,
    file: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let storage = MemStorage::new();
    storage.insert(SubjectId::new(1001), 1, input.file);
    let heap = HeapGauge::with_capacity(input.heap_capacity as usize * 4);
    let store = FrameStore::new(Arc::new(storage), heap.clone());

    match store.decode(SubjectId::new(1001), 0) {
        Ok(frame) => {
            assert_eq!(frame.pixels().len(), frame.data_size() as usize);
            assert_eq!(heap.live_leases(), 1);
        }
        Err(_) => assert_eq!(heap.live_leases(), 0),
    }
    assert_eq!(heap.live_leases(), 0);
});
