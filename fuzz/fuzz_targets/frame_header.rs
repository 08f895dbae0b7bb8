#![no_main]

use cybird_format::{FrameHeader, HEADER_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = FrameHeader::parse(data) {
        // Parsing is total over 24 bytes and re-encodes losslessly
        assert_eq!(header.to_bytes()[..], data[..HEADER_SIZE]);
        if header.validate().is_ok() {
            assert_eq!(header.data_size as u64, header.expected_data_size());
        }
    }
});
