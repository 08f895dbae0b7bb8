#![no_main]

use cybird_runtime::SubjectRegistry;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|text: &str| {
    let registry = SubjectRegistry::parse_csv(text);
    for subject in registry.subjects() {
        assert!(subject.id.is_valid());
        assert!(subject.weight > 0);
        assert!(!subject.name.is_empty());
    }
});
