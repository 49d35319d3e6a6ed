//! Fuzz target for instance resource URI parsing.
//!
//! Run with: cargo +nightly fuzz run fuzz_resource_uri

#![no_main]

use libfuzzer_sys::fuzz_target;
use lxdview_core::InstanceIdentifier;

fuzz_target!(|data: &[u8]| {
    let Ok(uri) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(id) = InstanceIdentifier::from_resource_uri(uri) {
        assert!(!id.name.is_empty());
        assert!(!id.name.contains('/'));
    }
});
