//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use lxdview_config::AppConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = AppConfig::parse(s) {
        assert!(config.lxd.refresh_interval().as_secs() >= 1);
        let rendered = config.to_toml().expect("valid config renders");
        assert!(AppConfig::parse(&rendered).is_ok());
    }
});
