#![no_main]

use libfuzzer_sys::fuzz_target;
use pipesink_core::config::TriggerConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = toml::from_str::<TriggerConfig>(text) else {
        return;
    };
    let encoded = toml::to_string(&config).expect("serialize parsed config");
    let decoded: TriggerConfig = toml::from_str(&encoded).expect("reparse serialized config");
    assert_eq!(config, decoded);
});
