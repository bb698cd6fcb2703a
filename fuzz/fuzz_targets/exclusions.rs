#![no_main]

use libfuzzer_sys::fuzz_target;
use pipesink_core::config::{TriggerConfig, split_exclusions};

// Input layout: "<raw exclusions>\n<old>\n<new>".
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut parts = text.splitn(3, '\n');
    let raw = parts.next().unwrap_or_default();
    let old = parts.next().unwrap_or_default().trim();
    let new = parts.next().unwrap_or_default().trim();
    if new.contains(',') {
        return;
    }

    // A rewritten list is always canonical and never mentions the old name.
    let mut renamed = TriggerConfig::new("Root", "Sink", raw);
    renamed.on_job_renamed(old, new);
    if renamed.excluded_project_names != raw {
        let tokens = split_exclusions(&renamed.excluded_project_names);
        assert_eq!(tokens.join(","), renamed.excluded_project_names);
        assert!(tokens.iter().all(|t| t != old));
    }

    // Deletion either leaves the raw string alone or removes every match.
    let mut deleted = TriggerConfig::new("Root", "Sink", raw);
    if deleted.on_job_deleted(old) {
        let tokens = deleted.exclusions();
        assert_eq!(tokens.join(","), deleted.excluded_project_names);
        assert!(tokens.iter().all(|t| t != old));
    } else {
        assert_eq!(deleted.excluded_project_names, raw);
    }
});
