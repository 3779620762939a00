#![no_main]

use libfuzzer_sys::fuzz_target;
use probr_core::audit::ProbeAudit;
use probr_core::exclusion::ExclusionPolicy;
use probr_service_packs::cucumber;

fuzz_target!(|data: &[u8]| {
    let Ok(features) = cucumber::parse_report("fuzz", data) else {
        return;
    };

    let mut audit = ProbeAudit::new("fuzz");
    let stats = cucumber::ingest(&mut audit, &features, &ExclusionPolicy::new());

    assert_eq!(stats.scenarios, audit.scenarios_attempted());
    assert_eq!(stats.failed_steps, audit.failed_steps());
    assert!(serde_json::to_vec(&audit).is_ok());
});
