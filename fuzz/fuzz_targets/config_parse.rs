#![no_main]

use libfuzzer_sys::fuzz_target;
use probr_core::config::ProbrConfig;
use probr_core::types::ProbeDescriptor;
use probr_service_packs::catalog;

fuzz_target!(|data: &[u8]| {
    // TOML 파서는 &str을 받으므로 UTF-8 변환 필요
    let Ok(toml_str) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = ProbrConfig::parse(toml_str) else {
        return;
    };
    let _ = config.validate();

    // 임의의 설정으로 만든 정책도 모든 카탈로그 프로브에 대해 패닉 없이 판정해야 함
    let policy = probr_service_packs::policy_from_config(&config);
    for probe in catalog::all() {
        let descriptor: ProbeDescriptor = probe.descriptor();
        let _ = policy.is_excluded(&descriptor);
        let _ = policy.runner_tag_expression(&config.runner.tags, probe.name);
    }
});
