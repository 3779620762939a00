#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use probr_core::audit::{AuditResult, ProbeAudit};

/// 감사 트리에 적용할 연산
#[derive(Arbitrary, Debug)]
enum Op {
    /// 이름으로 시나리오 조회 또는 생성
    Scenario(String),
    /// 항상 새 시나리오 시작
    BeginScenario(String),
    /// 기존 시나리오(인덱스는 나머지 연산)에 스텝 기록
    RecordStep {
        scenario: u8,
        name: String,
        failed: bool,
    },
}

fuzz_target!(|ops: Vec<Op>| {
    let mut audit = ProbeAudit::new("fuzz");
    let mut ids = Vec::new();

    // 연산 수를 64개로 제한
    for op in ops.into_iter().take(64) {
        match op {
            Op::Scenario(name) => ids.push(audit.scenario(&name)),
            Op::BeginScenario(name) => ids.push(audit.begin_scenario(&name, Vec::new())),
            Op::RecordStep {
                scenario,
                name,
                failed,
            } => {
                if ids.is_empty() {
                    continue;
                }
                let id = ids[usize::from(scenario) % ids.len()];
                let error = failed.then(|| "fuzz failure".to_owned());
                audit.record_step(id, &name, "", serde_json::Value::Null, error);
            }
        }
    }

    // 상향식 재계산 결과는 스텝 실패 여부와 일치해야 함
    let attempted = audit.scenarios_attempted();
    assert_eq!(
        attempted,
        audit.scenarios_succeeded() + audit.scenarios_failed()
            + audit
                .scenarios
                .values()
                .filter(|s| s.result == AuditResult::NotRun)
                .count()
    );
    if audit.failed_steps() > 0 {
        assert_eq!(audit.result, AuditResult::Failed);
    }
});
