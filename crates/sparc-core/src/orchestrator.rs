use crate::artifact::ArtifactData;
use crate::error::{Result, SparcError};
use crate::evaluator::evaluate;
use crate::gate::{Gate, GateResult};
use crate::hook::PhaseObserver;
use crate::registry::GateRegistry;
use crate::store::{RecordKey, ResultStore, StoredResult};
use crate::types::{Phase, PhaseStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// PhaseResult
// ---------------------------------------------------------------------------

/// Outcome of one phase run. Never mutated after creation; a re-run produces
/// a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: Phase,
    pub artifact: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub total_gates: usize,
    pub passed_gates: usize,
    /// One entry per gate, in registry order.
    pub results: Vec<GateResult>,
    pub failed_gates: Vec<String>,
    pub critical_failures: Vec<String>,
    pub overall_status: PhaseStatus,
}

impl PhaseResult {
    pub fn from_results(phase: Phase, artifact: PathBuf, results: Vec<GateResult>) -> Self {
        let failed_gates: Vec<String> = results
            .iter()
            .filter(|r| !r.passed())
            .map(|r| r.gate_id.clone())
            .collect();
        let critical_failures: Vec<String> = results
            .iter()
            .filter(|r| r.is_critical_failure())
            .map(|r| r.gate_id.clone())
            .collect();
        let overall_status = if !critical_failures.is_empty() {
            PhaseStatus::CriticalFailure
        } else if !failed_gates.is_empty() {
            PhaseStatus::PartialFailure
        } else {
            PhaseStatus::Passed
        };
        Self {
            phase,
            artifact,
            timestamp: Utc::now(),
            total_gates: results.len(),
            passed_gates: results.len() - failed_gates.len(),
            results,
            failed_gates,
            critical_failures,
            overall_status,
        }
    }

    pub fn gate_result(&self, gate_id: &str) -> Option<&GateResult> {
        self.results.iter().find(|r| r.gate_id == gate_id)
    }
}

// ---------------------------------------------------------------------------
// PhaseOrchestrator
// ---------------------------------------------------------------------------

/// Runs every gate of a phase against one artifact and aggregates the verdict.
///
/// Gates run on their own threads over a shared snapshot of the artifact. A
/// gate that has not reported by the deadline, or whose validator panics, is
/// recorded as `error`.
pub struct PhaseOrchestrator {
    registry: Arc<GateRegistry>,
    store: Option<Arc<dyn ResultStore>>,
    observer: Option<Arc<dyn PhaseObserver>>,
    gate_timeout: Duration,
}

impl PhaseOrchestrator {
    pub fn new(registry: Arc<GateRegistry>) -> Self {
        Self {
            registry,
            store: None,
            observer: None,
            gate_timeout: DEFAULT_GATE_TIMEOUT,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PhaseObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_gate_timeout(mut self, timeout: Duration) -> Self {
        self.gate_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &GateRegistry {
        &self.registry
    }

    /// Evaluate `phase` against `artifact`.
    ///
    /// Returns `CriticalGateFailure` (carrying the full result) when any
    /// critical gate did not pass; every other outcome is `Ok`.
    pub fn run_phase(&self, phase: Phase, artifact: Arc<ArtifactData>) -> Result<PhaseResult> {
        let gates = self.registry.gates_for(phase)?;
        tracing::debug!(phase = %phase, gates = gates.len(), "running phase");

        let results = self.evaluate_all(gates, &artifact);
        let result = PhaseResult::from_results(phase, artifact.path.clone(), results);

        tracing::info!(
            phase = %phase,
            status = %result.overall_status,
            passed = result.passed_gates,
            total = result.total_gates,
            "phase evaluated"
        );

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&RecordKey::Phase(phase), StoredResult::Phase(result.clone())) {
                tracing::warn!(phase = %phase, error = %e, "failed to persist phase result");
            }
        }

        if let Some(observer) = &self.observer {
            if let Err(e) = observer.on_phase_complete(&result) {
                tracing::warn!(phase = %phase, error = %e, "phase observer failed");
            }
        }

        if result.overall_status == PhaseStatus::CriticalFailure {
            return Err(SparcError::CriticalGateFailure {
                phase,
                gates: result.critical_failures.clone(),
                result: Box::new(result),
            });
        }
        Ok(result)
    }

    fn evaluate_all(&self, gates: &[Gate], artifact: &Arc<ArtifactData>) -> Vec<GateResult> {
        let (tx, rx) = mpsc::channel::<(usize, GateResult)>();
        let mut slots: Vec<Option<GateResult>> = vec![None; gates.len()];

        for (idx, gate) in gates.iter().enumerate() {
            let gate_owned = gate.clone();
            let snapshot = Arc::clone(artifact);
            let tx = tx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("gate-{}", gate.id))
                .spawn(move || {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        evaluate(&gate_owned, &snapshot)
                    }))
                    .unwrap_or_else(|payload| {
                        GateResult::error(
                            &gate_owned,
                            format!("validator panicked: {}", panic_message(payload.as_ref())),
                        )
                    });
                    // Receiver may have given up on us after the deadline.
                    let _ = tx.send((idx, result));
                });
            if let Err(e) = spawned {
                slots[idx] = Some(GateResult::error(gate, format!("failed to spawn: {e}")));
            }
        }
        drop(tx);

        let deadline = Instant::now() + self.gate_timeout;
        while slots.iter().any(Option::is_none) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let secs = self.gate_timeout.as_secs_f64();
        slots
            .into_iter()
            .zip(gates)
            .map(|(slot, gate)| {
                slot.unwrap_or_else(|| {
                    tracing::warn!(gate = %gate.id, "gate timed out");
                    GateResult::error(gate, format!("timed out after {secs}s"))
                })
            })
            .collect()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{Threshold, ValidatorOutput};
    use crate::store::{MemoryResultStore, PhaseState, StoredRecord};
    use crate::types::{GateStatus, GateType, Severity};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scored(id: &str, severity: Severity, score: f64) -> Gate {
        Gate::new(
            id,
            GateType::Quality,
            severity,
            Threshold::Scalar(50.0),
            vec![],
            Arc::new(move |_: &ArtifactData| -> Result<ValidatorOutput> {
                Ok(ValidatorOutput {
                    score,
                    details: BTreeMap::new(),
                    summary: String::new(),
                })
            }),
        )
    }

    fn registry(gates: Vec<Gate>) -> Arc<GateRegistry> {
        let mut reg = GateRegistry::new();
        for g in gates {
            reg.register(Phase::Refinement, g).unwrap();
        }
        Arc::new(reg)
    }

    fn artifact(text: &str) -> Arc<ArtifactData> {
        Arc::new(ArtifactData::from_text("doc.md", text))
    }

    #[test]
    fn missing_medical_language_is_a_critical_failure() {
        let reg = Arc::new(GateRegistry::builtin().unwrap());
        let orch = PhaseOrchestrator::new(reg);
        let err = orch
            .run_phase(Phase::Specification, artifact("# Spec\nA todo list app.\n"))
            .unwrap_err();
        match err {
            SparcError::CriticalGateFailure { phase, gates, result } => {
                assert_eq!(phase, Phase::Specification);
                assert!(gates.contains(&"medical_safety_review".to_string()));
                assert_eq!(result.overall_status, PhaseStatus::CriticalFailure);
                let gate = result.gate_result("medical_safety_review").unwrap();
                assert_eq!(gate.score, 0.0);
                assert_eq!(gate.status, GateStatus::Failed);
            }
            other => panic!("expected critical failure, got {other:?}"),
        }
    }

    #[test]
    fn counts_add_up_and_keep_registry_order() {
        let orch = PhaseOrchestrator::new(registry(vec![
            scored("a", Severity::High, 90.0),
            scored("b", Severity::Medium, 10.0),
            scored("c", Severity::High, 60.0),
        ]));
        let result = orch.run_phase(Phase::Refinement, artifact("")).unwrap();
        assert_eq!(result.passed_gates + result.failed_gates.len(), result.total_gates);
        assert_eq!(result.total_gates, 3);
        assert_eq!(result.failed_gates, vec!["b"]);
        assert_eq!(result.overall_status, PhaseStatus::PartialFailure);
        let ids: Vec<&str> = result.results.iter().map(|r| r.gate_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn all_passing_is_passed() {
        let orch = PhaseOrchestrator::new(registry(vec![scored("a", Severity::Critical, 100.0)]));
        let result = orch.run_phase(Phase::Refinement, artifact("")).unwrap();
        assert_eq!(result.overall_status, PhaseStatus::Passed);
        assert!(result.critical_failures.is_empty());
    }

    #[test]
    fn unregistered_phase_is_unknown() {
        let orch = PhaseOrchestrator::new(registry(vec![scored("a", Severity::High, 100.0)]));
        assert!(matches!(
            orch.run_phase(Phase::Completion, artifact("")),
            Err(SparcError::UnknownPhase(_))
        ));
    }

    #[test]
    fn hanging_gate_times_out_as_error() {
        let slow = Gate::new(
            "slow",
            GateType::Testing,
            Severity::Medium,
            Threshold::Scalar(0.0),
            vec![],
            Arc::new(|_: &ArtifactData| -> Result<ValidatorOutput> {
                std::thread::sleep(Duration::from_secs(5));
                Ok(ValidatorOutput {
                    score: 100.0,
                    details: BTreeMap::new(),
                    summary: String::new(),
                })
            }),
        );
        let orch = PhaseOrchestrator::new(registry(vec![slow, scored("fast", Severity::High, 100.0)]))
            .with_gate_timeout(Duration::from_millis(100));

        let started = Instant::now();
        let result = orch.run_phase(Phase::Refinement, artifact("")).unwrap();
        assert!(started.elapsed() < Duration::from_secs(4));

        let slow = result.gate_result("slow").unwrap();
        assert_eq!(slow.status, GateStatus::Error);
        assert_eq!(slow.score, 0.0);
        assert!(slow.summary.contains("timed out"));
        assert_eq!(result.gate_result("fast").unwrap().status, GateStatus::Passed);
    }

    #[test]
    fn panicking_gate_is_recorded_as_error() {
        let boom = Gate::new(
            "boom",
            GateType::Safety,
            Severity::Critical,
            Threshold::Scalar(0.0),
            vec![],
            Arc::new(|_: &ArtifactData| -> Result<ValidatorOutput> { panic!("kaboom") }),
        );
        let orch = PhaseOrchestrator::new(registry(vec![boom]));
        let err = orch.run_phase(Phase::Refinement, artifact("")).unwrap_err();
        let SparcError::CriticalGateFailure { result, .. } = err else {
            panic!("expected critical failure");
        };
        let boom = result.gate_result("boom").unwrap();
        assert_eq!(boom.status, GateStatus::Error);
        assert!(boom.summary.contains("kaboom"));
    }

    #[test]
    fn results_are_persisted_including_critical_failures() {
        let store = Arc::new(MemoryResultStore::new());
        let orch = PhaseOrchestrator::new(registry(vec![scored("a", Severity::Critical, 0.0)]))
            .with_store(store.clone());
        assert!(orch.run_phase(Phase::Refinement, artifact("")).is_err());
        assert_eq!(
            store.phase_state(Phase::Refinement).unwrap(),
            PhaseState::CriticalFailure
        );
    }

    struct BrokenStore;

    impl ResultStore for BrokenStore {
        fn save(&self, key: &RecordKey, _: StoredResult) -> Result<StoredRecord> {
            Err(SparcError::Persistence {
                key: key.to_string(),
                message: "disk full".to_string(),
            })
        }

        fn history(&self, _: &RecordKey) -> Result<Vec<StoredRecord>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn persistence_failure_still_returns_result() {
        let orch = PhaseOrchestrator::new(registry(vec![scored("a", Severity::High, 100.0)]))
            .with_store(Arc::new(BrokenStore));
        let result = orch.run_phase(Phase::Refinement, artifact("")).unwrap();
        assert_eq!(result.overall_status, PhaseStatus::Passed);
    }

    struct CountingObserver {
        calls: AtomicUsize,
        fail: bool,
    }

    impl PhaseObserver for CountingObserver {
        fn on_phase_complete(&self, _: &PhaseResult) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SparcError::Hook("coordinator unreachable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn observer_failure_does_not_change_verdict() {
        let observer = Arc::new(CountingObserver {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let orch = PhaseOrchestrator::new(registry(vec![
            scored("a", Severity::High, 100.0),
            scored("b", Severity::Medium, 0.0),
        ]))
        .with_observer(observer.clone());
        let result = orch.run_phase(Phase::Refinement, artifact("")).unwrap();
        assert_eq!(result.overall_status, PhaseStatus::PartialFailure);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observer_sees_critical_failures_too() {
        let observer = Arc::new(CountingObserver {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let orch = PhaseOrchestrator::new(registry(vec![scored("a", Severity::Critical, 0.0)]))
            .with_observer(observer.clone());
        assert!(orch.run_phase(Phase::Refinement, artifact("")).is_err());
        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
    }
}
