use crate::artifact::ArtifactData;
use crate::gate::{Gate, GateResult, Threshold, ValidatorOutput};
use crate::types::GateStatus;
use chrono::Utc;
use std::time::Instant;

/// Evaluate one gate against one artifact snapshot.
///
/// Never fails: a validator error becomes a result with `status = error`,
/// score 0, and the message in `summary`.
pub fn evaluate(gate: &Gate, artifact: &ArtifactData) -> GateResult {
    let start = Instant::now();
    let result = match gate.validate(artifact) {
        Ok(output) => {
            let status = resolve_status(&gate.threshold, &output);
            GateResult {
                gate_id: gate.id.clone(),
                severity: gate.severity,
                score: output.score.clamp(0.0, 100.0),
                status,
                summary: output.summary,
                details: output.details,
                timestamp: Utc::now(),
                duration_ms: 0,
            }
        }
        Err(e) => GateResult::error(gate, e.to_string()),
    };
    let result = GateResult {
        duration_ms: start.elapsed().as_millis() as u64,
        ..result
    };
    tracing::debug!(
        gate = %result.gate_id,
        status = %result.status,
        score = result.score,
        "gate evaluated"
    );
    result
}

/// Scalar thresholds compare the aggregate score. Per-criterion maps require
/// every named criterion to reach its minimum; a criterion missing from the
/// details counts as 0.
pub fn resolve_status(threshold: &Threshold, output: &ValidatorOutput) -> GateStatus {
    let passed = match threshold {
        Threshold::Scalar(min) => output.score >= *min,
        Threshold::PerCriterion(mins) => mins.iter().all(|(criterion, min)| {
            let actual = output
                .details
                .get(criterion)
                .map(|v| v.as_number())
                .unwrap_or(0.0);
            actual >= *min
        }),
    };
    if passed {
        GateStatus::Passed
    } else {
        GateStatus::Failed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
