//! Composite validation: several weighted validators over one artifact,
//! folded into a single score and verdict.

use crate::artifact::ArtifactData;
use crate::error::Result;
use crate::orchestrator::panic_message;
use crate::types::{ValidatorStatus, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// A registered pipeline validator. Weights are percentages; a configured
/// pipeline's weights are expected to sum to 100.
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;
    fn weight(&self) -> f64;
    fn run(&self, artifact: &ArtifactData) -> Result<ValidatorReport>;
}

/// What a validator reports: a status label, a compliance flag, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatorReport {
    pub status: Option<ValidatorStatus>,
    pub compliant: Option<bool>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub summary: String,
}

impl ValidatorReport {
    pub fn with_status(status: ValidatorStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_compliance(compliant: bool) -> Self {
        Self {
            compliant: Some(compliant),
            ..Self::default()
        }
    }
}

/// Fixed sub-score rule. `compliant=false` (50) deliberately outranks
/// `MAJOR_ISSUES`/`FAIL` (30).
pub fn sub_score(report: &ValidatorReport) -> f64 {
    match (report.status, report.compliant) {
        (Some(ValidatorStatus::Error), _) => 0.0,
        (Some(ValidatorStatus::Pass), _) | (_, Some(true)) => 100.0,
        (Some(ValidatorStatus::NeedsImprovement), _) => 70.0,
        (_, Some(false)) => 50.0,
        _ => 30.0,
    }
}

// ---------------------------------------------------------------------------
// CompositeResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorEntry {
    pub name: String,
    pub weight: f64,
    pub status: ValidatorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<bool>,
    pub score: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub summary: String,
}

impl ValidatorEntry {
    pub fn from_report(name: &str, weight: f64, report: ValidatorReport) -> Self {
        let score = sub_score(&report);
        let status = report.status.unwrap_or(match report.compliant {
            Some(true) => ValidatorStatus::Pass,
            _ => ValidatorStatus::Fail,
        });
        Self {
            name: name.to_string(),
            weight,
            status,
            compliant: report.compliant,
            score,
            errors: report.errors,
            warnings: report.warnings,
            summary: report.summary,
        }
    }

    /// An `ERROR` entry. The message counts as one reported error.
    pub fn error(name: &str, weight: f64, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            name: name.to_string(),
            weight,
            status: ValidatorStatus::Error,
            compliant: None,
            score: 0.0,
            errors: vec![message.clone()],
            warnings: Vec::new(),
            summary: message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeResult {
    pub artifact: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub validators: Vec<ValidatorEntry>,
    pub composite_score: f64,
    pub error_count: usize,
    pub warning_count: usize,
    pub overall: Verdict,
}

impl CompositeResult {
    pub fn from_entries(artifact: PathBuf, validators: Vec<ValidatorEntry>) -> Self {
        let composite_score = validators.iter().map(|v| v.score * v.weight).sum::<f64>() / 100.0;
        let error_count = validators.iter().map(|v| v.errors.len()).sum();
        let warning_count = validators.iter().map(|v| v.warnings.len()).sum();
        Self {
            artifact,
            timestamp: Utc::now(),
            overall: overall_verdict(error_count, warning_count, composite_score),
            validators,
            composite_score,
            error_count,
            warning_count,
        }
    }
}

pub fn overall_verdict(error_count: usize, warning_count: usize, score: f64) -> Verdict {
    if error_count > 5 || score < 60.0 {
        Verdict::MajorIssues
    } else if error_count > 0 || warning_count > 8 || score < 80.0 {
        Verdict::NeedsImprovement
    } else {
        Verdict::Pass
    }
}

// ---------------------------------------------------------------------------
// CompositePipeline
// ---------------------------------------------------------------------------

/// How long a pipeline validator may run before it is recorded as an error.
pub const DEFAULT_VALIDATOR_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CompositePipeline {
    validators: Vec<Arc<dyn Validator>>,
    timeout: Duration,
}

impl Default for CompositePipeline {
    fn default() -> Self {
        Self {
            validators: Vec::new(),
            timeout: DEFAULT_VALIDATOR_TIMEOUT,
        }
    }
}

impl CompositePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.register(Box::new(validator));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register(&mut self, validator: Box<dyn Validator>) {
        self.validators.push(Arc::from(validator));
    }

    pub fn validator_names(&self) -> Vec<&str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    pub fn total_weight(&self) -> f64 {
        self.validators.iter().map(|v| v.weight()).sum()
    }

    /// Run every validator in parallel over `artifact`. A validator that
    /// errors, panics or misses the deadline becomes an `ERROR` entry; the
    /// others still count.
    pub fn run(&self, artifact: &ArtifactData) -> CompositeResult {
        let total = self.total_weight();
        if (total - 100.0).abs() > 1e-6 {
            tracing::warn!(total, "pipeline weights do not sum to 100");
        }

        let entries = self.run_all(Arc::new(artifact.clone()));
        for e in &entries {
            tracing::debug!(validator = %e.name, status = %e.status, score = e.score, "validator finished");
        }
        let result = CompositeResult::from_entries(artifact.path.clone(), entries);
        tracing::info!(
            artifact = %result.artifact.display(),
            score = result.composite_score,
            overall = %result.overall,
            "pipeline evaluated"
        );
        result
    }

    fn run_all(&self, artifact: Arc<ArtifactData>) -> Vec<ValidatorEntry> {
        let (tx, rx) = mpsc::channel::<(usize, ValidatorEntry)>();
        let mut slots: Vec<Option<ValidatorEntry>> = vec![None; self.validators.len()];

        for (idx, validator) in self.validators.iter().enumerate() {
            let v = Arc::clone(validator);
            let snapshot = Arc::clone(&artifact);
            let tx = tx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("validator-{}", v.name()))
                .spawn(move || {
                    let entry = match panic::catch_unwind(AssertUnwindSafe(|| v.run(&snapshot))) {
                        Ok(Ok(report)) => ValidatorEntry::from_report(v.name(), v.weight(), report),
                        Ok(Err(e)) => ValidatorEntry::error(v.name(), v.weight(), e.to_string()),
                        Err(payload) => ValidatorEntry::error(
                            v.name(),
                            v.weight(),
                            format!("validator panicked: {}", panic_message(payload.as_ref())),
                        ),
                    };
                    // Receiver may have given up on us after the deadline.
                    let _ = tx.send((idx, entry));
                });
            if let Err(e) = spawned {
                slots[idx] = Some(ValidatorEntry::error(
                    validator.name(),
                    validator.weight(),
                    format!("failed to spawn: {e}"),
                ));
            }
        }
        drop(tx);

        let deadline = Instant::now() + self.timeout;
        while slots.iter().any(Option::is_none) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((idx, entry)) => slots[idx] = Some(entry),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let secs = self.timeout.as_secs_f64();
        slots
            .into_iter()
            .zip(&self.validators)
            .map(|(slot, v)| {
                slot.unwrap_or_else(|| {
                    tracing::warn!(validator = %v.name(), "validator timed out");
                    ValidatorEntry::error(v.name(), v.weight(), format!("timed out after {secs}s"))
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SparcError;

    struct Fixed {
        name: &'static str,
        weight: f64,
        outcome: fn() -> Result<ValidatorReport>,
    }

    impl Validator for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn weight(&self) -> f64 {
            self.weight
        }

        fn run(&self, _: &ArtifactData) -> Result<ValidatorReport> {
            (self.outcome)()
        }
    }

    fn blank() -> ArtifactData {
        ArtifactData::from_text("doc.md", "")
    }

    fn report(status: Option<ValidatorStatus>, compliant: Option<bool>) -> ValidatorReport {
        ValidatorReport {
            status,
            compliant,
            ..ValidatorReport::default()
        }
    }

    #[test]
    fn sub_score_mapping() {
        use ValidatorStatus::*;
        assert_eq!(sub_score(&report(Some(Error), Some(true))), 0.0);
        assert_eq!(sub_score(&report(Some(Pass), None)), 100.0);
        assert_eq!(sub_score(&report(None, Some(true))), 100.0);
        assert_eq!(sub_score(&report(Some(NeedsImprovement), None)), 70.0);
        assert_eq!(sub_score(&report(None, Some(false))), 50.0);
        assert_eq!(sub_score(&report(Some(MajorIssues), None)), 30.0);
        assert_eq!(sub_score(&report(Some(Fail), None)), 30.0);
        assert!(sub_score(&report(None, Some(false))) > sub_score(&report(Some(MajorIssues), None)));
    }

    #[test]
    fn erroring_validator_drags_score_to_major_issues() {
        let pipeline = CompositePipeline::new()
            .with(Fixed {
                name: "ok",
                weight: 40.0,
                outcome: || Ok(ValidatorReport::with_status(ValidatorStatus::Pass)),
            })
            .with(Fixed {
                name: "broken",
                weight: 60.0,
                outcome: || Err(SparcError::validator("broken", "cannot parse")),
            });
        let result = pipeline.run(&blank());
        assert_eq!(result.composite_score, 40.0);
        assert_eq!(result.overall, Verdict::MajorIssues);
        assert_eq!(result.error_count, 1);
        assert_eq!(result.validators[1].status, ValidatorStatus::Error);
        assert!(result.validators[1].summary.contains("cannot parse"));
    }

    #[test]
    fn panicking_validator_is_isolated() {
        let pipeline = CompositePipeline::new()
            .with(Fixed {
                name: "ok",
                weight: 50.0,
                outcome: || Ok(ValidatorReport::with_compliance(true)),
            })
            .with(Fixed {
                name: "boom",
                weight: 50.0,
                outcome: || panic!("kaboom"),
            });
        let result = pipeline.run(&blank());
        assert_eq!(result.validators[0].status, ValidatorStatus::Pass);
        assert_eq!(result.validators[1].status, ValidatorStatus::Error);
        assert!(result.validators[1].summary.contains("kaboom"));
        assert_eq!(result.composite_score, 50.0);
    }

    #[test]
    fn hung_validator_times_out_as_error() {
        let pipeline = CompositePipeline::new()
            .with_timeout(Duration::from_millis(100))
            .with(Fixed {
                name: "ok",
                weight: 50.0,
                outcome: || Ok(ValidatorReport::with_status(ValidatorStatus::Pass)),
            })
            .with(Fixed {
                name: "stuck",
                weight: 50.0,
                outcome: || {
                    std::thread::sleep(Duration::from_secs(5));
                    Ok(ValidatorReport::with_status(ValidatorStatus::Pass))
                },
            });
        let started = Instant::now();
        let result = pipeline.run(&blank());
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(result.validators[0].status, ValidatorStatus::Pass);
        assert_eq!(result.validators[1].status, ValidatorStatus::Error);
        assert!(result.validators[1].summary.contains("timed out"));
        assert_eq!(result.composite_score, 50.0);
        assert_eq!(result.error_count, 1);
    }

    #[test]
    fn compliance_only_report_gets_status() {
        let entry = ValidatorEntry::from_report("c", 30.0, ValidatorReport::with_compliance(false));
        assert_eq!(entry.status, ValidatorStatus::Fail);
        assert_eq!(entry.score, 50.0);
    }

    #[test]
    fn raising_a_sub_score_never_lowers_the_composite() {
        let ladder = [0.0, 30.0, 50.0, 70.0, 100.0];
        let entry = |score: f64, weight: f64| ValidatorEntry {
            name: "v".to_string(),
            weight,
            status: ValidatorStatus::Pass,
            compliant: None,
            score,
            errors: vec![],
            warnings: vec![],
            summary: String::new(),
        };
        for other in ladder {
            let mut last = f64::MIN;
            for s in ladder {
                let r = CompositeResult::from_entries(
                    PathBuf::from("a.md"),
                    vec![entry(s, 30.0), entry(other, 70.0)],
                );
                assert!(r.composite_score >= last);
                last = r.composite_score;
            }
        }
    }

    #[test]
    fn verdict_thresholds() {
        assert_eq!(overall_verdict(0, 0, 100.0), Verdict::Pass);
        assert_eq!(overall_verdict(0, 8, 80.0), Verdict::Pass);
        assert_eq!(overall_verdict(0, 9, 100.0), Verdict::NeedsImprovement);
        assert_eq!(overall_verdict(1, 0, 100.0), Verdict::NeedsImprovement);
        assert_eq!(overall_verdict(0, 0, 79.9), Verdict::NeedsImprovement);
        assert_eq!(overall_verdict(6, 0, 100.0), Verdict::MajorIssues);
        assert_eq!(overall_verdict(0, 0, 59.9), Verdict::MajorIssues);
    }

    #[test]
    fn empty_pipeline_scores_zero() {
        let result = CompositePipeline::new().run(&blank());
        assert_eq!(result.composite_score, 0.0);
        assert_eq!(result.overall, Verdict::MajorIssues);
    }
}
