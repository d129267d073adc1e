use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Specification,
    Pseudocode,
    Architecture,
    Refinement,
    Completion,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Specification,
            Phase::Pseudocode,
            Phase::Architecture,
            Phase::Refinement,
            Phase::Completion,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Phase> {
        Phase::all().get(self.index() + 1).copied()
    }

    pub fn previous(self) -> Option<Phase> {
        self.index()
            .checked_sub(1)
            .and_then(|i| Phase::all().get(i).copied())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Specification => "specification",
            Phase::Pseudocode => "pseudocode",
            Phase::Architecture => "architecture",
            Phase::Refinement => "refinement",
            Phase::Completion => "completion",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = crate::error::SparcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "specification" | "spec" => Ok(Phase::Specification),
            "pseudocode" => Ok(Phase::Pseudocode),
            "architecture" => Ok(Phase::Architecture),
            "refinement" => Ok(Phase::Refinement),
            "completion" => Ok(Phase::Completion),
            _ => Err(crate::error::SparcError::UnknownPhase(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

impl Severity {
    pub fn is_critical(self) -> bool {
        matches!(self, Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// GateType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateType {
    Safety,
    Compliance,
    Technical,
    Testing,
    Quality,
    Deployment,
    Documentation,
    Performance,
}

impl fmt::Display for GateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GateType::Safety => "safety",
            GateType::Compliance => "compliance",
            GateType::Technical => "technical",
            GateType::Testing => "testing",
            GateType::Quality => "quality",
            GateType::Deployment => "deployment",
            GateType::Documentation => "documentation",
            GateType::Performance => "performance",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// GateStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Failed,
    Error,
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GateStatus::Passed => "passed",
            GateStatus::Failed => "failed",
            GateStatus::Error => "error",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// PhaseStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Passed,
    PartialFailure,
    CriticalFailure,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseStatus::Passed => "passed",
            PhaseStatus::PartialFailure => "partial_failure",
            PhaseStatus::CriticalFailure => "critical_failure",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Aggregate verdict shared by the composite pipeline and traceability runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    NeedsImprovement,
    MajorIssues,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Pass => "PASS",
            Verdict::NeedsImprovement => "NEEDS_IMPROVEMENT",
            Verdict::MajorIssues => "MAJOR_ISSUES",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ValidatorStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidatorStatus {
    Pass,
    Fail,
    NeedsImprovement,
    MajorIssues,
    Error,
}

impl From<Verdict> for ValidatorStatus {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Pass => ValidatorStatus::Pass,
            Verdict::NeedsImprovement => ValidatorStatus::NeedsImprovement,
            Verdict::MajorIssues => ValidatorStatus::MajorIssues,
        }
    }
}

impl fmt::Display for ValidatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidatorStatus::Pass => "PASS",
            ValidatorStatus::Fail => "FAIL",
            ValidatorStatus::NeedsImprovement => "NEEDS_IMPROVEMENT",
            ValidatorStatus::MajorIssues => "MAJOR_ISSUES",
            ValidatorStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn phase_ordering() {
        assert!(Phase::Specification < Phase::Pseudocode);
        assert!(Phase::Architecture < Phase::Refinement);
        assert!(Phase::Completion > Phase::Refinement);
    }

    #[test]
    fn phase_next_and_previous() {
        assert_eq!(Phase::Specification.next(), Some(Phase::Pseudocode));
        assert_eq!(Phase::Completion.next(), None);
        assert_eq!(Phase::Specification.previous(), None);
        assert_eq!(Phase::Refinement.previous(), Some(Phase::Architecture));
    }

    #[test]
    fn phase_roundtrip() {
        for phase in Phase::all() {
            let parsed = Phase::from_str(phase.as_str()).unwrap();
            assert_eq!(*phase, parsed);
        }
    }

    #[test]
    fn unknown_phase_is_rejected() {
        let err = Phase::from_str("deployment").unwrap_err();
        assert!(matches!(err, crate::SparcError::UnknownPhase(ref p) if p == "deployment"));
    }

    #[test]
    fn verdict_serializes_screaming_case() {
        let json = serde_json::to_string(&Verdict::NeedsImprovement).unwrap();
        assert_eq!(json, "\"NEEDS_IMPROVEMENT\"");
        let status: PhaseStatus = serde_json::from_str("\"critical_failure\"").unwrap();
        assert_eq!(status, PhaseStatus::CriticalFailure);
    }
}
