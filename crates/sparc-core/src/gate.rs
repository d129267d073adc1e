use crate::artifact::ArtifactData;
use crate::error::Result;
use crate::types::{GateStatus, GateType, Severity};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Threshold
// ---------------------------------------------------------------------------

/// A scalar threshold compares the aggregate score. A per-criterion map
/// requires every listed criterion to clear its own minimum; it never falls
/// back to averaging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Scalar(f64),
    PerCriterion(BTreeMap<String, f64>),
}

// ---------------------------------------------------------------------------
// Criterion / GateCheck
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Criterion {
    pub id: String,
    /// Phrases (keywords, headings) or labels (metrics), matched
    /// case-insensitively. Any one match satisfies the criterion.
    pub any_of: Vec<String>,
}

/// Data-driven lexical check backing a catalog gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateCheck {
    /// Phrase present anywhere in the document.
    Keywords { criteria: Vec<Criterion> },
    /// Phrase present in some heading.
    Headings { criteria: Vec<Criterion> },
    /// Numeric value read from a `label: <n>[%]` line.
    Metrics { criteria: Vec<Criterion> },
    /// Fixed structural minimums.
    Structure {
        #[serde(default)]
        min_headings: usize,
        #[serde(default)]
        min_list_items: usize,
        #[serde(default)]
        code_blocks: bool,
        #[serde(default)]
        min_words: usize,
    },
}

impl GateCheck {
    /// Criterion ids in evaluation order.
    pub fn criteria(&self) -> Vec<String> {
        match self {
            GateCheck::Keywords { criteria }
            | GateCheck::Headings { criteria }
            | GateCheck::Metrics { criteria } => criteria.iter().map(|c| c.id.clone()).collect(),
            GateCheck::Structure {
                min_headings,
                min_list_items,
                code_blocks,
                min_words,
            } => {
                let mut ids = Vec::new();
                if *min_headings > 0 {
                    ids.push("min_headings".to_string());
                }
                if *min_list_items > 0 {
                    ids.push("min_list_items".to_string());
                }
                if *code_blocks {
                    ids.push("code_blocks".to_string());
                }
                if *min_words > 0 {
                    ids.push("min_words".to_string());
                }
                ids
            }
        }
    }

    fn run(&self, artifact: &ArtifactData) -> ValidatorOutput {
        match self {
            GateCheck::Keywords { criteria } => flag_output(criteria.iter().map(|c| {
                let hit = c.any_of.iter().any(|p| artifact.contains(p));
                (c.id.clone(), hit)
            })),
            GateCheck::Headings { criteria } => flag_output(criteria.iter().map(|c| {
                let hit = c.any_of.iter().any(|p| artifact.has_heading_containing(p));
                (c.id.clone(), hit)
            })),
            GateCheck::Metrics { criteria } => {
                let mut details = BTreeMap::new();
                let mut total = 0.0;
                for c in criteria {
                    let value = c
                        .any_of
                        .iter()
                        .find_map(|label| read_metric(&artifact.content, label))
                        .unwrap_or(0.0);
                    total += value.clamp(0.0, 100.0);
                    details.insert(c.id.clone(), CriterionValue::Value(value));
                }
                let score = if criteria.is_empty() {
                    100.0
                } else {
                    total / criteria.len() as f64
                };
                let summary = format!("{} metric(s) read, mean {:.1}", criteria.len(), score);
                ValidatorOutput {
                    score,
                    details,
                    summary,
                }
            }
            GateCheck::Structure {
                min_headings,
                min_list_items,
                code_blocks,
                min_words,
            } => {
                let mut checks = Vec::new();
                if *min_headings > 0 {
                    checks.push(("min_headings".to_string(), artifact.headings.len() >= *min_headings));
                }
                if *min_list_items > 0 {
                    checks.push(("min_list_items".to_string(), artifact.list_items >= *min_list_items));
                }
                if *code_blocks {
                    checks.push(("code_blocks".to_string(), artifact.code_blocks > 0));
                }
                if *min_words > 0 {
                    checks.push(("min_words".to_string(), artifact.word_count >= *min_words));
                }
                flag_output(checks.into_iter())
            }
        }
    }
}

fn flag_output(flags: impl Iterator<Item = (String, bool)>) -> ValidatorOutput {
    let mut details = BTreeMap::new();
    let mut met = 0usize;
    for (id, hit) in flags {
        if hit {
            met += 1;
        }
        details.insert(id, CriterionValue::Flag(hit));
    }
    let total = details.len();
    let score = if total == 0 {
        100.0
    } else {
        met as f64 / total as f64 * 100.0
    };
    ValidatorOutput {
        score,
        details,
        summary: format!("{met}/{total} criteria met"),
    }
}

/// Find `label: 85`, `label = 85%` or `label 85%` on any line.
fn read_metric(content: &str, label: &str) -> Option<f64> {
    let pattern = format!(
        r"(?im)^[\s\-*|]*(?:\*\*)?{}(?:\*\*)?\s*[:=|]?\s*(\d+(?:\.\d+)?)\s*%?",
        regex::escape(label)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(content)?.get(1)?.as_str().parse().ok()
}

// ---------------------------------------------------------------------------
// ValidatorOutput
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriterionValue {
    Flag(bool),
    Value(f64),
}

impl CriterionValue {
    /// Numeric view used by per-criterion thresholds: a met flag is 100.
    pub fn as_number(self) -> f64 {
        match self {
            CriterionValue::Flag(true) => 100.0,
            CriterionValue::Flag(false) => 0.0,
            CriterionValue::Value(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorOutput {
    /// 0..=100
    pub score: f64,
    pub details: BTreeMap<String, CriterionValue>,
    pub summary: String,
}

// ---------------------------------------------------------------------------
// GateValidator
// ---------------------------------------------------------------------------

/// The validate function of a gate: a pure function of artifact content.
pub trait GateValidator: Send + Sync {
    fn validate(&self, artifact: &ArtifactData) -> Result<ValidatorOutput>;
}

impl GateValidator for GateCheck {
    fn validate(&self, artifact: &ArtifactData) -> Result<ValidatorOutput> {
        Ok(self.run(artifact))
    }
}

impl<F> GateValidator for F
where
    F: Fn(&ArtifactData) -> Result<ValidatorOutput> + Send + Sync,
{
    fn validate(&self, artifact: &ArtifactData) -> Result<ValidatorOutput> {
        self(artifact)
    }
}

// ---------------------------------------------------------------------------
// GateDefinition
// ---------------------------------------------------------------------------

/// Catalog entry for one gate, as written in `gates.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateDefinition {
    pub id: String,
    pub description: String,
    pub gate_type: GateType,
    pub severity: Severity,
    pub threshold: Threshold,
    pub check: GateCheck,
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// A gate ready to evaluate. Cheap to clone; the validator is shared.
#[derive(Clone)]
pub struct Gate {
    pub id: String,
    pub description: String,
    pub gate_type: GateType,
    pub severity: Severity,
    pub criteria: Vec<String>,
    pub threshold: Threshold,
    validator: Arc<dyn GateValidator>,
}

impl Gate {
    pub fn new(
        id: impl Into<String>,
        gate_type: GateType,
        severity: Severity,
        threshold: Threshold,
        criteria: Vec<String>,
        validator: Arc<dyn GateValidator>,
    ) -> Self {
        let id = id.into();
        Self {
            description: id.clone(),
            id,
            gate_type,
            severity,
            criteria,
            threshold,
            validator,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn validate(&self, artifact: &ArtifactData) -> Result<ValidatorOutput> {
        self.validator.validate(artifact)
    }
}

impl From<GateDefinition> for Gate {
    fn from(def: GateDefinition) -> Self {
        let criteria = def.check.criteria();
        Self {
            id: def.id,
            description: def.description,
            gate_type: def.gate_type,
            severity: def.severity,
            criteria,
            threshold: def.threshold,
            validator: Arc::new(def.check),
        }
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("id", &self.id)
            .field("gate_type", &self.gate_type)
            .field("severity", &self.severity)
            .field("criteria", &self.criteria)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// GateResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: String,
    pub severity: Severity,
    pub score: f64,
    pub status: GateStatus,
    pub summary: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, CriterionValue>,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
}

impl GateResult {
    /// An `error` result: score 0, message kept in the summary.
    pub fn error(gate: &Gate, message: impl Into<String>) -> Self {
        Self {
            gate_id: gate.id.clone(),
            severity: gate.severity,
            score: 0.0,
            status: GateStatus::Error,
            summary: message.into(),
            details: BTreeMap::new(),
            timestamp: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == GateStatus::Passed
    }

    pub fn is_critical_failure(&self) -> bool {
        !self.passed() && self.severity.is_critical()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
