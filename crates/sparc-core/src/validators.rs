//! Built-in pipeline validators.

use crate::artifact::{ArtifactData, SpecDocuments};
use crate::config::Config;
use crate::error::Result;
use crate::gate::Criterion;
use crate::pipeline::{CompositePipeline, Validator, ValidatorReport};
use crate::trace::TraceReport;
use crate::types::ValidatorStatus;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// The three built-in validators, weighted from `config.pipeline`.
pub fn default_pipeline(config: &Config) -> CompositePipeline {
    let p = &config.pipeline;
    CompositePipeline::new()
        .with_timeout(config.gate_timeout())
        .with(StructuralValidator::new(p.structural_weight, p.min_words))
        .with(ComplianceValidator::new(
            p.compliance_weight,
            config.compliance.domain_keywords.clone(),
            config.compliance.required_terms.clone(),
        ))
        .with(TraceabilityValidator::new(p.traceability_weight))
}

// ---------------------------------------------------------------------------
// StructuralValidator
// ---------------------------------------------------------------------------

pub struct StructuralValidator {
    weight: f64,
    min_words: usize,
}

impl StructuralValidator {
    pub fn new(weight: f64, min_words: usize) -> Self {
        Self { weight, min_words }
    }
}

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\b(TODO|TBD|FIXME)\b").unwrap())
}

impl Validator for StructuralValidator {
    fn name(&self) -> &str {
        "structural"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn run(&self, artifact: &ArtifactData) -> Result<ValidatorReport> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if artifact.headings.is_empty() {
            errors.push("document has no headings".to_string());
        }
        if artifact.word_count < self.min_words {
            errors.push(format!(
                "document has {} words, expected at least {}",
                artifact.word_count, self.min_words
            ));
        }

        let top_level = artifact.headings.iter().filter(|h| h.level == 1).count();
        if top_level > 1 {
            warnings.push(format!("{top_level} top-level headings, expected one"));
        }

        for pair in artifact.headings.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.level > prev.level + 1 {
                warnings.push(format!(
                    "heading '{}' on line {} skips from h{} to h{}",
                    next.text, next.line, prev.level, next.level
                ));
            }
        }

        for (i, section) in artifact.sections.iter().enumerate() {
            let has_children = artifact
                .sections
                .get(i + 1)
                .is_some_and(|n| n.heading.level > section.heading.level);
            if section.body.is_empty() && !has_children {
                warnings.push(format!(
                    "section '{}' on line {} is empty",
                    section.heading.text, section.heading.line
                ));
            }
        }

        for (idx, line) in artifact.content.lines().enumerate() {
            if let Some(m) = placeholder_re().find(line) {
                warnings.push(format!("placeholder '{}' on line {}", m.as_str(), idx + 1));
            }
        }

        let status = if !errors.is_empty() {
            ValidatorStatus::MajorIssues
        } else if !warnings.is_empty() {
            ValidatorStatus::NeedsImprovement
        } else {
            ValidatorStatus::Pass
        };
        let summary = format!(
            "{} headings, {} words, {} error(s), {} warning(s)",
            artifact.headings.len(),
            artifact.word_count,
            errors.len(),
            warnings.len()
        );
        Ok(ValidatorReport {
            status: Some(status),
            compliant: None,
            errors,
            warnings,
            summary,
        })
    }
}

// ---------------------------------------------------------------------------
// ComplianceValidator
// ---------------------------------------------------------------------------

/// Lexical only: a document that mentions any domain keyword must also
/// contain every required term somewhere in its text.
pub struct ComplianceValidator {
    weight: f64,
    domain_keywords: Vec<String>,
    required_terms: Vec<Criterion>,
}

impl ComplianceValidator {
    pub fn new(weight: f64, domain_keywords: Vec<String>, required_terms: Vec<Criterion>) -> Self {
        Self {
            weight,
            domain_keywords,
            required_terms,
        }
    }
}

impl Validator for ComplianceValidator {
    fn name(&self) -> &str {
        "compliance"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn run(&self, artifact: &ArtifactData) -> Result<ValidatorReport> {
        let triggers: Vec<&str> = self
            .domain_keywords
            .iter()
            .map(String::as_str)
            .filter(|k| artifact.contains(k))
            .collect();
        if triggers.is_empty() {
            return Ok(ValidatorReport {
                summary: "no domain-sensitive content".to_string(),
                ..ValidatorReport::with_compliance(true)
            });
        }

        let missing: Vec<&str> = self
            .required_terms
            .iter()
            .filter(|t| !t.any_of.iter().any(|p| artifact.contains(p)))
            .map(|t| t.id.as_str())
            .collect();
        let warnings: Vec<String> = missing
            .iter()
            .map(|id| format!("domain-sensitive content without required term '{id}'"))
            .collect();
        let summary = if missing.is_empty() {
            format!("domain-sensitive ({}); all required terms present", triggers.join(", "))
        } else {
            format!(
                "domain-sensitive ({}); missing {}",
                triggers.join(", "),
                missing.join(", ")
            )
        };
        Ok(ValidatorReport {
            status: None,
            compliant: Some(missing.is_empty()),
            errors: Vec::new(),
            warnings,
            summary,
        })
    }
}

// ---------------------------------------------------------------------------
// TraceabilityValidator
// ---------------------------------------------------------------------------

/// Builds the trace graph for the directory containing the artifact.
pub struct TraceabilityValidator {
    weight: f64,
}

impl TraceabilityValidator {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Validator for TraceabilityValidator {
    fn name(&self) -> &str {
        "traceability"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn run(&self, artifact: &ArtifactData) -> Result<ValidatorReport> {
        let dir = artifact
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let docs = SpecDocuments::load(dir)?;
        let report = TraceReport::from_documents(&docs);
        let c = &report.coverage;

        let mut warnings: Vec<String> = Vec::new();
        warnings.extend(
            c.uncovered_requirements
                .iter()
                .map(|id| format!("{id} is not covered by any task")),
        );
        warnings.extend(
            c.unimplemented_elements
                .iter()
                .map(|id| format!("{id} is not implemented by any task")),
        );
        warnings.extend(
            c.unknown_references
                .iter()
                .map(|id| format!("tasks reference undeclared {id}")),
        );

        Ok(ValidatorReport {
            status: Some(report.verdict.into()),
            compliant: None,
            errors: Vec::new(),
            warnings,
            summary: format!(
                "requirements {:.1}%, design {:.1}%, {} orphaned task(s)",
                c.requirements_coverage,
                c.design_coverage,
                c.orphaned_tasks.len()
            ),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
