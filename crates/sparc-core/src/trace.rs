//! Traceability graph: requirements → design elements → tasks.
//!
//! Links are lexical. A task covers every requirement id it mentions and
//! implements *every* design element of each element type it names; the
//! many-to-many link is deliberate.

use crate::artifact::SpecDocuments;
use crate::task::{self, ElementType, Task};
use crate::types::Verdict;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub covered_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignElement {
    /// `COMP-1`, `API-2`, `MODEL-1`: numbered per type in declaration order.
    pub id: String,
    pub element_type: ElementType,
    pub name: String,
    pub implemented_by: Vec<String>,
}

// ---------------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub requirements_coverage: f64,
    pub design_coverage: f64,
    pub orphaned_tasks: Vec<String>,
    pub uncovered_requirements: Vec<String>,
    pub unimplemented_elements: Vec<String>,
    pub domain_sensitive_tasks: Vec<String>,
    /// Requirement ids referenced by tasks but never declared.
    pub unknown_references: Vec<String>,
}

/// `covered / total * 100`; an empty set is fully covered.
pub fn ratio(covered: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}

pub fn verdict(requirements_coverage: f64, design_coverage: f64) -> Verdict {
    if requirements_coverage < 80.0 || design_coverage < 70.0 {
        Verdict::MajorIssues
    } else if requirements_coverage < 95.0 || design_coverage < 90.0 {
        Verdict::NeedsImprovement
    } else {
        Verdict::Pass
    }
}

// ---------------------------------------------------------------------------
// TraceReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceReport {
    pub spec_dir: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub requirements: Vec<Requirement>,
    pub design_elements: Vec<DesignElement>,
    pub tasks: Vec<Task>,
    pub coverage: Coverage,
    pub verdict: Verdict,
}

impl TraceReport {
    pub fn from_documents(docs: &SpecDocuments) -> Self {
        let report = build(&docs.requirements, &docs.design, &docs.task_lists);
        tracing::debug!(
            dir = %docs.dir.display(),
            requirements = report.requirements.len(),
            design_elements = report.design_elements.len(),
            tasks = %task::summarize(&report.tasks),
            "trace built"
        );
        Self {
            spec_dir: docs.dir.clone(),
            ..report
        }
    }
}

/// Parse all three document kinds and cross-reference them.
///
/// `task_lists` holds `(list name, text)` pairs; task ids are
/// `<list name>:<ordinal>`.
pub fn build(requirements: &str, design: &str, task_lists: &[(String, String)]) -> TraceReport {
    let requirements_text = requirements;
    let mut requirements = parse_requirements(requirements_text);
    if requirements.is_empty() && task::req_ref_re().is_match(requirements_text) {
        tracing::warn!("requirements mention REQ ids but no declaration was recognised");
    }
    let mut design_elements = parse_design_elements(design);
    let tasks: Vec<Task> = task_lists
        .iter()
        .flat_map(|(list, text)| task::parse_task_list(list, text))
        .collect();

    let index: HashMap<String, usize> = requirements
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.clone(), i))
        .collect();
    let mut unknown_references: Vec<String> = Vec::new();

    for t in &tasks {
        for req_id in &t.requirement_refs {
            match index.get(req_id) {
                Some(&i) => requirements[i].covered_by.push(t.id.clone()),
                None => {
                    if !unknown_references.contains(req_id) {
                        unknown_references.push(req_id.clone());
                    }
                }
            }
        }
        for kind in &t.implements_refs {
            for element in design_elements.iter_mut().filter(|e| e.element_type == *kind) {
                element.implemented_by.push(t.id.clone());
            }
        }
    }

    let covered = requirements.iter().filter(|r| !r.covered_by.is_empty()).count();
    let implemented = design_elements
        .iter()
        .filter(|e| !e.implemented_by.is_empty())
        .count();
    let requirements_coverage = ratio(covered, requirements.len());
    let design_coverage = ratio(implemented, design_elements.len());

    let coverage = Coverage {
        requirements_coverage,
        design_coverage,
        orphaned_tasks: tasks.iter().filter(|t| t.is_orphan()).map(|t| t.id.clone()).collect(),
        uncovered_requirements: requirements
            .iter()
            .filter(|r| r.covered_by.is_empty())
            .map(|r| r.id.clone())
            .collect(),
        unimplemented_elements: design_elements
            .iter()
            .filter(|e| e.implemented_by.is_empty())
            .map(|e| e.id.clone())
            .collect(),
        domain_sensitive_tasks: tasks
            .iter()
            .filter(|t| t.domain_sensitive)
            .map(|t| t.id.clone())
            .collect(),
        unknown_references,
    };

    TraceReport {
        spec_dir: PathBuf::new(),
        timestamp: Utc::now(),
        verdict: verdict(requirements_coverage, design_coverage),
        requirements,
        design_elements,
        tasks,
        coverage,
    }
}

// ---------------------------------------------------------------------------
// Declaration parsing
// ---------------------------------------------------------------------------

static REQ_DECL_RE: OnceLock<Regex> = OnceLock::new();
static REQ_HEADING_RE: OnceLock<Regex> = OnceLock::new();
static REQ_FIELD_RE: OnceLock<Regex> = OnceLock::new();
static DESIGN_DECL_RE: OnceLock<Regex> = OnceLock::new();

/// `### REQ-01: text`, `- **REQ-01**: text`, `REQ-01: text`
fn req_decl_re() -> &'static Regex {
    REQ_DECL_RE.get_or_init(|| {
        Regex::new(r"^\s*(?:#{1,6}\s+|[-*+]\s+)?\**(REQ-\d+)\**\s*:\s*\**\s*(.+?)\s*$").unwrap()
    })
}

/// `### Requirement REQ-01: text`, `### 2. REQ-02: text`
fn req_heading_re() -> &'static Regex {
    REQ_HEADING_RE.get_or_init(|| {
        Regex::new(r"^\s*#{1,6}\s+.*?\**(REQ-\d+)\**\s*:\s*\**\s*(.+?)\s*#*\s*$").unwrap()
    })
}

fn declaration(line: &str) -> Option<regex::Captures<'_>> {
    req_decl_re()
        .captures(line)
        .or_else(|| req_heading_re().captures(line))
}

fn req_field_re() -> &'static Regex {
    REQ_FIELD_RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:[-*+]\s+)?\**(priority|category)\**\s*:\s*\**\s*(.+?)\s*$").unwrap()
    })
}

fn design_decl_re() -> &'static Regex {
    DESIGN_DECL_RE.get_or_init(|| {
        Regex::new(r"(?i)^#{1,6}\s+(component|api|data model|model)\s*:\s*(.+?)\s*#*\s*$").unwrap()
    })
}

fn clean(text: &str) -> String {
    text.trim().trim_matches('*').trim().to_string()
}

/// Requirement declarations in order. A repeated id keeps its first
/// declaration.
pub fn parse_requirements(text: &str) -> Vec<Requirement> {
    let mut out: Vec<Requirement> = Vec::new();
    // Index into `out` of the declaration whose section we are inside.
    let mut open: Option<usize> = None;

    for line in text.lines() {
        if let Some(caps) = declaration(line) {
            let id = caps[1].to_string();
            if out.iter().any(|r| r.id == id) {
                open = None;
                continue;
            }
            out.push(Requirement {
                id,
                description: clean(&caps[2]),
                priority: None,
                category: None,
                covered_by: Vec::new(),
            });
            open = Some(out.len() - 1);
            continue;
        }
        if line.trim_start().starts_with('#') {
            open = None;
            continue;
        }
        let (Some(i), Some(caps)) = (open, req_field_re().captures(line)) else {
            continue;
        };
        let value = clean(&caps[2]);
        let req = &mut out[i];
        match caps[1].to_ascii_lowercase().as_str() {
            "priority" if req.priority.is_none() => req.priority = Some(value),
            "category" if req.category.is_none() => req.category = Some(value),
            _ => {}
        }
    }
    out
}

/// Design declarations (`## Component: Name`, `### API: Name`,
/// `### Data Model: Name`) in order.
pub fn parse_design_elements(text: &str) -> Vec<DesignElement> {
    let mut counters: HashMap<ElementType, usize> = HashMap::new();
    text.lines()
        .filter_map(|line| {
            let caps = design_decl_re().captures(line)?;
            let element_type = match caps[1].to_ascii_lowercase().as_str() {
                "component" => ElementType::Component,
                "api" => ElementType::Api,
                _ => ElementType::Model,
            };
            let n = counters.entry(element_type).or_insert(0);
            *n += 1;
            Some(DesignElement {
                id: format!("{}-{}", element_type.id_prefix(), n),
                element_type,
                name: clean(&caps[2]),
                implemented_by: Vec::new(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
