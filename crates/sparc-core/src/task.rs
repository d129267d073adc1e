use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Terms that mark a task as touching domain-sensitive (safety-relevant)
/// behaviour. Matching is a lowercase substring test.
pub const DOMAIN_KEYWORDS: &[&str] = &[
    "medical",
    "patient",
    "clinical",
    "diagnos",
    "symptom",
    "treatment",
    "medication",
    "emergency",
    "safety",
    "health",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Component,
    Api,
    Model,
}

impl ElementType {
    pub fn all() -> &'static [ElementType] {
        &[ElementType::Component, ElementType::Api, ElementType::Model]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Component => "component",
            ElementType::Api => "api",
            ElementType::Model => "model",
        }
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            ElementType::Component => "COMP",
            ElementType::Api => "API",
            ElementType::Model => "MODEL",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// One checklist item from a task list. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// `<list>:<ordinal>`, unique across every list fed to one trace run.
    pub id: String,
    pub list: String,
    /// Digits as written; an ordinal of any length still yields a task.
    pub ordinal: String,
    pub description: String,
    pub requirement_refs: Vec<String>,
    pub implements_refs: Vec<ElementType>,
    pub file_refs: Vec<String>,
    pub domain_sensitive: bool,
}

impl Task {
    pub fn is_orphan(&self) -> bool {
        self.requirement_refs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

static TASK_RE: OnceLock<Regex> = OnceLock::new();
static REQ_REF_RE: OnceLock<Regex> = OnceLock::new();
static IMPL_RE: OnceLock<Regex> = OnceLock::new();
static FILE_RE: OnceLock<Regex> = OnceLock::new();

fn task_re() -> &'static Regex {
    TASK_RE.get_or_init(|| Regex::new(r"^-\s*\[\s*\]\s*(\d+)\.\s+(.+)$").unwrap())
}

pub(crate) fn req_ref_re() -> &'static Regex {
    REQ_REF_RE.get_or_init(|| Regex::new(r"\bREQ-\d+\b").unwrap())
}

fn impl_re() -> &'static Regex {
    IMPL_RE.get_or_init(|| Regex::new(r"(?i)\b(component|api|model)s?\b").unwrap())
}

fn file_re() -> &'static Regex {
    FILE_RE.get_or_init(|| {
        Regex::new(
            r"[A-Za-z0-9_./-]*[A-Za-z0-9_-]\.(?:rs|ts|tsx|js|jsx|py|go|java|kt|rb|md|json|ya?ml|toml|sql|sh|html|css)\b",
        )
        .unwrap()
    })
}

/// Parse every checklist line of a task list. Non-matching lines are skipped.
pub fn parse_task_list(list: &str, text: &str) -> Vec<Task> {
    text.lines()
        .filter_map(|line| {
            let caps = task_re().captures(line)?;
            Some(parse_task(list, &caps[1], caps[2].trim()))
        })
        .collect()
}

fn parse_task(list: &str, ordinal: &str, description: &str) -> Task {
    let mut requirement_refs: Vec<String> = Vec::new();
    for m in req_ref_re().find_iter(description) {
        if !requirement_refs.iter().any(|r| r == m.as_str()) {
            requirement_refs.push(m.as_str().to_string());
        }
    }

    let mut implements_refs: Vec<ElementType> = Vec::new();
    for caps in impl_re().captures_iter(description) {
        let kind = match caps[1].to_ascii_lowercase().as_str() {
            "component" => ElementType::Component,
            "api" => ElementType::Api,
            _ => ElementType::Model,
        };
        if !implements_refs.contains(&kind) {
            implements_refs.push(kind);
        }
    }

    let mut file_refs: Vec<String> = Vec::new();
    for m in file_re().find_iter(description) {
        let path = m.as_str().trim_start_matches("./").to_string();
        if !file_refs.contains(&path) {
            file_refs.push(path);
        }
    }

    Task {
        id: format!("{list}:{ordinal}"),
        list: list.to_string(),
        ordinal: ordinal.to_string(),
        description: description.to_string(),
        requirement_refs,
        implements_refs,
        file_refs,
        domain_sensitive: is_domain_sensitive(description, DOMAIN_KEYWORDS),
    }
}

/// Lexical membership test, not a semantic one: "healthcheck" counts.
pub fn is_domain_sensitive(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Human-readable summary: "5 tasks, 1 orphaned, 2 domain-sensitive"
pub fn summarize(tasks: &[Task]) -> String {
    let total = tasks.len();
    let orphaned = tasks.iter().filter(|t| t.is_orphan()).count();
    let sensitive = tasks.iter().filter(|t| t.domain_sensitive).count();
    format!("{total} tasks, {orphaned} orphaned, {sensitive} domain-sensitive")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
