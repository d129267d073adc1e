//! Artifact loading: raw document text plus the lightweight structure the
//! gates and validators look at (headings, sections, list items, fences).

use crate::error::{Result, SparcError};
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Heading / Section
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    /// 1-indexed line number.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: Heading,
    /// Text between this heading and the next one, trimmed.
    pub body: String,
}

// ---------------------------------------------------------------------------
// ArtifactData
// ---------------------------------------------------------------------------

/// Immutable snapshot of one document. Gates and validators only ever see
/// this, never the file system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactData {
    pub path: PathBuf,
    pub content: String,
    pub headings: Vec<Heading>,
    pub sections: Vec<Section>,
    pub list_items: usize,
    pub code_blocks: usize,
    pub word_count: usize,
    #[serde(skip)]
    lowercase: String,
}

static HEADING_RE: OnceLock<Regex> = OnceLock::new();
static LIST_ITEM_RE: OnceLock<Regex> = OnceLock::new();

fn heading_re() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").unwrap())
}

fn list_item_re() -> &'static Regex {
    LIST_ITEM_RE.get_or_init(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+\S").unwrap())
}

impl ArtifactData {
    pub fn load(path: &Path) -> Result<Self> {
        let content = crate::io::read_text(path)?;
        Ok(Self::from_text(path, content))
    }

    pub fn from_text(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let content = content.into();
        let mut headings = Vec::new();
        let mut list_items = 0;
        let mut code_blocks = 0;
        let mut in_fence = false;

        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                if !in_fence {
                    code_blocks += 1;
                }
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            if let Some(caps) = heading_re().captures(line) {
                headings.push(Heading {
                    level: caps[1].len() as u8,
                    text: caps[2].to_string(),
                    line: idx + 1,
                });
            } else if list_item_re().is_match(line) {
                list_items += 1;
            }
        }

        let sections = split_sections(&content, &headings);
        let word_count = content.split_whitespace().count();
        let lowercase = content.to_lowercase();

        Self {
            path: path.into(),
            content,
            headings,
            sections,
            list_items,
            code_blocks,
            word_count,
            lowercase,
        }
    }

    /// Case-insensitive substring test over the whole document.
    pub fn contains(&self, needle: &str) -> bool {
        self.lowercase_content().contains(&needle.to_lowercase())
    }

    /// Case-insensitive substring test over heading text only.
    pub fn has_heading_containing(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.headings
            .iter()
            .any(|h| h.text.to_lowercase().contains(&needle))
    }

    pub fn section(&self, heading: &str) -> Option<&Section> {
        let needle = heading.to_lowercase();
        self.sections
            .iter()
            .find(|s| s.heading.text.to_lowercase().contains(&needle))
    }

    fn lowercase_content(&self) -> std::borrow::Cow<'_, str> {
        // Deserialized snapshots skip the cached copy.
        if self.lowercase.is_empty() && !self.content.is_empty() {
            std::borrow::Cow::Owned(self.content.to_lowercase())
        } else {
            std::borrow::Cow::Borrowed(&self.lowercase)
        }
    }
}

fn split_sections(content: &str, headings: &[Heading]) -> Vec<Section> {
    let lines: Vec<&str> = content.lines().collect();
    headings
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let start = h.line;
            let end = headings
                .get(i + 1)
                .map(|next| next.line - 1)
                .unwrap_or(lines.len());
            let body = lines
                .get(start..end)
                .map(|ls| ls.join("\n"))
                .unwrap_or_default();
            Section {
                heading: h.clone(),
                body: body.trim().to_string(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// SpecDocuments
// ---------------------------------------------------------------------------

/// The documents of one spec directory that feed the traceability builder.
#[derive(Debug, Clone)]
pub struct SpecDocuments {
    pub dir: PathBuf,
    pub requirements: String,
    pub design: String,
    /// `(list name, text)` for every `tasks*.md`, sorted by file name.
    pub task_lists: Vec<(String, String)>,
}

impl SpecDocuments {
    /// Load `requirements.md`, `design.md` and every `tasks*.md` in `dir`.
    ///
    /// A missing requirements document is an error; a missing design document
    /// or task list is treated as empty.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(SparcError::ArtifactNotFound(dir.display().to_string()));
        }
        let requirements = crate::io::read_text(&dir.join(paths::REQUIREMENTS_MD))?;
        let design_path = dir.join(paths::DESIGN_MD);
        let design = if design_path.exists() {
            crate::io::read_text(&design_path)?
        } else {
            String::new()
        };

        let mut task_files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_file() && name.starts_with("tasks") && name.ends_with(".md")
            {
                task_files.push(name);
            }
        }
        task_files.sort();

        let mut task_lists = Vec::with_capacity(task_files.len());
        for name in task_files {
            let text = crate::io::read_text(&dir.join(&name))?;
            let list = name.trim_end_matches(".md").to_string();
            task_lists.push((list, text));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            requirements,
            design,
            task_lists,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DOC: &str = "# Title\n\nIntro text.\n\n## Requirements\n\n- one\n- two\n\n```\n# not a heading\n- not an item\n```\n\n## Empty\n";

    #[test]
    fn extracts_structure() {
        let a = ArtifactData::from_text("spec.md", DOC);
        assert_eq!(a.headings.len(), 3);
        assert_eq!(a.headings[0].level, 1);
        assert_eq!(a.headings[1].text, "Requirements");
        assert_eq!(a.headings[1].line, 5);
        assert_eq!(a.list_items, 2);
        assert_eq!(a.code_blocks, 1);
    }

    #[test]
    fn sections_carry_bodies() {
        let a = ArtifactData::from_text("spec.md", DOC);
        let req = a.section("requirements").unwrap();
        assert!(req.body.starts_with("- one"));
        assert_eq!(a.section("empty").unwrap().body, "");
        assert_eq!(a.sections[0].body, "Intro text.");
    }

    #[test]
    fn contains_is_case_insensitive() {
        let a = ArtifactData::from_text("spec.md", "Medical DISCLAIMER applies");
        assert!(a.contains("disclaimer"));
        assert!(a.contains("medical disclaimer"));
        assert!(!a.contains("emergency"));
        assert!(!a.has_heading_containing("disclaimer"));
    }

    #[test]
    fn deserialized_snapshot_still_matches() {
        let a = ArtifactData::from_text("spec.md", "Has a Disclaimer");
        let json = serde_json::to_string(&a).unwrap();
        let back: ArtifactData = serde_json::from_str(&json).unwrap();
        assert!(back.contains("disclaimer"));
    }

    #[test]
    fn load_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let err = ArtifactData::load(&dir.path().join("missing.md")).unwrap_err();
        assert!(matches!(err, SparcError::ArtifactNotFound(_)));
    }

    #[test]
    fn spec_documents_discover_task_lists() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("requirements.md"), "### REQ-01: Login").unwrap();
        std::fs::write(dir.path().join("tasks-backend.md"), "- [ ] 1. b").unwrap();
        std::fs::write(dir.path().join("tasks.md"), "- [ ] 1. a").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let docs = SpecDocuments::load(dir.path()).unwrap();
        assert!(docs.design.is_empty());
        let names: Vec<&str> = docs.task_lists.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["tasks-backend", "tasks"]);
    }

    #[test]
    fn spec_documents_require_requirements() {
        let dir = TempDir::new().unwrap();
        let err = SpecDocuments::load(dir.path()).unwrap_err();
        assert!(matches!(err, SparcError::ArtifactNotFound(_)));
    }
}
