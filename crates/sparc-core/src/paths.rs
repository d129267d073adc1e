use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SPARC_DIR: &str = ".sparc";
pub const RESULTS_DIR: &str = ".sparc/results";
pub const PHASE_RESULTS_DIR: &str = ".sparc/results/phases";
pub const PIPELINE_RESULTS_DIR: &str = ".sparc/results/pipeline";
pub const TRACE_RESULTS_DIR: &str = ".sparc/results/trace";

pub const CONFIG_FILE: &str = ".sparc/config.yaml";
pub const GATES_FILE: &str = ".sparc/gates.yaml";

pub const REQUIREMENTS_MD: &str = "requirements.md";
pub const DESIGN_MD: &str = "design.md";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn sparc_dir(root: &Path) -> PathBuf {
    root.join(SPARC_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn gates_path(root: &Path) -> PathBuf {
    root.join(GATES_FILE)
}

pub fn results_dir(root: &Path) -> PathBuf {
    root.join(RESULTS_DIR)
}

/// File name for one stored record. The timestamp prefix sorts
/// lexicographically in chronological order.
pub fn record_file_name(timestamp: DateTime<Utc>, id: &str) -> String {
    format!("{}-{}.json", timestamp.format("%Y%m%dT%H%M%S%.6fZ"), id)
}

// ---------------------------------------------------------------------------
// Record keys
// ---------------------------------------------------------------------------

static KEY_RE: OnceLock<Regex> = OnceLock::new();

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap())
}

/// Turn an artifact path into a stable, filesystem-safe directory name.
///
/// `docs/Spec v2/requirements.md` becomes `docs-spec-v2-requirements-md`.
pub fn artifact_key(path: &Path) -> String {
    let lower = path.to_string_lossy().to_lowercase();
    let key = key_re().replace_all(&lower, "-");
    let key = key.trim_matches('-');
    if key.is_empty() {
        "root".to_string()
    } else {
        key.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.sparc/config.yaml")
        );
        assert_eq!(gates_path(root), PathBuf::from("/tmp/proj/.sparc/gates.yaml"));
        assert_eq!(
            results_dir(root),
            PathBuf::from("/tmp/proj/.sparc/results")
        );
    }

    #[test]
    fn artifact_keys_are_filesystem_safe() {
        assert_eq!(
            artifact_key(Path::new("docs/Spec v2/requirements.md")),
            "docs-spec-v2-requirements-md"
        );
        assert_eq!(artifact_key(Path::new("./")), "root");
        assert_eq!(artifact_key(Path::new("/abs/spec")), "abs-spec");
    }

    #[test]
    fn record_names_sort_chronologically() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        assert!(record_file_name(a, "x") < record_file_name(b, "a"));
    }
}
