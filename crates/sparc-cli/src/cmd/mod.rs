pub mod config;
pub mod gates;
pub mod init;
pub mod pipeline;
pub mod status;
pub mod trace;
pub mod validate;

use anyhow::Context;
use sparc_core::types::{Phase, Verdict};
use std::path::{Path, PathBuf};

pub const EXIT_OK: i32 = 0;
/// Non-pass verdict, unknown status, or any error.
pub const EXIT_NOT_PASSED: i32 = 1;
pub const EXIT_CRITICAL: i32 = 2;

pub fn verdict_exit(verdict: Verdict) -> i32 {
    if verdict.is_pass() {
        EXIT_OK
    } else {
        EXIT_NOT_PASSED
    }
}

pub fn parse_phase(raw: &str) -> anyhow::Result<Phase> {
    raw.parse::<Phase>()
        .with_context(|| format!("expected one of: {}", phase_names().join(", ")))
}

fn phase_names() -> Vec<&'static str> {
    Phase::all().iter().map(|p| p.as_str()).collect()
}

/// Path used for record keys: relative to the project root when possible so
/// the same artifact gets the same key from any working directory.
pub fn key_path(root: &Path, path: &Path) -> PathBuf {
    match std::env::current_dir() {
        Ok(cwd) => key_path_from(&cwd, root, path),
        Err(_) => path.to_path_buf(),
    }
}

fn key_path_from(cwd: &Path, root: &Path, path: &Path) -> PathBuf {
    let root = absolute(cwd, root);
    let absolute = absolute(cwd, path);
    match absolute.strip_prefix(&root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}

/// Canonical form when the path exists, otherwise joined onto `cwd`.
fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    let joined = cwd.join(path);
    joined.canonicalize().unwrap_or(joined)
}
