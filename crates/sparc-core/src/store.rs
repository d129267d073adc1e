//! Durable, append-only record of validation runs.
//!
//! Every save writes a new record; nothing is edited in place. The latest
//! record for a key is the one with the greatest timestamp.

use crate::error::{Result, SparcError};
use crate::orchestrator::PhaseResult;
use crate::paths;
use crate::pipeline::CompositeResult;
use crate::trace::TraceReport;
use crate::types::{Phase, PhaseStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

// ---------------------------------------------------------------------------
// RecordKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Phase(Phase),
    /// Composite pipeline run, keyed by artifact identity.
    Pipeline(String),
    /// Traceability run, keyed by spec directory identity.
    Trace(String),
}

impl RecordKey {
    pub fn pipeline(artifact: &Path) -> Self {
        RecordKey::Pipeline(paths::artifact_key(artifact))
    }

    pub fn trace(spec_dir: &Path) -> Self {
        RecordKey::Trace(paths::artifact_key(spec_dir))
    }

    fn relative_dir(&self) -> PathBuf {
        match self {
            RecordKey::Phase(p) => Path::new(paths::PHASE_RESULTS_DIR).join(p.as_str()),
            RecordKey::Pipeline(k) => Path::new(paths::PIPELINE_RESULTS_DIR).join(k),
            RecordKey::Trace(k) => Path::new(paths::TRACE_RESULTS_DIR).join(k),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Phase(p) => write!(f, "phase/{p}"),
            RecordKey::Pipeline(k) => write!(f, "pipeline/{k}"),
            RecordKey::Trace(k) => write!(f, "trace/{k}"),
        }
    }
}

// ---------------------------------------------------------------------------
// StoredResult / StoredRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredResult {
    Phase(PhaseResult),
    Pipeline(CompositeResult),
    Trace(TraceReport),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub key: String,
    pub saved_at: DateTime<Utc>,
    pub result: StoredResult,
}

impl StoredRecord {
    fn new(key: &RecordKey, result: StoredResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            key: key.to_string(),
            saved_at: Utc::now(),
            result,
        }
    }

    pub fn as_phase(&self) -> Option<&PhaseResult> {
        match &self.result {
            StoredResult::Phase(p) => Some(p),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseState
// ---------------------------------------------------------------------------

/// What the store knows about a phase. `Unknown` means never run, which is
/// not the same thing as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    Unknown,
    Passed,
    PartialFailure,
    CriticalFailure,
}

impl From<PhaseStatus> for PhaseState {
    fn from(s: PhaseStatus) -> Self {
        match s {
            PhaseStatus::Passed => PhaseState::Passed,
            PhaseStatus::PartialFailure => PhaseState::PartialFailure,
            PhaseStatus::CriticalFailure => PhaseState::CriticalFailure,
        }
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseState::Unknown => "unknown",
            PhaseState::Passed => "passed",
            PhaseState::PartialFailure => "partial_failure",
            PhaseState::CriticalFailure => "critical_failure",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ResultStore
// ---------------------------------------------------------------------------

pub trait ResultStore: Send + Sync {
    /// Append a new record for `key`.
    fn save(&self, key: &RecordKey, result: StoredResult) -> Result<StoredRecord>;

    /// Every record for `key`, oldest first.
    fn history(&self, key: &RecordKey) -> Result<Vec<StoredRecord>>;

    /// The latest record for `key`, or `ResultNotFound`.
    fn load(&self, key: &RecordKey) -> Result<StoredRecord> {
        self.history(key)?
            .pop()
            .ok_or_else(|| SparcError::ResultNotFound(key.to_string()))
    }

    fn phase_state(&self, phase: Phase) -> Result<PhaseState> {
        match self.load(&RecordKey::Phase(phase)) {
            Ok(record) => Ok(record
                .as_phase()
                .map(|p| PhaseState::from(p.overall_status))
                .unwrap_or(PhaseState::Unknown)),
            Err(SparcError::ResultNotFound(_)) => Ok(PhaseState::Unknown),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// FsResultStore
// ---------------------------------------------------------------------------

/// JSON records under `.sparc/results/<namespace>/<key>/<timestamp>-<id>.json`.
#[derive(Debug, Clone)]
pub struct FsResultStore {
    root: PathBuf,
}

impl FsResultStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn dir_for(&self, key: &RecordKey) -> PathBuf {
        self.root.join(key.relative_dir())
    }
}

impl ResultStore for FsResultStore {
    fn save(&self, key: &RecordKey, result: StoredResult) -> Result<StoredRecord> {
        let record = StoredRecord::new(key, result);
        let path = self
            .dir_for(key)
            .join(paths::record_file_name(record.saved_at, &record.id));
        let persist = || -> Result<()> {
            let data = serde_json::to_string_pretty(&record)?;
            crate::io::atomic_write(&path, data.as_bytes())
        };
        persist().map_err(|e| SparcError::Persistence {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(key = %key, path = %path.display(), "result saved");
        Ok(record)
    }

    fn history(&self, key: &RecordKey) -> Result<Vec<StoredRecord>> {
        let dir = self.dir_for(key);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") {
                names.push(name);
            }
        }
        names.sort();

        let mut records = Vec::with_capacity(names.len());
        for name in names {
            let path = dir.join(&name);
            let data = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<StoredRecord>(&data) {
                Ok(r) => records.push(r),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable result record");
                }
            }
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// MemoryResultStore
// ---------------------------------------------------------------------------

/// In-process store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    records: RwLock<HashMap<RecordKey, Vec<StoredRecord>>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for MemoryResultStore {
    fn save(&self, key: &RecordKey, result: StoredResult) -> Result<StoredRecord> {
        let record = StoredRecord::new(key, result);
        let mut guard = self.records.write().map_err(|_| SparcError::Persistence {
            key: key.to_string(),
            message: "store lock poisoned".to_string(),
        })?;
        guard.entry(key.clone()).or_default().push(record.clone());
        Ok(record)
    }

    fn history(&self, key: &RecordKey) -> Result<Vec<StoredRecord>> {
        let guard = self.records.read().map_err(|_| SparcError::Persistence {
            key: key.to_string(),
            message: "store lock poisoned".to_string(),
        })?;
        Ok(guard.get(key).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Verdict;
    use tempfile::TempDir;

    fn phase_result(phase: Phase, status: PhaseStatus) -> PhaseResult {
        PhaseResult {
            phase,
            artifact: PathBuf::from("spec.md"),
            timestamp: Utc::now(),
            total_gates: 0,
            passed_gates: 0,
            results: vec![],
            failed_gates: vec![],
            critical_failures: vec![],
            overall_status: status,
        }
    }

    fn composite() -> CompositeResult {
        CompositeResult {
            artifact: PathBuf::from("docs/spec.md"),
            timestamp: Utc::now(),
            validators: vec![],
            composite_score: 100.0,
            error_count: 0,
            warning_count: 0,
            overall: Verdict::Pass,
        }
    }

    #[test]
    fn unknown_is_distinct_from_failed() {
        let store = MemoryResultStore::new();
        assert_eq!(
            store.phase_state(Phase::Specification).unwrap(),
            PhaseState::Unknown
        );
        store
            .save(
                &RecordKey::Phase(Phase::Specification),
                StoredResult::Phase(phase_result(Phase::Specification, PhaseStatus::CriticalFailure)),
            )
            .unwrap();
        assert_eq!(
            store.phase_state(Phase::Specification).unwrap(),
            PhaseState::CriticalFailure
        );
        assert_eq!(
            store.phase_state(Phase::Pseudocode).unwrap(),
            PhaseState::Unknown
        );
    }

    #[test]
    fn load_missing_key_is_not_found() {
        let store = MemoryResultStore::new();
        let err = store.load(&RecordKey::Trace("x".to_string())).unwrap_err();
        assert!(matches!(err, SparcError::ResultNotFound(ref k) if k == "trace/x"));
    }

    #[test]
    fn fs_store_appends_and_returns_latest() {
        let dir = TempDir::new().unwrap();
        let store = FsResultStore::new(dir.path());
        let key = RecordKey::Phase(Phase::Architecture);

        store
            .save(&key, StoredResult::Phase(phase_result(Phase::Architecture, PhaseStatus::PartialFailure)))
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .save(&key, StoredResult::Phase(phase_result(Phase::Architecture, PhaseStatus::Passed)))
            .unwrap();

        let history = store.history(&key).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(store.phase_state(Phase::Architecture).unwrap(), PhaseState::Passed);
        assert!(dir.path().join(".sparc/results/phases/architecture").is_dir());
    }

    #[test]
    fn fs_store_keys_pipeline_runs_by_artifact() {
        let dir = TempDir::new().unwrap();
        let store = FsResultStore::new(dir.path());
        let key = RecordKey::pipeline(Path::new("docs/spec.md"));
        let saved = store.save(&key, StoredResult::Pipeline(composite())).unwrap();
        assert_eq!(saved.key, "pipeline/docs-spec-md");

        let loaded = store.load(&key).unwrap();
        assert_eq!(loaded.id, saved.id);
        assert!(matches!(loaded.result, StoredResult::Pipeline(ref c) if c.overall == Verdict::Pass));
    }

    #[test]
    fn fs_store_skips_corrupt_records() {
        let dir = TempDir::new().unwrap();
        let store = FsResultStore::new(dir.path());
        let key = RecordKey::Phase(Phase::Completion);
        let kdir = store.dir_for(&key);
        std::fs::create_dir_all(&kdir).unwrap();
        std::fs::write(kdir.join("00000000-bad.json"), "{not json").unwrap();
        assert!(store.history(&key).unwrap().is_empty());
        assert_eq!(store.phase_state(Phase::Completion).unwrap(), PhaseState::Unknown);
    }

    #[test]
    fn fs_store_reports_persistence_error() {
        let dir = TempDir::new().unwrap();
        // A file where the results directory should be makes every write fail.
        std::fs::create_dir_all(dir.path().join(".sparc")).unwrap();
        std::fs::write(dir.path().join(".sparc/results"), "blocker").unwrap();
        let store = FsResultStore::new(dir.path());
        let err = store
            .save(
                &RecordKey::Phase(Phase::Refinement),
                StoredResult::Phase(phase_result(Phase::Refinement, PhaseStatus::Passed)),
            )
            .unwrap_err();
        assert!(matches!(err, SparcError::Persistence { .. }));
    }
}
