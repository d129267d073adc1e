//! Gate registry: an explicit, constructed catalog of phases and their
//! ordered gates. There is no global instance; callers build one and hand it
//! to the orchestrator.

use crate::error::{Result, SparcError};
use crate::gate::{Gate, GateDefinition, Threshold};
use crate::paths;
use crate::types::Phase;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The catalog shipped with the engine.
pub const BUILTIN_CATALOG: &str = include_str!("gates.yaml");

// ---------------------------------------------------------------------------
// Catalog (serialized form)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    pub phases: Vec<PhaseCatalog>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseCatalog {
    pub phase: Phase,
    #[serde(default)]
    pub gates: Vec<GateDefinition>,
}

// ---------------------------------------------------------------------------
// GateRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PhaseEntry {
    pub phase: Phase,
    pub gates: Vec<Gate>,
}

impl PhaseEntry {
    pub fn gate_ids(&self) -> Vec<&str> {
        self.gates.iter().map(|g| g.id.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GateRegistry {
    phases: Vec<PhaseEntry>,
}

impl GateRegistry {
    /// An empty registry; populate it with [`GateRegistry::register`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let catalog: Catalog = serde_yaml::from_str(yaml)?;
        Self::from_catalog(catalog)
    }

    /// Project catalog at `.sparc/gates.yaml` if present, else the built-in one.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::gates_path(root);
        if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            tracing::debug!(path = %path.display(), "loading project gate catalog");
            Self::from_yaml(&data)
        } else {
            Self::builtin()
        }
    }

    pub fn from_catalog(catalog: Catalog) -> Result<Self> {
        let mut registry = Self::new();
        let mut last: Option<Phase> = None;
        for entry in catalog.phases {
            if last.is_some_and(|p| p >= entry.phase) {
                return Err(SparcError::InvalidCatalog(format!(
                    "phase '{}' is duplicated or out of order",
                    entry.phase
                )));
            }
            last = Some(entry.phase);
            registry.phases.push(PhaseEntry {
                phase: entry.phase,
                gates: Vec::new(),
            });
            for def in entry.gates {
                registry.register(entry.phase, Gate::from(def))?;
            }
        }
        Ok(registry)
    }

    /// Append `gate` to `phase`, creating the phase entry in order if needed.
    pub fn register(&mut self, phase: Phase, gate: Gate) -> Result<()> {
        if self.find(&gate.id).is_some() {
            return Err(SparcError::InvalidCatalog(format!(
                "duplicate gate id '{}'",
                gate.id
            )));
        }
        if let Threshold::PerCriterion(map) = &gate.threshold {
            if map.is_empty() {
                return Err(SparcError::InvalidCatalog(format!(
                    "gate '{}' has an empty per-criterion threshold",
                    gate.id
                )));
            }
            if let Some(unknown) = map.keys().find(|k| !gate.criteria.contains(k)) {
                return Err(SparcError::InvalidCatalog(format!(
                    "gate '{}' sets a threshold for unknown criterion '{unknown}'",
                    gate.id
                )));
            }
        }

        let idx = match self.phases.iter().position(|e| e.phase == phase) {
            Some(i) => i,
            None => {
                let at = self
                    .phases
                    .iter()
                    .position(|e| e.phase > phase)
                    .unwrap_or(self.phases.len());
                self.phases.insert(
                    at,
                    PhaseEntry {
                        phase,
                        gates: Vec::new(),
                    },
                );
                at
            }
        };
        self.phases[idx].gates.push(gate);
        Ok(())
    }

    pub fn gates_for(&self, phase: Phase) -> Result<&[Gate]> {
        self.phases
            .iter()
            .find(|e| e.phase == phase)
            .map(|e| e.gates.as_slice())
            .ok_or_else(|| SparcError::UnknownPhase(phase.to_string()))
    }

    pub fn all_phases(&self) -> &[PhaseEntry] {
        &self.phases
    }

    pub fn gate(&self, id: &str) -> Result<(Phase, &Gate)> {
        self.find(id)
            .ok_or_else(|| SparcError::UnknownGate(id.to_string()))
    }

    fn find(&self, id: &str) -> Option<(Phase, &Gate)> {
        self.phases
            .iter()
            .find_map(|e| e.gates.iter().find(|g| g.id == id).map(|g| (e.phase, g)))
    }

    pub fn gate_count(&self) -> usize {
        self.phases.iter().map(|e| e.gates.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
