use crate::error::{Result, SparcError};
use crate::store::{PhaseState, ResultStore};
use crate::types::Phase;

/// Sequential phase state machine over recorded results.
///
/// A phase is ready once every earlier phase has a latest result that is not
/// a critical failure.
pub struct Progression<'a> {
    store: &'a dyn ResultStore,
}

impl<'a> Progression<'a> {
    pub fn new(store: &'a dyn ResultStore) -> Self {
        Self { store }
    }

    pub fn check_ready(&self, phase: Phase) -> Result<()> {
        for earlier in Phase::all().iter().take(phase.index()) {
            let reason = match self.store.phase_state(*earlier)? {
                PhaseState::Unknown => format!("phase '{earlier}' has not been run"),
                PhaseState::CriticalFailure => {
                    format!("phase '{earlier}' ended in critical failure")
                }
                PhaseState::Passed | PhaseState::PartialFailure => continue,
            };
            return Err(SparcError::Blocked { phase, reason });
        }
        Ok(())
    }

    /// First phase not yet cleared, or `None` when all five are.
    pub fn next_phase(&self) -> Result<Option<Phase>> {
        for phase in Phase::all() {
            match self.store.phase_state(*phase)? {
                PhaseState::Passed | PhaseState::PartialFailure => continue,
                PhaseState::Unknown | PhaseState::CriticalFailure => return Ok(Some(*phase)),
            }
        }
        Ok(None)
    }

    /// Latest known state of every phase, in order.
    pub fn states(&self) -> Result<Vec<(Phase, PhaseState)>> {
        Phase::all()
            .iter()
            .map(|p| Ok((*p, self.store.phase_state(*p)?)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
