use crate::output::{print_json, print_table, score, truncate};
use anyhow::Context;
use sparc_core::{
    artifact::ArtifactData,
    config::Config,
    hook::ShellHook,
    orchestrator::{PhaseOrchestrator, PhaseResult},
    progression::Progression,
    registry::GateRegistry,
    store::FsResultStore,
    types::PhaseStatus,
    SparcError,
};
use std::path::Path;
use std::sync::Arc;

pub fn run(
    root: &Path,
    phase: &str,
    artifact_path: &Path,
    strict: bool,
    json: bool,
) -> anyhow::Result<i32> {
    let phase = super::parse_phase(phase)?;
    let config = Config::load(root).context("failed to load config")?;
    let registry = GateRegistry::load(root).context("failed to load gate catalog")?;
    let store = Arc::new(FsResultStore::new(root));

    if strict {
        Progression::new(store.as_ref()).check_ready(phase)?;
    }

    let mut artifact = ArtifactData::load(artifact_path)
        .with_context(|| format!("failed to load artifact {}", artifact_path.display()))?;
    artifact.path = super::key_path(root, artifact_path);

    let mut orchestrator = PhaseOrchestrator::new(Arc::new(registry))
        .with_store(store)
        .with_gate_timeout(config.gate_timeout());
    if let Some(command) = config.hooks.post_phase.as_deref() {
        orchestrator =
            orchestrator.with_observer(Arc::new(ShellHook::new(command, root, config.hook_timeout())));
    }

    let (result, code) = match orchestrator.run_phase(phase, Arc::new(artifact)) {
        Ok(result) => {
            let code = if result.overall_status == PhaseStatus::Passed {
                super::EXIT_OK
            } else {
                super::EXIT_NOT_PASSED
            };
            (result, code)
        }
        Err(SparcError::CriticalGateFailure { result, .. }) => (*result, super::EXIT_CRITICAL),
        Err(e) => return Err(e.into()),
    };

    if json {
        print_json(&result)?;
    } else {
        print_human(&result);
    }
    Ok(code)
}

fn print_human(result: &PhaseResult) {
    println!(
        "Phase: {}  artifact: {}",
        result.phase,
        result.artifact.display()
    );
    println!();
    let rows = result
        .results
        .iter()
        .map(|r| {
            vec![
                r.gate_id.clone(),
                r.severity.to_string(),
                score(r.score),
                r.status.to_string(),
                truncate(&r.summary, 60),
            ]
        })
        .collect();
    print_table(&["GATE", "SEVERITY", "SCORE", "STATUS", "SUMMARY"], rows);
    println!();
    println!(
        "Result: {} ({}/{} gates passed)",
        result.overall_status, result.passed_gates, result.total_gates
    );
    if !result.critical_failures.is_empty() {
        println!(
            "Critical failures: {} (progression blocked)",
            result.critical_failures.join(", ")
        );
    }
}
