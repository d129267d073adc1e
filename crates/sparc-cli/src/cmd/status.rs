use crate::output::{print_json, print_table};
use chrono::SecondsFormat;
use serde::Serialize;
use sparc_core::{
    progression::Progression,
    store::{FsResultStore, PhaseState, RecordKey, ResultStore},
    types::Phase,
    SparcError,
};
use std::path::Path;

#[derive(Serialize)]
struct PhaseStatusRow {
    phase: Phase,
    state: PhaseState,
    #[serde(skip_serializing_if = "Option::is_none")]
    recorded_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed_gates: Vec<String>,
}

pub fn run(root: &Path, phase: Option<&str>, json: bool) -> anyhow::Result<i32> {
    let store = FsResultStore::new(root);
    let phases: Vec<Phase> = match phase {
        Some(raw) => vec![super::parse_phase(raw)?],
        None => Phase::all().to_vec(),
    };

    let rows = phases
        .iter()
        .map(|p| row(&store, *p))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let next = Progression::new(&store).next_phase()?;

    if json {
        let value = serde_json::json!({
            "phases": rows,
            "next_phase": next,
        });
        print_json(&value)?;
    } else {
        let table = rows
            .iter()
            .map(|r| {
                vec![
                    r.phase.to_string(),
                    r.state.to_string(),
                    r.recorded_at.clone().unwrap_or_else(|| "-".to_string()),
                    r.artifact.clone().unwrap_or_else(|| "-".to_string()),
                    r.failed_gates.join(", "),
                ]
            })
            .collect();
        print_table(&["PHASE", "STATE", "RECORDED", "ARTIFACT", "FAILED GATES"], table);
        println!();
        match next {
            Some(p) => println!("Next phase: {p}"),
            None => println!("All phases cleared."),
        }
    }

    let all_passed = rows.iter().all(|r| r.state == PhaseState::Passed);
    Ok(if all_passed {
        super::EXIT_OK
    } else {
        super::EXIT_NOT_PASSED
    })
}

fn row(store: &FsResultStore, phase: Phase) -> anyhow::Result<PhaseStatusRow> {
    let record = match store.load(&RecordKey::Phase(phase)) {
        Ok(record) => record,
        Err(SparcError::ResultNotFound(_)) => {
            return Ok(PhaseStatusRow {
                phase,
                state: PhaseState::Unknown,
                recorded_at: None,
                artifact: None,
                failed_gates: Vec::new(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    let result = record.as_phase();
    Ok(PhaseStatusRow {
        phase,
        state: result
            .map(|r| PhaseState::from(r.overall_status))
            .unwrap_or(PhaseState::Unknown),
        recorded_at: Some(record.saved_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        artifact: result.map(|r| r.artifact.display().to_string()),
        failed_gates: result.map(|r| r.failed_gates.clone()).unwrap_or_default(),
    })
}
