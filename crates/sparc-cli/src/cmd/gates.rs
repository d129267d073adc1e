use crate::output::{print_json, print_table};
use anyhow::Context;
use serde::Serialize;
use sparc_core::{
    gate::{Gate, Threshold},
    registry::GateRegistry,
    types::{GateType, Phase, Severity},
};
use std::path::Path;

#[derive(Serialize)]
struct GateRow<'a> {
    phase: Phase,
    id: &'a str,
    description: &'a str,
    gate_type: GateType,
    severity: Severity,
    criteria: &'a [String],
    threshold: &'a Threshold,
}

impl<'a> GateRow<'a> {
    fn new(phase: Phase, gate: &'a Gate) -> Self {
        Self {
            phase,
            id: &gate.id,
            description: &gate.description,
            gate_type: gate.gate_type,
            severity: gate.severity,
            criteria: &gate.criteria,
            threshold: &gate.threshold,
        }
    }
}

pub fn run(root: &Path, phase: Option<&str>, json: bool) -> anyhow::Result<i32> {
    let registry = GateRegistry::load(root).context("failed to load gate catalog")?;
    let filter = phase.map(super::parse_phase).transpose()?;
    if let Some(p) = filter {
        registry.gates_for(p)?;
    }

    let rows: Vec<GateRow<'_>> = registry
        .all_phases()
        .iter()
        .filter(|e| filter.map_or(true, |p| p == e.phase))
        .flat_map(|e| e.gates.iter().map(move |g| GateRow::new(e.phase, g)))
        .collect();

    if json {
        print_json(&rows)?;
        return Ok(super::EXIT_OK);
    }

    if rows.is_empty() {
        println!("No gates registered.");
        return Ok(super::EXIT_OK);
    }
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.phase.to_string(),
                r.id.to_string(),
                r.gate_type.to_string(),
                r.severity.to_string(),
                format_threshold(r.threshold),
            ]
        })
        .collect();
    print_table(&["PHASE", "GATE", "TYPE", "SEVERITY", "THRESHOLD"], table);
    Ok(super::EXIT_OK)
}

fn format_threshold(t: &Threshold) -> String {
    match t {
        Threshold::Scalar(v) => format!("{v}"),
        Threshold::PerCriterion(map) => map
            .iter()
            .map(|(k, v)| format!("{k}>={v}"))
            .collect::<Vec<_>>()
            .join(", "),
    }
}
