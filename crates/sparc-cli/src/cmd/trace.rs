use crate::output::{print_json, print_table, score};
use anyhow::Context;
use sparc_core::{
    artifact::SpecDocuments,
    store::{FsResultStore, RecordKey, ResultStore, StoredResult},
    trace::TraceReport,
};
use std::path::Path;

pub fn run(root: &Path, spec_dir: &Path, json: bool) -> anyhow::Result<i32> {
    let docs = SpecDocuments::load(spec_dir)
        .with_context(|| format!("failed to read spec directory {}", spec_dir.display()))?;
    let mut report = TraceReport::from_documents(&docs);
    let key_path = super::key_path(root, spec_dir);
    report.spec_dir = key_path.clone();

    let store = FsResultStore::new(root);
    if let Err(e) = store.save(&RecordKey::trace(&key_path), StoredResult::Trace(report.clone())) {
        tracing::warn!(error = %e, "failed to persist trace result");
    }

    if json {
        print_json(&report)?;
    } else {
        print_human(&report);
    }
    Ok(super::verdict_exit(report.verdict))
}

fn print_human(report: &TraceReport) {
    let c = &report.coverage;
    println!("Spec: {}", report.spec_dir.display());
    println!();

    let rows = report
        .requirements
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                r.priority.clone().unwrap_or_else(|| "-".to_string()),
                if r.covered_by.is_empty() {
                    "-".to_string()
                } else {
                    r.covered_by.join(", ")
                },
            ]
        })
        .collect();
    print_table(&["REQUIREMENT", "PRIORITY", "COVERED BY"], rows);
    println!();

    println!(
        "Requirements coverage: {}% ({} of {})",
        score(c.requirements_coverage),
        report.requirements.len() - c.uncovered_requirements.len(),
        report.requirements.len()
    );
    println!(
        "Design coverage:       {}% ({} of {})",
        score(c.design_coverage),
        report.design_elements.len() - c.unimplemented_elements.len(),
        report.design_elements.len()
    );
    let lists: [(&str, &Vec<String>); 5] = [
        ("Uncovered requirements", &c.uncovered_requirements),
        ("Unimplemented elements", &c.unimplemented_elements),
        ("Orphaned tasks", &c.orphaned_tasks),
        ("Domain-sensitive tasks", &c.domain_sensitive_tasks),
        ("Undeclared references", &c.unknown_references),
    ];
    for (label, ids) in lists {
        if !ids.is_empty() {
            println!("{label}: {}", ids.join(", "));
        }
    }
    println!("Verdict: {}", report.verdict);
}
