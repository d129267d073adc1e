use crate::output::{print_json, print_table, score, truncate};
use anyhow::Context;
use sparc_core::{
    artifact::ArtifactData,
    config::Config,
    pipeline::CompositeResult,
    store::{FsResultStore, RecordKey, ResultStore, StoredResult},
    validators::default_pipeline,
};
use std::path::Path;

pub fn run(root: &Path, artifact_path: &Path, json: bool) -> anyhow::Result<i32> {
    let config = Config::load(root).context("failed to load config")?;
    let artifact = ArtifactData::load(artifact_path)
        .with_context(|| format!("failed to load artifact {}", artifact_path.display()))?;

    let mut result = default_pipeline(&config).run(&artifact);
    let key_path = super::key_path(root, artifact_path);
    result.artifact = key_path.clone();

    let store = FsResultStore::new(root);
    if let Err(e) = store.save(&RecordKey::pipeline(&key_path), StoredResult::Pipeline(result.clone())) {
        tracing::warn!(error = %e, "failed to persist pipeline result");
    }

    if json {
        print_json(&result)?;
    } else {
        print_human(&result);
    }
    Ok(super::verdict_exit(result.overall))
}

fn print_human(result: &CompositeResult) {
    println!("Artifact: {}", result.artifact.display());
    println!();
    let rows = result
        .validators
        .iter()
        .map(|v| {
            vec![
                v.name.clone(),
                format!("{}", v.weight),
                v.status.to_string(),
                score(v.score),
                truncate(&v.summary, 60),
            ]
        })
        .collect();
    print_table(&["VALIDATOR", "WEIGHT", "STATUS", "SCORE", "SUMMARY"], rows);

    let notes: Vec<(&str, &String)> = result
        .validators
        .iter()
        .flat_map(|v| {
            v.errors
                .iter()
                .map(move |m| ("error", m))
                .chain(v.warnings.iter().map(move |m| ("warning", m)))
        })
        .collect();
    if !notes.is_empty() {
        println!();
        for (level, message) in notes {
            println!("[{level}] {message}");
        }
    }

    println!();
    println!(
        "Composite score: {}  errors: {}  warnings: {}",
        score(result.composite_score),
        result.error_count,
        result.warning_count
    );
    println!("Overall: {}", result.overall);
}
