use anyhow::Context;
use sparc_core::{config::Config, io, paths, registry::BUILTIN_CATALOG};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<i32> {
    println!("Initializing SPARC in: {}", root.display());

    for p in [paths::sparc_dir(root), paths::results_dir(root)] {
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    let gates_path = paths::gates_path(root);
    let written = io::write_if_missing(&gates_path, BUILTIN_CATALOG.as_bytes())
        .context("failed to write gates.yaml")?;
    if written {
        println!("  created: {}", paths::GATES_FILE);
    } else {
        println!("  exists:  {}", paths::GATES_FILE);
    }

    Ok(super::EXIT_OK)
}
