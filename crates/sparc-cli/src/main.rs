mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sparc",
    about = "Phase-gated review of SPARC documentation: quality gates, composite scoring, traceability",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .sparc/ or .git/)
    #[arg(long, global = true, env = "SPARC_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .sparc/config.yaml and .sparc/gates.yaml if missing
    Init,

    /// Evaluate an artifact against every gate of a phase
    ValidatePhase {
        /// specification, pseudocode, architecture, refinement or completion
        phase: String,
        /// Path to the artifact document
        artifact: PathBuf,
        /// Refuse to run unless every earlier phase has cleared
        #[arg(long)]
        strict: bool,
    },

    /// Run the weighted structural/compliance/traceability pipeline
    RunPipeline {
        /// Path to the artifact document
        artifact: PathBuf,
    },

    /// Compute requirement and design coverage for a spec directory
    Trace {
        /// Directory containing requirements.md, design.md and tasks*.md
        spec_dir: PathBuf,
    },

    /// Show the latest recorded result per phase
    Status {
        /// Limit to one phase
        phase: Option<String>,
    },

    /// List the gate registry
    Gates {
        /// Limit to one phase
        phase: Option<String>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    // Usage errors exit 1 like every other failure; 2 is reserved for a
    // critical gate failure.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { cmd::EXIT_NOT_PASSED } else { cmd::EXIT_OK };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::ValidatePhase {
            phase,
            artifact,
            strict,
        } => cmd::validate::run(&root, &phase, &artifact, strict, cli.json),
        Commands::RunPipeline { artifact } => cmd::pipeline::run(&root, &artifact, cli.json),
        Commands::Trace { spec_dir } => cmd::trace::run(&root, &spec_dir, cli.json),
        Commands::Status { phase } => cmd::status::run(&root, phase.as_deref(), cli.json),
        Commands::Gates { phase } => cmd::gates::run(&root, phase.as_deref(), cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    match result {
        Ok(code) if code != cmd::EXIT_OK => std::process::exit(code),
        Ok(_) => {}
        Err(e) => {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
            std::process::exit(cmd::EXIT_NOT_PASSED);
        }
    }
}
