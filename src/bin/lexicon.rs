//! Lexicon CLI
//!
//! Checks lexicon documents, validates data against them, generates
//! structural schemas and checks evolution between versions.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use lexicon_schemas::generator::{self, generate_structural_schema};
use lexicon_schemas::{parse_file, LexiconConfig, LexiconRegistry};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lexicon")]
#[command(about = "Check, validate and evolve lexicon schemas")]
#[command(version)]
struct Cli {
    /// Config file to load on top of the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Directory of lexicons available to ref resolution (repeatable)
    #[arg(short, long)]
    registry: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a lexicon and check that it is structurally valid
    Check {
        /// Lexicon file
        file: PathBuf,
    },

    /// Validate a JSON data file against a lexicon
    Validate {
        /// Lexicon file
        schema: PathBuf,
        /// Data file
        data: PathBuf,
    },

    /// Generate the structural (JSON Schema) form of a lexicon
    Generate {
        /// Lexicon file
        file: PathBuf,
        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check whether a new lexicon version is compatible with an old one
    Evolve {
        /// Old version
        old: PathBuf,
        /// New version
        new: PathBuf,
        /// Strict mode - any change is breaking
        #[arg(long)]
        strict: bool,
    },

    /// Report unresolved refs and reference cycles across the registry
    Graph,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Returns `Ok(false)` when the command ran but found problems
fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = LexiconConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    let mut registry = LexiconRegistry::new();
    for dir in config.registry.paths.iter().chain(cli.registry.iter()) {
        let loaded = registry
            .load_dir(dir)
            .with_context(|| format!("loading lexicons from {}", dir.display()))?;
        info!(dir = %dir.display(), loaded, "loaded registry directory");
    }

    match cli.command {
        Commands::Check { file } => {
            let document = load(&file)?;
            println!("✅ {} - valid lexicon ({})", document.id(), document.root_type().tag());
            Ok(true)
        }

        Commands::Validate { schema, data } => {
            let document = load(&schema)?;
            let content = std::fs::read_to_string(&data).with_context(|| format!("reading {}", data.display()))?;
            let value: serde_json::Value =
                serde_json::from_str(&content).with_context(|| format!("parsing {}", data.display()))?;

            let violations = config.validator().validate(&document, &value, &registry);
            if violations.is_empty() {
                println!("✅ {} - valid against {}", data.display(), document.id());
                return Ok(true);
            }

            println!("❌ {} - {} violation(s) against {}", data.display(), violations.len(), document.id());
            for violation in &violations {
                println!("   └─ {}", violation);
            }
            Ok(false)
        }

        Commands::Generate { file, output } => {
            let document = load(&file)?;
            let schema = generate_structural_schema(&document)?;
            let text = generator::render(&schema, config.output.format)?;

            if let Some(path) = output {
                std::fs::write(&path, &text).with_context(|| format!("writing {}", path.display()))?;
                println!("✅ Structural schema written to {:?}", path);
            } else {
                println!("{}", text);
            }
            Ok(true)
        }

        Commands::Evolve { old, new, strict } => {
            let old_doc = load(&old)?;
            let new_doc = load(&new)?;

            let mut checker = config.compatibility_checker();
            if strict {
                checker = checker.strict();
            }
            let verdict = checker.check(&old_doc, &new_doc)?;

            println!("🔍 Checking evolution: {} -> {}", old.display(), new.display());
            for change in &verdict.changes {
                let marker = if change.is_breaking { "❌" } else { "✅" };
                println!("   {} {} at {}", marker, change.description, change.path);
            }
            println!();

            if verdict.is_compatible {
                println!("✅ {}", verdict.summary);
            } else {
                println!("❌ {}", verdict.summary);
                for reason in &verdict.reasons {
                    println!("   └─ {}", reason);
                }
            }
            Ok(verdict.is_compatible)
        }

        Commands::Graph => {
            if registry.is_empty() {
                bail!("no lexicons loaded; pass --registry or set [registry] paths");
            }

            let dangling = registry.unresolved_refs();
            let cycles = registry.reference_cycles();

            println!("📊 {} lexicon(s) loaded", registry.len());
            for cycle in &cycles {
                println!("   🔁 cycle: {}", cycle.join(" -> "));
            }
            for r in &dangling {
                println!("   ❌ {} references unknown {}", r.from, r.target);
            }

            Ok(dangling.is_empty())
        }
    }
}

fn load(path: &Path) -> anyhow::Result<lexicon_schemas::SchemaDocument> {
    parse_file(path).with_context(|| format!("loading lexicon {}", path.display()))
}
