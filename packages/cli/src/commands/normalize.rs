use super::read_tree;
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use folio_document::raw::{self, SerializeOptions};
use folio_editor::{Schema, State};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Raw state JSON file to normalize
    pub input: PathBuf,

    /// Write the normalized document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep node keys from the input and write them to the output
    #[arg(long)]
    pub preserve_keys: bool,

    /// Repair budget (overrides config)
    #[arg(long)]
    pub max_iterations: Option<usize>,
}

pub fn normalize(args: NormalizeArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let preserve_keys = args.preserve_keys || config.preserve_keys;
    let mut options = config.schema_options();
    if args.max_iterations.is_some() {
        options.max_iterations = args.max_iterations;
    }

    if !args.input.is_file() {
        return Err(anyhow!("Input file does not exist: {}", args.input.display()));
    }

    let tree = read_tree(&args.input, preserve_keys)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    debug!(nodes = tree.len(), "loaded document");

    let mut change = State::new(tree).change_with_options(Arc::new(Schema::core()), options);
    change.normalize_document();
    let committed = change.commit()?;

    let json = raw::to_json(committed.state.tree(), &SerializeOptions { preserve_keys })?;

    match &args.output {
        Some(output) => {
            fs::write(output, &json)?;
            eprintln!(
                "  {} {} → {}",
                "✓".green(),
                args.input.display(),
                output.display()
            );
        }
        None => println!("{}", json),
    }

    let count = committed.operations.len();
    if count == 0 {
        eprintln!("  {} Already normalized", "✓".green());
    } else {
        eprintln!("  {} {} repair operations applied", "✓".green(), count.to_string().bold());
    }

    Ok(())
}
