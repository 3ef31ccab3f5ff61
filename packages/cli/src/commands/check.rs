use super::read_tree;
use crate::config::{Config, OutputFormat};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use folio_editor::{Schema, Violation};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Raw state JSON file or directory to check
    pub input: PathBuf,

    /// Output format (overrides config)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Serialize)]
struct FileReport {
    file: PathBuf,
    violations: Vec<Violation>,
}

pub fn check(args: CheckArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let format = args.format.unwrap_or(config.format);

    let files = if args.input.is_file() {
        vec![args.input.clone()]
    } else if args.input.is_dir() {
        find_json_files(&args.input)
    } else {
        return Err(anyhow!("Input path does not exist: {}", args.input.display()));
    };

    let schema = Schema::core();
    let mut reports = Vec::with_capacity(files.len());
    let mut unreadable = 0;

    for file in files {
        match read_tree(&file, config.preserve_keys) {
            Ok(tree) => reports.push(FileReport {
                violations: schema.check(&tree),
                file,
            }),
            Err(err) => {
                unreadable += 1;
                eprintln!("{} Failed to read {}: {}", "✗".red(), file.display(), err);
            }
        }
    }

    let total: usize = reports.iter().map(|report| report.violations.len()).sum();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => print_text(&reports, total),
    }

    if total > 0 || unreadable > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn print_text(reports: &[FileReport], total: usize) {
    for report in reports.iter().filter(|report| !report.violations.is_empty()) {
        println!("{}", report.file.display());
        for violation in &report.violations {
            println!(
                "  {} [{}] {}: {}",
                "error".red().bold(),
                violation.rule,
                violation.key,
                violation.message
            );
        }
        println!();
    }

    println!(
        "✨ {} Check complete!",
        if total > 0 {
            "Done".red().bold()
        } else {
            "Done".green().bold()
        }
    );
    println!("   Files checked: {}", reports.len());

    if total == 0 {
        println!("   {} No violations found!", "✓".green());
    } else {
        println!("   {} {}", "Violations:".red(), total);
    }
}

fn find_json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false))
        .filter(|path| path.file_name().map(|name| name != "folio.config.json").unwrap_or(true))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_finds_json_files_recursively() {
        let dir = std::env::temp_dir().join(format!("folio-check-{}", std::process::id()));
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("a.json"), "{}").unwrap();
        fs::write(dir.join("nested/b.json"), "{}").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();
        fs::write(dir.join("folio.config.json"), "{}").unwrap();

        let files = find_json_files(&dir);
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(files, vec![dir.join("a.json"), dir.join("nested/b.json")]);
    }
}
