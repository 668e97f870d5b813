//! qlib - cross-year survey question catalog
//!
//! **Commands:**
//! - `auto-group`: annotate a worksheet with `Auto:` grouping suggestions
//! - `merge`: apply the override column and remove exact duplicates
//! - `export`: reconcile a worksheet and write the catalog JSON
//! - `build-library`: build the cross-year library from raw extracts

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qlib_catalog::files::{read_extract, read_worksheet, write_json, write_worksheet};
use qlib_catalog::models::RunSummary;
use qlib_catalog::services::{auto_group, build_catalog, GroupingReconciler, LibraryBuilder};
use qlib_common::config::{load_config, Delimiter, QlibConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for qlib
#[derive(Parser, Debug)]
#[command(name = "qlib")]
#[command(about = "Cross-year survey question catalog")]
#[command(version)]
struct Args {
    /// Configuration file (TOML); falls back to QLIB_CONFIG, then the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Worksheet delimiter (auto, ';' or ',')
    #[arg(long, global = true)]
    delimiter: Option<Delimiter>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write `Auto:` grouping suggestions into the override column
    AutoGroup {
        worksheet: PathBuf,

        /// Output worksheet (default: <stem>_auto_grouped.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge rows named in the override column, then remove duplicates
    Merge {
        worksheet: PathBuf,

        /// Output worksheet (default: <stem>_merged.<ext>)
        #[arg(short, long, conflicts_with = "in_place")]
        output: Option<PathBuf>,

        /// Overwrite the input worksheet
        #[arg(long)]
        in_place: bool,

        /// Skip the exact-duplicate pass
        #[arg(long)]
        skip_duplicates: bool,
    },

    /// Reconcile a worksheet and export the catalog as JSON
    Export {
        worksheet: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Skip the exact-duplicate pass
        #[arg(long)]
        skip_duplicates: bool,
    },

    /// Build the cross-year library from per-year extract files
    BuildLibrary {
        #[arg(required = true)]
        extracts: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration is loaded before tracing so the configured level applies;
    // resolution details logged during loading are not shown.
    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(delimiter) = args.delimiter {
        config.worksheet.delimiter = delimiter;
    }
    let level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("qlib={level},qlib_catalog={level},qlib_common={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "Starting qlib"
    );

    match args.command {
        Command::AutoGroup { worksheet, output } => {
            let output = output.unwrap_or_else(|| derived_path(&worksheet, "auto_grouped"));
            run_auto_group(&config, &worksheet, &output)
        }
        Command::Merge {
            worksheet,
            output,
            in_place,
            skip_duplicates,
        } => {
            let output = if in_place {
                worksheet.clone()
            } else {
                output.unwrap_or_else(|| derived_path(&worksheet, "merged"))
            };
            run_merge(&config, &worksheet, &output, skip_duplicates)
        }
        Command::Export {
            worksheet,
            output,
            skip_duplicates,
        } => run_export(&config, &worksheet, &output, skip_duplicates),
        Command::BuildLibrary { extracts, output } => run_build_library(&config, &extracts, &output),
    }
}

fn run_auto_group(config: &QlibConfig, input: &Path, output: &Path) -> Result<()> {
    let sheet = read_worksheet(input, &config.worksheet)
        .with_context(|| format!("Failed to read worksheet {}", input.display()))?;

    let grouping = auto_group(&sheet);
    write_worksheet(output, &grouping.worksheet, config.worksheet.write_bom)
        .with_context(|| format!("Failed to write worksheet {}", output.display()))?;

    report("auto-group", &grouping.summary, output);
    Ok(())
}

fn run_merge(config: &QlibConfig, input: &Path, output: &Path, skip_duplicates: bool) -> Result<()> {
    let sheet = read_worksheet(input, &config.worksheet)
        .with_context(|| format!("Failed to read worksheet {}", input.display()))?;

    let reconciliation = GroupingReconciler::new()
        .with_duplicate_pass(!skip_duplicates)
        .reconcile(&sheet);
    write_worksheet(output, &reconciliation.worksheet, config.worksheet.write_bom)
        .with_context(|| format!("Failed to write worksheet {}", output.display()))?;

    report("merge", &reconciliation.summary, output);
    Ok(())
}

fn run_export(config: &QlibConfig, input: &Path, output: &Path, skip_duplicates: bool) -> Result<()> {
    let sheet = read_worksheet(input, &config.worksheet)
        .with_context(|| format!("Failed to read worksheet {}", input.display()))?;

    let reconciliation = GroupingReconciler::new()
        .with_duplicate_pass(!skip_duplicates)
        .reconcile(&sheet);
    let catalog = build_catalog(&reconciliation);
    write_json(output, &catalog).with_context(|| format!("Failed to write catalog {}", output.display()))?;

    report("export", &reconciliation.summary, output);
    Ok(())
}

fn run_build_library(config: &QlibConfig, inputs: &[PathBuf], output: &Path) -> Result<()> {
    let extracts = inputs
        .iter()
        .map(|path| read_extract(path).with_context(|| format!("Failed to read extract {}", path.display())))
        .collect::<Result<Vec<_>>>()?;

    let build = LibraryBuilder::new(config.extraction.clone()).build(&extracts);
    write_json(output, &build.library).with_context(|| format!("Failed to write library {}", output.display()))?;

    report("build-library", &build.summary, output);
    Ok(())
}

fn report(operation: &str, summary: &RunSummary, output: &Path) {
    summary.log(operation);
    println!("{}", summary);
    println!("Output: {}", output.display());
}

/// `<dir>/<stem>_<suffix>.<ext>` next to the input
fn derived_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "worksheet".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    };
    input.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_path_keeps_directory_and_extension() {
        assert_eq!(
            derived_path(Path::new("data/frågor.csv"), "merged"),
            PathBuf::from("data/frågor_merged.csv")
        );
        assert_eq!(derived_path(Path::new("lista"), "auto_grouped"), PathBuf::from("lista_auto_grouped"));
    }

    #[test]
    fn test_cli_parses_merge_flags() {
        let args = Args::try_parse_from(["qlib", "--delimiter", ";", "merge", "in.csv", "--in-place", "--skip-duplicates"])
            .unwrap();
        assert_eq!(args.delimiter, Some(Delimiter::Semicolon));
        match args.command {
            Command::Merge {
                in_place,
                skip_duplicates,
                output,
                ..
            } => {
                assert!(in_place);
                assert!(skip_duplicates);
                assert_eq!(output, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_output_with_in_place() {
        assert!(Args::try_parse_from(["qlib", "merge", "in.csv", "-o", "out.csv", "--in-place"]).is_err());
    }
}
