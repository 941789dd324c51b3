use crate::config::{CATALOG_FILE_NAME, NAMES_FILE_NAME};
use crate::pipeline::LayerMode;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "navlayer")]
#[command(about = "Aggregate per-actor TTP spreadsheets into ATT&CK Navigator heat-map layers")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Report format (json, terminal)
    #[arg(short, long, default_value = "terminal", global = true)]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Reference data locations shared by the commands that need them
#[derive(ClapArgs, Debug, Clone)]
pub struct ReferenceArgs {
    /// Reference technique catalog (Navigator layer JSON)
    #[arg(long, default_value = CATALOG_FILE_NAME)]
    pub catalog: PathBuf,

    /// Technique code-name index (`CODE: name` lines)
    #[arg(long, default_value = NAMES_FILE_NAME)]
    pub names: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Full workflow: layers, summary and annotated workbook
    Run {
        /// Input workbook (.json file or directory of .tsv sheets)
        workbook: PathBuf,

        #[command(flatten)]
        reference: ReferenceArgs,

        /// Directory for layer files and the annotated workbook
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Annotated workbook destination (defaults to <out-dir>/annotated.json)
        #[arg(long)]
        annotated: Option<PathBuf>,
    },

    /// Build Navigator layers only (or just the summary with `--mode summary-only`)
    Layer {
        workbook: PathBuf,

        #[arg(long, value_enum, default_value = "clubbed")]
        mode: LayerMode,

        /// Reference technique catalog
        #[arg(long, default_value = CATALOG_FILE_NAME)]
        catalog: PathBuf,

        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Print the frequency-ranked technique summary
    Summary {
        workbook: PathBuf,

        /// Also write the summary as a single-sheet workbook
        #[arg(long)]
        dest: Option<PathBuf>,
    },

    /// Add technique name and tactic columns to every sheet
    Annotate {
        workbook: PathBuf,

        #[command(flatten)]
        reference: ReferenceArgs,

        /// Output workbook (.json file or sheet directory)
        #[arg(long)]
        dest: PathBuf,
    },

    /// Merge duplicate technique rows within each sheet
    Clean {
        workbook: PathBuf,

        #[arg(long)]
        dest: PathBuf,
    },

    /// Download the reference catalog and name index
    Fetch {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Run { .. } => "run",
            Command::Layer { .. } => "layer",
            Command::Summary { .. } => "summary",
            Command::Annotate { .. } => "annotate",
            Command::Clean { .. } => "clean",
            Command::Fetch { .. } => "fetch",
        }
    }
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output for machine consumption
    Json,
    /// Human-readable terminal output
    Terminal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["navlayer", "summary", "wb.json", "-f", "json", "-v"]).unwrap();
        assert!(args.verbose);
        assert!(matches!(args.format, OutputFormat::Json));
        assert_eq!(args.command.name(), "summary");
    }

    #[test]
    fn test_layer_mode_parsing() {
        let args = Args::try_parse_from(["navlayer", "layer", "wb.json", "--mode", "per-sheet"]).unwrap();
        match args.command {
            Command::Layer { mode, catalog, .. } => {
                assert_eq!(mode, LayerMode::PerSheet);
                assert_eq!(catalog, PathBuf::from("layer.json"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Args::try_parse_from(["navlayer", "layer", "wb.json", "--mode", "bogus"]).is_err());

        let args = Args::try_parse_from(["navlayer", "layer", "wb.json", "--mode", "summary-only"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Layer { mode: LayerMode::SummaryOnly, .. }
        ));
    }

    #[test]
    fn test_reference_defaults() {
        let args = Args::try_parse_from(["navlayer", "run", "wb.json"]).unwrap();
        match args.command {
            Command::Run { reference, out_dir, annotated, .. } => {
                assert_eq!(reference.names, PathBuf::from("TTP code-name index.txt"));
                assert_eq!(out_dir, PathBuf::from("."));
                assert!(annotated.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
