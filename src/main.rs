use anyhow::{Context, Result};
use clap::Parser;
use navlayer::annotate::NameLookup;
use navlayer::catalog::Catalog;
use navlayer::cli::{self, Command, ReferenceArgs};
use navlayer::config::EngineConfig;
use navlayer::layer::Synthesis;
use navlayer::pipeline::{self, Pipeline};
use navlayer::report::{ArtifactKind, RunReport};
use navlayer::workbook::{clean, Workbook};
use navlayer::{fetch, file_io, output, summary};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Default name of the annotated workbook written by `run`
const ANNOTATED_FILE_NAME: &str = "annotated.json";

fn main() -> Result<()> {
    let args = cli::Args::parse();

    // RUST_LOG wins; otherwise the verbose flag picks the level
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if args.verbose {
        EnvFilter::new("navlayer=debug")
    } else {
        EnvFilter::new("navlayer=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    debug!("Logging initialized (verbose={})", args.verbose);

    let config = EngineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let report = match &args.command {
        Command::Run {
            workbook,
            reference,
            out_dir,
            annotated,
        } => run(&config, workbook, reference, out_dir, annotated.as_deref())?,
        Command::Layer {
            workbook,
            mode,
            catalog,
            out_dir,
        } => {
            let input = read_input(workbook)?;
            let catalog = load_catalog(catalog)?;
            let names = NameLookup::default();
            let staged = Pipeline::new(&config, &catalog, &names).layers(&input, *mode)?;

            let mut report = RunReport::new("layer").with_input(workbook, sheet_names(&input));
            write_layers(&mut report, &config, &staged.output, out_dir, &[])?;
            report.extend_warnings(staged.warnings);
            report
        }
        Command::Summary { workbook, dest } => {
            let input = read_input(workbook)?;
            let staged = pipeline::summarize(&config, &input)
                .with_context(|| format!("Failed to summarize {}", workbook.display()))?;
            let rows = staged.output;

            let mut report = RunReport::new("summary").with_input(workbook, sheet_names(&input));
            if let Some(dest) = dest {
                let sheet = summary::to_sheet(config.summary_sheet.clone(), &rows);
                file_io::write_workbook(dest, &Workbook::new(vec![sheet]))?;
                report.add_artifact(ArtifactKind::Workbook, dest.clone());
            }
            report.summary = Some(rows);
            report.extend_warnings(staged.warnings);
            report
        }
        Command::Annotate {
            workbook,
            reference,
            dest,
        } => {
            let input = read_input(workbook)?;
            let (catalog, names) = load_reference(reference)?;
            let annotated = Pipeline::new(&config, &catalog, &names).annotate(&input);
            file_io::write_workbook(dest, &annotated)?;

            let mut report = RunReport::new("annotate").with_input(workbook, sheet_names(&input));
            report.add_artifact(ArtifactKind::Workbook, dest.clone());
            report
        }
        Command::Clean { workbook, dest } => {
            let input = read_input(workbook)?;
            let cleaned = clean(&input);
            file_io::write_workbook(dest, &cleaned)?;

            let mut report = RunReport::new("clean").with_input(workbook, sheet_names(&input));
            report.add_artifact(ArtifactKind::Workbook, dest.clone());
            report
        }
        Command::Fetch { out_dir } => {
            eprintln!("Downloading reference data to {}", out_dir.display());
            let fetched = fetch::fetch_reference(&config.reference, out_dir)
                .context("Failed to download reference data")?;
            let mut report = RunReport::new("fetch");
            report.add_fetched(&fetched);
            report
        }
    };

    let result = match args.format {
        cli::OutputFormat::Json => output::format_json(&report)?,
        cli::OutputFormat::Terminal => output::format_terminal(&report)?,
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &result).context(format!("Failed to write output to {}", output_path))?;
        eprintln!("Results written to: {}", output_path);
    } else {
        print!("{}", result);
    }

    Ok(())
}

fn run(
    config: &EngineConfig,
    workbook: &Path,
    reference: &ReferenceArgs,
    out_dir: &Path,
    annotated: Option<&Path>,
) -> Result<RunReport> {
    let input = read_input(workbook)?;
    let (catalog, names) = load_reference(reference)?;
    eprintln!("Processing {} sheet(s) from {}", input.len(), workbook.display());

    let result = Pipeline::new(config, &catalog, &names)
        .run(&input)
        .with_context(|| format!("Failed to process {}", workbook.display()))?;

    let mut report = RunReport::new("run").with_input(workbook, sheet_names(&input));
    let annotated_path = annotated
        .map(Path::to_path_buf)
        .unwrap_or_else(|| out_dir.join(ANNOTATED_FILE_NAME));
    write_layers(&mut report, config, &result.layers, out_dir, &[annotated_path.clone()])?;

    file_io::write_workbook(&annotated_path, &result.annotated)?;
    report.add_artifact(ArtifactKind::Workbook, annotated_path);

    report.summary = result.summary;
    report.extend_warnings(result.warnings);
    Ok(report)
}

fn write_layers(
    report: &mut RunReport,
    config: &EngineConfig,
    layers: &Synthesis,
    out_dir: &Path,
    reserved: &[PathBuf],
) -> Result<()> {
    match layers {
        Synthesis::PerSheet(layers) => {
            let paths = file_io::write_sheet_layers(out_dir, layers, reserved)?;
            for (layer, path) in layers.iter().zip(paths) {
                report.add_sheet_layer(layer.sheet.clone(), path);
            }
        }
        Synthesis::Clubbed(document) => {
            let path = file_io::write_layer(out_dir.join(&config.clubbed_file), document)?;
            report.add_artifact(ArtifactKind::Layer, path);
        }
        Synthesis::Summary(rows) => {
            report.summary = Some(rows.clone());
        }
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<Workbook> {
    file_io::read_workbook(path).with_context(|| format!("Failed to read workbook {}", path.display()))
}

fn load_catalog(path: &Path) -> Result<Catalog> {
    Catalog::from_path(path).with_context(|| {
        format!(
            "Failed to load catalog {} (run `navlayer fetch` to download it)",
            path.display()
        )
    })
}

fn load_reference(reference: &ReferenceArgs) -> Result<(Catalog, NameLookup)> {
    let catalog = load_catalog(&reference.catalog)?;
    let names = NameLookup::from_path(&reference.names).with_context(|| {
        format!(
            "Failed to load technique names {} (run `navlayer fetch` to download it)",
            reference.names.display()
        )
    })?;
    Ok((catalog, names))
}

fn sheet_names(workbook: &Workbook) -> Vec<String> {
    workbook.sheet_names().into_iter().map(str::to_string).collect()
}
