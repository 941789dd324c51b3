//! Output formatting for command reports.
//!
//! - Terminal: colored, human-readable
//! - JSON: the full [`RunReport`] for machine consumption

use crate::error::Warning;
use crate::report::RunReport;
use crate::summary::{SummaryRow, SUMMARY_HEADERS};
use anyhow::Result;
use colored::Colorize;

pub fn format_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn format_terminal(report: &RunReport) -> Result<String> {
    let mut output = String::new();

    output.push_str(&format!("├─ {}", report.command.bright_white().bold()));
    if let Some(input) = &report.input {
        output.push_str(&format!(" {}", input.display()));
    }
    output.push('\n');

    if !report.sheets.is_empty() {
        output.push_str(&format!("│  Sheets:  {}\n", report.sheets.join(", ")));
    }

    if let Some(rows) = &report.summary {
        output.push_str("│\n");
        output.push_str(&format_summary_table(rows));
    }

    if !report.artifacts.is_empty() {
        output.push_str("│\n");
        output.push_str(&format!("│  {}\n", "Written:".bright_white()));
        for artifact in &report.artifacts {
            let label = match &artifact.sheet {
                Some(sheet) => format!("{} ({})", artifact.kind, sheet),
                None => artifact.kind.to_string(),
            };
            output.push_str(&format!(
                "│  {} {:<10} {}\n",
                "✓".bright_green(),
                label,
                artifact.path.display()
            ));
        }
    }

    if report.has_warnings() {
        output.push_str("│\n");
        output.push_str(&format!(
            "│  {}\n",
            format!("Warnings ({}):", report.warnings.len()).bright_yellow()
        ));
        for warning in &report.warnings {
            output.push_str(&format!("│  • {}\n", format_warning(warning)));
        }
    }

    output.push_str("│\n");
    Ok(output)
}

fn format_warning(warning: &Warning) -> String {
    match warning {
        Warning::NoTechniquesObserved => warning.to_string().yellow().to_string(),
        _ => warning.to_string(),
    }
}

/// Summary table with a padded ID column, scores highlighted.
pub fn format_summary_table(rows: &[SummaryRow]) -> String {
    let mut output = String::new();
    if rows.is_empty() {
        output.push_str(&format!("│  {}\n", "No techniques observed".dimmed()));
        return output;
    }

    let id_width = rows
        .iter()
        .map(|r| r.technique_id.len())
        .chain(std::iter::once(SUMMARY_HEADERS[0].len()))
        .max()
        .unwrap_or(0);

    output.push_str(&format!(
        "│  {:<id_width$}  {:>5}  {}\n",
        SUMMARY_HEADERS[0].bright_white(),
        SUMMARY_HEADERS[1].bright_white(),
        SUMMARY_HEADERS[2].bright_white(),
        id_width = id_width
    ));

    let top = rows.first().map(|r| r.frequency).unwrap_or(0);
    for row in rows {
        let score = format!("{:>5}", row.frequency);
        let score = if row.frequency == top {
            score.bright_red().bold()
        } else {
            score.normal()
        };
        output.push_str(&format!(
            "│  {:<id_width$}  {}  {}\n",
            row.technique_id,
            score,
            row.actors_joined(),
            id_width = id_width
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ArtifactKind;
    use std::path::PathBuf;

    fn rows() -> Vec<SummaryRow> {
        vec![
            SummaryRow {
                technique_id: "T1059".to_string(),
                frequency: 3,
                actor_names: vec!["APT1".to_string(), "APT1".to_string(), "APT2".to_string()],
            },
            SummaryRow {
                technique_id: "T1566.001".to_string(),
                frequency: 1,
                actor_names: vec!["APT2".to_string()],
            },
        ]
    }

    #[test]
    fn test_format_json() {
        let mut report = RunReport::new("summary").with_input("wb.json", vec!["APT1".to_string()]);
        report.summary = Some(rows());
        let json = format_json(&report).unwrap();
        assert!(json.contains("\"command\": \"summary\""));
        assert!(json.contains("\"technique_id\": \"T1059\""));
    }

    #[test]
    fn test_format_terminal_lists_artifacts_and_warnings() {
        colored::control::set_override(false);
        let mut report = RunReport::new("run").with_input("wb.json", vec!["A".to_string(), "B".to_string()]);
        report.add_artifact(ArtifactKind::Layer, PathBuf::from("out/Heatmap.json"));
        report.extend_warnings(vec![Warning::MissingTechnique { sheet: "A".to_string(), row: 4 }]);

        let output = format_terminal(&report).unwrap();
        assert!(output.contains("run wb.json"));
        assert!(output.contains("Sheets:  A, B"));
        assert!(output.contains("out/Heatmap.json"));
        assert!(output.contains("Warnings (1):"));
    }

    #[test]
    fn test_summary_table_pads_ids() {
        colored::control::set_override(false);
        let table = format_summary_table(&rows());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Technique ID"));
        assert!(lines[1].starts_with(&format!("│  {:<12}  ", "T1059")));
        assert!(lines[1].ends_with("APT1, APT1, APT2"));
    }

    #[test]
    fn test_summary_table_empty() {
        colored::control::set_override(false);
        assert!(format_summary_table(&[]).contains("No techniques observed"));
    }
}
