//! The `workflow_summary.md` report.

use crate::core::StageResult;
use crate::pipeline::FinalResult;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// File name of the report in the output directory.
pub const SUMMARY_FILE: &str = "workflow_summary.md";

/// Result fields worth surfacing, in display order.
const ARTIFACT_FIELDS: [(&str, &str); 8] = [
    ("document_path", "Document"),
    ("local_doc_path", "Documentation"),
    ("folder_url", "Folder"),
    ("page_url", "Page"),
    ("confluence_page_url", "Documentation page"),
    ("pr_url", "Pull request"),
    ("repo_doc_path", "Repository docs"),
    ("channel", "Notified"),
];

/// Renders the report as markdown.
#[must_use]
pub fn render_summary(result: &FinalResult) -> String {
    let degraded = result.degraded_stages();
    let mut out = String::new();
    let _ = writeln!(out, "# Workflow Summary\n");
    let _ = writeln!(out, "- **Workflow:** {}", result.workflow_id);
    let _ = writeln!(out, "- **Output directory:** {}", result.output_dir);
    let _ = writeln!(
        out,
        "- **Stages:** {} run, {} degraded\n",
        result.stages.len(),
        degraded.len()
    );
    let _ = writeln!(out, "| Stage | Status | Details |");
    let _ = writeln!(out, "|-------|--------|---------|");

    for (name, value) in &result.stages {
        let stage = StageResult::from_value(value.clone());
        let status = if stage.is_failure() { "degraded" } else { "completed" };
        let details = if stage.is_failure() {
            stage.error().unwrap_or("unknown error").to_string()
        } else {
            artifacts(&stage)
        };
        let _ = writeln!(out, "| {name} | {status} | {} |", details.replace('|', "\\|"));
    }

    let files = count(result, "implementation", "files_created");
    let tests = count(result, "tests", "test_files");
    let _ = writeln!(
        out,
        "\n{files} implementation files and {tests} test files generated."
    );
    out
}

/// Writes the report into the output directory.
///
/// # Errors
///
/// Returns the IO error if the file cannot be written.
pub fn write_summary(result: &FinalResult, output_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(SUMMARY_FILE);
    std::fs::write(&path, render_summary(result))?;
    Ok(path)
}

fn artifacts(stage: &StageResult) -> String {
    ARTIFACT_FIELDS
        .iter()
        .filter_map(|(key, label)| {
            let value = stage.get_str(key);
            (!value.is_empty()).then(|| format!("{label}: {value}"))
        })
        .collect::<Vec<_>>()
        .join("<br>")
}

fn count(result: &FinalResult, stage: &str, key: &str) -> usize {
    result
        .stage(stage)
        .and_then(|v| v.get(key))
        .and_then(serde_json::Value::as_array)
        .map_or(0, Vec::len)
}
