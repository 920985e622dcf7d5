use crate::aggregate::{CommitRecord, TraversalResult};
use crate::enumerate::{BranchResolution, RepositoryReport};
use crate::error::HistoryResult;
use clap::ValueEnum;
use provider::Repository;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
struct BranchView<'a> {
    branch: &'a str,
    head_commit_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    commits: &'a [CommitRecord],
}

#[derive(Serialize)]
struct RepositoryView<'a> {
    repository: &'a str,
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    branches: Vec<BranchView<'a>>,
}

fn write_record(out: &mut String, record: &CommitRecord) {
    let _ = writeln!(out, "Commit: {}", record.commit_id);
    let _ = writeln!(out, "Author: {}", record.author);
    let _ = writeln!(out, "Date: {}", record.date);
    let _ = writeln!(out, "Message: {}", record.message.trim_end());
    let _ = writeln!(out, "Tags: [{}]", record.tags.join(" "));
    out.push('\n');
}

pub fn render_history(result: &TraversalResult, format: OutputFormat) -> HistoryResult<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Text => {
            let mut out = String::new();
            if result.is_empty() {
                out.push_str("(no commits)\n");
            }
            for record in result.iter() {
                write_record(&mut out, record);
            }
            Ok(out)
        }
    }
}

pub fn render_repositories(
    repositories: &[Repository],
    format: OutputFormat,
) -> HistoryResult<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(repositories)?),
        OutputFormat::Text => Ok(repositories
            .iter()
            .map(|r| format!("{}\t{}\n", r.name, r.id))
            .collect()),
    }
}

pub fn render_branches(
    resolutions: &[BranchResolution],
    format: OutputFormat,
) -> HistoryResult<String> {
    match format {
        OutputFormat::Json => {
            let views: Vec<BranchView<'_>> = resolutions
                .iter()
                .map(|r| BranchView {
                    branch: &r.name,
                    head_commit_id: r.result.as_ref().ok().and_then(|b| b.head()),
                    error: r.result.as_ref().err().map(|e| e.to_string()),
                    commits: &[],
                })
                .collect();
            Ok(serde_json::to_string_pretty(&views)?)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for resolution in resolutions {
                match &resolution.result {
                    Ok(branch) => {
                        let _ = writeln!(
                            out,
                            "{}\t{}",
                            resolution.name,
                            branch.head().unwrap_or("(no commits)")
                        );
                    }
                    Err(e) => {
                        let _ = writeln!(out, "{}\terror: {}", resolution.name, e);
                    }
                }
            }
            Ok(out)
        }
    }
}

pub fn render_reports(reports: &[RepositoryReport], format: OutputFormat) -> HistoryResult<String> {
    match format {
        OutputFormat::Json => {
            let views: Vec<RepositoryView<'_>> = reports.iter().map(repository_view).collect();
            Ok(serde_json::to_string_pretty(&views)?)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for report in reports {
                let _ = writeln!(out, "== {} ({})", report.repository.name, report.repository.id);
                let branches = match &report.outcome {
                    Ok(branches) => branches,
                    Err(e) => {
                        let _ = writeln!(out, "error: {}\n", e);
                        continue;
                    }
                };

                for branch in branches {
                    let _ = writeln!(out, "-- {}", branch.branch);
                    match &branch.outcome {
                        Ok(result) => {
                            if result.is_empty() {
                                out.push_str("(no commits)\n\n");
                            }
                            for record in result.iter() {
                                write_record(&mut out, record);
                            }
                        }
                        Err(e) => {
                            let _ = writeln!(out, "error: {}\n", e);
                        }
                    }
                }
            }
            Ok(out)
        }
    }
}

fn repository_view(report: &RepositoryReport) -> RepositoryView<'_> {
    let (error, branches) = match &report.outcome {
        Ok(branches) => (
            None,
            branches
                .iter()
                .map(|b| BranchView {
                    branch: &b.branch,
                    head_commit_id: b.head_commit_id.as_deref(),
                    error: b.outcome.as_ref().err().map(|e| e.to_string()),
                    commits: b
                        .outcome
                        .as_ref()
                        .map(|r| r.records.as_slice())
                        .unwrap_or(&[]),
                })
                .collect(),
        ),
        Err(e) => (Some(e.to_string()), Vec::new()),
    };

    RepositoryView {
        repository: &report.repository.name,
        id: &report.repository.id,
        error,
        branches,
    }
}
