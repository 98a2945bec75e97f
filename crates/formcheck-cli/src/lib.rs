//! formcheck CLI: run a TOML form definition against a JSON values document.
//!
//! - `check` binds the values, runs every check and prints the outcome.
//!   The process exits with status 1 when the form is invalid.
//! - `fields` lists the panels of a definition and their fields.

use std::fmt::Write as _;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use serde::Serialize;

use formcheck_core::{CheckerReport, Form, FormDefinition, StackEntry, StatusLevel};

#[derive(Debug, Parser)]
#[command(name = "formcheck", version, about = "Validate form values against a form definition")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Check a values document against a form definition
    Check {
        /// Form definition (TOML)
        form: PathBuf,
        /// Values document (JSON), keyed by panel id
        values: PathBuf,
        /// Print a JSON report instead of a human-readable one
        #[arg(long)]
        json: bool,
    },
    /// List panels and fields of a form definition
    Fields {
        /// Form definition (TOML)
        form: PathBuf,
    },
}

/// Outcome of `formcheck check`.
#[derive(Debug, Serialize)]
pub struct CheckOutcome {
    pub valid: bool,
    pub report: CheckerReport,
    pub messages: Vec<StackEntry>,
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.cmd {
        Cmd::Check { form, values, json } => {
            let outcome = check_files(&form, &values).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome).context("Failed to serialize report")?
                );
            } else {
                print!("{}", render_outcome(&outcome, std::io::stdout().is_terminal()));
            }
            Ok(if outcome.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Cmd::Fields { form } => {
            let form = load_form(&form)?;
            print!("{}", render_fields(&form));
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Read and build a form definition.
pub fn load_form(path: &Path) -> Result<Form> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read form definition {}", path.display()))?;
    let def = FormDefinition::from_toml_str(&text)
        .with_context(|| format!("Invalid form definition {}", path.display()))?;
    def.build()
        .with_context(|| format!("Failed to build form from {}", path.display()))
}

/// Build the form, bind the values document and run every check.
pub async fn check_files(form_path: &Path, values_path: &Path) -> Result<CheckOutcome> {
    let form = load_form(form_path)?;

    let text = std::fs::read_to_string(values_path)
        .with_context(|| format!("Failed to read values {}", values_path.display()))?;
    let values: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", values_path.display()))?;
    form.bind(&values)
        .with_context(|| format!("Failed to bind values from {}", values_path.display()))?;

    let valid = form.check_all().await;
    tracing::debug!(form = %form.root().id(), valid, "Form checked");

    Ok(CheckOutcome {
        valid,
        report: form.report(),
        messages: form.messages(),
    })
}

fn paint(status: StatusLevel, color: bool) -> String {
    let label = status.as_str();
    if !color {
        return label.to_string();
    }
    match status {
        StatusLevel::None => label.dimmed().to_string(),
        StatusLevel::Valid => label.green().to_string(),
        StatusLevel::Uncomplete => label.yellow().to_string(),
        StatusLevel::Invalid => label.red().to_string(),
    }
}

/// Human-readable rendering of a check outcome.
pub fn render_outcome(outcome: &CheckOutcome, color: bool) -> String {
    let mut out = String::new();
    let root = &outcome.report;
    let _ = writeln!(out, "{}: {}", root.id, paint(root.status, color));

    for (checker, row, field) in root.flatten() {
        let location = match row {
            Some(row) => format!("{checker}[{row}]"),
            None => checker.to_string(),
        };
        let _ = writeln!(
            out,
            "  {location} {} = {} {}",
            field.name,
            field.value,
            paint(field.status, color)
        );
        for message in &field.messages {
            let _ = writeln!(out, "      {message}");
        }
    }

    if let Some(top) = outcome.messages.iter().max_by_key(|e| (e.message.level, e.stamp)) {
        let _ = writeln!(out, "most severe: {} ({})", top.message, top.emitter);
    }
    out
}

/// Panels in declaration order, fields alphabetically.
pub fn render_fields(form: &Form) -> String {
    let mut out = String::new();
    for panel in form.panels() {
        let parent = panel.parent().map(|p| p.id().to_string()).unwrap_or_default();
        let arrayed = if panel.panel().is_arrayed() { ", rows" } else { "" };
        let _ = writeln!(out, "{} (parent: {parent}{arrayed})", panel.id());
        for name in panel.panel().names() {
            let Some(spec) = panel.panel().get(name) else {
                continue;
            };
            let _ = writeln!(
                out,
                "  {name}  {}{}{}",
                spec.kind(),
                if spec.has_check() { "  checked" } else { "" },
                if spec.is_arrayed() { "  arrayed" } else { "" },
            );
        }
    }
    out
}
