//! Non-interactive subcommands.

use anyhow::Context;
use std::io::Write;
use std::path::Path;

use exam_core::model::QuestionDraft;
use services::{AppServices, BankSnapshot, HistoryListItem};

fn format_row(item: &HistoryListItem) -> String {
    format!(
        "#{:<5} {}  {:>6.2}%  {}/{} correct  {}s",
        item.id,
        item.completed_at.format("%Y-%m-%d %H:%M"),
        item.percentage,
        item.correct,
        item.total,
        item.elapsed_seconds,
    )
}

/// # Errors
///
/// Returns storage and write failures.
pub async fn history(services: &AppServices, limit: u32, out: &mut impl Write) -> anyhow::Result<()> {
    let items = services.history().list_recent(limit).await?;
    if items.is_empty() {
        writeln!(out, "No exams taken yet.")?;
        return Ok(());
    }
    for item in &items {
        writeln!(out, "{}", format_row(item))?;
    }
    Ok(())
}

/// # Errors
///
/// Returns read, parse, validation and storage failures. An invalid draft
/// rejects the whole file.
pub async fn add(services: &AppServices, input: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let drafts: Vec<QuestionDraft> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing question drafts in {}", input.display()))?;
    let written = services.question_bank().bulk_insert(drafts).await?;
    writeln!(out, "Added {written} question(s).")?;
    Ok(())
}

/// # Errors
///
/// Returns storage, serialization and write failures.
pub async fn export(services: &AppServices, path: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let history = services.history_repository();
    let snapshot = services
        .question_bank()
        .export_snapshot(history.as_ref())
        .await?;
    let json = serde_json::to_string_pretty(&snapshot)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    writeln!(
        out,
        "Exported {} question(s) and {} result(s) to {}.",
        snapshot.questions.len(),
        snapshot.history.len(),
        path.display()
    )?;
    Ok(())
}

/// # Errors
///
/// Returns read, parse and storage failures. Any invalid question or
/// result rejects the whole backup before anything is written.
pub async fn restore(services: &AppServices, path: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let snapshot = BankSnapshot::from_json(&raw)
        .with_context(|| format!("parsing backup {}", path.display()))?;
    let history = services.history_repository();
    let summary = services
        .question_bank()
        .restore_snapshot(&snapshot, history.as_ref())
        .await?;
    writeln!(
        out,
        "Restored {} question(s) and {} result(s).",
        summary.questions, summary.results
    )?;
    Ok(())
}
