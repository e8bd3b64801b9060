// src/parser.rs

//! Splits a migration file into its upgrade and rollback statement lists.
//!
//! Sections are delimited by lines whose trimmed content (after stripping a
//! leading `--`) equals `upgrade` or `rollback`, matched case-insensitively.
//! Content before the first marker (or before any non-comment line, for files
//! with no markers) belongs to the upgrade section.
//!
//! Deliberate deviation from the original implementation (see SPEC_FULL.md
//! §4.7): a line is scanned for every `;` it contains, not just the first,
//! so each one closes a statement and the remainder keeps being scanned for
//! more. This fixes the original's dropped-statement bug for lines like
//! `INSERT INTO t VALUES (1); -- seed row` and for lines carrying more than
//! one real statement, e.g. `CREATE TABLE a(x int); CREATE TABLE b(y int);`.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Which half of a migration file to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Upgrade,
    Rollback,
}

/// Controls statement joining: execution collapses a statement onto one
/// line, dry-run preserves line breaks for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Execute,
    DryRun,
}

/// Parses a migration file and returns the statements for one section.
pub fn parse_section(path: &Path, section: Section, mode: ParseMode) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(parse_section_str(&contents, section, mode))
}

/// Parses already-read file content for one section.
pub fn parse_section_str(contents: &str, section: Section, mode: ParseMode) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut in_rollback = false;

    for raw_line in contents.lines() {
        let trimmed = raw_line.trim();

        if is_marker(trimmed, "rollback") {
            in_rollback = true;
            continue;
        }
        if is_marker(trimmed, "upgrade") {
            // Only meaningful as a no-op boundary; upgrade content before it
            // (in files without markers) is already being collected.
            continue;
        }

        let wanted = match section {
            Section::Upgrade => !in_rollback,
            Section::Rollback => in_rollback,
        };
        if !wanted {
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }

        let line_for_join = match mode {
            ParseMode::Execute => trimmed.to_string(),
            ParseMode::DryRun => raw_line.trim_end().to_string(),
        };

        let mut remainder = line_for_join.as_str();
        while let Some(idx) = remainder.find(';') {
            let before = &remainder[..idx];
            current.push(before.to_string());
            let joined = join_statement(&current, mode);
            if !joined.is_empty() {
                statements.push(joined);
            }
            current.clear();
            remainder = &remainder[idx + 1..];
        }
        // Whatever is left after the last `;` either continues onto the next
        // line (a statement still open) or is a trailing comment to drop.
        let trailing = remainder.trim();
        if !trailing.is_empty() && !trailing.starts_with("--") {
            current.push(remainder.to_string());
        }
    }

    statements
}

/// Returns true if `trimmed` is a section marker line for `word`
/// (`-- upgrade` / `-- rollback`, case-insensitive on the marker word).
fn is_marker(trimmed: &str, word: &str) -> bool {
    trimmed
        .strip_prefix("--")
        .map(|rest| rest.trim().eq_ignore_ascii_case(word))
        .unwrap_or(false)
}

fn join_statement(lines: &[String], mode: ParseMode) -> String {
    let joined = match mode {
        ParseMode::Execute => lines.join(" "),
        ParseMode::DryRun => lines.join("\n"),
    };
    joined.trim().to_string()
}

/// Parses the upgrade section, used for checksumming and execution.
pub fn parse_upgrade_statements(path: &Path, mode: ParseMode) -> Result<Vec<String>> {
    parse_section(path, Section::Upgrade, mode)
}

/// Parses the rollback section, used during `rollback`.
pub fn parse_rollback_statements(path: &Path, mode: ParseMode) -> Result<Vec<String>> {
    parse_section(path, Section::Rollback, mode)
}

/// Validates and returns `Ok(())` if `path` can be read as UTF-8 text;
/// surfaces I/O errors the way every other catalog/parser operation does.
pub fn ensure_readable(path: &Path) -> Result<()> {
    fs::read_to_string(path).map(|_| ()).map_err(Error::from)
}
