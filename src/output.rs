//! Console output for the catalog overview and the run summary

use crate::catalog::Database;
use crate::error::{Error, Result};
use crate::orchestrator::RunSummary;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL,
};
use serde::Serialize;
use std::io::Write;
use std::str::FromStr;

/// Output format for console reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable table output
    #[default]
    Human,
    /// JSON output
    Json,
    /// No output (silent mode)
    None,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "none" => Ok(Self::None),
            _ => Err(Error::InvalidOutputFormat(s.to_string())),
        }
    }
}

/// Sizes of everything loaded from the database directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogOverview {
    pub plugin_advisories: usize,
    pub plugin_slugs: usize,
    pub theme_advisories: usize,
    pub theme_slugs: usize,
    pub timthumb_paths: usize,
    pub config_backups: usize,
    pub shells: usize,
    pub env_paths: usize,
    pub readme_overrides: usize,
}

impl From<&Database> for CatalogOverview {
    fn from(db: &Database) -> Self {
        Self {
            plugin_advisories: db.plugins.signatures().len(),
            plugin_slugs: db.plugins.slugs().len(),
            theme_advisories: db.themes.signatures().len(),
            theme_slugs: db.themes.slugs().len(),
            timthumb_paths: db.timthumb_paths.len(),
            config_backups: db.config_backups.len(),
            shells: db.shells.len(),
            env_paths: db.env_paths.len(),
            readme_overrides: db.readme_overrides.len(),
        }
    }
}

impl CatalogOverview {
    fn rows(&self) -> Vec<(&'static str, usize, Option<usize>)> {
        vec![
            ("Plugins", self.plugin_advisories, Some(self.plugin_slugs)),
            ("Themes", self.theme_advisories, Some(self.theme_slugs)),
            ("TimThumb paths", self.timthumb_paths, None),
            ("Config backups", self.config_backups, None),
            ("Shells", self.shells, None),
            ("Env files", self.env_paths, None),
            ("Readme overrides", self.readme_overrides, None),
        ]
    }
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|l| Cell::new(l).add_attribute(Attribute::Bold))
        .collect()
}

fn count_cell(count: usize) -> Cell {
    let cell = Cell::new(count).set_alignment(CellAlignment::Right);
    if count == 0 {
        cell.fg(Color::DarkGrey)
    } else {
        cell
    }
}

fn write_json<W: Write, T: Serialize>(value: &T, writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer).map_err(Error::OutputFailed)
}

/// Print what was loaded at start-up
pub fn output_overview<W: Write>(
    overview: &CatalogOverview,
    format: OutputFormat,
    writer: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Human => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header(&["List", "Entries", "Unique"]));

            for (label, entries, unique) in overview.rows() {
                let unique = match unique {
                    Some(n) => count_cell(n),
                    None => Cell::new("-").set_alignment(CellAlignment::Right),
                };
                table.add_row(vec![Cell::new(label), count_cell(entries), unique]);
            }
            writeln!(writer, "{}", table).map_err(Error::OutputFailed)
        }
        OutputFormat::Json => write_json(overview, writer),
        OutputFormat::None => Ok(()),
    }
}

/// Print the totals of a finished run
pub fn output_summary<W: Write>(
    summary: &RunSummary,
    format: OutputFormat,
    writer: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Human => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header(&["Result", "Count"]));

            let vulnerable = if summary.vulnerable_components > 0 {
                count_cell(summary.vulnerable_components).fg(Color::Yellow)
            } else {
                count_cell(0)
            };
            let confirmed = count_cell(summary.confirmed).fg(Color::Green);

            table.add_row(vec![Cell::new("Domains"), count_cell(summary.domains)]);
            table.add_row(vec![Cell::new("Unreachable"), count_cell(summary.unreachable)]);
            table.add_row(vec![Cell::new("Not WordPress"), count_cell(summary.not_platform)]);
            table.add_row(vec![Cell::new("WordPress"), confirmed]);
            table.add_row(vec![Cell::new("Vulnerable components"), vulnerable]);
            if summary.failed > 0 {
                table.add_row(vec![
                    Cell::new("Failed"),
                    count_cell(summary.failed).fg(Color::Red),
                ]);
            }
            table.add_row(vec![
                Cell::new("Elapsed"),
                Cell::new(format!("{:.1}s", summary.elapsed_secs))
                    .set_alignment(CellAlignment::Right),
            ]);
            writeln!(writer, "{}", table).map_err(Error::OutputFailed)
        }
        OutputFormat::Json => write_json(summary, writer),
        OutputFormat::None => Ok(()),
    }
}
