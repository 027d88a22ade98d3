//! CSV input: one migration unit per row, parsed with a quoted-field-aware
//! reader and materialized into immutable typed rows.
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::config::TagMode;

/// How a row's date range is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateType {
    Single,
    Range,
}

impl DateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateType::Single => "single",
            DateType::Range => "range",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "single" => DateType::Single,
            "range" => DateType::Range,
            other => {
                warn!(value = other, "unknown dateType, defaulting to single");
                DateType::Single
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    Yyyy,
    MmYyyy,
    DdMmYyyy,
}

impl DateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFormat::Yyyy => "yyyy",
            DateFormat::MmYyyy => "mm/yyyy",
            DateFormat::DdMmYyyy => "dd/mm/yyyy",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "yyyy" => DateFormat::Yyyy,
            "" | "mm/yyyy" => DateFormat::MmYyyy,
            "dd/mm/yyyy" => DateFormat::DdMmYyyy,
            other => {
                warn!(value = other, "unknown dateFormat, defaulting to mm/yyyy");
                DateFormat::MmYyyy
            }
        }
    }
}

/// A tag reference as found in the CSV. The two modes are incompatible wire
/// formats; both normalize to numeric identifiers before payload assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRef {
    ById(u64),
    ByName(String),
}

/// One migration unit. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub title: String,
    pub company: String,
    pub role: String,
    pub subtext: String,
    pub content: String,
    pub date_start: String,
    pub date_end: Option<String>,
    pub date_type: DateType,
    pub date_format: DateFormat,
    pub company_url: Option<String>,
    pub categories: Vec<u64>,
    pub tags: Vec<TagRef>,
}

impl ProjectRow {
    /// Lower-cased company name, the key linking a row to its media
    /// subdirectory.
    pub fn project_key(&self) -> String {
        self.company.to_lowercase()
    }
}

#[derive(Debug, Deserialize)]
struct RawProjectRow {
    #[serde(default)]
    title: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    subtext: String,
    #[serde(default)]
    content: String,
    #[serde(default, rename = "dateStart")]
    date_start: String,
    #[serde(default, rename = "dateEnd")]
    date_end: String,
    #[serde(default, rename = "dateType")]
    date_type: String,
    #[serde(default, rename = "dateFormat")]
    date_format: String,
    #[serde(default, rename = "company_url")]
    company_url: String,
    #[serde(default)]
    categories: String,
    #[serde(default)]
    tags: String,
}

fn none_if_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_id_list(raw: &str, column: &str) -> Vec<u64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(column, value = s, "skipping non-numeric identifier");
                None
            }
        })
        .collect()
}

fn parse_tags(raw: &str, mode: TagMode) -> Vec<TagRef> {
    match mode {
        TagMode::ById => parse_id_list(raw, "tags")
            .into_iter()
            .map(TagRef::ById)
            .collect(),
        TagMode::ByName => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| TagRef::ByName(s.to_string()))
            .collect(),
    }
}

fn rows_from_reader<R: Read>(reader: R, tag_mode: TagMode) -> Result<Vec<ProjectRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in rdr.deserialize::<RawProjectRow>() {
        let raw = record.context("malformed CSV record")?;
        rows.push(ProjectRow {
            date_type: DateType::parse(&raw.date_type),
            date_format: DateFormat::parse(&raw.date_format),
            date_end: none_if_empty(raw.date_end),
            company_url: none_if_empty(raw.company_url),
            categories: parse_id_list(&raw.categories, "categories"),
            tags: parse_tags(&raw.tags, tag_mode),
            title: raw.title,
            company: raw.company,
            role: raw.role,
            subtext: raw.subtext,
            content: raw.content,
            date_start: raw.date_start,
        });
    }
    Ok(rows)
}

/// Load project rows in CSV order.
pub fn load_projects(path: &Path, tag_mode: TagMode) -> Result<Vec<ProjectRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open CSV file {}", path.display()))?;
    rows_from_reader(file, tag_mode)
}

/// A tag row from the bulk tag CSV (`name,description`).
#[derive(Debug, Clone, Deserialize)]
pub struct TagRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub fn load_tag_rows(path: &Path) -> Result<Vec<TagRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open CSV file {}", path.display()))?;
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let mut rows = Vec::new();
    for record in rdr.deserialize::<TagRow>() {
        let row = record.context("malformed tag record")?;
        if !row.name.is_empty() {
            rows.push(row);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(content: &str, mode: TagMode) -> Vec<ProjectRow> {
        rows_from_reader(content.as_bytes(), mode).unwrap()
    }

    #[test]
    fn quoted_field_with_embedded_comma_stays_whole() {
        let rows = load(
            "title,company,role,subtext,content,dateStart\n\
             Redesign,\"Acme, Inc.\",Lead,Sub,Body,01/2020\n",
            TagMode::ById,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].company, "Acme, Inc.");
        assert_eq!(rows[0].project_key(), "acme, inc.");
    }

    #[test]
    fn absent_date_end_is_none_not_empty() {
        let rows = load(
            "title,company,dateStart,dateEnd\nA,B,01/2020,\n",
            TagMode::ById,
        );
        assert_eq!(rows[0].date_end, None);
    }

    #[test]
    fn date_fields_default_when_missing() {
        let rows = load("title,company,dateStart\nA,B,2020\n", TagMode::ById);
        assert_eq!(rows[0].date_type, DateType::Single);
        assert_eq!(rows[0].date_format, DateFormat::MmYyyy);
    }

    #[test]
    fn date_fields_parse_explicit_values() {
        let rows = load(
            "title,company,dateStart,dateEnd,dateType,dateFormat\n\
             A,B,01/01/2020,02/02/2021,range,dd/mm/yyyy\n",
            TagMode::ById,
        );
        assert_eq!(rows[0].date_type, DateType::Range);
        assert_eq!(rows[0].date_format, DateFormat::DdMmYyyy);
        assert_eq!(rows[0].date_end.as_deref(), Some("02/02/2021"));
    }

    #[test]
    fn tags_parse_as_ids_or_names_by_mode() {
        let csv = "title,company,dateStart,tags\nA,B,2020,\"3, 14, x\"\n";
        let by_id = load(csv, TagMode::ById);
        assert_eq!(by_id[0].tags, vec![TagRef::ById(3), TagRef::ById(14)]);

        let by_name = load(csv, TagMode::ByName);
        assert_eq!(
            by_name[0].tags,
            vec![
                TagRef::ByName("3".into()),
                TagRef::ByName("14".into()),
                TagRef::ByName("x".into())
            ]
        );
    }

    #[test]
    fn categories_split_on_commas() {
        let rows = load(
            "title,company,dateStart,categories\nA,B,2020,\"1,2\"\n",
            TagMode::ById,
        );
        assert_eq!(rows[0].categories, vec![1, 2]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let rows = load("title,company,dateStart\nA,B,2020\n\n", TagMode::ById);
        assert_eq!(rows.len(), 1);
    }
}
