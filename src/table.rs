//! Primitives for turning raw CSV text into header-keyed rows.

use std::collections::HashMap;

use tracing::debug;

use crate::error::ParseError;
use crate::models::{SurveyResponse, STANDARD_COLUMNS};

pub type Record = HashMap<String, String>;

/// Header-ordered rows. Cells are trimmed; missing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Record>,
}

/// Outcome of a parse that was structurally sound. `issues` holds row-level
/// problems that did not stop the parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub table: Table,
    pub issues: Vec<String>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Record>) -> Self {
        Self { headers, rows }
    }

    pub fn from_responses(responses: &[SurveyResponse]) -> Self {
        Self {
            headers: STANDARD_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: responses.iter().map(SurveyResponse::to_record).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Every row's cell for `column`, empty strings included.
    pub fn column<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(column).map(String::as_str).unwrap_or(""))
    }
}

pub fn parse_csv(text: &str, skip_empty_lines: bool) -> Result<Parsed, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    // Escaped quotes come in pairs, so an odd count means one is never closed.
    if text.chars().filter(|c| *c == '"').count() % 2 == 1 {
        return Err(ParseError::Quotes);
    }
    let header_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if !header_line.contains(',') {
        if let Some(c) = header_line.chars().find(|c| *c == '\t' || *c == ';') {
            return Err(ParseError::Delimiter(c));
        }
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| ParseError::Malformed(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::NoHeaders);
    }

    let mut rows = Vec::new();
    let mut issues = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let rowno = idx + 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                issues.push(format!("Row {rowno}: {e}"));
                continue;
            }
        };
        if skip_empty_lines && record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        if record.len() < headers.len() {
            issues.push(format!(
                "Row {rowno}: Too few fields: expected {} fields but parsed {}",
                headers.len(),
                record.len()
            ));
        } else if record.len() > headers.len() {
            issues.push(format!(
                "Row {rowno}: Too many fields: expected {} fields but parsed {}",
                headers.len(),
                record.len()
            ));
        }
        let row: Record = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }
    debug!(rows = rows.len(), issues = issues.len(), "parsed csv");

    if rows.is_empty() {
        return Err(ParseError::NoRows);
    }
    Ok(Parsed {
        table: Table::new(headers, rows),
        issues,
    })
}
