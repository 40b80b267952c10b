//! Format detection and mapping of raw survey rows onto `SurveyResponse`.
//!
//! A file is classified once, then every row goes through the mapper for
//! that format. Mapping is lenient: bad cells get defaults and a warning, a
//! row is never dropped.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::lookup::{MemberDirectory, MemberMatch, WardTable};
use crate::models::{SurveyResponse, WalkingFrequency};
use crate::table::{Record, Table};

const DEFAULT_RATING: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Columns already match the target schema.
    Standard,
    /// Raw survey-platform export with question text as headers.
    LongForm,
}

impl SourceFormat {
    /// A timestamp column next to an age-group or neighbourhood question marks
    /// the long-form export.
    pub fn detect(headers: &[String]) -> Self {
        let has_timestamp = headers.iter().any(|h| h == "Timestamp" || h == "timestamp");
        let has_demographic = headers
            .iter()
            .any(|h| h.contains("Age group") || h.contains("Neighborhood"));
        if has_timestamp && has_demographic {
            SourceFormat::LongForm
        } else {
            SourceFormat::Standard
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Standard => f.write_str("standard"),
            SourceFormat::LongForm => f.write_str("long-form"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub format: SourceFormat,
    pub member: MemberMatch,
    pub responses: Vec<SurveyResponse>,
    pub warnings: Vec<String>,
}

/// Maps raw tables onto survey responses. `ingested_at` stands in for any
/// timestamp that cannot be read from the source.
#[derive(Debug, Clone)]
pub struct Normalizer<'a> {
    directory: &'a MemberDirectory,
    wards: &'a WardTable,
    ingested_at: DateTime<Utc>,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        directory: &'a MemberDirectory,
        wards: &'a WardTable,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            directory,
            wards,
            ingested_at,
        }
    }

    pub fn normalize(&self, table: &Table, source_path: &str) -> Normalized {
        let member = self.directory.resolve(source_path);
        let format = SourceFormat::detect(&table.headers);
        info!(
            path = source_path,
            member = member.name(),
            %format,
            rows = table.len(),
            "Normalizing survey rows"
        );

        let mut warnings = Vec::new();
        let responses = match format {
            SourceFormat::Standard => self.map_standard(table, &member, &mut warnings),
            SourceFormat::LongForm => self.map_long_form(table, &member, &mut warnings),
        };
        for w in &warnings {
            warn!(path = source_path, "{w}");
        }

        Normalized {
            format,
            member,
            responses,
            warnings,
        }
    }

    fn map_standard(
        &self,
        table: &Table,
        member: &MemberMatch,
        warnings: &mut Vec<String>,
    ) -> Vec<SurveyResponse> {
        let mut foreign_members = BTreeSet::new();
        let responses = table
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let rowno = idx + 1;
                let cell = |name: &str| row.get(name).map(|s| s.trim()).unwrap_or("");

                let row_member = match cell("member") {
                    "" => member.name().to_string(),
                    m => {
                        if member.is_known() && m != member.name() {
                            foreign_members.insert(m.to_string());
                        }
                        m.to_string()
                    }
                };
                let respondent_id = match cell("respondent_id") {
                    "" => {
                        warnings.push(format!("Row {rowno}: missing respondent_id, generated one"));
                        format!("{row_member}-{rowno}")
                    }
                    id => id.to_string(),
                };
                let location = cell("location").to_string();
                let ward = match cell("ward") {
                    "" => self.wards.resolve(&location).label(),
                    w => w.to_string(),
                };

                SurveyResponse {
                    respondent_id,
                    member: row_member,
                    ward,
                    location,
                    footpath_condition: standard_rating(
                        cell("footpath_condition"),
                        rowno,
                        "footpath_condition",
                        warnings,
                    ),
                    road_condition: standard_rating(
                        cell("road_condition"),
                        rowno,
                        "road_condition",
                        warnings,
                    ),
                    walking_frequency: WalkingFrequency::from_label(cell("walking_frequency")),
                    obstacles: split_standard(cell("obstacles")),
                    reasons_not_walking: split_standard(cell("reasons_not_walking")),
                    improvements: split_standard(cell("improvements")),
                    timestamp: standard_timestamp(
                        cell("timestamp"),
                        rowno,
                        self.ingested_at,
                        warnings,
                    ),
                }
            })
            .collect();

        if !foreign_members.is_empty() {
            let names: Vec<String> = foreign_members.into_iter().collect();
            warnings.push(format!(
                "Rows attributed to other members in {}'s file: {}",
                member.name(),
                names.join(", ")
            ));
        }
        responses
    }

    fn map_long_form(
        &self,
        table: &Table,
        member: &MemberMatch,
        warnings: &mut Vec<String>,
    ) -> Vec<SurveyResponse> {
        let columns = LongFormColumns::resolve(&table.headers, warnings);
        let member_name = member.name();

        table
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let rowno = idx + 1;
                let neighborhood = match columns.get(row, columns.neighborhood) {
                    "" => "Unknown".to_string(),
                    n => n.to_string(),
                };
                let obstacles = tokenize_answers(columns.get(row, columns.barriers));

                SurveyResponse {
                    respondent_id: format!("R-{member_name}-{rowno:03}"),
                    member: member_name.to_string(),
                    ward: self.wards.resolve(&neighborhood).label(),
                    location: neighborhood,
                    footpath_condition: long_form_rating(
                        columns.get(row, columns.home_rating),
                        rowno,
                        "neighbourhood infrastructure",
                        warnings,
                    ),
                    road_condition: long_form_rating(
                        columns.get(row, columns.work_rating),
                        rowno,
                        "workplace infrastructure",
                        warnings,
                    ),
                    walking_frequency: WalkingFrequency::from_free_text(
                        columns.get(row, columns.frequency),
                    ),
                    reasons_not_walking: obstacles.clone(),
                    obstacles,
                    improvements: tokenize_answers(columns.get(row, columns.improvements)),
                    timestamp: match parse_export_timestamp(columns.get(row, columns.timestamp)) {
                        Some(ts) => iso(ts),
                        None => {
                            warnings.push(format!(
                                "Row {rowno}: unparsable timestamp {:?}, using ingestion time",
                                columns.get(row, columns.timestamp)
                            ));
                            iso(self.ingested_at)
                        }
                    },
                }
            })
            .collect()
    }
}

/// Header positions of the long-form questions that feed the target schema.
struct LongFormColumns<'h> {
    timestamp: Option<&'h str>,
    neighborhood: Option<&'h str>,
    frequency: Option<&'h str>,
    home_rating: Option<&'h str>,
    work_rating: Option<&'h str>,
    barriers: Option<&'h str>,
    improvements: Option<&'h str>,
}

impl<'h> LongFormColumns<'h> {
    fn resolve(headers: &'h [String], warnings: &mut Vec<String>) -> Self {
        let mut find = |label: &str, needle: &str| -> Option<&'h str> {
            let found = headers
                .iter()
                .find(|h| h.to_lowercase().contains(needle))
                .map(String::as_str);
            if found.is_none() {
                warnings.push(format!("Missing expected column: {label}"));
            }
            found
        };
        Self {
            timestamp: find("timestamp", "timestamp"),
            neighborhood: find("home neighbourhood", "neighborhood do you stay"),
            frequency: find("walking frequency", "how often do you walk"),
            home_rating: find("neighbourhood rating", "infrastructure of your neighborhood"),
            work_rating: find("workplace rating", "infrastructure near your workplace"),
            barriers: find("barriers", "biggest barriers"),
            improvements: find("improvements", "need improvements"),
        }
    }

    fn get<'r>(&self, row: &'r Record, column: Option<&str>) -> &'r str {
        column
            .and_then(|c| row.get(c))
            .map(|s| s.trim())
            .unwrap_or("")
    }
}

/// RFC 3339 values are kept verbatim; export-style dates are rewritten as
/// ISO-8601; anything else falls back to the ingestion time.
fn standard_timestamp(
    cell: &str,
    rowno: usize,
    ingested_at: DateTime<Utc>,
    warnings: &mut Vec<String>,
) -> String {
    if cell.is_empty() {
        warnings.push(format!("Row {rowno}: missing timestamp, using ingestion time"));
        return iso(ingested_at);
    }
    if DateTime::parse_from_rfc3339(cell).is_ok() {
        return cell.to_string();
    }
    match parse_export_timestamp(cell) {
        Some(ts) => iso(ts),
        None => {
            warnings.push(format!(
                "Row {rowno}: unparsable timestamp {cell:?}, using ingestion time"
            ));
            iso(ingested_at)
        }
    }
}

fn standard_rating(cell: &str, rowno: usize, column: &str, warnings: &mut Vec<String>) -> u8 {
    let value = match leading_integer(cell) {
        Some(v) => v,
        None => {
            warnings.push(format!(
                "Row {rowno}: unreadable {column} {cell:?}, defaulting to {DEFAULT_RATING}"
            ));
            DEFAULT_RATING
        }
    };
    clamp_rating(value, rowno, column, warnings)
}

/// Long-form ratings use a 1-10 scale and are halved (rounding up) onto 1-5.
/// A zero or unreadable answer counts as the default.
fn long_form_rating(cell: &str, rowno: usize, question: &str, warnings: &mut Vec<String>) -> u8 {
    let raw = match leading_integer(cell) {
        Some(v) if v != 0 => v,
        _ => {
            if !cell.is_empty() {
                warnings.push(format!(
                    "Row {rowno}: unreadable {question} rating {cell:?}, defaulting to {DEFAULT_RATING}"
                ));
            }
            DEFAULT_RATING
        }
    };
    clamp_rating(rescale_rating(raw), rowno, question, warnings)
}

pub fn rescale_rating(raw: i64) -> i64 {
    raw.div_euclid(2) + raw.rem_euclid(2)
}

fn clamp_rating(value: i64, rowno: usize, column: &str, warnings: &mut Vec<String>) -> u8 {
    let clamped = value.clamp(1, 5);
    if clamped != value {
        warnings.push(format!(
            "Row {rowno}: {column} {value} outside 1-5, clamped to {clamped}"
        ));
    }
    clamped as u8
}

/// Reads the integer at the start of `s`, ignoring anything after it
/// (`"7 - Good"` reads as 7, `"4.5"` as 4).
pub fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|v| sign * v)
}

pub fn split_standard(cell: &str) -> Vec<String> {
    cell.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn punctuation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("valid punctuation pattern"))
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Splits a free-text multi-select answer into snake_case tokens, keeping the
/// first occurrence of each.
pub fn tokenize_answers(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for part in text.split([',', ';']) {
        let lowered = part.trim().to_lowercase();
        let stripped = punctuation().replace_all(&lowered, "");
        let joined = whitespace().replace_all(stripped.trim(), "_");
        let token = joined.trim_matches('_');
        if !token.is_empty() && !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Survey exports write `DD/MM/YYYY HH:MM:SS`; shorter variants are accepted.
pub fn parse_export_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(s, "%d/%m/%Y")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const NEIGHBORHOOD: &str =
        "What Neighborhood do you stay in (Eg. Bandra, West, Dadar East, Goregaon West, etc)";
    const FREQUENCY: &str =
        "How often do you walk for your daily activities?(Work, transit connections,etc)";
    const HOME_RATING: &str = "What would rate about the infrastructure of your neighborhood?";
    const WORK_RATING: &str =
        "What would rate about the infrastructure near your workplace/studyplace neighborhood?";
    const BARRIERS: &str =
        "What are the biggest barriers that prevent you from walking more? (Select all that apply.)";
    const IMPROVEMENTS: &str =
        "What would be 3 aspects that need improvements to make your neighborhood more walkable?";

    fn ingested_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap()
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|cells| {
                headers
                    .iter()
                    .cloned()
                    .zip(cells.iter().map(|c| c.to_string()))
                    .collect()
            })
            .collect();
        Table::new(headers, rows)
    }

    fn long_form_row(neighborhood: &str, timestamp: &str, home: &str) -> Table {
        table(
            &[
                "Timestamp",
                "What Age group do you belong from?",
                NEIGHBORHOOD,
                FREQUENCY,
                HOME_RATING,
                WORK_RATING,
                BARRIERS,
                IMPROVEMENTS,
            ],
            &[&[
                timestamp,
                "18-25",
                neighborhood,
                "A few times a week",
                home,
                "10",
                "Poor lighting, Encroachment by hawkers; Poor lighting",
                "Wider footpaths; Street-lights!",
            ]],
        )
    }

    fn normalize(table: &Table, path: &str) -> Normalized {
        let directory = MemberDirectory::default();
        let wards = WardTable::default();
        Normalizer::new(&directory, &wards, ingested_at()).normalize(table, path)
    }

    #[test]
    fn detects_format_from_marker_columns() {
        let standard: Vec<String> = crate::models::STANDARD_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(SourceFormat::detect(&standard), SourceFormat::Standard);
        let long_form = long_form_row("Bandra", "01/09/2025 08:00:00", "8");
        assert_eq!(SourceFormat::detect(&long_form.headers), SourceFormat::LongForm);
    }

    #[test]
    fn standard_rows_pass_through_with_split_answers() {
        let t = table(
            &crate::models::STANDARD_COLUMNS,
            &[&[
                "R1",
                "Niranjan",
                "Ward 50",
                "Bandra West",
                "4",
                "2",
                "Weekly",
                "Potholes; Parking ;",
                "",
                "Lighting",
                "2025-09-01T08:00:00Z",
            ]],
        );
        let out = normalize(&t, "/data/Walkability Survey (Niranjan).csv");
        assert_eq!(out.format, SourceFormat::Standard);
        assert!(out.warnings.is_empty());
        let r = &out.responses[0];
        assert_eq!(r.respondent_id, "R1");
        assert_eq!(r.member, "Niranjan");
        assert_eq!(r.ward, "Ward 50");
        assert_eq!(r.location, "Bandra West");
        assert_eq!((r.footpath_condition, r.road_condition), (4, 2));
        assert_eq!(r.walking_frequency, WalkingFrequency::Weekly);
        assert_eq!(r.obstacles, vec!["Potholes", "Parking"]);
        assert!(r.reasons_not_walking.is_empty());
        assert_eq!(r.improvements, vec!["Lighting"]);
        assert_eq!(r.timestamp, "2025-09-01T08:00:00Z");
    }

    #[test]
    fn standard_rows_are_clamped_and_defaulted_with_warnings() {
        let t = table(
            &["respondent_id", "location", "footpath_condition", "road_condition"],
            &[&["", "Dadar East", "9", "n/a"]],
        );
        let out = normalize(&t, "/data/Walkability Survey (Disha).csv");
        let r = &out.responses[0];
        assert_eq!(r.respondent_id, "Disha-1");
        assert_eq!(r.member, "Disha");
        assert_eq!(r.ward, "Ward 227");
        assert_eq!(r.footpath_condition, 5);
        assert_eq!(r.road_condition, 3);
        assert_eq!(r.timestamp, "2025-10-01T12:00:00.000Z");
        assert_eq!(out.warnings.len(), 4);
    }

    #[test]
    fn standard_timestamps_are_checked() {
        let t = table(
            &["respondent_id", "timestamp"],
            &[
                &["R1", "2025-09-01T08:00:00+05:30"],
                &["R2", "02/09/2025 18:30"],
                &["R3", "not-a-date"],
            ],
        );
        let out = normalize(&t, "/data/Walkability Survey (Niranjan).csv");
        let stamps: Vec<&str> = out.responses.iter().map(|r| r.timestamp.as_str()).collect();
        assert_eq!(
            stamps,
            vec![
                "2025-09-01T08:00:00+05:30",
                "2025-09-02T18:30:00.000Z",
                "2025-10-01T12:00:00.000Z",
            ]
        );
        assert!(out
            .warnings
            .iter()
            .any(|w| w == "Row 3: unparsable timestamp \"not-a-date\", using ingestion time"));
    }

    #[test]
    fn standard_rows_from_other_members_are_flagged() {
        let t = table(&["member", "footpath_condition"], &[&["Aarna", "3"], &["Disha", "3"]]);
        let out = normalize(&t, "/data/Walkability Survey (Aarna).csv");
        assert_eq!(out.responses[1].member, "Disha");
        assert!(out
            .warnings
            .iter()
            .any(|w| w == "Rows attributed to other members in Aarna's file: Disha"));
    }

    #[test]
    fn long_form_rows_are_mapped_onto_the_target_schema() {
        let t = long_form_row("Goregaon West", "01/09/2025 08:05:09", "7");
        let out = normalize(&t, "/data/Walkability Survey (Aarna).csv");
        assert_eq!(out.format, SourceFormat::LongForm);
        let r = &out.responses[0];
        assert_eq!(r.respondent_id, "R-Aarna-001");
        assert_eq!(r.member, "Aarna");
        assert_eq!(r.ward, "Ward 45");
        assert_eq!(r.location, "Goregaon West");
        assert_eq!(r.footpath_condition, 4);
        assert_eq!(r.road_condition, 5);
        assert_eq!(r.walking_frequency, WalkingFrequency::Weekly);
        assert_eq!(r.obstacles, vec!["poor_lighting", "encroachment_by_hawkers"]);
        assert_eq!(r.reasons_not_walking, r.obstacles);
        assert_eq!(r.improvements, vec!["wider_footpaths", "streetlights"]);
        assert_eq!(r.timestamp, "2025-09-01T08:05:09.000Z");
    }

    #[test]
    fn unknown_neighbourhood_gets_a_synthetic_ward() {
        let t = long_form_row("Powai", "01/09/2025 08:00:00", "5");
        let out = normalize(&t, "/data/unlabelled.csv");
        let r = &out.responses[0];
        assert_eq!(r.ward, "Ward Powai");
        assert_eq!(r.member, "Unknown");
        assert_eq!(r.respondent_id, "R-Unknown-001");
    }

    #[test]
    fn malformed_timestamp_falls_back_to_ingestion_time_with_warning() {
        let t = long_form_row("Virar", "not-a-date", "abc");
        let out = normalize(&t, "/data/Walkability Survey (Disha).csv");
        assert_eq!(out.responses.len(), 1);
        let r = &out.responses[0];
        assert_eq!(r.timestamp, "2025-10-01T12:00:00.000Z");
        // Unreadable rating defaults to 3, which rescales to 2.
        assert_eq!(r.footpath_condition, 2);
        assert!(out
            .warnings
            .iter()
            .any(|w| w.contains("unparsable timestamp \"not-a-date\"")));
        assert!(out.warnings.iter().any(|w| w.contains("unreadable")));
    }

    #[test]
    fn long_form_missing_columns_use_defaults() {
        let t = table(&["Timestamp", "What Age group do you belong from?"], &[&["", "26-35"]]);
        let out = normalize(&t, "/data/Walkability Survey (Crisann).csv");
        let r = &out.responses[0];
        assert_eq!(r.location, "Unknown");
        assert_eq!(r.ward, "Ward Unknown");
        assert_eq!((r.footpath_condition, r.road_condition), (2, 2));
        assert_eq!(r.walking_frequency, WalkingFrequency::Other("Unknown".to_string()));
        assert!(out
            .warnings
            .iter()
            .any(|w| w == "Missing expected column: barriers"));
    }

    #[test]
    fn ratings_always_land_in_range() {
        for raw in [-4, 0, 1, 2, 9, 10, 11, 250] {
            let mut warnings = Vec::new();
            let v = long_form_rating(&raw.to_string(), 1, "q", &mut warnings);
            assert!((1..=5).contains(&v), "{raw} mapped to {v}");
            let v = standard_rating(&raw.to_string(), 1, "c", &mut warnings);
            assert!((1..=5).contains(&v), "{raw} mapped to {v}");
        }
        assert_eq!(rescale_rating(7), 4);
        assert_eq!(rescale_rating(10), 5);
        assert_eq!(rescale_rating(1), 1);
    }

    #[test]
    fn leading_integer_reads_like_a_form_export() {
        assert_eq!(leading_integer("7 - Good"), Some(7));
        assert_eq!(leading_integer(" 4.5"), Some(4));
        assert_eq!(leading_integer("-2"), Some(-2));
        assert_eq!(leading_integer("good"), None);
        assert_eq!(leading_integer(""), None);
    }

    #[test]
    fn export_timestamps_accept_short_forms() {
        let expected = Utc.with_ymd_and_hms(2025, 9, 1, 8, 5, 0).unwrap();
        assert_eq!(parse_export_timestamp("1/9/2025 8:05:00"), Some(expected));
        assert_eq!(parse_export_timestamp("01/09/2025 08:05"), Some(expected));
        assert!(parse_export_timestamp("31/02/2025 08:00:00").is_none());
    }
}
