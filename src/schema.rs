//! Column profiling for arbitrary survey tables.

use std::collections::HashSet;

use serde::Serialize;

use crate::advisor::{self, ChartSuggestion};
use crate::table::Table;

const SAMPLE_SIZE: usize = 5;
const MAX_CATEGORIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Categorical,
    MultiSelect,
    Datetime,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub sample_values: Vec<String>,
    pub unique_count: usize,
    pub null_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaAnalysis {
    pub columns: Vec<ColumnProfile>,
    pub total_rows: usize,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub multi_select_columns: Vec<String>,
    pub suggested_charts: Vec<ChartSuggestion>,
}

/// Best guesses at which columns play which role in a survey file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldRoles {
    pub id_field: Option<String>,
    pub member_field: Option<String>,
    pub location_field: Option<String>,
    pub timestamp_field: Option<String>,
    pub rating_fields: Vec<String>,
    pub multi_select_fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl StructureReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn is_numeric(value: &str) -> bool {
    value.trim().parse::<f64>().map(|v| !v.is_nan()).unwrap_or(false)
}

fn is_datetime_header(name: &str) -> bool {
    let lowered = name.to_lowercase();
    lowered.contains("timestamp") || lowered.contains("date")
}

/// Classifies one column. Numeric wins over multi-select, which wins over
/// categorical, so rating scales are never read as tag lists.
fn classify(name: &str, values: &[&str], unique_count: usize) -> ColumnType {
    if values.is_empty() {
        return ColumnType::Text;
    }
    if values.iter().all(|v| is_numeric(v)) {
        return ColumnType::Numeric;
    }
    if values.iter().any(|v| v.contains(';')) {
        return ColumnType::MultiSelect;
    }
    if is_datetime_header(name) {
        return ColumnType::Datetime;
    }
    let limit = MAX_CATEGORIES.min(values.len() / 2);
    if unique_count <= limit {
        return ColumnType::Categorical;
    }
    ColumnType::Text
}

pub fn detect(table: &Table) -> Vec<ColumnProfile> {
    table
        .headers
        .iter()
        .map(|name| {
            let values: Vec<&str> = table.column(name).filter(|v| !v.is_empty()).collect();
            let mut seen = HashSet::new();
            let unique: Vec<&str> = values.iter().copied().filter(|v| seen.insert(*v)).collect();
            ColumnProfile {
                name: name.clone(),
                column_type: classify(name, &values, unique.len()),
                sample_values: values.iter().take(SAMPLE_SIZE).map(|v| v.to_string()).collect(),
                unique_count: unique.len(),
                null_count: table.len() - values.len(),
            }
        })
        .collect()
}

pub fn analyze(table: &Table) -> SchemaAnalysis {
    let columns = detect(table);
    let names_of = |ty: ColumnType| -> Vec<String> {
        columns
            .iter()
            .filter(|c| c.column_type == ty)
            .map(|c| c.name.clone())
            .collect()
    };
    SchemaAnalysis {
        total_rows: table.len(),
        numeric_columns: names_of(ColumnType::Numeric),
        categorical_columns: names_of(ColumnType::Categorical),
        multi_select_columns: names_of(ColumnType::MultiSelect),
        suggested_charts: advisor::suggest(&columns),
        columns,
    }
}

pub fn suggest_field_roles(columns: &[ColumnProfile]) -> FieldRoles {
    let named = |needles: &[&str]| -> Option<String> {
        columns
            .iter()
            .find(|c| {
                let lowered = c.name.to_lowercase();
                needles.iter().any(|n| lowered.contains(n))
            })
            .map(|c| c.name.clone())
    };
    FieldRoles {
        id_field: named(&["id"]),
        member_field: named(&["member", "name", "researcher"]),
        location_field: named(&["location", "ward", "neighborhood"]),
        timestamp_field: named(&["timestamp", "date", "time"]),
        rating_fields: columns
            .iter()
            .filter(|c| c.column_type == ColumnType::Numeric && advisor::is_rating_name(&c.name))
            .map(|c| c.name.clone())
            .collect(),
        multi_select_fields: columns
            .iter()
            .filter(|c| c.column_type == ColumnType::MultiSelect)
            .map(|c| c.name.clone())
            .collect(),
    }
}

/// Sanity checks run before normalizing. Only an empty table is an error;
/// everything else is advisory.
pub fn validate_structure(
    table: &Table,
    expected_fields: &[&str],
    member_name: Option<&str>,
) -> StructureReport {
    let mut report = StructureReport::default();
    if table.is_empty() {
        report.errors.push("No data found in CSV file".to_string());
        return report;
    }
    if table.headers.is_empty() {
        report.errors.push("No columns found in CSV data".to_string());
        return report;
    }

    if !expected_fields.is_empty() {
        let missing: Vec<&str> = expected_fields
            .iter()
            .copied()
            .filter(|f| !table.has_column(f))
            .collect();
        let extra: Vec<&str> = table
            .headers
            .iter()
            .map(String::as_str)
            .filter(|h| !expected_fields.contains(h))
            .collect();
        if !missing.is_empty() {
            report
                .warnings
                .push(format!("Missing expected fields: {}", missing.join(", ")));
        }
        if !extra.is_empty() {
            report
                .warnings
                .push(format!("Extra fields found: {}", extra.join(", ")));
        }
    }

    let empty_cells: usize = table
        .headers
        .iter()
        .map(|h| table.column(h).filter(|v| v.is_empty()).count())
        .sum();
    if empty_cells > 0 {
        let total = table.len() * table.headers.len();
        report.warnings.push(format!(
            "{empty_cells} empty values found ({:.1}% of total data)",
            empty_cells as f64 * 100.0 / total as f64
        ));
    }

    if let Some(member_name) = member_name {
        let member_field = table.headers.iter().find(|h| {
            let lowered = h.to_lowercase();
            ["member", "name", "researcher"]
                .iter()
                .any(|n| lowered.contains(n))
        });
        if let Some(field) = member_field {
            let mut seen = HashSet::new();
            let distinct: Vec<&str> = table
                .column(field)
                .filter(|v| !v.is_empty() && seen.insert(*v))
                .collect();
            if distinct.len() > 1 {
                report.warnings.push(format!(
                    "Multiple members found in {member_name}'s CSV: {}",
                    distinct.join(", ")
                ));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Record;

    fn sample_table(headers: &[&str], rows: &[&[&str]]) -> Table {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|cells| {
                headers
                    .iter()
                    .cloned()
                    .zip(cells.iter().map(|c| c.to_string()))
                    .collect::<Record>()
            })
            .collect();
        Table::new(headers, rows)
    }

    fn survey_table() -> Table {
        sample_table(
            &[
                "respondent_id",
                "ward",
                "footpath_condition",
                "obstacles",
                "timestamp",
                "comments",
            ],
            &[
                &["R1", "A", "4", "Potholes;Parking", "2025-09-01", "too hot"],
                &["R2", "A", "2", "Parking", "2025-09-02", "no shade"],
                &["R3", "B", "5", "", "2025-09-03", "dogs"],
                &["R4", "B", "1", "Lighting", "2025-09-04", ""],
            ],
        )
    }

    fn profile<'a>(profiles: &'a [ColumnProfile], name: &str) -> &'a ColumnProfile {
        profiles.iter().find(|p| p.name == name).unwrap()
    }

    #[test]
    fn classifies_columns_by_value_shape() {
        let profiles = detect(&survey_table());
        assert_eq!(profile(&profiles, "footpath_condition").column_type, ColumnType::Numeric);
        assert_eq!(profile(&profiles, "obstacles").column_type, ColumnType::MultiSelect);
        assert_eq!(profile(&profiles, "timestamp").column_type, ColumnType::Datetime);
        assert_eq!(profile(&profiles, "ward").column_type, ColumnType::Categorical);
        assert_eq!(profile(&profiles, "respondent_id").column_type, ColumnType::Text);
        assert_eq!(profile(&profiles, "comments").column_type, ColumnType::Text);
    }

    #[test]
    fn profiles_count_nulls_and_uniques() {
        let profiles = detect(&survey_table());
        let obstacles = profile(&profiles, "obstacles");
        assert_eq!(obstacles.null_count, 1);
        assert_eq!(obstacles.unique_count, 3);
        assert_eq!(obstacles.sample_values, vec!["Potholes;Parking", "Parking", "Lighting"]);
    }

    #[test]
    fn numeric_beats_multi_select_and_empty_columns_are_text() {
        let t = sample_table(&["score", "blank"], &[&["1", ""], &["10", ""]]);
        let profiles = detect(&t);
        assert_eq!(profiles[0].column_type, ColumnType::Numeric);
        assert_eq!(profiles[1].column_type, ColumnType::Text);
        assert_eq!(profiles[1].null_count, 2);
    }

    #[test]
    fn analysis_groups_columns_and_ranks_suggestions() {
        let analysis = analyze(&survey_table());
        assert_eq!(analysis.total_rows, 4);
        assert_eq!(analysis.numeric_columns, vec!["footpath_condition"]);
        assert_eq!(analysis.categorical_columns, vec!["ward"]);
        assert_eq!(analysis.multi_select_columns, vec!["obstacles"]);
        assert_eq!(analysis.suggested_charts[0].column, "obstacles");
    }

    #[test]
    fn field_roles_follow_column_names() {
        let roles = suggest_field_roles(&detect(&survey_table()));
        assert_eq!(roles.id_field.as_deref(), Some("respondent_id"));
        assert_eq!(roles.location_field.as_deref(), Some("ward"));
        assert_eq!(roles.timestamp_field.as_deref(), Some("timestamp"));
        assert_eq!(roles.member_field, None);
        assert_eq!(roles.rating_fields, vec!["footpath_condition"]);
        assert_eq!(roles.multi_select_fields, vec!["obstacles"]);
    }

    #[test]
    fn structure_validation_is_advisory() {
        let t = sample_table(&["member", "ward"], &[&["Aarna", ""], &["Disha", "B"]]);
        let report = validate_structure(&t, &["member", "ward", "timestamp"], Some("Aarna"));
        assert!(report.is_valid());
        assert_eq!(
            report.warnings,
            vec![
                "Missing expected fields: timestamp".to_string(),
                "1 empty values found (25.0% of total data)".to_string(),
                "Multiple members found in Aarna's CSV: Aarna, Disha".to_string(),
            ]
        );

        let empty = validate_structure(&Table::default(), &[], None);
        assert!(!empty.is_valid());
    }
}
