//! Picks which profiled columns are worth charting, and how.

use serde::Serialize;

use crate::models::ChartKind;
use crate::schema::{ColumnProfile, ColumnType, SchemaAnalysis};

const MULTI_SELECT_PRIORITY: u8 = 10;
const RATING_PRIORITY: u8 = 9;
const CATEGORICAL_PRIORITY: u8 = 8;
const MAX_PIE_CATEGORIES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSuggestion {
    pub column: String,
    pub chart_type: ChartKind,
    pub title: String,
    /// Higher is more informative.
    pub priority: u8,
}

pub fn is_rating_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    ["condition", "rating", "score"]
        .iter()
        .any(|n| lowered.contains(n))
}

/// `footpath_condition` -> `Footpath Condition`.
pub fn humanize(column: &str) -> String {
    column
        .replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Suggestions sorted by descending priority; columns with no useful chart
/// are left out. Ties keep column order.
pub fn suggest(columns: &[ColumnProfile]) -> Vec<ChartSuggestion> {
    let mut suggestions: Vec<ChartSuggestion> = columns
        .iter()
        .filter_map(|column| {
            let name = humanize(&column.name);
            let (chart_type, title, priority) = match column.column_type {
                ColumnType::Numeric if is_rating_name(&column.name) => {
                    (ChartKind::Bar, format!("{name} Distribution"), RATING_PRIORITY)
                }
                ColumnType::Categorical if column.unique_count <= MAX_PIE_CATEGORIES => {
                    (ChartKind::Pie, format!("{name} Breakdown"), CATEGORICAL_PRIORITY)
                }
                ColumnType::MultiSelect => {
                    (ChartKind::Pie, format!("Top {name}"), MULTI_SELECT_PRIORITY)
                }
                _ => return None,
            };
            Some(ChartSuggestion {
                column: column.name.clone(),
                chart_type,
                title,
                priority,
            })
        })
        .collect();
    suggestions.sort_by(|a, b| b.priority.cmp(&a.priority));
    suggestions
}

/// The two columns a member view should chart when it has no explicit
/// chart configuration.
pub fn detect_best_metrics(schema: &SchemaAnalysis) -> Vec<String> {
    schema
        .suggested_charts
        .iter()
        .take(2)
        .map(|s| s.column.clone())
        .collect()
}

pub fn optimal_chart_type(column: &str, schema: &SchemaAnalysis) -> ChartKind {
    schema
        .suggested_charts
        .iter()
        .find(|s| s.column == column)
        .map(|s| s.chart_type)
        .unwrap_or(ChartKind::Bar)
}
