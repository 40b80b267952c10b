use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Columns of the standard survey schema, in file order.
pub const STANDARD_COLUMNS: [&str; 11] = [
    "respondent_id",
    "member",
    "ward",
    "location",
    "footpath_condition",
    "road_condition",
    "walking_frequency",
    "obstacles",
    "reasons_not_walking",
    "improvements",
    "timestamp",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub respondent_id: String,
    pub member: String,
    pub ward: String,
    pub location: String,
    pub footpath_condition: u8,
    pub road_condition: u8,
    pub walking_frequency: WalkingFrequency,
    pub obstacles: Vec<String>,
    pub reasons_not_walking: Vec<String>,
    pub improvements: Vec<String>,
    pub timestamp: String,
}

impl SurveyResponse {
    pub fn rating(&self, field: RatingField) -> u8 {
        match field {
            RatingField::FootpathCondition => self.footpath_condition,
            RatingField::RoadCondition => self.road_condition,
        }
    }

    pub fn answers(&self, field: MultiSelectField) -> &[String] {
        match field {
            MultiSelectField::Obstacles => &self.obstacles,
            MultiSelectField::ReasonsNotWalking => &self.reasons_not_walking,
            MultiSelectField::Improvements => &self.improvements,
        }
    }

    /// Flattens the response back into standard-schema cells. Multi-select
    /// answers are joined with `;` so the generic detector sees them as tag lists.
    pub fn to_record(&self) -> HashMap<String, String> {
        let mut record = HashMap::new();
        record.insert("respondent_id".to_string(), self.respondent_id.clone());
        record.insert("member".to_string(), self.member.clone());
        record.insert("ward".to_string(), self.ward.clone());
        record.insert("location".to_string(), self.location.clone());
        record.insert(
            "footpath_condition".to_string(),
            self.footpath_condition.to_string(),
        );
        record.insert("road_condition".to_string(), self.road_condition.to_string());
        record.insert(
            "walking_frequency".to_string(),
            self.walking_frequency.to_string(),
        );
        record.insert("obstacles".to_string(), self.obstacles.join(";"));
        record.insert(
            "reasons_not_walking".to_string(),
            self.reasons_not_walking.join(";"),
        );
        record.insert("improvements".to_string(), self.improvements.join(";"));
        record.insert("timestamp".to_string(), self.timestamp.clone());
        record
    }
}

/// How often a respondent walks. Unrecognised answers are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WalkingFrequency {
    Daily,
    Weekly,
    Monthly,
    Rarely,
    Never,
    Other(String),
}

impl WalkingFrequency {
    /// Exact match against the canonical labels, used for already-mapped files.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Daily" => WalkingFrequency::Daily,
            "Weekly" => WalkingFrequency::Weekly,
            "Monthly" => WalkingFrequency::Monthly,
            "Rarely" => WalkingFrequency::Rarely,
            "Never" => WalkingFrequency::Never,
            other => WalkingFrequency::Other(other.to_string()),
        }
    }

    /// Substring match against free-text survey answers.
    pub fn from_free_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return WalkingFrequency::Other("Unknown".to_string());
        }
        let lowered = trimmed.to_lowercase();
        if lowered.contains("daily") {
            WalkingFrequency::Daily
        } else if lowered.contains("weekly") || lowered.contains("few times a week") {
            WalkingFrequency::Weekly
        } else if lowered.contains("monthly") || lowered.contains("few times a month") {
            WalkingFrequency::Monthly
        } else if lowered.contains("rarely") || lowered.contains("seldom") {
            WalkingFrequency::Rarely
        } else if lowered.contains("never") {
            WalkingFrequency::Never
        } else {
            WalkingFrequency::Other(trimmed.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            WalkingFrequency::Daily => "Daily",
            WalkingFrequency::Weekly => "Weekly",
            WalkingFrequency::Monthly => "Monthly",
            WalkingFrequency::Rarely => "Rarely",
            WalkingFrequency::Never => "Never",
            WalkingFrequency::Other(s) => s,
        }
    }
}

impl fmt::Display for WalkingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for WalkingFrequency {
    fn from(value: String) -> Self {
        WalkingFrequency::from_label(&value)
    }
}

impl From<WalkingFrequency> for String {
    fn from(value: WalkingFrequency) -> Self {
        value.label().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RatingField {
    FootpathCondition,
    RoadCondition,
}

impl RatingField {
    pub fn from_column(column: &str) -> Option<Self> {
        match column {
            "footpath_condition" => Some(RatingField::FootpathCondition),
            "road_condition" => Some(RatingField::RoadCondition),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiSelectField {
    Obstacles,
    ReasonsNotWalking,
    Improvements,
}

impl MultiSelectField {
    pub fn from_column(column: &str) -> Option<Self> {
        match column {
            "obstacles" => Some(MultiSelectField::Obstacles),
            "reasons_not_walking" => Some(MultiSelectField::ReasonsNotWalking),
            "improvements" => Some(MultiSelectField::Improvements),
            _ => None,
        }
    }
}

/// Chart kinds understood by the transformer and the advisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartKind {
    #[serde(rename = "bar")]
    Bar,
    #[serde(rename = "pie")]
    Pie,
    #[serde(rename = "barByWardAvg")]
    BarByWardAvg,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::BarByWardAvg => "barByWardAvg",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bar" => Ok(ChartKind::Bar),
            "pie" => Ok(ChartKind::Pie),
            "barByWardAvg" => Ok(ChartKind::BarByWardAvg),
            other => Err(format!(
                "unknown chart kind {other:?} (expected bar, pie or barByWardAvg)"
            )),
        }
    }
}

/// One `{name, value}` entry of a chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: f64,
}

impl ChartPoint {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_text_frequency_matches_by_substring() {
        assert_eq!(
            WalkingFrequency::from_free_text("A few times a week"),
            WalkingFrequency::Weekly
        );
        assert_eq!(
            WalkingFrequency::from_free_text("Daily (more than once)"),
            WalkingFrequency::Daily
        );
        assert_eq!(
            WalkingFrequency::from_free_text("Seldom"),
            WalkingFrequency::Rarely
        );
        assert_eq!(
            WalkingFrequency::from_free_text("Only on weekends"),
            WalkingFrequency::Other("Only on weekends".to_string())
        );
        assert_eq!(
            WalkingFrequency::from_free_text("  "),
            WalkingFrequency::Other("Unknown".to_string())
        );
    }

    #[test]
    fn canonical_labels_do_not_reinterpret_free_text() {
        assert_eq!(WalkingFrequency::from_label("Weekly"), WalkingFrequency::Weekly);
        assert_eq!(
            WalkingFrequency::from_label("few times a week"),
            WalkingFrequency::Other("few times a week".to_string())
        );
    }

    #[test]
    fn chart_kind_uses_camel_case_names() {
        assert_eq!("barByWardAvg".parse::<ChartKind>(), Ok(ChartKind::BarByWardAvg));
        assert!("histogram".parse::<ChartKind>().is_err());
        let json = serde_json::to_string(&ChartKind::BarByWardAvg).unwrap();
        assert_eq!(json, "\"barByWardAvg\"");
    }

    #[test]
    fn record_joins_multi_select_answers() {
        let response = SurveyResponse {
            respondent_id: "R-Aarna-001".to_string(),
            member: "Aarna".to_string(),
            ward: "Ward 45".to_string(),
            location: "Goregaon West".to_string(),
            footpath_condition: 2,
            road_condition: 3,
            walking_frequency: WalkingFrequency::Daily,
            obstacles: vec!["potholes".to_string(), "parking".to_string()],
            reasons_not_walking: vec![],
            improvements: vec!["lighting".to_string()],
            timestamp: "2025-09-10T08:00:00.000Z".to_string(),
        };
        let record = response.to_record();
        assert_eq!(record["obstacles"], "potholes;parking");
        assert_eq!(record["reasons_not_walking"], "");
        assert_eq!(record["walking_frequency"], "Daily");
        assert_eq!(record.len(), STANDARD_COLUMNS.len());
    }
}
