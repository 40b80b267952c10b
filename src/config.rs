//! Dashboard configuration: researchers, their survey files and the ward table.
//!
//! Everything has a built-in default so the dashboard runs without a config
//! file; a JSON file may override any top-level section.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::ChartKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Directory that rooted survey paths (`/data/...`) resolve against.
    pub data_root: PathBuf,
    pub members: Vec<MemberSource>,
    pub wards: Vec<WardRule>,
    pub loader: LoaderSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSource {
    pub name: String,
    pub csv: String,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub metric: String,
    pub title: String,
}

/// Maps any neighbourhood containing `neighborhood` (case-insensitive) to `ward`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardRule {
    pub neighborhood: String,
    pub ward: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub backoff_base_ms: u64,
}

impl LoaderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_secs: 15,
            backoff_base_ms: 1000,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("public"),
            members: default_members(),
            wards: default_wards(),
            loader: LoaderSettings::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Invalid {
            path: display,
            source,
        })
    }

    pub fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name.clone()).collect()
    }

    pub fn member(&self, name: &str) -> Option<&MemberSource> {
        self.members
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

fn chart(kind: ChartKind, metric: &str, title: &str) -> ChartConfig {
    ChartConfig {
        kind,
        metric: metric.to_string(),
        title: title.to_string(),
    }
}

fn member(name: &str, charts: Vec<ChartConfig>) -> MemberSource {
    MemberSource {
        name: name.to_string(),
        csv: format!("/data/Walkability Survey ({name}).csv"),
        charts,
    }
}

fn default_members() -> Vec<MemberSource> {
    vec![
        member(
            "Niranjan",
            vec![
                chart(
                    ChartKind::Bar,
                    "footpath_condition",
                    "Footpath Condition Distribution (1-5)",
                ),
                chart(ChartKind::Pie, "obstacles", "Top Obstacles Encountered"),
            ],
        ),
        member(
            "Aarna",
            vec![
                chart(
                    ChartKind::Pie,
                    "walking_frequency",
                    "Walking Frequency Distribution",
                ),
                chart(ChartKind::Bar, "improvements", "Top Requested Improvements"),
            ],
        ),
        member(
            "Disha",
            vec![
                chart(
                    ChartKind::BarByWardAvg,
                    "footpath_condition",
                    "Average Footpath Condition by Ward",
                ),
                chart(
                    ChartKind::Pie,
                    "reasons_not_walking",
                    "Reasons for Not Walking",
                ),
            ],
        ),
        member(
            "Crisann",
            vec![
                chart(
                    ChartKind::Bar,
                    "road_condition",
                    "Road Condition Distribution (1-5)",
                ),
                chart(ChartKind::Pie, "obstacles", "Top Obstacles Encountered"),
            ],
        ),
    ]
}

fn default_wards() -> Vec<WardRule> {
    [
        ("dombivli", "Ward 62"),
        ("dahisar", "Ward 45"),
        ("nallasopara", "Ward 78"),
        ("kandivali", "Ward 91"),
        ("goregaon", "Ward 45"),
        ("andheri", "Ward 58"),
        ("bandra", "Ward 50"),
        ("dadar", "Ward 227"),
        ("virar", "Ward 78"),
    ]
    .into_iter()
    .map(|(neighborhood, ward)| WardRule {
        neighborhood: neighborhood.to_string(),
        ward: ward.to_string(),
    })
    .collect()
}
