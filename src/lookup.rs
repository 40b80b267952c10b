//! Table-driven identity heuristics: which researcher a file belongs to and
//! which ward a neighbourhood sits in. Adding a member or ward means editing
//! the table, not this code.

use tracing::warn;

use crate::config::{DashboardConfig, WardRule};

pub const UNKNOWN_MEMBER: &str = "Unknown";
pub const UNKNOWN_WARD: &str = "Unknown Ward";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberMatch {
    Known(String),
    Unknown,
}

impl MemberMatch {
    pub fn name(&self) -> &str {
        match self {
            MemberMatch::Known(name) => name,
            MemberMatch::Unknown => UNKNOWN_MEMBER,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, MemberMatch::Known(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDirectory {
    names: Vec<String>,
}

impl MemberDirectory {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.member_names())
    }

    /// A `(Name)` tag in the path wins; otherwise the first name found anywhere
    /// in the path, ignoring case.
    pub fn resolve(&self, path: &str) -> MemberMatch {
        if let Some(name) = self
            .names
            .iter()
            .find(|name| path.contains(&format!("({name})")))
        {
            return MemberMatch::Known(name.clone());
        }
        let lowered = path.to_lowercase();
        if let Some(name) = self
            .names
            .iter()
            .find(|name| lowered.contains(&name.to_lowercase()))
        {
            return MemberMatch::Known(name.clone());
        }
        warn!(path, "Could not determine member name from path");
        MemberMatch::Unknown
    }
}

impl Default for MemberDirectory {
    fn default() -> Self {
        Self::from_config(&DashboardConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WardMatch {
    Known(String),
    /// No table entry; the neighbourhood itself becomes the ward label.
    Synthetic(String),
    Missing,
}

impl WardMatch {
    pub fn label(&self) -> String {
        match self {
            WardMatch::Known(ward) => ward.clone(),
            WardMatch::Synthetic(neighborhood) => format!("Ward {neighborhood}"),
            WardMatch::Missing => UNKNOWN_WARD.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WardTable {
    rules: Vec<(String, String)>,
}

impl WardTable {
    pub fn new(rules: &[WardRule]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|r| (r.neighborhood.to_lowercase(), r.ward.clone()))
                .collect(),
        }
    }

    pub fn resolve(&self, neighborhood: &str) -> WardMatch {
        let trimmed = neighborhood.trim();
        if trimmed.is_empty() {
            return WardMatch::Missing;
        }
        let lowered = trimmed.to_lowercase();
        self.rules
            .iter()
            .find(|(key, _)| lowered.contains(key.as_str()))
            .map(|(_, ward)| WardMatch::Known(ward.clone()))
            .unwrap_or_else(|| WardMatch::Synthetic(trimmed.to_string()))
    }
}

impl Default for WardTable {
    fn default() -> Self {
        Self::new(&DashboardConfig::default().wards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_tag_in_parentheses_wins() {
        let directory = MemberDirectory::default();
        assert_eq!(
            directory.resolve("/data/Walkability Survey (Disha).csv"),
            MemberMatch::Known("Disha".to_string())
        );
        assert_eq!(
            directory.resolve("/data/aarna_niranjan_shared (Crisann).csv"),
            MemberMatch::Known("Crisann".to_string())
        );
    }

    #[test]
    fn member_falls_back_to_case_insensitive_substring() {
        let directory = MemberDirectory::default();
        assert_eq!(
            directory.resolve("/data/walkability_survey_niranjan.csv").name(),
            "Niranjan"
        );
        let unknown = directory.resolve("/data/survey.csv");
        assert_eq!(unknown, MemberMatch::Unknown);
        assert_eq!(unknown.name(), "Unknown");
        assert!(!unknown.is_known());
    }

    #[test]
    fn ward_lookup_matches_neighbourhood_substrings() {
        let wards = WardTable::default();
        assert_eq!(wards.resolve("Goregaon West").label(), "Ward 45");
        assert_eq!(wards.resolve("DADAR EAST").label(), "Ward 227");
        assert_eq!(
            wards.resolve(" Powai "),
            WardMatch::Synthetic("Powai".to_string())
        );
        assert_eq!(wards.resolve("Powai").label(), "Ward Powai");
        assert_eq!(wards.resolve("").label(), "Unknown Ward");
    }

    #[test]
    fn new_wards_come_from_the_table() {
        let wards = WardTable::new(&[WardRule {
            neighborhood: "Powai".to_string(),
            ward: "Ward 122".to_string(),
        }]);
        assert_eq!(wards.resolve("powai lake"), WardMatch::Known("Ward 122".to_string()));
    }
}
