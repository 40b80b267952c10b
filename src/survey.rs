//! End-to-end survey loading: fetch, validate, profile, normalize.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::{DashboardConfig, LoaderSettings};
use crate::fetch::Fetch;
use crate::loader::{fallback_paths, load_csv, LoadMeta, LoadOptions};
use crate::lookup::{MemberDirectory, MemberMatch, WardTable};
use crate::models::SurveyResponse;
use crate::normalize::{Normalizer, SourceFormat};
use crate::schema;

/// Everything one survey file produced. `responses` is empty whenever the
/// file could not be used; `errors` says why.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSurvey {
    pub path: String,
    pub member: MemberMatch,
    pub format: Option<SourceFormat>,
    pub responses: Vec<SurveyResponse>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub meta: LoadMeta,
}

impl LoadedSurvey {
    fn failed(path: &str, member: MemberMatch, errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            path: path.to_string(),
            member,
            format: None,
            responses: Vec::new(),
            errors,
            warnings,
            meta: LoadMeta::default(),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.responses.is_empty()
    }
}

/// Caller-owned memo of loaded surveys keyed by path. Nothing is evicted
/// unless the caller asks.
#[derive(Debug, Clone, Default)]
pub struct LoadCache {
    entries: HashMap<String, Arc<LoadedSurvey>>,
}

impl LoadCache {
    pub fn get(&self, path: &str) -> Option<Arc<LoadedSurvey>> {
        self.entries.get(path).cloned()
    }

    pub fn insert(&mut self, survey: Arc<LoadedSurvey>) {
        self.entries.insert(survey.path.clone(), survey);
    }

    pub fn invalidate(&mut self, path: &str) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
pub struct SurveyLoader {
    fetcher: Arc<dyn Fetch>,
    directory: MemberDirectory,
    wards: WardTable,
    settings: LoaderSettings,
}

impl SurveyLoader {
    pub fn new(fetcher: Arc<dyn Fetch>, config: &DashboardConfig) -> Self {
        Self {
            fetcher,
            directory: MemberDirectory::from_config(config),
            wards: WardTable::new(&config.wards),
            settings: config.loader.clone(),
        }
    }

    fn options_for(&self, path: &str) -> LoadOptions {
        LoadOptions {
            max_retries: self.settings.max_retries,
            timeout: self.settings.timeout(),
            fallback_paths: fallback_paths(path),
            backoff_base: self.settings.backoff_base(),
            skip_empty_lines: true,
        }
    }

    pub async fn load_survey(&self, path: &str) -> LoadedSurvey {
        info!(path, "Loading survey CSV");
        let member = self.directory.resolve(path);
        let loaded = load_csv(self.fetcher.as_ref(), path, &self.options_for(path)).await;
        for e in &loaded.errors {
            error!(path, "CSV loading error: {e}");
        }
        for w in &loaded.warnings {
            warn!(path, "CSV loading warning: {w}");
        }
        let mut errors = loaded.errors;
        let mut warnings = loaded.warnings;

        if loaded.table.is_empty() {
            error!(path, "No data loaded");
            return LoadedSurvey::failed(path, member, errors, warnings);
        }

        let structure = schema::validate_structure(&loaded.table, &[], Some(member.name()));
        let valid = structure.is_valid();
        warnings.extend(structure.warnings);
        if !valid {
            error!(path, errors = ?structure.errors, "CSV validation failed");
            errors.extend(structure.errors);
            return LoadedSurvey::failed(path, member, errors, warnings);
        }

        let roles = schema::suggest_field_roles(&schema::detect(&loaded.table));
        debug!(path, ?roles, "Detected schema");

        let normalizer = Normalizer::new(&self.directory, &self.wards, Utc::now());
        let normalized = normalizer.normalize(&loaded.table, path);
        warnings.extend(normalized.warnings);

        info!(
            path,
            member = normalized.member.name(),
            format = %normalized.format,
            responses = normalized.responses.len(),
            "Loaded survey responses"
        );
        LoadedSurvey {
            path: path.to_string(),
            member: normalized.member,
            format: Some(normalized.format),
            responses: normalized.responses,
            errors,
            warnings,
            meta: loaded.meta,
        }
    }

    /// Loads through `cache`. Only surveys that produced data are cached, so
    /// a failed file is retried on the next call.
    pub async fn load_survey_cached(&self, cache: &mut LoadCache, path: &str) -> Arc<LoadedSurvey> {
        if let Some(hit) = cache.get(path) {
            debug!(path, "Survey cache hit");
            return hit;
        }
        let survey = Arc::new(self.load_survey(path).await);
        if survey.has_data() {
            cache.insert(survey.clone());
        }
        survey
    }

    /// Loads every path concurrently. Results come back in `paths` order.
    pub async fn load_members(&self, paths: &[String]) -> Vec<LoadedSurvey> {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| {
                let loader = self.clone();
                let path = path.clone();
                tokio::spawn(async move { loader.load_survey(&path).await })
            })
            .collect();

        let mut surveys = Vec::with_capacity(paths.len());
        for (path, handle) in paths.iter().zip(handles) {
            match handle.await {
                Ok(survey) => surveys.push(survey),
                Err(e) => {
                    error!(path = path.as_str(), "Survey load task failed: {e}");
                    surveys.push(LoadedSurvey::failed(
                        path,
                        self.directory.resolve(path),
                        vec![format!("{path}: load task failed: {e}")],
                        Vec::new(),
                    ));
                }
            }
        }
        surveys
    }
}

/// All responses across surveys, for cross-member views.
pub fn combined_responses(surveys: &[LoadedSurvey]) -> Vec<SurveyResponse> {
    surveys
        .iter()
        .flat_map(|s| s.responses.iter().cloned())
        .collect()
}
