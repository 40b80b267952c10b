//! Robust CSV loading: per-attempt timeouts, exponential backoff, and a
//! chain of fallback paths. Loading never fails outright; callers get an empty
//! table plus the accumulated error list instead.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::{FetchError, LoadError};
use crate::fetch::{Fetch, Fetched};
use crate::table::{parse_csv, Parsed, Table};

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    pub max_retries: u32,
    pub timeout: Duration,
    /// Tried in order after the primary path has exhausted its retries.
    pub fallback_paths: Vec<String>,
    /// Wait after failed attempt `n` is `2^n` times this.
    pub backoff_base: Duration,
    pub skip_empty_lines: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(10),
            fallback_paths: Vec::new(),
            backoff_base: Duration::from_secs(1),
            skip_empty_lines: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadMeta {
    pub fields: Vec<String>,
    pub row_count: usize,
    pub file_size: Option<usize>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Path that produced the data, if any did.
    pub source: Option<String>,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadResult {
    pub table: Table,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub meta: LoadMeta,
}

impl LoadResult {
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

pub async fn load_csv<F>(fetcher: &F, path: &str, options: &LoadOptions) -> LoadResult
where
    F: Fetch + ?Sized,
{
    let max_retries = options.max_retries.max(1);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let candidates = std::iter::once(path).chain(options.fallback_paths.iter().map(String::as_str));
    for (path_idx, current) in candidates.enumerate() {
        for attempt in 1..=max_retries {
            info!(path = current, attempt, max_retries, "Attempting to load CSV");
            match try_load(fetcher, current, options).await {
                Ok((fetched, parsed)) => {
                    let used_fallback = path_idx > 0;
                    info!(
                        path = current,
                        rows = parsed.table.len(),
                        columns = parsed.table.headers.len(),
                        used_fallback,
                        "Successfully loaded CSV"
                    );
                    warnings.extend(fetched.warnings);
                    warnings.extend(parsed.issues);
                    if used_fallback {
                        warnings.push(format!("Used fallback path: {current} (original: {path})"));
                    }
                    let meta = LoadMeta {
                        fields: parsed.table.headers.clone(),
                        row_count: parsed.table.len(),
                        file_size: Some(fetched.body.len()),
                        last_modified: fetched.last_modified,
                        source: Some(current.to_string()),
                        used_fallback,
                    };
                    return LoadResult {
                        table: parsed.table,
                        errors,
                        warnings,
                        meta,
                    };
                }
                Err(e) => {
                    let attempt_info = format!("{current} (attempt {attempt}/{max_retries})");
                    warn!("Failed to load CSV: {attempt_info} - {e}");
                    if attempt == max_retries {
                        errors.push(format!("{attempt_info}: {e}"));
                    } else {
                        tokio::time::sleep(backoff(options.backoff_base, attempt)).await;
                    }
                }
            }
        }
    }

    warn!(path, errors = errors.len(), "All CSV load attempts failed");
    LoadResult {
        errors,
        warnings,
        ..LoadResult::default()
    }
}

async fn try_load<F>(
    fetcher: &F,
    path: &str,
    options: &LoadOptions,
) -> Result<(Fetched, Parsed), LoadError>
where
    F: Fetch + ?Sized,
{
    let fetched = tokio::time::timeout(options.timeout, fetcher.fetch(path))
        .await
        .map_err(|_| FetchError::Timeout(options.timeout.as_millis()))??;
    let parsed = parse_csv(&fetched.body, options.skip_empty_lines)?;
    Ok((fetched, parsed))
}

pub fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Alternate spellings of `path` worth trying when the original cannot be
/// fetched: encoded or dropped parentheses, other extensions, and
/// underscore/hyphen forms of spaces.
pub fn fallback_paths(path: &str) -> Vec<String> {
    let mut fallbacks: Vec<String> = Vec::new();

    if path.contains('(') || path.contains(')') {
        fallbacks.push(path.replace('(', "%28").replace(')', "%29"));
        fallbacks.push(path.replace(['(', ')'], ""));
    }

    let base = strip_extension(path);
    fallbacks.push(format!("{base}.CSV"));
    fallbacks.push(format!("{base}.txt"));

    if path.contains(' ') {
        fallbacks.push(path.replace(' ', "_"));
        fallbacks.push(path.replace(' ', "-"));
    }

    let mut unique: Vec<String> = Vec::new();
    for candidate in fallbacks {
        if candidate != path && !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

fn strip_extension(path: &str) -> &str {
    match path.rfind('.') {
        Some(dot) if !path[dot + 1..].contains('/') && dot + 1 < path.len() => &path[..dot],
        _ => path,
    }
}
