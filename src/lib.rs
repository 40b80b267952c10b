//! Walkability survey ingestion
//!
//! Loads neighbourhood walkability survey CSVs collected by several field
//! researchers, normalizes them into one [`SurveyResponse`] shape and
//! aggregates them into chart series.
//!
//! ## Pipeline
//!
//! ```text
//! fetch -> loader (retries, fallbacks) -> table (parse)
//!       -> schema (validate, profile) -> normalize (standard / long-form)
//!       -> aggregate (chart series) -> report
//! ```
//!
//! Sources are read through the [`fetch::Fetch`] trait so the same pipeline
//! runs against a static file root, an HTTP host or a scripted fetcher in
//! tests.

pub mod advisor;
pub mod aggregate;
pub mod config;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod lookup;
pub mod models;
pub mod normalize;
pub mod report;
pub mod schema;
pub mod survey;
pub mod table;

pub use config::DashboardConfig;
pub use error::{FetchError, LoadError, ParseError};
pub use models::{ChartKind, ChartPoint, SurveyResponse};
pub use survey::{LoadCache, LoadedSurvey, SurveyLoader};
