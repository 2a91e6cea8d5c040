//! Spreadsheet rows to [`MetricsSnapshot`] converter.
//!
//! Sheets arrive as header -> cell maps whose headers drift between edits. Every
//! lookup goes through a [`FieldResolver`] that maps canonical fields onto the
//! headers actually present; aggregation and filtering work on top of it.

pub mod advisor;
pub mod aggregate;
pub mod fields;
pub mod filter;
pub mod normalize;
pub mod resolver;
pub mod session;
pub mod table;

use chrono::NaiveDateTime;
use dashboard_core::{DashboardConfig, DashboardError, MetricsSnapshot};
use serde_json::Value;

pub use aggregate::compute_metrics;
pub use fields::CanonicalField;
pub use filter::{filter_options, filter_patients, FilterCriteria, FilterOption, FilterOptions};
pub use normalize::{parse_date, parse_number, to_number, Coerced};
pub use resolver::FieldResolver;
pub use session::DashboardSession;
pub use table::{dataset_from_value, table_from_value, Dataset, Row, Table};

/// Summarize a dataset given as a JSON string.
pub fn summarize_dataset_str(
    dataset_json: &str,
    now: NaiveDateTime,
    config: &DashboardConfig,
) -> Result<MetricsSnapshot, DashboardError> {
    let value: Value =
        serde_json::from_str(dataset_json).map_err(|err| DashboardError::Parse(err.to_string()))?;
    summarize_dataset_value(&value, now, config)
}

/// Summarize a dataset given as a `serde_json::Value`.
pub fn summarize_dataset_value(
    dataset: &Value,
    now: NaiveDateTime,
    config: &DashboardConfig,
) -> Result<MetricsSnapshot, DashboardError> {
    let dataset = dataset_from_value(dataset)?;
    let mut resolver = FieldResolver::new();
    Ok(compute_metrics(&mut resolver, &dataset, now, config))
}

/// Reads the reference instant for window computations.
///
/// Accepts the same shapes as appointment dates, e.g. `2024-05-01T09:00:00`
/// or `2024-05-01`.
pub fn parse_now(raw: &str) -> Result<NaiveDateTime, DashboardError> {
    parse_date(Some(raw))
        .parsed()
        .ok_or_else(|| DashboardError::Parse(format!("Not a valid timestamp: {raw}")))
}
