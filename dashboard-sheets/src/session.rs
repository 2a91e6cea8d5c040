//! Load lifecycle: one resolver cache and one complete snapshot at a time.

use chrono::NaiveDateTime;
use dashboard_core::{DashboardConfig, MetricsSnapshot};
use tracing::{debug, info};

use crate::aggregate::compute_metrics;
use crate::filter::{filter_options, filter_patients, FilterCriteria, FilterOptions};
use crate::resolver::FieldResolver;
use crate::table::{Dataset, Row};

/// Holds the current tables, their snapshot and the header cache used to read them.
///
/// A reload clears the cache, computes the new snapshot in full and only then
/// swaps it in, so readers see either the previous snapshot or the new one.
#[derive(Debug, Default)]
pub struct DashboardSession {
    resolver: FieldResolver,
    config: DashboardConfig,
    dataset: Dataset,
    snapshot: Option<MetricsSnapshot>,
}

impl DashboardSession {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Replaces the tables and recomputes every metric against `now`.
    pub fn reload(&mut self, dataset: Dataset, now: NaiveDateTime) -> &MetricsSnapshot {
        debug!(
            cached = self.resolver.cached_bindings(),
            "clearing header cache before reload"
        );
        self.resolver.clear();

        let snapshot = compute_metrics(&mut self.resolver, &dataset, now, &self.config);
        info!(
            patients = dataset.patients.len(),
            numbers = dataset.numbers.len(),
            appointments = dataset.appointments.len(),
            recommendations = snapshot.recommendations.len(),
            "dashboard metrics recomputed"
        );

        self.dataset = dataset;
        self.snapshot.insert(snapshot)
    }

    /// Last complete snapshot, if a load has finished.
    pub fn snapshot(&self) -> Option<&MetricsSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Patient rows matching `criteria`; empty before the first load.
    pub fn filter(&mut self, criteria: &FilterCriteria) -> Vec<&Row> {
        match &self.snapshot {
            Some(snapshot) => filter_patients(
                &mut self.resolver,
                &self.dataset.patients.rows,
                criteria,
                snapshot,
            ),
            None => Vec::new(),
        }
    }

    /// Dropdown contents for the current patient sheet.
    pub fn filter_options(&mut self) -> FilterOptions {
        match &self.snapshot {
            Some(snapshot) => {
                filter_options(&mut self.resolver, &self.dataset.patients.rows, snapshot)
            }
            None => FilterOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{row, Table};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|date| date.and_hms_opt(9, 0, 0))
            .expect("valid timestamp")
    }

    fn dataset(area_header: &str) -> Dataset {
        Dataset {
            patients: Table::from_rows(vec![
                row([("Patient ID", "p1"), (area_header, "West")]),
                row([("Patient ID", "p2"), (area_header, "East")]),
            ]),
            ..Dataset::default()
        }
    }

    #[test]
    fn no_snapshot_before_first_load() {
        let mut session = DashboardSession::default();
        assert!(session.snapshot().is_none());
        assert!(session.filter(&FilterCriteria::default()).is_empty());
        assert_eq!(session.filter_options(), FilterOptions::default());
    }

    #[test]
    fn reload_with_renamed_columns_uses_fresh_bindings() {
        let mut session = DashboardSession::default();
        session.reload(dataset("Area"), now());
        assert_eq!(session.snapshot().map(|s| s.totals.areas), Some(2));

        session.reload(dataset("Territory"), now());
        let criteria = FilterCriteria {
            area: Some("east".to_string()),
            ..FilterCriteria::default()
        };
        let matched = session.filter(&criteria);
        assert_eq!(matched.len(), 1);
        assert_eq!(
            session.filter_options().areas,
            vec!["East".to_string(), "West".to_string()]
        );
    }

    #[test]
    fn recomputing_identical_input_is_idempotent() {
        let mut session = DashboardSession::default();
        let first = session.reload(dataset("Zone"), now()).clone();
        let second = session.reload(dataset("Zone"), now()).clone();
        assert_eq!(first, second);
    }
}
