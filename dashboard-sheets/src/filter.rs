//! Ad hoc queries over the patient sheet, backed by snapshot lookup tables.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use dashboard_core::MetricsSnapshot;
use serde::{Deserialize, Serialize};

use crate::fields::CanonicalField;
use crate::resolver::FieldResolver;
use crate::table::Row;

/// Sentinel the UI uses for an unconstrained dropdown.
pub const ALL: &str = "all";

/// Filter values chosen in the patient directory. `None`, `""` and `"all"`
/// leave a dimension unconstrained. Comparisons are case-insensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterCriteria {
    pub area: Option<String>,
    pub status: Option<String>,
    /// Substring of the therapist cell.
    pub therapist: Option<String>,
    /// Substring of insurer and insurance status joined by a space.
    pub insurance: Option<String>,
    pub lead_source: Option<String>,
    pub booking_source: Option<String>,
    pub authorization: Option<String>,
    pub patient_id: Option<String>,
    /// Lowercased provider key from the appointment log.
    pub provider: Option<String>,
    pub appointment_type: Option<String>,
    /// Earliest first-appointment day, inclusive.
    pub date_start: Option<NaiveDate>,
    /// Latest first-appointment day, inclusive through end of day.
    pub date_end: Option<NaiveDate>,
    /// Free text matched against every cell of the row.
    pub search: Option<String>,
}

impl FilterCriteria {
    /// True when no dimension is constrained.
    pub fn is_unconstrained(&self) -> bool {
        self.prepared().is_unconstrained()
    }

    fn prepared(&self) -> Prepared {
        Prepared {
            area: active(&self.area),
            status: active(&self.status),
            therapist: active(&self.therapist),
            insurance: active(&self.insurance),
            lead_source: active(&self.lead_source),
            booking_source: active(&self.booking_source),
            authorization: active(&self.authorization),
            patient_id: active(&self.patient_id),
            provider: active(&self.provider),
            appointment_type: active(&self.appointment_type),
            date_start: self.date_start,
            date_end: self.date_end,
            search: self
                .search
                .as_deref()
                .map(|text| text.trim().to_lowercase())
                .filter(|text| !text.is_empty()),
        }
    }
}

fn active(value: &Option<String>) -> Option<String> {
    let value = value.as_deref()?.trim().to_lowercase();
    (!value.is_empty() && value != ALL).then_some(value)
}

/// Criteria normalized once per query.
struct Prepared {
    area: Option<String>,
    status: Option<String>,
    therapist: Option<String>,
    insurance: Option<String>,
    lead_source: Option<String>,
    booking_source: Option<String>,
    authorization: Option<String>,
    patient_id: Option<String>,
    provider: Option<String>,
    appointment_type: Option<String>,
    date_start: Option<NaiveDate>,
    date_end: Option<NaiveDate>,
    search: Option<String>,
}

impl Prepared {
    fn is_unconstrained(&self) -> bool {
        [
            &self.area,
            &self.status,
            &self.therapist,
            &self.insurance,
            &self.lead_source,
            &self.booking_source,
            &self.authorization,
            &self.patient_id,
            &self.provider,
            &self.appointment_type,
            &self.search,
        ]
        .iter()
        .all(|value| value.is_none())
            && self.date_start.is_none()
            && self.date_end.is_none()
    }
}

/// Rows satisfying every active criterion, in their original order.
///
/// Each row is judged on its own cells plus the snapshot's per-patient
/// provider, appointment type and first appointment tables.
pub fn filter_patients<'r>(
    resolver: &mut FieldResolver,
    rows: &'r [Row],
    criteria: &FilterCriteria,
    snapshot: &MetricsSnapshot,
) -> Vec<&'r Row> {
    let prepared = criteria.prepared();
    if prepared.is_unconstrained() {
        return rows.iter().collect();
    }

    rows.iter()
        .filter(|row| row_matches(resolver, row, &prepared, snapshot))
        .collect()
}

fn row_matches(
    resolver: &mut FieldResolver,
    row: &Row,
    criteria: &Prepared,
    snapshot: &MetricsSnapshot,
) -> bool {
    let mut lower = |field: CanonicalField| -> String {
        resolver
            .resolve(row, field)
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    };

    let equals = |wanted: &Option<String>, actual: &str| match wanted {
        Some(wanted) => wanted == actual,
        None => true,
    };
    let contains = |wanted: &Option<String>, actual: &str| match wanted {
        Some(wanted) => actual.contains(wanted.as_str()),
        None => true,
    };

    if !equals(&criteria.area, &lower(CanonicalField::Area))
        || !equals(&criteria.status, &lower(CanonicalField::Status))
        || !contains(&criteria.therapist, &lower(CanonicalField::Therapist))
    {
        return false;
    }

    if criteria.insurance.is_some() {
        let payer = lower(CanonicalField::Insurance1);
        let payer_status = lower(CanonicalField::InsuranceStatus1);
        let insurance = format!("{payer} {payer_status}");
        if !contains(&criteria.insurance, &insurance) {
            return false;
        }
    }

    if !equals(&criteria.lead_source, &lower(CanonicalField::LeadSource))
        || !equals(&criteria.booking_source, &lower(CanonicalField::BookingSource))
        || !equals(&criteria.authorization, &lower(CanonicalField::Authorization))
    {
        return false;
    }

    let id = lower(CanonicalField::PatientId);
    if !equals(&criteria.patient_id, &id) {
        return false;
    }

    if !in_lookup(&criteria.provider, snapshot.providers_for(&id))
        || !in_lookup(&criteria.appointment_type, snapshot.appointment_types_for(&id))
    {
        return false;
    }

    if criteria.date_start.is_some() || criteria.date_end.is_some() {
        let Some(first) = snapshot.first_appointment(&id) else {
            return false;
        };
        if let Some(start) = criteria.date_start {
            if first < start.and_time(NaiveTime::MIN) {
                return false;
            }
        }
        if let Some(end) = criteria.date_end {
            if first.date() > end {
                return false;
            }
        }
    }

    if let Some(needle) = &criteria.search {
        if !row_text(row).contains(needle.as_str()) {
            return false;
        }
    }

    true
}

fn in_lookup(wanted: &Option<String>, values: Option<&BTreeSet<String>>) -> bool {
    match wanted {
        Some(wanted) => values.is_some_and(|values| values.contains(wanted)),
        None => true,
    }
}

/// Every present cell of the row, lowercased and space joined.
fn row_text(row: &Row) -> String {
    row.values()
        .map(|value| value.as_deref().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Dropdown entry whose value is what [`FilterCriteria`] expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
}

/// Distinct values offered by each filter dropdown, sorted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterOptions {
    pub areas: Vec<String>,
    pub statuses: Vec<String>,
    pub therapists: Vec<String>,
    pub insurance: Vec<String>,
    pub lead_sources: Vec<String>,
    pub booking_sources: Vec<String>,
    pub authorizations: Vec<String>,
    pub patient_ids: Vec<String>,
    pub providers: Vec<FilterOption>,
    pub appointment_types: Vec<FilterOption>,
}

/// Builds the dropdown contents for the patient directory.
pub fn filter_options(
    resolver: &mut FieldResolver,
    rows: &[Row],
    snapshot: &MetricsSnapshot,
) -> FilterOptions {
    let distinct = |field: CanonicalField, resolver: &mut FieldResolver| -> Vec<String> {
        rows.iter()
            .filter_map(|row| resolver.resolve_trimmed(row, field))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    };

    let areas = distinct(CanonicalField::Area, resolver);
    let statuses = distinct(CanonicalField::Status, resolver);
    let lead_sources = distinct(CanonicalField::LeadSource, resolver);
    let booking_sources = distinct(CanonicalField::BookingSource, resolver);
    let authorizations = distinct(CanonicalField::Authorization, resolver);
    let patient_ids = distinct(CanonicalField::PatientId, resolver);

    let therapists: BTreeSet<String> = rows
        .iter()
        .filter_map(|row| resolver.resolve(row, CanonicalField::Therapist))
        .flat_map(|names| names.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    let insurance: BTreeSet<String> = rows
        .iter()
        .map(|row| {
            let status = resolver
                .resolve(row, CanonicalField::InsuranceStatus1)
                .unwrap_or_default();
            let payer = resolver
                .resolve(row, CanonicalField::Insurance1)
                .unwrap_or_default();
            format!("{status} {payer}").trim().to_string()
        })
        .filter(|value| !value.is_empty())
        .collect();

    let providers = snapshot
        .provider_labels
        .iter()
        .map(|(value, label)| FilterOption {
            value: value.clone(),
            label: label.clone(),
        })
        .collect();

    let appointment_types = snapshot
        .patient_appointment_types
        .values()
        .flatten()
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|value| FilterOption {
            value: value.clone(),
            label: title_case(value),
        })
        .collect();

    FilterOptions {
        areas,
        statuses,
        therapists: therapists.into_iter().collect(),
        insurance: insurance.into_iter().collect(),
        lead_sources,
        booking_sources,
        authorizations,
        patient_ids,
        providers,
        appointment_types,
    }
}

/// Uppercases the first letter of every word: `home visit` -> `Home Visit`.
fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if at_word_start && ch.is_alphanumeric() {
            result.extend(ch.to_uppercase());
        } else {
            result.push(ch);
        }
        at_word_start = !(ch.is_alphanumeric() || ch == '_');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::row;
    use chrono::NaiveDateTime;

    fn patients() -> Vec<Row> {
        vec![
            row([("Patient ID", "P1"), ("Area", "West"), ("Status", "Active"), ("PT", "Ana, Ben")]),
            row([("Patient ID", "P2"), ("Area", "West"), ("Status", "Lost"), ("PT", "Ben")]),
            row([("Patient ID", "P3"), ("Area", "East"), ("Status", "Active"), ("PT", "Cy")]),
        ]
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .expect("valid timestamp")
    }

    fn snapshot() -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::empty(at(2024, 5, 1, 9));
        snapshot
            .patient_providers
            .insert("p1".to_string(), BTreeSet::from(["dr. kim".to_string()]));
        snapshot
            .patient_appointment_types
            .insert("p3".to_string(), BTreeSet::from(["home visit".to_string()]));
        snapshot
            .first_appointment_by_patient
            .insert("p1".to_string(), at(2024, 4, 10, 23));
        snapshot
            .first_appointment_by_patient
            .insert("p3".to_string(), at(2024, 4, 20, 8));
        snapshot
            .provider_labels
            .insert("dr. kim".to_string(), "Dr. Kim".to_string());
        snapshot
    }

    fn ids(rows: Vec<&Row>) -> Vec<String> {
        rows.iter()
            .filter_map(|row| row.get("Patient ID").cloned().flatten())
            .collect()
    }

    fn query(criteria: FilterCriteria) -> Vec<String> {
        let rows = patients();
        let matched = filter_patients(&mut FieldResolver::new(), &rows, &criteria, &snapshot());
        ids(matched)
    }

    #[test]
    fn empty_criteria_returns_every_row() {
        assert_eq!(query(FilterCriteria::default()), vec!["P1", "P2", "P3"]);
        let sentinel = FilterCriteria {
            area: Some("all".to_string()),
            search: Some("   ".to_string()),
            ..FilterCriteria::default()
        };
        assert!(sentinel.is_unconstrained());
        assert_eq!(query(sentinel), vec!["P1", "P2", "P3"]);
    }

    #[test]
    fn criteria_are_and_combined() {
        let criteria = FilterCriteria {
            area: Some("west".to_string()),
            status: Some("active".to_string()),
            ..FilterCriteria::default()
        };
        assert_eq!(query(criteria), vec!["P1"]);
    }

    #[test]
    fn therapist_matches_by_substring() {
        let criteria = FilterCriteria {
            therapist: Some("ben".to_string()),
            ..FilterCriteria::default()
        };
        assert_eq!(query(criteria), vec!["P1", "P2"]);
    }

    #[test]
    fn provider_and_type_use_snapshot_lookups() {
        let by_provider = FilterCriteria {
            provider: Some("dr. kim".to_string()),
            ..FilterCriteria::default()
        };
        assert_eq!(query(by_provider), vec!["P1"]);

        let by_type = FilterCriteria {
            appointment_type: Some("Home Visit".to_string()),
            ..FilterCriteria::default()
        };
        assert_eq!(query(by_type), vec!["P3"]);
    }

    #[test]
    fn date_range_covers_whole_end_day() {
        let criteria = FilterCriteria {
            date_start: NaiveDate::from_ymd_opt(2024, 4, 1),
            date_end: NaiveDate::from_ymd_opt(2024, 4, 10),
            ..FilterCriteria::default()
        };
        assert_eq!(query(criteria), vec!["P1"]);

        let open_ended = FilterCriteria {
            date_start: NaiveDate::from_ymd_opt(2024, 4, 11),
            ..FilterCriteria::default()
        };
        assert_eq!(query(open_ended), vec!["P3"]);
    }

    #[test]
    fn search_scans_every_cell() {
        let criteria = FilterCriteria {
            search: Some(" CY ".to_string()),
            ..FilterCriteria::default()
        };
        assert_eq!(query(criteria), vec!["P3"]);
    }

    #[test]
    fn options_are_sorted_and_distinct() {
        let rows = patients();
        let options = filter_options(&mut FieldResolver::new(), &rows, &snapshot());
        assert_eq!(options.areas, vec!["East", "West"]);
        assert_eq!(options.therapists, vec!["Ana", "Ben", "Cy"]);
        assert_eq!(options.patient_ids, vec!["P1", "P2", "P3"]);
        assert_eq!(
            options.appointment_types,
            vec![FilterOption {
                value: "home visit".to_string(),
                label: "Home Visit".to_string(),
            }]
        );
        assert_eq!(options.providers[0].label, "Dr. Kim");
    }
}
