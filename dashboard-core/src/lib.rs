//! Data model of the operations dashboard: the metrics snapshot, its
//! configuration and the display helpers shared by every consumer.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

mod format;

pub use format::{build_trend, format_count, format_percent, TrendFormat};

/// Tuning knobs for windows, list sizes and recommendation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Length in days of the "last" and "previous" comparison windows.
    pub window_days: u32,
    /// Number of most recent weekly buckets kept in the appointment trend.
    pub trend_weeks: usize,
    /// Number of providers kept on the leaderboard.
    pub leaderboard_size: usize,
    /// Number of payers kept in the insurance distribution.
    pub insurance_top: usize,
    /// Number of upcoming appointments listed.
    pub upcoming_limit: usize,
    /// Number of territories on the pending PT watchlist.
    pub watchlist_size: usize,
    pub thresholds: AdvisorThresholds,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            trend_weeks: 12,
            leaderboard_size: 5,
            insurance_top: 5,
            upcoming_limit: 6,
            watchlist_size: 3,
            thresholds: AdvisorThresholds::default(),
        }
    }
}

/// Thresholds consulted by the recommendation rules. Every comparison is strict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvisorThresholds {
    /// Pending PT to total leads ratio above which intake is flagged.
    pub pending_ratio: f64,
    /// Attendance below this rate triggers the reminder recommendation.
    pub attendance_floor: f64,
    /// Attendance goal quoted in the reminder recommendation.
    pub attendance_goal: f64,
    /// Cancellation rate above which causes should be reviewed.
    pub cancellation_rate: f64,
    /// Multiple of the runner-up's volume at which the top provider is overloaded.
    pub provider_dominance: f64,
}

impl Default for AdvisorThresholds {
    fn default() -> Self {
        Self {
            pending_ratio: 0.25,
            attendance_floor: 0.87,
            attendance_goal: 0.9,
            cancellation_rate: 0.12,
            provider_dominance: 1.6,
        }
    }
}

/// Display direction of a trend chip or card tone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Positive,
    Negative,
    Neutral,
}

/// Signed delta ready for display, e.g. `+12` or `-4%`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trend {
    pub direction: TrendDirection,
    pub label: String,
    pub value: String,
}

/// Headline card at the top of the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryCard {
    pub title: String,
    pub value: String,
    pub subtitle: String,
    pub trend: Option<Trend>,
}

/// Compact card of the operational totals panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationalCard {
    pub label: String,
    pub value: String,
    pub detail: String,
    pub tone: TrendDirection,
}

/// One bar of a histogram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistributionEntry {
    pub name: String,
    pub count: usize,
}

/// Appointments booked and attended in one ISO week (Monday start).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyBucket {
    pub week: NaiveDate,
    pub count: usize,
    pub attended: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderLeader {
    /// Label as first seen in the appointment log.
    pub provider: String,
    /// Lowercased grouping key.
    pub provider_key: String,
    pub count: usize,
}

/// Lead counts reported for a single territory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumbersSummaryRow {
    pub area: String,
    pub total_leads: f64,
    pub pending_pt: f64,
    pub insurance_issues: f64,
}

/// Whether the visit note has been written.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteCompletion {
    Completed,
    Pending,
    /// The note cell was blank.
    Unknown,
}

/// An appointment row that carried both a patient id and a valid date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRecord {
    pub patient_id: String,
    pub date: NaiveDateTime,
    /// Lowercased status text.
    pub status: String,
    pub appointment_type: Option<String>,
    /// Trimmed provider name, empty when unknown.
    pub provider: String,
    pub note: NoteCompletion,
}

/// Flat record of every aggregate the cards and rules draw from.
///
/// The `_30` fields cover the trailing comparison windows (`window_days`,
/// 30 by default).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Totals {
    pub patients: usize,
    pub therapists: usize,
    pub areas: usize,
    pub total_appointments: usize,
    pub total_attended: usize,
    pub attendance_rate: f64,
    pub appointments_last_30: usize,
    pub appointments_prev_30: usize,
    pub attended_last_30: usize,
    pub attendance_last_30: f64,
    pub attendance_prev_30: f64,
    pub unique_patients_last_30: usize,
    pub appointments_per_patient: f64,
    pub new_patients_last_30: usize,
    pub new_patients_prev_30: usize,
    pub total_leads: f64,
    pub total_pending_pt: f64,
    pub total_insurance_issues: f64,
    pub cancel_count: usize,
    pub cancellation_rate: f64,
    pub docs_pending: usize,
    pub provider_count: usize,
}

impl Totals {
    /// Attendance over the last window, or overall attendance when the window is empty.
    pub fn recent_attendance(&self) -> f64 {
        if self.attendance_last_30 > 0.0 {
            self.attendance_last_30
        } else {
            self.attendance_rate
        }
    }

    /// Share of leads still waiting for a therapist.
    pub fn pending_ratio(&self) -> f64 {
        if self.total_leads > 0.0 {
            self.total_pending_pt / self.total_leads
        } else {
            0.0
        }
    }
}

/// Complete result of one aggregation pass.
///
/// Lookup tables are keyed by lowercased patient id and hold lowercased values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub generated_at: NaiveDateTime,
    pub summary_cards: Vec<SummaryCard>,
    pub operational_cards: Vec<OperationalCard>,
    pub area_distribution: Vec<DistributionEntry>,
    pub insurance_distribution: Vec<DistributionEntry>,
    pub appointment_trend: Vec<WeeklyBucket>,
    pub numbers_summary: Vec<NumbersSummaryRow>,
    pub pending_watchlist: Vec<NumbersSummaryRow>,
    pub upcoming_appointments: Vec<AppointmentRecord>,
    pub provider_leaders: Vec<ProviderLeader>,
    pub provider_labels: BTreeMap<String, String>,
    pub patient_providers: BTreeMap<String, BTreeSet<String>>,
    pub patient_appointment_types: BTreeMap<String, BTreeSet<String>>,
    pub first_appointment_by_patient: BTreeMap<String, NaiveDateTime>,
    pub recommendations: Vec<String>,
    pub analysis_highlights: Vec<String>,
    pub totals: Totals,
}

impl MetricsSnapshot {
    /// Snapshot with no data, stamped at `generated_at`.
    pub fn empty(generated_at: NaiveDateTime) -> Self {
        Self {
            generated_at,
            summary_cards: Vec::new(),
            operational_cards: Vec::new(),
            area_distribution: Vec::new(),
            insurance_distribution: Vec::new(),
            appointment_trend: Vec::new(),
            numbers_summary: Vec::new(),
            pending_watchlist: Vec::new(),
            upcoming_appointments: Vec::new(),
            provider_leaders: Vec::new(),
            provider_labels: BTreeMap::new(),
            patient_providers: BTreeMap::new(),
            patient_appointment_types: BTreeMap::new(),
            first_appointment_by_patient: BTreeMap::new(),
            recommendations: Vec::new(),
            analysis_highlights: Vec::new(),
            totals: Totals::default(),
        }
    }

    /// Providers seen for a patient, by lowercased patient id.
    pub fn providers_for(&self, patient_key: &str) -> Option<&BTreeSet<String>> {
        self.patient_providers.get(patient_key)
    }

    /// Appointment types seen for a patient, by lowercased patient id.
    pub fn appointment_types_for(&self, patient_key: &str) -> Option<&BTreeSet<String>> {
        self.patient_appointment_types.get(patient_key)
    }

    pub fn first_appointment(&self, patient_key: &str) -> Option<NaiveDateTime> {
        self.first_appointment_by_patient.get(patient_key).copied()
    }
}

/// Errors raised at the input boundary; aggregation itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Input is missing a required table or field")]
    MissingData,
    #[error("Unable to read input: {0}")]
    Parse(String),
    #[error("Other error: {0}")]
    Other(String),
}
