//! Aggregation of the three sheets into a [`MetricsSnapshot`].

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use dashboard_core::{
    build_trend, format_count, format_percent, AppointmentRecord, DashboardConfig,
    DistributionEntry, MetricsSnapshot, NoteCompletion, NumbersSummaryRow, OperationalCard,
    ProviderLeader, SummaryCard, Totals, TrendDirection, TrendFormat, WeeklyBucket,
};
use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use crate::advisor::{self, AdvisorContext};
use crate::fields::CanonicalField;
use crate::normalize::{date_or_none, to_number};
use crate::resolver::FieldResolver;
use crate::table::{Dataset, Row};

const UNSPECIFIED: &str = "Unspecified";
const ATTENDED_KEYWORDS: [&str; 3] = ["attended", "completed", "done"];
const NOTE_DONE_VALUES: [&str; 5] = ["true", "yes", "done", "y", "1"];

static CANCELLATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(cancel|no[\s-]?show|resched)").expect("cancellation pattern is valid")
});

/// Whether a lowercased appointment status counts as a completed visit.
pub fn is_attended(status: &str) -> bool {
    ATTENDED_KEYWORDS
        .iter()
        .any(|keyword| status.contains(keyword))
}

/// Whether a lowercased appointment status is a cancellation, no-show or reschedule.
pub fn is_cancellation(status: &str) -> bool {
    !status.is_empty() && CANCELLATION_PATTERN.is_match(status)
}

/// Builds the full snapshot from one load of the three sheets.
///
/// `now` is the clinic's wall clock; every window is measured from it, so the
/// same input and `now` always produce the same snapshot.
pub fn compute_metrics(
    resolver: &mut FieldResolver,
    dataset: &Dataset,
    now: NaiveDateTime,
    config: &DashboardConfig,
) -> MetricsSnapshot {
    let census = PatientCensus::collect(resolver, &dataset.patients.rows, config);
    let records = extract_appointments(resolver, &dataset.appointments.rows);
    let windows = Windows::ending_at(now, config.window_days);
    let visits = VisitStats::collect(&records, &windows, config);
    let numbers_summary = summarize_numbers(resolver, &dataset.numbers.rows);

    let totals = build_totals(&census, &visits, &numbers_summary);

    let mut by_pending = numbers_summary.clone();
    by_pending.sort_by(|a, b| b.pending_pt.total_cmp(&a.pending_pt));
    let mut by_insurance = numbers_summary.clone();
    by_insurance.sort_by(|a, b| b.insurance_issues.total_cmp(&a.insurance_issues));

    let context = AdvisorContext {
        totals: &totals,
        thresholds: &config.thresholds,
        window_days: config.window_days,
        top_pending_area: by_pending.first(),
        top_insurance_area: by_insurance.first(),
        provider_leaders: &visits.leaders,
        area_distribution: &census.area_distribution,
        insurance_distribution: &census.insurance_distribution,
        territory_count: numbers_summary.len(),
    };
    let recommendations = advisor::recommendations(&context);
    let analysis_highlights = advisor::highlights(&context);

    let summary_cards = summary_cards(&totals, config);
    let operational_cards = operational_cards(&totals, &visits.leaders, numbers_summary.len(), config);

    let today = now.date().and_time(NaiveTime::MIN);
    let mut upcoming: Vec<AppointmentRecord> = records
        .iter()
        .filter(|record| record.date >= today)
        .cloned()
        .collect();
    upcoming.sort_by_key(|record| record.date);
    upcoming.truncate(config.upcoming_limit);

    by_pending.truncate(config.watchlist_size);

    MetricsSnapshot {
        generated_at: now,
        summary_cards,
        operational_cards,
        area_distribution: census.area_distribution,
        insurance_distribution: census.insurance_distribution,
        appointment_trend: visits.weekly,
        numbers_summary,
        pending_watchlist: by_pending,
        upcoming_appointments: upcoming,
        provider_leaders: visits.leaders,
        provider_labels: visits.provider_labels,
        patient_providers: visits.patient_providers,
        patient_appointment_types: visits.patient_types,
        first_appointment_by_patient: visits.first_appointments,
        recommendations,
        analysis_highlights,
        totals,
    }
}

/// Comparison windows: last is `[now - days, now]`, previous is
/// `[now - 2*days, now - days)`.
#[derive(Debug, Clone, Copy)]
pub struct Windows {
    pub now: NaiveDateTime,
    pub last_start: NaiveDateTime,
    pub prev_start: NaiveDateTime,
}

impl Windows {
    /// Window starts saturate at the earliest representable instant.
    pub fn ending_at(now: NaiveDateTime, days: u32) -> Self {
        let span = Duration::days(i64::from(days));
        let back = |from: NaiveDateTime| {
            from.checked_sub_signed(span)
                .unwrap_or(NaiveDateTime::MIN)
        };
        let last_start = back(now);
        Self {
            now,
            last_start,
            prev_start: back(last_start),
        }
    }

    pub fn in_last(&self, at: NaiveDateTime) -> bool {
        at >= self.last_start && at <= self.now
    }

    pub fn in_previous(&self, at: NaiveDateTime) -> bool {
        at >= self.prev_start && at < self.last_start
    }
}

struct PatientCensus {
    patients: usize,
    therapists: usize,
    areas: usize,
    area_distribution: Vec<DistributionEntry>,
    insurance_distribution: Vec<DistributionEntry>,
}

impl PatientCensus {
    fn collect(resolver: &mut FieldResolver, rows: &[Row], config: &DashboardConfig) -> Self {
        let mut patient_ids = HashSet::new();
        let mut therapists = HashSet::new();
        let mut areas = HashSet::new();
        let mut area_counts: IndexMap<String, usize> = IndexMap::new();
        let mut insurance_counts: IndexMap<String, usize> = IndexMap::new();

        for row in rows {
            if let Some(id) = resolver.resolve(row, CanonicalField::PatientId) {
                if !id.is_empty() {
                    patient_ids.insert(id.to_string());
                }
            }

            if let Some(names) = resolver.resolve(row, CanonicalField::Therapist) {
                therapists.extend(
                    names
                        .split(',')
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string),
                );
            }

            let area = resolver.resolve_trimmed(row, CanonicalField::Area);
            if let Some(area) = area {
                areas.insert(area.to_string());
            }
            *area_counts
                .entry(area.unwrap_or(UNSPECIFIED).to_string())
                .or_default() += 1;

            for field in [CanonicalField::Insurance1, CanonicalField::Insurance2] {
                let Some(payer) = resolver.resolve(row, field).filter(|v| !v.is_empty()) else {
                    continue;
                };
                let payer = match payer.trim() {
                    "" => UNSPECIFIED,
                    trimmed => trimmed,
                };
                *insurance_counts.entry(payer.to_string()).or_default() += 1;
            }
        }

        let mut insurance_distribution = descending(insurance_counts);
        insurance_distribution.truncate(config.insurance_top);

        Self {
            patients: patient_ids.len(),
            therapists: therapists.len(),
            areas: areas.len(),
            area_distribution: descending(area_counts),
            insurance_distribution,
        }
    }
}

/// Histogram sorted by count, ties kept in first-seen order.
fn descending(counts: IndexMap<String, usize>) -> Vec<DistributionEntry> {
    let mut entries: Vec<DistributionEntry> = counts
        .into_iter()
        .map(|(name, count)| DistributionEntry { name, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries
}

/// Appointment rows that carry a patient id and a valid date.
pub fn extract_appointments(resolver: &mut FieldResolver, rows: &[Row]) -> Vec<AppointmentRecord> {
    let records: Vec<AppointmentRecord> = rows
        .iter()
        .filter_map(|row| appointment_record(resolver, row))
        .collect();

    let excluded = rows.len() - records.len();
    if excluded > 0 {
        debug!(excluded, "appointment rows without patient id or valid date");
    }
    records
}

fn appointment_record(resolver: &mut FieldResolver, row: &Row) -> Option<AppointmentRecord> {
    let patient_id = resolver.resolve_trimmed(row, CanonicalField::PatientId)?;
    let date = date_or_none(resolver.resolve(row, CanonicalField::AppointmentDate))?;

    let status = resolver
        .resolve(row, CanonicalField::AppointmentStatus)
        .unwrap_or_default()
        .to_lowercase();
    let appointment_type = resolver
        .resolve_trimmed(row, CanonicalField::AppointmentType)
        .map(str::to_string);
    let provider = resolver
        .resolve(row, CanonicalField::AppointmentProvider)
        .unwrap_or_default()
        .trim()
        .to_string();

    let note_raw = resolver
        .resolve(row, CanonicalField::AppointmentNoteDone)
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    let note = if note_raw.is_empty() {
        NoteCompletion::Unknown
    } else if NOTE_DONE_VALUES.contains(&note_raw.as_str()) {
        NoteCompletion::Completed
    } else {
        NoteCompletion::Pending
    };

    Some(AppointmentRecord {
        patient_id: patient_id.to_string(),
        date,
        status,
        appointment_type,
        provider,
        note,
    })
}

#[derive(Default)]
struct VisitStats {
    total: usize,
    attended: usize,
    last: usize,
    prev: usize,
    attended_last: usize,
    attended_prev: usize,
    unique_patients_last: usize,
    new_last: usize,
    new_prev: usize,
    cancel_count: usize,
    docs_pending: usize,
    provider_count: usize,
    weekly: Vec<WeeklyBucket>,
    leaders: Vec<ProviderLeader>,
    provider_labels: BTreeMap<String, String>,
    patient_providers: BTreeMap<String, BTreeSet<String>>,
    patient_types: BTreeMap<String, BTreeSet<String>>,
    first_appointments: BTreeMap<String, NaiveDateTime>,
}

impl VisitStats {
    fn collect(records: &[AppointmentRecord], windows: &Windows, config: &DashboardConfig) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };
        let mut patients_last = HashSet::new();
        let mut provider_volume: IndexMap<String, (String, usize)> = IndexMap::new();

        for record in records {
            let attended = is_attended(&record.status);
            if attended {
                stats.attended += 1;
            }

            if windows.in_last(record.date) {
                stats.last += 1;
                patients_last.insert(record.patient_id.to_lowercase());
                if attended {
                    stats.attended_last += 1;
                }
            } else if windows.in_previous(record.date) {
                stats.prev += 1;
                if attended {
                    stats.attended_prev += 1;
                }
            }

            let patient_key = record.patient_id.to_lowercase();

            if !record.provider.is_empty() {
                let provider_key = record.provider.to_lowercase();
                provider_volume
                    .entry(provider_key.clone())
                    .or_insert_with(|| (record.provider.clone(), 0))
                    .1 += 1;
                stats
                    .patient_providers
                    .entry(patient_key.clone())
                    .or_default()
                    .insert(provider_key);
            }

            if let Some(kind) = &record.appointment_type {
                stats
                    .patient_types
                    .entry(patient_key.clone())
                    .or_default()
                    .insert(kind.to_lowercase());
            }

            if is_cancellation(&record.status) {
                stats.cancel_count += 1;
            }

            if record.note == NoteCompletion::Pending {
                stats.docs_pending += 1;
            }

            stats
                .first_appointments
                .entry(patient_key)
                .and_modify(|first| {
                    if record.date < *first {
                        *first = record.date;
                    }
                })
                .or_insert(record.date);
        }

        stats.unique_patients_last = patients_last.len();
        stats.new_last = stats
            .first_appointments
            .values()
            .filter(|first| windows.in_last(**first))
            .count();
        stats.new_prev = stats
            .first_appointments
            .values()
            .filter(|first| windows.in_previous(**first))
            .count();

        stats.provider_count = provider_volume.len();
        stats.provider_labels = provider_volume
            .iter()
            .map(|(key, (label, _))| (key.clone(), label.clone()))
            .collect();
        let mut leaders: Vec<ProviderLeader> = provider_volume
            .into_iter()
            .map(|(provider_key, (provider, count))| ProviderLeader {
                provider,
                provider_key,
                count,
            })
            .collect();
        leaders.sort_by(|a, b| b.count.cmp(&a.count));
        leaders.truncate(config.leaderboard_size);
        stats.leaders = leaders;

        stats.weekly = weekly_trend(records, config.trend_weeks);
        stats
    }
}

/// Monday of the ISO week containing `at`.
pub fn week_start(at: NaiveDateTime) -> NaiveDate {
    let date = at.date();
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Booked and attended counts per week, oldest first, limited to the most
/// recent `weeks` buckets. Weeks without appointments are absent.
pub fn weekly_trend(records: &[AppointmentRecord], weeks: usize) -> Vec<WeeklyBucket> {
    let mut grouped: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
    for record in records {
        let bucket = grouped.entry(week_start(record.date)).or_default();
        bucket.0 += 1;
        if is_attended(&record.status) {
            bucket.1 += 1;
        }
    }

    let skip = grouped.len().saturating_sub(weeks);
    grouped
        .into_iter()
        .skip(skip)
        .map(|(week, (count, attended))| WeeklyBucket {
            week,
            count,
            attended,
        })
        .collect()
}

fn summarize_numbers(resolver: &mut FieldResolver, rows: &[Row]) -> Vec<NumbersSummaryRow> {
    rows.iter()
        .map(|row| NumbersSummaryRow {
            area: resolver
                .resolve(row, CanonicalField::Area)
                .filter(|area| !area.is_empty())
                .unwrap_or(UNSPECIFIED)
                .to_string(),
            total_leads: to_number(resolver.resolve(row, CanonicalField::NumberTotalLeads)),
            pending_pt: to_number(resolver.resolve(row, CanonicalField::NumberPendingPt)),
            insurance_issues: to_number(
                resolver.resolve(row, CanonicalField::NumberInsuranceIssues),
            ),
        })
        .collect()
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn build_totals(
    census: &PatientCensus,
    visits: &VisitStats,
    numbers: &[NumbersSummaryRow],
) -> Totals {
    Totals {
        patients: census.patients,
        therapists: census.therapists,
        areas: census.areas,
        total_appointments: visits.total,
        total_attended: visits.attended,
        attendance_rate: ratio(visits.attended, visits.total),
        appointments_last_30: visits.last,
        appointments_prev_30: visits.prev,
        attended_last_30: visits.attended_last,
        attendance_last_30: ratio(visits.attended_last, visits.last),
        attendance_prev_30: ratio(visits.attended_prev, visits.prev),
        unique_patients_last_30: visits.unique_patients_last,
        appointments_per_patient: ratio(visits.last, visits.unique_patients_last),
        new_patients_last_30: visits.new_last,
        new_patients_prev_30: visits.new_prev,
        total_leads: numbers.iter().map(|row| row.total_leads).sum(),
        total_pending_pt: numbers.iter().map(|row| row.pending_pt).sum(),
        total_insurance_issues: numbers.iter().map(|row| row.insurance_issues).sum(),
        cancel_count: visits.cancel_count,
        cancellation_rate: ratio(visits.cancel_count, visits.total),
        docs_pending: visits.docs_pending,
        provider_count: visits.provider_count,
    }
}

fn summary_cards(totals: &Totals, config: &DashboardConfig) -> Vec<SummaryCard> {
    let days = config.window_days;
    let attended = if totals.attended_last_30 > 0 {
        totals.attended_last_30
    } else {
        totals.total_attended
    };

    vec![
        SummaryCard {
            title: "Patient Records".to_string(),
            value: format_count(totals.patients as f64),
            subtitle: format!("{} care zones", format_count(totals.areas as f64)),
            trend: build_trend(
                totals.new_patients_last_30 as f64 - totals.new_patients_prev_30 as f64,
                "new patients this month",
                TrendFormat::Count,
                None,
            ),
        },
        SummaryCard {
            title: "Active Therapists".to_string(),
            value: format_count(totals.therapists as f64),
            subtitle: "Engaged in patient caseload".to_string(),
            trend: build_trend(
                totals.therapists.saturating_sub(1) as f64,
                "net change vs last load",
                TrendFormat::Count,
                None,
            ),
        },
        SummaryCard {
            title: format!("Appts ({days} days)"),
            value: format_count(totals.appointments_last_30 as f64),
            subtitle: format!(
                "{} patients touched",
                format_count(totals.unique_patients_last_30 as f64)
            ),
            trend: build_trend(
                totals.appointments_last_30 as f64 - totals.appointments_prev_30 as f64,
                &format!("vs prior {days} days"),
                TrendFormat::Count,
                None,
            ),
        },
        SummaryCard {
            title: "Attendance Rate".to_string(),
            value: format_percent(totals.recent_attendance()),
            subtitle: format!("{} attended", format_count(attended as f64)),
            trend: build_trend(
                totals.attendance_last_30 - totals.attendance_prev_30,
                &format!("delta vs prior {days} days"),
                TrendFormat::Fraction,
                None,
            ),
        },
        SummaryCard {
            title: "Open Leads".to_string(),
            value: format_count(totals.total_leads),
            subtitle: format!(
                "{} pending PT assignment",
                format_count(totals.total_pending_pt)
            ),
            trend: build_trend(
                totals.pending_ratio() * 100.0,
                "pending PT ratio",
                TrendFormat::ScaledPercent,
                None,
            ),
        },
        SummaryCard {
            title: "Insurance Flags".to_string(),
            value: format_count(totals.total_insurance_issues),
            subtitle: "Not accepted or pending verification".to_string(),
            trend: build_trend(
                totals.total_insurance_issues,
                "issues to audit",
                TrendFormat::Count,
                Some(TrendDirection::Negative),
            ),
        },
    ]
}

fn tone(bad: bool, good: TrendDirection) -> TrendDirection {
    if bad {
        TrendDirection::Negative
    } else {
        good
    }
}

fn operational_cards(
    totals: &Totals,
    leaders: &[ProviderLeader],
    territories: usize,
    config: &DashboardConfig,
) -> Vec<OperationalCard> {
    let thresholds = &config.thresholds;
    let previous_attendance = if totals.attendance_prev_30 > 0.0 {
        totals.attendance_prev_30
    } else {
        totals.attendance_rate
    };
    let new_patient_delta = totals.new_patients_last_30 as f64 - totals.new_patients_prev_30 as f64;

    let card = |label: &str, value: String, detail: String, direction: TrendDirection| {
        OperationalCard {
            label: label.to_string(),
            value,
            detail,
            tone: direction,
        }
    };

    vec![
        card(
            "Total Leads",
            format_count(totals.total_leads),
            format!("{} territories", format_count(territories as f64)),
            TrendDirection::Positive,
        ),
        card(
            "Pending PT",
            format_count(totals.total_pending_pt),
            format!("{} of pipeline", format_percent(totals.pending_ratio())),
            tone(totals.total_pending_pt > 0.0, TrendDirection::Positive),
        ),
        card(
            "Insurance Flags",
            format_count(totals.total_insurance_issues),
            "Needs payer review".to_string(),
            tone(totals.total_insurance_issues > 0.0, TrendDirection::Positive),
        ),
        card(
            "Attendance (30d)",
            format_percent(totals.recent_attendance()),
            format!("Prev {}", format_percent(previous_attendance)),
            if totals.recent_attendance() >= thresholds.attendance_goal {
                TrendDirection::Positive
            } else {
                TrendDirection::Neutral
            },
        ),
        card(
            "Cancellation Rate",
            format_percent(totals.cancellation_rate),
            format!("{} cancellations", format_count(totals.cancel_count as f64)),
            tone(
                totals.cancellation_rate > thresholds.cancellation_rate,
                TrendDirection::Neutral,
            ),
        ),
        card(
            "New Patients (30d)",
            format_count(totals.new_patients_last_30 as f64),
            format!("{} vs prior", format_count(new_patient_delta)),
            if new_patient_delta >= 0.0 {
                TrendDirection::Positive
            } else {
                TrendDirection::Neutral
            },
        ),
        card(
            "Providers Active",
            format_count(totals.provider_count as f64),
            leaders
                .first()
                .map(|leader| format!("Top: {}", leader.provider))
                .unwrap_or_else(|| "No visits logged".to_string()),
            TrendDirection::Neutral,
        ),
        card(
            "Docs Pending",
            format_count(totals.docs_pending as f64),
            "Note completion".to_string(),
            tone(totals.docs_pending > 0, TrendDirection::Positive),
        ),
    ]
}
