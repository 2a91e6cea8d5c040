//! Framework-neutral WASM <-> JavaScript bridge for the dashboard engine.

use chrono::NaiveDate;
use dashboard_core::{DashboardConfig, DashboardError, MetricsSnapshot};
use dashboard_sheets::{parse_now, table_from_value, FieldResolver, FilterCriteria};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

/// Partial config from JS; absent keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
struct JsDashboardConfig {
    #[serde(default)]
    window_days: Option<u32>,
    #[serde(default)]
    trend_weeks: Option<usize>,
    #[serde(default)]
    leaderboard_size: Option<usize>,
    #[serde(default)]
    insurance_top: Option<usize>,
    #[serde(default)]
    upcoming_limit: Option<usize>,
    #[serde(default)]
    watchlist_size: Option<usize>,
    #[serde(default)]
    pending_ratio: Option<f64>,
    #[serde(default)]
    attendance_floor: Option<f64>,
    #[serde(default)]
    attendance_goal: Option<f64>,
    #[serde(default)]
    cancellation_rate: Option<f64>,
    #[serde(default)]
    provider_dominance: Option<f64>,
}

impl From<JsDashboardConfig> for DashboardConfig {
    fn from(cfg: JsDashboardConfig) -> Self {
        let mut base = DashboardConfig::default();
        if let Some(days) = cfg.window_days {
            base.window_days = days;
        }
        if let Some(weeks) = cfg.trend_weeks {
            base.trend_weeks = weeks;
        }
        if let Some(size) = cfg.leaderboard_size {
            base.leaderboard_size = size;
        }
        if let Some(top) = cfg.insurance_top {
            base.insurance_top = top;
        }
        if let Some(limit) = cfg.upcoming_limit {
            base.upcoming_limit = limit;
        }
        if let Some(size) = cfg.watchlist_size {
            base.watchlist_size = size;
        }
        if let Some(ratio) = cfg.pending_ratio {
            base.thresholds.pending_ratio = ratio;
        }
        if let Some(floor) = cfg.attendance_floor {
            base.thresholds.attendance_floor = floor;
        }
        if let Some(goal) = cfg.attendance_goal {
            base.thresholds.attendance_goal = goal;
        }
        if let Some(rate) = cfg.cancellation_rate {
            base.thresholds.cancellation_rate = rate;
        }
        if let Some(dominance) = cfg.provider_dominance {
            base.thresholds.provider_dominance = dominance;
        }
        base
    }
}

/// Dropdown state as the UI holds it: plain strings, `""` or `"all"` for
/// unconstrained, dates as `YYYY-MM-DD`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JsFilterCriteria {
    area: String,
    status: String,
    therapist: String,
    insurance: String,
    lead_source: String,
    booking_source: String,
    authorization: String,
    patient_id: String,
    provider: String,
    appointment_type: String,
    date_start: String,
    date_end: String,
    search: String,
}

impl TryFrom<JsFilterCriteria> for FilterCriteria {
    type Error = DashboardError;

    fn try_from(js: JsFilterCriteria) -> Result<Self, Self::Error> {
        let text = |value: String| (!value.trim().is_empty()).then_some(value);
        Ok(FilterCriteria {
            date_start: js_date(&js.date_start)?,
            date_end: js_date(&js.date_end)?,
            area: text(js.area),
            status: text(js.status),
            therapist: text(js.therapist),
            insurance: text(js.insurance),
            lead_source: text(js.lead_source),
            booking_source: text(js.booking_source),
            authorization: text(js.authorization),
            patient_id: text(js.patient_id),
            provider: text(js.provider),
            appointment_type: text(js.appointment_type),
            search: text(js.search),
        })
    }
}

fn js_date(raw: &str) -> Result<Option<NaiveDate>, DashboardError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|err| DashboardError::Parse(format!("Invalid filter date {raw}: {err}")))
}

/// Builds the metrics snapshot for `{patients, numbers, appointments}`.
///
/// `now` is the clinic's local time (`2024-05-01T09:00:00`); the bridge never
/// reads a clock of its own.
#[wasm_bindgen]
pub fn summarize_dataset(
    input_dataset: JsValue,
    now: String,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let dataset_value = from_value::<serde_json::Value>(input_dataset)
        .map_err(|err| JsValue::from_str(&format!("Unable to read dataset JSON: {err}")))?;

    let cfg = match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            let cfg: JsDashboardConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Unable to read config: {err}")))?;
            DashboardConfig::from(cfg)
        }
        _ => DashboardConfig::default(),
    };

    let now = parse_now(&now).map_err(|err| JsValue::from_str(&format_dashboard_error(err)))?;
    let snapshot = dashboard_sheets::summarize_dataset_value(&dataset_value, now, &cfg)
        .map_err(|err| JsValue::from_str(&format_dashboard_error(err)))?;

    to_js(&snapshot, "snapshot")
}

/// Patient rows matching `criteria`, judged against a snapshot previously
/// returned by [`summarize_dataset`].
#[wasm_bindgen]
pub fn filter_patients(
    rows: JsValue,
    snapshot: JsValue,
    criteria: JsValue,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let rows_value = from_value::<serde_json::Value>(rows)
        .map_err(|err| JsValue::from_str(&format!("Unable to read patient rows: {err}")))?;
    let table = table_from_value("patients", &rows_value)
        .map_err(|err| JsValue::from_str(&format_dashboard_error(err)))?;

    let snapshot: MetricsSnapshot = from_value(snapshot)
        .map_err(|err| JsValue::from_str(&format!("Unable to read snapshot: {err}")))?;

    let criteria: JsFilterCriteria = from_value(criteria)
        .map_err(|err| JsValue::from_str(&format!("Unable to read filter criteria: {err}")))?;
    let criteria = FilterCriteria::try_from(criteria)
        .map_err(|err| JsValue::from_str(&format_dashboard_error(err)))?;

    let mut resolver = FieldResolver::new();
    let matched =
        dashboard_sheets::filter_patients(&mut resolver, &table.rows, &criteria, &snapshot);

    to_js(&matched, "filtered rows")
}

/// Plain JS objects rather than `Map`s, so the snapshot can be handed back
/// to [`filter_patients`] or stringified as is.
fn to_js<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("Unable to serialize {what}: {err}")))
}

fn format_dashboard_error(err: DashboardError) -> String {
    format!("Dashboard error: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let js: JsDashboardConfig =
            serde_json::from_str(r#"{"window_days": 14, "cancellation_rate": 0.2}"#)
                .expect("config parses");
        let cfg = DashboardConfig::from(js);

        assert_eq!(cfg.window_days, 14);
        assert_eq!(cfg.thresholds.cancellation_rate, 0.2);
        assert_eq!(cfg.trend_weeks, 12);
        assert_eq!(cfg.thresholds.pending_ratio, 0.25);
    }

    #[test]
    fn every_list_size_and_threshold_can_be_overridden() {
        let js: JsDashboardConfig = serde_json::from_str(
            r#"{"insurance_top": 3, "watchlist_size": 4, "attendance_goal": 0.95, "provider_dominance": 2.0}"#,
        )
        .expect("config parses");
        let cfg = DashboardConfig::from(js);

        assert_eq!(cfg.insurance_top, 3);
        assert_eq!(cfg.watchlist_size, 4);
        assert_eq!(cfg.thresholds.attendance_goal, 0.95);
        assert_eq!(cfg.thresholds.provider_dominance, 2.0);
        assert_eq!(cfg.upcoming_limit, 6);
    }

    #[test]
    fn blank_criteria_are_unconstrained() {
        let js: JsFilterCriteria =
            serde_json::from_str(r#"{"area": "", "status": "all", "date_start": ""}"#)
                .expect("criteria parse");
        let criteria = FilterCriteria::try_from(js).expect("criteria convert");

        assert_eq!(criteria.area, None);
        assert_eq!(criteria.date_start, None);
        assert!(criteria.is_unconstrained());
    }

    #[test]
    fn filter_dates_must_be_iso_days() {
        let js: JsFilterCriteria =
            serde_json::from_str(r#"{"date_start": "2024-04-01", "date_end": "04/30/2024"}"#)
                .expect("criteria parse");
        let err = FilterCriteria::try_from(js).expect_err("US date is rejected");
        assert!(format_dashboard_error(err).contains("04/30/2024"));

        let js: JsFilterCriteria =
            serde_json::from_str(r#"{"date_start": "2024-04-01"}"#).expect("criteria parse");
        let criteria = FilterCriteria::try_from(js).expect("criteria convert");
        assert_eq!(criteria.date_start, NaiveDate::from_ymd_opt(2024, 4, 1));
    }
}
