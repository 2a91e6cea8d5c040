//! Sheet tables as delivered by the loader: ordered header -> cell maps.

use dashboard_core::DashboardError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One spreadsheet record. `None` marks a cell the source did not provide.
pub type Row = IndexMap<String, Option<String>>;

/// Rows of one source plus its header order for display.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    /// Builds a table whose header order is recovered from the first row.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let headers = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The three sheets that feed the dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    pub patients: Table,
    pub numbers: Table,
    pub appointments: Table,
}

/// Convenience for building a row from string pairs.
pub fn row<'a>(cells: impl IntoIterator<Item = (&'a str, &'a str)>) -> Row {
    cells
        .into_iter()
        .map(|(header, value)| (header.to_string(), Some(value.to_string())))
        .collect()
}

/// Reads a dataset from JSON.
///
/// Each table is either `{"headers": [...], "rows": [...]}` or a bare array of
/// row objects. Numeric and boolean cells are kept as their textual form.
pub fn dataset_from_value(value: &Value) -> Result<Dataset, DashboardError> {
    let object = value.as_object().ok_or(DashboardError::MissingData)?;

    let table = |name: &str| -> Result<Table, DashboardError> {
        match object.get(name) {
            Some(table) => table_from_value(name, table),
            None => Err(DashboardError::Parse(format!("Dataset has no {name} table"))),
        }
    };

    Ok(Dataset {
        patients: table("patients")?,
        numbers: table("numbers")?,
        appointments: table("appointments")?,
    })
}

/// Reads one table; `name` only appears in error messages.
pub fn table_from_value(name: &str, value: &Value) -> Result<Table, DashboardError> {
    match value {
        Value::Array(rows) => Ok(Table::from_rows(rows_from_values(name, rows)?)),
        Value::Object(object) => {
            let rows = match object.get("rows") {
                Some(Value::Array(rows)) => rows_from_values(name, rows)?,
                Some(_) => {
                    return Err(DashboardError::Parse(format!(
                        "Table {name}: rows must be an array"
                    )))
                }
                None => Vec::new(),
            };

            match object.get("headers").and_then(Value::as_array) {
                Some(headers) => {
                    let headers = headers
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|header| header.trim().to_string())
                        .collect();
                    Ok(Table::new(headers, rows))
                }
                None => Ok(Table::from_rows(rows)),
            }
        }
        _ => Err(DashboardError::Parse(format!(
            "Table {name} must be an array or an object"
        ))),
    }
}

fn rows_from_values(name: &str, rows: &[Value]) -> Result<Vec<Row>, DashboardError> {
    rows.iter()
        .enumerate()
        .map(|(index, value)| {
            let object = value.as_object().ok_or_else(|| {
                DashboardError::Parse(format!("Table {name}: row {index} is not an object"))
            })?;
            Ok(object
                .iter()
                .map(|(header, cell)| (header.trim().to_string(), cell_text(cell)))
                .collect())
        })
        .collect()
}

fn cell_text(cell: &Value) -> Option<String> {
    match cell {
        Value::Null => None,
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn headers_are_recovered_from_first_row_order() {
        let table = Table::from_rows(vec![row([("Zone", "West"), ("Patient ID", "p1")])]);
        assert_eq!(table.headers, vec!["Zone", "Patient ID"]);
    }

    #[test]
    fn dataset_accepts_both_table_shapes_and_stringifies_cells() {
        let value = json!({
            "patients": {"headers": ["Patient ID", "Area"], "rows": [{"Patient ID": " p1 ", "Area": null}]},
            "numbers": [{"Area": "West", "Total Leads": 12}],
            "appointments": []
        });

        let dataset = dataset_from_value(&value).expect("dataset should parse");
        assert_eq!(dataset.patients.headers, vec!["Patient ID", "Area"]);
        assert_eq!(
            dataset.patients.rows[0].get("Patient ID"),
            Some(&Some("p1".to_string()))
        );
        assert_eq!(dataset.patients.rows[0].get("Area"), Some(&None));
        assert_eq!(
            dataset.numbers.rows[0].get("Total Leads"),
            Some(&Some("12".to_string()))
        );
        assert!(dataset.appointments.is_empty());
    }

    #[test]
    fn missing_table_is_a_parse_error() {
        let value = json!({"patients": [], "numbers": []});
        assert!(matches!(
            dataset_from_value(&value),
            Err(DashboardError::Parse(_))
        ));
    }
}
