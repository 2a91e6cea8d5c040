use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::Parser;
use dashboard_core::{DashboardConfig, MetricsSnapshot, SummaryCard};
use dashboard_sheets::{parse_now, DashboardSession, Dataset, FilterCriteria, Row, Table};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dashboard-cli",
    about = "Summarize the clinic's patient, numbers and appointment sheets."
)]
struct Args {
    /// Patient sheet exported as CSV.
    #[arg(long)]
    patients: PathBuf,

    /// Per-territory lead numbers exported as CSV.
    #[arg(long)]
    numbers: PathBuf,

    /// Appointment log exported as CSV.
    #[arg(long)]
    appointments: PathBuf,

    /// Reference time for the comparison windows, e.g. 2024-05-01T09:00:00.
    /// Defaults to the local clock.
    #[arg(long)]
    now: Option<String>,

    /// JSON file with a (partial) dashboard configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Length of the comparison windows in days.
    #[arg(long)]
    window_days: Option<u32>,

    /// Print the full snapshot as JSON instead of the text summary.
    #[arg(long)]
    json: bool,

    #[arg(long)]
    area: Option<String>,

    #[arg(long)]
    status: Option<String>,

    /// Substring of the assigned therapist names.
    #[arg(long)]
    therapist: Option<String>,

    /// Substring of "<insurer> <insurance status>".
    #[arg(long)]
    insurance: Option<String>,

    /// Provider as written in the appointment log (case-insensitive).
    #[arg(long)]
    provider: Option<String>,

    #[arg(long)]
    appointment_type: Option<String>,

    /// Earliest first appointment (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Latest first appointment (YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Free text matched against every patient cell.
    #[arg(long)]
    search: Option<String>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            area: self.area.clone(),
            status: self.status.clone(),
            therapist: self.therapist.clone(),
            insurance: self.insurance.clone(),
            provider: self.provider.as_deref().map(str::to_lowercase),
            appointment_type: self.appointment_type.clone(),
            date_start: self.from,
            date_end: self.to,
            search: self.search.clone(),
            ..FilterCriteria::default()
        }
    }

    fn dashboard_config(&self) -> anyhow::Result<DashboardConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed reading config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => DashboardConfig::default(),
        };
        if let Some(days) = self.window_days {
            config.window_days = days;
        }
        Ok(config)
    }

    fn reference_time(&self) -> anyhow::Result<NaiveDateTime> {
        match &self.now {
            Some(raw) => parse_now(raw).with_context(|| format!("Invalid --now value {raw:?}")),
            None => Ok(Local::now().naive_local()),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "dashboard_sheets=debug,dashboard_cli=debug"
    } else {
        "dashboard_sheets=info,dashboard_cli=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads a CSV export into a table. Cells are trimmed, short rows are padded
/// with empty cells and rows with no content are skipped.
fn read_table(path: &Path) -> anyhow::Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed opening CSV {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed reading headers from {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("Failed reading row {} of {}", index + 1, path.display()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(column, header)| (header.clone(), record.get(column).map(str::to_string)))
            .collect();
        rows.push(row);
    }

    debug!(path = %path.display(), rows = rows.len(), "loaded sheet");
    Ok(Table::new(headers, rows))
}

fn print_card(card: &SummaryCard) {
    let trend = card
        .trend
        .as_ref()
        .map(|trend| format!(" [{} {}]", trend.value, trend.label))
        .unwrap_or_default();
    println!("  {:<20} {:>8}  {}{}", card.title, card.value, card.subtitle, trend);
}

fn print_summary(snapshot: &MetricsSnapshot) {
    println!("Generated at: {}", snapshot.generated_at);

    println!("\nSummary");
    snapshot.summary_cards.iter().for_each(print_card);

    println!("\nOperations");
    for card in &snapshot.operational_cards {
        println!("  {:<20} {:>8}  {}", card.label, card.value, card.detail);
    }

    if !snapshot.upcoming_appointments.is_empty() {
        println!("\nUpcoming appointments");
        for appointment in &snapshot.upcoming_appointments {
            println!(
                "  {}  {:<10} {:<16} {}",
                appointment.date.format("%b %d, %Y %H:%M"),
                appointment.patient_id,
                appointment.provider,
                appointment.appointment_type.as_deref().unwrap_or("-"),
            );
        }
    }

    println!("\nRecommendations");
    for recommendation in &snapshot.recommendations {
        println!("  - {recommendation}");
    }

    println!("\nHighlights");
    for highlight in &snapshot.analysis_highlights {
        println!("  - {highlight}");
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.dashboard_config()?;
    let now = args.reference_time()?;

    let dataset = Dataset {
        patients: read_table(&args.patients)?,
        numbers: read_table(&args.numbers)?,
        appointments: read_table(&args.appointments)?,
    };

    let mut session = DashboardSession::new(config);
    let snapshot = session.reload(dataset, now);
    info!(%now, "snapshot ready");

    if args.json {
        let rendered =
            serde_json::to_string_pretty(snapshot).context("Failed serializing snapshot")?;
        println!("{rendered}");
    } else {
        print_summary(snapshot);
    }

    let criteria = args.criteria();
    if !criteria.is_unconstrained() {
        let total = session.dataset().patients.len();
        let matched = session.filter(&criteria).len();
        // stdout stays pure JSON under --json
        if args.json {
            eprintln!("Showing {matched} of {total} listings");
        } else {
            println!("\nShowing {matched} of {total} listings");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn csv_cells_are_trimmed_and_blank_rows_skipped() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("patients.csv");
        fs::write(
            &path,
            "Patient ID, Zone ,PT\n P-1 , West,Ana Ruiz\n,,\nP-2,East\n",
        )
        .expect("write csv");

        let table = read_table(&path).expect("csv loads");
        assert_eq!(table.headers, vec!["Patient ID", "Zone", "PT"]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.rows[0].get("Patient ID").cloned().flatten().as_deref(),
            Some("P-1")
        );
        assert_eq!(table.rows[1].get("PT"), Some(&None));
    }

    #[test]
    fn flags_override_config_defaults() {
        let args = Args::parse_from([
            "dashboard-cli",
            "--patients",
            "p.csv",
            "--numbers",
            "n.csv",
            "--appointments",
            "a.csv",
            "--window-days",
            "14",
            "--provider",
            "Dr. Kim",
            "--now",
            "2024-05-01T09:00:00",
        ]);

        assert_eq!(args.dashboard_config().expect("config").window_days, 14);
        assert_eq!(args.criteria().provider.as_deref(), Some("dr. kim"));
        assert_eq!(
            args.reference_time().expect("now parses").to_string(),
            "2024-05-01 09:00:00"
        );
    }

    #[test]
    fn no_filter_flags_means_unconstrained() {
        let args = Args::parse_from([
            "dashboard-cli",
            "--patients",
            "p.csv",
            "--numbers",
            "n.csv",
            "--appointments",
            "a.csv",
        ]);
        assert!(args.criteria().is_unconstrained());
    }
}
