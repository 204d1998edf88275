use chrono::Local;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::sweeper::combination::Combination;
use crate::error::Result;

pub const SUMMARY_FILE: &str = "sweep_summary.csv";

/// Columns of the sweep summary, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryColumn {
    /// Identifies the driver run that produced the row.
    RunId,
    Timestamp,
    Combination,
    /// `done` or `cancelled`.
    Outcome,
    /// Wall-clock seconds spent on the combination.
    DurationS,
    Error,
}

impl SummaryColumn {
    pub const ALL: [SummaryColumn; 6] =
        [SummaryColumn::RunId, SummaryColumn::Timestamp, SummaryColumn::Combination, SummaryColumn::Outcome, SummaryColumn::DurationS, SummaryColumn::Error];

    pub fn header(&self) -> &'static str {
        match self {
            SummaryColumn::RunId => "RunId",
            SummaryColumn::Timestamp => "Timestamp",
            SummaryColumn::Combination => "Combination",
            SummaryColumn::Outcome => "Outcome",
            SummaryColumn::DurationS => "DurationS",
            SummaryColumn::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinationOutcome {
    Done,
    Cancelled,
}

impl CombinationOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            CombinationOutcome::Done => "done",
            CombinationOutcome::Cancelled => "cancelled",
        }
    }
}

/// Appends one `;`-separated row per finished combination to `<results_dir>/sweep_summary.csv`.
///
/// Rows of earlier runs are kept; the header is only written to a new file.
#[derive(Debug)]
pub struct SweepSummary {
    writer: csv::Writer<File>,
    path: PathBuf,
    run_id: Uuid,
}

impl SweepSummary {
    pub fn open(results_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(results_dir)?;
        let path = results_dir.join(SUMMARY_FILE);
        let is_new = !path.exists();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new().delimiter(b';').has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(SummaryColumn::ALL.iter().map(SummaryColumn::header)).map_err(csv_error)?;
            writer.flush()?;
        }

        let run_id = Uuid::new_v4();
        log::debug!("Sweep summary of run {} goes to {}", run_id, path.display());
        Ok(Self { writer, path, run_id })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record(&mut self, combination: &Combination, outcome: CombinationOutcome, duration: Duration, error: Option<&str>) -> Result<()> {
        let row: Vec<String> = SummaryColumn::ALL
            .iter()
            .map(|column| match column {
                SummaryColumn::RunId => self.run_id.to_string(),
                SummaryColumn::Timestamp => Local::now().to_rfc3339(),
                SummaryColumn::Combination => combination.slug(),
                SummaryColumn::Outcome => outcome.as_str().to_string(),
                SummaryColumn::DurationS => duration.as_secs().to_string(),
                SummaryColumn::Error => error.map(|e| e.replace('\n', " ")).unwrap_or_else(|| "NA".to_string()),
            })
            .collect();

        self.writer.write_record(&row).map_err(csv_error)?;
        self.writer.flush()?;
        Ok(())
    }
}

fn csv_error(e: csv::Error) -> std::io::Error {
    std::io::Error::other(e)
}
