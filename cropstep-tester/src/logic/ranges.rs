use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use serde::Serialize;

/// Column that must never go negative in a healthy log.
pub const SOIL_WATER_COLUMN: &str = "soil_water_0_30";

/// Running min/max/mean of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnRange {
    pub column: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

impl ColumnRange {
    fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            count: 0,
        }
    }

    fn push(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
        #[allow(clippy::cast_precision_loss)]
        let n = self.count as f64;
        self.mean += (value - self.mean) / n;
    }
}

/// Ranges of every numeric column across a folder of episode logs.
#[derive(Debug, Clone, Serialize)]
pub struct RangeReport {
    pub files: Vec<PathBuf>,
    pub rows: usize,
    pub columns: Vec<ColumnRange>,
}

impl RangeReport {
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnRange> {
        self.columns.iter().find(|range| range.column == name)
    }

    /// True when soil water went negative anywhere, which points to a simulator bug.
    #[must_use]
    pub fn negative_soil_water(&self) -> bool {
        self.column(SOIL_WATER_COLUMN)
            .is_some_and(|range| range.count > 0 && range.min < 0.0)
    }
}

/// Scan every `*.csv` file in `dir`.
///
/// # Errors
///
/// Returns an error when the folder cannot be read, contains no logs, or a log has a header
/// that differs from the first one.
pub fn scan_logs(dir: &Path) -> Result<RangeReport> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();
    if files.is_empty() {
        bail!("no CSV logs found in {}", dir.display());
    }

    let mut header: Option<csv::StringRecord> = None;
    let mut columns: Vec<ColumnRange> = Vec::new();
    let mut rows = 0;
    for path in &files {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("opening {}", path.display()))?;
        let names = reader
            .headers()
            .with_context(|| format!("reading header of {}", path.display()))?
            .clone();
        if names.is_empty() {
            continue;
        }
        match &header {
            Some(expected) => ensure!(
                *expected == names,
                "{} has a different header",
                path.display()
            ),
            None => {
                columns = names.iter().map(ColumnRange::new).collect();
                header = Some(names);
            }
        }
        for record in reader.records() {
            let record = record.with_context(|| format!("parsing {}", path.display()))?;
            rows += 1;
            for (range, cell) in columns.iter_mut().zip(record.iter()) {
                if let Ok(value) = cell.parse::<f64>()
                    && value.is_finite()
                {
                    range.push(value);
                }
            }
        }
    }
    columns.retain(|range| range.count > 0);
    Ok(RangeReport {
        files,
        rows,
        columns,
    })
}
