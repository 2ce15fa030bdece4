use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::extract::RawFields;
use crate::schema::FIELD_SCHEMA;

/// One logged step: raw state after the step, the requested and applied action, reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    pub day: u32,
    pub raw: RawFields,
    pub action_mm: f64,
    pub accepted_mm: f64,
    pub reward: f64,
}

/// Step-by-step record of one episode, written as CSV when the episode ends.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodeLog {
    rows: Vec<LogRow>,
}

impl EpisodeLog {
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Record the state returned by `reset`, with no action and no reward.
    pub fn push_initial(&mut self, raw: RawFields) {
        self.rows.push(LogRow {
            day: 0,
            raw,
            action_mm: 0.0,
            accepted_mm: 0.0,
            reward: 0.0,
        });
    }

    pub fn push(&mut self, row: LogRow) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn file_name(episode: u64) -> String {
        format!("episode_{episode:04}_log.csv")
    }

    #[must_use]
    pub fn header() -> String {
        let mut header = String::from("day");
        for spec in &FIELD_SCHEMA {
            header.push(',');
            header.push_str(spec.name);
        }
        header.push_str(",action_irrigation_mm,accepted_irrigation_mm,reward");
        header
    }

    #[must_use]
    pub fn to_csv(&self) -> String {
        let mut out = Self::header();
        out.push('\n');
        for row in &self.rows {
            let _ = write!(out, "{}", row.day);
            for value in row.raw.values() {
                let _ = write!(out, ",{value}");
            }
            let _ = writeln!(out, ",{},{},{}", row.action_mm, row.accepted_mm, row.reward);
        }
        out
    }

    /// Write `episode_NNNN_log.csv` into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory or file cannot be written.
    pub fn write_csv(&self, dir: &Path, episode: u64) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name(episode));
        fs::write(&path, self.to_csv())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{OBSERVATION_DIM, ObservationField};

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let mut log = EpisodeLog::new();
        log.push_initial(RawFields::sentinels());
        let mut raw = RawFields::sentinels();
        raw.set(ObservationField::DaysAfterPlanting, 1.0);
        log.push(LogRow {
            day: 1,
            raw,
            action_mm: 62.0,
            accepted_mm: 50.0,
            reward: 0.25,
        });
        let csv = log.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("day,days_after_planting,"));
        assert_eq!(lines[0].split(',').count(), OBSERVATION_DIM + 4);
        assert!(lines[1].ends_with(",0,0,0"));
        assert!(lines[2].ends_with(",62,50,0.25"));
        assert_eq!(EpisodeLog::file_name(7), "episode_0007_log.csv");
    }
}
