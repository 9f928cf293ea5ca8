use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// One line of the JSONL call log: everything needed to audit a single
/// offer-API call after the fact.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub duration_ms: i64,
    pub start_station: String,
    pub end_station: String,
    pub travel_date: NaiveDate,
    pub success: bool,
    pub routes_found: usize,
    pub status_code: Option<u16>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

/// Append-only JSONL log of every API call in a run. Log failures are
/// swallowed after a warning; the log must never take down the harvest.
pub struct CallLog {
    file: Mutex<File>,
}

impl CallLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    pub fn record(&self, record: &CallRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(why) => {
                log::warn!("could not serialize call record: {}", why);
                return;
            }
        };
        let mut file = self.file.lock().unwrap();
        if let Err(why) = writeln!(file, "{}", line) {
            log::warn!("could not write call record: {}", why);
        }
    }
}
