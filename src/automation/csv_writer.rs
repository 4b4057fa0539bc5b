//! CSV writer for score results.
//!
//! Appends one row per scored image, opening the file in append mode for
//! each write so completed rows survive a crash partway through a batch.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::PipelineError;

/// CSV header row.
const CSV_HEADER: &str = "timestamp,image,score,status";

/// Initializes CSV file with header if it doesn't exist or is empty.
///
/// If the file exists and has content, this does nothing (preserves existing data).
pub fn init_csv(path: &Path) -> Result<()> {
    if path.exists() {
        let file = File::open(path).context("Failed to open existing CSV")?;
        let reader = BufReader::new(file);
        if reader.lines().next().is_some() {
            return Ok(());
        }
    }

    let mut file = File::create(path).context("Failed to create CSV file")?;
    writeln!(file, "{}", CSV_HEADER).context("Failed to write CSV header")?;
    Ok(())
}

/// Quotes a field when it contains a separator, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Appends one result row to the CSV file.
pub fn append_to_csv(path: &Path, image: &Path, result: &Result<String, PipelineError>) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open CSV for append")?;

    let (score, status) = match result {
        Ok(score) => (score.as_str(), "ok".to_string()),
        Err(e) => ("", e.to_string()),
    };

    // Format: timestamp,image,score,status
    let line = format!(
        "{},{},{},{}",
        Local::now().format("%Y-%m-%dT%H:%M:%S"),
        csv_field(&image.display().to_string()),
        csv_field(score),
        csv_field(&status),
    );

    writeln!(file, "{}", line).context("Failed to write CSV row")?;
    Ok(())
}
