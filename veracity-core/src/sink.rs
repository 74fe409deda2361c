//! Append-only CSV results file.
//!
//! The results file is both the batch output and its checkpoint: the set of
//! completed claims is rebuilt from its `claim` column every time a
//! [`ResultSink`] is opened.

use crate::error::{DatasetError, VeracityError};
use crate::types::{OutputRow, normalize_claim};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Header written once when a results file is created.
pub const OUTPUT_HEADER: [&str; 4] =
    ["claim", "ground_truth_label", "predicted_label", "rationale"];

// Column names accepted when reading, current name first.
const CLAIM_COLUMNS: &[&str] = &["claim", "claim_text"];
const TRUTH_COLUMNS: &[&str] = &["ground_truth_label", "politifact_label"];
const PREDICTED_COLUMNS: &[&str] = &["predicted_label", "rag_label"];
const RATIONALE_COLUMNS: &[&str] = &["rationale", "rag_motivation"];

/// Writer half of the checkpoint; owns the completed-claim set for one run.
pub struct ResultSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    completed: HashSet<String>,
}

impl ResultSink {
    /// Open or create the results file at `path`.
    ///
    /// A missing or empty file is created with the header. An existing file
    /// is read once to collect the claims it already holds.
    pub fn open(path: &Path) -> Result<Self, VeracityError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let has_content = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        let completed: HashSet<String> = if has_content {
            read_output_rows(path)?
                .into_iter()
                .map(|row| normalize_claim(&row.claim))
                .collect()
        } else {
            HashSet::new()
        };

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if has_content && !ends_with_newline(path)? {
            // Hand-edited files and torn writes can leave the last record open.
            file.write_all(b"\n")?;
            file.sync_data()?;
            warn!(path = %path.display(), "Results file lacked a final line break; added one");
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if !has_content {
            writer.write_record(OUTPUT_HEADER)?;
            writer.flush()?;
            writer.get_ref().sync_data()?;
            info!(path = %path.display(), "Created results file");
        } else {
            info!(path = %path.display(), completed = completed.len(), "Loaded checkpoint");
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            completed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_completed(&self, key: &str) -> bool {
        self.completed.contains(key)
    }

    /// Number of distinct claims already in the file.
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn completed(&self) -> &HashSet<String> {
        &self.completed
    }

    /// Append one row and make it durable before marking the claim done.
    pub fn append(&mut self, row: &OutputRow) -> Result<(), VeracityError> {
        self.writer.write_record([
            row.claim.as_str(),
            row.ground_truth_label.as_deref().unwrap_or_default(),
            row.predicted_label.as_str(),
            row.rationale.as_str(),
        ])?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.completed.insert(row.claim.clone());
        debug!(completed = self.completed.len(), "Row persisted");
        Ok(())
    }
}

fn ends_with_newline(path: &Path) -> Result<bool, VeracityError> {
    let mut file = File::open(path)?;
    if file.seek(SeekFrom::End(0))? == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn column_index(header: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|name| {
        header
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == *name)
    })
}

/// Read every row of a results file.
///
/// Files written by older tooling with `claim_text`/`rag_label` style
/// headers are accepted as well.
pub fn read_output_rows(path: &Path) -> Result<Vec<OutputRow>, VeracityError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let header = reader.headers()?.clone();

    let missing = |column: &str| DatasetError::MissingColumn {
        column: column.to_string(),
        path: path.to_path_buf(),
        available: header.iter().collect::<Vec<_>>().join(", "),
    };
    let claim_idx = column_index(&header, CLAIM_COLUMNS).ok_or_else(|| missing("claim"))?;
    let predicted_idx =
        column_index(&header, PREDICTED_COLUMNS).ok_or_else(|| missing("predicted_label"))?;
    let truth_idx = column_index(&header, TRUTH_COLUMNS);
    let rationale_idx = column_index(&header, RATIONALE_COLUMNS);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or_default();
        rows.push(OutputRow {
            claim: field(claim_idx).to_string(),
            ground_truth_label: truth_idx
                .map(field)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            predicted_label: field(predicted_idx).trim().to_string(),
            rationale: rationale_idx.map(field).unwrap_or_default().to_string(),
        });
    }
    Ok(rows)
}

/// Write `rows` to a new file at `path` with the standard header,
/// replacing any existing file.
pub fn write_output_rows(path: &Path, rows: &[OutputRow]) -> Result<(), VeracityError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(OUTPUT_HEADER)?;
    for row in rows {
        writer.write_record([
            row.claim.as_str(),
            row.ground_truth_label.as_deref().unwrap_or_default(),
            row.predicted_label.as_str(),
            row.rationale.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
