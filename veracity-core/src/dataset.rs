//! Input claim datasets.
//!
//! A [`DatasetProfile`] names the CSV columns a dataset uses; a
//! [`DatasetReader`] resolves them against the file header once and then
//! streams [`DatasetRow`]s in file order.

use crate::error::{DatasetError, VeracityError};
use crate::types::{Claim, ClaimMetadata};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Keep only rows whose `column` equals `equals` (after trimming).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: String,
    pub equals: String,
}

/// Column layout of an input dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetProfile {
    /// Column holding the claim text. Required.
    pub text_column: String,
    /// Ground-truth label column, if the dataset has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<ColumnFilter>,
}

impl DatasetProfile {
    /// Plain profile with only a text column.
    pub fn new(text_column: impl Into<String>) -> Self {
        Self {
            text_column: text_column.into(),
            label_column: None,
            author_column: None,
            context_column: None,
            date_column: None,
            filter: None,
        }
    }

    /// PolitiFact export: quote plus rating and speaker metadata.
    pub fn politifact() -> Self {
        Self {
            label_column: Some("rating_label".into()),
            author_column: Some("author".into()),
            context_column: Some("context".into()),
            date_column: Some("date".into()),
            ..Self::new("quote")
        }
    }

    /// Pre-classified social posts; only rows tagged `CLAIM` are checked.
    pub fn trump() -> Self {
        Self {
            date_column: Some("date".into()),
            filter: Some(ColumnFilter {
                column: "classification".into(),
                equals: "CLAIM".into(),
            }),
            ..Self::new("post_text")
        }
    }
}

/// One input row, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRow {
    /// 1-based line of the row in the file, header included.
    pub line: u64,
    pub claim: Claim,
    pub ground_truth: Option<String>,
    /// Whether the row passed the profile's filter.
    pub selected: bool,
}

impl DatasetRow {
    /// Selected and carrying non-empty claim text.
    pub fn is_evaluable(&self) -> bool {
        self.selected && !self.claim.text().is_empty()
    }
}

#[derive(Debug, Clone)]
struct ColumnIndices {
    text: usize,
    label: Option<usize>,
    author: Option<usize>,
    context: Option<usize>,
    date: Option<usize>,
    filter: Option<(usize, String)>,
}

impl ColumnIndices {
    fn resolve(
        profile: &DatasetProfile,
        header: &[String],
        path: &Path,
    ) -> Result<Self, DatasetError> {
        let find = |name: &str| header.iter().position(|h| h == name.trim());
        let require = |name: &str| {
            find(name).ok_or_else(|| DatasetError::MissingColumn {
                column: name.to_string(),
                path: path.to_path_buf(),
                available: header.join(", "),
            })
        };
        let optional = |name: Option<&String>| {
            name.and_then(|n| {
                let idx = find(n.as_str());
                if idx.is_none() {
                    debug!(column = %n, "Metadata column absent; ignoring");
                }
                idx
            })
        };

        Ok(Self {
            text: require(profile.text_column.as_str())?,
            label: profile
                .label_column
                .as_deref()
                .map(|c| require(c))
                .transpose()?,
            author: optional(profile.author_column.as_ref()),
            context: optional(profile.context_column.as_ref()),
            date: optional(profile.date_column.as_ref()),
            filter: match &profile.filter {
                Some(f) => Some((require(f.column.as_str())?, f.equals.trim().to_string())),
                None => None,
            },
        })
    }

    fn row(&self, record: &csv::StringRecord) -> DatasetRow {
        let field = |idx: usize| record.get(idx).unwrap_or_default();
        let non_empty = |idx: Option<usize>| {
            idx.map(|i| field(i).trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let metadata = ClaimMetadata {
            author: non_empty(self.author),
            context: non_empty(self.context),
            date: non_empty(self.date),
        };
        let selected = match &self.filter {
            Some((idx, expected)) => field(*idx).trim() == expected.as_str(),
            None => true,
        };

        DatasetRow {
            line: record.position().map(|p| p.line()).unwrap_or_default(),
            claim: Claim::new(field(self.text)).with_metadata(metadata),
            ground_truth: non_empty(self.label),
            selected,
        }
    }
}

/// Streaming reader over a dataset CSV.
pub struct DatasetReader {
    reader: csv::Reader<File>,
    columns: ColumnIndices,
}

impl DatasetReader {
    /// Open `path` and resolve the profile's columns against its header.
    ///
    /// Fails before reading any row if a required column is missing.
    pub fn open(path: &Path, profile: &DatasetProfile) -> Result<Self, VeracityError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;
        let header: Vec<String> = reader
            .headers()
            .map_err(|e| DatasetError::UnreadableHeader {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let columns = ColumnIndices::resolve(profile, &header, path)?;
        debug!(path = %path.display(), columns = header.len(), "Opened dataset");
        Ok(Self { reader, columns })
    }

    /// Rows in file order. A malformed record yields an error item.
    pub fn rows(self) -> impl Iterator<Item = Result<DatasetRow, VeracityError>> {
        let Self { reader, columns } = self;
        reader.into_records().map(move |record| {
            let record = record?;
            Ok(columns.row(&record))
        })
    }
}

/// Read a whole dataset into memory.
pub fn read_dataset(
    path: &Path,
    profile: &DatasetProfile,
) -> Result<Vec<DatasetRow>, VeracityError> {
    DatasetReader::open(path, profile)?.rows().collect()
}

/// Resolve a profile by name from a profile map.
pub fn profile_by_name<'a>(
    profiles: &'a std::collections::BTreeMap<String, DatasetProfile>,
    name: &str,
) -> Result<&'a DatasetProfile, DatasetError> {
    profiles.get(name).ok_or_else(|| DatasetError::UnknownProfile {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_politifact_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "pf.csv",
            "author,quote,rating_label,context,date\n\
             Jane Doe,\" Taxes doubled, says ad \",false,a TV ad,2020-01-01\n\
             ,Unemployment fell,mostly-true,,\n",
        );

        let rows = read_dataset(&path, &DatasetProfile::politifact()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].claim.text(), "Taxes doubled, says ad");
        assert_eq!(rows[0].ground_truth.as_deref(), Some("false"));
        assert_eq!(rows[0].claim.metadata.author.as_deref(), Some("Jane Doe"));
        assert_eq!(rows[0].claim.metadata.context.as_deref(), Some("a TV ad"));
        assert_eq!(rows[1].claim.metadata, ClaimMetadata::default());
        assert!(rows.iter().all(DatasetRow::is_evaluable));
    }

    #[test]
    fn test_bom_header_and_filter() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "posts.csv",
            "\u{feff}post_text,classification\n\
             Crime is at a record low,CLAIM\n\
             Happy holidays,OPINION\n\
             ,CLAIM\n",
        );

        let rows = read_dataset(&path, &DatasetProfile::trump()).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_evaluable());
        assert!(!rows[1].selected);
        assert!(rows[2].selected);
        assert!(!rows[2].is_evaluable());
        assert_eq!(rows[0].ground_truth, None);
    }

    #[test]
    fn test_missing_text_column_fails_up_front() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.csv", "statement,rating_label\nx,true\n");
        let err = DatasetReader::open(&path, &DatasetProfile::politifact())
            .err()
            .unwrap();
        match err {
            VeracityError::Dataset(DatasetError::MissingColumn { column, available, .. }) => {
                assert_eq!(column, "quote");
                assert!(available.contains("statement"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mojibake_quotes_repaired() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "pf.csv",
            "quote,rating_label\nSays \u{e2}\u{80}\u{9c}no\u{e2}\u{80}\u{9d},false\n",
        );
        let rows = read_dataset(&path, &DatasetProfile::politifact()).unwrap();
        assert_eq!(rows[0].claim.text(), "Says \u{201c}no\u{201d}");
    }

    #[test]
    fn test_profile_by_name() {
        let profiles = std::collections::BTreeMap::from([(
            "politifact".to_string(),
            DatasetProfile::politifact(),
        )]);
        assert!(profile_by_name(&profiles, "politifact").is_ok());
        assert!(matches!(
            profile_by_name(&profiles, "snopes"),
            Err(DatasetError::UnknownProfile { .. })
        ));
    }
}
