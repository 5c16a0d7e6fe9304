// CrabStruct - GPL-3.0-or-later
// This file is part of CrabStruct.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// CrabStruct is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// CrabStruct is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with CrabStruct.  If not, see <https://www.gnu.org/licenses/>.

//! Loading tabular logs and classifying their columns.
//!
//! A log is either a JSON array of objects or one JSON object per line. The
//! header list is the union of all object keys in first-seen order. Coloring
//! rule columns are appended as empty string columns; the rule engine that
//! fills them lives outside this crate.

use chrono::{DateTime, NaiveDateTime, NaiveTime};
use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Config;
use crate::core::filter::{find_indices, FilterColumn};
use crate::structure::{ColumnType, Header, HeaderType, LogCorpus, StructureError};

type Record = IndexMap<String, Value>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `line` is 1-based; 0 means the whole document.
    #[error("Invalid JSON at line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Row selection {index} out of range ({rows} rows)")]
    RowOutOfRange { index: usize, rows: usize },

    #[error("Filter {text:?} matched none of {rows} rows")]
    EmptyFilter { text: String, rows: usize },
}

/// A loaded log: headers plus string cells, one row per record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFile {
    headers: Vec<Header>,
    rows: Vec<Vec<String>>,
    rule_columns: Vec<String>,
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn looks_like_timestamp(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveTime::parse_from_str(value, "%H:%M:%S%.f").is_ok()
        || NaiveTime::parse_from_str(value, "%H:%M").is_ok()
}

impl LogFile {
    /// Build a log from parsed records.
    pub fn create(records: &[Record], rule_columns: &[String]) -> Self {
        profiling::scope!("LogFile::create");
        let mut names: IndexSet<&str> = records
            .iter()
            .flat_map(|record| record.keys().map(String::as_str))
            .collect();
        let content_columns = names.len();
        names.extend(rule_columns.iter().map(String::as_str));

        let headers = names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let numeric = index < content_columns
                    && records.iter().any(|r| r.get(*name).is_some_and(Value::is_number))
                    && records
                        .iter()
                        .all(|r| r.get(*name).is_none_or(|v| v.is_number() || v.is_null()));
                let kind = if numeric {
                    HeaderType::Number
                } else {
                    HeaderType::String
                };
                Header::new(*name, kind)
            })
            .collect();

        let rows = records
            .par_iter()
            .map(|record| names.iter().map(|name| cell_text(record.get(*name))).collect())
            .collect();

        Self {
            headers,
            rows,
            rule_columns: rule_columns.to_vec(),
        }
    }

    /// Parse a JSON array of objects or JSON lines.
    pub fn parse(content: &str, rule_columns: &[String]) -> Result<Self, LoadError> {
        let records: Vec<Record> = if content.trim_start().starts_with('[') {
            serde_json::from_str(content).map_err(|source| LoadError::Json { line: 0, source })?
        } else {
            content
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(index, line)| {
                    serde_json::from_str(line).map_err(|source| LoadError::Json {
                        line: index + 1,
                        source,
                    })
                })
                .collect::<Result<_, _>>()?
        };
        Ok(Self::create(&records, rule_columns))
    }

    /// Read and parse a log file. Invalid UTF-8 is replaced, not rejected.
    pub fn load(path: &Path, rule_columns: &[String]) -> Result<Self, LoadError> {
        let start_time = std::time::Instant::now();
        let buffer = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let content = String::from_utf8_lossy(&buffer);
        let log = Self::parse(&content, rule_columns)?;
        tracing::info!(
            "Loaded {} rows with {} columns from {} in {:?}",
            log.rows.len(),
            log.headers.len(),
            path.display(),
            start_time.elapsed()
        );
        Ok(log)
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn rule_columns(&self) -> &[String] {
        &self.rule_columns
    }

    /// Copies of the rows at `indices`, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Vec<Vec<String>>, LoadError> {
        indices
            .iter()
            .map(|&index| {
                self.rows.get(index).cloned().ok_or(LoadError::RowOutOfRange {
                    index,
                    rows: self.rows.len(),
                })
            })
            .collect()
    }

    /// A log with only the rows at `indices`.
    #[must_use]
    pub fn retain_rows(&self, indices: &[usize]) -> Self {
        Self {
            headers: self.headers.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
            rule_columns: self.rule_columns.clone(),
        }
    }

    /// A log with only the rows containing `text` in `column`. A filter
    /// that keeps nothing is an error, so later row selections never point
    /// into an empty log.
    pub fn filtered(&self, column: &FilterColumn, text: &str) -> Result<Self, LoadError> {
        let kept = find_indices(&self.rows, column, text);
        if kept.is_empty() && !self.rows.is_empty() {
            return Err(LoadError::EmptyFilter {
                text: text.to_string(),
                rows: self.rows.len(),
            });
        }
        tracing::info!("Filter kept {} of {} rows", kept.len(), self.rows.len());
        Ok(self.retain_rows(&kept))
    }

    /// Classify every column for a new structure session.
    pub fn classify_columns(&self, config: &Config) -> Vec<ColumnType> {
        self.headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                if self.rule_columns.contains(&header.name) {
                    ColumnType::Custom
                } else if self.is_timestamp_column(index, config) {
                    ColumnType::Unselected
                } else {
                    ColumnType::Selected
                }
            })
            .collect()
    }

    fn is_timestamp_column(&self, index: usize, config: &Config) -> bool {
        let name = &self.headers[index].name;
        if config
            .timestamp_columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(name))
        {
            return true;
        }
        let mut samples = self
            .rows
            .iter()
            .map(|row| row[index].as_str())
            .filter(|value| !value.is_empty())
            .take(config.timestamp_sample_rows)
            .peekable();
        samples.peek().is_some() && samples.all(looks_like_timestamp)
    }

    /// Serialize the log for structure search.
    pub fn corpus(&self, column_types: &[ColumnType]) -> Result<LogCorpus, StructureError> {
        LogCorpus::build(&self.headers, column_types, &self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const JSON_LINES: &str = r#"
{"timestamp": "2025-11-20T14:23:45Z", "level": "INFO", "code": 200, "msg": "ok"}
{"timestamp": "2025-11-20T14:23:46Z", "level": "WARN", "code": 503, "msg": null}
"#;

    #[test]
    fn test_parse_json_lines() {
        let log = LogFile::parse(JSON_LINES, &["color".to_string()]).unwrap();
        let names: Vec<_> = log.headers().iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["timestamp", "level", "code", "msg", "color"]);
        assert_eq!(log.headers()[2].kind, HeaderType::Number);
        assert_eq!(log.headers()[3].kind, HeaderType::String);
        assert_eq!(log.rows()[1], vec!["2025-11-20T14:23:46Z", "WARN", "503", "", ""]);
    }

    #[test]
    fn test_parse_json_array_with_missing_keys() {
        let log = LogFile::parse(r#"[{"a": "1"}, {"b": true}]"#, &[]).unwrap();
        assert_eq!(log.headers().len(), 2);
        assert_eq!(log.rows(), &[vec!["1", ""], vec!["", "true"]]);
    }

    #[test]
    fn test_parse_reports_line_numbers() {
        let err = LogFile::parse("{\"a\": 1}\n{oops}\n", &[]).unwrap_err();
        assert!(matches!(err, LoadError::Json { line: 2, .. }));
    }

    #[test]
    fn test_classify_columns() {
        let log = LogFile::parse(JSON_LINES, &["color".to_string()]).unwrap();
        let types = log.classify_columns(&Config::default());
        assert_eq!(
            types,
            vec![
                ColumnType::Unselected,
                ColumnType::Selected,
                ColumnType::Selected,
                ColumnType::Selected,
                ColumnType::Custom
            ]
        );
    }

    #[test]
    fn test_timestamp_detection_by_value() {
        let log = LogFile::parse(
            "{\"when\": \"10:00\", \"n\": \"1\"}\n{\"when\": \"10:01:02.5\", \"n\": \"2\"}\n",
            &[],
        )
        .unwrap();
        let types = log.classify_columns(&Config::default());
        assert_eq!(types, vec![ColumnType::Unselected, ColumnType::Selected]);
    }

    #[test]
    fn test_select_rows() {
        let log = LogFile::parse(JSON_LINES, &[]).unwrap();
        assert_eq!(log.select_rows(&[1, 0]).unwrap()[0][1], "WARN");
        assert!(matches!(
            log.select_rows(&[2]),
            Err(LoadError::RowOutOfRange { index: 2, rows: 2 })
        ));
        assert_eq!(log.retain_rows(&[1]).rows().len(), 1);
    }

    #[test]
    fn test_filtered_rejects_filter_without_hits() {
        let log = LogFile::parse(JSON_LINES, &[]).unwrap();
        let warn = log.filtered(&FilterColumn::Index(1), "WARN").unwrap();
        assert_eq!(warn.rows().len(), 1);
        assert_eq!(warn.select_rows(&[0]).unwrap()[0][1], "WARN");

        let err = log.filtered(&FilterColumn::All, "DEBUG").unwrap_err();
        assert!(matches!(err, LoadError::EmptyFilter { ref text, rows: 2 } if text == "DEBUG"));
        assert_eq!(err.to_string(), "Filter \"DEBUG\" matched none of 2 rows");
    }

    #[test]
    fn test_load_replaces_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"msg\": \"caf\xff\"}\n").unwrap();
        let log = LogFile::load(file.path(), &[]).unwrap();
        assert_eq!(log.rows()[0][0], "caf\u{fffd}");

        let missing = LogFile::load(Path::new("/nonexistent/log.json"), &[]);
        assert!(matches!(missing, Err(LoadError::Io { .. })));
    }
}
