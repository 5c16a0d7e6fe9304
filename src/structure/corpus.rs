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

//! Line-delimited JSON serialization of the log, the text structure queries
//! run against.
//!
//! Every row becomes one JSON object on its own line, keyed by header name in
//! header order. Custom (rule) columns are left out since they are not part
//! of the raw log. The [`RowIndex`] records where each row's line starts.

use crate::structure::error::{Result, StructureError};
use crate::structure::types::{ColumnType, Header};

/// JSON string literal for `text`, including the quotes.
pub(crate) fn json_string(text: &str) -> Result<String> {
    Ok(serde_json::to_string(text)?)
}

/// Byte offsets at which each row starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowIndex {
    starts: Vec<usize>,
    text_len: usize,
}

impl RowIndex {
    /// Index the rows of newline-terminated `text`.
    pub fn from_text(text: &str) -> Self {
        let mut starts = Vec::new();
        let mut offset = 0;
        for line in text.split_inclusive('\n') {
            starts.push(offset);
            offset += line.len();
        }
        Self {
            starts,
            text_len: text.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Byte offset at which `row` starts.
    pub fn row_start(&self, row: usize) -> Option<usize> {
        self.starts.get(row).copied()
    }

    /// Byte offset just past `row` (the start of the next row).
    pub fn row_end(&self, row: usize) -> usize {
        self.starts.get(row + 1).copied().unwrap_or(self.text_len)
    }
}

/// The searchable text of a log plus its row index.
#[derive(Debug, Clone, Default)]
pub struct LogCorpus {
    text: String,
    rows: RowIndex,
}

impl LogCorpus {
    /// Serialize `rows`, one JSON object per line.
    ///
    /// Fails if the column types do not cover the headers or a row does not
    /// have one cell per header.
    pub fn build(
        headers: &[Header],
        column_types: &[ColumnType],
        rows: &[Vec<String>],
    ) -> Result<Self> {
        profiling::scope!("LogCorpus::build");
        if headers.len() != column_types.len() {
            return Err(StructureError::ColumnTypeMismatch {
                headers: headers.len(),
                types: column_types.len(),
            });
        }

        let keys = headers
            .iter()
            .zip(column_types)
            .map(|(header, column_type)| {
                column_type
                    .in_corpus()
                    .then(|| json_string(&header.name))
                    .transpose()
            })
            .collect::<Result<Vec<_>>>()?;

        let mut text = String::new();
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(StructureError::MismatchedRow {
                    row: row_index,
                    expected: headers.len(),
                    found: row.len(),
                });
            }
            text.push('{');
            let mut first = true;
            for (key, value) in keys.iter().zip(row) {
                let Some(key) = key else {
                    continue;
                };
                if !first {
                    text.push(',');
                }
                first = false;
                text.push_str(key);
                text.push(':');
                text.push_str(&json_string(value)?);
            }
            text.push_str("}\n");
        }

        tracing::debug!(
            "Serialized {} rows into {} bytes of structure corpus",
            rows.len(),
            text.len()
        );
        Ok(Self::from_text(text))
    }

    /// Wrap text that is already serialized one row per line.
    pub fn from_text(text: String) -> Self {
        let rows = RowIndex::from_text(&text);
        Self { text, rows }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub const fn rows(&self) -> &RowIndex {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Serialized `row` without its line terminator.
    pub fn line(&self, row: usize) -> Option<&str> {
        let start = self.rows.row_start(row)?;
        let line = self.text.get(start..self.rows.row_end(row))?;
        Some(line.strip_suffix('\n').unwrap_or(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::types::HeaderType;

    fn headers() -> Vec<Header> {
        vec![
            Header::new("time", HeaderType::String),
            Header::new("msg", HeaderType::String),
            Header::new("rule", HeaderType::String),
        ]
    }

    const TYPES: [ColumnType; 3] = [
        ColumnType::Unselected,
        ColumnType::Selected,
        ColumnType::Custom,
    ];

    #[test]
    fn test_build_skips_custom_columns_and_escapes() {
        let rows = vec![
            vec!["1".to_string(), "say \"hi\"".to_string(), "red".to_string()],
            vec!["2".to_string(), "a\nb".to_string(), String::new()],
        ];
        let corpus = LogCorpus::build(&headers(), &TYPES, &rows).unwrap();
        assert_eq!(
            corpus.text(),
            "{\"time\":\"1\",\"msg\":\"say \\\"hi\\\"\"}\n{\"time\":\"2\",\"msg\":\"a\\nb\"}\n"
        );
        assert_eq!(corpus.row_count(), 2);
    }

    #[test]
    fn test_build_rejects_malformed_input() {
        let short_row = vec![vec!["1".to_string()]];
        assert!(matches!(
            LogCorpus::build(&headers(), &TYPES, &short_row),
            Err(StructureError::MismatchedRow {
                row: 0,
                expected: 3,
                found: 1
            })
        ));
        assert!(matches!(
            LogCorpus::build(&headers(), &TYPES[..2], &[]),
            Err(StructureError::ColumnTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_lines_without_terminator() {
        let corpus = LogCorpus::from_text("ab\ncde\n\nf\n".to_string());
        assert_eq!(corpus.line(0), Some("ab"));
        assert_eq!(corpus.line(2), Some(""));
        assert_eq!(corpus.line(3), Some("f"));
        assert_eq!(corpus.line(4), None);
    }

    #[test]
    fn test_row_index_maps_offsets() {
        let index = RowIndex::from_text("ab\ncde\n\nf\n");
        assert_eq!(index.len(), 4);
        assert_eq!(index.row_start(0), Some(0));
        assert_eq!(index.row_start(1), Some(3));
        assert_eq!(index.row_start(3), Some(8));
        assert_eq!(index.row_start(4), None);
        assert_eq!(index.row_end(1), 7);
        assert_eq!(index.row_end(3), 10);
    }
}
