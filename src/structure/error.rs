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

//! Error type for the structure matching core.
//!
//! Invalid text selections are not errors (they are ignored), and neither are
//! an emptied structure or a search without results. What remains is
//! malformed input, which fails fast, and broken internal invariants.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureError {
    /// An entry, cell, segment or wildcard index does not exist.
    #[error("{what} index {index} out of range (length {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// A row does not have one cell per header.
    #[error("Row {row} has {found} cells, expected {expected}")]
    MismatchedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// The column classification does not cover the header list.
    #[error("Got {types} column types for {headers} headers")]
    ColumnTypeMismatch { headers: usize, types: usize },

    /// A link distance of zero rows.
    #[error("Invalid link distance {0:?}: distances count rows and start at 1")]
    InvalidDistance(crate::structure::LinkDistance),

    /// A cell references a wildcard occurrence that the wildcard list does
    /// not know about, or the other way round.
    #[error(
        "Inconsistent wildcard ?{} at entry {entry_index}, cell {cell_index}, segment {contents_index}",
        .wildcard + 1
    )]
    OrphanWildcard {
        wildcard: usize,
        entry_index: usize,
        cell_index: usize,
        contents_index: usize,
    },

    /// A wildcard without any occurrence survived an edit.
    #[error("Wildcard ?{} has no occurrences left", .0 + 1)]
    EmptyWildcard(usize),

    /// The generated pattern was rejected by the regex engine.
    #[error("Failed to compile structure query: {0}")]
    InvalidQuery(Box<fancy_regex::Error>),

    #[error("Failed to serialize log row: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StructureError {
    pub(crate) const fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { what, index, len }
    }
}

pub type Result<T> = std::result::Result<T, StructureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_errors_use_display_numbers() {
        let err = StructureError::OrphanWildcard {
            wildcard: 0,
            entry_index: 1,
            cell_index: 2,
            contents_index: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("?1"));
        assert!(msg.contains("entry 1"));
        assert!(msg.contains("segment 3"));

        assert_eq!(
            StructureError::EmptyWildcard(2).to_string(),
            "Wildcard ?3 has no occurrences left"
        );
    }

    #[test]
    fn test_out_of_range_display() {
        let err = StructureError::out_of_range("entry", 4, 2);
        assert_eq!(err.to_string(), "entry index 4 out of range (length 2)");
    }
}
