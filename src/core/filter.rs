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

//! Row filtering for the log view.
//!
//! A plain substring search either in one column or across the whole row,
//! computed in parallel over all rows.

use rayon::prelude::*;

use crate::structure::Header;

/// Column name that selects whole-row search.
pub const ALL_COLUMNS: &str = "All";

/// Where a filter looks for its text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FilterColumn {
    #[default]
    All,
    Index(usize),
}

impl FilterColumn {
    /// Resolve a column name. Unknown names search the whole row.
    pub fn resolve(headers: &[Header], name: &str) -> Self {
        if name == ALL_COLUMNS {
            return Self::All;
        }
        headers
            .iter()
            .position(|h| h.name == name)
            .map_or_else(
                || {
                    tracing::warn!("Unknown filter column {name:?}, searching all columns");
                    Self::All
                },
                Self::Index,
            )
    }
}

/// Indices of the rows containing `needle`, ascending.
pub fn find_indices(rows: &[Vec<String>], column: &FilterColumn, needle: &str) -> Vec<usize> {
    profiling::scope!("find_indices");
    if needle.is_empty() {
        return (0..rows.len()).collect();
    }
    let indices: Vec<usize> = rows
        .par_iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let hit = match column {
                FilterColumn::All => row.join(" ").contains(needle),
                FilterColumn::Index(col) => row.get(*col).is_some_and(|cell| cell.contains(needle)),
            };
            hit.then_some(index)
        })
        .collect();
    tracing::debug!("Filter {needle:?} kept {} of {} rows", indices.len(), rows.len());
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::HeaderType;

    fn rows() -> Vec<Vec<String>> {
        [["a", "GET /x"], ["b", "POST /y"], ["GET", "PUT /z"]]
            .iter()
            .map(|r| r.iter().map(ToString::to_string).collect())
            .collect()
    }

    fn headers() -> Vec<Header> {
        vec![
            Header::new("id", HeaderType::String),
            Header::new("msg", HeaderType::String),
        ]
    }

    #[test]
    fn test_resolve_column() {
        assert_eq!(FilterColumn::resolve(&headers(), "All"), FilterColumn::All);
        assert_eq!(FilterColumn::resolve(&headers(), "msg"), FilterColumn::Index(1));
        assert_eq!(FilterColumn::resolve(&headers(), "nope"), FilterColumn::All);
    }

    #[test]
    fn test_find_in_column() {
        assert_eq!(find_indices(&rows(), &FilterColumn::Index(1), "GET"), vec![0]);
        assert_eq!(find_indices(&rows(), &FilterColumn::Index(7), "GET"), Vec::<usize>::new());
    }

    #[test]
    fn test_find_in_all_columns() {
        assert_eq!(find_indices(&rows(), &FilterColumn::All, "GET"), vec![0, 2]);
        // Cells are joined by a space.
        assert_eq!(find_indices(&rows(), &FilterColumn::All, "b POST"), vec![1]);
    }

    #[test]
    fn test_empty_needle_keeps_everything() {
        assert_eq!(find_indices(&rows(), &FilterColumn::All, ""), vec![0, 1, 2]);
    }
}
