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

//! Value types shared by the structure matching components.
//!
//! Everything here is plain data: entries, cells, links and wildcards are
//! cloned and replaced as a whole by the managers, never shared.

use serde::{Deserialize, Serialize};

/// Data type of a log column as inferred by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HeaderType {
    #[default]
    String,
    Number,
}

/// A log column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: HeaderType,
}

impl Header {
    pub fn new(name: impl Into<String>, kind: HeaderType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// How a column takes part in structure matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Timestamp-like column, ignored by default but selectable.
    Unselected,
    /// Column produced by a coloring rule. It is not part of the raw log
    /// text and can never participate in matching.
    Custom,
    /// Regular content column, included by default.
    Selected,
}

impl ColumnType {
    /// Default inclusion flag for a fresh cell of this column.
    pub const fn selected_by_default(self) -> bool {
        matches!(self, Self::Selected)
    }

    /// Whether the column exists in the serialized log text.
    pub const fn in_corpus(self) -> bool {
        !matches!(self, Self::Custom)
    }
}

/// Allowed row distance between an entry's row and its successor's row.
///
/// Distances count rows, so adjacent rows are one apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkDistance {
    /// Any number of rows may lie in between.
    #[default]
    Any,
    /// The successor is exactly `n` rows further down.
    Exactly(usize),
    /// The successor is at most `n` rows further down.
    AtMost(usize),
}

impl LinkDistance {
    /// Next state of the link toggle: any, adjacent, bounded, back to any.
    pub const fn cycled(self, bounded_gap: usize) -> Self {
        match self {
            Self::Any => Self::Exactly(1),
            Self::Exactly(_) => Self::AtMost(bounded_gap),
            Self::AtMost(_) => Self::Any,
        }
    }

    pub const fn is_valid(self) -> bool {
        match self {
            Self::Any => true,
            Self::Exactly(n) | Self::AtMost(n) => n >= 1,
        }
    }
}

/// One segment of a structure cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellContent {
    /// Literal text copied from the log row.
    Text(String),
    /// Placeholder for wildcard `wildcard`; `original` is the text it replaced.
    Wildcard { wildcard: usize, original: String },
}

impl CellContent {
    /// Text as shown in the structure table. Wildcards render as `?1`, `?2`, ...
    pub fn rendered(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Wildcard { wildcard, .. } => format!("?{}", wildcard + 1),
        }
    }

    pub const fn wildcard(&self) -> Option<usize> {
        match self {
            Self::Text(_) => None,
            Self::Wildcard { wildcard, .. } => Some(*wildcard),
        }
    }
}

/// A structure cell: the segments a cell's text has been split into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureCell {
    pub contents: Vec<CellContent>,
}

impl StructureCell {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            contents: vec![CellContent::Text(text.into())],
        }
    }

    /// Concatenated rendered text of all segments.
    pub fn rendered(&self) -> String {
        self.contents.iter().map(CellContent::rendered).collect()
    }

    /// The cell's text with every wildcard replaced by what it stands for.
    pub fn original(&self) -> String {
        self.contents
            .iter()
            .map(|content| match content {
                CellContent::Text(text) | CellContent::Wildcard { original: text, .. } => {
                    text.as_str()
                }
            })
            .collect()
    }

    pub fn has_wildcards(&self) -> bool {
        self.contents.iter().any(|c| c.wildcard().is_some())
    }
}

/// One selected log row lifted into the structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureEntry {
    /// The row as it was selected, used to recognise rows already present.
    pub source: Vec<String>,
    pub row: Vec<StructureCell>,
    pub cell_selection: Vec<bool>,
    /// Constraint towards the next entry. Always `None` on the last entry.
    pub structure_link: Option<LinkDistance>,
}

impl StructureEntry {
    pub fn new(source: Vec<String>, column_types: &[ColumnType]) -> Self {
        let row = source.iter().map(StructureCell::from_text).collect();
        let cell_selection = (0..source.len())
            .map(|i| column_types.get(i).is_some_and(|t| t.selected_by_default()))
            .collect();
        Self {
            source,
            row,
            cell_selection,
            structure_link: Some(LinkDistance::Any),
        }
    }
}

/// Location of one wildcard occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WildcardSubstitution {
    pub entry_index: usize,
    pub cell_index: usize,
    pub contents_index: usize,
}

impl WildcardSubstitution {
    pub const fn new(entry_index: usize, cell_index: usize, contents_index: usize) -> Self {
        Self {
            entry_index,
            cell_index,
            contents_index,
        }
    }

    pub const fn is_in_cell(&self, entry_index: usize, cell_index: usize) -> bool {
        self.entry_index == entry_index && self.cell_index == cell_index
    }
}

/// A placeholder that must capture the same text at all of its occurrences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Wildcard {
    pub substitutions: Vec<WildcardSubstitution>,
}

/// A text selection inside one cell segment, already resolved by the UI.
///
/// Offsets are character offsets into the rendered text of segment
/// `contents_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSelection {
    pub entry_index: usize,
    pub cell_index: usize,
    pub contents_index: usize,
    pub start: usize,
    pub end: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_cycle() {
        let link = LinkDistance::default();
        assert_eq!(link, LinkDistance::Any);
        let link = link.cycled(5);
        assert_eq!(link, LinkDistance::Exactly(1));
        let link = link.cycled(5);
        assert_eq!(link, LinkDistance::AtMost(5));
        assert_eq!(link.cycled(5), LinkDistance::Any);
    }

    #[test]
    fn test_zero_distance_is_invalid() {
        assert!(!LinkDistance::Exactly(0).is_valid());
        assert!(!LinkDistance::AtMost(0).is_valid());
        assert!(LinkDistance::AtMost(3).is_valid());
    }

    #[test]
    fn test_cell_rendering() {
        let cell = StructureCell {
            contents: vec![
                CellContent::Text("id=".to_string()),
                CellContent::Wildcard {
                    wildcard: 1,
                    original: "42".to_string(),
                },
            ],
        };
        assert_eq!(cell.rendered(), "id=?2");
        assert_eq!(cell.original(), "id=42");
        assert!(cell.has_wildcards());
    }

    #[test]
    fn test_entry_defaults_follow_column_types() {
        let types = [ColumnType::Unselected, ColumnType::Selected, ColumnType::Custom];
        let entry = StructureEntry::new(
            vec!["10:00".to_string(), "GET".to_string(), "red".to_string()],
            &types,
        );
        assert_eq!(entry.cell_selection, vec![false, true, false]);
        assert_eq!(entry.structure_link, Some(LinkDistance::Any));
    }

    #[test]
    fn test_header_serde_uses_type_field() {
        let header: Header = serde_json::from_str(r#"{"name":"level","type":"number"}"#).unwrap();
        assert_eq!(header, Header::new("level", HeaderType::Number));
    }
}
