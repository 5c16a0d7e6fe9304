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

//! Wildcard bookkeeping.
//!
//! A wildcard is a list of substitutions, each naming the cell segment that
//! holds one occurrence of it. The functions here keep that list in step with
//! the cell segments when segments are split or merged. Reconciling the
//! structure entries after a wildcard disappears is up to
//! [`entries`](crate::structure::entries).

use crate::structure::error::{Result, StructureError};
use crate::structure::types::{CellContent, StructureCell, Wildcard, WildcardSubstitution};

/// Allocate a wildcard with a single occurrence.
pub fn create_wildcard(entry_index: usize, cell_index: usize, contents_index: usize) -> Wildcard {
    Wildcard {
        substitutions: vec![WildcardSubstitution::new(
            entry_index,
            cell_index,
            contents_index,
        )],
    }
}

/// Result of splitting a text segment around a new wildcard occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellInsertion {
    pub contents: Vec<CellContent>,
    /// Segment index of the inserted wildcard.
    pub inserted_index: usize,
    /// How many segments the cell grew by (0, 1 or 2).
    pub added_segments: usize,
}

/// Result of turning a wildcard segment back into text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRemoval {
    pub contents: Vec<CellContent>,
    /// How many segments the cell shrank by (0, 1 or 2).
    pub removed_segments: usize,
}

/// Byte index of the `chars`-th character, or `None` past the end.
fn byte_offset(text: &str, chars: usize) -> Option<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .nth(chars)
}

/// Map a selection over a cell's whole rendered text onto one segment.
///
/// Returns `(contents_index, start, end)` with offsets relative to that
/// segment, or `None` when the selection is empty or crosses a segment
/// boundary.
pub fn resolve_cell_offsets(
    cell: &StructureCell,
    start: usize,
    end: usize,
) -> Option<(usize, usize, usize)> {
    if start >= end {
        return None;
    }
    let mut segment_start = 0;
    for (index, content) in cell.contents.iter().enumerate() {
        let segment_end = segment_start + content.rendered().chars().count();
        if start >= segment_start && end <= segment_end {
            return Some((index, start - segment_start, end - segment_start));
        }
        if start < segment_end {
            return None;
        }
        segment_start = segment_end;
    }
    None
}

/// Replace `start..end` (character offsets) of text segment `contents_index`
/// with an occurrence of `wildcard`.
///
/// Returns `None` when the selection is empty, out of bounds, or lies on an
/// existing wildcard.
pub fn insert_substitution_into_cell(
    cell: &StructureCell,
    wildcard: usize,
    contents_index: usize,
    start: usize,
    end: usize,
) -> Option<CellInsertion> {
    let CellContent::Text(text) = cell.contents.get(contents_index)? else {
        return None;
    };
    if start >= end {
        return None;
    }
    let start_byte = byte_offset(text, start)?;
    let end_byte = byte_offset(text, end)?;

    let before = &text[..start_byte];
    let selected = &text[start_byte..end_byte];
    let after = &text[end_byte..];

    let mut contents = Vec::with_capacity(cell.contents.len() + 2);
    contents.extend_from_slice(&cell.contents[..contents_index]);
    if !before.is_empty() {
        contents.push(CellContent::Text(before.to_string()));
    }
    let inserted_index = contents.len();
    contents.push(CellContent::Wildcard {
        wildcard,
        original: selected.to_string(),
    });
    if !after.is_empty() {
        contents.push(CellContent::Text(after.to_string()));
    }
    contents.extend_from_slice(&cell.contents[contents_index + 1..]);

    let added_segments = contents.len() - cell.contents.len();
    Some(CellInsertion {
        contents,
        inserted_index,
        added_segments,
    })
}

/// Turn wildcard segment `contents_index` back into its original text,
/// merging it with neighbouring text segments.
pub fn remove_wildcard_from_cell(
    cell: &StructureCell,
    contents_index: usize,
) -> Option<CellRemoval> {
    let CellContent::Wildcard { original, .. } = cell.contents.get(contents_index)? else {
        return None;
    };

    let mut first = contents_index;
    let mut last = contents_index;
    let mut text = original.clone();
    if let Some(CellContent::Text(prev)) = contents_index
        .checked_sub(1)
        .and_then(|i| cell.contents.get(i))
    {
        text.insert_str(0, prev);
        first -= 1;
    }
    if let Some(CellContent::Text(next)) = cell.contents.get(contents_index + 1) {
        text.push_str(next);
        last += 1;
    }

    let mut contents = Vec::with_capacity(cell.contents.len());
    contents.extend_from_slice(&cell.contents[..first]);
    contents.push(CellContent::Text(text));
    contents.extend_from_slice(&cell.contents[last + 1..]);

    Some(CellRemoval {
        removed_segments: last - first,
        contents,
    })
}

/// Move the segment index of every occurrence in cell
/// (`entry_index`, `cell_index`) that lies after `after` by `delta`.
pub fn shift_substitutions(
    wildcards: &mut [Wildcard],
    entry_index: usize,
    cell_index: usize,
    after: usize,
    delta: isize,
) {
    for substitution in wildcards.iter_mut().flat_map(|w| w.substitutions.iter_mut()) {
        if substitution.is_in_cell(entry_index, cell_index) && substitution.contents_index > after
        {
            substitution.contents_index = substitution.contents_index.saturating_add_signed(delta);
        }
    }
}

/// Append another occurrence of an existing wildcard.
pub fn add_substitution(
    mut wildcards: Vec<Wildcard>,
    wildcard: usize,
    substitution: WildcardSubstitution,
) -> Result<Vec<Wildcard>> {
    let len = wildcards.len();
    wildcards
        .get_mut(wildcard)
        .ok_or_else(|| StructureError::out_of_range("wildcard", wildcard, len))?
        .substitutions
        .push(substitution);
    Ok(wildcards)
}

/// Wildcards after removing one occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionRemoval {
    pub wildcards: Vec<Wildcard>,
    /// The wildcard lost its last occurrence and was dropped from the list.
    pub deleted: bool,
}

/// Remove one occurrence of `wildcard`, deleting the wildcard once no
/// occurrence is left.
pub fn remove_substitution(
    mut wildcards: Vec<Wildcard>,
    wildcard: usize,
    substitution: WildcardSubstitution,
) -> Result<SubstitutionRemoval> {
    let len = wildcards.len();
    let target = wildcards
        .get_mut(wildcard)
        .ok_or_else(|| StructureError::out_of_range("wildcard", wildcard, len))?;
    let position = target
        .substitutions
        .iter()
        .position(|s| *s == substitution)
        .ok_or(StructureError::OrphanWildcard {
            wildcard,
            entry_index: substitution.entry_index,
            cell_index: substitution.cell_index,
            contents_index: substitution.contents_index,
        })?;
    target.substitutions.remove(position);

    let deleted = target.substitutions.is_empty();
    if deleted {
        wildcards.remove(wildcard);
        tracing::debug!("Wildcard ?{} lost its last occurrence", wildcard + 1);
    }
    Ok(SubstitutionRemoval { wildcards, deleted })
}

/// Wildcards after an entry was removed from the structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySubstitutionRemoval {
    pub wildcards: Vec<Wildcard>,
    /// Indices (before removal, ascending) of wildcards that were deleted.
    pub deleted: Vec<usize>,
}

/// Drop every occurrence located in entry `entry_index` and move the
/// occurrences of later entries up by one.
pub fn remove_substitutions_for_entry(
    wildcards: Vec<Wildcard>,
    entry_index: usize,
) -> EntrySubstitutionRemoval {
    let mut deleted = Vec::new();
    let mut remaining = Vec::with_capacity(wildcards.len());

    for (index, mut wildcard) in wildcards.into_iter().enumerate() {
        wildcard
            .substitutions
            .retain(|s| s.entry_index != entry_index);
        if wildcard.substitutions.is_empty() {
            deleted.push(index);
            continue;
        }
        for substitution in &mut wildcard.substitutions {
            if substitution.entry_index > entry_index {
                substitution.entry_index -= 1;
            }
        }
        remaining.push(wildcard);
    }

    EntrySubstitutionRemoval {
        wildcards: remaining,
        deleted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellContent {
        CellContent::Text(s.to_string())
    }

    fn wild(wildcard: usize, original: &str) -> CellContent {
        CellContent::Wildcard {
            wildcard,
            original: original.to_string(),
        }
    }

    #[test]
    fn test_insert_in_middle_splits_into_three() {
        let cell = StructureCell::from_text("id=GET");
        let insertion = insert_substitution_into_cell(&cell, 0, 0, 3, 6).unwrap();
        assert_eq!(insertion.contents, vec![text("id="), wild(0, "GET")]);
        assert_eq!(insertion.inserted_index, 1);
        assert_eq!(insertion.added_segments, 1);

        let cell = StructureCell::from_text("a/b/c");
        let insertion = insert_substitution_into_cell(&cell, 2, 0, 2, 3).unwrap();
        assert_eq!(insertion.contents, vec![text("a/"), wild(2, "b"), text("/c")]);
        assert_eq!(insertion.added_segments, 2);
    }

    #[test]
    fn test_insert_whole_segment() {
        let cell = StructureCell::from_text("GET");
        let insertion = insert_substitution_into_cell(&cell, 0, 0, 0, 3).unwrap();
        assert_eq!(insertion.contents, vec![wild(0, "GET")]);
        assert_eq!(insertion.inserted_index, 0);
        assert_eq!(insertion.added_segments, 0);
    }

    #[test]
    fn test_insert_uses_character_offsets() {
        let cell = StructureCell::from_text("grüße welt");
        let insertion = insert_substitution_into_cell(&cell, 0, 0, 2, 5).unwrap();
        assert_eq!(insertion.contents[1], wild(0, "üße"));
    }

    #[test]
    fn test_invalid_selections_are_ignored() {
        let cell = StructureCell {
            contents: vec![text("a="), wild(0, "1")],
        };
        assert!(insert_substitution_into_cell(&cell, 1, 0, 1, 1).is_none());
        assert!(insert_substitution_into_cell(&cell, 1, 0, 1, 9).is_none());
        assert!(insert_substitution_into_cell(&cell, 1, 1, 0, 1).is_none());
        assert!(insert_substitution_into_cell(&cell, 1, 5, 0, 1).is_none());
    }

    #[test]
    fn test_resolve_offsets_against_rendered_text() {
        // Rendered as "a=?1;b"
        let cell = StructureCell {
            contents: vec![text("a="), wild(0, "xyz"), text(";b")],
        };
        assert_eq!(resolve_cell_offsets(&cell, 0, 1), Some((0, 0, 1)));
        assert_eq!(resolve_cell_offsets(&cell, 4, 6), Some((2, 0, 2)));
        assert_eq!(resolve_cell_offsets(&cell, 1, 5), None);
        assert_eq!(resolve_cell_offsets(&cell, 3, 3), None);
    }

    #[test]
    fn test_remove_wildcard_merges_neighbours() {
        let cell = StructureCell {
            contents: vec![text("a/"), wild(0, "b"), text("/c")],
        };
        let removal = remove_wildcard_from_cell(&cell, 1).unwrap();
        assert_eq!(removal.contents, vec![text("a/b/c")]);
        assert_eq!(removal.removed_segments, 2);

        let cell = StructureCell {
            contents: vec![wild(0, "x"), wild(1, "y")],
        };
        let removal = remove_wildcard_from_cell(&cell, 1).unwrap();
        assert_eq!(removal.contents, vec![wild(0, "x"), text("y")]);
        assert_eq!(removal.removed_segments, 0);
        assert!(remove_wildcard_from_cell(&cell, 5).is_none());
    }

    #[test]
    fn test_remove_last_substitution_deletes_wildcard() {
        let wildcards = vec![create_wildcard(0, 1, 0), create_wildcard(1, 1, 0)];
        let removal =
            remove_substitution(wildcards, 0, WildcardSubstitution::new(0, 1, 0)).unwrap();
        assert!(removal.deleted);
        assert_eq!(removal.wildcards, vec![create_wildcard(1, 1, 0)]);
    }

    #[test]
    fn test_remove_substitution_keeps_order() {
        let mut wildcard = create_wildcard(0, 0, 0);
        wildcard.substitutions.push(WildcardSubstitution::new(1, 0, 0));
        wildcard.substitutions.push(WildcardSubstitution::new(2, 0, 1));
        let removal =
            remove_substitution(vec![wildcard], 0, WildcardSubstitution::new(1, 0, 0)).unwrap();
        assert!(!removal.deleted);
        assert_eq!(
            removal.wildcards[0].substitutions,
            vec![
                WildcardSubstitution::new(0, 0, 0),
                WildcardSubstitution::new(2, 0, 1)
            ]
        );
    }

    #[test]
    fn test_remove_unknown_substitution_is_an_error() {
        let result = remove_substitution(
            vec![create_wildcard(0, 0, 0)],
            0,
            WildcardSubstitution::new(3, 0, 0),
        );
        assert!(matches!(result, Err(StructureError::OrphanWildcard { .. })));
        assert!(add_substitution(Vec::new(), 0, WildcardSubstitution::new(0, 0, 0)).is_err());
    }

    #[test]
    fn test_remove_substitutions_for_entry() {
        let mut shared = create_wildcard(0, 0, 0);
        shared.substitutions.push(WildcardSubstitution::new(2, 0, 1));
        let only_in_entry_one = create_wildcard(1, 2, 0);
        let removal = remove_substitutions_for_entry(vec![shared, only_in_entry_one], 1);
        assert_eq!(removal.deleted, vec![1]);
        assert_eq!(
            removal.wildcards[0].substitutions,
            vec![
                WildcardSubstitution::new(0, 0, 0),
                WildcardSubstitution::new(1, 0, 1)
            ]
        );
    }

    #[test]
    fn test_shift_substitutions_only_touches_cell() {
        let mut wildcards = vec![create_wildcard(0, 0, 2), create_wildcard(0, 1, 2)];
        wildcards[0].substitutions.push(WildcardSubstitution::new(0, 0, 0));
        shift_substitutions(&mut wildcards, 0, 0, 1, 2);
        assert_eq!(wildcards[0].substitutions[0].contents_index, 4);
        assert_eq!(wildcards[0].substitutions[1].contents_index, 0);
        assert_eq!(wildcards[1].substitutions[0].contents_index, 2);
    }
}
