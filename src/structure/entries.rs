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

//! Structure entry management.
//!
//! Entries are edited as owned values: each function takes the current
//! entries (and wildcards, where they are affected) and hands back the edited
//! copies. Any edit that touches wildcard occurrences repairs both sides
//! before returning, so [`check_consistency`] holds between calls.

use crate::structure::error::{Result, StructureError};
use crate::structure::types::{
    CellContent, CellSelection, ColumnType, LinkDistance, StructureEntry, Wildcard,
    WildcardSubstitution,
};
use crate::structure::wildcard;

/// Entries and wildcards after an edit that touched both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureEdit {
    pub entries: Vec<StructureEntry>,
    pub wildcards: Vec<Wildcard>,
}

/// Outcome of removing an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRemoval {
    Remaining(StructureEdit),
    /// The removed entry was the last one; the structure is gone.
    LastEntryRemoved,
}

/// Lift the selected rows into structure entries, in selection order.
pub fn build_entries(column_types: &[ColumnType], rows: &[Vec<String>]) -> Vec<StructureEntry> {
    let entries = rows
        .iter()
        .map(|row| StructureEntry::new(row.clone(), column_types))
        .collect();
    remove_last_link(entries)
}

/// The last entry has no successor and therefore no link.
pub fn remove_last_link(mut entries: Vec<StructureEntry>) -> Vec<StructureEntry> {
    if let Some(last) = entries.last_mut() {
        last.structure_link = None;
    }
    entries
}

/// Append entries for newly selected rows, skipping rows already present.
pub fn append_new_entries(
    mut existing: Vec<StructureEntry>,
    incoming: Vec<StructureEntry>,
) -> Vec<StructureEntry> {
    let before = existing.len();
    for entry in incoming {
        if existing.iter().any(|e| e.source == entry.source) {
            continue;
        }
        if let Some(last) = existing.last_mut() {
            last.structure_link.get_or_insert(LinkDistance::Any);
        }
        existing.push(entry);
    }
    tracing::debug!(
        "Appended {} new structure entries ({} total)",
        existing.len() - before,
        existing.len()
    );
    remove_last_link(existing)
}

/// Rename wildcard references after the wildcards at `deleted` (indices into
/// the old list) were dropped.
pub fn renumber_wildcards(entries: &mut [StructureEntry], deleted: &[usize]) {
    if deleted.is_empty() {
        return;
    }
    let segments = entries
        .iter_mut()
        .flat_map(|e| e.row.iter_mut())
        .flat_map(|c| c.contents.iter_mut());
    for content in segments {
        if let CellContent::Wildcard { wildcard, .. } = content {
            let shift = deleted.iter().filter(|&&d| d < *wildcard).count();
            *wildcard -= shift;
        }
    }
}

/// Remove entry `index` together with its wildcard occurrences.
pub fn remove_entry(
    mut entries: Vec<StructureEntry>,
    wildcards: Vec<Wildcard>,
    index: usize,
) -> Result<EntryRemoval> {
    if index >= entries.len() {
        return Err(StructureError::out_of_range("entry", index, entries.len()));
    }
    let removal = wildcard::remove_substitutions_for_entry(wildcards, index);
    entries.remove(index);
    if entries.is_empty() {
        tracing::debug!("Removed the last structure entry");
        return Ok(EntryRemoval::LastEntryRemoved);
    }
    renumber_wildcards(&mut entries, &removal.deleted);

    Ok(EntryRemoval::Remaining(StructureEdit {
        entries: remove_last_link(entries),
        wildcards: removal.wildcards,
    }))
}

fn check_cell(entries: &[StructureEntry], entry_index: usize, cell_index: usize) -> Result<()> {
    let entry = entries
        .get(entry_index)
        .ok_or_else(|| StructureError::out_of_range("entry", entry_index, entries.len()))?;
    if cell_index >= entry.row.len() {
        return Err(StructureError::out_of_range(
            "cell",
            cell_index,
            entry.row.len(),
        ));
    }
    Ok(())
}

/// Include or exclude one cell from matching.
///
/// In exclusive mode the target becomes the only selected cell of its row,
/// unless it already is, in which case every cell is selected again. Cells of
/// custom columns stay unselected.
pub fn toggle_cell_selection(
    column_types: &[ColumnType],
    mut entries: Vec<StructureEntry>,
    entry_index: usize,
    cell_index: usize,
    exclusive: bool,
) -> Result<Vec<StructureEntry>> {
    check_cell(&entries, entry_index, cell_index)?;
    let selectable = |i: usize| column_types.get(i).is_some_and(|t| t.in_corpus());
    if !selectable(cell_index) {
        tracing::debug!("Ignoring selection toggle on custom column {cell_index}");
        return Ok(entries);
    }

    let selection = &mut entries[entry_index].cell_selection;
    if exclusive {
        let is_sole_selected = selection
            .iter()
            .enumerate()
            .all(|(i, &selected)| selected == (i == cell_index) || !selectable(i));
        for (i, selected) in selection.iter_mut().enumerate() {
            *selected = selectable(i) && (is_sole_selected || i == cell_index);
        }
    } else {
        selection[cell_index] = !selection[cell_index];
    }
    Ok(entries)
}

fn check_link(entries: &[StructureEntry], entry_index: usize) -> Result<()> {
    // Only entries with a successor carry a link.
    let links = entries.len().saturating_sub(1);
    if entry_index >= links {
        return Err(StructureError::out_of_range("link", entry_index, links));
    }
    Ok(())
}

/// Cycle the link between entry `entry_index` and its successor.
pub fn toggle_link(
    mut entries: Vec<StructureEntry>,
    entry_index: usize,
    bounded_gap: usize,
) -> Result<Vec<StructureEntry>> {
    check_link(&entries, entry_index)?;
    let entry = &mut entries[entry_index];
    let link = entry.structure_link.unwrap_or_default().cycled(bounded_gap);
    entry.structure_link = Some(link);
    Ok(entries)
}

/// Set the link between entry `entry_index` and its successor.
pub fn set_link(
    mut entries: Vec<StructureEntry>,
    entry_index: usize,
    distance: LinkDistance,
) -> Result<Vec<StructureEntry>> {
    check_link(&entries, entry_index)?;
    if !distance.is_valid() {
        return Err(StructureError::InvalidDistance(distance));
    }
    entries[entry_index].structure_link = Some(distance);
    Ok(entries)
}

/// Turn `start..end` over the rendered text of a cell (wildcards shown as
/// `?N`) into a selection within one segment.
///
/// Returns `None` when the range is empty or crosses a segment boundary.
pub fn select_rendered_text(
    entries: &[StructureEntry],
    entry_index: usize,
    cell_index: usize,
    start: usize,
    end: usize,
) -> Result<Option<CellSelection>> {
    check_cell(entries, entry_index, cell_index)?;
    let cell = &entries[entry_index].row[cell_index];
    Ok(
        wildcard::resolve_cell_offsets(cell, start, end).map(|(contents_index, start, end)| {
            CellSelection {
                entry_index,
                cell_index,
                contents_index,
                start,
                end,
            }
        }),
    )
}

/// Put an occurrence of `wildcard` over `selection`. Existing wildcards must
/// already be in `wildcards`; a new one is pushed by the caller beforehand.
fn insert_occurrence(
    mut entries: Vec<StructureEntry>,
    mut wildcards: Vec<Wildcard>,
    wildcard_index: usize,
    selection: CellSelection,
    is_new: bool,
) -> Result<Option<StructureEdit>> {
    let CellSelection {
        entry_index,
        cell_index,
        contents_index,
        start,
        end,
    } = selection;
    check_cell(&entries, entry_index, cell_index)?;

    let cell = &entries[entry_index].row[cell_index];
    let Some(insertion) =
        wildcard::insert_substitution_into_cell(cell, wildcard_index, contents_index, start, end)
    else {
        tracing::debug!("Ignoring invalid wildcard selection {selection:?}");
        return Ok(None);
    };

    wildcard::shift_substitutions(
        &mut wildcards,
        entry_index,
        cell_index,
        contents_index,
        insertion.added_segments as isize,
    );
    let wildcards = if is_new {
        wildcards.push(wildcard::create_wildcard(
            entry_index,
            cell_index,
            insertion.inserted_index,
        ));
        wildcards
    } else {
        wildcard::add_substitution(
            wildcards,
            wildcard_index,
            WildcardSubstitution::new(entry_index, cell_index, insertion.inserted_index),
        )?
    };
    entries[entry_index].row[cell_index].contents = insertion.contents;

    Ok(Some(StructureEdit { entries, wildcards }))
}

/// Create a new wildcard over `selection`.
///
/// Returns `None` when the selection is empty or does not lie within one text
/// segment.
pub fn create_wildcard(
    entries: Vec<StructureEntry>,
    wildcards: Vec<Wildcard>,
    selection: CellSelection,
) -> Result<Option<StructureEdit>> {
    let wildcard_index = wildcards.len();
    insert_occurrence(entries, wildcards, wildcard_index, selection, true)
}

/// Use the existing wildcard `wildcard_index` over `selection`.
pub fn use_wildcard(
    entries: Vec<StructureEntry>,
    wildcards: Vec<Wildcard>,
    wildcard_index: usize,
    selection: CellSelection,
) -> Result<Option<StructureEdit>> {
    if wildcard_index >= wildcards.len() {
        return Err(StructureError::out_of_range(
            "wildcard",
            wildcard_index,
            wildcards.len(),
        ));
    }
    insert_occurrence(entries, wildcards, wildcard_index, selection, false)
}

/// Remove the wildcard occurrence at segment `contents_index`, restoring the
/// text it replaced. Deletes the wildcard if this was its last occurrence.
///
/// Returns `None` when that segment is plain text.
pub fn remove_wildcard(
    mut entries: Vec<StructureEntry>,
    wildcards: Vec<Wildcard>,
    entry_index: usize,
    cell_index: usize,
    contents_index: usize,
) -> Result<Option<StructureEdit>> {
    check_cell(&entries, entry_index, cell_index)?;
    let cell = &entries[entry_index].row[cell_index];
    let Some(wildcard_index) = cell.contents.get(contents_index).and_then(CellContent::wildcard)
    else {
        tracing::debug!(
            "No wildcard at entry {entry_index}, cell {cell_index}, segment {contents_index}"
        );
        return Ok(None);
    };
    let Some(removal) = wildcard::remove_wildcard_from_cell(cell, contents_index) else {
        return Ok(None);
    };

    let substitution = WildcardSubstitution::new(entry_index, cell_index, contents_index);
    let update = wildcard::remove_substitution(wildcards, wildcard_index, substitution)?;
    let mut wildcards = update.wildcards;
    wildcard::shift_substitutions(
        &mut wildcards,
        entry_index,
        cell_index,
        contents_index,
        -(removal.removed_segments as isize),
    );
    entries[entry_index].row[cell_index].contents = removal.contents;
    if update.deleted {
        renumber_wildcards(&mut entries, &[wildcard_index]);
    }

    Ok(Some(StructureEdit { entries, wildcards }))
}

/// Verify that cells and wildcards agree on every wildcard occurrence.
pub fn check_consistency(entries: &[StructureEntry], wildcards: &[Wildcard]) -> Result<()> {
    for (entry_index, entry) in entries.iter().enumerate() {
        if entry.cell_selection.len() != entry.row.len() {
            return Err(StructureError::MismatchedRow {
                row: entry_index,
                expected: entry.row.len(),
                found: entry.cell_selection.len(),
            });
        }
        for (cell_index, cell) in entry.row.iter().enumerate() {
            for (contents_index, content) in cell.contents.iter().enumerate() {
                let Some(index) = content.wildcard() else {
                    continue;
                };
                let substitution =
                    WildcardSubstitution::new(entry_index, cell_index, contents_index);
                let known = wildcards
                    .get(index)
                    .is_some_and(|w| w.substitutions.contains(&substitution));
                if !known {
                    return Err(StructureError::OrphanWildcard {
                        wildcard: index,
                        entry_index,
                        cell_index,
                        contents_index,
                    });
                }
            }
        }
    }

    for (index, wildcard) in wildcards.iter().enumerate() {
        if wildcard.substitutions.is_empty() {
            return Err(StructureError::EmptyWildcard(index));
        }
        for substitution in &wildcard.substitutions {
            let segment = entries
                .get(substitution.entry_index)
                .and_then(|e| e.row.get(substitution.cell_index))
                .and_then(|c| c.contents.get(substitution.contents_index))
                .and_then(CellContent::wildcard);
            if segment != Some(index) {
                return Err(StructureError::OrphanWildcard {
                    wildcard: index,
                    entry_index: substitution.entry_index,
                    cell_index: substitution.cell_index,
                    contents_index: substitution.contents_index,
                });
            }
        }
    }
    Ok(())
}
