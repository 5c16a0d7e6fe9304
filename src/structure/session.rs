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

//! The state of one structure dialog and its transitions.
//!
//! A [`StructureSession`] is an immutable value. [`StructureSession::apply`]
//! computes the next session from the current one and an action; an error
//! leaves the current session untouched, so a half-applied edit can never be
//! observed. Column types are fixed when the session opens.

use serde::{Deserialize, Serialize};

use crate::structure::corpus::LogCorpus;
use crate::structure::entries::{self, EntryRemoval, StructureEdit};
use crate::structure::error::{Result, StructureError};
use crate::structure::query::{self, StructureQuery, DEFAULT_BACKTRACK_LIMIT};
use crate::structure::search::{self, Match, MatchCursor, StructureMatches};
use crate::structure::types::{
    CellSelection, ColumnType, Header, LinkDistance, StructureEntry, Wildcard,
};

/// Row distance used for the bounded state of the link toggle.
pub const DEFAULT_BOUNDED_LINK_GAP: usize = 10;

/// Tunables of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub bounded_link_gap: usize,
    pub backtrack_limit: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            bounded_link_gap: DEFAULT_BOUNDED_LINK_GAP,
            backtrack_limit: DEFAULT_BACKTRACK_LIMIT,
        }
    }
}

/// A user edit of the structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StructureAction {
    /// More rows were selected in the log.
    AppendRows { rows: Vec<Vec<String>> },
    RemoveEntry { entry: usize },
    ToggleCell {
        entry: usize,
        cell: usize,
        #[serde(default)]
        exclusive: bool,
    },
    ToggleLink { entry: usize },
    SetLink { entry: usize, distance: LinkDistance },
    CreateWildcard { selection: CellSelection },
    UseWildcard {
        wildcard: usize,
        selection: CellSelection,
    },
    /// Like `CreateWildcard`, with offsets over the rendered cell text.
    CreateWildcardOverText {
        entry: usize,
        cell: usize,
        start: usize,
        end: usize,
    },
    UseWildcardOverText {
        wildcard: usize,
        entry: usize,
        cell: usize,
        start: usize,
        end: usize,
    },
    RemoveWildcard {
        entry: usize,
        cell: usize,
        contents: usize,
    },
}

/// Outcome of applying an action.
#[derive(Debug, Clone)]
pub enum Transition {
    Updated(StructureSession),
    /// The last entry was removed; the dialog closes.
    Closed,
}

/// Matches of the last search together with the navigation cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureResults {
    pub matches: StructureMatches,
    pub cursor: MatchCursor,
}

impl StructureResults {
    pub fn current_match(&self) -> Option<&Match> {
        self.cursor.current().and_then(|i| self.matches.get(i))
    }
}

#[derive(Debug, Clone)]
pub struct StructureSession {
    headers: Vec<Header>,
    column_types: Vec<ColumnType>,
    entries: Vec<StructureEntry>,
    wildcards: Vec<Wildcard>,
    options: SessionOptions,
    results: Option<StructureResults>,
}

fn check_rows(headers: &[Header], rows: &[Vec<String>]) -> Result<()> {
    for (row, cells) in rows.iter().enumerate() {
        if cells.len() != headers.len() {
            return Err(StructureError::MismatchedRow {
                row,
                expected: headers.len(),
                found: cells.len(),
            });
        }
    }
    Ok(())
}

impl StructureSession {
    /// Open a session over the selected rows.
    pub fn open(
        headers: Vec<Header>,
        column_types: Vec<ColumnType>,
        selected_rows: &[Vec<String>],
        options: SessionOptions,
    ) -> Result<Self> {
        if headers.len() != column_types.len() {
            return Err(StructureError::ColumnTypeMismatch {
                headers: headers.len(),
                types: column_types.len(),
            });
        }
        if selected_rows.is_empty() {
            return Err(StructureError::out_of_range("selected row", 0, 0));
        }
        check_rows(&headers, selected_rows)?;

        let entries = entries::build_entries(&column_types, selected_rows);
        tracing::debug!("Opened structure session with {} entries", entries.len());
        Ok(Self {
            headers,
            column_types,
            entries,
            wildcards: Vec::new(),
            options,
            results: None,
        })
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn column_types(&self) -> &[ColumnType] {
        &self.column_types
    }

    pub fn entries(&self) -> &[StructureEntry] {
        &self.entries
    }

    pub fn wildcards(&self) -> &[Wildcard] {
        &self.wildcards
    }

    pub const fn options(&self) -> SessionOptions {
        self.options
    }

    /// Results of the last search, cleared by every edit.
    pub const fn results(&self) -> Option<&StructureResults> {
        self.results.as_ref()
    }

    fn with_entries(&self, entries: Vec<StructureEntry>) -> Self {
        self.with_edit(StructureEdit {
            entries,
            wildcards: self.wildcards.clone(),
        })
    }

    fn with_edit(&self, edit: StructureEdit) -> Self {
        Self {
            headers: self.headers.clone(),
            column_types: self.column_types.clone(),
            entries: edit.entries,
            wildcards: edit.wildcards,
            options: self.options,
            results: None,
        }
    }

    /// Compute the session that results from `action`.
    pub fn apply(&self, action: &StructureAction) -> Result<Transition> {
        tracing::debug!("Applying structure action {action:?}");
        let entries = self.entries.clone();
        let wildcards = self.wildcards.clone();

        let next = match action {
            StructureAction::AppendRows { rows } => {
                check_rows(&self.headers, rows)?;
                let incoming = entries::build_entries(&self.column_types, rows);
                self.with_entries(entries::append_new_entries(entries, incoming))
            }
            StructureAction::RemoveEntry { entry } => {
                match entries::remove_entry(entries, wildcards, *entry)? {
                    EntryRemoval::Remaining(edit) => self.with_edit(edit),
                    EntryRemoval::LastEntryRemoved => return Ok(Transition::Closed),
                }
            }
            StructureAction::ToggleCell {
                entry,
                cell,
                exclusive,
            } => self.with_entries(entries::toggle_cell_selection(
                &self.column_types,
                entries,
                *entry,
                *cell,
                *exclusive,
            )?),
            StructureAction::ToggleLink { entry } => self.with_entries(entries::toggle_link(
                entries,
                *entry,
                self.options.bounded_link_gap,
            )?),
            StructureAction::SetLink { entry, distance } => {
                self.with_entries(entries::set_link(entries, *entry, *distance)?)
            }
            StructureAction::CreateWildcard { selection } => {
                match entries::create_wildcard(entries, wildcards, *selection)? {
                    Some(edit) => self.with_edit(edit),
                    None => self.clone(),
                }
            }
            StructureAction::UseWildcard {
                wildcard,
                selection,
            } => match entries::use_wildcard(entries, wildcards, *wildcard, *selection)? {
                Some(edit) => self.with_edit(edit),
                None => self.clone(),
            },
            StructureAction::CreateWildcardOverText {
                entry,
                cell,
                start,
                end,
            } => {
                let selection = entries::select_rendered_text(&entries, *entry, *cell, *start, *end)?;
                let edit = match selection {
                    Some(selection) => entries::create_wildcard(entries, wildcards, selection)?,
                    None => None,
                };
                edit.map_or_else(|| self.clone(), |edit| self.with_edit(edit))
            }
            StructureAction::UseWildcardOverText {
                wildcard,
                entry,
                cell,
                start,
                end,
            } => {
                let selection = entries::select_rendered_text(&entries, *entry, *cell, *start, *end)?;
                let edit = match selection {
                    Some(selection) => {
                        entries::use_wildcard(entries, wildcards, *wildcard, selection)?
                    }
                    None => None,
                };
                edit.map_or_else(|| self.clone(), |edit| self.with_edit(edit))
            }
            StructureAction::RemoveWildcard {
                entry,
                cell,
                contents,
            } => match entries::remove_wildcard(entries, wildcards, *entry, *cell, *contents)? {
                Some(edit) => self.with_edit(edit),
                None => self.clone(),
            },
        };

        entries::check_consistency(&next.entries, &next.wildcards)?;
        Ok(Transition::Updated(next))
    }

    /// Compile the current structure.
    pub fn compile(&self) -> Result<StructureQuery> {
        query::compile_with_limit(
            &self.headers,
            &self.column_types,
            &self.entries,
            &self.wildcards,
            self.options.backtrack_limit,
        )
    }

    /// Search `corpus` for the structure; the returned session carries the
    /// results with the cursor on the first match.
    pub fn search(&self, corpus: &LogCorpus) -> Result<Self> {
        let query = self.compile()?;
        let matches = search::search(&query, corpus)?;
        let cursor = MatchCursor::new(matches.len());
        Ok(Self {
            results: Some(StructureResults { matches, cursor }),
            ..self.clone()
        })
    }

    fn with_cursor(&self, step: fn(MatchCursor) -> MatchCursor) -> Self {
        let mut next = self.clone();
        if let Some(results) = next.results.as_mut() {
            results.cursor = step(results.cursor);
        }
        next
    }

    #[must_use]
    pub fn next_match(&self) -> Self {
        self.with_cursor(MatchCursor::next)
    }

    #[must_use]
    pub fn previous_match(&self) -> Self {
        self.with_cursor(MatchCursor::previous)
    }
}
