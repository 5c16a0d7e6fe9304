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

//! Runs a compiled structure query over the corpus and keeps track of the
//! current match.
//!
//! The search walks rows rather than running one regex over the whole log.
//! Each entry first narrows the log to candidate rows with a wildcard-free
//! prefilter. For every candidate of the first entry, later entries are
//! tried in row order inside the window their link allows, with the text
//! captured so far substituted for bound wildcards. States that cannot
//! complete a match are remembered, so the work stays bounded by the number
//! of distinct (entry, row, captures) states.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};

use fancy_regex::Regex;
use serde::Serialize;

use crate::structure::corpus::LogCorpus;
use crate::structure::error::Result;
use crate::structure::query::{wildcard_group, StructureQuery};
use crate::structure::types::LinkDistance;

/// One occurrence of the structure: a row index per entry.
pub type Match = Vec<usize>;

/// All occurrences of a structure, in log order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructureMatches {
    matches: Vec<Match>,
    rows: BTreeSet<usize>,
}

impl StructureMatches {
    pub fn new(matches: Vec<Match>) -> Self {
        let rows = matches.iter().flatten().copied().collect();
        Self { matches, rows }
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Every row taking part in some match, for highlighting.
    pub const fn rows(&self) -> &BTreeSet<usize> {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&Match> {
        self.matches.get(index)
    }

    pub fn contains_row(&self, row: usize) -> bool {
        self.rows.contains(&row)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Captured text per wildcard, as it appears in the corpus.
type Captures = Vec<Option<String>>;

/// Rows `[start, end)` the next entry may occupy after `previous`.
const fn link_window(link: LinkDistance, previous: usize) -> (usize, usize) {
    match link {
        LinkDistance::Any => (previous.saturating_add(1), usize::MAX),
        LinkDistance::Exactly(n) => (
            previous.saturating_add(n),
            previous.saturating_add(n).saturating_add(1),
        ),
        LinkDistance::AtMost(n) => (
            previous.saturating_add(1),
            previous.saturating_add(n).saturating_add(1),
        ),
    }
}

struct Walker<'a> {
    query: &'a StructureQuery,
    corpus: &'a LogCorpus,
    candidates: Vec<Vec<usize>>,
    regexes: HashMap<(usize, Vec<String>), Regex>,
    dead_ends: HashSet<(usize, usize, Captures)>,
}

impl Walker<'_> {
    fn line_regex(&mut self, entry: usize, captures: &Captures) -> Result<&Regex> {
        let bound_values: Vec<String> = self.query.entries()[entry]
            .bound()
            .iter()
            .map(|&w| captures.get(w).cloned().flatten().unwrap_or_default())
            .collect();
        match self.regexes.entry((entry, bound_values)) {
            Entry::Occupied(cached) => Ok(cached.into_mut()),
            Entry::Vacant(slot) => {
                let regex = self.query.line_regex(entry, &slot.key().1)?;
                Ok(slot.insert(regex))
            }
        }
    }

    /// Match `entry` on `row`, returning the captures extended by it.
    fn match_entry(
        &mut self,
        entry: usize,
        row: usize,
        captures: &Captures,
    ) -> Result<Option<Captures>> {
        let corpus = self.corpus;
        let Some(line) = corpus.line(row) else {
            return Ok(None);
        };
        let found = match self.line_regex(entry, captures)?.captures(line) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Skipping row {row} for structure entry {entry}: {e}");
                return Ok(None);
            }
        };
        let Some(found) = found else {
            return Ok(None);
        };
        let mut next = captures.clone();
        for &wildcard in self.query.entries()[entry].defined() {
            if let Some(slot) = next.get_mut(wildcard) {
                *slot = found
                    .name(&wildcard_group(wildcard))
                    .map(|m| m.as_str().to_string());
            }
        }
        Ok(Some(next))
    }

    /// Rows for entries `entry..` after `previous`, earliest first.
    fn complete(
        &mut self,
        entry: usize,
        previous: usize,
        captures: &Captures,
    ) -> Result<Option<Match>> {
        if entry == self.query.entry_count() {
            return Ok(Some(Vec::new()));
        }
        let state = (entry, previous, captures.clone());
        if self.dead_ends.contains(&state) {
            return Ok(None);
        }

        let (start, end) = link_window(self.query.links()[entry - 1], previous);
        let first = self.candidates[entry].partition_point(|&row| row < start);
        for index in first..self.candidates[entry].len() {
            let row = self.candidates[entry][index];
            if row >= end {
                break;
            }
            let Some(next) = self.match_entry(entry, row, captures)? else {
                continue;
            };
            if let Some(mut rest) = self.complete(entry + 1, row, &next)? {
                rest.insert(0, row);
                return Ok(Some(rest));
            }
        }

        self.dead_ends.insert(state);
        Ok(None)
    }
}

/// Find all occurrences of `query` in `corpus`.
///
/// Occurrences are reported by ascending first row. Every first row yields
/// at most one occurrence, the one whose later rows come earliest, so
/// occurrences may interleave but no two share a first row. A wildcard's text
/// is fixed by the entry that captures it first.
pub fn search(query: &StructureQuery, corpus: &LogCorpus) -> Result<StructureMatches> {
    profiling::scope!("structure::search");
    let candidates: Vec<Vec<usize>> = query
        .entries()
        .iter()
        .map(|entry| entry.candidate_rows(corpus))
        .collect();
    let mut walker = Walker {
        query,
        corpus,
        candidates,
        regexes: HashMap::new(),
        dead_ends: HashSet::new(),
    };

    let empty: Captures = vec![None; query.wildcard_count()];
    let mut matches = Vec::new();
    let first_rows = walker.candidates.first().cloned().unwrap_or_default();
    for row in first_rows {
        let Some(captures) = walker.match_entry(0, row, &empty)? else {
            continue;
        };
        if let Some(mut rest) = walker.complete(1, row, &captures)? {
            rest.insert(0, row);
            matches.push(rest);
        }
    }

    tracing::info!(
        "Structure search found {} matches in {} rows",
        matches.len(),
        corpus.row_count()
    );
    Ok(StructureMatches::new(matches))
}

/// Position within a match list for next/previous navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct MatchCursor {
    current: Option<usize>,
    total: usize,
}

impl MatchCursor {
    /// Start at the first match, or nowhere if there are none.
    pub const fn new(total: usize) -> Self {
        Self {
            current: if total == 0 { None } else { Some(0) },
            total,
        }
    }

    pub const fn current(&self) -> Option<usize> {
        self.current
    }

    pub const fn total(&self) -> usize {
        self.total
    }

    /// Following match, wrapping from the last to the first.
    #[must_use]
    pub const fn next(self) -> Self {
        let current = match self.current {
            Some(index) if index + 1 < self.total => Some(index + 1),
            Some(_) => Some(0),
            None => None,
        };
        Self { current, ..self }
    }

    /// Preceding match, wrapping from the first to the last.
    #[must_use]
    pub const fn previous(self) -> Self {
        let current = match self.current {
            Some(0) => Some(self.total - 1),
            Some(index) => Some(index - 1),
            None => None,
        };
        Self { current, ..self }
    }
}
