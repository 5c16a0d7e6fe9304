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

//! Compiles a structure into per-entry line matchers.
//!
//! Each entry matches exactly one corpus line. Selected cells match their
//! literal JSON-escaped text, ignored cells match any JSON string. The first
//! active occurrence of a wildcard captures its text into the group `wN`.
//! Later occurrences in the same line are `\k<wN>` backreferences; occurrences
//! in later entries are replaced by the captured text once it is known. The
//! links between entries are kept as row distances and enforced by the search.

use std::collections::HashSet;

use fancy_regex::{Regex, RegexBuilder};
use rayon::prelude::*;

use crate::structure::corpus::{json_string, LogCorpus};
use crate::structure::entries::check_consistency;
use crate::structure::error::{Result, StructureError};
use crate::structure::types::{
    CellContent, ColumnType, Header, LinkDistance, StructureEntry, Wildcard,
};

/// Backtracking budget of a single line match, used by [`compile`].
pub const DEFAULT_BACKTRACK_LIMIT: usize = 1_000_000;

/// Any JSON string literal on a single line.
const ANY_JSON_STRING: &str = r#""(?:[^"\\\n]|\\.)*""#;
/// Non-empty JSON string contents, as short as possible.
const WILDCARD_VALUE: &str = r#"(?:[^"\\\n]|\\.)+?"#;
/// One complete corpus line.
const ANY_LINE: &str = r"[^\n]*\n";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Pattern(String),
    Wildcard(usize),
}

/// Matcher of one structure entry against one corpus line.
#[derive(Debug, Clone)]
pub struct EntryMatcher {
    pieces: Vec<Piece>,
    /// Wildcards captured by an earlier entry.
    bound: Vec<usize>,
    /// Wildcards first captured by this entry.
    defined: Vec<usize>,
    /// Line pattern with every wildcard generalized; a cheap superset check.
    prefilter: Regex,
}

impl EntryMatcher {
    fn render(
        &self,
        value_of: impl Fn(usize) -> Option<String>,
        seen: &mut HashSet<usize>,
    ) -> String {
        let mut pattern = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Pattern(text) => pattern.push_str(text),
                Piece::Wildcard(wildcard) => {
                    let group = wildcard_group(*wildcard);
                    if let Some(value) = value_of(*wildcard) {
                        pattern.push_str(&fancy_regex::escape(&value));
                    } else if seen.insert(*wildcard) {
                        pattern.push_str(&format!("(?P<{group}>{WILDCARD_VALUE})"));
                    } else {
                        pattern.push_str(&format!("\\k<{group}>"));
                    }
                }
            }
        }
        pattern
    }

    pub fn bound(&self) -> &[usize] {
        &self.bound
    }

    pub fn defined(&self) -> &[usize] {
        &self.defined
    }

    /// Anchored line pattern once the `bound` wildcards have these values.
    pub fn line_pattern(&self, bound_values: &[String]) -> String {
        let value_of = |wildcard| {
            self.bound
                .iter()
                .position(|&w| w == wildcard)
                .and_then(|i| bound_values.get(i).cloned())
        };
        format!("^{}$", self.render(value_of, &mut HashSet::new()))
    }

    /// Rows whose line could match this entry for some wildcard values.
    pub fn candidate_rows(&self, corpus: &LogCorpus) -> Vec<usize> {
        profiling::scope!("EntryMatcher::candidate_rows");
        (0..corpus.row_count())
            .into_par_iter()
            .filter(|&row| {
                corpus
                    .line(row)
                    .is_some_and(|line| self.prefilter.is_match(line).unwrap_or(true))
            })
            .collect()
    }
}

/// A compiled structure query.
#[derive(Debug, Clone)]
pub struct StructureQuery {
    pattern: String,
    entries: Vec<EntryMatcher>,
    links: Vec<LinkDistance>,
    wildcard_count: usize,
    backtrack_limit: usize,
}

impl StructureQuery {
    /// The whole structure as one multi-line pattern, for display and logs.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn entries(&self) -> &[EntryMatcher] {
        &self.entries
    }

    /// Distance from entry `i` to entry `i + 1`.
    pub fn links(&self) -> &[LinkDistance] {
        &self.links
    }

    /// Number of structure entries, which is the length of every match.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub const fn wildcard_count(&self) -> usize {
        self.wildcard_count
    }

    /// Build the regex matching entry `index` with its bound wildcard values.
    pub fn line_regex(&self, index: usize, bound_values: &[String]) -> Result<Regex> {
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| StructureError::out_of_range("entry", index, self.entries.len()))?;
        build_regex(&entry.line_pattern(bound_values), self.backtrack_limit)
    }
}

pub(crate) fn wildcard_group(index: usize) -> String {
    format!("w{index}")
}

fn build_regex(pattern: &str, backtrack_limit: usize) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .backtrack_limit(backtrack_limit)
        .build()
        .map_err(|e| StructureError::InvalidQuery(Box::new(e)))
}

/// JSON-escaped `text` without the surrounding quotes, escaped for regex use.
fn literal(text: &str) -> Result<String> {
    let json = json_string(text)?;
    let inner = &json[1..json.len() - 1];
    Ok(fancy_regex::escape(inner).into_owned())
}

fn gap_pattern(link: LinkDistance) -> String {
    match link {
        LinkDistance::Any => format!("(?:{ANY_LINE})*?"),
        LinkDistance::Exactly(n) if n > 1 => format!("(?:{ANY_LINE}){{{}}}", n - 1),
        LinkDistance::AtMost(n) if n > 1 => format!("(?:{ANY_LINE}){{0,{}}}?", n - 1),
        LinkDistance::Exactly(_) | LinkDistance::AtMost(_) => String::new(),
    }
}

fn entry_pieces(
    headers: &[Header],
    column_types: &[ColumnType],
    entry: &StructureEntry,
) -> Result<Vec<Piece>> {
    let mut pieces = vec![Piece::Pattern(r"\{".to_string())];
    let mut first = true;
    for (index, header) in headers.iter().enumerate() {
        if !column_types[index].in_corpus() {
            continue;
        }
        let separator = if first { "" } else { "," };
        first = false;
        pieces.push(Piece::Pattern(format!(
            "{separator}\"{}\":",
            literal(&header.name)?
        )));

        if entry.cell_selection[index] {
            pieces.push(Piece::Pattern("\"".to_string()));
            for content in &entry.row[index].contents {
                match content {
                    CellContent::Text(text) => pieces.push(Piece::Pattern(literal(text)?)),
                    CellContent::Wildcard { wildcard, .. } => {
                        pieces.push(Piece::Wildcard(*wildcard));
                    }
                }
            }
            pieces.push(Piece::Pattern("\"".to_string()));
        } else {
            pieces.push(Piece::Pattern(ANY_JSON_STRING.to_string()));
        }
    }
    pieces.push(Piece::Pattern(r"\}".to_string()));
    Ok(pieces)
}

/// Compile the structure with the default backtracking budget.
pub fn compile(
    headers: &[Header],
    column_types: &[ColumnType],
    entries: &[StructureEntry],
    wildcards: &[Wildcard],
) -> Result<StructureQuery> {
    compile_with_limit(
        headers,
        column_types,
        entries,
        wildcards,
        DEFAULT_BACKTRACK_LIMIT,
    )
}

/// Compile the structure into a query.
///
/// Fails on malformed input: column types that do not cover the headers,
/// entries with the wrong number of cells, an empty structure, or wildcards
/// that disagree with the cells.
pub fn compile_with_limit(
    headers: &[Header],
    column_types: &[ColumnType],
    entries: &[StructureEntry],
    wildcards: &[Wildcard],
    backtrack_limit: usize,
) -> Result<StructureQuery> {
    profiling::scope!("structure::compile");
    if headers.len() != column_types.len() {
        return Err(StructureError::ColumnTypeMismatch {
            headers: headers.len(),
            types: column_types.len(),
        });
    }
    if entries.is_empty() {
        return Err(StructureError::out_of_range("entry", 0, 0));
    }
    for (row, entry) in entries.iter().enumerate() {
        if entry.row.len() != headers.len() {
            return Err(StructureError::MismatchedRow {
                row,
                expected: headers.len(),
                found: entry.row.len(),
            });
        }
    }
    check_consistency(entries, wildcards)?;

    let mut captured = HashSet::new();
    let mut matchers = Vec::with_capacity(entries.len());
    for entry in entries {
        let pieces = entry_pieces(headers, column_types, entry)?;
        let mut bound = Vec::new();
        let mut defined = Vec::new();
        for piece in &pieces {
            let Piece::Wildcard(wildcard) = piece else {
                continue;
            };
            let list = if captured.contains(wildcard) {
                &mut bound
            } else {
                &mut defined
            };
            if !list.contains(wildcard) {
                list.push(*wildcard);
            }
        }
        captured.extend(defined.iter().copied());

        let generic: String = pieces
            .iter()
            .map(|piece| match piece {
                Piece::Pattern(text) => text.clone(),
                Piece::Wildcard(_) => WILDCARD_VALUE.to_string(),
            })
            .collect();
        let prefilter = build_regex(&format!("^{generic}$"), backtrack_limit)?;
        matchers.push(EntryMatcher {
            pieces,
            bound,
            defined,
            prefilter,
        });
    }

    let links: Vec<LinkDistance> = entries[..entries.len() - 1]
        .iter()
        .map(|entry| entry.structure_link.unwrap_or_default())
        .collect();

    let mut seen = HashSet::new();
    let mut pattern = String::from("(?m)^");
    for (index, matcher) in matchers.iter().enumerate() {
        pattern.push_str(&matcher.render(|_| None, &mut seen));
        pattern.push_str(r"\n");
        if let Some(link) = links.get(index) {
            pattern.push_str(&gap_pattern(*link));
        }
    }
    tracing::trace!("Structure query: {pattern}");

    Ok(StructureQuery {
        pattern,
        entries: matchers,
        links,
        wildcard_count: wildcards.len(),
        backtrack_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::entries::{build_entries, create_wildcard, use_wildcard};
    use crate::structure::types::{CellSelection, HeaderType};

    fn headers() -> Vec<Header> {
        vec![
            Header::new("time", HeaderType::String),
            Header::new("method", HeaderType::String),
        ]
    }

    const TYPES: [ColumnType; 2] = [ColumnType::Unselected, ColumnType::Selected];

    fn rows(cells: &[[&str; 2]]) -> Vec<Vec<String>> {
        cells
            .iter()
            .map(|r| r.iter().map(ToString::to_string).collect())
            .collect()
    }

    fn shared_wildcard(structure: &[[&str; 2]], end: usize) -> (Vec<StructureEntry>, Vec<Wildcard>) {
        let entries = build_entries(&TYPES, &rows(structure));
        let selection = |entry_index| CellSelection {
            entry_index,
            cell_index: 1,
            contents_index: 0,
            start: 0,
            end,
        };
        let edit = create_wildcard(entries, Vec::new(), selection(0))
            .unwrap()
            .unwrap();
        let edit = use_wildcard(edit.entries, edit.wildcards, 0, selection(1))
            .unwrap()
            .unwrap();
        (edit.entries, edit.wildcards)
    }

    #[test]
    fn test_single_entry_pattern() {
        let entries = build_entries(&TYPES, &rows(&[["10:00", "GET /a?x=1"]]));
        let query = compile(&headers(), &TYPES, &entries, &[]).unwrap();
        assert_eq!(
            query.pattern(),
            r#"(?m)^\{"time":"(?:[^"\\\n]|\\.)*","method":"GET /a\?x=1"\}\n"#
        );
        assert_eq!(query.entry_count(), 1);
        assert!(query.links().is_empty());
        let regex = query.line_regex(0, &[]).unwrap();
        assert!(regex
            .is_match("{\"time\":\"9\",\"method\":\"GET /a?x=1\"}")
            .unwrap());
        assert!(!regex
            .is_match("{\"time\":\"9\",\"method\":\"GET /a?x=12\"}")
            .unwrap());
    }

    #[test]
    fn test_gap_patterns() {
        assert_eq!(gap_pattern(LinkDistance::Any), r"(?:[^\n]*\n)*?");
        assert_eq!(gap_pattern(LinkDistance::Exactly(1)), "");
        assert_eq!(gap_pattern(LinkDistance::Exactly(3)), r"(?:[^\n]*\n){2}");
        assert_eq!(gap_pattern(LinkDistance::AtMost(1)), "");
        assert_eq!(gap_pattern(LinkDistance::AtMost(4)), r"(?:[^\n]*\n){0,3}?");
    }

    #[test]
    fn test_wildcard_defined_once_then_bound() {
        let (entries, wildcards) = shared_wildcard(&[["1", "id=GET"], ["2", "id=GET"]], 2);
        let query = compile(&headers(), &TYPES, &entries, &wildcards).unwrap();
        assert_eq!(query.pattern().matches("(?P<w0>").count(), 1);
        assert_eq!(query.pattern().matches(r"\k<w0>").count(), 1);

        assert_eq!(query.entries()[0].defined(), &[0]);
        assert!(query.entries()[0].bound().is_empty());
        assert_eq!(query.entries()[1].bound(), &[0]);
        assert!(query.entries()[1].defined().is_empty());

        let second = query.line_regex(1, &["a.b".to_string()]).unwrap();
        assert!(second
            .is_match(r#"{"time":"3","method":"a.b=GET"}"#)
            .unwrap());
        assert!(!second
            .is_match(r#"{"time":"3","method":"axb=GET"}"#)
            .unwrap());
    }

    #[test]
    fn test_repeated_wildcard_in_one_line_is_backreference() {
        let entries = build_entries(&TYPES, &rows(&[["1", "ab-ab"]]));
        let selection = |start| CellSelection {
            entry_index: 0,
            cell_index: 1,
            contents_index: 0,
            start,
            end: start + 2,
        };
        let edit = create_wildcard(entries, Vec::new(), selection(3))
            .unwrap()
            .unwrap();
        let edit = use_wildcard(edit.entries, edit.wildcards, 0, selection(0))
            .unwrap()
            .unwrap();
        let query = compile(&headers(), &TYPES, &edit.entries, &edit.wildcards).unwrap();
        let regex = query.line_regex(0, &[]).unwrap();
        assert!(regex.is_match(r#"{"time":"1","method":"xy-xy"}"#).unwrap());
        assert!(!regex.is_match(r#"{"time":"1","method":"xy-zz"}"#).unwrap());
    }

    #[test]
    fn test_deselected_first_occurrence_moves_definition() {
        let (mut entries, wildcards) = shared_wildcard(&[["1", "GET"], ["2", "GET"]], 3);
        entries[0].cell_selection[1] = false;
        let query = compile(&headers(), &TYPES, &entries, &wildcards).unwrap();
        assert!(query.pattern().contains("(?P<w0>"));
        assert!(!query.pattern().contains(r"\k<w0>"));
        assert_eq!(query.entries()[1].defined(), &[0]);
    }

    #[test]
    fn test_candidate_rows_generalize_wildcards() {
        let (entries, wildcards) = shared_wildcard(&[["1", "id=GET"], ["2", "id=GET"]], 2);
        let query = compile(&headers(), &TYPES, &entries, &wildcards).unwrap();
        let corpus = LogCorpus::build(
            &headers(),
            &TYPES,
            &rows(&[["1", "x=GET"], ["2", "GET"], ["3", "y=GET"]]),
        )
        .unwrap();
        assert_eq!(query.entries()[1].candidate_rows(&corpus), vec![0, 2]);
    }

    #[test]
    fn test_compile_rejects_malformed_input() {
        let entries = build_entries(&TYPES, &rows(&[["1", "GET"]]));
        assert!(matches!(
            compile(&headers()[..1], &TYPES[..1], &entries, &[]),
            Err(StructureError::MismatchedRow { .. })
        ));
        assert!(matches!(
            compile(&headers(), &TYPES[..1], &entries, &[]),
            Err(StructureError::ColumnTypeMismatch { .. })
        ));
        assert!(compile(&headers(), &TYPES, &[], &[]).is_err());
        assert!(matches!(
            compile(&headers(), &TYPES, &entries, &[Wildcard::default()]),
            Err(StructureError::EmptyWildcard(0))
        ));
    }
}
