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

//! Structure matching.
//!
//! A structure is a handful of log rows picked by the user, with some cells
//! ignored, parts of cells replaced by wildcards, and distance constraints
//! between consecutive rows. The structure is compiled into one regular
//! expression over a JSON-lines rendering of the log and searched for every
//! group of rows with the same shape.

pub mod corpus;
pub mod entries;
pub mod error;
pub mod query;
pub mod search;
pub mod session;
pub mod types;
pub mod wildcard;

pub use corpus::{LogCorpus, RowIndex};
pub use error::StructureError;
pub use query::{compile, StructureQuery};
pub use search::{search, Match, MatchCursor, StructureMatches};
pub use session::{SessionOptions, StructureAction, StructureResults, StructureSession, Transition};
pub use types::{
    CellContent, CellSelection, ColumnType, Header, HeaderType, LinkDistance, StructureCell,
    StructureEntry, Wildcard, WildcardSubstitution,
};
