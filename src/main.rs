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

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crabstruct::config::Config;
use crabstruct::core::{FilterColumn, LogFile};
use crabstruct::structure::{
    Match, StructureAction, StructureCell, StructureMatches, StructureSession, Transition,
};

#[derive(Parser, Debug)]
#[command(name = "crabstruct")]
#[command(author = "CrabStruct Team")]
#[command(version = "0.1.0")]
#[command(about = "Find repeated row structures in JSON logs", long_about = None)]
struct Args {
    /// Path to the log file (JSON array or JSON lines)
    #[arg(value_name = "LOG")]
    file: PathBuf,

    /// Rows that make up the structure, after filtering
    #[arg(long, value_delimiter = ',', required = true)]
    select: Vec<usize>,

    /// JSON file with a list of structure edits to apply before searching
    #[arg(long, value_name = "FILE")]
    actions: Option<PathBuf>,

    /// Coloring rule column; never part of a structure
    #[arg(long = "rule-column", value_name = "NAME")]
    rule_columns: Vec<String>,

    /// Keep only rows containing this text
    #[arg(long)]
    filter_text: Option<String>,

    /// Column searched by --filter-text
    #[arg(long, default_value = crabstruct::core::filter::ALL_COLUMNS)]
    filter_column: String,

    /// Move the match cursor by this many steps (negative goes backwards)
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    step: i64,

    /// Config file to use instead of the one in the user config directory
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective config to this file
    #[arg(long, value_name = "FILE")]
    write_config: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    pattern: &'a str,
    entries: Vec<Vec<String>>,
    matches: &'a StructureMatches,
    current: Option<usize>,
    current_match: Option<&'a Match>,
}

fn load_log(args: &Args) -> anyhow::Result<LogFile> {
    let log = LogFile::load(&args.file, &args.rule_columns)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    let Some(text) = &args.filter_text else {
        return Ok(log);
    };
    let column = FilterColumn::resolve(log.headers(), &args.filter_column);
    Ok(log.filtered(&column, text)?)
}

fn read_actions(args: &Args) -> anyhow::Result<Vec<StructureAction>> {
    let Some(path) = &args.actions else {
        return Ok(Vec::new());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid actions in {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG environment variable to override (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!(
        "CrabStruct {} ({}, {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );

    let config = args
        .config
        .as_deref()
        .map_or_else(Config::load, Config::load_from);
    if let Some(path) = &args.write_config {
        config.save_to(path).map_err(anyhow::Error::msg)?;
    }
    let log = load_log(&args)?;
    let column_types = log.classify_columns(&config);
    let selected = log.select_rows(&args.select)?;

    let mut session = StructureSession::open(
        log.headers().to_vec(),
        column_types.clone(),
        &selected,
        config.session_options(),
    )?;
    for (index, action) in read_actions(&args)?.iter().enumerate() {
        match session
            .apply(action)
            .with_context(|| format!("Action {index} failed"))?
        {
            Transition::Updated(next) => session = next,
            Transition::Closed => {
                tracing::info!("Last entry removed by action {index}, nothing to search");
                return Ok(());
            }
        }
    }

    let query = session.compile()?;
    let corpus = log.corpus(&column_types)?;
    let mut session = session.search(&corpus)?;
    for _ in 0..args.step.unsigned_abs() {
        session = if args.step > 0 {
            session.next_match()
        } else {
            session.previous_match()
        };
    }

    let results = session.results();
    let empty = StructureMatches::default();
    let report = Report {
        pattern: query.pattern(),
        entries: session
            .entries()
            .iter()
            .map(|entry| entry.row.iter().map(StructureCell::rendered).collect())
            .collect(),
        matches: results.map_or(&empty, |r| &r.matches),
        current: results.and_then(|r| r.cursor.current()),
        current_match: results.and_then(|r| r.current_match()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
