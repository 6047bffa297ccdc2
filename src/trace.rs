//! Splits an mtr capture into site blocks.
//!
//! The capture is a sequence of blocks, each opened by a `SITE-<name>` line
//! and followed by mtr report lines such as ` 3.|-- 72.14.215.85  0.0% ...`.
//! Everything else (the `HOST:` header, `Start:` stamps, blank lines) is
//! ignored.

use std::{
    fs, io, mem,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;

use crate::structs::TraceRecord;

const SITE_MARKER: &str = "SITE-";
const UNKNOWN_HOP: char = '?';

static HOP_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\|\s*-").expect("hop line pattern is valid"));

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("trace file '{}' is unavailable: {source}", .path.display())]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
enum ParseState {
    /// No site marker seen yet.
    Idle,
    Site { name: String, hops: Vec<String> },
}

impl ParseState {
    fn open(name: &str) -> Self {
        ParseState::Site {
            name: name.trim().to_string(),
            hops: Vec::new(),
        }
    }

    fn push_hop(&mut self, address: &str) {
        // hop lines before the first marker belong to no site
        if let ParseState::Site { hops, .. } = self {
            hops.push(address.to_string());
        }
    }

    /// Closes the current block. Only a named block with at least one hop
    /// produces a record.
    fn finish(self) -> Option<TraceRecord> {
        match self {
            ParseState::Site { name, hops } if !name.is_empty() && !hops.is_empty() => {
                Some(TraceRecord { site: name, hops })
            }
            _ => None,
        }
    }
}

/// Reads and parses the capture at `path`.
pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>, TraceError> {
    let text = fs::read_to_string(path).map_err(|source| TraceError::InputUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_trace(&text))
}

/// Parses capture text into site records, in order of first appearance.
///
/// A site name seen twice keeps its original position and takes the hops of
/// the later block.
pub fn parse_trace(text: &str) -> Vec<TraceRecord> {
    let mut sites = Vec::new();
    let mut state = ParseState::Idle;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(SITE_MARKER) {
            let previous = mem::replace(&mut state, ParseState::open(rest));
            if let Some(record) = previous.finish() {
                insert(&mut sites, record);
            }
        } else if HOP_LINE.is_match(line) {
            if let Some(address) = hop_address(line) {
                state.push_hop(address);
            }
        }
    }

    if let Some(record) = state.finish() {
        insert(&mut sites, record);
    }

    sites
}

/// The second whitespace-separated token of a hop line, unless mtr could
/// not identify the hop.
fn hop_address(line: &str) -> Option<&str> {
    line.split_whitespace()
        .nth(1)
        .filter(|address| !address.is_empty() && !address.starts_with(UNKNOWN_HOP))
}

fn insert(sites: &mut Vec<TraceRecord>, record: TraceRecord) {
    match sites.iter_mut().find(|r| r.site == record.site) {
        Some(existing) => existing.hops = record.hops,
        None => sites.push(record),
    }
}
