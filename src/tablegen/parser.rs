//! Line-oriented instruction description parser.
//!
//! Reads the opcode description format used by the assembler tables: one
//! entry per line, whitespace-separated columns.
//!
//! ```text
//! ; comment
//! div     S,D     -       NOPARMO %000000011000000001jjd000 dsp_x0y0ab jj=(x0=0, x1=2, y0=1, y1=3)
//! -       S       D       NOPARMO %0000000000000000000000ee dsp_alt
//! ```
//!
//! Columns: opcode name (or `-` to continue the previous opcode), two
//! operand-role columns, category marker, encoding, then free-form notes.
//! Lines that don't have this shape are skipped; not every entry in a shared
//! description belongs to this generator.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use super::types::SourceEntry;

/// Compiled regex patterns for description parsing.
struct Patterns {
    /// Matches an opcode name column: `andi`, `move.l`, or the continuation marker `-`
    opcode_name: Regex,
    /// Matches an encoding column: `%0000iiiiiiii101110ee`
    encoding: Regex,
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    opcode_name: Regex::new(r"^(?:-|[A-Za-z_][\w.]*)$").unwrap(),
    encoding: Regex::new(r"^%?[^\s%]+$").unwrap(),
});

/// Error type for description loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Parse a single description line.
///
/// Returns `None` for comments, blank lines and lines that don't look like
/// an entry. `line` is the 1-based line number stored in the entry.
pub fn parse_line(text: &str, line: usize) -> Option<SourceEntry> {
    if text.starts_with(';') {
        return None;
    }

    let blocks: Vec<&str> = text.split_whitespace().collect();
    if blocks.len() < 5 {
        if !blocks.is_empty() {
            log::trace!("line {}: skipping short entry '{}'", line, text.trim());
        }
        return None;
    }

    if !PATTERNS.opcode_name.is_match(blocks[0]) || !PATTERNS.encoding.is_match(blocks[4]) {
        log::trace!("line {}: skipping malformed entry '{}'", line, text.trim());
        return None;
    }

    Some(SourceEntry {
        name: blocks[0].to_string(),
        args: [blocks[1].to_string(), blocks[2].to_string()],
        category: blocks[3].to_string(),
        encoding: blocks[4].to_string(),
        notes: blocks[5..].join(" "),
        decode_hint: blocks.get(5).map(|s| s.to_string()),
        line,
    })
}

/// Parse a whole description.
pub fn parse_description(content: &str) -> Vec<SourceEntry> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, text)| parse_line(text, i + 1))
        .collect()
}

/// Read and parse a description file.
pub fn load_description(path: impl AsRef<Path>) -> Result<Vec<SourceEntry>, ParseError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let entries = parse_description(&content);
    log::info!("Read {} entries from {}", entries.len(), path.display());
    Ok(entries)
}
