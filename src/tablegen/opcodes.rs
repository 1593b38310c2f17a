//! Opcode registry.
//!
//! Collects every opcode name seen during a run. Once all records are built
//! the registry is finalized into an [`OpcodeTable`]: names sorted and
//! bracketed by the `INVALID` and `OPCODE_COUNT` sentinels.

use std::collections::BTreeSet;

/// First enumeration entry, reserved for undecodable headers.
pub const INVALID_OPCODE: &str = "INVALID";

/// Last enumeration entry, equal to the number of real entries.
pub const OPCODE_COUNT: &str = "OPCODE_COUNT";

/// Accumulates opcode names. Sorted and deduplicated by construction.
#[derive(Debug, Clone, Default)]
pub struct OpcodeRegistry {
    names: BTreeSet<String>,
}

impl OpcodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an opcode name. Returns `true` if the name was new.
    pub fn insert(&mut self, name: &str) -> bool {
        if self.names.contains(name) {
            false
        } else {
            self.names.insert(name.to_string())
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of distinct opcode names (sentinels excluded).
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Produce the final enumeration.
    pub fn finalize(&self) -> OpcodeTable {
        let mut names = Vec::with_capacity(self.names.len() + 2);
        names.push(INVALID_OPCODE.to_string());
        names.extend(self.names.iter().cloned());
        names.push(OPCODE_COUNT.to_string());
        OpcodeTable { names }
    }
}

/// Finalized opcode enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeTable {
    names: Vec<String>,
}

impl OpcodeTable {
    /// Enumeration entries in order, sentinels included.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Enumeration value of an opcode name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Number of real opcodes (sentinels excluded).
    pub fn opcode_count(&self) -> usize {
        self.names.len().saturating_sub(2)
    }

    /// Display strings of the real opcodes, in enumeration order.
    ///
    /// `prefix` is stripped when present and the result is lower-cased, so
    /// with prefix "O_" the entry "O_ANDI" becomes "andi".
    pub fn display_names(&self, prefix: &str) -> Vec<String> {
        self.names[1..self.names.len() - 1]
            .iter()
            .map(|name| display_name(name, prefix))
            .collect()
    }

    /// Name table indexed by enumeration value: every entry except
    /// `OPCODE_COUNT`, so index 0 holds the display string of `INVALID`.
    pub fn indexed_names(&self, prefix: &str) -> Vec<String> {
        self.names[..self.names.len() - 1]
            .iter()
            .map(|name| display_name(name, prefix))
            .collect()
    }
}

fn display_name(name: &str, prefix: &str) -> String {
    name.strip_prefix(prefix).unwrap_or(name).to_lowercase()
}
