//! Record builder.
//!
//! Turns description entries into [`EncodingRecord`]s. Each matching entry
//! goes through the same steps:
//!
//! 1. Check and strip the shared fixed prefix (`%0000` for the DSP56000
//!    non-parallel-move table, leaving 20 bits)
//! 2. Compile the remaining bit pattern
//! 3. Register its field layout and opcode name
//!
//! Entries from other categories are skipped without touching any registry.

use super::fields::{FieldError, FieldRegistry};
use super::opcodes::OpcodeRegistry;
use super::pattern::compile;
use super::types::{EncodingRecord, RecordMeta, SourceEntry};

/// Widest pattern that fits the `u64` masks.
pub const MAX_PATTERN_WIDTH: usize = 64;

/// Errors that abort a build. All of them mean the description is
/// inconsistent with the assumptions of the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Encoding doesn't start with the marker and shared prefix
    #[error("line {line}: {opcode} encoding '{encoding}' does not start with '{expected}'")]
    PrefixMismatch {
        line: usize,
        opcode: String,
        expected: String,
        encoding: String,
    },
    /// Pattern width differs from the rest of the run
    #[error("line {line}: {opcode} pattern is {got} bits wide, expected {expected}")]
    WidthMismatch {
        line: usize,
        opcode: String,
        expected: usize,
        got: usize,
    },
    /// Pattern can't hold the top bits used for partitioning, or overflows 64 bits
    #[error("line {line}: {opcode} pattern width {width} outside {min}..={max}")]
    BadWidth {
        line: usize,
        opcode: String,
        width: usize,
        min: usize,
        max: usize,
    },
    /// A `-` entry with no opcode before it
    #[error("line {line}: continuation entry without a preceding opcode")]
    OrphanContinuation { line: usize },
    #[error("line {line}: {source}")]
    Field {
        line: usize,
        #[source]
        source: FieldError,
    },
}

/// Per-run settings for the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Category marker handled by this run (e.g., "NOPARMO")
    pub category: String,
    /// Leading marker of the encoding column (e.g., "%")
    pub encoding_marker: String,
    /// Fixed bits shared by every entry of the category (e.g., "0000")
    pub fixed_prefix: String,
    /// Prefix for generated opcode identifiers (e.g., "O_")
    pub opcode_prefix: String,
    /// Number of leading pattern bits used for partitioning
    pub top_bits: u8,
    /// Also register opcode names of entries from other categories
    pub enum_all_categories: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            category: "NOPARMO".to_string(),
            encoding_marker: "%".to_string(),
            fixed_prefix: "0000".to_string(),
            opcode_prefix: "O_".to_string(),
            top_bits: 6,
            enum_all_categories: false,
        }
    }
}

/// Builds records from entries, tracking state that spans lines.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    options: BuildOptions,
    /// Opcode of the most recent named entry, for `-` continuations
    current_opcode: Option<String>,
    /// Pattern width fixed by the first record
    width: Option<usize>,
}

impl RecordBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            current_opcode: None,
            width: None,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Pattern width of the run, once the first record is built.
    pub fn width(&self) -> Option<usize> {
        self.width
    }

    /// Identifier for an opcode name as written (e.g., "andi" -> "O_ANDI",
    /// "move.l" -> "O_MOVE_L").
    pub fn opcode_ident(&self, name: &str) -> String {
        let name: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}{}", self.options.opcode_prefix, name)
    }

    /// Build a record from one entry.
    ///
    /// Returns `Ok(None)` for entries outside the target category.
    pub fn build(
        &mut self,
        entry: &SourceEntry,
        fields: &mut FieldRegistry,
        opcodes: &mut OpcodeRegistry,
    ) -> Result<Option<EncodingRecord>, BuildError> {
        if !entry.is_continuation() {
            self.current_opcode = Some(self.opcode_ident(&entry.name));
        }

        if entry.category != self.options.category {
            if self.options.enum_all_categories {
                if let Some(opcode) = &self.current_opcode {
                    opcodes.insert(opcode);
                }
            }
            return Ok(None);
        }

        let opcode = self
            .current_opcode
            .clone()
            .ok_or(BuildError::OrphanContinuation { line: entry.line })?;

        let expected = format!("{}{}", self.options.encoding_marker, self.options.fixed_prefix);
        let pattern = entry
            .encoding
            .strip_prefix(expected.as_str())
            .ok_or_else(|| BuildError::PrefixMismatch {
                line: entry.line,
                opcode: opcode.clone(),
                expected: expected.clone(),
                encoding: entry.encoding.clone(),
            })?;

        let width = pattern.chars().count();
        self.check_width(entry.line, &opcode, width)?;

        let compiled = compile(pattern);
        let field_tag = fields
            .register(&compiled.field_signature)
            .map_err(|source| BuildError::Field {
                line: entry.line,
                source,
            })?;
        opcodes.insert(&opcode);

        log::debug!(
            "{:<12} {} mask={:#x} value={:#x} fields={}",
            opcode,
            pattern,
            compiled.mask,
            compiled.value,
            field_tag
        );

        Ok(Some(EncodingRecord {
            opcode,
            pattern: pattern.to_string(),
            compiled,
            field_tag,
            meta: RecordMeta {
                args: entry.args.clone(),
                notes: entry.notes.clone(),
                decode_hint: entry.decode_hint.clone(),
                line: entry.line,
            },
        }))
    }

    fn check_width(&mut self, line: usize, opcode: &str, width: usize) -> Result<(), BuildError> {
        let min = (self.options.top_bits as usize).max(1);
        if width < min || width > MAX_PATTERN_WIDTH {
            return Err(BuildError::BadWidth {
                line,
                opcode: opcode.to_string(),
                width,
                min,
                max: MAX_PATTERN_WIDTH,
            });
        }

        match self.width {
            Some(expected) if expected != width => Err(BuildError::WidthMismatch {
                line,
                opcode: opcode.to_string(),
                expected,
                got: width,
            }),
            Some(_) => Ok(()),
            None => {
                self.width = Some(width);
                Ok(())
            }
        }
    }
}
