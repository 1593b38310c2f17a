//! Type definitions for decode-table compilation.
//!
//! These types represent the parsed instruction description (one
//! [`SourceEntry`] per line) and the compiled forms derived from it:
//! [`CompiledPattern`] for a bit pattern and [`EncodingRecord`] for a whole
//! opcode encoding.
//!
//! ## Bit Patterns
//!
//! A bit pattern is written MSB first. `0` and `1` are fixed bits, any other
//! character is a wildcard that names the operand field occupying that bit:
//!
//! ```text
//! 0000iiiiiiii101110ee
//! ^^^^        ^^^^^^      fixed bits
//!     ^^^^^^^^      ^^    fields "i" and "e"
//! ```

use std::fmt;

/// Tag used for encodings that carry no variable fields at all.
pub const NO_FIELD_TAG: &str = "none";

/// One instruction-description entry, as read from the description file.
///
/// Input line example:
/// ```text
/// andi    #xx     D       NOPARMO %00000000iiiiiiii101110ee dsp_immcr ee=(mr=0, ccr=1, omr=2)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Opcode name as written (e.g., "andi"), or "-" to continue the previous opcode
    pub name: String,
    /// Operand-role columns (e.g., ["#xx", "D"])
    pub args: [String; 2],
    /// Category marker used to select entries for this generator (e.g., "NOPARMO")
    pub category: String,
    /// Raw encoding including marker and shared prefix (e.g., "%0000...")
    pub encoding: String,
    /// Free-form trailing columns joined by single spaces
    pub notes: String,
    /// First trailing column, naming the decode function used by the assembler
    pub decode_hint: Option<String>,
    /// 1-based line number in the description file
    pub line: usize,
}

impl SourceEntry {
    /// Whether this entry continues the previous entry's opcode.
    pub fn is_continuation(&self) -> bool {
        self.name == "-"
    }
}

/// A compiled bit pattern.
///
/// Position 0 of the source string is the most significant bit of a
/// `width`-bit integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledPattern {
    /// Bits that are fixed (1 = fixed)
    pub mask: u64,
    /// Expected values of the fixed bits; always a subset of `mask`
    pub value: u64,
    /// Pattern with fixed positions replaced by `_`
    pub field_signature: String,
    /// Number of fixed bits
    pub specificity: u32,
}

impl CompiledPattern {
    /// Number of bit positions covered by the pattern.
    pub fn width(&self) -> usize {
        self.field_signature.chars().count()
    }

    /// Check if a word satisfies every fixed bit of this pattern.
    #[inline]
    pub fn matches(&self, word: u64) -> bool {
        (word & self.mask) == self.value
    }
}

/// Canonical name of a variable-field layout.
///
/// Each distinct tag names one shared decode routine in the generated output,
/// e.g. `decode_nonp_jjd`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldTag(String);

impl FieldTag {
    /// Derive the tag for a field signature by deleting all `_` characters.
    pub fn from_signature(signature: &str) -> Self {
        let tag: String = signature.chars().filter(|&c| c != '_').collect();
        if tag.is_empty() {
            Self(NO_FIELD_TAG.to_string())
        } else {
            Self(tag)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the reserved tag for field-less encodings.
    pub fn is_none(&self) -> bool {
        self.0 == NO_FIELD_TAG
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-form metadata carried through from the description entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordMeta {
    /// Operand-role hints (e.g., ["#xx", "D"])
    pub args: [String; 2],
    /// Trailing notes
    pub notes: String,
    /// Assembler decode function named by the entry, if any
    pub decode_hint: Option<String>,
    /// Source line number
    pub line: usize,
}

/// A fully compiled opcode encoding.
///
/// Created once per matching description entry and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingRecord {
    /// Opcode identifier (e.g., "O_ANDI")
    pub opcode: String,
    /// Bit pattern with the shared prefix stripped
    pub pattern: String,
    /// Compiled form of `pattern`
    pub compiled: CompiledPattern,
    /// Tag of the shared decode routine for this field layout
    pub field_tag: FieldTag,
    pub meta: RecordMeta,
}

impl EncodingRecord {
    /// Number of fixed bits in the full pattern (matching priority).
    ///
    /// Higher specificity = more fixed bits = tested first.
    pub fn specificity(&self) -> u32 {
        self.compiled.specificity
    }

    /// Check if an instruction header matches this encoding.
    #[inline]
    pub fn matches(&self, header: u64) -> bool {
        self.compiled.matches(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_tag_strips_underscores() {
        assert_eq!(FieldTag::from_signature("____jjd___").as_str(), "jjd");
        assert_eq!(
            FieldTag::from_signature("____iiiiiiii______ee").as_str(),
            "iiiiiiiiee"
        );
    }

    #[test]
    fn test_field_tag_none() {
        let tag = FieldTag::from_signature("________");
        assert!(tag.is_none());
        assert_eq!(tag.to_string(), NO_FIELD_TAG);

        assert!(FieldTag::from_signature("").is_none());
    }

    #[test]
    fn test_record_matches_header() {
        let compiled = crate::tablegen::pattern::compile("00011000000001jjd000");
        let record = EncodingRecord {
            opcode: "O_DIV".to_string(),
            pattern: "00011000000001jjd000".to_string(),
            field_tag: FieldTag::from_signature(&compiled.field_signature),
            compiled,
            meta: RecordMeta::default(),
        };

        // div x1,b: jj=10 d=1
        assert!(record.matches(0b0001_1000_0000_0110_1000));
        // Fixed low bits set
        assert!(!record.matches(0b0001_1000_0000_0110_1001));
        assert!(!record.matches(0));
    }

    #[test]
    fn test_continuation_entry() {
        let entry = SourceEntry {
            name: "-".to_string(),
            args: ["S".to_string(), "D".to_string()],
            category: "NOPARMO".to_string(),
            encoding: "%0000".to_string(),
            notes: String::new(),
            decode_hint: None,
            line: 3,
        };
        assert!(entry.is_continuation());
    }
}
