//! Runtime side of the generated tables.
//!
//! Generated code calls one field routine per matching encoding. The
//! [`FieldDecoder`] trait is the same seam in Rust: the surrounding decoder
//! supplies operand extraction, keyed by [`FieldTag`], while the compiler only
//! decides *which* routine runs for a header.
//!
//! [`TableDecoder`] walks a compiled [`DispatchTable`] in memory exactly the
//! way the generated chains do. It's used to check tables before emitting them
//! and to decode headers without generating code at all.
//!
//! # Example
//!
//! ```ignore
//! use decodegen::decode::{PlaceholderDecoder, TableDecoder};
//!
//! let mut decoder = TableDecoder::new(&unit.table, PlaceholderDecoder);
//! let ctx = decoder.decode(0x0000C)?;
//! assert_eq!(ctx.opcode.as_deref(), Some("O_RTS"));
//! ```

use thiserror::Error;

use crate::tablegen::{DispatchTable, FieldTag};

/// Errors from decoding a header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No test in the header's slot matched.
    #[error("no encoding matches header 0x{header:x} (slot {slot:02x})")]
    NoMatch { header: u64, slot: usize },

    /// A field routine rejected the operand bits.
    #[error("field decoder '{tag}' rejected {opcode}: {reason}")]
    Rejected {
        tag: FieldTag,
        opcode: String,
        reason: String,
    },
}

/// State passed through one decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeContext {
    /// Instruction header being decoded
    pub header: u64,
    /// Opcode selected by the field routine
    pub opcode: Option<String>,
}

impl DecodeContext {
    pub fn new(header: u64) -> Self {
        Self {
            header,
            opcode: None,
        }
    }
}

/// Operand decoding for one field layout.
///
/// Called after a chain test has selected `opcode`; `tag` names the layout of
/// the variable bits in `ctx.header`.
pub trait FieldDecoder {
    fn decode(&mut self, tag: &FieldTag, ctx: &mut DecodeContext, opcode: &str) -> Result<(), DecodeError>;
}

/// Records the opcode and succeeds, like the generated routine stubs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderDecoder;

impl FieldDecoder for PlaceholderDecoder {
    fn decode(&mut self, _tag: &FieldTag, ctx: &mut DecodeContext, opcode: &str) -> Result<(), DecodeError> {
        ctx.opcode = Some(opcode.to_string());
        Ok(())
    }
}

/// In-memory decoder over a compiled dispatch table.
pub struct TableDecoder<'a, D: FieldDecoder> {
    table: &'a DispatchTable,
    fields: D,

    /// Statistics: successful decodes.
    decode_count: u64,
    /// Statistics: headers with no matching encoding.
    unknown_count: u64,
}

impl<'a, D: FieldDecoder> TableDecoder<'a, D> {
    pub fn new(table: &'a DispatchTable, fields: D) -> Self {
        Self {
            table,
            fields,
            decode_count: 0,
            unknown_count: 0,
        }
    }

    /// Decode one header.
    ///
    /// The slot is chosen from the header's top bits and its tests run in
    /// order; the first match hands off to the field decoder.
    pub fn decode(&mut self, header: u64) -> Result<DecodeContext, DecodeError> {
        let Some(test) = self.table.lookup(header) else {
            self.unknown_count += 1;
            return Err(DecodeError::NoMatch {
                header,
                slot: self.table.slot_of(header),
            });
        };

        let mut ctx = DecodeContext::new(header);
        self.fields.decode(&test.field_tag, &mut ctx, &test.opcode)?;
        self.decode_count += 1;
        Ok(ctx)
    }

    /// Get decode statistics: (successful, unknown).
    pub fn stats(&self) -> (u64, u64) {
        (self.decode_count, self.unknown_count)
    }

    pub fn field_decoder(&self) -> &D {
        &self.fields
    }
}
