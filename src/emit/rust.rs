//! Rust backend.
//!
//! The generated files form one module. The parent module must provide a
//! `DecodeContext` type with a `header: u64` field and an `opcode: Opcode`
//! field:
//!
//! ```ignore
//! mod opcode;
//! mod fields;
//! mod tables;
//!
//! pub use opcode::Opcode;
//!
//! pub struct DecodeContext {
//!     pub header: u64,
//!     pub opcode: Opcode,
//! }
//! ```

use std::fmt::Write;

use super::{hex_digits, Backend, EmitError, GeneratedFile};
use crate::tablegen::{CompiledUnit, FieldTag};

const ROUTINE_PREFIX: &str = "decode_nonp_";
const CHAIN_PREFIX: &str = "decode_idx_";

const GENERATED_HEADER: &str = "// DO NOT EDIT\n// Generated by decodegen\n";

/// Renders the dispatch tables as Rust sources.
#[derive(Debug, Clone, Default)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }

    fn render_opcode(&self, unit: &CompiledUnit) -> Result<String, EmitError> {
        let names = unit.opcodes.names();
        let variants = &names[..names.len() - 1];
        let mut out = String::from(GENERATED_HEADER);

        writeln!(out)?;
        writeln!(out, "/// Opcodes of the decoded instruction set.")?;
        writeln!(out, "#[allow(non_camel_case_types)]")?;
        writeln!(out, "#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]")?;
        writeln!(out, "#[repr(u16)]")?;
        writeln!(out, "pub enum Opcode {{")?;
        for (value, name) in variants.iter().enumerate() {
            if value == 0 {
                writeln!(out, "    #[default]")?;
            }
            writeln!(out, "    {} = {},", name, value)?;
        }
        writeln!(out, "}}")?;
        writeln!(out)?;
        writeln!(out, "/// Number of enumeration values, `INVALID` included.")?;
        writeln!(out, "pub const OPCODE_COUNT: usize = {};", variants.len())?;
        writeln!(out)?;
        writeln!(out, "/// Display names indexed by `Opcode as usize`.")?;
        writeln!(out, "pub static OPCODE_NAMES: [&str; OPCODE_COUNT] = [")?;
        for name in unit.opcodes.indexed_names(&unit.options.opcode_prefix) {
            writeln!(out, "    \"{}\",", name)?;
        }
        writeln!(out, "];")?;
        writeln!(out)?;
        writeln!(out, "impl Opcode {{")?;
        writeln!(out, "    pub fn name(self) -> &'static str {{")?;
        writeln!(out, "        OPCODE_NAMES[self as usize]")?;
        writeln!(out, "    }}")?;
        writeln!(out, "}}")?;
        Ok(out)
    }

    fn render_tables(&self, unit: &CompiledUnit) -> Result<String, EmitError> {
        let table = &unit.table;
        let digits = hex_digits(table.width);
        let slot_digits = hex_digits(table.top_bits as usize).max(2);
        let shift = table.width.saturating_sub(table.top_bits as usize);
        let slot_mask = (1usize << table.top_bits) - 1;
        let mut out = String::from(GENERATED_HEADER);

        writeln!(out)?;
        writeln!(out, "use super::fields::*;")?;
        writeln!(out, "use super::opcode::Opcode;")?;
        writeln!(out, "use super::DecodeContext;")?;
        writeln!(out)?;
        writeln!(out, "/// Decoder for one group of headers sharing the same top bits.")?;
        writeln!(out, "pub type SlotDecoder = fn(&mut DecodeContext) -> bool;")?;

        for chain in &table.chains {
            writeln!(out)?;
            writeln!(
                out,
                "// Decode with top bits = %{:0width$b}",
                chain.index,
                width = table.top_bits as usize
            )?;
            if chain.tests.is_empty() {
                writeln!(
                    out,
                    "fn {}{:0sd$x}(_ctx: &mut DecodeContext) -> bool {{",
                    CHAIN_PREFIX,
                    chain.index,
                    sd = slot_digits
                )?;
                writeln!(out, "    false")?;
                writeln!(out, "}}")?;
                continue;
            }

            writeln!(
                out,
                "fn {}{:0sd$x}(ctx: &mut DecodeContext) -> bool {{",
                CHAIN_PREFIX,
                chain.index,
                sd = slot_digits
            )?;
            for test in &chain.tests {
                writeln!(
                    out,
                    "    if (ctx.header & 0x{:0d$x}) == 0x{:0d$x} {{",
                    test.mask,
                    test.value,
                    d = digits
                )?;
                writeln!(
                    out,
                    "        return {}(ctx, Opcode::{});",
                    routine_name(&test.field_tag),
                    test.opcode
                )?;
                writeln!(out, "    }}")?;
            }
            writeln!(out, "    false")?;
            writeln!(out, "}}")?;
        }

        writeln!(out)?;
        writeln!(
            out,
            "/// Maps the top {} bits of the instruction header to a slot decoder.",
            table.top_bits
        )?;
        writeln!(
            out,
            "pub static DISPATCH: [SlotDecoder; {}] = [",
            table.chains.len()
        )?;
        for chain in &table.chains {
            writeln!(out, "    {}{:0sd$x},", CHAIN_PREFIX, chain.index, sd = slot_digits)?;
        }
        writeln!(out, "];")?;
        writeln!(out)?;
        writeln!(out, "/// Decode `ctx.header`. Returns `false` if no encoding matches.")?;
        writeln!(out, "pub fn decode(ctx: &mut DecodeContext) -> bool {{")?;
        writeln!(
            out,
            "    DISPATCH[((ctx.header >> {}) & 0x{:x}) as usize](ctx)",
            shift, slot_mask
        )?;
        writeln!(out, "}}")?;
        Ok(out)
    }

    fn render_fields(&self, unit: &CompiledUnit) -> Result<String, EmitError> {
        let mut out = String::from(GENERATED_HEADER);

        // Field symbols keep their case in routine names (e.g. `decode_nonp_jjjdTTT`)
        writeln!(out)?;
        writeln!(out, "#![allow(non_snake_case)]")?;
        writeln!(out)?;
        writeln!(out, "use super::opcode::Opcode;")?;
        writeln!(out, "use super::DecodeContext;")?;

        for entry in unit.fields.entries() {
            writeln!(out)?;
            writeln!(out, "/// Decoder for field type `{}`", entry.signature)?;
            writeln!(out, "///")?;
            for &idx in &entry.users {
                let record = &unit.records[idx];
                writeln!(
                    out,
                    "/// - `{}` {} '{}'",
                    record.pattern, record.opcode, record.meta.notes
                )?;
            }
            writeln!(
                out,
                "pub fn {}(ctx: &mut DecodeContext, opcode: Opcode) -> bool {{",
                routine_name(&entry.tag)
            )?;
            writeln!(out, "    ctx.opcode = opcode;")?;
            writeln!(out, "    true")?;
            writeln!(out, "}}")?;
        }
        Ok(out)
    }
}

fn routine_name(tag: &FieldTag) -> String {
    format!("{}{}", ROUTINE_PREFIX, tag)
}

impl Backend for RustBackend {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn render(&self, unit: &CompiledUnit) -> Result<Vec<GeneratedFile>, EmitError> {
        Ok(vec![
            GeneratedFile::new("opcode.rs", self.render_opcode(unit)?),
            GeneratedFile::new("tables.rs", self.render_tables(unit)?),
            GeneratedFile::new("fields.rs", self.render_fields(unit)?),
        ])
    }
}
