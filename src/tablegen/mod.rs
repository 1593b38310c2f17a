//! Decode-table compiler for bit-pattern instruction descriptions.
//!
//! This module reads an opcode description (one bit pattern per encoding,
//! e.g. the DSP56000 `.mch` table used by the assembler) and compiles it into
//! a two-level dispatch structure for a runtime decoder.
//!
//! # Overview
//!
//! The pipeline runs strictly leaf-first:
//! - `pattern` - bit pattern string to mask/value/field signature
//! - `fields` - field signatures to unique routine tags
//! - `builder` - description entry to [`EncodingRecord`]
//! - `partition` - records bucketed by the header's top bits
//! - `resolver` - per-bucket duplicate detection and specificity ordering
//!
//! A [`Session`] owns the registries of one run and produces a
//! [`CompiledUnit`], which the `emit` backends turn into source files.
//!
//! # Example
//!
//! ```ignore
//! use decodegen::tablegen::{compile_file, BuildOptions};
//!
//! let unit = compile_file("dsp56k.mch", BuildOptions::default())?;
//! for conflict in &unit.conflicts {
//!     eprintln!("{}", conflict);
//! }
//! println!("{} slots, {} tests", unit.table.chains.len(), unit.table.test_count());
//! ```

mod builder;
mod fields;
mod opcodes;
mod parser;
mod partition;
mod pattern;
mod resolver;
mod session;
mod types;

pub use builder::{BuildError, BuildOptions, RecordBuilder, MAX_PATTERN_WIDTH};
pub use fields::{FieldEntry, FieldError, FieldRegistry};
pub use opcodes::{OpcodeRegistry, OpcodeTable, INVALID_OPCODE, OPCODE_COUNT};
pub use parser::{load_description, parse_description, parse_line, ParseError};
pub use partition::{partition, slots_for_prefix, PartitionError, Slot, MAX_TOP_BITS};
pub use pattern::compile;
pub use resolver::{build_dispatch_table, resolve_slot, ChainTest, Conflict, DispatchTable, SlotChain};
pub use session::{CompileError, CompileSummary, CompiledUnit, Session};
pub use types::{CompiledPattern, EncodingRecord, FieldTag, RecordMeta, SourceEntry, NO_FIELD_TAG};

use std::path::Path;

/// Compile description text in one go.
pub fn compile_description(content: &str, options: BuildOptions) -> Result<CompiledUnit, CompileError> {
    let entries = parse_description(content);
    let mut session = Session::new(options);
    session.add_entries(&entries)?;
    session.finish()
}

/// Read and compile a description file.
pub fn compile_file(path: impl AsRef<Path>, options: BuildOptions) -> Result<CompiledUnit, CompileError> {
    let entries = load_description(path)?;
    let mut session = Session::new(options);
    session.add_entries(&entries)?;
    session.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sample description shipped with the crate.
    const SAMPLE: &str = include_str!("../../data/dsp56k_nonp.mch");

    #[test]
    fn test_compile_sample() {
        let unit = compile_description(SAMPLE, BuildOptions::default()).unwrap();
        let summary = unit.summary();

        eprintln!("Sample: {:?}", summary);
        assert!(summary.records > 0);
        assert_eq!(summary.slots, 64);
        assert_eq!(unit.table.width, 20);

        // Every record is reachable from at least one chain, or was dropped
        // as a duplicate of an earlier record
        for (idx, record) in unit.records.iter().enumerate() {
            let in_chain = unit
                .table
                .chains
                .iter()
                .any(|c| c.tests.iter().any(|t| t.record == idx));
            let dropped = unit.conflicts.iter().any(|c| c.dropped == record.opcode);
            assert!(in_chain || dropped, "{} unreachable", record.opcode);
        }
    }

    #[test]
    fn test_sample_chains_are_ordered() {
        let unit = compile_description(SAMPLE, BuildOptions::default()).unwrap();

        for chain in &unit.table.chains {
            for pair in chain.tests.windows(2) {
                assert!(
                    pair[0].specificity >= pair[1].specificity,
                    "slot {:02x}: {} tested before more specific {}",
                    chain.index,
                    pair[0].opcode,
                    pair[1].opcode
                );
            }
        }
    }

    #[test]
    fn test_sample_known_headers() {
        let unit = compile_description(SAMPLE, BuildOptions::default()).unwrap();

        // nop: all bits zero
        assert_eq!(unit.table.lookup(0x00000).unwrap().opcode, "O_NOP");
        // rts: 0000 0000 0000 0000 1100
        assert_eq!(unit.table.lookup(0x0000C).unwrap().opcode, "O_RTS");
        // jmp $123: 1100 0000 0001 0010 0011
        let jmp = unit.table.lookup(0xC0123).unwrap();
        assert_eq!(jmp.opcode, "O_JMP");
        assert_eq!(jmp.field_tag.as_str(), "aaaaaaaaaaaa");
    }

    #[test]
    fn test_compile_is_deterministic() {
        let a = compile_description(SAMPLE, BuildOptions::default()).unwrap();
        let b = compile_description(SAMPLE, BuildOptions::default()).unwrap();
        assert_eq!(a.table, b.table);
        assert_eq!(a.opcodes, b.opcodes);
        assert_eq!(a.conflicts, b.conflicts);
    }

    #[test]
    fn test_compile_missing_file() {
        let result = compile_file("/nonexistent/dsp56k.mch", BuildOptions::default());
        assert!(matches!(result, Err(CompileError::Parse(_))));
    }
}
