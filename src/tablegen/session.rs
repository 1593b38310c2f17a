//! Compilation session.
//!
//! A [`Session`] owns every accumulator of one run (record list, field
//! registry, opcode registry) and drives the pipeline:
//!
//! ```text
//! entries -> RecordBuilder -> records -> partition -> resolver -> CompiledUnit
//! ```
//!
//! Nothing is emitted from here. A [`CompiledUnit`] only exists once every
//! record has been built, placed and disambiguated, so backends never see a
//! half-validated run.

use std::collections::BTreeSet;

use super::builder::{BuildError, BuildOptions, RecordBuilder};
use super::fields::FieldRegistry;
use super::opcodes::{OpcodeRegistry, OpcodeTable};
use super::parser::ParseError;
use super::partition::{partition, PartitionError};
use super::resolver::{build_dispatch_table, Conflict, DispatchTable};
use super::types::{EncodingRecord, SourceEntry};

/// Any fatal error of a compilation run.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Partition(#[from] PartitionError),
}

/// Accumulates records for one run.
#[derive(Debug, Clone)]
pub struct Session {
    builder: RecordBuilder,
    fields: FieldRegistry,
    opcodes: OpcodeRegistry,
    records: Vec<EncodingRecord>,
}

impl Session {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            builder: RecordBuilder::new(options),
            fields: FieldRegistry::new(),
            opcodes: OpcodeRegistry::new(),
            records: Vec::new(),
        }
    }

    pub fn options(&self) -> &BuildOptions {
        self.builder.options()
    }

    /// Feed one entry. Returns the new record's index, or `None` if the entry
    /// belongs to another category.
    pub fn add_entry(&mut self, entry: &SourceEntry) -> Result<Option<usize>, CompileError> {
        let Some(record) = self
            .builder
            .build(entry, &mut self.fields, &mut self.opcodes)?
        else {
            return Ok(None);
        };

        let idx = self.records.len();
        self.fields.add_user(&record.compiled.field_signature, idx);
        self.records.push(record);
        Ok(Some(idx))
    }

    /// Feed a sequence of entries, stopping at the first fatal error.
    pub fn add_entries<'a>(
        &mut self,
        entries: impl IntoIterator<Item = &'a SourceEntry>,
    ) -> Result<(), CompileError> {
        for entry in entries {
            self.add_entry(entry)?;
        }
        Ok(())
    }

    pub fn records(&self) -> &[EncodingRecord] {
        &self.records
    }

    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn opcodes(&self) -> &OpcodeRegistry {
        &self.opcodes
    }

    /// Partition and disambiguate, finalizing the registries.
    pub fn finish(self) -> Result<CompiledUnit, CompileError> {
        let options = self.builder.options().clone();
        let top_bits = options.top_bits;

        if self.records.is_empty() {
            log::warn!("No entries matched category '{}'", options.category);
        }
        let width = self.builder.width().unwrap_or(top_bits as usize);

        let slots = partition(&self.records, top_bits)?;
        let (table, conflicts) = build_dispatch_table(&slots, &self.records, width, top_bits);

        let decode_hints: BTreeSet<String> = self
            .records
            .iter()
            .filter_map(|r| r.meta.decode_hint.clone())
            .collect();

        log::info!(
            "Compiled {} records: {} opcodes, {} field layouts, {} slots, {} tests",
            self.records.len(),
            self.opcodes.len(),
            self.fields.len(),
            table.chains.len(),
            table.test_count()
        );

        Ok(CompiledUnit {
            options,
            records: self.records,
            fields: self.fields,
            opcodes: self.opcodes.finalize(),
            table,
            conflicts,
            decode_hints,
        })
    }
}

/// Fully validated output of a run, ready for emission.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub options: BuildOptions,
    pub records: Vec<EncodingRecord>,
    pub fields: FieldRegistry,
    pub opcodes: OpcodeTable,
    pub table: DispatchTable,
    /// Duplicate patterns found while disambiguating (non-fatal)
    pub conflicts: Vec<Conflict>,
    /// Distinct assembler decode functions named by the entries
    pub decode_hints: BTreeSet<String>,
}

impl CompiledUnit {
    /// Counts for the end-of-run report.
    pub fn summary(&self) -> CompileSummary {
        CompileSummary {
            records: self.records.len(),
            opcodes: self.opcodes.opcode_count(),
            field_routines: self.fields.len(),
            slots: self.table.chains.len(),
            tests: self.table.test_count(),
            conflicts: self.conflicts.len(),
            decode_functions: self.decode_hints.len(),
        }
    }
}

/// End-of-run statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileSummary {
    pub records: usize,
    pub opcodes: usize,
    pub field_routines: usize,
    pub slots: usize,
    pub tests: usize,
    pub conflicts: usize,
    pub decode_functions: usize,
}
