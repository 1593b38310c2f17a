//! Disambiguation of overlapping encodings within a partition slot.
//!
//! Several encodings can match the same header inside one slot when their
//! field positions overlap differently. The resolver turns each slot into an
//! ordered chain of mask/value tests:
//!
//! 1. Drop encodings whose `(mask, value)` repeats an earlier one in the slot
//!    (the first registered wins, the clash is reported as a [`Conflict`])
//! 2. Sort by specificity, most fixed bits first
//! 3. Emit one [`ChainTest`] per remaining encoding
//!
//! The sort is stable, so encodings with equal specificity keep registration
//! order. That tie-break is positional only; it says nothing about which
//! encoding the instruction set intends.

use std::collections::HashMap;
use std::fmt;

use super::partition::Slot;
use super::types::{EncodingRecord, FieldTag};

/// Two opcodes claiming the identical bit pattern.
///
/// A pair whose top bits hold wildcards clashes in every slot it lands in;
/// those are merged into one conflict listing all the slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Slots where the clash was found, in ascending order
    pub slots: Vec<usize>,
    /// Opcode that stays in the chain (registered first)
    pub kept: String,
    /// Opcode dropped from the chain
    pub dropped: String,
    /// Record indices of the kept and dropped entries
    pub records: (usize, usize),
    pub mask: u64,
    pub value: u64,
    /// Source lines of the kept and dropped entries
    pub lines: (usize, usize),
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots: Vec<String> = self.slots.iter().map(|s| format!("{:02x}", s)).collect();
        write!(
            f,
            "{} {}: mask/value pair of {} (line {}) already used by {} (line {}), mask={:#x} value={:#x}",
            if self.slots.len() == 1 { "slot" } else { "slots" },
            slots.join(","),
            self.dropped,
            self.lines.1,
            self.kept,
            self.lines.0,
            self.mask,
            self.value
        )
    }
}

/// One test in a slot's chain: `(header & mask) == value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTest {
    pub mask: u64,
    pub value: u64,
    /// Opcode selected on match
    pub opcode: String,
    /// Field decode routine invoked on match
    pub field_tag: FieldTag,
    /// Index of the source record
    pub record: usize,
    /// Fixed bit count of the full pattern
    pub specificity: u32,
}

impl ChainTest {
    #[inline]
    pub fn matches(&self, header: u64) -> bool {
        (header & self.mask) == self.value
    }
}

/// Ordered test chain for one partition slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChain {
    pub index: usize,
    pub tests: Vec<ChainTest>,
}

impl SlotChain {
    /// First test matching the header, if any.
    pub fn lookup(&self, header: u64) -> Option<&ChainTest> {
        self.tests.iter().find(|t| t.matches(header))
    }
}

/// The full two-level dispatch structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTable {
    /// Number of top header bits selecting a slot
    pub top_bits: u8,
    /// Width of the header in bits
    pub width: usize,
    /// One chain per slot, indexed by slot number
    pub chains: Vec<SlotChain>,
}

impl DispatchTable {
    /// Slot selected by a header's top bits.
    pub fn slot_of(&self, header: u64) -> usize {
        let shift = self.width.saturating_sub(self.top_bits as usize);
        ((header >> shift) as usize) & ((1usize << self.top_bits) - 1)
    }

    /// Walk the chain for a header exactly as generated code would.
    pub fn lookup(&self, header: u64) -> Option<&ChainTest> {
        self.chains.get(self.slot_of(header))?.lookup(header)
    }

    /// Total number of tests across all chains.
    pub fn test_count(&self) -> usize {
        self.chains.iter().map(|c| c.tests.len()).sum()
    }
}

/// Build the ordered chain for one slot, appending any duplicates found to
/// `conflicts` (one per dropped record, naming only this slot).
pub fn resolve_slot(
    slot: &Slot,
    records: &[EncodingRecord],
    conflicts: &mut Vec<Conflict>,
) -> SlotChain {
    let mut seen: HashMap<(u64, u64), usize> = HashMap::new();
    let mut kept: Vec<usize> = Vec::with_capacity(slot.records.len());

    for &idx in &slot.records {
        let record = &records[idx];
        let pair = (record.compiled.mask, record.compiled.value);

        if let Some(&first) = seen.get(&pair) {
            let conflict = Conflict {
                slots: vec![slot.index],
                kept: records[first].opcode.clone(),
                dropped: record.opcode.clone(),
                records: (first, idx),
                mask: pair.0,
                value: pair.1,
                lines: (records[first].meta.line, record.meta.line),
            };
            log::debug!("{}", conflict);
            conflicts.push(conflict);
        } else {
            seen.insert(pair, idx);
            kept.push(idx);
        }
    }

    // Stable: equal specificity keeps registration order
    kept.sort_by(|&a, &b| records[b].specificity().cmp(&records[a].specificity()));

    let tests = kept
        .into_iter()
        .map(|idx| {
            let record = &records[idx];
            ChainTest {
                mask: record.compiled.mask,
                value: record.compiled.value,
                opcode: record.opcode.clone(),
                field_tag: record.field_tag.clone(),
                record: idx,
                specificity: record.specificity(),
            }
        })
        .collect();

    SlotChain {
        index: slot.index,
        tests,
    }
}

/// Resolve every slot into a dispatch table.
///
/// Returns the table and the conflicts found, one per clashing record pair,
/// ordered by the first slot they appear in.
pub fn build_dispatch_table(
    slots: &[Slot],
    records: &[EncodingRecord],
    width: usize,
    top_bits: u8,
) -> (DispatchTable, Vec<Conflict>) {
    let mut per_slot = Vec::new();
    let chains = slots
        .iter()
        .map(|slot| resolve_slot(slot, records, &mut per_slot))
        .collect();

    let mut conflicts: Vec<Conflict> = Vec::new();
    for conflict in per_slot {
        match conflicts.iter_mut().find(|c| c.records == conflict.records) {
            Some(existing) => existing.slots.extend(conflict.slots),
            None => conflicts.push(conflict),
        }
    }
    for conflict in &conflicts {
        log::warn!("{}", conflict);
    }

    (
        DispatchTable {
            top_bits,
            width,
            chains,
        },
        conflicts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tablegen::partition::partition;
    use crate::tablegen::pattern::compile;
    use crate::tablegen::types::RecordMeta;

    fn record(opcode: &str, pattern: &str, line: usize) -> EncodingRecord {
        let compiled = compile(pattern);
        EncodingRecord {
            opcode: opcode.to_string(),
            pattern: pattern.to_string(),
            field_tag: FieldTag::from_signature(&compiled.field_signature),
            compiled,
            meta: RecordMeta {
                line,
                ..RecordMeta::default()
            },
        }
    }

    fn table_for(records: &[EncodingRecord]) -> (DispatchTable, Vec<Conflict>) {
        let width = records[0].pattern.len();
        let slots = partition(records, 6).unwrap();
        build_dispatch_table(&slots, records, width, 6)
    }

    #[test]
    fn test_specificity_ordering() {
        // Registered general-first; the specific pattern must be tested first
        let records = vec![
            record("O_GENERAL", "000000aaaa", 1),  // specificity 6
            record("O_SPECIFIC", "0000001010", 2), // specificity 10
        ];
        let (table, conflicts) = table_for(&records);

        assert!(conflicts.is_empty());
        let opcodes: Vec<_> = table.chains[0].tests.iter().map(|t| t.opcode.as_str()).collect();
        assert_eq!(opcodes, vec!["O_SPECIFIC", "O_GENERAL"]);
        assert_eq!(table.chains[0].tests[0].specificity, 10);
        assert_eq!(table.chains[0].tests[1].specificity, 6);

        // A header satisfying both patterns resolves to the specific one
        assert_eq!(table.lookup(0b0000001010).unwrap().opcode, "O_SPECIFIC");
        assert_eq!(table.lookup(0b0000000110).unwrap().opcode, "O_GENERAL");
    }

    #[test]
    fn test_equal_specificity_keeps_registration_order() {
        let records = vec![
            record("O_FIRST", "000000a0a0", 1),
            record("O_SECOND", "0000000b0b", 2),
        ];
        let (table, _) = table_for(&records);

        let opcodes: Vec<_> = table.chains[0].tests.iter().map(|t| t.opcode.as_str()).collect();
        assert_eq!(opcodes, vec!["O_FIRST", "O_SECOND"]);
    }

    #[test]
    fn test_duplicate_pattern_reported_once() {
        let records = vec![
            record("O_ORIG", "011000xx01", 4),
            record("O_CLONE", "011000yy01", 9),
        ];
        let (table, conflicts) = table_for(&records);

        assert_eq!(conflicts.len(), 1);
        let conflict = &conflicts[0];
        assert_eq!(conflict.slots, vec![0b011000]);
        assert_eq!(conflict.records, (0, 1));
        assert_eq!(conflict.kept, "O_ORIG");
        assert_eq!(conflict.dropped, "O_CLONE");
        assert_eq!(conflict.mask, records[0].compiled.mask);
        assert_eq!(conflict.value, records[0].compiled.value);
        assert_eq!(conflict.lines, (4, 9));

        let chain = &table.chains[0b011000];
        assert_eq!(chain.tests.len(), 1);
        assert_eq!(chain.tests[0].opcode, "O_ORIG");
    }

    #[test]
    fn test_empty_slot_yields_no_decode() {
        let records = vec![record("O_ONLY", "1111110000", 1)];
        let (table, _) = table_for(&records);

        assert_eq!(table.chains.len(), 64);
        assert!(table.chains[0].tests.is_empty());
        assert!(table.lookup(0b0000000000).is_none());
        // Right slot, wrong low bits
        assert!(table.lookup(0b1111110001).is_none());
        assert_eq!(table.lookup(0b1111110000).unwrap().opcode, "O_ONLY");
    }

    #[test]
    fn test_slot_of_uses_top_bits() {
        let table = DispatchTable {
            top_bits: 6,
            width: 20,
            chains: Vec::new(),
        };
        assert_eq!(table.slot_of(0xFC000), 0x3F);
        assert_eq!(table.slot_of(0x04000), 0x01);
        assert_eq!(table.slot_of(0x03FFF), 0x00);
    }

    #[test]
    fn test_conflict_display() {
        let mut conflict = Conflict {
            slots: vec![3],
            kept: "O_A".to_string(),
            dropped: "O_B".to_string(),
            records: (0, 1),
            mask: 0xff,
            value: 0x10,
            lines: (1, 2),
        };
        let text = conflict.to_string();
        assert!(text.starts_with("slot 03: "));
        assert!(text.contains("O_B (line 2) already used by O_A (line 1)"));
        assert!(text.contains("mask=0xff value=0x10"));

        conflict.slots = vec![0, 1];
        assert!(conflict.to_string().starts_with("slots 00,01: "));
    }

    #[test]
    fn test_duplicate_across_slots_reported_once() {
        // Wildcards in the top bits put both records in slots 0..=3
        let records = vec![
            record("O_ANDI", "0000iiiiiiii10111000", 1),
            record("O_ALIAS", "0000jjjjjjjj10111000", 2),
        ];
        let (table, conflicts) = table_for(&records);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].slots, vec![0, 1, 2, 3]);
        assert_eq!(conflicts[0].kept, "O_ANDI");
        assert_eq!(conflicts[0].dropped, "O_ALIAS");
        for slot in 0..4 {
            let opcodes: Vec<_> = table.chains[slot].tests.iter().map(|t| t.opcode.as_str()).collect();
            assert_eq!(opcodes, vec!["O_ANDI"]);
        }
    }
}
