//! Coarse partitioning on the top bits of the header.
//!
//! Each record is placed in every slot whose index is compatible with the
//! record's leading `top_bits` pattern characters. Membership is tested by
//! brute force over all `2^top_bits` indices; with 6 top bits that is 64
//! checks per record.

use smallvec::SmallVec;

use super::pattern::compile;
use super::types::EncodingRecord;

/// Largest supported number of partition bits.
pub const MAX_TOP_BITS: u8 = 16;

/// Errors raised while partitioning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    #[error("top bits must be within 1..={max}, got {0}", max = MAX_TOP_BITS)]
    InvalidTopBits(u8),
    /// The record is shorter than the partition key
    #[error("line {line}: {opcode} pattern '{pattern}' is shorter than {top_bits} top bits")]
    ShortPattern {
        line: usize,
        opcode: String,
        pattern: String,
        top_bits: u8,
    },
    /// No slot index satisfies the record's top bits, so no chain would test it
    #[error("line {line}: {opcode} top bits '{prefix}' match no partition slot")]
    Unreachable {
        line: usize,
        opcode: String,
        prefix: String,
    },
}

/// One partition bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// Value of the header's top bits selecting this slot
    pub index: usize,
    /// Indices into the record list, in registration order
    pub records: SmallVec<[usize; 8]>,
}

impl Slot {
    fn new(index: usize) -> Self {
        Self {
            index,
            records: SmallVec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Leading `top_bits` characters of a pattern.
fn top_prefix(pattern: &str, top_bits: u8) -> Option<&str> {
    let end = pattern
        .char_indices()
        .nth(top_bits as usize)
        .map(|(i, _)| i)
        .unwrap_or(pattern.len());
    let prefix = &pattern[..end];
    (prefix.chars().count() == top_bits as usize).then_some(prefix)
}

/// Slot indices compatible with a top-bits pattern.
pub fn slots_for_prefix(prefix: &str, top_bits: u8) -> Vec<usize> {
    let top = compile(prefix);
    (0..1usize << top_bits)
        .filter(|&i| (i as u64 & top.mask) == top.value)
        .collect()
}

/// Assign every record to every compatible slot.
///
/// Returns exactly `2^top_bits` slots. Fails if a record can't be placed in
/// any slot.
pub fn partition(records: &[EncodingRecord], top_bits: u8) -> Result<Vec<Slot>, PartitionError> {
    if top_bits == 0 || top_bits > MAX_TOP_BITS {
        return Err(PartitionError::InvalidTopBits(top_bits));
    }

    let num_slots = 1usize << top_bits;
    let mut slots: Vec<Slot> = (0..num_slots).map(Slot::new).collect();

    for (idx, record) in records.iter().enumerate() {
        let prefix =
            top_prefix(&record.pattern, top_bits).ok_or_else(|| PartitionError::ShortPattern {
                line: record.meta.line,
                opcode: record.opcode.clone(),
                pattern: record.pattern.clone(),
                top_bits,
            })?;

        let top = compile(prefix);
        let mut placed = 0;
        for (i, slot) in slots.iter_mut().enumerate() {
            if (i as u64 & top.mask) == top.value {
                slot.records.push(idx);
                placed += 1;
            }
        }

        if placed == 0 {
            return Err(PartitionError::Unreachable {
                line: record.meta.line,
                opcode: record.opcode.clone(),
                prefix: prefix.to_string(),
            });
        }
        log::trace!("{} top bits '{}' -> {} slots", record.opcode, prefix, placed);
    }

    Ok(slots)
}
