//! Bit-pattern compiler.
//!
//! Turns a pattern string such as `000xxxx01010` into a mask of fixed bits,
//! the value those bits must take, and a field signature describing where
//! the variable fields sit.

use super::types::CompiledPattern;

/// Compile a bit pattern string.
///
/// - `'0'` → mask bit set, value bit clear.
/// - `'1'` → mask bit set, value bit set.
/// - Any other char → wildcard: mask bit clear, kept in the field signature.
///
/// The first character is the most significant bit. An empty pattern compiles
/// to an all-zero pattern with an empty signature.
///
/// Patterns wider than 64 characters lose their leading bits; callers enforce
/// the width limit before compiling.
pub fn compile(pattern: &str) -> CompiledPattern {
    let mut mask: u64 = 0;
    let mut value: u64 = 0;
    let mut field_signature = String::with_capacity(pattern.len());

    for c in pattern.chars() {
        mask <<= 1;
        value <<= 1;
        match c {
            '0' => {
                mask |= 1;
                field_signature.push('_');
            }
            '1' => {
                mask |= 1;
                value |= 1;
                field_signature.push('_');
            }
            other => field_signature.push(other),
        }
    }

    CompiledPattern {
        mask,
        value,
        field_signature,
        specificity: mask.count_ones(),
    }
}
