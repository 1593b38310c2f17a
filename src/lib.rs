//! decodegen library
//!
//! Compiles bit-pattern instruction descriptions into two-level decode
//! tables and renders them as source code.

pub mod config;
pub mod decode;
pub mod emit;
pub mod tablegen;
