//! Command-line argument definitions, one module per binary.

pub mod kv;
pub mod worker;
