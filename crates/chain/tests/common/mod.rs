//! Common test utilities.

pub mod harness;

#[allow(unused_imports)]
pub use harness::*;
