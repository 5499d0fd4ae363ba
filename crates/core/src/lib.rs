//! upgrade-harness-core
//!
//! Core library for differential fuzzing of smart contract upgrades.
//!
//! Given two versions of a contract (V1 and V2), an optional proxy and a
//! classified diff, this crate synthesizes a Solidity harness that calls both
//! versions with identical inputs and asserts identical outcomes, along with a
//! matching fuzzer configuration.
//!
//! All substantive logic lives here so it can be tested directly and reused from
//! multiple frontends; the CLI is a thin wrapper.

pub mod model;
pub mod proxy;
pub mod codegen;
pub mod config;
pub mod fuzzer;
pub mod output;

pub use codegen::{generate_harness, Gap, GapKind, GenerationError, Harness, HarnessInput};
pub use config::{HarnessOptions, Mode};

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
