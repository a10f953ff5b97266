//! Shared utilities.
//!
//! Hashing, plus the fake-toolchain helpers used by the tests.

pub mod hash;

#[cfg(test)]
pub mod testutil;
