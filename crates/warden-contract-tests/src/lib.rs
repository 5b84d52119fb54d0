#![warn(missing_docs)]
//! # warden-contract-tests
//!
//! Frozen wire-contract checks for the token endpoint. The crate itself is
//! empty; see `tests/contract_validation.rs`.
