#![warn(missing_docs)]
//! # warden-benchmarks
//!
//! Lightweight latency guardrails for the permission table. The crate itself
//! is empty; see `tests/nfr_smoke.rs`.
