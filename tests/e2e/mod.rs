//! End-to-end tests: real reqwest transport, real SQLite store and real
//! verification API against fake provider servers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod harness;
mod verification_tests;

pub use harness::{test_config, FakeProvider, InscriptionRecord};
