//! Shared test utilities for polext integration tests.
//!
//! This module provides:
//! - Instrumented fakes for the OCR provider, extractor, job store and renderer
//! - `Harness`, which wires an orchestrator with an isolated broadcaster

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::{collect_until_terminal, Harness, HarnessBuilder, RunResult};
