//! Tests for the pseudo-execution engine
//!
//! Organized by feature area

mod batch_tests;
mod helpers;
