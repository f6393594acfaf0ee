//! Tests for the executor
//!
//! Organized by feature area

mod helpers;

mod await_tests;
mod basic_tests;
mod error_tests;
mod operator_tests;
