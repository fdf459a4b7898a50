//! Crate-level test suites exercising several modules together

mod error_conversion_tests;
mod scenario_tests;
