//! Unit tests for the opportunity pipeline
//!
//! This module contains tests that cut across pipeline components.

pub mod error_tests;
pub mod gemini_mock_tests;
pub mod orchestrator_tests;
