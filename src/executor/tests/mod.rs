//! Tests for the stepwise interpreter
//!
//! Organized by feature area

mod helpers;
